//! Static extension → content type table.

/// Known extensions, lowercase, sorted for binary search.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("act", "application/octet-stream"),
    ("bmp", "image/bmp"),
    ("css", "text/css"),
    ("gat", "application/octet-stream"),
    ("gif", "image/gif"),
    ("gnd", "application/octet-stream"),
    ("grf", "application/octet-stream"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/x-icon"),
    ("imf", "application/octet-stream"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("lua", "text/x-lua"),
    ("lub", "text/x-lua"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("pal", "application/octet-stream"),
    ("png", "image/png"),
    ("rsm", "application/octet-stream"),
    ("rsw", "application/octet-stream"),
    ("spr", "application/octet-stream"),
    ("str", "application/octet-stream"),
    ("svg", "image/svg+xml"),
    ("tga", "image/x-tga"),
    ("ttf", "font/ttf"),
    ("txt", "text/plain"),
    ("wasm", "application/wasm"),
    ("wav", "audio/wav"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("xml", "application/xml"),
];

/// Look up the content type for an extension (case-insensitive).
pub fn lookup(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    CONTENT_TYPES
        .binary_search_by(|(known, _)| (*known).cmp(ext.as_str()))
        .ok()
        .map(|i| CONTENT_TYPES[i].1)
}

/// Content type for a path, falling back to `default` for unknown extensions.
pub fn content_type_for(path: &str, default: &str) -> String {
    super::normalize::extension(path)
        .and_then(lookup)
        .unwrap_or(default)
        .to_string()
}
