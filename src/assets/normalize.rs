//! Request path normalization.
//!
//! Pure string functions shared by the resolver and the static fallback.
//! Nothing in here touches the filesystem.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use encoding_rs::EUC_KR;

/// Why a request path could not be mapped under a root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path escapes its root: {0}")]
    Traversal(String),

    #[error("path contains a forbidden component: {0}")]
    Forbidden(String),
}

/// Fix typos the game client is known to send.
///
/// Runs of `/` collapse into one and a doubled trailing extension
/// (`AI.lua.lua`) collapses into a single one. The query string is left untouched.
pub fn fix_typos(path: &str) -> String {
    let (path, query) = split_query(path);

    let mut fixed = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        fixed.push(c);
    }

    collapse_double_extension(&mut fixed);

    match query {
        Some(query) => format!("{fixed}?{query}"),
        None => fixed,
    }
}

fn collapse_double_extension(path: &mut String) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let name = &path[name_start..];

    let Some(last_dot) = name.rfind('.') else {
        return;
    };
    let ext = &name[last_dot..];
    if ext.len() < 2 {
        return;
    }
    let stem = &name[..last_dot];
    if stem.len() > ext.len() && stem.ends_with(ext) {
        let cut = name_start + last_dot;
        path.truncate(cut);
    }
}

/// Drop the `?query` (and any `#fragment`) part of a request path.
pub fn strip_query(path: &str) -> &str {
    split_query(path).0
}

fn split_query(path: &str) -> (&str, Option<&str>) {
    let path = path.split('#').next().unwrap_or(path);
    match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    }
}

/// Percent-decode a path.
///
/// Escapes that are not UTF-8 are tried as EUC-KR, the encoding of archive
/// entry names. If neither fits the input is returned unchanged.
pub fn percent_decode(path: &str) -> Cow<'_, str> {
    if let Ok(decoded) = urlencoding::decode(path) {
        return decoded;
    }
    let bytes = urlencoding::decode_binary(path.as_bytes());
    match EUC_KR.decode_without_bom_handling_and_without_replacement(&bytes) {
        Some(decoded) => Cow::Owned(decoded.into_owned()),
        None => Cow::Borrowed(path),
    }
}

/// Full request normalization: typo fix, query strip, percent decode.
pub fn normalize(request_path: &str) -> String {
    let fixed = fix_typos(request_path);
    percent_decode(strip_query(&fixed)).into_owned()
}

/// Split a decoded path into its segments, refusing anything that could leave the root.
pub fn safe_segments(decoded: &str) -> Result<Vec<&str>, PathError> {
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal(decoded.to_string())),
            s if s.contains('\\') || s.contains('\0') || s.contains(':') => {
                return Err(PathError::Forbidden(decoded.to_string()));
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// Map a request path to a file path under `root`.
///
/// The query string is stripped and the path percent-decoded before joining.
/// Any result that would escape `root` is rejected.
pub fn to_filesystem_path(path: &str, root: &Path) -> Result<PathBuf, PathError> {
    let decoded = percent_decode(strip_query(path));
    join_under(&decoded, root)
}

/// Join an already decoded path under `root` with the traversal guard applied.
pub fn join_under(decoded: &str, root: &Path) -> Result<PathBuf, PathError> {
    let mut joined = root.to_path_buf();
    for segment in safe_segments(decoded)? {
        joined.push(segment);
    }
    Ok(joined)
}

/// Decode the entry name under `data/<category>/` once more.
///
/// Archives store literal names, while some clients double-encode the
/// non-ASCII characters of sprite and texture names.
pub fn decode_category_segment(path: &str, categories: &[String]) -> String {
    let lower = path.to_ascii_lowercase();
    for category in categories {
        let marker = format!("data/{}/", category.to_ascii_lowercase());
        if let Some(pos) = lower.find(&marker) {
            let tail_start = pos + marker.len();
            if tail_start >= path.len() || !path.is_char_boundary(tail_start) {
                continue;
            }
            let (head, tail) = path.split_at(tail_start);
            return format!("{}{}", head, percent_decode(tail));
        }
    }
    path.to_string()
}

/// Convert a normalized request path to the archive's internal name form.
pub fn to_archive_name(path: &str) -> String {
    path.trim_start_matches('/').replace('/', "\\")
}

/// Extension of the last path segment, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    name.rfind('.')
        .map(|i| &name[i + 1..])
        .filter(|ext| !ext.is_empty())
}

/// Last path segment, accepting both separators.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
