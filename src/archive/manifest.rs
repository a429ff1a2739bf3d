//! Container manifest (`DATA.INI`) parsing.
//!
//! ```ini
//! [Data]
//! 1=cdata.grf
//! 2=rdata.grf
//! 3=data.grf
//! ```

/// Parse a manifest into container ids ordered by key.
///
/// Keys compare as strings, so `10` sorts before `2`. Blank lines, comments,
/// section headers and lines without a value are skipped.
pub fn parse_manifest(text: &str) -> Vec<String> {
    let mut entries: Vec<(&str, &str)> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with(['#', ';', '[']))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(_, value)| !value.is_empty())
        .collect();

    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, value)| value.to_string()).collect()
}
