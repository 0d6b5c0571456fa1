use time::macros::format_description;
use time::OffsetDateTime;

pub const STEM_PREFIX: &str = "[DETECTED]";

/// `[DETECTED]YYYY-MM-DD-HH-MM-SS`, with `_NNN` appended for the `seq`-th repeat of the
/// same second.
///
/// Names are for people browsing the directory. The log orders entries by the sequence
/// stored in each sidecar, so a suffix past `_999` or a clock that jumped is harmless.
pub fn stem_for(ts: OffsetDateTime, seq: u32) -> String {
    let fmt = format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]");
    // The description only uses numeric components, so formatting cannot fail in practice
    let base = ts
        .format(&fmt)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string());
    if seq == 0 {
        format!("{STEM_PREFIX}{base}")
    } else {
        format!("{STEM_PREFIX}{base}_{seq:03}")
    }
}

/// Split a directory entry into `(stem, extension)` if it belongs to the log.
pub(crate) fn parse_file_name(name: &str) -> Option<(&str, &str)> {
    if !name.starts_with(STEM_PREFIX) {
        return None;
    }
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.len() <= STEM_PREFIX.len() || ext.is_empty() {
        return None;
    }
    Some((stem, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_stem_format() {
        let ts = datetime!(2025-03-07 09:04:05 UTC);
        assert_eq!(stem_for(ts, 0), "[DETECTED]2025-03-07-09-04-05");
        assert_eq!(stem_for(ts, 2), "[DETECTED]2025-03-07-09-04-05_002");
    }

    #[test]
    fn test_stems_sort_chronologically() {
        let a = stem_for(datetime!(2025-03-07 09:04:05 UTC), 0);
        let b = stem_for(datetime!(2025-03-07 09:04:05 UTC), 1);
        let c = stem_for(datetime!(2025-03-07 09:04:06 UTC), 0);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name("[DETECTED]2025-03-07-09-04-05.ppm"),
            Some(("[DETECTED]2025-03-07-09-04-05", "ppm"))
        );
        assert_eq!(parse_file_name("notes.txt"), None);
        assert_eq!(parse_file_name("[DETECTED].ppm"), None);
    }
}
