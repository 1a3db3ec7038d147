//! Utility functions for filenames, paths and human-readable formatting

use std::path::Path;

/// Characters that are not allowed in filenames on common filesystems
const ILLEGAL_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace every character that is illegal in a filename with `_`
///
/// The mapping is per character and deterministic, so distinct titles can
/// collapse to the same name (`"a:b"` and `"a?b"` both become `"a_b"`); no
/// de-duplication is attempted.
///
/// # Examples
///
/// ```
/// use bili_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Test: <Title>/Name"), "Test_ _Title__Name");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Format seconds as `MM:SS`, or `HH:MM:SS` from one hour up
pub fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Format a byte count with two decimals and a binary unit ("1.50 MB")
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

/// Format a transfer rate ("1.50 MB/s")
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// Format an ETA; zero means unknown and renders as `--:--`
pub fn format_eta(secs: u64) -> String {
    if secs == 0 {
        "--:--".to_string()
    } else {
        format_clock(secs)
    }
}

/// Remove a file, treating "already gone" as success
pub async fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Size of a file in bytes, or 0 when it does not exist
pub async fn file_len(path: &Path) -> std::io::Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_replaces_every_illegal_char() {
        assert_eq!(sanitize_filename("Test: <Title>/Name"), "Test_ _Title__Name");
        assert_eq!(sanitize_filename(r#"a\b|c?d*e"f"#), "a_b_c_d_e_f");
        assert_eq!(sanitize_filename("plain title"), "plain title");
    }

    #[test]
    fn sanitize_collisions_are_not_deduplicated() {
        assert_eq!(sanitize_filename("a:b"), sanitize_filename("a?b"));
        assert_eq!(sanitize_filename("a:b"), "a_b");
    }

    #[test]
    fn sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("《标题》：第1集"), "《标题》：第1集");
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(125), "02:05");
        assert_eq!(format_clock(3725), "01:02:05");
        assert_eq!(format_clock(3600), "01:00:00");
    }

    #[test]
    fn size_and_speed_formatting() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_speed(2048), "2.00 KB/s");
    }

    #[test]
    fn eta_zero_is_unknown() {
        assert_eq!(format_eta(0), "--:--");
        assert_eq!(format_eta(61), "01:01");
    }

    #[tokio::test]
    async fn file_helpers_tolerate_missing_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.tmp");
        assert_eq!(file_len(&path).await.unwrap(), 0);
        remove_file_if_exists(&path).await.unwrap();

        tokio::fs::write(&path, b"abc").await.unwrap();
        assert_eq!(file_len(&path).await.unwrap(), 3);
        remove_file_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }
}
