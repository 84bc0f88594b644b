//! Small shared helpers: human-readable sizes, truncation, name validation.

/// Format a byte count as a human-readable size.
pub fn format_size(size_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}

/// Truncate to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let cut: String = text.chars().take(keep).collect();
    format!("{cut}...")
}

/// Whether `name` is safe to use as a local repository directory name.
pub fn validate_repo_name(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    const INVALID: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];
    !name.chars().any(|c| INVALID.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_format_with_the_right_unit() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn truncate_keeps_short_strings_intact() {
        assert_eq!(truncate("short", 100), "short");
        let cut = truncate(&"a".repeat(50), 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn repo_names_reject_path_separators() {
        assert!(validate_repo_name("my-repo"));
        assert!(validate_repo_name("repo_2"));
        assert!(!validate_repo_name(""));
        assert!(!validate_repo_name("   "));
        assert!(!validate_repo_name("a/b"));
        assert!(!validate_repo_name("a\\b"));
        assert!(!validate_repo_name("a:b"));
    }
}
