//! Meridian Utils - Utility Functions
//!
//! Formatting helpers used when reporting dataset sizes.
//!
//! @version 0.1.0
//! @author Meridian Development Team

// =============================================================================
// Size Formatting
// =============================================================================

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte size as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, SIZE_UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, SIZE_UNITS[unit_index])
    }
}

/// Describe a dataset cap for log output.
pub fn describe_cap(cap_size_bytes: u64) -> String {
    if cap_size_bytes == 0 {
        "uncapped".to_string()
    } else {
        format!("capped at {}", format_size(cap_size_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(100), "100 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_describe_cap() {
        assert_eq!(describe_cap(0), "uncapped");
        assert_eq!(describe_cap(2048), "capped at 2.00 KB");
    }
}
