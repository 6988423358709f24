//! Line gate deciding which lines of benchmark output are interval data.
//!
//! vdbench interleaves banners, column headers and run summaries with the
//! interval lines. Only lines made of digits, whitespace, `:` and `.` whose
//! width matches a known [`Schema`] are passed on for extraction.

use super::schema::Schema;

/// Returns true if `c` may appear on an interval data line.
#[inline]
pub fn is_allowed_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_whitespace() || c == ':' || c == '.'
}

/// Classify a raw line, returning the schema its width selects.
///
/// Returns `None` for any line containing a character outside the allowed
/// set, and for lines whose token count matches neither schema.
pub fn classify(line: &str) -> Option<Schema> {
    if !line.chars().all(is_allowed_char) {
        return None;
    }
    Schema::from_token_count(line.split_whitespace().count())
}

/// Returns true if `line` is a candidate interval record.
pub fn is_candidate(line: &str) -> bool {
    classify(line).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_line(values: usize) -> String {
        let mut line = String::from("12:00:00.000 1");
        for i in 0..values {
            line.push_str(&format!("  {}.5", i));
        }
        line
    }

    #[test]
    fn test_device_width_is_candidate() {
        assert_eq!(classify(&numeric_line(13)), Some(Schema::Device));
    }

    #[test]
    fn test_filesystem_width_is_candidate() {
        assert_eq!(classify(&numeric_line(25)), Some(Schema::Filesystem));
    }

    #[test]
    fn test_other_widths_rejected() {
        for values in [0, 1, 12, 14, 24, 26, 40] {
            assert!(
                !is_candidate(&numeric_line(values)),
                "width {values} should be rejected"
            );
        }
    }

    #[test]
    fn test_header_line_rejected() {
        let header = "Run  Interval  IOrate  MB/sec  bytes  read  resp  read  write  resp  resp  queue  cpu%  cpu%";
        assert!(!is_candidate(header));
    }

    #[test]
    fn test_foreign_character_rejected_regardless_of_width() {
        let replaced = numeric_line(13).replacen("3.5", "N/A", 1);
        assert_eq!(replaced.split_whitespace().count(), 15);
        assert!(!is_candidate(&replaced));

        let negative = numeric_line(13).replacen("3.5", "-3.5", 1);
        assert!(!is_candidate(&negative));

        let fs_width = numeric_line(25).replacen("3.5", "3,5", 1);
        assert!(!is_candidate(&fs_width));
    }

    #[test]
    fn test_non_ascii_digits_rejected() {
        // Arabic-Indic digit three.
        let line = numeric_line(13).replacen("3.5", "\u{0663}.5", 1);
        assert!(!is_candidate(&line));
    }

    #[test]
    fn test_unicode_whitespace_rejected() {
        let em_space = numeric_line(13).replacen(' ', "\u{2003}", 1);
        assert!(!is_candidate(&em_space));

        let vertical_tab = numeric_line(13).replacen(' ', "\u{000B}", 1);
        assert!(!is_candidate(&vertical_tab));
    }

    #[test]
    fn test_blank_lines_rejected() {
        assert!(!is_candidate(""));
        assert!(!is_candidate("   \t  "));
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let line = format!("   {}  \r", numeric_line(13));
        assert_eq!(classify(&line), Some(Schema::Device));
    }

    #[test]
    fn test_allowed_chars() {
        for c in ['0', '9', ':', '.', ' ', '\t'] {
            assert!(is_allowed_char(c), "{c:?} should be allowed");
        }
        for c in ['a', '-', '+', '/', ',', '%', '\u{2003}', '\u{000B}'] {
            assert!(!is_allowed_char(c), "{c:?} should be rejected");
        }
    }
}
