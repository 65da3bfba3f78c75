//! Shared helpers for fixture-driven tests of the diff/apply pipeline.

pub mod fixtures;

use std::fmt::Write;

/// Human-readable report of where two line lists first diverge, with two
/// lines of context on each side. Empty when the lists are equal.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    fn line(lines: &[String], i: usize) -> &str {
        lines.get(i).map(String::as_str).unwrap_or("<missing>")
    }

    let len = expected.len().max(actual.len());
    let Some(first) = (0..len).find(|&i| line(expected, i) != line(actual, i)) else {
        return String::new();
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "line {} differs (expected {} lines, got {}):",
        first + 1,
        expected.len(),
        actual.len()
    );
    for i in first.saturating_sub(2)..(first + 3).min(len) {
        let marker = if i == first { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>3} - {}", i + 1, line(expected, i));
        let _ = writeln!(out, "{marker} {:>3} + {}", i + 1, line(actual, i));
    }
    out
}

/// Panics with a `diff_lines` report unless both lists are equal.
pub fn assert_lines_eq(context: &str, expected: &[String], actual: &[String]) {
    let report = diff_lines(expected, actual);
    assert!(report.is_empty(), "{context}: {report}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn equal_lists_produce_no_report() {
        assert!(diff_lines(&lines(&["a", "b"]), &lines(&["a", "b"])).is_empty());
    }

    #[test]
    fn report_points_at_the_first_difference() {
        let report = diff_lines(&lines(&["a", "b", "c"]), &lines(&["a", "x"]));
        assert!(report.starts_with("line 2 differs (expected 3 lines, got 2):"));
        assert!(report.contains(">   2 + x"));
        assert!(report.contains("    3 + <missing>"));
    }
}
