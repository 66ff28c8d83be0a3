//! Checkbox resolution by label/mark proximity.
//!
//! A mark is bound to a label when it sits on the same line immediately
//! before the label (the usual "[X] Label" layout), or failing that
//! immediately after it. Only whitespace, ':' or '-' may separate them.

use std::sync::LazyLock;

use regex::Regex;

static MARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*[xX✓✔]?\s*\]|\(\s*[xX]?\s*\)|[☒☑☐✔✓]")
        .expect("checkbox mark pattern should compile")
});

/// Largest gap (bytes) between a mark and its label.
const MAX_GAP: usize = 6;

fn is_checked(mark: &str) -> bool {
    mark.chars()
        .any(|c| matches!(c, 'x' | 'X' | '✓' | '✔' | '☒' | '☑'))
}

fn is_separator_gap(gap: &str) -> bool {
    gap.len() <= MAX_GAP
        && gap
            .chars()
            .all(|c| c.is_whitespace() || c == ':' || c == '-')
}

/// State of the mark attached to the first occurrence of `label` that has one.
///
/// Returns `(checked, label_offset)`.
pub fn mark_state(text: &str, label: &Regex) -> Option<(bool, usize)> {
    for found in label.find_iter(text) {
        let line_start = text[..found.start()].rfind('\n').map_or(0, |i| i + 1);
        let line_end = text[found.end()..]
            .find('\n')
            .map_or(text.len(), |i| found.end() + i);

        let before = &text[line_start..found.start()];
        if let Some(mark) = MARK.find_iter(before).last() {
            if is_separator_gap(&before[mark.end()..]) {
                return Some((is_checked(mark.as_str()), found.start()));
            }
        }

        let after = &text[found.end()..line_end];
        if let Some(mark) = MARK.find(after) {
            if is_separator_gap(&after[..mark.start()]) {
                return Some((is_checked(mark.as_str()), found.start()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(p: &str) -> Regex {
        Regex::new(p).unwrap()
    }

    #[test]
    fn test_mark_before_label() {
        let text = "Report Type: [X] Annual Report [ ] Candidate Report";
        assert_eq!(mark_state(text, &label("Annual Report")), Some((true, 17)));
        assert_eq!(
            mark_state(text, &label("Candidate Report")).map(|s| s.0),
            Some(false)
        );
    }

    #[test]
    fn test_mark_after_label() {
        let text = "Approved: ☒\nDenied: ☐";
        assert_eq!(mark_state(text, &label("Approved")).map(|s| s.0), Some(true));
        assert_eq!(mark_state(text, &label("Denied")).map(|s| s.0), Some(false));
    }

    #[test]
    fn test_unmarked_label() {
        assert_eq!(mark_state("Annual Report due in May", &label("Annual Report")), None);
    }

    #[test]
    fn test_distant_mark_ignored() {
        let text = "[X] something unrelated entirely Annual Report";
        assert_eq!(mark_state(text, &label("Annual Report")), None);
    }

    #[test]
    fn test_later_marked_occurrence_used() {
        let text = "Annual Report instructions\n(x) Annual Report";
        assert_eq!(mark_state(text, &label("Annual Report")).map(|s| s.0), Some(true));
    }
}
