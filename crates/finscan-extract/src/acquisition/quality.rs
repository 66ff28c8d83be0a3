//! Yield quality: how much usable text an attempt produced.

/// Score text in `[0, 1]`.
///
/// The volume component saturates at `chars_per_page_target` non-whitespace
/// characters per page; it is scaled by the share of those characters that
/// are alphanumeric, so recognition noise made of stray symbols scores low.
pub fn yield_quality(text: &str, pages: u32, chars_per_page_target: usize) -> f64 {
    if pages == 0 || chars_per_page_target == 0 {
        return 0.0;
    }

    let mut visible = 0usize;
    let mut alnum = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if c.is_alphanumeric() {
            alnum += 1;
        }
    }
    if visible == 0 {
        return 0.0;
    }

    let volume = (visible as f64 / (pages as f64 * chars_per_page_target as f64)).min(1.0);
    volume * (alnum as f64 / visible as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(yield_quality("", 1, 100), 0.0);
        assert_eq!(yield_quality("   \n\t", 1, 100), 0.0);
        assert_eq!(yield_quality("text", 0, 100), 0.0);
    }

    #[test]
    fn test_volume_saturates() {
        let text = "a".repeat(500);
        assert_eq!(yield_quality(&text, 1, 100), 1.0);
        assert_eq!(yield_quality(&text, 10, 100), 0.5);
    }

    #[test]
    fn test_symbol_noise_penalized() {
        let clean = "a".repeat(100);
        let noisy = "~|".repeat(40) + &"a".repeat(20);
        assert!(yield_quality(&noisy, 1, 100) < 0.3);
        assert!(yield_quality(&clean, 1, 100) > yield_quality(&noisy, 1, 100));
    }
}
