//! Text normalization applied to acquired text before field extraction.
//!
//! Trims and collapses whitespace, repairs line-break hyphenation, corrects
//! OCR digit look-alikes inside numeric tokens and rewrites dates to ISO
//! `YYYY-MM-DD`.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

static HYPHENATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").expect("hyphenation pattern should compile")
});

static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("space pattern should compile"));

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w$,./-]+").expect("token pattern should compile"));

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})\b")
        .expect("numeric date pattern should compile")
});

static YEAR_FIRST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})/(\d{1,2})/(\d{1,2})\b").expect("year-first date pattern should compile")
});

static MONTH_NAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(\d{1,2}),?\s+(\d{4})\b",
    )
    .expect("month name date pattern should compile")
});

static DAY_MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b",
    )
    .expect("day month date pattern should compile")
});

/// Normalize raw page text.
pub fn normalize_text(raw: &str) -> String {
    let unified: String = raw
        .replace("\r\n", "\n")
        .chars()
        .map(|c| match c {
            '\r' | '\x0c' => '\n',
            '\u{a0}' | '\u{2007}' | '\u{202f}' => ' ',
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            other => other,
        })
        .collect();

    let joined = HYPHENATION.replace_all(&unified, "$1$2");

    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;
    for line in joined.lines() {
        let line = INLINE_SPACE.replace_all(line.trim(), " ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        let line = correct_digit_lookalikes(&line);
        lines.push(normalize_dates(&line).into_owned());
    }

    lines.join("\n").trim().to_string()
}

/// Replace O/o, I/l and S with digits inside tokens that are otherwise numeric.
pub fn correct_digit_lookalikes(line: &str) -> Cow<'_, str> {
    TOKEN.replace_all(line, |caps: &Captures| {
        let token = &caps[0];
        let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
        let lookalikes = token.chars().filter(|c| "OoIlS".contains(*c)).count();
        let letters = token
            .chars()
            .filter(|c| c.is_alphabetic() && !"OoIlS".contains(*c))
            .count();
        if digits == 0 || lookalikes == 0 || letters > 0 || lookalikes > digits {
            return token.to_string();
        }
        token
            .chars()
            .map(|c| match c {
                'O' | 'o' => '0',
                'I' | 'l' => '1',
                'S' => '5',
                other => other,
            })
            .collect()
    })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)?.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn expand_year(year: &str) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    Some(match year.len() {
        2 if value < 70 => 2000 + value,
        2 => 1900 + value,
        _ => value,
    })
}

fn iso(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(year?, month?, day?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Rewrite recognizable calendar dates to `YYYY-MM-DD`. Impossible dates are left alone.
pub fn normalize_dates(line: &str) -> Cow<'_, str> {
    let mut text: Cow<'_, str> = Cow::Borrowed(line);

    let replaced = NUMERIC_DATE.replace_all(&text, |caps: &Captures| {
        iso(
            expand_year(&caps[3]),
            caps[1].parse().ok(),
            caps[2].parse().ok(),
        )
        .unwrap_or_else(|| caps[0].to_string())
    });
    if let Cow::Owned(s) = replaced {
        text = Cow::Owned(s);
    }

    let replaced = YEAR_FIRST_DATE.replace_all(&text, |caps: &Captures| {
        iso(caps[1].parse().ok(), caps[2].parse().ok(), caps[3].parse().ok())
            .unwrap_or_else(|| caps[0].to_string())
    });
    if let Cow::Owned(s) = replaced {
        text = Cow::Owned(s);
    }

    let replaced = MONTH_NAME_DATE.replace_all(&text, |caps: &Captures| {
        iso(
            caps[3].parse().ok(),
            month_number(&caps[1]),
            caps[2].parse().ok(),
        )
        .unwrap_or_else(|| caps[0].to_string())
    });
    if let Cow::Owned(s) = replaced {
        text = Cow::Owned(s);
    }

    let replaced = DAY_MONTH_DATE.replace_all(&text, |caps: &Captures| {
        iso(
            caps[3].parse().ok(),
            month_number(&caps[2]),
            caps[1].parse().ok(),
        )
        .unwrap_or_else(|| caps[0].to_string())
    });
    if let Cow::Owned(s) = replaced {
        text = Cow::Owned(s);
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates_to_iso() {
        assert_eq!(normalize_dates("on 01/15/2025."), "on 2025-01-15.");
        assert_eq!(normalize_dates("1/5/25"), "2025-01-05");
        assert_eq!(normalize_dates("January 15, 2025"), "2025-01-15");
        assert_eq!(normalize_dates("Sept. 3 2024"), "2024-09-03");
        assert_eq!(normalize_dates("15 March 2025"), "2025-03-15");
        assert_eq!(normalize_dates("2025/2/1"), "2025-02-01");
        assert_eq!(normalize_dates("2025-02-01"), "2025-02-01");
    }

    #[test]
    fn test_impossible_date_untouched() {
        assert_eq!(normalize_dates("13/45/2025"), "13/45/2025");
    }

    #[test]
    fn test_digit_lookalikes() {
        assert_eq!(correct_digit_lookalikes("$1,OO1 - $l5,000"), "$1,001 - $15,000");
        assert_eq!(correct_digit_lookalikes("2O25"), "2025");
        // Words stay words.
        assert_eq!(correct_digit_lookalikes("SOLD SP Inc"), "SOLD SP Inc");
        assert_eq!(correct_digit_lookalikes("Oil 10"), "Oil 10");
    }

    #[test]
    fn test_hyphenation_and_whitespace() {
        let raw = "  Apple  Incor-\n  porated   Common Stock  \r\n\n\n\nNext\u{a0}line ";
        assert_eq!(
            normalize_text(raw),
            "Apple Incorporated Common Stock\n\nNext line"
        );
    }

    #[test]
    fn test_lookalikes_then_dates() {
        assert_eq!(normalize_text("Date: 0l/l5/2O25"), "Date: 2025-01-15");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_text("Signed 02/03/2025 by Jane   Doe\n$1,001 - $15,000");
        assert_eq!(normalize_text(&once), once);
    }
}
