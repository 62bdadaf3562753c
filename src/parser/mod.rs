pub mod epub;

use regex::Regex;
use std::sync::OnceLock;

static YEAR_RE: OnceLock<Regex> = OnceLock::new();
static ISBN_RE: OnceLock<Regex> = OnceLock::new();
static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();
static BLOCK_END_RE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

/// First four-digit year in `text`, e.g. `2011` from `2011-05-04T00:00:00Z`.
pub fn extract_year(text: &str) -> Option<i32> {
    let captures = regex(&YEAR_RE, r"\b(\d{4})\b").captures(text)?;
    captures.get(1)?.as_str().parse().ok()
}

pub fn extract_isbn_candidates(text: &str) -> Vec<String> {
    regex(
        &ISBN_RE,
        r"\b(?:97[89][\s-]?)?\d{1,5}[\s-]?\d{1,7}[\s-]?\d{1,7}[\s-]?[\dXx]\b",
    )
    .find_iter(text)
    .map(|mat| mat.as_str().to_string())
    .collect()
}

/// Strip separators and validate the check digit. Returns the bare
/// ISBN-10 or ISBN-13 when valid.
pub fn normalize_isbn(value: &str) -> Option<String> {
    let cleaned = value
        .trim_start_matches("urn:isbn:")
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == 'X' || *ch == 'x')
        .map(|ch| ch.to_ascii_uppercase())
        .collect::<String>();
    if cleaned.len() == 10 && is_valid_isbn10(&cleaned) {
        return Some(cleaned);
    }
    if cleaned.len() == 13 && is_valid_isbn13(&cleaned) {
        return Some(cleaned);
    }
    None
}

fn is_valid_isbn10(value: &str) -> bool {
    let mut sum = 0;
    for (index, ch) in value.chars().enumerate() {
        let digit = match (index, ch) {
            (9, 'X') => 10,
            (_, ch) => match ch.to_digit(10) {
                Some(digit) => digit,
                None => return false,
            },
        };
        sum += digit * (10 - index as u32);
    }
    sum % 11 == 0
}

fn is_valid_isbn13(value: &str) -> bool {
    let mut sum = 0;
    for (index, ch) in value.chars().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };
        sum += if index % 2 == 0 { digit } else { digit * 3 };
    }
    sum % 10 == 0
}

/// Turn an HTML-ish blurb into plain lines.
pub fn normalize_description(raw: &str) -> Option<String> {
    let decoded = raw.replace('\u{00a0}', " ");
    let text = if regex(&HTML_TAG_RE, r"(?is)<[^>]+>").is_match(&decoded) {
        let with_breaks = regex(&BLOCK_END_RE, r"(?is)<br\s*/?>|</(p|div|li|h[1-6])>")
            .replace_all(&decoded, "\n");
        regex(&HTML_TAG_RE, r"(?is)<[^>]+>")
            .replace_all(&with_breaks, "")
            .into_owned()
    } else {
        decoded
    };

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_isbn_candidates, extract_year, normalize_description, normalize_isbn};

    #[test]
    fn isbn_check_digits() {
        assert_eq!(normalize_isbn("978-0-306-40615-7").as_deref(), Some("9780306406157"));
        assert_eq!(normalize_isbn("urn:isbn:0-8044-2957-X").as_deref(), Some("080442957X"));
        assert_eq!(normalize_isbn("978-0-306-40615-8"), None);
        assert_eq!(normalize_isbn("uuid:1234"), None);
    }

    #[test]
    fn candidates_come_from_free_text() {
        let found = extract_isbn_candidates("Printed 2001. ISBN 978-0-306-40615-7, first edition");
        assert!(found.iter().any(|value| normalize_isbn(value).is_some()));
    }

    #[test]
    fn year_from_dates() {
        assert_eq!(extract_year("2011-05-04T00:00:00Z"), Some(2011));
        assert_eq!(extract_year("D:19991231"), None);
        assert_eq!(extract_year("circa 1850"), Some(1850));
    }

    #[test]
    fn html_descriptions_become_lines() {
        let text = normalize_description("<p>First\u{00a0}part</p><p> Second <b>bold</b></p>");
        assert_eq!(text.as_deref(), Some("First part\nSecond bold"));
        assert_eq!(normalize_description("  \n "), None);
    }
}
