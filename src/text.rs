use std::sync::OnceLock;

use chrono::{Days, NaiveDate};
use regex::Regex;

/// Collapse whitespace runs to a single space, drop control characters, trim.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

fn relative_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\+?\s*(minute|min|hour|hr|day|week|month)s?\s*ago").ok())
        .as_ref()
}

/// Glassdoor's short form: "3d", "30d+", "24h".
fn compact_age_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*([dh])\+?$").ok())
        .as_ref()
}

/// Best-effort parse of the posted-date text job boards show, relative to
/// `today`. Returns `None` when nothing recognisable is found.
pub fn parse_posted_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = clean_text(text).to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    if lowered.contains("today") || lowered.contains("just now") || lowered.contains("just posted")
    {
        return Some(today);
    }
    if lowered.contains("yesterday") {
        return today.checked_sub_days(Days::new(1));
    }

    if let Some(caps) = relative_re().and_then(|re| re.captures(&lowered)) {
        let amount: u64 = caps[1].parse().ok()?;
        let days = match &caps[2] {
            "minute" | "min" | "hour" | "hr" => 0,
            "day" => amount,
            "week" => amount.checked_mul(7)?,
            _ => amount.checked_mul(30)?,
        };
        return today.checked_sub_days(Days::new(days));
    }
    if let Some(caps) = compact_age_re().and_then(|re| re.captures(&lowered)) {
        let amount: u64 = caps[1].parse().ok()?;
        let days = if &caps[2] == "d" { amount } else { 0 };
        return today.checked_sub_days(Days::new(days));
    }
    if lowered.contains("week ago") {
        return today.checked_sub_days(Days::new(7));
    }

    // Absolute dates keep their original casing for month names.
    let trimmed = clean_text(text);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&trimmed, fmt).ok())
}

fn salary_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"₹\s*[\d,]+\s*-\s*₹\s*[\d,]+",
            r"(?i)\brs\.?\s*[\d,]+\s*-\s*rs\.?\s*[\d,]+",
            r"(?i)[\d,.]+\s*-\s*[\d,.]+\s*lpa",
            r"(?i)[\d,.]+\s*lpa",
            r"\$\s*[\d,]+\s*-\s*\$\s*[\d,]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Pull the first compensation-looking fragment out of free text.
pub fn extract_salary(text: &str) -> Option<String> {
    salary_patterns()
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().trim().to_string())
}
