use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SkipReason;
use crate::text::clean_text;

/// Company sentinel for listings that do not name an employer.
pub const COMPANY_NOT_SPECIFIED: &str = "Not specified";

/// Application status written with every new row.
pub const STATUS_NOT_APPLIED: &str = "Not Applied";

/// A normalized posting as produced by a collector.
///
/// `link` is the primary identity and may be empty for sources that cannot
/// supply one. The scrape date and tracking status are not part of this
/// type: they are stamped on by the orchestrator in [`JobRow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub source: String,
    pub posted_date: NaiveDate,
    pub salary: Option<String>,
}

/// Raw field values pulled from a listing, before normalization.
#[derive(Debug, Default, Clone)]
pub struct RawListing {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub link: String,
    pub salary: Option<String>,
}

impl JobRecord {
    /// Normalize and validate a listing. Title, company, location and
    /// source must all be non-empty afterwards; link may be empty.
    pub fn build(
        raw: RawListing,
        source: &str,
        default_location: &str,
        posted_date: NaiveDate,
    ) -> Result<JobRecord, SkipReason> {
        let title = clean_text(&raw.title);
        let company = raw
            .company
            .map(|c| clean_text(&c))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| COMPANY_NOT_SPECIFIED.to_string());
        let location = raw
            .location
            .map(|l| clean_text(&l))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| clean_text(default_location));
        let source = clean_text(source);
        let salary = raw.salary.map(|s| clean_text(&s)).filter(|s| !s.is_empty());

        let record = JobRecord {
            title,
            company,
            location,
            link: raw.link.trim().to_string(),
            source,
            posted_date,
            salary,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), SkipReason> {
        let required = [
            ("title", &self.title),
            ("company", &self.company),
            ("location", &self.location),
            ("source", &self.source),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(SkipReason::MissingField(*field)),
            None => Ok(()),
        }
    }

    /// Lowercased, trimmed `(title, company)` pair. Catches the same posting
    /// listed under different URLs by different sources.
    pub fn secondary_key(&self) -> (String, String) {
        (
            self.title.trim().to_lowercase(),
            self.company.trim().to_lowercase(),
        )
    }

    pub fn has_link(&self) -> bool {
        !self.link.is_empty()
    }
}

/// A record ready for the store: the orchestrator's run date and the initial
/// tracking status are attached here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    #[serde(flatten)]
    pub job: JobRecord,
    pub scraped_date: NaiveDate,
    pub status: String,
}

impl JobRow {
    pub fn new(job: JobRecord, scraped_date: NaiveDate) -> Self {
        Self {
            job,
            scraped_date,
            status: STATUS_NOT_APPLIED.to_string(),
        }
    }
}
