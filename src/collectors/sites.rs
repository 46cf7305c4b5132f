//! Job boards this crate knows how to read.
//!
//! Each board is data: a search URL builder, a page ceiling, a page backend
//! and a [`ListingSpec`]. Board-specific brittleness stays in these tables
//! and the sample pages under `testdata/` that pin them down.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::collectors::extract::{FieldSpec, ListingSpec};
use crate::config::SearchConfig;

/// Characters left alone in query values, as `quote_plus` would.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Plain HTTP through the resilient fetcher.
    Http { referer: &'static str },
    /// Rendered in a headless browser over WebDriver.
    WebDriver,
}

pub struct Site {
    pub name: &'static str,
    pub max_pages: u32,
    pub backend: BackendKind,
    pub spec: &'static ListingSpec,
    /// Search URL for a 1-based page number.
    pub page_url: fn(&SearchConfig, u32) -> String,
}

pub fn site(name: &str) -> Option<&'static Site> {
    SITES.iter().find(|s| s.name == name)
}

static SITES: [Site; 5] = [
    Site {
        name: "timesjobs",
        max_pages: 3,
        backend: BackendKind::Http {
            referer: "https://www.timesjobs.com/",
        },
        spec: &TIMESJOBS,
        page_url: timesjobs_url,
    },
    Site {
        name: "indeed",
        max_pages: 3,
        backend: BackendKind::Http {
            referer: "https://in.indeed.com/",
        },
        spec: &INDEED,
        page_url: indeed_url,
    },
    Site {
        name: "linkedin",
        max_pages: 2,
        backend: BackendKind::WebDriver,
        spec: &LINKEDIN,
        page_url: linkedin_url,
    },
    Site {
        name: "naukri",
        max_pages: 3,
        backend: BackendKind::WebDriver,
        spec: &NAUKRI,
        page_url: naukri_url,
    },
    Site {
        name: "glassdoor",
        max_pages: 2,
        backend: BackendKind::WebDriver,
        spec: &GLASSDOOR,
        page_url: glassdoor_url,
    },
];

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE)
        .to_string()
        .replace("%20", "+")
}

fn leading_keywords(config: &SearchConfig, count: usize) -> String {
    config
        .keywords
        .iter()
        .take(count)
        .map(|k| k.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

static TIMESJOBS: ListingSpec = ListingSpec {
    source: "TimesJobs",
    base_url: "https://www.timesjobs.com",
    item: "li.job-bx",
    title: FieldSpec::text("h2 a, h2, h3 a"),
    link: Some(FieldSpec::attr("h2 a, h3 a", "href")),
    company: Some(FieldSpec::text("h3.joblist-comp-name, .comp-name")),
    location: Some(FieldSpec::text("span.loc, .location")),
    salary: Some(FieldSpec::text("span.sal, .salary")),
    description: Some(FieldSpec::text("ul.list-job-dtl, .job-description")),
    posted: Some(FieldSpec::text("span.sim-posted, .posted-date")),
};

fn timesjobs_url(config: &SearchConfig, page: u32) -> String {
    let mut url = format!(
        "https://www.timesjobs.com/candidate/job-search.html?searchType=personalizedSearch&from=submit&txtKeywords={}&txtLocation={}&cboWorkExp1=0&cboWorkExp2=10",
        encode(&leading_keywords(config, 3)),
        encode(config.location.trim()),
    );
    if page > 1 {
        url.push_str(&format!("&sequence={page}"));
    }
    url
}

static INDEED: ListingSpec = ListingSpec {
    source: "Indeed",
    base_url: "https://in.indeed.com",
    item: "div.job_seen_beacon, td.resultContent",
    title: FieldSpec::attr("h2.jobTitle a, a[data-jk]", "title"),
    link: Some(FieldSpec::attr("h2.jobTitle a, a[data-jk]", "href")),
    company: Some(FieldSpec::text(
        "[data-testid=company-name], span.companyName",
    )),
    location: Some(FieldSpec::text(
        "[data-testid=text-location], div.companyLocation",
    )),
    salary: Some(FieldSpec::text(
        "div.salary-snippet-container, span.salary-snippet",
    )),
    description: Some(FieldSpec::text("div.job-snippet, [data-testid=job-snippet]")),
    posted: Some(FieldSpec::text("span.date, [data-testid=myJobsStateDate]")),
};

fn indeed_url(config: &SearchConfig, page: u32) -> String {
    let mut url = format!(
        "https://in.indeed.com/jobs?q={}&l={}",
        encode(&leading_keywords(config, config.keywords.len())),
        encode(config.location.trim()),
    );
    if page > 1 {
        url.push_str(&format!("&start={}", (page - 1) * 10));
    }
    url.push_str("&fromage=7&sort=date");
    url
}

static LINKEDIN: ListingSpec = ListingSpec {
    source: "LinkedIn",
    base_url: "https://www.linkedin.com",
    item: "div.base-search-card, li div.job-search-card",
    title: FieldSpec::text("h3.base-search-card__title, .job-search-card__title"),
    link: Some(FieldSpec::attr("a.base-card__full-link", "href")),
    company: Some(FieldSpec::text(
        "h4.base-search-card__subtitle, .job-search-card__subtitle-link",
    )),
    location: Some(FieldSpec::text("span.job-search-card__location")),
    salary: Some(FieldSpec::text("span.job-search-card__salary-info")),
    description: Some(FieldSpec::text(
        ".job-search-card__snippet, .base-search-card__snippet",
    )),
    posted: Some(FieldSpec::attr(
        "time.job-search-card__listdate, time.job-search-card__listdate--new",
        "datetime",
    )),
};

fn linkedin_url(config: &SearchConfig, page: u32) -> String {
    format!(
        "https://www.linkedin.com/jobs/search?keywords={}&location={}&f_TPR=r86400&f_JT=F&start={}",
        encode(&leading_keywords(config, 3)),
        encode(config.location.trim()),
        (page - 1) * 25,
    )
}

static NAUKRI: ListingSpec = ListingSpec {
    source: "Naukri",
    base_url: "https://www.naukri.com",
    item: "div.srp-jobtuple-wrapper, article.jobTuple",
    title: FieldSpec::attr("a.title", "title"),
    link: Some(FieldSpec::attr("a.title", "href")),
    company: Some(FieldSpec::attr("a.comp-name, a.subTitle", "title")),
    location: Some(FieldSpec::attr("span.locWdth, .location", "title")),
    salary: Some(FieldSpec::attr("span.sal-wrap span, .salary", "title")),
    description: Some(FieldSpec::text("span.job-desc, .job-description")),
    posted: Some(FieldSpec::text("span.job-post-day")),
};

fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn naukri_url(config: &SearchConfig, page: u32) -> String {
    let keyword = slug(&leading_keywords(config, 1));
    let location = slug(&config.location);
    let mut url = format!("https://www.naukri.com/{keyword}-jobs-in-{location}");
    if page > 1 {
        url.push_str(&format!("-{page}"));
    }
    url
}

static GLASSDOOR: ListingSpec = ListingSpec {
    source: "Glassdoor",
    base_url: "https://www.glassdoor.co.in",
    item: "li[data-test=jobListing], article[data-test=jobListing]",
    title: FieldSpec::text("a[data-test=job-title], .jobTitle a"),
    link: Some(FieldSpec::attr("a[data-test=job-title], .jobTitle a", "href")),
    company: Some(FieldSpec::text(
        "span[data-test=employer-name], .employerName",
    )),
    location: Some(FieldSpec::text(
        "div[data-test=job-location], span[data-test=job-location]",
    )),
    salary: Some(FieldSpec::text(
        "[data-test=detailSalary], div[data-test=salary-estimate]",
    )),
    description: Some(FieldSpec::text(
        "div[data-test=job-description], .jobDescription",
    )),
    posted: Some(FieldSpec::text("div[data-test=job-age], .jobAge")),
};

/// Listings from the last day only, searched by location name.
fn glassdoor_url(config: &SearchConfig, page: u32) -> String {
    let mut url = format!(
        "https://www.glassdoor.co.in/Job/jobs.htm?sc.keyword={}&locKeyword={}&locT=C&fromAge=1",
        encode(&leading_keywords(config, 3)),
        encode(config.location.trim()),
    );
    if page > 1 {
        url.push_str(&format!("&p={page}"));
    }
    url
}
