use chrono::NaiveDate;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::{ExtractError, SkipReason};
use crate::models::job::{JobRecord, RawListing};
use crate::relevance::RelevanceFilter;
use crate::text::{clean_text, extract_salary, parse_posted_date};

/// Where one field lives inside a listing node. The selector may be a CSS
/// group (`"h2 a, h3 a"`); the first match in document order wins. With
/// `attr` set the attribute value is used, falling back to the text.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub selector: &'static str,
    pub attr: Option<&'static str>,
}

impl FieldSpec {
    pub const fn text(selector: &'static str) -> Self {
        Self {
            selector,
            attr: None,
        }
    }

    pub const fn attr(selector: &'static str, attr: &'static str) -> Self {
        Self {
            selector,
            attr: Some(attr),
        }
    }
}

/// Declarative description of a search results page.
#[derive(Debug)]
pub struct ListingSpec {
    /// Label stored in each record's `source`.
    pub source: &'static str,
    /// Base for resolving relative links.
    pub base_url: &'static str,
    /// One node per listing.
    pub item: &'static str,
    pub title: FieldSpec,
    pub link: Option<FieldSpec>,
    pub company: Option<FieldSpec>,
    pub location: Option<FieldSpec>,
    pub salary: Option<FieldSpec>,
    pub description: Option<FieldSpec>,
    pub posted: Option<FieldSpec>,
}

struct CompiledField {
    selector: Selector,
    attr: Option<&'static str>,
}

impl CompiledField {
    fn compile(
        site: &'static str,
        field: &'static str,
        spec: FieldSpec,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            selector: compile_selector(site, field, spec.selector)?,
            attr: spec.attr,
        })
    }

    fn value(&self, node: ElementRef<'_>) -> Option<String> {
        let element = node.select(&self.selector).next()?;
        let from_attr = self
            .attr
            .and_then(|name| element.value().attr(name))
            .map(clean_text)
            .filter(|v| !v.is_empty());
        from_attr
            .or_else(|| Some(clean_text(&element.text().collect::<Vec<_>>().join(" "))))
            .filter(|v| !v.is_empty())
    }
}

fn compile_selector(
    site: &'static str,
    field: &'static str,
    selector: &'static str,
) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::Selector {
        site,
        field,
        selector,
    })
}

/// A [`ListingSpec`] with its selectors parsed, built once per collector.
pub struct CompiledSpec {
    spec: &'static ListingSpec,
    item: Selector,
    title: CompiledField,
    link: Option<CompiledField>,
    company: Option<CompiledField>,
    location: Option<CompiledField>,
    salary: Option<CompiledField>,
    description: Option<CompiledField>,
    posted: Option<CompiledField>,
}

impl CompiledSpec {
    pub fn compile(spec: &'static ListingSpec) -> Result<Self, ExtractError> {
        let site = spec.source;
        let optional = |field: &'static str, value: Option<FieldSpec>| {
            value
                .map(|v| CompiledField::compile(site, field, v))
                .transpose()
        };
        Ok(Self {
            spec,
            item: compile_selector(site, "item", spec.item)?,
            title: CompiledField::compile(site, "title", spec.title)?,
            link: optional("link", spec.link)?,
            company: optional("company", spec.company)?,
            location: optional("location", spec.location)?,
            salary: optional("salary", spec.salary)?,
            description: optional("description", spec.description)?,
            posted: optional("posted", spec.posted)?,
        })
    }

    pub fn source(&self) -> &'static str {
        self.spec.source
    }
}

/// Per-run values every listing needs.
pub struct ExtractContext<'a> {
    pub filter: &'a RelevanceFilter,
    pub default_location: &'a str,
    pub today: NaiveDate,
}

/// One outcome per listing node on the page, in document order.
pub fn extract_listings(
    html: &str,
    spec: &CompiledSpec,
    ctx: &ExtractContext<'_>,
) -> Vec<Result<JobRecord, SkipReason>> {
    let document = Html::parse_document(html);
    document
        .select(&spec.item)
        .map(|node| extract_listing(node, spec, ctx))
        .collect()
}

fn extract_listing(
    node: ElementRef<'_>,
    spec: &CompiledSpec,
    ctx: &ExtractContext<'_>,
) -> Result<JobRecord, SkipReason> {
    let field = |f: &Option<CompiledField>| f.as_ref().and_then(|f| f.value(node));

    let title = spec.title.value(node).ok_or(SkipReason::NoTitleNode)?;
    let description = field(&spec.description).unwrap_or_default();

    if !ctx.filter.is_relevant(&title, &description) {
        return Err(SkipReason::Irrelevant);
    }

    let link = field(&spec.link)
        .map(|href| resolve_link(spec.spec.base_url, &href))
        .unwrap_or_default();
    let salary = field(&spec.salary).or_else(|| extract_salary(&description));
    let posted_date = field(&spec.posted)
        .and_then(|text| parse_posted_date(&text, ctx.today))
        .unwrap_or(ctx.today);

    let raw = RawListing {
        title,
        company: field(&spec.company),
        location: field(&spec.location),
        link,
        salary,
    };
    JobRecord::build(raw, spec.source(), ctx.default_location, posted_date)
}

/// Absolute form of `href` relative to the board's base URL.
pub fn resolve_link(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return String::new();
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}
