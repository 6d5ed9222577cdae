//! Provider records to canonical [`Paper`]s.

use crate::client::providers::arxiv::ArxivEntry;
use crate::client::providers::crossref::CrossrefWork;
use crate::client::providers::google_cse::CseItem;
use crate::client::providers::openalex::OpenAlexWork;
use crate::client::providers::semantic_scholar::S2Paper;
use crate::client::providers::unpaywall::UnpaywallRecord;
use crate::client::providers::RawRecord;
use crate::models::{OaStatus, Paper, PaperId, SourceId};
use regex::Regex;
use std::sync::OnceLock;

const ARXIV_VENUE: &str = "arXiv";

fn doi_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:https?://)?(?:dx\.)?doi\.org/|doi:\s*)").expect("valid DOI prefix regex")
    })
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid markup regex"))
}

/// Collapse runs of whitespace and trim.
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bare, lower-cased DOI, or `None` when nothing DOI-shaped remains.
#[must_use]
pub fn normalize_doi(raw: &str) -> Option<String> {
    let lowered = clean_text(raw).to_lowercase();
    let stripped = doi_prefix().replace(&lowered, "");
    let doi = stripped
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':'));
    (doi.starts_with("10.") && doi.contains('/')).then(|| doi.to_string())
}

/// Lower-cased alphanumeric tokens longer than two characters
#[must_use]
pub fn title_fingerprint(title: &str) -> String {
    normalize_title(title)
        .split(' ')
        .filter(|token| token.chars().count() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-case, punctuation replaced by spaces, whitespace collapsed
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let spaced: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    clean_text(&spaced)
}

/// Lower-cased surname of the first author.
///
/// Accepts both "Given Family" and "Family, Given".
#[must_use]
pub fn first_author_surname(authors: &[String]) -> Option<String> {
    let first = authors.first()?;
    let surname = match first.split_once(',') {
        Some((family, _)) => family.trim(),
        None => first.split_whitespace().last()?,
    };
    let surname = normalize_title(surname);
    (!surname.is_empty()).then_some(surname)
}

/// Whitespace cleanup; ALL-CAPS names become title case.
#[must_use]
pub fn clean_author(name: &str) -> Option<String> {
    let cleaned = clean_text(name);
    if cleaned.is_empty() {
        return None;
    }
    let has_letters = cleaned.chars().any(char::is_alphabetic);
    let shouting = has_letters && !cleaned.chars().any(char::is_lowercase);
    if !shouting {
        return Some(cleaned);
    }
    let titled = cleaned
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |head| {
                head.to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(titled)
}

fn text(value: Option<&str>) -> Option<String> {
    let cleaned = clean_text(value?);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn abstract_text(value: Option<&str>) -> Option<String> {
    let stripped = markup().replace_all(value?, " ");
    text(Some(stripped.as_ref()))
}

fn plausible_year(year: Option<i32>) -> Option<i32> {
    year.filter(|y| (1000..=3000).contains(y))
}

fn authors<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    names.into_iter().filter_map(clean_author).collect()
}

/// Turn one provider record into a [`Paper`].
///
/// Returns `None` when the record has no usable title; callers count those
/// as skipped.
#[must_use]
pub fn normalize(raw: RawRecord, id: PaperId) -> Option<Paper> {
    match raw {
        RawRecord::Crossref(work) => from_crossref(&work, id),
        RawRecord::SemanticScholar(paper) => from_semantic_scholar(&paper, id),
        RawRecord::OpenAlex(work) => from_openalex(&work, id),
        RawRecord::Arxiv(entry) => from_arxiv(&entry, id),
        RawRecord::GoogleCse(item) => from_google(&item, id),
        RawRecord::Unpaywall(record) => from_unpaywall(&record, id),
    }
}

fn from_crossref(work: &CrossrefWork, id: PaperId) -> Option<Paper> {
    let title = work.title.iter().find_map(|t| text(Some(t.as_str())))?;
    let names: Vec<String> = work
        .author
        .iter()
        .map(|a| match (&a.given, &a.family) {
            (_, None) => a.name.clone().unwrap_or_default(),
            (Some(given), Some(family)) => format!("{given} {family}"),
            (None, Some(family)) => family.clone(),
        })
        .collect();

    let mut paper = Paper::new(id, SourceId::Crossref, title);
    paper.authors = authors(names.iter().map(String::as_str));
    paper.year = plausible_year(work.year());
    paper.venue = work.container_title.iter().find_map(|v| text(Some(v.as_str())));
    paper.doi = work.doi.as_deref().and_then(normalize_doi);
    paper.pdf_url = text(work.pdf_link());
    paper.url = text(work.url.as_deref());
    paper.abstract_text = abstract_text(work.abstract_text.as_deref());
    paper.citation_count = work.is_referenced_by_count;
    paper.raw_score = work.score;
    Some(paper)
}

fn from_semantic_scholar(record: &S2Paper, id: PaperId) -> Option<Paper> {
    let title = text(record.title.as_deref())?;
    let pdf_url = text(record.pdf_url());

    let mut paper = Paper::new(id, SourceId::SemanticScholar, title);
    paper.authors = authors(record.authors.iter().filter_map(|a| a.name.as_deref()));
    paper.year = plausible_year(record.year);
    paper.venue = text(record.venue.as_deref());
    paper.doi = record.doi().and_then(normalize_doi);
    paper.open_access = if pdf_url.is_some() || record.is_open_access == Some(true) {
        OaStatus::Green
    } else {
        OaStatus::Unknown
    };
    paper.pdf_url = pdf_url;
    paper.url = text(record.url.as_deref());
    paper.abstract_text = abstract_text(record.abstract_text.as_deref());
    paper.citation_count = record.citation_count;
    Some(paper)
}

fn from_openalex(work: &OpenAlexWork, id: PaperId) -> Option<Paper> {
    let title = text(work.title())?;
    let oa = work.open_access.as_ref();

    let mut paper = Paper::new(id, SourceId::OpenAlex, title);
    paper.authors = authors(
        work.authorships
            .iter()
            .filter_map(|a| a.author.as_ref()?.display_name.as_deref()),
    );
    paper.year = plausible_year(work.publication_year);
    paper.venue = text(work.venue());
    paper.doi = work.doi.as_deref().and_then(normalize_doi);
    paper.open_access = match oa.and_then(|o| o.oa_status.as_deref()) {
        Some(label) => OaStatus::from_provider_label(label),
        None if oa.and_then(|o| o.is_oa) == Some(false) => OaStatus::Closed,
        None => OaStatus::Unknown,
    };
    paper.pdf_url = text(work.pdf_url());
    paper.url = text(
        work.primary_location
            .as_ref()
            .and_then(|l| l.landing_page_url.as_deref())
            .or(work.id.as_deref()),
    );
    paper.abstract_text = work.abstract_text().and_then(|a| text(Some(a.as_str())));
    paper.citation_count = work.cited_by_count;
    paper.raw_score = work.relevance_score;
    Some(paper)
}

fn from_arxiv(entry: &ArxivEntry, id: PaperId) -> Option<Paper> {
    let title = text(entry.title.as_deref())?;
    let pdf_url = text(entry.pdf_url.as_deref());

    let mut paper = Paper::new(id, SourceId::Arxiv, title);
    paper.authors = authors(entry.authors.iter().map(String::as_str));
    paper.year = plausible_year(entry.year());
    paper.venue = text(entry.journal_ref.as_deref()).or_else(|| Some(ARXIV_VENUE.to_string()));
    paper.doi = entry.doi.as_deref().and_then(normalize_doi);
    paper.open_access = if pdf_url.is_some() {
        OaStatus::Green
    } else {
        OaStatus::Unknown
    };
    paper.pdf_url = pdf_url;
    paper.url = text(entry.id.as_deref());
    paper.abstract_text = text(entry.summary.as_deref());
    Some(paper)
}

fn from_google(item: &CseItem, id: PaperId) -> Option<Paper> {
    let title = text(item.title.as_deref())?;

    let mut paper = Paper::new(id, SourceId::GoogleCse, title);
    paper.venue = text(item.display_link.as_deref());
    paper.pdf_url = text(item.pdf_link());
    paper.url = text(item.link.as_deref());
    paper.abstract_text = text(item.snippet.as_deref());
    Some(paper)
}

fn from_unpaywall(record: &UnpaywallRecord, id: PaperId) -> Option<Paper> {
    let title = text(record.title.as_deref())?;
    let names: Vec<String> = record
        .z_authors
        .iter()
        .flatten()
        .map(|a| {
            format!(
                "{} {}",
                a.given.as_deref().unwrap_or_default(),
                a.family.as_deref().unwrap_or_default()
            )
        })
        .collect();

    let mut paper = Paper::new(id, SourceId::Unpaywall, title);
    paper.authors = authors(names.iter().map(String::as_str));
    paper.year = plausible_year(record.year);
    paper.venue = text(record.journal_name.as_deref());
    paper.doi = record.doi.as_deref().and_then(normalize_doi);
    paper.open_access = record
        .oa_status
        .as_deref()
        .map_or(OaStatus::Unknown, OaStatus::from_provider_label);
    paper.pdf_url = text(record.best_link());
    Some(paper)
}
