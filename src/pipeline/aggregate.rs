//! Merging duplicate groups into ranked works.

use crate::models::{
    DedupGroup, OaStatus, Paper, PaperId, RankedPaper, ScoreBreakdown, SourceDiagnostics,
    SourceId,
};
use crate::request::{SearchResult, SourceQuery};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// Most permissive known status among the members, `Unknown` if none is known
#[must_use]
pub fn merged_open_access(members: &[Paper]) -> OaStatus {
    members
        .iter()
        .map(|p| p.open_access)
        .filter(|s| s.is_known())
        .max_by_key(|s| s.permissiveness())
        .unwrap_or_default()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// Members with the representative first, the rest by id
fn ordered_members(group: &DedupGroup) -> Vec<&Paper> {
    let mut members: Vec<&Paper> = group.members.iter().collect();
    members.sort_by_key(|p| (p.id != group.representative, p.id));
    members
}

fn merged_pdf(members: &[&Paper]) -> Option<String> {
    members
        .iter()
        .filter(|p| p.open_access != OaStatus::Closed)
        .chain(members.iter())
        .find_map(|p| non_empty(p.pdf_url.as_ref()))
}

/// Merge a group into a single paper, starting from its representative.
#[must_use]
pub fn merge_group(group: &DedupGroup) -> Option<Paper> {
    let members = ordered_members(group);
    let mut merged = (*members.first()?).clone();

    merged.open_access = merged_open_access(&group.members);
    merged.pdf_url = merged_pdf(&members);

    for member in &members[1..] {
        if !merged.has_doi() {
            merged.doi = non_empty(member.doi.as_ref());
        }
        if !merged.has_venue() {
            merged.venue = non_empty(member.venue.as_ref());
        }
        if merged.year.is_none() {
            merged.year = member.year;
        }
        if non_empty(merged.url.as_ref()).is_none() {
            merged.url = non_empty(member.url.as_ref());
        }
        if merged.authors.is_empty() {
            merged.authors.clone_from(&member.authors);
        }
        let current = merged.abstract_text.as_deref().map_or(0, str::len);
        if member.abstract_text.as_deref().map_or(0, str::len) > current {
            merged.abstract_text.clone_from(&member.abstract_text);
        }
        merged.citation_count = merged.citation_count.max(member.citation_count);
        merged.raw_score = match (merged.raw_score, member.raw_score) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
    Some(merged)
}

/// Best member breakdown; ties go to the lowest id
fn group_score(
    group: &DedupGroup,
    scores: &HashMap<PaperId, ScoreBreakdown>,
) -> Option<ScoreBreakdown> {
    group
        .member_ids()
        .into_iter()
        .filter_map(|id| scores.get(&id).copied())
        .fold(None, |best: Option<ScoreBreakdown>, s| match best {
            Some(b) if b.total >= s.total => Some(b),
            _ => Some(s),
        })
}

fn rank_order(a: &RankedPaper, b: &RankedPaper) -> Ordering {
    b.score
        .total
        .total_cmp(&a.score.total)
        .then_with(|| match (a.paper.year, b.paper.year) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| {
            a.paper
                .title
                .to_lowercase()
                .cmp(&b.paper.title.to_lowercase())
        })
        .then_with(|| a.paper.id.cmp(&b.paper.id))
}

/// Build the final, ranked result of a search.
#[must_use]
pub fn finalize(
    query: SourceQuery,
    groups: Vec<DedupGroup>,
    scores: &HashMap<PaperId, ScoreBreakdown>,
    diagnostics: BTreeMap<SourceId, SourceDiagnostics>,
    cancelled: bool,
) -> SearchResult {
    let mut papers: Vec<RankedPaper> = groups
        .iter()
        .filter_map(|group| {
            let paper = merge_group(group)?;
            let score = group_score(group, scores)?;
            let sources: BTreeSet<SourceId> = group.members.iter().map(|p| p.source).collect();
            Some(RankedPaper {
                paper,
                score,
                sources: sources.into_iter().collect(),
                member_count: group.members.len(),
            })
        })
        .collect();
    papers.sort_by(rank_order);

    SearchResult {
        search_id: Uuid::new_v4(),
        query,
        papers,
        diagnostics,
        cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SearchRequest;

    fn paper(id: u32, source: SourceId, title: &str) -> Paper {
        Paper::new(PaperId(id), source, title)
    }

    fn breakdown(id: u32, total: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            paper_id: PaperId(id),
            title_match: total,
            recency_bonus: 0.0,
            venue_bonus: 0.0,
            total,
        }
    }

    #[test]
    fn test_open_access_prefers_known_status() {
        let mut a = paper(0, SourceId::Crossref, "T");
        a.open_access = OaStatus::Unknown;
        let mut b = paper(1, SourceId::OpenAlex, "T");
        b.open_access = OaStatus::Gold;
        let mut c = paper(2, SourceId::Arxiv, "T");
        c.open_access = OaStatus::Green;
        assert_eq!(merged_open_access(&[a.clone(), b, c]), OaStatus::Gold);
        assert_eq!(merged_open_access(&[a]), OaStatus::Unknown);
    }

    #[test]
    fn test_merge_fills_gaps_from_members() {
        let mut rep = paper(0, SourceId::Crossref, "Machine Learning in Healthcare");
        rep.doi = Some("10.1000/xyz".into());
        rep.abstract_text = Some("Short.".into());
        rep.citation_count = Some(3);
        let mut other = paper(1, SourceId::SemanticScholar, "Machine learning in healthcare");
        other.venue = Some("Nature Medicine".into());
        other.year = Some(2020);
        other.abstract_text = Some("A much longer abstract.".into());
        other.citation_count = Some(40);
        other.pdf_url = Some("https://x.org/a.pdf".into());
        other.open_access = OaStatus::Green;

        let merged = merge_group(&DedupGroup {
            members: vec![other, rep],
            representative: PaperId(0),
        })
        .unwrap();
        assert_eq!(merged.id, PaperId(0));
        assert_eq!(merged.title, "Machine Learning in Healthcare");
        assert_eq!(merged.venue.as_deref(), Some("Nature Medicine"));
        assert_eq!(merged.year, Some(2020));
        assert_eq!(merged.abstract_text.as_deref(), Some("A much longer abstract."));
        assert_eq!(merged.citation_count, Some(40));
        assert_eq!(merged.open_access, OaStatus::Green);
        assert_eq!(merged.pdf_url.as_deref(), Some("https://x.org/a.pdf"));
    }

    #[test]
    fn test_pdf_prefers_non_closed_member() {
        let mut closed = paper(0, SourceId::Crossref, "T");
        closed.open_access = OaStatus::Closed;
        closed.pdf_url = Some("https://publisher/paywalled.pdf".into());
        let mut green = paper(1, SourceId::Arxiv, "T");
        green.open_access = OaStatus::Green;
        green.pdf_url = Some("https://arxiv.org/pdf/1".into());

        let merged = merge_group(&DedupGroup {
            members: vec![closed, green],
            representative: PaperId(0),
        })
        .unwrap();
        assert_eq!(merged.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1"));
    }

    #[test]
    fn test_ranking_order() {
        let query = SearchRequest::new("q", 5, &[SourceId::Crossref])
            .validate()
            .unwrap();
        let mut old = paper(0, SourceId::Crossref, "beta");
        old.year = Some(2001);
        let mut new = paper(1, SourceId::Crossref, "Alpha");
        new.year = Some(2020);
        let undated = paper(2, SourceId::Crossref, "aardvark");
        let top = paper(3, SourceId::Crossref, "zeta");

        let groups = [old, new, undated, top]
            .into_iter()
            .map(|p| DedupGroup {
                representative: p.id,
                members: vec![p],
            })
            .collect();
        let scores = HashMap::from([
            (PaperId(0), breakdown(0, 0.5)),
            (PaperId(1), breakdown(1, 0.5)),
            (PaperId(2), breakdown(2, 0.5)),
            (PaperId(3), breakdown(3, 0.9)),
        ]);

        let result = finalize(query, groups, &scores, BTreeMap::new(), false);
        let order: Vec<u32> = result.papers.iter().map(|r| r.paper.id.0).collect();
        assert_eq!(order, vec![3, 1, 0, 2]);
        assert!(!result.cancelled);
    }

    #[test]
    fn test_group_score_and_sources() {
        let query = SearchRequest::new("q", 5, &[SourceId::Crossref])
            .validate()
            .unwrap();
        let group = DedupGroup {
            members: vec![
                paper(0, SourceId::OpenAlex, "T"),
                paper(1, SourceId::Crossref, "T"),
                paper(2, SourceId::OpenAlex, "T"),
            ],
            representative: PaperId(1),
        };
        let scores = HashMap::from([
            (PaperId(0), breakdown(0, 0.2)),
            (PaperId(1), breakdown(1, 0.4)),
            (PaperId(2), breakdown(2, 0.7)),
        ]);
        let result = finalize(query, vec![group], &scores, BTreeMap::new(), false);
        let ranked = &result.papers[0];
        assert_eq!(ranked.score.paper_id, PaperId(2));
        assert_eq!(ranked.sources, vec![SourceId::Crossref, SourceId::OpenAlex]);
        assert_eq!(ranked.member_count, 3);
        assert_eq!(ranked.paper.id, PaperId(1));
    }
}
