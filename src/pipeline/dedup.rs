//! Cross-source duplicate detection.
//!
//! Papers are linked by matching DOIs or by a composite of title, first-author
//! and year similarity, then merged transitively with union-find. A merge that
//! would put two different DOIs into one group is always refused.

use super::normalize::{first_author_surname, normalize_title, title_fingerprint};
use super::similarity::TitleSimilarity;
use crate::models::{DedupGroup, Paper, PaperId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Strength given to DOI matches so they are merged before any fuzzy link
const DOI_MATCH_STRENGTH: f64 = 2.0;

/// Score of an author or year component when one side lacks the field
const UNKNOWN_COMPONENT: f64 = 0.5;

/// Length of the normalized-title prefix every paper is blocked on
const TITLE_PREFIX_CHARS: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Composite similarity must exceed this to link two papers
    pub threshold: f64,
    pub title_weight: f64,
    pub author_weight: f64,
    pub year_weight: f64,
    /// Years this far apart still count as equal (preprint vs. journal)
    pub year_tolerance: i32,
    /// Above this many papers only pairs sharing a block key are compared
    pub blocking_min_papers: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            title_weight: 0.75,
            author_weight: 0.125,
            year_weight: 0.125,
            year_tolerance: 1,
            blocking_min_papers: 200,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(Error::invalid_input(
                "dedup.threshold",
                "must be in (0, 1]",
            ));
        }
        let weights = [self.title_weight, self.author_weight, self.year_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::invalid_input(
                "dedup.weights",
                "weights must be finite and non-negative",
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::invalid_input(
                "dedup.weights",
                "at least one weight must be positive",
            ));
        }
        if self.year_tolerance < 0 {
            return Err(Error::invalid_input(
                "dedup.year_tolerance",
                "cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Author component: equal surnames 1, unknown 0.5, otherwise 0
fn author_component(a: &Paper, b: &Paper) -> f64 {
    match (
        first_author_surname(&a.authors),
        first_author_surname(&b.authors),
    ) {
        (Some(x), Some(y)) if x == y => 1.0,
        (Some(_), Some(_)) => 0.0,
        _ => UNKNOWN_COMPONENT,
    }
}

fn year_component(a: &Paper, b: &Paper, tolerance: i32) -> f64 {
    match (a.year, b.year) {
        (Some(x), Some(y)) if x.abs_diff(y) <= u32::try_from(tolerance).unwrap_or(0) => 1.0,
        (Some(_), Some(_)) => 0.0,
        _ => UNKNOWN_COMPONENT,
    }
}

/// Weighted title/author/year similarity, ignoring DOIs
#[must_use]
pub fn composite_similarity(
    a: &Paper,
    b: &Paper,
    config: &DedupConfig,
    titles: &dyn TitleSimilarity,
) -> f64 {
    let total_weight = config.title_weight + config.author_weight + config.year_weight;
    let score = config.title_weight * titles.similarity(&a.title, &b.title)
        + config.author_weight * author_component(a, b)
        + config.year_weight * year_component(a, b, config.year_tolerance);
    score / total_weight
}

/// How strongly two papers are linked, if at all
fn link_strength(
    a: &Paper,
    b: &Paper,
    config: &DedupConfig,
    titles: &dyn TitleSimilarity,
) -> Option<f64> {
    match (a.doi.as_deref(), b.doi.as_deref()) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => {
            (x == y).then_some(DOI_MATCH_STRENGTH)
        }
        _ => {
            let score = composite_similarity(a, b, config, titles);
            (score > config.threshold).then_some(score)
        }
    }
}

/// Content-only sort key, so input order never influences the result
fn content_key(paper: &Paper) -> impl Ord + '_ {
    (
        paper.doi.as_deref().unwrap_or_default(),
        normalize_title(&paper.title),
        paper.title.as_str(),
        paper.year,
        paper.authors.as_slice(),
        paper.source,
        paper.venue.as_deref(),
        paper.pdf_url.as_deref(),
        paper.id,
    )
}

struct UnionFind {
    parent: Vec<usize>,
    doi: Vec<Option<String>>,
}

impl UnionFind {
    fn new(papers: &[Paper]) -> Self {
        Self {
            parent: (0..papers.len()).collect(),
            doi: papers
                .iter()
                .map(|p| p.doi.clone().filter(|d| !d.is_empty()))
                .collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merge unless the two groups carry different DOIs.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let merged = match (&self.doi[ra], &self.doi[rb]) {
            (Some(x), Some(y)) if x != y => return false,
            (Some(x), _) | (_, Some(x)) => Some(x.clone()),
            (None, None) => None,
        };
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[child] = root;
        self.doi[root] = merged;
        true
    }
}

/// Pairs worth comparing: everything for small inputs, otherwise pairs that
/// share a DOI, a normalized-title prefix or a significant title token.
///
/// Titles without a significant token block on all of their words instead.
fn candidate_pairs(papers: &[Paper], config: &DedupConfig) -> Vec<(usize, usize)> {
    let n = papers.len();
    if n <= config.blocking_min_papers {
        return (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();
    }

    let mut blocks: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, paper) in papers.iter().enumerate() {
        if let Some(doi) = paper.doi.as_deref().filter(|d| !d.is_empty()) {
            blocks.entry(format!("doi:{doi}")).or_default().push(i);
        }
        let normalized = normalize_title(&paper.title);
        let prefix: String = normalized.chars().take(TITLE_PREFIX_CHARS).collect();
        if !prefix.is_empty() {
            blocks.entry(format!("norm:{prefix}")).or_default().push(i);
        }
        let fingerprint = title_fingerprint(&paper.title);
        let mut tokens: BTreeSet<&str> = fingerprint.split(' ').filter(|t| t.len() > 3).collect();
        if tokens.is_empty() {
            tokens = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        }
        for token in tokens {
            blocks.entry(format!("tok:{token}")).or_default().push(i);
        }
    }

    let mut pairs = BTreeSet::new();
    for members in blocks.values() {
        for (k, &i) in members.iter().enumerate() {
            for &j in &members[k + 1..] {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }
    pairs.into_iter().collect()
}

/// Group papers that denote the same work.
///
/// The result depends only on the multiset of papers, not their order.
#[must_use]
pub fn cluster(
    mut papers: Vec<Paper>,
    config: &DedupConfig,
    titles: &dyn TitleSimilarity,
) -> Vec<DedupGroup> {
    papers.sort_by(|a, b| content_key(a).cmp(&content_key(b)));

    let mut edges: Vec<(f64, usize, usize)> = candidate_pairs(&papers, config)
        .into_iter()
        .filter_map(|(i, j)| {
            link_strength(&papers[i], &papers[j], config, titles).map(|s| (s, i, j))
        })
        .collect();
    edges.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut sets = UnionFind::new(&papers);
    let mut vetoed = 0usize;
    for &(_, i, j) in &edges {
        if !sets.union(i, j) && sets.find(i) != sets.find(j) {
            vetoed += 1;
        }
    }

    let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..papers.len() {
        let root = sets.find(i);
        by_root.entry(root).or_default().push(i);
    }

    let mut slots: Vec<Option<Paper>> = papers.into_iter().map(Some).collect();
    let groups: Vec<DedupGroup> = by_root
        .into_values()
        .map(|indices| {
            let members: Vec<Paper> = indices
                .into_iter()
                .filter_map(|i| slots[i].take())
                .collect();
            let representative = choose_representative(&members);
            DedupGroup {
                members,
                representative,
            }
        })
        .collect();

    debug!(
        "Clustered into {} groups from {} links ({} vetoed by DOI)",
        groups.len(),
        edges.len(),
        vetoed
    );
    groups
}

/// DOI first, then the longest venue, then the earliest year.
fn representative_order(a: &Paper, b: &Paper) -> Ordering {
    let venue_len = |p: &Paper| p.venue.as_deref().map_or(0, str::len);
    b.has_doi()
        .cmp(&a.has_doi())
        .then_with(|| venue_len(b).cmp(&venue_len(a)))
        .then_with(|| match (a.year, b.year) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

fn choose_representative(members: &[Paper]) -> PaperId {
    // members arrive in content order, so min_by keeps ties stable
    members
        .iter()
        .min_by(|a, b| representative_order(a, b))
        .map(|p| p.id)
        .unwrap_or(PaperId(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperId, SourceId};
    use crate::pipeline::similarity::TokenEditSimilarity;

    fn paper(id: u32, title: &str, doi: Option<&str>, year: Option<i32>) -> Paper {
        let mut p = Paper::new(PaperId(id), SourceId::Crossref, title);
        p.doi = doi.map(str::to_string);
        p.year = year;
        p
    }

    fn ids(groups: &[DedupGroup]) -> Vec<Vec<u32>> {
        let mut out: Vec<Vec<u32>> = groups
            .iter()
            .map(|g| g.member_ids().into_iter().map(|id| id.0).collect())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_same_doi_merges_despite_different_titles() {
        let groups = cluster(
            vec![
                paper(0, "Machine Learning in Healthcare", Some("10.1000/xyz"), Some(2020)),
                paper(1, "ML for health: a review", Some("10.1000/xyz"), None),
            ],
            &DedupConfig::default(),
            &TokenEditSimilarity,
        );
        assert_eq!(ids(&groups), vec![vec![0, 1]]);
    }

    #[test]
    fn test_different_dois_never_merge() {
        let groups = cluster(
            vec![
                paper(0, "Deep Learning", Some("10.1/a"), Some(2020)),
                paper(1, "Deep Learning", Some("10.1/b"), Some(2020)),
            ],
            &DedupConfig::default(),
            &TokenEditSimilarity,
        );
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_veto_holds_through_a_doi_less_bridge() {
        let groups = cluster(
            vec![
                paper(0, "Deep Learning", Some("10.1/a"), Some(2020)),
                paper(1, "Deep Learning", None, Some(2020)),
                paper(2, "Deep Learning", Some("10.1/b"), Some(2020)),
            ],
            &DedupConfig::default(),
            &TokenEditSimilarity,
        );
        assert_eq!(groups.len(), 2);
        for group in &groups {
            let dois: BTreeSet<_> = group.members.iter().filter_map(|p| p.doi.clone()).collect();
            assert!(dois.len() <= 1);
        }
    }

    #[test]
    fn test_case_only_title_difference_merges() {
        let groups = cluster(
            vec![
                paper(0, "Deep Learning for X-Ray Diagnosis", None, Some(2019)),
                paper(1, "Deep learning for x ray diagnosis", None, Some(2019)),
            ],
            &DedupConfig::default(),
            &TokenEditSimilarity,
        );
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_year_tolerance() {
        let config = DedupConfig::default();
        let a = paper(0, "Sparse attention", None, Some(2019));
        let b = paper(1, "Sparse attention", None, Some(2020));
        let c = paper(2, "Sparse attention", None, Some(2023));
        let sim = TokenEditSimilarity;
        assert!(composite_similarity(&a, &b, &config, &sim) > config.threshold);
        assert!(composite_similarity(&a, &c, &config, &sim) < composite_similarity(&a, &b, &config, &sim));
    }

    #[test]
    fn test_representative_prefers_doi_then_venue() {
        let mut with_doi = paper(0, "T", Some("10.1/a"), Some(2021));
        with_doi.venue = Some("J".to_string());
        let mut long_venue = paper(1, "T", None, Some(2020));
        long_venue.venue = Some("Journal of Long Names".to_string());
        let groups = cluster(
            vec![long_venue, with_doi],
            &DedupConfig::default(),
            &TokenEditSimilarity,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative, PaperId(0));
    }

    #[test]
    fn test_blocking_still_finds_duplicates() {
        let config = DedupConfig {
            blocking_min_papers: 2,
            ..DedupConfig::default()
        };
        let groups = cluster(
            vec![
                paper(0, "Graph neural networks for chemistry", None, Some(2020)),
                paper(1, "Graph Neural Networks for Chemistry", None, Some(2020)),
                paper(2, "Unrelated protein study", None, Some(2020)),
            ],
            &config,
            &TokenEditSimilarity,
        );
        assert_eq!(ids(&groups), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_short_word_titles_merge_with_and_without_blocking() {
        let papers = vec![
            paper(0, "The Art of War", None, Some(2005)),
            paper(1, "The art of war.", None, Some(2005)),
            paper(2, "DNA", None, Some(2011)),
            paper(3, "dna.", None, Some(2011)),
            paper(4, "Graph neural networks for chemistry", None, Some(2020)),
        ];
        let unblocked = cluster(papers.clone(), &DedupConfig::default(), &TokenEditSimilarity);
        let blocked = cluster(
            papers,
            &DedupConfig {
                blocking_min_papers: 1,
                ..DedupConfig::default()
            },
            &TokenEditSimilarity,
        );
        assert_eq!(ids(&blocked), ids(&unblocked));
        assert!(ids(&blocked).contains(&vec![0, 1]));
    }

    #[test]
    fn test_links_chain_transitively() {
        let config = DedupConfig::default();
        let sim = TokenEditSimilarity;
        let a = paper(0, "Sparse attention at scale", None, Some(2015));
        let b = paper(1, "Sparse attention at scale", None, Some(2016));
        let c = paper(2, "Sparse attention at scale", None, Some(2017));
        assert!(composite_similarity(&a, &b, &config, &sim) > config.threshold);
        assert!(composite_similarity(&b, &c, &config, &sim) > config.threshold);
        assert!(composite_similarity(&a, &c, &config, &sim) < config.threshold);

        let groups = cluster(vec![c, a, b], &config, &sim);
        assert_eq!(ids(&groups), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_extreme_years_do_not_overflow() {
        let config = DedupConfig::default();
        let a = paper(0, "Sparse attention", None, Some(i32::MIN));
        let b = paper(1, "Sparse attention", None, Some(i32::MAX));
        let score = composite_similarity(&a, &b, &config, &TokenEditSimilarity);
        assert!(score < config.threshold);
        assert_eq!(cluster(vec![a, b], &config, &TokenEditSimilarity).len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DedupConfig {
            threshold: 0.0,
            ..DedupConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(DedupConfig::default().validate().is_ok());
    }
}
