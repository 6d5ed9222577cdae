//! Open-access lookups for clustered works that still lack a PDF or a known
//! access status.

use super::aggregate::merged_open_access;
use super::normalize::{clean_text, normalize};
use crate::client::providers::{OpenAccessResolver, RawRecord};
use crate::client::RateLimiter;
use crate::models::{DedupGroup, OaStatus, PaperId, SourceDiagnostics, SourceStatus};
use crate::request::Credentials;
use crate::resilience::{retry_with_policy, with_logged_timeout, RetryPolicy};
use crate::Error;
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared knobs of one enrichment pass
pub struct EnrichmentContext<'a> {
    pub credentials: &'a Credentials,
    pub policy: &'a RetryPolicy,
    pub limiter: &'a Mutex<RateLimiter>,
    pub timeout: Duration,
    pub concurrency: usize,
}

/// DOIs of groups with no PDF link or no known access status
#[must_use]
pub fn dois_needing_lookup(groups: &[DedupGroup]) -> BTreeSet<String> {
    groups
        .iter()
        .filter(|g| {
            !g.members.iter().any(|p| p.has_pdf())
                || !merged_open_access(&g.members).is_known()
        })
        .filter_map(|g| g.doi().map(str::to_string))
        .collect()
}

/// Access status and best link carried by a resolver record
fn located(raw: RawRecord) -> (OaStatus, Option<String>) {
    match raw {
        RawRecord::Unpaywall(record) => {
            let status = match record.oa_status.as_deref() {
                Some(label) => OaStatus::from_provider_label(label),
                None if record.is_oa == Some(false) => OaStatus::Closed,
                None => OaStatus::Unknown,
            };
            let link = record
                .best_link()
                .map(clean_text)
                .filter(|l| !l.is_empty());
            (status, link)
        }
        other => normalize(other, PaperId(0))
            .map_or((OaStatus::Unknown, None), |p| (p.open_access, p.pdf_url)),
    }
}

fn apply(groups: &mut [DedupGroup], doi: &str, status: OaStatus, link: Option<&str>) -> bool {
    let mut changed = false;
    for paper in groups
        .iter_mut()
        .flat_map(|g| g.members.iter_mut())
        .filter(|p| p.doi.as_deref() == Some(doi))
    {
        if status.permissiveness() > paper.open_access.permissiveness() {
            paper.open_access = status;
            changed = true;
        }
        if let (false, Some(link)) = (paper.has_pdf(), link) {
            paper.pdf_url = Some(link.to_string());
            changed = true;
        }
    }
    changed
}

/// Look up DOIs through `resolver` and upgrade the matching members in place.
///
/// Every lookup goes through the same retry, timeout and politeness rules as
/// the search sources. Failures only show up in the returned diagnostics.
pub async fn enrich_open_access(
    groups: &mut [DedupGroup],
    resolver: &dyn OpenAccessResolver,
    context: &EnrichmentContext<'_>,
    cancel: &CancellationToken,
) -> SourceDiagnostics {
    let started = Instant::now();
    let dois = dois_needing_lookup(groups);
    info!("Resolving open access for {} DOIs", dois.len());

    let operation_name = format!("{} lookup", resolver.source());
    let lookups = stream::iter(dois)
        .map(|doi| {
            let operation_name = operation_name.as_str();
            async move {
                let doi_ref = doi.as_str();
                let outcome = retry_with_policy(
                    move || async move {
                        {
                            let mut limiter = context.limiter.lock().await;
                            limiter.acquire().await;
                        }
                        with_logged_timeout(
                            resolver.resolve(doi_ref, context.credentials),
                            context.timeout,
                            operation_name,
                        )
                        .await
                    },
                    context.policy,
                    operation_name,
                    cancel,
                )
                .await;
                (doi, outcome)
            }
        })
        .buffer_unordered(context.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut resolved = 0usize;
    let mut not_found = 0usize;
    let mut attempts = 0u32;
    let mut cancelled = false;
    let mut errors: Vec<String> = Vec::new();

    for (doi, outcome) in lookups {
        attempts += outcome.attempts;
        match outcome.result {
            Ok(Some(raw)) => {
                let (status, link) = located(raw);
                if apply(groups, &doi, status, link.as_deref()) {
                    debug!("Open access upgraded for {}", doi);
                }
                resolved += 1;
            }
            Ok(None) => not_found += 1,
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => {
                warn!("Open access lookup failed for {}: {}", doi, e);
                errors.push(format!("{doi}: {e}"));
            }
        }
    }

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = if cancelled {
        SourceStatus::Cancelled
    } else if !errors.is_empty() && resolved == 0 && not_found == 0 {
        SourceStatus::Failed
    } else {
        SourceStatus::Ok
    };
    let error = match errors.len() {
        0 => None,
        1 => errors.pop(),
        n => Some(format!("{n} lookups failed; first: {}", errors[0])),
    };

    SourceDiagnostics {
        count: resolved,
        skipped: not_found,
        error,
        elapsed_ms,
        attempts,
        status,
    }
}
