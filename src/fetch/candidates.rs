//! Candidate filtering, locator resolution and ranking

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::traits::{LinkTracer, ResolutionError};
use super::types::{CanonicalMedia, RawSearchResult, ResolvedCandidate};
use crate::indexer::HostRewrite;

/// Keep the results whose title satisfies `is_match`, in their original order
pub fn filter_matches<F>(
    results: Vec<RawSearchResult>,
    canonical: &CanonicalMedia,
    is_match: F,
) -> Vec<RawSearchResult>
where
    F: Fn(&str, &CanonicalMedia) -> bool,
{
    results
        .into_iter()
        .filter(|result| {
            let matched = is_match(&result.title, canonical);
            if !matched {
                debug!(title = %result.title, "Not matched");
            }
            matched
        })
        .collect()
}

/// Resolve the locator the download client should fetch for one result
///
/// A direct magnet locator is returned as-is. Otherwise the results-page link
/// is rewritten to the configured indexer host and traced through its redirects.
pub async fn resolve_locator(
    result: &RawSearchResult,
    rewrite: Option<&HostRewrite>,
    tracer: &dyn LinkTracer,
) -> Result<String, ResolutionError> {
    if let Some(direct) = result.direct_locator() {
        return Ok(direct.to_string());
    }

    let link = match rewrite {
        Some(rewrite) => rewrite.apply(&result.link)?,
        None => result.link.clone(),
    };

    tracer.trace(&link).await
}

/// Resolve every filtered result, dropping the ones that fail
///
/// Traces run with bounded concurrency; output keeps input order so ranking
/// ties stay stable.
pub async fn resolve_all(
    filtered: Vec<RawSearchResult>,
    rewrite: Option<&HostRewrite>,
    tracer: &dyn LinkTracer,
    concurrency: usize,
) -> Vec<ResolvedCandidate> {
    stream::iter(filtered)
        .map(move |result| async move {
            let resolved = resolve_locator(&result, rewrite, tracer).await;
            (result, resolved)
        })
        .buffered(concurrency.max(1))
        .filter_map(|(result, resolved)| async move {
            match resolved {
                Ok(locator) => {
                    info!(
                        title = %result.title,
                        seeders = result.seeders,
                        "Valid match"
                    );
                    Some(ResolvedCandidate {
                        result,
                        resolved_locator: locator,
                    })
                }
                Err(e) => {
                    warn!(
                        title = %result.title,
                        seeders = result.seeders,
                        error = %e,
                        "Could not resolve torrent locator, dropping candidate"
                    );
                    None
                }
            }
        })
        .collect()
        .await
}

/// Highest seeder count wins; the first one encountered wins a tie
pub fn best(candidates: &[ResolvedCandidate]) -> Option<&ResolvedCandidate> {
    best_index(candidates).map(|idx| &candidates[idx])
}

fn best_index(candidates: &[ResolvedCandidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .reduce(|best, current| {
            if current.1.seeders() > best.1.seeders() {
                current
            } else {
                best
            }
        })
        .map(|(idx, _)| idx)
}

/// Candidates still eligible in the current attempt
///
/// Each call to [`WorkingSet::take_best`] removes exactly the candidate it
/// returns, so nothing is visited twice and the loop always terminates.
#[derive(Debug, Default)]
pub struct WorkingSet {
    candidates: Vec<ResolvedCandidate>,
}

impl WorkingSet {
    pub fn new(candidates: Vec<ResolvedCandidate>) -> Self {
        Self { candidates }
    }

    pub fn take_best(&mut self) -> Option<ResolvedCandidate> {
        let idx = best_index(&self.candidates)?;
        Some(self.candidates.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    fn raw(title: &str, seeders: u32) -> RawSearchResult {
        RawSearchResult {
            title: title.to_string(),
            seeders,
            link: format!("http://jackett:9117/dl/{}", title),
            magnet_uri: None,
        }
    }

    fn resolved(title: &str, seeders: u32) -> ResolvedCandidate {
        ResolvedCandidate {
            result: raw(title, seeders),
            resolved_locator: format!("magnet:?xt=urn:btih:{}", title),
        }
    }

    /// Resolves every link except the ones containing "broken"
    #[derive(Default)]
    struct CountingTracer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LinkTracer for CountingTracer {
        async fn trace(&self, url: &str) -> Result<String, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                return Err(ResolutionError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(format!("{}.torrent", url))
        }
    }

    #[test]
    fn test_filter_preserves_order() {
        let canonical = CanonicalMedia::titled("Alpha");
        let results = vec![raw("Alpha.1", 1), raw("Beta.2020", 9), raw("Alpha.2", 5)];

        let kept = filter_matches(results, &canonical, |title, c| title.starts_with(&c.title));

        let titles: Vec<_> = kept.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha.1", "Alpha.2"]);
    }

    #[test]
    fn test_best_picks_highest_seeders() {
        let candidates = vec![resolved("a", 3), resolved("b", 40), resolved("c", 12)];
        assert_eq!(best(&candidates).map(|c| c.title()), Some("b"));
    }

    #[test]
    fn test_best_tie_keeps_first() {
        let candidates = vec![resolved("a", 7), resolved("b", 9), resolved("c", 9)];
        assert_eq!(best(&candidates).map(|c| c.title()), Some("b"));
    }

    #[test]
    fn test_best_singleton_and_empty() {
        assert!(best(&[]).is_none());
        let one = vec![resolved("only", 0)];
        assert_eq!(best(&one).map(|c| c.title()), Some("only"));
    }

    #[test]
    fn test_working_set_drains_in_seed_order() {
        let mut set = WorkingSet::new(vec![
            resolved("low", 1),
            resolved("high", 50),
            resolved("mid", 10),
            resolved("mid-tie", 10),
        ]);

        let mut order = Vec::new();
        while let Some(candidate) = set.take_best() {
            order.push(candidate.title().to_string());
        }

        assert_eq!(order, vec!["high", "mid", "mid-tie", "low"]);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_direct_locator_skips_trace() {
        let tracer = CountingTracer::default();
        let mut result = raw("Alpha.2020", 4);
        result.magnet_uri = Some("magnet:?xt=urn:btih:feed".to_string());

        let out = resolve_all(vec![result], None, &tracer, 4).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].resolved_locator, "magnet:?xt=urn:btih:feed");
        assert_eq!(tracer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_resolution_drops_only_that_candidate() {
        let tracer = CountingTracer::default();
        let results = vec![raw("first", 1), raw("broken", 99), raw("third", 3)];

        let out = resolve_all(results, None, &tracer, 2).await;

        let titles: Vec<_> = out.iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["first", "third"]);
        assert_eq!(tracer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_host_rewrite_applied_before_trace() {
        let tracer = CountingTracer::default();
        let rewrite: HostRewrite = "indexer.lan:9117".parse().unwrap();
        let result = RawSearchResult {
            title: "Alpha".to_string(),
            seeders: 1,
            link: "http://127.0.0.1:9117/dl/alpha?file=Alpha".to_string(),
            magnet_uri: None,
        };

        let locator = resolve_locator(&result, Some(&rewrite), &tracer).await.unwrap();

        assert_eq!(locator, "http://indexer.lan:9117/dl/alpha?file=Alpha.torrent");
    }
}
