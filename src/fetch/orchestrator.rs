//! The fetch attempt: search, filter, resolve, then the blacklist-aware retry loop
//!
//! ```text
//! SEARCHING -> FILTERING -> RESOLVING -> SELECTING -> ATTEMPTING -> CHECKING_BLACKLIST
//!                                            ^                           |
//!                                            +------- DISCARDING <-------+--> COMMITTED
//! ```
//!
//! Every collaborator failure is converted into a transition here; nothing
//! escapes [`fetch`] as an error.

use tracing::{Instrument, debug, error, info, info_span, warn};

use super::candidates::{WorkingSet, filter_matches, resolve_all};
use super::strategy::DownloadDirs;
use super::traits::{
    BlacklistStore, DownloadClient, Indexer, LinkTracer, MetadataProvider, TransferSink,
};
use super::types::{FetchOutcome, FetchReport, ResolvedCandidate, Transfer, WatchTarget};
use crate::indexer::HostRewrite;

/// Knobs for a fetch attempt that come from configuration
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Rewrites results-page links to the reachable indexer host
    pub host_rewrite: Option<HostRewrite>,
    pub download_dirs: DownloadDirs,
    /// Concurrent redirect traces while resolving candidates
    pub resolve_concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            host_rewrite: None,
            download_dirs: DownloadDirs::default(),
            resolve_concurrency: 4,
        }
    }
}

/// Collaborators for one fetch attempt
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub metadata: &'a dyn MetadataProvider,
    pub indexer: &'a dyn Indexer,
    pub tracer: &'a dyn LinkTracer,
    pub downloads: &'a dyn DownloadClient,
    pub blacklist: &'a dyn BlacklistStore,
    pub sink: &'a dyn TransferSink,
    pub settings: &'a FetchSettings,
}

/// Run one fetch attempt for `target`
pub async fn fetch(ctx: FetchContext<'_>, target: &WatchTarget) -> FetchReport {
    let span = info_span!("fetch", watch = %target);
    async move {
        let mut orphaned = Vec::new();
        let mut report = run(ctx, target, &mut orphaned).await;
        report.orphaned = orphaned;
        info!(
            outcome = %report.outcome,
            acquired = report.acquired,
            hash = report.transfer.as_ref().map(|t| t.hash.as_str()),
            orphaned = report.orphaned.len(),
            "Fetch finished"
        );
        report
    }
    .instrument(span)
    .await
}

async fn run(
    ctx: FetchContext<'_>,
    target: &WatchTarget,
    orphaned: &mut Vec<Transfer>,
) -> FetchReport {
    let canonical = match target.canonical_media(ctx.metadata).await {
        Ok(canonical) => canonical,
        Err(e) => {
            error!(error = %e, "Metadata lookup failed");
            return FetchReport::failed(FetchOutcome::MetadataFailed);
        }
    };

    let query = match target.search_query(ctx.metadata, &canonical).await {
        Ok(query) => query,
        Err(e) => {
            error!(error = %e, "Metadata lookup for search query failed");
            return FetchReport::failed(FetchOutcome::MetadataFailed);
        }
    };

    debug!(stage = "searching", query = %query, kind = %target.kind());
    let search = ctx.indexer.search(target.kind(), &query).await;
    if !search.ok {
        warn!(
            query = %query,
            error = search.error_detail.as_deref().unwrap_or("unknown"),
            "Search error"
        );
        return FetchReport::failed(FetchOutcome::SearchFailed);
    }

    let total = search.results.len();
    let matched = filter_matches(search.results, &canonical, |title, canonical| {
        target.matches(title, canonical)
    });
    debug!(stage = "filtering", total, matched = matched.len());
    if matched.is_empty() {
        info!(title = %canonical.title, "No valid search results");
        return FetchReport::failed(FetchOutcome::NoMatch);
    }

    let resolved = resolve_all(
        matched,
        ctx.settings.host_rewrite.as_ref(),
        ctx.tracer,
        ctx.settings.resolve_concurrency,
    )
    .await;
    debug!(stage = "resolving", resolved = resolved.len());
    if resolved.is_empty() {
        info!(title = %canonical.title, "No resolvable search results");
        return FetchReport::failed(FetchOutcome::NoResolvableCandidate);
    }

    let download_dir = target.download_dir(
        &ctx.downloads.base_download_dir(),
        &ctx.settings.download_dirs,
    );

    let mut working = WorkingSet::new(resolved);
    while let Some(best) = working.take_best() {
        debug!(
            stage = "attempting",
            title = %best.title(),
            seeders = best.seeders(),
            remaining = working.len()
        );

        let transfer = match ctx
            .downloads
            .add_transfer(&best.resolved_locator, &download_dir, true)
            .await
        {
            Ok(transfer) => transfer,
            Err(e) => {
                warn!(
                    title = %best.title(),
                    seeders = best.seeders(),
                    error = %e,
                    "Could not add torrent, trying next best result"
                );
                continue;
            }
        };

        if is_blacklisted(ctx, &transfer).await {
            info!(
                title = %best.title(),
                hash = %transfer.hash,
                "BLACKLISTED, trying next best result"
            );
            discard(ctx, &transfer, orphaned).await;
            continue;
        }

        if let Err(e) = ctx.downloads.start(&transfer).await {
            if transfer.owned {
                warn!(
                    title = %best.title(),
                    hash = %transfer.hash,
                    error = %e,
                    "Could not start torrent, trying next best result"
                );
                discard(ctx, &transfer, orphaned).await;
                continue;
            }
            // Already managed torrents are usually live, which the client reports as an error
            debug!(hash = %transfer.hash, error = %e, "Existing torrent not started");
        }

        if let Err(e) = ctx.sink.commit(target, &transfer).await {
            error!(
                title = %best.title(),
                hash = %transfer.hash,
                error = %e,
                "Failed to save torrent details, removing torrent"
            );
            discard(ctx, &transfer, orphaned).await;
            return FetchReport::failed(FetchOutcome::CommitFailed);
        }

        log_committed(&canonical.title, &best, &transfer);
        return FetchReport::committed(transfer);
    }

    info!(title = %canonical.title, "Every candidate was blacklisted or failed");
    FetchReport::failed(FetchOutcome::Exhausted)
}

/// A failed lookup counts as a hit: an unverified transfer never starts
async fn is_blacklisted(ctx: FetchContext<'_>, transfer: &Transfer) -> bool {
    match ctx.blacklist.is_blacklisted(&transfer.hash).await {
        Ok(hit) => hit,
        Err(e) => {
            error!(hash = %transfer.hash, error = %e, "Blacklist lookup failed");
            true
        }
    }
}

/// Remove a transfer this attempt added, retrying once
///
/// Transfers the client already managed are left alone. One that survives
/// both removals is recorded in `orphaned`.
async fn discard(ctx: FetchContext<'_>, transfer: &Transfer, orphaned: &mut Vec<Transfer>) {
    if !transfer.owned {
        info!(
            id = transfer.id,
            hash = %transfer.hash,
            "Torrent was managed before this attempt, leaving it in place"
        );
        return;
    }

    for attempt in 1..=2 {
        match ctx.downloads.remove(transfer).await {
            Ok(()) => return,
            Err(e) => warn!(
                id = transfer.id,
                hash = %transfer.hash,
                attempt,
                error = %e,
                "Failed to remove discarded torrent"
            ),
        }
    }

    error!(id = transfer.id, hash = %transfer.hash, "Leaving paused torrent behind");
    orphaned.push(transfer.clone());
}

fn log_committed(title: &str, best: &ResolvedCandidate, transfer: &Transfer) {
    info!(
        media = %title,
        release = %best.title(),
        seeders = best.seeders(),
        id = transfer.id,
        hash = %transfer.hash,
        "Started torrent"
    );
}
