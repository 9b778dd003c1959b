use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use refrain_common::{time, validate_target_id, Result, Tier, PAGE_SIZE};

use crate::ingest::ingest;
use crate::retry::{FetchFailure, PageOutcome};
use crate::sampler::TieredSampler;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub pages: u32,
    pub observed: u64,
    pub inserted: u64,
    pub refreshed: u64,
    pub marked_deleted: u64,
    /// The walk reached the natural end of the listing. Deletions are only
    /// marked when this holds.
    pub complete: bool,
}

impl TieredSampler {
    /// Walk the whole offset listing, refresh what is known, add what is new,
    /// and soft-delete stored comments the upstream no longer lists.
    pub async fn refresh(&self, target_id: &str) -> Result<RefreshReport> {
        validate_target_id(target_id)?;
        let source = &*self.source;
        let started = Instant::now();
        let mut report = RefreshReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut consecutive_errors = 0u32;
        let mut page = 0u32;

        self.target_record(target_id).await?;
        info!(target_id, "Full refresh started");

        while page < self.config.refresh_max_pages {
            if started.elapsed() >= self.config.refresh_max_runtime {
                warn!(target_id, page, "Refresh hit its runtime ceiling");
                break;
            }

            let offset = page * PAGE_SIZE;
            let outcome = self
                .config
                .retry
                .fetch(&self.pacer, move || source.offset_page(target_id, offset, PAGE_SIZE))
                .await?;

            let listing = match outcome {
                PageOutcome::Fetched(listing) => listing,
                PageOutcome::Abandoned(reason @ FetchFailure::Transient(_)) => {
                    consecutive_errors += 1;
                    warn!(target_id, page, consecutive_errors, error = %reason, "Refresh page failed");
                    if consecutive_errors >= self.config.refresh_error_breaker {
                        break;
                    }
                    continue;
                }
                PageOutcome::Abandoned(reason) => {
                    warn!(target_id, page, error = %reason, "Refresh page rejected");
                    break;
                }
            };
            consecutive_errors = 0;

            if listing.comments.is_empty() {
                report.complete = true;
                break;
            }

            let batch: Vec<_> = listing
                .comments
                .into_iter()
                .filter_map(|w| ingest(w, target_id, Tier::Recent))
                .collect();
            seen.extend(batch.iter().map(|c| c.id.clone()));

            let observed = self.store.observe(&batch, time::now_ms()).await?;
            report.pages += 1;
            report.observed += batch.len() as u64;
            report.inserted += observed.inserted;
            report.refreshed += observed.refreshed;
            debug!(target_id, page, inserted = observed.inserted, refreshed = observed.refreshed, "Refresh page stored");

            if !listing.has_more {
                report.complete = true;
                break;
            }
            page += 1;
        }

        if report.complete {
            report.marked_deleted = self.store.mark_missing(target_id, &seen, time::now_ms()).await?;
        }

        info!(
            target_id,
            pages = report.pages,
            observed = report.observed,
            inserted = report.inserted,
            marked_deleted = report.marked_deleted,
            complete = report.complete,
            "Full refresh finished"
        );
        Ok(report)
    }
}
