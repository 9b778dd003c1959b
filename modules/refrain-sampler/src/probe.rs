use std::sync::Arc;

use tracing::{info, warn};

use refrain_common::{time, RefrainError, Result, TargetRecord};
use refrain_store::CommentStore;

use crate::pacing::Pacer;
use crate::retry::{PageOutcome, RetryPolicy};
use crate::traits::CommentSource;

/// Asks the upstream for the authoritative comment total of a target and
/// remembers it on the target record.
pub struct SourceProbe {
    source: Arc<dyn CommentSource>,
    store: Arc<dyn CommentStore>,
    retry: RetryPolicy,
}

impl SourceProbe {
    pub fn new(source: Arc<dyn CommentSource>, store: Arc<dyn CommentStore>, retry: RetryPolicy) -> Self {
        Self { source, store, retry }
    }

    pub async fn total(&self, target_id: &str, pacer: &Pacer) -> Result<u64> {
        let source = &*self.source;
        let total = match self.retry.fetch(pacer, move || source.total_count(target_id)).await? {
            PageOutcome::Fetched(total) => total,
            PageOutcome::Abandoned(reason) => {
                warn!(target_id, error = %reason, "Total count probe failed");
                return Err(RefrainError::Upstream(format!(
                    "total count probe for {target_id} failed: {reason}"
                )));
            }
        };

        let mut record = self
            .store
            .target(target_id)
            .await?
            .unwrap_or_else(|| TargetRecord::new(target_id));
        record.api_total = Some(total as i64);
        record.updated_at_ms = time::now_ms();
        self.store.upsert_target(&record).await?;

        info!(target_id, api_total = total, "Probed upstream total");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FetchFailure;
    use crate::testing::MockSource;
    use refrain_store::MemoryStore;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn probe_records_total_on_the_target() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockSource::new().with_total(4321));
        let probe = SourceProbe::new(source, store.clone(), fast_retry());

        assert_eq!(probe.total("song", &Pacer::none()).await.unwrap(), 4321);
        let record = store.target("song").await.unwrap().unwrap();
        assert_eq!(record.api_total, Some(4321));
    }

    #[tokio::test]
    async fn exhausted_probe_is_an_upstream_error() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            MockSource::new()
                .with_total(10)
                .failing_total(FetchFailure::Transient("502".into()), 5),
        );
        let probe = SourceProbe::new(source, store, fast_retry());

        let err = probe.total("song", &Pacer::none()).await.unwrap_err();
        assert!(matches!(err, RefrainError::Upstream(_)));
    }

    #[tokio::test]
    async fn missing_total_fails_without_touching_the_target() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(
            MockSource::new()
                .with_total(10)
                .failing_total(FetchFailure::Malformed("listing response carried no total".into()), 1),
        );
        let probe = SourceProbe::new(source, store.clone(), fast_retry());

        let err = probe.total("song", &Pacer::none()).await.unwrap_err();
        assert!(matches!(err, RefrainError::Upstream(_)));
        assert!(store.target("song").await.unwrap().is_none());
    }
}
