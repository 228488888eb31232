//! Pulling announcement logs out of the ledger in bounded block ranges.
//!
//! A scan over `from..=to` is split into sub-ranges of at most
//! `max_block_range` blocks, fetched with up to `concurrency` queries in
//! flight and yielded in block order. A sub-range the ledger refuses as too
//! wide is bisected until it fits. Transport failures are retried with
//! exponential backoff.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tracing::{debug, instrument, warn};

use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::LedgerReader;
use paystream_core::types::{Announcement, BlockRange};

use crate::config::ScannerConfig;

/// Logs fetched for one sub-range.
#[derive(Debug)]
pub struct RangeBatch {
    /// The sub-range queried
    pub range: BlockRange,
    /// Announcements in block order, or why the range could not be fetched
    pub result: Result<Vec<Announcement>>,
}

/// Read-only announcement source.
///
/// Holds no cursor: every call to [`scan`](Self::scan) is one full pass.
pub struct AnnouncementScanner {
    ledger: Arc<dyn LedgerReader>,
    config: ScannerConfig,
}

impl AnnouncementScanner {
    /// Creates a scanner over `ledger`.
    pub fn new(ledger: Arc<dyn LedgerReader>, config: ScannerConfig) -> Self {
        Self { ledger, config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Splits `from..=to` into the sub-ranges a scan will query.
    ///
    /// Returns nothing when `from > to`.
    pub fn plan(&self, from_block: u64, to_block: u64) -> Vec<BlockRange> {
        match BlockRange::new(from_block, to_block) {
            Ok(range) => range.chunks(self.config.max_block_range),
            Err(_) => Vec::new(),
        }
    }

    /// Streams the logs of `from..=to`, one batch per sub-range, in block order.
    ///
    /// An empty range (`from > to`) yields an empty stream. A failed sub-range
    /// is yielded as an error batch; later sub-ranges are still fetched.
    pub fn scan(&self, from_block: u64, to_block: u64) -> BoxStream<'_, RangeBatch> {
        let ranges = self.plan(from_block, to_block);
        debug!(from_block, to_block, chunks = ranges.len(), "planned scan");

        stream::iter(ranges)
            .map(move |range| async move {
                RangeBatch {
                    range,
                    result: self.fetch_range(range).await,
                }
            })
            .buffered(self.config.concurrency.max(1))
            .boxed()
    }

    /// Collects every announcement in `from..=to`, failing on the first bad sub-range.
    #[instrument(skip(self))]
    pub async fn scan_all(&self, from_block: u64, to_block: u64) -> Result<Vec<Announcement>> {
        let mut batches = self.scan(from_block, to_block);
        let mut announcements = Vec::new();
        while let Some(batch) = batches.next().await {
            announcements.extend(batch.result?);
        }
        Ok(announcements)
    }

    /// Fetches one range, bisecting on `RangeTooLarge`.
    pub fn fetch_range(&self, range: BlockRange) -> BoxFuture<'_, Result<Vec<Announcement>>> {
        async move {
            match self.fetch_with_retry(range).await {
                Err(PaystreamError::RangeTooLarge { from_block, to_block }) => {
                    let (low, high) = range.bisect().ok_or(PaystreamError::RangeTooLarge {
                        from_block,
                        to_block,
                    })?;
                    debug!(%range, "range refused, bisecting");

                    let mut announcements = self.fetch_range(low).await?;
                    announcements.extend(self.fetch_range(high).await?);
                    Ok(announcements)
                }
                other => other,
            }
        }
        .boxed()
    }

    async fn fetch_with_retry(&self, range: BlockRange) -> Result<Vec<Announcement>> {
        let mut attempt = 0u32;
        loop {
            match self
                .ledger
                .announcements(self.config.announcer, range, self.config.scheme_filter)
                .await
            {
                Ok(mut announcements) => {
                    announcements.sort_by_key(|a| (a.block_number, a.log_index));
                    return Ok(announcements);
                }
                Err(PaystreamError::TransportError(reason)) if attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(%range, attempt, ?delay, %reason, "transport error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use paystream_core::types::{AnnouncementBuilder, EthAddress};
    use paystream_ledger::MemoryLedger;
    use test_case::test_case;

    fn announcer() -> EthAddress {
        EthAddress::from_array([0x55; 20])
    }

    fn config() -> ScannerConfig {
        ScannerConfig::new()
            .announcer(announcer())
            .retries(2, Duration::from_millis(1))
    }

    fn make_announcement(n: u8) -> Announcement {
        AnnouncementBuilder::new()
            .stealth_address(EthAddress::from_array([n.max(1); 20]))
            .ephemeral_pub_key(vec![0x02; 33])
            .metadata(vec![n])
            .build()
            .unwrap()
    }

    fn ledger_with(blocks: u8) -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        for n in 1..=blocks {
            ledger.announce(announcer(), make_announcement(n));
        }
        ledger
    }

    #[test_case(0, 99, 10 => 10 ; "even split")]
    #[test_case(0, 100, 10 => 11 ; "remainder")]
    #[test_case(5, 4, 10 => 0 ; "empty range")]
    fn test_plan(from: u64, to: u64, max: u64) -> usize {
        let source = AnnouncementScanner::new(
            Arc::new(MemoryLedger::new()),
            config().max_block_range(max),
        );
        source.plan(from, to).len()
    }

    #[tokio::test]
    async fn test_empty_range_yields_nothing() {
        let ledger = ledger_with(3);
        let source = AnnouncementScanner::new(ledger.clone(), config());

        let all = source.scan_all(10, 9).await.unwrap();
        assert!(all.is_empty());
        assert_eq!(ledger.log_queries(), 0);
    }

    #[tokio::test]
    async fn test_scan_in_block_order_across_chunks() {
        let ledger = ledger_with(40);
        let source = AnnouncementScanner::new(
            ledger.clone(),
            config().max_block_range(7).concurrency(3),
        );

        let all = source.scan_all(1, 40).await.unwrap();
        let blocks: Vec<u64> = all.iter().map(|a| a.block_number).collect();
        assert_eq!(blocks, (1..=40).collect::<Vec<_>>());
        assert_eq!(ledger.log_queries(), 6);
    }

    #[tokio::test]
    async fn test_bisects_when_ledger_refuses_range() {
        let ledger = Arc::new(MemoryLedger::new().with_max_block_range(4));
        for n in 1..=20 {
            ledger.announce(announcer(), make_announcement(n));
        }
        let source = AnnouncementScanner::new(ledger.clone(), config().max_block_range(20));

        let all = source.scan_all(1, 20).await.unwrap();
        assert_eq!(all.len(), 20);
        assert!(ledger.log_queries() > 1);
    }

    #[tokio::test]
    async fn test_retries_transport_errors() {
        let ledger = ledger_with(5);
        ledger.fail_next(2);
        let source = AnnouncementScanner::new(ledger.clone(), config());

        let all = source.scan_all(1, 5).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(ledger.log_queries(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let ledger = ledger_with(5);
        ledger.fail_next(10);
        let source = AnnouncementScanner::new(ledger.clone(), config());

        let err = source.scan_all(1, 5).await.unwrap_err();
        assert!(matches!(err, PaystreamError::TransportError(_)));
        assert!(err.is_recoverable());
        assert_eq!(ledger.log_queries(), 3);
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_stream() {
        let ledger = ledger_with(30);
        ledger.fail_next(1);
        let source = AnnouncementScanner::new(
            ledger,
            config().max_block_range(10).concurrency(1).retries(0, Duration::ZERO),
        );

        let batches: Vec<RangeBatch> = source.scan(1, 30).collect().await;
        assert_eq!(batches.len(), 3);
        assert!(batches[0].result.is_err());
        assert_eq!(batches[1].result.as_ref().unwrap().len(), 10);
        assert_eq!(batches[2].result.as_ref().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_scheme_filter_passed_to_ledger() {
        let ledger = ledger_with(2);
        let mut other = make_announcement(9);
        other.scheme_id = 2;
        ledger.announce(announcer(), other);

        let all = AnnouncementScanner::new(ledger.clone(), config())
            .scan_all(1, 3)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let filtered = AnnouncementScanner::new(ledger, config().scheme_filter(1))
            .scan_all(1, 3)
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
    }
}
