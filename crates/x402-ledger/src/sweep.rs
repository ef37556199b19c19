//! Expiry sweep: reclaim ISSUED authorizations whose grace has ended.

use tracing::{debug, info, warn};

use x402_contracts::{commitment::SweepReport, error::SequencerResult, reclaim::ReclaimRequest};

use crate::{ledger::Ledger, store};

/// Authorizations read per page of the expiry scan.
pub const SWEEP_BATCH_LIMIT: usize = 500;

impl Ledger {
    /// Reclaim every expired authorization, scanning in pages of
    /// [`SWEEP_BATCH_LIMIT`].
    ///
    /// Each reclaim is its own transaction. A failure for one auth id is
    /// logged, recorded in the report, and skipped; the scan pages past it by
    /// `log_seq_no`, so ids that keep failing never hide later ones.
    pub fn sweep_expired(&self) -> SequencerResult<SweepReport> {
        self.sweep_expired_paged(SWEEP_BATCH_LIMIT)
    }

    pub(crate) fn sweep_expired_paged(&self, page_size: usize) -> SequencerResult<SweepReport> {
        let now = self.now();
        let mut report = SweepReport::default();
        let mut after_seq = 0;

        loop {
            let page = self.transact(|tx| store::expired_issued_auth_ids(tx, now, after_seq, page_size))?;
            let Some((last_seq, _)) = page.last() else {
                break;
            };
            after_seq = *last_seq;
            let full = page.len() == page_size;

            for (_, auth_id) in page {
                let request = ReclaimRequest::by_sequencer(auth_id.clone(), now);
                match self.reclaim_authorization(&request, None, true) {
                    Ok(_) => report.reclaimed.push(auth_id),
                    Err(e) => {
                        warn!(auth_id = %auth_id, code = e.code(), error = %e, "sweep reclaim failed, skipping");
                        report.failed.push((auth_id, e.code().to_string()));
                    }
                }
            }
            if !full {
                break;
            }
        }

        if report.reclaimed.is_empty() && report.failed.is_empty() {
            debug!("no expired authorizations");
            return Ok(report);
        }

        info!(
            reclaimed = report.reclaimed.len(),
            failed = report.failed.len(),
            "expiry sweep finished"
        );
        Ok(report)
    }
}
