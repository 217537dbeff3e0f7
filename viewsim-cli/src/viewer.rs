//! Drives one simulated viewer session to completion.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use viewsim_engine::{Fetch, PlaybackSession, SessionConfig, SessionError};

use crate::report::Report;

/// Runs one viewer until its session finishes, the token cancels, or a
/// fetch keeps failing past the retry budget. Every fetch is recorded
/// in the returned report, failed attempts included.
pub async fn run_viewer(
    id: usize,
    config: SessionConfig,
    fetch: Arc<dyn Fetch>,
    token: CancellationToken,
    step_retries: u32,
) -> Result<Report, SessionError> {
    let mut session = PlaybackSession::new(config, fetch)?.with_cancellation(token.clone());
    let mut report = Report::default();

    while !token.is_cancelled() {
        let Some(sample) = session.step().await? else {
            info!(viewer = id, played_seconds = session.played_seconds(), "viewer finished");
            break;
        };
        record(id, &mut report, &sample);
        if sample.success {
            continue;
        }

        // The session did not advance past the failed fetch; retry the
        // identical step until it succeeds or the budget runs out.
        let mut recovered = false;
        for attempt in 1..=step_retries {
            if token.is_cancelled() {
                recovered = true;
                break;
            }
            let Some(retry) = session.step().await? else {
                recovered = true;
                break;
            };
            record(id, &mut report, &retry);
            if retry.success {
                recovered = true;
                break;
            }
            warn!(viewer = id, attempt, url = %retry.url, "retry failed");
        }

        if !recovered {
            warn!(viewer = id, "fetch failures exhausted the retry budget, stopping viewer");
            report.aborted_viewers = 1;
            break;
        }
    }

    Ok(report)
}

fn record(id: usize, report: &mut Report, sample: &viewsim_engine::Sample) {
    report.record(sample);
    info!(
        viewer = id,
        label = sample.label(),
        status = sample.status,
        success = sample.success,
        bytes = sample.body_bytes,
        elapsed_ms = sample.elapsed.as_millis() as u64,
        url = %sample.url,
        "sample"
    );
}
