// ABOUTME: Post-start readiness polling for the deployed service.
// ABOUTME: Concludes with VerifiedUp or VerificationTimedOut, never silently.

use std::time::Duration;
use tokio::time::Instant;

use super::remote::{Remote, RemoteError};

/// Delay between readiness probes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    VerifiedUp,
    VerificationTimedOut,
}

/// Probe `port` on the remote until it answers or `wait` has elapsed.
///
/// The first probe runs immediately, so a zero window still checks once.
/// Transport errors end the wait early and are returned as-is.
pub async fn verify<R: Remote + ?Sized>(
    remote: &R,
    port: u16,
    wait: Duration,
) -> Result<VerificationOutcome, RemoteError> {
    let deadline = Instant::now() + wait;

    loop {
        if remote.probe(port).await? {
            tracing::debug!(session = remote.label(), port, "service is up");
            return Ok(VerificationOutcome::VerifiedUp);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(VerificationOutcome::VerificationTimedOut);
        }

        tracing::trace!(session = remote.label(), port, "service not ready yet");
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
