//! Sequential bulk dispatch: one DM attempt per target, an optional pause
//! between targets, and a per-target tally that never aborts the run.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    domain::{DispatchResult, UserId},
    platform::PlatformSession,
};

enum Attempt {
    Sent,
    SkippedBot,
    Failed,
}

/// Send `message` to every target in order and return the tally.
///
/// A target that fails to resolve or whose send is rejected lands in
/// `failed_ids`; a target that resolves to a bot account is skipped and
/// counted in neither bucket. When `delay_ms` is set, the loop pauses
/// that long after every target except the last, whatever its outcome.
pub async fn send_bulk(
    session: &dyn PlatformSession,
    targets: &[UserId],
    message: &str,
    delay_ms: Option<u64>,
) -> DispatchResult {
    let mut tally = DispatchResult::default();

    for (index, id) in targets.iter().enumerate() {
        match attempt(session, id, message).await {
            Attempt::Sent => tally.success_count += 1,
            Attempt::SkippedBot => {}
            Attempt::Failed => {
                tally.failed_count += 1;
                tally.failed_ids.push(id.clone());
            }
        }
        if let Some(ms) = delay_ms {
            if ms > 0 && index + 1 < targets.len() {
                sleep(Duration::from_millis(ms)).await;
            }
        }
    }

    debug!(
        sent = tally.success_count,
        failed = tally.failed_count,
        "bulk dispatch finished"
    );
    tally
}

async fn attempt(session: &dyn PlatformSession, id: &UserId, message: &str) -> Attempt {
    let user = match session.resolve_user(id).await {
        Ok(user) => user,
        Err(e) => {
            warn!(user = %id, "target did not resolve: {e}");
            return Attempt::Failed;
        }
    };
    if user.is_bot {
        debug!(user = %id, "skipping bot target");
        return Attempt::SkippedBot;
    }
    match session.send_dm(id, message).await {
        Ok(()) => Attempt::Sent,
        Err(e) => {
            warn!(user = %id, "dm send failed: {e}");
            Attempt::Failed
        }
    }
}
