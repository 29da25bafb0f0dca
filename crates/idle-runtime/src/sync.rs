//! Session sync: build an engine from the load collaborator and hand the
//! final snapshot to the save collaborator.

use crate::engine::Engine;
use anyhow::{Context, Result};
use idle_core::{validate_config, validate_session, EngineConfig, Session, UserId};
use persistence::SessionStore;
use tracing::{info, warn};

/// Load the player's session, credit offline rewards, normalize, and resume
/// automation for managed businesses.
///
/// A load failure leaves nothing to play and is returned to the caller.
/// Stale cooldown state in the save is not an error; normalization resets it.
pub async fn load_session<S: SessionStore>(
    store: &S,
    user_id: UserId,
    config: EngineConfig,
) -> Result<Engine> {
    validate_config(&config).context("engine config is invalid")?;
    let loaded = store
        .load(&user_id)
        .await
        .with_context(|| format!("failed to load session for {user_id}"))?;
    let capital = loaded.capital.saturating_add(loaded.offline_rewards);
    let session = Session::new(user_id, capital, loaded.businesses);
    validate_session(&session).context("loaded session is invalid")?;
    info!(
        user_id = %session.user_id,
        capital = %loaded.capital,
        offline_rewards = %loaded.offline_rewards,
        businesses = session.businesses.len(),
        "session loaded"
    );
    let mut engine = Engine::new(session, config);
    engine.resume_automation();
    Ok(engine)
}

/// Stop all timers and send the full snapshot. Best-effort: a failed save is
/// logged and reported as `false`, never retried.
pub async fn end_session<S: SessionStore>(store: &S, engine: &mut Engine) -> bool {
    engine.shutdown();
    let snapshot = engine.snapshot();
    match store.save(&snapshot).await {
        Ok(()) => {
            info!(user_id = %snapshot.user_id, capital = %snapshot.capital, "session saved");
            true
        }
        Err(err) => {
            warn!(
                user_id = %snapshot.user_id,
                %err,
                "final save failed, progress since last save is lost"
            );
            false
        }
    }
}
