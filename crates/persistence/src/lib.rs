#![deny(warnings)]

//! Persistence layer: the load/save contract consumed by the engine, a JSON
//! file store implementing it, offline accrual and installation identity.

use chrono::{DateTime, Utc};
use idle_core::{validate_catalog, validate_config, Business, EngineConfig, UserId, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default directory for local saves.
pub const DEFAULT_DATA_DIR: &str = "./saves";

/// File holding the installation's player id.
pub const USER_ID_FILE: &str = "user_id";

/// Snapshot handed to the engine at session start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub capital: Decimal,
    /// Capital accrued while offline, computed by the store and trusted as-is.
    #[serde(rename = "offlineRewards", with = "rust_decimal::serde::float")]
    pub offline_rewards: Decimal,
    pub businesses: Vec<Business>,
}

/// Full-state overwrite sent at session end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub user_id: UserId,
    #[serde(with = "rust_decimal::serde::float")]
    pub capital: Decimal,
    pub businesses: Vec<Business>,
}

/// Errors reported by a session store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence unavailable")]
    Unavailable(#[from] std::io::Error),
    #[error("corrupt save data")]
    Corrupt(#[from] serde_json::Error),
    #[error("invalid save data")]
    Invalid(#[from] ValidationError),
    #[error("user id {0:?} is not usable as a save key")]
    InvalidUserId(String),
}

/// Load/save collaborator used by session sync.
pub trait SessionStore {
    fn load(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<LoadResponse, PersistenceError>> + Send;

    fn save(
        &self,
        request: &SaveRequest,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// On-disk layout of one player's save.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredSession {
    user_id: UserId,
    #[serde(with = "rust_decimal::serde::float")]
    capital: Decimal,
    businesses: Vec<Business>,
    saved_at: DateTime<Utc>,
}

/// Capital earned by managers over `elapsed_ms` of absence.
///
/// Each managed, unlocked business completes one cycle per
/// `cooldown + buffer_ms`; partial cycles earn nothing. Rewards are derived
/// from the level, never read from the stored field. The total saturates at
/// [`Decimal::MAX`].
pub fn offline_rewards(businesses: &[Business], elapsed_ms: u64, buffer_ms: u64) -> Decimal {
    businesses
        .iter()
        .filter(|b| b.is_managed && b.is_unlocked())
        .filter_map(|b| {
            let period = b.cycle_period_ms(buffer_ms);
            if period == 0 {
                return None;
            }
            let cycles = Decimal::from(elapsed_ms / period);
            Some(cycles.saturating_mul(idle_econ::rewards_at(b.current_level, b.base_rewards)))
        })
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

fn check_user_id(user_id: &UserId) -> Result<(), PersistenceError> {
    let s = user_id.as_str();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(PersistenceError::InvalidUserId(s.to_string()));
    }
    Ok(())
}

/// Session store keeping one JSON file per player under `root`.
///
/// Unknown players are seeded from the catalog with the configured starting
/// capital.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    catalog: Vec<Business>,
    config: EngineConfig,
}

impl JsonFileStore {
    pub fn new(
        root: impl Into<PathBuf>,
        catalog: Vec<Business>,
        config: EngineConfig,
    ) -> Result<Self, PersistenceError> {
        validate_catalog(&catalog)?;
        validate_config(&config)?;
        Ok(Self {
            root: root.into(),
            catalog,
            config,
        })
    }

    fn path_for(&self, user_id: &UserId) -> PathBuf {
        self.root.join(format!("{user_id}.json"))
    }

    fn fresh(&self) -> LoadResponse {
        LoadResponse {
            capital: self.config.starting_capital,
            offline_rewards: Decimal::ZERO,
            businesses: self.catalog.clone(),
        }
    }

    /// Load as of `now`; offline rewards cover `now - saved_at`.
    pub async fn load_at(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LoadResponse, PersistenceError> {
        check_user_id(user_id)?;
        let path = self.path_for(user_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(%user_id, "no save found, seeding from catalog");
                return Ok(self.fresh());
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSession = serde_json::from_slice(&bytes)?;
        validate_catalog(&stored.businesses)?;
        let elapsed_ms = (now - stored.saved_at).num_milliseconds().max(0) as u64;
        let buffer_ms = self.config.cycle_buffer_ms;
        let offline = offline_rewards(&stored.businesses, elapsed_ms, buffer_ms);
        debug!(%user_id, elapsed_ms, %offline, "loaded save");
        Ok(LoadResponse {
            capital: stored.capital,
            offline_rewards: offline,
            businesses: stored.businesses,
        })
    }

    /// Save stamped with `saved_at`. Written to a temp file then renamed.
    pub async fn save_at(
        &self,
        request: &SaveRequest,
        saved_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        check_user_id(&request.user_id)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let stored = StoredSession {
            user_id: request.user_id.clone(),
            capital: request.capital,
            businesses: request.businesses.clone(),
            saved_at,
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;
        let path = self.path_for(&request.user_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(user_id = %request.user_id, path = %path.display(), "saved");
        Ok(())
    }
}

impl SessionStore for JsonFileStore {
    async fn load(&self, user_id: &UserId) -> Result<LoadResponse, PersistenceError> {
        self.load_at(user_id, Utc::now()).await
    }

    async fn save(&self, request: &SaveRequest) -> Result<(), PersistenceError> {
        self.save_at(request, Utc::now()).await
    }
}

/// Return the installation's player id, generating and storing one on first use.
pub async fn load_or_create_user_id(data_dir: &Path) -> Result<UserId, PersistenceError> {
    let path = data_dir.join(USER_ID_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) if !text.trim().is_empty() => {
            let id = UserId(text.trim().to_string());
            check_user_id(&id)?;
            return Ok(id);
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let id = UserId::generate();
    tokio::fs::create_dir_all(data_dir).await?;
    tokio::fs::write(&path, id.as_str()).await?;
    info!(user_id = %id, "generated new user id");
    Ok(id)
}
