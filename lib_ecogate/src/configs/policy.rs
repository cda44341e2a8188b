//! # Policy Configuration Service
//!
//! Holds the sensitivity policy table and the active capacity overrides behind
//! a single `RwLock`. The service is constructed once at start-up and shared by
//! `Arc`; every update bumps `version` and is written back to disk atomically.
//! Updates are serialised end to end, so the file always holds the newest
//! version and a failed save leaves memory unchanged.
//!
//! Loading never fails hard: a missing file yields the built-in defaults, and
//! an unreadable or corrupt file yields the defaults plus one warning.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AlertLevel, CapacityOverride, SensitivityLevel, SiteId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize policy config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Capacity multiplier must be in (0, 1], got {0}")]
    InvalidMultiplier(f64),

    #[error("Policy config lock poisoned")]
    Poisoned,
}

/// Admission policy for one sensitivity level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityPolicy {
    pub capacity_multiplier: f64,
    pub requires_permit: bool,
    pub requires_briefing: bool,
    pub alert_severity: AlertLevel,
    pub restriction_message: String,
}

impl SensitivityPolicy {
    pub fn default_for(level: SensitivityLevel) -> Self {
        match level {
            SensitivityLevel::Low => Self {
                capacity_multiplier: 1.0,
                requires_permit: false,
                requires_briefing: false,
                alert_severity: AlertLevel::Low,
                restriction_message: "Open to general visitors.".to_string(),
            },
            SensitivityLevel::Medium => Self {
                capacity_multiplier: 0.8,
                requires_permit: false,
                requires_briefing: true,
                alert_severity: AlertLevel::Medium,
                restriction_message: "Visitors must attend a short conservation briefing.".to_string(),
            },
            SensitivityLevel::High => Self {
                capacity_multiplier: 0.5,
                requires_permit: true,
                requires_briefing: true,
                alert_severity: AlertLevel::High,
                restriction_message: "Entry requires a permit and a guided briefing.".to_string(),
            },
            SensitivityLevel::Critical => Self {
                capacity_multiplier: 0.2,
                requires_permit: true,
                requires_briefing: true,
                alert_severity: AlertLevel::Critical,
                restriction_message: "This site is closed to the general public due to critical ecological sensitivity.".to_string(),
            },
        }
    }
}

/// On-disk shape of the policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub policies: BTreeMap<SensitivityLevel, SensitivityPolicy>,
    #[serde(default)]
    pub overrides: BTreeMap<SiteId, CapacityOverride>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let policies = SensitivityLevel::ALL
            .iter()
            .map(|level| (*level, SensitivityPolicy::default_for(*level)))
            .collect();
        Self {
            version: 1,
            updated_at: Utc::now(),
            policies,
            overrides: BTreeMap::new(),
        }
    }
}

impl PolicyConfig {
    /// Fills in any sensitivity level the file omitted and drops invalid multipliers.
    fn normalized(mut self) -> Self {
        for level in SensitivityLevel::ALL {
            let valid = self
                .policies
                .get(&level)
                .map_or(false, |p| valid_multiplier(p.capacity_multiplier));
            if !valid {
                self.policies.insert(level, SensitivityPolicy::default_for(level));
            }
        }
        self.overrides.retain(|_, o| valid_multiplier(o.multiplier));
        self
    }
}

fn valid_multiplier(m: f64) -> bool {
    m.is_finite() && m > 0.0 && m <= 1.0
}

/// # Policy Service
///
/// Owned, thread-safe configuration object. Reads take a short read lock and
/// clone what they need; nothing holds the lock across an await.
#[derive(Debug)]
pub struct PolicyService {
    path: Option<PathBuf>,
    inner: RwLock<PolicyConfig>,
    /// Held across apply and save by every writer.
    persist: Mutex<()>,
}

impl PolicyService {
    /// Service with the built-in defaults and no backing file.
    pub fn in_memory() -> Self {
        Self::from_config(PolicyConfig::default(), None)
    }

    pub fn from_config(config: PolicyConfig, path: Option<PathBuf>) -> Self {
        Self {
            path,
            inner: RwLock::new(config.normalized()),
            persist: Mutex::new(()),
        }
    }

    /// Loads the policy file at `path`, falling back to defaults when it is
    /// missing or corrupt. Later saves target the same path.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let config = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<PolicyConfig>(&raw) {
                Ok(config) => {
                    info!(path = %path.display(), version = config.version, "Loaded capacity policy config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt policy config, using defaults");
                    PolicyConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Policy config not found, using defaults");
                PolicyConfig::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable policy config, using defaults");
                PolicyConfig::default()
            }
        };
        Self::from_config(config, Some(path))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn policy(&self, level: SensitivityLevel) -> SensitivityPolicy {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.policies.get(&level).cloned())
            .unwrap_or_else(|| SensitivityPolicy::default_for(level))
    }

    pub fn override_for(&self, site_id: &str) -> Option<CapacityOverride> {
        self.inner.read().ok().and_then(|c| c.overrides.get(site_id).cloned())
    }

    pub fn version(&self) -> u64 {
        self.inner.read().map(|c| c.version).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Result<PolicyConfig, ConfigError> {
        self.inner.read().map(|c| c.clone()).map_err(|_| ConfigError::Poisoned)
    }

    pub fn set_policy(&self, level: SensitivityLevel, policy: SensitivityPolicy) -> Result<u64, ConfigError> {
        if !valid_multiplier(policy.capacity_multiplier) {
            return Err(ConfigError::InvalidMultiplier(policy.capacity_multiplier));
        }
        self.update(|c| {
            c.policies.insert(level, policy);
        })
    }

    /// Installs or replaces the override for a site.
    pub fn set_capacity_override(
        &self,
        site_id: &str,
        multiplier: f64,
        active: bool,
        expires_at: Option<DateTime<Utc>>,
        author: &str,
    ) -> Result<CapacityOverride, ConfigError> {
        if !valid_multiplier(multiplier) {
            return Err(ConfigError::InvalidMultiplier(multiplier));
        }
        let entry = CapacityOverride {
            site_id: site_id.to_string(),
            multiplier,
            active,
            expires_at,
            author: author.to_string(),
            created_at: Utc::now(),
        };
        let stored = entry.clone();
        self.update(move |c| {
            c.overrides.insert(stored.site_id.clone(), stored);
        })?;
        info!(site_id, multiplier, active, author, "Capacity override set");
        Ok(entry)
    }

    /// Removes the override for a site. Returns whether one existed.
    pub fn clear_capacity_override(&self, site_id: &str) -> Result<bool, ConfigError> {
        let mut existed = false;
        self.update(|c| {
            existed = c.overrides.remove(site_id).is_some();
        })?;
        if existed {
            info!(site_id, "Capacity override cleared");
        }
        Ok(existed)
    }

    /// Applies `f`, bumps the version and persists. Readers only wait for the
    /// in-memory swap; writers queue on `persist` until the file is written.
    /// When the save fails the previous configuration is restored.
    fn update<F>(&self, f: F) -> Result<u64, ConfigError>
    where
        F: FnOnce(&mut PolicyConfig),
    {
        let _persist = self.persist.lock().map_err(|_| ConfigError::Poisoned)?;
        let (previous, snapshot) = {
            let mut guard = self.inner.write().map_err(|_| ConfigError::Poisoned)?;
            let previous = guard.clone();
            f(&mut guard);
            guard.version += 1;
            guard.updated_at = Utc::now();
            (previous, guard.clone())
        };
        if let Some(path) = &self.path {
            if let Err(e) = save_atomic(path, &snapshot) {
                warn!(path = %path.display(), error = %e, version = snapshot.version, "Policy save failed, reverting");
                let mut guard = self.inner.write().map_err(|_| ConfigError::Poisoned)?;
                *guard = previous;
                return Err(e);
            }
        }
        Ok(snapshot.version)
    }

    /// Writes the current configuration to the backing file, if any.
    pub fn save(&self) -> Result<(), ConfigError> {
        let _persist = self.persist.lock().map_err(|_| ConfigError::Poisoned)?;
        let snapshot = self.snapshot()?;
        match &self.path {
            Some(path) => save_atomic(path, &snapshot),
            None => Ok(()),
        }
    }
}

fn save_atomic(path: &Path, config: &PolicyConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;
    let body = serde_json::to_vec_pretty(config)?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(&body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
