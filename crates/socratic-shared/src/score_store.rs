//! Persisted builder score.
//!
//! Stored as a small JSON file next to a checksum of the value. The checksum
//! catches someone editing the number by hand; it is not a security
//! boundary (the salt is public and SHA-256 is unkeyed).

use crate::error::SocraticError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name inside the state directory
pub const SCORE_FILE: &str = "score.json";

const CHECKSUM_SALT: &str = "socratic:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredScore {
    pub score: f64,
    pub checksum: String,
    pub updated_at: DateTime<Utc>,
}

/// Checksum of a score value: first 16 hex chars of SHA-256.
pub fn checksum(score: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CHECKSUM_SALT.as_bytes());
    hasher.update(format!("{:.3}", score).as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[derive(Debug, Clone)]
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SCORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the score. Missing, unreadable or tampered files load as 0.0.
    pub fn load(&self) -> f64 {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(_) => return 0.0,
        };
        let stored: StoredScore = match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                warn!("Score file {} unreadable ({}), starting at 0", self.path.display(), e);
                return 0.0;
            }
        };
        if !stored.score.is_finite() || stored.checksum != checksum(stored.score) {
            warn!("Score file {} failed checksum, starting at 0", self.path.display());
            return 0.0;
        }
        stored.score
    }

    pub fn save(&self, score: f64) -> Result<(), SocraticError> {
        if !score.is_finite() {
            return Err(SocraticError::ScoreStore(format!("refusing to store {}", score)));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredScore {
            score,
            checksum: checksum(score),
            updated_at: Utc::now(),
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&stored)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn reset(&self) -> Result<(), SocraticError> {
        self.save(0.0)
    }
}
