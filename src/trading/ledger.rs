//! Idempotency-key ledger.
//!
//! Maps each submission key to the state of its last attempt. A ledger opened
//! on a file rereads it before every change and writes it back afterwards, so
//! separate invocations sharing the file see each other's keys.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::restrict_permissions;
use crate::error::{ConfigError, TradingError};

use super::result::TradeResult;

/// State recorded for one idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum KeyState {
    /// Claimed; the order may be on its way to the venue.
    InFlight,
    /// The order may have reached the venue, but no answer came back.
    OutcomeUnknown,
    /// The venue accepted the order.
    Accepted(TradeResult),
}

/// Result of claiming a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// Key was unused and is now in flight.
    Fresh,
    /// Key already produced an accepted order.
    Recorded(TradeResult),
    /// Key is blocked; the reason says why.
    Refused(&'static str),
}

/// Submission ledger, in memory or backed by a JSON file.
#[derive(Debug, Default)]
pub struct SubmissionLedger {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<Uuid, KeyState>>,
}

impl SubmissionLedger {
    /// Ledger that lives as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Ledger persisted at `path`; the file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let entries = read_entries(&path)?;
        debug!(path = %path.display(), keys = entries.len(), "Submission ledger opened");
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Recorded state of `key`.
    pub fn state(&self, key: Uuid) -> Option<KeyState> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Mark `key` in flight unless it was used before.
    ///
    /// Fails when the claim cannot be written, so nothing is sent unrecorded.
    pub fn claim(&self, key: Uuid) -> Result<Claim, TradingError> {
        self.update(|entries| match entries.get(&key) {
            None => {
                entries.insert(key, KeyState::InFlight);
                Claim::Fresh
            }
            Some(KeyState::Accepted(result)) => Claim::Recorded(result.clone()),
            Some(KeyState::InFlight) => {
                Claim::Refused("a submission with this key is in flight or was interrupted")
            }
            Some(KeyState::OutcomeUnknown) => {
                Claim::Refused("a previous submission with this key may have reached the venue")
            }
        })
        .map_err(|e| TradingError::Ledger(e.to_string()))
    }

    /// Record the final state of `key`.
    pub fn record(&self, key: Uuid, state: KeyState) {
        if let Err(e) = self.update(|entries| {
            entries.insert(key, state);
        }) {
            warn!(key = %key, error = %e, "Could not persist submission state");
        }
    }

    /// Forget `key` so it may be used again.
    pub fn release(&self, key: Uuid) {
        if let Err(e) = self.update(|entries| {
            entries.remove(&key);
        }) {
            warn!(key = %key, error = %e, "Could not release submission key");
        }
    }

    /// Apply `change` to the latest entries and persist them.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut HashMap<Uuid, KeyState>) -> R,
    ) -> Result<R, ConfigError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(path) = &self.path else {
            return Ok(change(&mut entries));
        };

        *entries = read_entries(path)?;
        let outcome = change(&mut entries);
        write_entries(path, &entries)?;
        Ok(outcome)
    }
}

fn read_entries(path: &Path) -> Result<HashMap<Uuid, KeyState>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

/// Write through a sibling temp file so readers never see a partial ledger.
fn write_entries(path: &Path, entries: &HashMap<Uuid, KeyState>) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
    restrict_permissions(&tmp)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::result::{TradeDetails, TradeStatus};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn accepted(key: Uuid) -> TradeResult {
        TradeResult::accepted(
            TradeDetails {
                outcome: "Yes".to_string(),
                amount: dec!(12),
                shares: dec!(30),
                price: dec!(0.4),
                idempotency_key: key,
            },
            "0xorder",
            TradeStatus::Completed,
        )
    }

    #[test]
    fn in_memory_claim_lifecycle() {
        let ledger = SubmissionLedger::in_memory();
        let key = Uuid::new_v4();

        assert_eq!(ledger.claim(key).unwrap(), Claim::Fresh);
        assert!(matches!(ledger.claim(key).unwrap(), Claim::Refused(_)));

        ledger.release(key);
        assert_eq!(ledger.claim(key).unwrap(), Claim::Fresh);

        let result = accepted(key);
        ledger.record(key, KeyState::Accepted(result.clone()));
        assert_eq!(ledger.claim(key).unwrap(), Claim::Recorded(result));
        assert!(ledger.path().is_none());
    }

    #[test]
    fn file_ledger_is_shared_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.json");
        let first = SubmissionLedger::open(&path).unwrap();
        let second = SubmissionLedger::open(&path).unwrap();

        let timed_out = Uuid::new_v4();
        assert_eq!(first.claim(timed_out).unwrap(), Claim::Fresh);
        first.record(timed_out, KeyState::OutcomeUnknown);

        let done = Uuid::new_v4();
        assert_eq!(second.claim(done).unwrap(), Claim::Fresh);
        second.record(done, KeyState::Accepted(accepted(done)));

        assert!(matches!(second.claim(timed_out).unwrap(), Claim::Refused(_)));
        match first.claim(done).unwrap() {
            Claim::Recorded(result) => {
                assert_eq!(result.order_id, "0xorder");
                assert_eq!(result.shares_purchased, dec!(30));
            }
            other => panic!("expected recorded result, got {other:?}"),
        }
    }

    #[test]
    fn reopened_ledger_keeps_states() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("submissions.json");
        let key = Uuid::new_v4();
        {
            let ledger = SubmissionLedger::open(&path).unwrap();
            ledger.claim(key).unwrap();
        }

        let reopened = SubmissionLedger::open(&path).unwrap();
        assert_eq!(reopened.state(key), Some(KeyState::InFlight));
        assert!(matches!(reopened.claim(key).unwrap(), Claim::Refused(_)));
    }

    #[test]
    fn corrupt_file_refuses_claims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.json");
        let ledger = SubmissionLedger::open(&path).unwrap();
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ledger.claim(Uuid::new_v4()),
            Err(TradingError::Ledger(_))
        ));
    }
}
