// chain/src/network/validator.rs

//! Validator-set bookkeeping independent of any one consensus mechanism:
//! add/remove/power updates plus a history log and uptime stats.
//!
//! Grounded on `original_source/blockchain/network/validator.py`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::ValidatorState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorHistoryEntry {
    pub action: String,
    pub validator: String,
    pub old_power: Option<u64>,
    pub new_power: Option<u64>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorStats {
    pub address: String,
    pub power: u64,
    pub active: bool,
    pub blocks_proposed: u64,
    pub blocks_signed: u64,
    pub uptime_percentage: f64,
}

#[derive(Default)]
pub struct ValidatorManager {
    validators: BTreeMap<String, ValidatorState>,
    validator_history: Vec<ValidatorHistoryEntry>,
}

impl ValidatorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_validator(&mut self, validator: ValidatorState, now: f64) -> bool {
        if self.validators.contains_key(&validator.address) {
            return false;
        }
        self.validator_history.push(ValidatorHistoryEntry {
            action: "add".to_string(),
            validator: validator.address.clone(),
            old_power: None,
            new_power: Some(validator.power),
            timestamp: now,
        });
        self.validators.insert(validator.address.clone(), validator);
        true
    }

    pub fn remove_validator(&mut self, address: &str, now: f64) -> bool {
        let Some(validator) = self.validators.get_mut(address) else {
            return false;
        };
        validator.active = false;
        self.validator_history.push(ValidatorHistoryEntry {
            action: "remove".to_string(),
            validator: address.to_string(),
            old_power: None,
            new_power: None,
            timestamp: now,
        });
        true
    }

    pub fn get_validator(&self, address: &str) -> Option<&ValidatorState> {
        self.validators.get(address)
    }

    pub fn active_validators(&self) -> Vec<&ValidatorState> {
        self.validators.values().filter(|v| v.active).collect()
    }

    pub fn total_voting_power(&self) -> u64 {
        self.active_validators().iter().map(|v| v.power).sum()
    }

    pub fn update_validator_power(&mut self, address: &str, new_power: u64, now: f64) -> bool {
        let Some(validator) = self.validators.get_mut(address) else {
            return false;
        };
        let old_power = validator.power;
        validator.power = new_power;
        self.validator_history.push(ValidatorHistoryEntry {
            action: "update_power".to_string(),
            validator: address.to_string(),
            old_power: Some(old_power),
            new_power: Some(new_power),
            timestamp: now,
        });
        true
    }

    pub fn validator_stats(&self, address: &str) -> Option<ValidatorStats> {
        let validator = self.get_validator(address)?;
        let total_blocks = validator.total_blocks_proposed + validator.total_blocks_signed;
        let uptime_percentage = if total_blocks == 0 {
            100.0
        } else {
            ((validator.total_blocks_signed as f64 / total_blocks as f64) * 100.0).min(100.0)
        };
        Some(ValidatorStats {
            address: validator.address.clone(),
            power: validator.power,
            active: validator.active,
            blocks_proposed: validator.total_blocks_proposed,
            blocks_signed: validator.total_blocks_signed,
            uptime_percentage,
        })
    }

    pub fn history(&self) -> &[ValidatorHistoryEntry] {
        &self.validator_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_validator_is_deactivated_not_deleted() {
        let mut manager = ValidatorManager::new();
        manager.add_validator(ValidatorState::new("0xa", "pub", 10, ""), 0.0);
        manager.remove_validator("0xa", 1.0);
        assert!(!manager.get_validator("0xa").unwrap().active);
    }

    #[test]
    fn total_voting_power_excludes_inactive_validators() {
        let mut manager = ValidatorManager::new();
        manager.add_validator(ValidatorState::new("0xa", "pub", 10, ""), 0.0);
        manager.add_validator(ValidatorState::new("0xb", "pub", 5, ""), 0.0);
        manager.remove_validator("0xb", 1.0);
        assert_eq!(manager.total_voting_power(), 10);
    }

    #[test]
    fn history_records_power_updates() {
        let mut manager = ValidatorManager::new();
        manager.add_validator(ValidatorState::new("0xa", "pub", 10, ""), 0.0);
        manager.update_validator_power("0xa", 20, 1.0);
        assert_eq!(manager.history().len(), 2);
    }
}
