// chain/src/permissions/mls.rs

//! Multi-level clearance lattice: levels `[1, L]`, a pinned-at-top
//! creator, promotion/demotion authority rules, and no-read-up data
//! access.
//!
//! Grounded on `original_source/blockchain/permissions/multi_level.py`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum MlsError {
    InvalidLevelCount(u8),
}

impl fmt::Display for MlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlsError::InvalidLevelCount(n) => {
                write!(f, "number of levels must be between 2 and 10, got {n}")
            }
        }
    }
}

impl std::error::Error for MlsError {}

const DEFAULT_LEVEL_NAMES: [&str; 10] = [
    "Public",
    "Internal",
    "Confidential",
    "Secret",
    "Top Secret",
    "Critical",
    "Ultra Secret",
    "Maximum Secret",
    "Cosmic Top Secret",
    "Beyond Black",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityClassification {
    pub level: u8,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAccessRecord {
    pub reader: String,
    pub time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataItem {
    pub data_id: String,
    pub content: serde_json::Value,
    pub security_level: u8,
    pub owner: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: f64,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub access_log: Vec<DataAccessRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlsAuditEntry {
    pub action: String,
    pub actor: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiLevelPermissionSystem {
    pub num_levels: u8,
    pub max_level: u8,
    pub min_level: u8,
    pub creator_address: String,
    user_levels: BTreeMap<String, u8>,
    classifications: BTreeMap<u8, SecurityClassification>,
    data_store: BTreeMap<String, DataItem>,
    audit_log: Vec<MlsAuditEntry>,
    default_level: u8,
}

impl MultiLevelPermissionSystem {
    pub fn new(
        num_levels: u8,
        creator_address: impl Into<String>,
        level_names: Option<&[&str]>,
        timestamp: f64,
    ) -> Result<Self, MlsError> {
        if !(2..=10).contains(&num_levels) {
            return Err(MlsError::InvalidLevelCount(num_levels));
        }
        let creator_address = creator_address.into();
        let mut user_levels = BTreeMap::new();
        user_levels.insert(creator_address.clone(), num_levels);

        let names: Vec<String> = match level_names {
            Some(names) if names.len() == num_levels as usize => {
                names.iter().map(|s| s.to_string()).collect()
            }
            _ => DEFAULT_LEVEL_NAMES[..num_levels as usize].iter().map(|s| s.to_string()).collect(),
        };
        let mut classifications = BTreeMap::new();
        for level in 1..=num_levels {
            classifications.insert(
                level,
                SecurityClassification {
                    level,
                    name: names[(level - 1) as usize].clone(),
                    description: format!("Security level {level}"),
                },
            );
        }

        let mut system = MultiLevelPermissionSystem {
            num_levels,
            max_level: num_levels,
            min_level: 1,
            creator_address: creator_address.clone(),
            user_levels,
            classifications,
            data_store: BTreeMap::new(),
            audit_log: Vec::new(),
            default_level: 1,
        };
        let mut details = serde_json::Map::new();
        details.insert("num_levels".into(), serde_json::json!(num_levels));
        details.insert("creator".into(), serde_json::json!(creator_address));
        system.log_action("system_init", &system.creator_address.clone(), details, timestamp);
        Ok(system)
    }

    fn log_action(&mut self, action: &str, actor: &str, details: serde_json::Map<String, serde_json::Value>, timestamp: f64) {
        self.audit_log.push(MlsAuditEntry {
            action: action.to_string(),
            actor: actor.to_string(),
            details,
            timestamp,
        });
    }

    /// Unregistered addresses are auto-registered at `default_level` (1).
    pub fn get_user_level(&mut self, address: &str) -> u8 {
        if !self.user_levels.contains_key(address) {
            self.user_levels.insert(address.to_string(), self.default_level);
            let mut details = serde_json::Map::new();
            details.insert("level".into(), serde_json::json!(self.default_level));
            details.insert("auto_assigned".into(), serde_json::json!(true));
            self.log_action("user_registered", address, details, 0.0);
        }
        self.user_levels[address]
    }

    /// Raises `target_address` to `new_level`. The creator may promote
    /// anyone to any level; otherwise the promoter must outrank the
    /// target's current level and may not promote above its own level.
    pub fn promote_user(&mut self, promoter_address: &str, target_address: &str, new_level: u8, timestamp: f64) -> bool {
        if new_level < self.min_level || new_level > self.max_level {
            return false;
        }
        let target_current = self.get_user_level(target_address);
        if new_level <= target_current {
            return false;
        }
        if promoter_address == self.creator_address {
            self.set_level(promoter_address, target_address, target_current, new_level, "promote", true, timestamp);
            return true;
        }
        let promoter_level = self.get_user_level(promoter_address);
        if promoter_level <= target_current || new_level > promoter_level {
            return false;
        }
        self.set_level(promoter_address, target_address, target_current, new_level, "promote", false, timestamp);
        true
    }

    /// Lowers `target_address` to `new_level`. The creator can never be
    /// demoted, even by itself.
    pub fn demote_user(&mut self, demoter_address: &str, target_address: &str, new_level: u8, timestamp: f64) -> bool {
        if target_address == self.creator_address {
            return false;
        }
        if new_level < self.min_level || new_level > self.max_level {
            return false;
        }
        let target_current = self.get_user_level(target_address);
        if new_level >= target_current {
            return false;
        }
        if demoter_address == self.creator_address {
            self.set_level(demoter_address, target_address, target_current, new_level, "demote", true, timestamp);
            return true;
        }
        let demoter_level = self.get_user_level(demoter_address);
        if demoter_level <= target_current {
            return false;
        }
        self.set_level(demoter_address, target_address, target_current, new_level, "demote", false, timestamp);
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn set_level(&mut self, actor: &str, target: &str, old_level: u8, new_level: u8, action: &str, by_creator: bool, timestamp: f64) {
        self.user_levels.insert(target.to_string(), new_level);
        let mut details = serde_json::Map::new();
        details.insert("target".into(), serde_json::json!(target));
        details.insert("old_level".into(), serde_json::json!(old_level));
        details.insert("new_level".into(), serde_json::json!(new_level));
        if by_creator {
            details.insert("by_creator".into(), serde_json::json!(true));
        }
        self.log_action(action, actor, details, timestamp);
    }

    /// No-read-up: a user may access data at or below their own level.
    pub fn can_access_data(&mut self, user_address: &str, security_level: u8) -> bool {
        self.get_user_level(user_address) >= security_level
    }

    pub fn store_data(
        &mut self,
        data_id: impl Into<String>,
        content: serde_json::Value,
        security_level: u8,
        owner_address: &str,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
        timestamp: f64,
    ) -> bool {
        if security_level < self.min_level || security_level > self.max_level {
            return false;
        }
        if self.get_user_level(owner_address) < security_level {
            return false;
        }
        let data_id = data_id.into();
        self.data_store.insert(
            data_id.clone(),
            DataItem {
                data_id: data_id.clone(),
                content,
                security_level,
                owner: owner_address.to_string(),
                metadata: metadata.unwrap_or_default(),
                created_at: timestamp,
                access_count: 0,
                access_log: Vec::new(),
            },
        );
        let mut details = serde_json::Map::new();
        details.insert("data_id".into(), serde_json::json!(data_id));
        details.insert("security_level".into(), serde_json::json!(security_level));
        self.log_action("store_data", owner_address, details, timestamp);
        true
    }

    pub fn access_data(&mut self, user_address: &str, data_id: &str, timestamp: f64) -> Option<serde_json::Value> {
        let security_level = self.data_store.get(data_id)?.security_level;
        if !self.can_access_data(user_address, security_level) {
            let user_level = self.get_user_level(user_address);
            let mut details = serde_json::Map::new();
            details.insert("data_id".into(), serde_json::json!(data_id));
            details.insert("required_level".into(), serde_json::json!(security_level));
            details.insert("user_level".into(), serde_json::json!(user_level));
            self.log_action("access_denied", user_address, details, timestamp);
            return None;
        }
        let item = self.data_store.get_mut(data_id)?;
        item.access_count += 1;
        item.access_log.push(DataAccessRecord { reader: user_address.to_string(), time: timestamp });
        let content = item.content.clone();
        let mut details = serde_json::Map::new();
        details.insert("data_id".into(), serde_json::json!(data_id));
        details.insert("security_level".into(), serde_json::json!(security_level));
        self.log_action("access_data", user_address, details, timestamp);
        Some(content)
    }

    pub fn accessible_data(&mut self, user_address: &str) -> Vec<&DataItem> {
        let user_level = self.get_user_level(user_address);
        self.data_store.values().filter(|item| user_level >= item.security_level).collect()
    }

    pub fn users_by_level(&self, level: u8) -> Vec<&str> {
        self.user_levels
            .iter()
            .filter(|(_, &lvl)| lvl == level)
            .map(|(addr, _)| addr.as_str())
            .collect()
    }

    pub fn level_statistics(&self) -> BTreeMap<u8, u64> {
        let mut stats: BTreeMap<u8, u64> = (self.min_level..=self.max_level).map(|l| (l, 0)).collect();
        for &level in self.user_levels.values() {
            *stats.entry(level).or_insert(0) += 1;
        }
        stats
    }

    pub fn classification(&self, level: u8) -> Option<&SecurityClassification> {
        self.classifications.get(&level)
    }

    pub fn audit_log(&self, actor: Option<&str>, action: Option<&str>, limit: Option<usize>) -> Vec<&MlsAuditEntry> {
        let filtered: Vec<&MlsAuditEntry> = self
            .audit_log
            .iter()
            .filter(|e| actor.is_none_or(|a| e.actor == a))
            .filter(|e| action.is_none_or(|act| e.action == act))
            .collect();
        match limit {
            Some(n) if n < filtered.len() => filtered[filtered.len() - n..].to_vec(),
            _ => filtered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> MultiLevelPermissionSystem {
        MultiLevelPermissionSystem::new(5, "0xcreator", None, 0.0).unwrap()
    }

    #[test]
    fn rejects_out_of_range_level_counts() {
        assert!(matches!(
            MultiLevelPermissionSystem::new(1, "0xc", None, 0.0),
            Err(MlsError::InvalidLevelCount(1))
        ));
        assert!(matches!(
            MultiLevelPermissionSystem::new(11, "0xc", None, 0.0),
            Err(MlsError::InvalidLevelCount(11))
        ));
    }

    #[test]
    fn creator_is_pinned_at_max_level() {
        let mut sys = system();
        assert_eq!(sys.get_user_level("0xcreator"), 5);
    }

    #[test]
    fn new_user_defaults_to_level_one() {
        let mut sys = system();
        assert_eq!(sys.get_user_level("0xnew"), 1);
    }

    #[test]
    fn creator_can_promote_anyone_to_any_level() {
        let mut sys = system();
        assert!(sys.promote_user("0xcreator", "0xuser", 5, 0.0));
        assert_eq!(sys.get_user_level("0xuser"), 5);
    }

    #[test]
    fn peer_cannot_promote_above_own_level() {
        let mut sys = system();
        sys.promote_user("0xcreator", "0xmid", 3, 0.0);
        assert!(!sys.promote_user("0xmid", "0xtarget", 4, 0.0));
        assert!(sys.promote_user("0xmid", "0xtarget", 2, 0.0));
    }

    #[test]
    fn creator_cannot_be_demoted() {
        let mut sys = system();
        assert!(!sys.demote_user("0xcreator", "0xcreator", 1, 0.0));
    }

    #[test]
    fn no_read_up_enforced() {
        let mut sys = system();
        sys.store_data("d1", serde_json::json!("secret"), 4, "0xcreator", None, 0.0);
        assert!(sys.access_data("0xlow", "d1", 1.0).is_none());
        assert!(sys.access_data("0xcreator", "d1", 1.0).is_some());
    }

    #[test]
    fn promote_rejects_a_demotion_disguised_as_promote() {
        let mut sys = system();
        sys.promote_user("0xcreator", "0xuser", 3, 0.0);
        assert!(!sys.promote_user("0xcreator", "0xuser", 2, 0.0));
        assert_eq!(sys.get_user_level("0xuser"), 3);
    }

    #[test]
    fn successful_access_appends_to_the_item_reader_log() {
        let mut sys = system();
        sys.store_data("doc-1", serde_json::json!("secret"), 5, "0xcreator", None, 0.0);
        assert!(sys.access_data("0xcreator", "doc-1", 1.0).is_some());
        assert!(sys.access_data("0xcreator", "doc-1", 2.0).is_some());

        let item = sys.data_store.get("doc-1").unwrap();
        assert_eq!(item.access_count, 2);
        assert_eq!(
            item.access_log,
            vec![
                DataAccessRecord { reader: "0xcreator".to_string(), time: 1.0 },
                DataAccessRecord { reader: "0xcreator".to_string(), time: 2.0 },
            ]
        );
    }

    #[test]
    fn denied_access_does_not_append_to_the_reader_log() {
        let mut sys = system();
        sys.store_data("doc-1", serde_json::json!("secret"), 5, "0xcreator", None, 0.0);
        assert!(sys.access_data("0xuser", "doc-1", 1.0).is_none());
        assert!(sys.data_store.get("doc-1").unwrap().access_log.is_empty());
    }
}
