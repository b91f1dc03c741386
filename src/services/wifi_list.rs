//! Known wireless credentials
//!
//! Ordered by join priority and unique by SSID. The whole list is persisted as a
//! single JSON blob under [`WIFI_LIST_KEY`].
//!
//! Deletion by index is positional: indices shift after every removal, so a
//! caller must re-fetch the list before deleting a second entry.
//! [`CredentialList::delete_by_ssid`] avoids that hazard.

use crate::{
    error::{StationError, StationResult},
    store::{ConfigStore, OpenMode},
};
use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

pub const WIFI_LIST_KEY: &str = "wifi_list";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WifiCredential {
    pub ssid: String,
    pub passphrase: String,
}

impl WifiCredential {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }
}

/// Accessor for the persisted credential list. Holds no copy of its own.
#[derive(Clone)]
pub struct CredentialList {
    store: ConfigStore,
}

impl CredentialList {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn get_all(&self) -> StationResult<Vec<WifiCredential>> {
        let prefs = self.store.open(OpenMode::ReadOnly)?;
        let blob = prefs.get_text(WIFI_LIST_KEY, "[]");
        prefs.end()?;

        if blob.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&blob)
            .context("failed to deserialize wifi list")
            .map_err(StationError::StoreUnavailable)
    }

    pub fn add_or_update(&self, ssid: &str, passphrase: &str) -> StationResult<()> {
        let mut list = self.get_all()?;

        match list.iter_mut().find(|c| c.ssid == ssid) {
            Some(existing) => {
                info!("update wifi credential {ssid}");
                existing.passphrase = passphrase.to_string();
            }
            None => {
                info!("add wifi credential {ssid}");
                list.push(WifiCredential::new(ssid, passphrase));
            }
        }

        self.save(&list)
    }

    pub fn delete_at(&self, index: usize) -> StationResult<WifiCredential> {
        let mut list = self.get_all()?;

        if index >= list.len() {
            return Err(StationError::OutOfRange {
                index,
                len: list.len(),
            });
        }

        let removed = list.remove(index);
        self.save(&list)?;

        info!("deleted wifi credential {} at {index}", removed.ssid);
        Ok(removed)
    }

    /// Returns whether an entry was removed.
    pub fn delete_by_ssid(&self, ssid: &str) -> StationResult<bool> {
        let mut list = self.get_all()?;
        let len = list.len();
        list.retain(|c| c.ssid != ssid);

        if list.len() == len {
            return Ok(false);
        }

        self.save(&list)?;
        info!("deleted wifi credential {ssid}");
        Ok(true)
    }

    fn save(&self, list: &[WifiCredential]) -> StationResult<()> {
        let blob = serde_json::to_string(list)
            .context("failed to serialize wifi list")
            .map_err(StationError::StoreUnavailable)?;

        let mut prefs = self.store.open(OpenMode::ReadWrite)?;
        prefs.put_text(WIFI_LIST_KEY, &blob)?;
        prefs.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_with(entries: &[(&str, &str)]) -> CredentialList {
        let list = CredentialList::new(ConfigStore::in_memory("bank_data"));
        for (ssid, pass) in entries {
            list.add_or_update(ssid, pass).expect("should add");
        }
        list
    }

    #[test]
    fn empty_store_yields_empty_list() {
        let list = list_with(&[]);
        assert!(list.get_all().expect("should read").is_empty());
    }

    #[test]
    fn add_appends_in_priority_order() {
        let list = list_with(&[("home", "secret"), ("shop", "p4ss")]);

        let all = list.get_all().expect("should read");
        assert_eq!(
            all,
            vec![
                WifiCredential::new("home", "secret"),
                WifiCredential::new("shop", "p4ss")
            ]
        );
    }

    #[test]
    fn update_replaces_passphrase_in_place() {
        let list = list_with(&[("home", "p1"), ("shop", "x")]);
        list.add_or_update("home", "p2").expect("should update");

        let all = list.get_all().expect("should read");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], WifiCredential::new("home", "p2"));
    }

    #[test]
    fn delete_at_shifts_following_entries() {
        let list = list_with(&[("a", "1"), ("b", "2"), ("c", "3")]);

        let removed = list.delete_at(0).expect("should delete");

        assert_eq!(removed.ssid, "a");
        let ssids: Vec<_> = list
            .get_all()
            .expect("should read")
            .into_iter()
            .map(|c| c.ssid)
            .collect();
        assert_eq!(ssids, ["b", "c"]);
    }

    #[test]
    fn delete_out_of_range_leaves_list_unchanged() {
        let list = list_with(&[("a", "1"), ("b", "2")]);

        let result = list.delete_at(2);

        assert!(matches!(
            result,
            Err(StationError::OutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(list.get_all().expect("should read").len(), 2);
    }

    #[test]
    fn delete_by_ssid_reports_removal() {
        let list = list_with(&[("a", "1"), ("b", "2")]);

        assert!(list.delete_by_ssid("a").expect("should delete"));
        assert!(!list.delete_by_ssid("a").expect("should not fail"));
        assert_eq!(list.get_all().expect("should read").len(), 1);
    }

    #[test]
    fn corrupt_blob_is_reported() {
        let store = ConfigStore::in_memory("bank_data");
        let mut prefs = store.open(OpenMode::ReadWrite).expect("should open");
        prefs.put_text(WIFI_LIST_KEY, "{broken").expect("should put");
        prefs.end().expect("should end");

        let list = CredentialList::new(store);
        assert!(matches!(
            list.get_all(),
            Err(StationError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn blob_is_plain_json_array() {
        let store = ConfigStore::in_memory("bank_data");
        let list = CredentialList::new(store.clone());
        list.add_or_update("home", "secret").expect("should add");

        let prefs = store.open(OpenMode::ReadOnly).expect("should open");
        assert_eq!(
            prefs.get_text(WIFI_LIST_KEY, ""),
            r#"[{"ssid":"home","passphrase":"secret"}]"#
        );
    }
}
