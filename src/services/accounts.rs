//! Payment account registry
//!
//! Three fixed slots persisted under the keys `m{slot}{bin|acc|bn|on}`. A slot
//! whose account number is empty is unused and skipped by every enumeration.

use crate::{
    error::StationResult,
    store::{ConfigStore, OpenMode},
};
use log::info;
use serde::Serialize;
use std::{fmt, ops::Deref};

pub const ACCOUNT_SLOTS: usize = 3;

/// Text that never exceeds `MAX` characters.
///
/// Construction truncates at the last character boundary that keeps the value
/// within `MAX` characters; longer input is cut, never rejected.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BoundedText<const MAX: usize>(String);

impl<const MAX: usize> BoundedText<MAX> {
    pub fn new(value: &str) -> Self {
        match value.char_indices().nth(MAX) {
            Some((end, _)) => Self(value[..end].to_string()),
            None => Self(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const MAX: usize> Deref for BoundedText<MAX> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const MAX: usize> From<&str> for BoundedText<MAX> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<const MAX: usize> fmt::Debug for BoundedText<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<const MAX: usize> fmt::Display for BoundedText<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const MAX: usize> Serialize for BoundedText<MAX> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountRecord {
    pub bank_identifier: BoundedText<15>,
    pub account_number: BoundedText<31>,
    pub bank_name: BoundedText<63>,
    pub owner_name: BoundedText<63>,
}

impl AccountRecord {
    pub fn new(
        bank_identifier: &str,
        account_number: &str,
        bank_name: &str,
        owner_name: &str,
    ) -> Self {
        Self {
            bank_identifier: BoundedText::new(bank_identifier),
            account_number: BoundedText::new(account_number),
            bank_name: BoundedText::new(bank_name),
            owner_name: BoundedText::new(owner_name),
        }
    }

    pub fn is_used(&self) -> bool {
        !self.account_number.is_empty()
    }
}

/// Backup entry; carries no credential of any kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportedAccount {
    pub bin: String,
    pub acc: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiAccount {
    pub bin: String,
    pub acc: String,
    pub bank: String,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct AccountRegistry {
    records: [AccountRecord; ACCOUNT_SLOTS],
}

fn slot_key(slot: usize, field: &str) -> String {
    format!("m{slot}{field}")
}

impl AccountRegistry {
    pub fn records(&self) -> &[AccountRecord; ACCOUNT_SLOTS] {
        &self.records
    }

    pub fn load(&mut self, store: &ConfigStore) -> StationResult<()> {
        let prefs = store.open(OpenMode::ReadOnly)?;

        self.records = std::array::from_fn(|slot| {
            AccountRecord::new(
                &prefs.get_text(&slot_key(slot, "bin"), ""),
                &prefs.get_text(&slot_key(slot, "acc"), ""),
                &prefs.get_text(&slot_key(slot, "bn"), ""),
                &prefs.get_text(&slot_key(slot, "on"), ""),
            )
        });

        prefs.end()?;

        info!(
            "loaded {} account(s)",
            self.records.iter().filter(|r| r.is_used()).count()
        );
        Ok(())
    }

    /// Persist all slots, then swap the in-memory copy.
    pub fn save(
        &mut self,
        store: &ConfigStore,
        records: [AccountRecord; ACCOUNT_SLOTS],
    ) -> StationResult<()> {
        let mut prefs = store.open(OpenMode::ReadWrite)?;

        for (slot, record) in records.iter().enumerate() {
            prefs.put_text(&slot_key(slot, "bin"), &record.bank_identifier)?;
            prefs.put_text(&slot_key(slot, "acc"), &record.account_number)?;
            prefs.put_text(&slot_key(slot, "bn"), &record.bank_name)?;
            prefs.put_text(&slot_key(slot, "on"), &record.owner_name)?;
        }

        prefs.end()?;
        self.records = records;
        Ok(())
    }

    pub fn export(&self) -> Vec<ExportedAccount> {
        self.used()
            .map(|r| ExportedAccount {
                bin: r.bank_identifier.to_string(),
                acc: r.account_number.to_string(),
                name: r.owner_name.to_string(),
            })
            .collect()
    }

    pub fn list_for_api(&self) -> Vec<ApiAccount> {
        self.used()
            .map(|r| ApiAccount {
                bin: r.bank_identifier.to_string(),
                acc: r.account_number.to_string(),
                bank: r.bank_name.to_string(),
                name: r.owner_name.to_string(),
            })
            .collect()
    }

    fn used(&self) -> impl Iterator<Item = &AccountRecord> {
        self.records.iter().filter(|r| r.is_used())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> [AccountRecord; ACCOUNT_SLOTS] {
        [
            AccountRecord::new("970436", "0011004", "Vietcombank", "NGUYEN VAN A"),
            AccountRecord::default(),
            AccountRecord::new("970422", "99990000", "MB Bank", "TRAN THI B"),
        ]
    }

    mod bounded_text {
        use super::*;

        #[test]
        fn keeps_short_values() {
            let text = BoundedText::<5>::new("abc");
            assert_eq!(text.as_str(), "abc");
        }

        #[test]
        fn truncates_long_values() {
            let text = BoundedText::<5>::new("abcdefgh");
            assert_eq!(text.as_str(), "abcde");
        }

        #[test]
        fn truncates_on_char_boundary() {
            let text = BoundedText::<3>::new("Ngân hàng");
            assert_eq!(text.as_str(), "Ngâ");
        }
    }

    #[test]
    fn save_then_load_round_trips_every_slot() {
        let store = ConfigStore::in_memory("bank_data");
        let mut registry = AccountRegistry::default();
        registry.save(&store, sample_records()).expect("should save");

        let mut reloaded = AccountRegistry::default();
        reloaded.load(&store).expect("should load");

        assert_eq!(reloaded.records(), &sample_records());
    }

    #[test]
    fn load_defaults_missing_keys_to_empty() {
        let store = ConfigStore::in_memory("bank_data");
        let mut registry = AccountRegistry::default();
        registry.load(&store).expect("should load");

        assert!(registry.records().iter().all(|r| !r.is_used()));
        assert!(registry.export().is_empty());
    }

    #[test]
    fn failed_save_keeps_previous_records() {
        let backend = std::sync::Arc::new(crate::store::MemoryBackend::default());
        let store = ConfigStore::new(backend.clone(), "bank_data");
        let mut registry = AccountRegistry::default();
        registry.save(&store, sample_records()).expect("should save");

        backend.set_unavailable(true);
        let result = registry.save(&store, Default::default());

        assert!(result.is_err());
        assert_eq!(registry.records(), &sample_records());
    }

    #[test]
    fn export_skips_unused_slots_in_order() {
        let store = ConfigStore::in_memory("bank_data");
        let mut registry = AccountRegistry::default();
        registry.save(&store, sample_records()).expect("should save");

        let exported = registry.export();

        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].acc, "0011004");
        assert_eq!(exported[1].acc, "99990000");
    }

    #[test]
    fn export_never_contains_admin_fields() {
        let store = ConfigStore::in_memory("bank_data");
        let mut registry = AccountRegistry::default();
        registry.save(&store, sample_records()).expect("should save");

        let json = serde_json::to_string(&registry.export()).expect("should serialize");

        assert!(!json.contains("a_pass"));
        assert!(!json.contains("pass"));
        assert!(!json.contains("bank\""));
    }

    #[test]
    fn api_list_places_separators_only_between_entries() {
        let store = ConfigStore::in_memory("bank_data");
        let mut registry = AccountRegistry::default();
        registry
            .save(
                &store,
                [
                    AccountRecord::new("970436", "1", "A", "X"),
                    AccountRecord::new("970422", "2", "B", "Y"),
                    AccountRecord::default(),
                ],
            )
            .expect("should save");

        let json = serde_json::to_string(&registry.list_for_api()).expect("should serialize");

        assert!(json.starts_with('['));
        assert!(!json.contains(",]"));
        assert_eq!(json.matches("},{").count(), 1);
        assert!(json.contains("\"bank\":\"A\""));
    }

    #[test]
    fn api_list_handles_gap_before_last_slot() {
        let store = ConfigStore::in_memory("bank_data");
        let mut registry = AccountRegistry::default();
        registry.save(&store, sample_records()).expect("should save");

        let accounts = registry.list_for_api();
        let json = serde_json::to_string(&accounts).expect("should serialize");

        assert_eq!(accounts.len(), 2);
        assert_eq!(json.matches("},{").count(), accounts.len() - 1);
    }
}
