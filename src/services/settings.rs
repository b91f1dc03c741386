//! Messaging and admin settings
//!
//! Loaded once at startup, overwritten wholesale on save.

use crate::{
    error::StationResult,
    store::{ConfigStore, OpenMode},
};
use serde::Serialize;

const KEY_AUTH_USER: &str = "a_user";
const KEY_AUTH_PASS: &str = "a_pass";
const KEY_MESSAGING_SERVER: &str = "m_serv";
const KEY_MESSAGING_USER: &str = "m_user";
const KEY_MESSAGING_PASS: &str = "m_pass";
const KEY_MESSAGING_ENABLED: &str = "m_en";

pub const DEFAULT_AUTH_USER: &str = "admin";
pub const DEFAULT_AUTH_PASS: &str = "admin";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessagingSettings {
    pub server: String,
    pub user: String,
    pub password: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSettings {
    pub messaging: MessagingSettings,
    pub auth_user: String,
    pub auth_pass: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            messaging: MessagingSettings::default(),
            auth_user: DEFAULT_AUTH_USER.to_string(),
            auth_pass: DEFAULT_AUTH_PASS.to_string(),
        }
    }
}

impl NetworkSettings {
    pub fn load(store: &ConfigStore) -> StationResult<Self> {
        let prefs = store.open(OpenMode::ReadOnly)?;

        let settings = Self {
            messaging: MessagingSettings {
                server: prefs.get_text(KEY_MESSAGING_SERVER, ""),
                user: prefs.get_text(KEY_MESSAGING_USER, ""),
                password: prefs.get_text(KEY_MESSAGING_PASS, ""),
                enabled: prefs.get_bool(KEY_MESSAGING_ENABLED, false),
            },
            auth_user: prefs.get_text(KEY_AUTH_USER, DEFAULT_AUTH_USER),
            auth_pass: prefs.get_text(KEY_AUTH_PASS, DEFAULT_AUTH_PASS),
        };

        prefs.end()?;
        Ok(settings)
    }

    pub fn save(&self, store: &ConfigStore) -> StationResult<()> {
        let mut prefs = store.open(OpenMode::ReadWrite)?;

        prefs.put_text(KEY_MESSAGING_SERVER, &self.messaging.server)?;
        prefs.put_text(KEY_MESSAGING_USER, &self.messaging.user)?;
        prefs.put_text(KEY_MESSAGING_PASS, &self.messaging.password)?;
        prefs.put_bool(KEY_MESSAGING_ENABLED, self.messaging.enabled)?;
        prefs.put_text(KEY_AUTH_USER, &self.auth_user)?;
        prefs.put_text(KEY_AUTH_PASS, &self.auth_pass)?;

        prefs.end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingStatus {
    Connected,
    Connecting,
    Disabled,
    Disconnected,
}

impl MessagingStatus {
    pub fn evaluate(settings: &MessagingSettings, link_up: bool) -> Self {
        if link_up {
            Self::Connected
        } else if settings.enabled && !settings.server.is_empty() {
            Self::Connecting
        } else if !settings.enabled {
            Self::Disabled
        } else {
            Self::Disconnected
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MessagingStatusReport {
    pub status: MessagingStatus,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messaging(server: &str, enabled: bool) -> MessagingSettings {
        MessagingSettings {
            server: server.to_string(),
            enabled,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_to_empty_store() {
        let store = ConfigStore::in_memory("bank_data");
        let settings = NetworkSettings::load(&store).expect("should load");
        assert_eq!(settings, NetworkSettings::default());
        assert_eq!(settings.auth_user, "admin");
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = ConfigStore::in_memory("bank_data");
        let settings = NetworkSettings {
            messaging: MessagingSettings {
                server: "broker.local".to_string(),
                user: "station".to_string(),
                password: "mqtt-pass".to_string(),
                enabled: true,
            },
            auth_user: "owner".to_string(),
            auth_pass: "s3cret".to_string(),
        };

        settings.save(&store).expect("should save");

        assert_eq!(NetworkSettings::load(&store).expect("should load"), settings);
    }

    #[test]
    fn explicitly_empty_auth_user_is_kept() {
        let store = ConfigStore::in_memory("bank_data");
        let settings = NetworkSettings {
            auth_user: String::new(),
            ..Default::default()
        };
        settings.save(&store).expect("should save");

        assert_eq!(NetworkSettings::load(&store).unwrap().auth_user, "");
    }

    #[test]
    fn status_evaluation() {
        assert_eq!(
            MessagingStatus::evaluate(&messaging("broker", true), true),
            MessagingStatus::Connected
        );
        assert_eq!(
            MessagingStatus::evaluate(&messaging("broker", true), false),
            MessagingStatus::Connecting
        );
        assert_eq!(
            MessagingStatus::evaluate(&messaging("broker", false), false),
            MessagingStatus::Disabled
        );
        assert_eq!(
            MessagingStatus::evaluate(&messaging("", true), false),
            MessagingStatus::Disconnected
        );
    }

    #[test]
    fn status_report_serializes_lowercase() {
        let report = MessagingStatusReport {
            status: MessagingStatus::Disabled,
            enabled: false,
        };
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"status":"disabled","enabled":false}"#
        );
    }
}
