//! Config page rendering
//!
//! The page is an embedded template with `%NAME%` placeholders. Substitution is
//! a single pass over the template, so a substituted value is never scanned for
//! further placeholders. Unknown placeholders are left untouched.

use crate::station::ConfigView;
use std::collections::HashMap;

const CONFIG_TEMPLATE: &str = include_str!("../static/config.html");

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Substitution {
    /// Escaped before insertion.
    Text(String),
    /// Inserted verbatim; only for markup produced in this module.
    Markup(String),
}

pub type Placeholders = HashMap<String, Substitution>;

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

pub fn render(template: &str, placeholders: &Placeholders) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let substitution = after
            .find('%')
            .map(|end| (&after[..end], end))
            .filter(|(name, _)| is_placeholder_name(name))
            .and_then(|(name, end)| placeholders.get(name).map(|s| (s, end)));

        match substitution {
            Some((Substitution::Text(value), end)) => {
                out.push_str(&escape_html(value));
                rest = &after[end + 1..];
            }
            Some((Substitution::Markup(value), end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn wifi_options(current_ssid: Option<&str>) -> String {
    match current_ssid {
        Some(ssid) => {
            let ssid = escape_html(ssid);
            format!("<option value='{ssid}'>{ssid} (Connected)</option>")
        }
        None => "<option value=''>Select WiFi...</option>".to_string(),
    }
}

pub fn config_placeholders(view: &ConfigView) -> Placeholders {
    let mut placeholders = Placeholders::new();
    let mut text = |name: String, value: &str| {
        placeholders.insert(name, Substitution::Text(value.to_string()));
    };

    for (slot, account) in view.accounts.iter().enumerate() {
        text(format!("BIN{slot}"), account.bank_identifier.as_str());
        text(format!("ACC{slot}"), account.account_number.as_str());
        text(format!("BN{slot}"), account.bank_name.as_str());
        text(format!("ON{slot}"), account.owner_name.as_str());
    }

    text("MS".to_string(), &view.messaging.server);
    text("MU".to_string(), &view.messaging.user);
    text("MP".to_string(), &view.messaging.password);
    text("AU".to_string(), &view.auth_user);
    text(
        "MQTT_ENABLED".to_string(),
        if view.messaging.enabled { "checked" } else { "" },
    );
    text(
        "MQTT_ENABLED_VAL".to_string(),
        if view.messaging.enabled { "1" } else { "0" },
    );

    placeholders.insert(
        "WIFI_LIST".to_string(),
        Substitution::Markup(wifi_options(view.current_ssid.as_deref())),
    );

    placeholders
}

pub fn render_config_page(view: &ConfigView) -> String {
    render(CONFIG_TEMPLATE, &config_placeholders(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{accounts::AccountRecord, settings::MessagingSettings};

    fn placeholders(entries: &[(&str, Substitution)]) -> Placeholders {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn view() -> ConfigView {
        ConfigView {
            accounts: [
                AccountRecord::new("970436", "0011004", "Vietcombank", "NGUYEN VAN A"),
                AccountRecord::default(),
                AccountRecord::default(),
            ],
            current_ssid: None,
            messaging: MessagingSettings {
                server: "broker.local".to_string(),
                user: "station".to_string(),
                password: "mqtt-pass".to_string(),
                enabled: true,
            },
            auth_user: "admin".to_string(),
        }
    }

    mod render {
        use super::*;

        #[test]
        fn substitutes_known_placeholders() {
            let map = placeholders(&[("NAME", Substitution::Text("world".to_string()))]);
            assert_eq!(render("hello %NAME%!", &map), "hello world!");
        }

        #[test]
        fn leaves_unknown_placeholders_and_stray_percent() {
            let map = placeholders(&[("A", Substitution::Text("1".to_string()))]);
            assert_eq!(render("100% %B% %A%", &map), "100% %B% 1");
        }

        #[test]
        fn does_not_rescan_substituted_values() {
            let map = placeholders(&[
                ("A", Substitution::Text("%B%".to_string())),
                ("B", Substitution::Text("oops".to_string())),
            ]);
            assert_eq!(render("%A%", &map), "%B%");
        }

        #[test]
        fn escapes_text_but_not_markup() {
            let map = placeholders(&[
                ("T", Substitution::Text("<b>&'\"".to_string())),
                ("M", Substitution::Markup("<i>".to_string())),
            ]);
            assert_eq!(render("%T%%M%", &map), "&lt;b&gt;&amp;&#39;&quot;<i>");
        }
    }

    #[test]
    fn config_page_contains_values() {
        let html = render_config_page(&view());

        assert!(html.contains("value='970436'"));
        assert!(html.contains("value='broker.local'"));
        assert!(html.contains("Select WiFi..."));
        assert!(!html.contains("%BIN0%"));
        assert!(!html.contains("%MQTT_ENABLED_VAL%"));
    }

    #[test]
    fn config_page_never_contains_admin_password() {
        let html = render_config_page(&view());
        assert!(!html.contains("%AP%"));
    }

    #[test]
    fn connected_ssid_is_escaped_in_options() {
        let mut view = view();
        view.current_ssid = Some("cafe <5G>".to_string());

        let placeholders = config_placeholders(&view);

        assert_eq!(
            placeholders.get("WIFI_LIST"),
            Some(&Substitution::Markup(
                "<option value='cafe &lt;5G&gt;'>cafe &lt;5G&gt; (Connected)</option>".to_string()
            ))
        );
    }

    #[test]
    fn hostile_account_values_cannot_break_out_of_attributes() {
        let mut view = view();
        view.accounts[1] = AccountRecord::new("1", "2' onmouseover='x", "", "");

        let html = render_config_page(&view);

        assert!(html.contains("2&#39; onmouseover=&#39;x"));
    }
}
