use super::{LinkStatus, Radio, VisibleNetwork};
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use tokio::process::Command;

/// NetworkManager backed radio.
#[derive(Clone, Debug)]
pub struct NmcliRadio {
    interface: String,
}

impl NmcliRadio {
    const BINARY: &str = "nmcli";
    const AP_CONNECTION: &str = "qr-station-ap";
    const STATE_CONNECTED: &str = "100";

    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    /// Run nmcli in terse mode. `operation` is what gets logged, arguments may carry secrets.
    async fn run(&self, operation: &str, args: &[&str]) -> Result<String> {
        debug!("nmcli {operation} on {}", self.interface);

        let output = Command::new(Self::BINARY)
            .arg("--terse")
            .args(args)
            .output()
            .await
            .context(format!("failed to spawn nmcli for {operation}"))?;

        ensure!(
            output.status.success(),
            "nmcli {operation} failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        String::from_utf8(output.stdout).context(format!("nmcli {operation} returned invalid utf8"))
    }
}

/// Split a terse nmcli line into fields, honouring `\:` escapes.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            ':' => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }

    fields.push(current);
    fields
}

/// nmcli reports signal quality in percent.
fn quality_to_dbm(quality: u8) -> i32 {
    i32::from(quality.min(100)) / 2 - 100
}

fn parse_scan(output: &str) -> Vec<VisibleNetwork> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            let [ssid, signal] = fields.as_slice() else {
                return None;
            };
            if ssid.is_empty() {
                return None;
            }
            let quality = signal.parse::<u8>().ok()?;
            Some(VisibleNetwork {
                ssid: ssid.clone(),
                signal_strength: quality_to_dbm(quality),
            })
        })
        .collect()
}

fn parse_active_ssid(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let fields = split_terse(line);
        match fields.as_slice() {
            [active, ssid] if active == "yes" && !ssid.is_empty() => Some(ssid.clone()),
            _ => None,
        }
    })
}

fn parse_state(output: &str) -> LinkStatus {
    let connected = output.lines().any(|line| {
        let fields = split_terse(line);
        matches!(fields.as_slice(), [key, value]
            if key == "GENERAL.STATE" && value.starts_with(NmcliRadio::STATE_CONNECTED))
    });

    if connected {
        LinkStatus::Connected
    } else {
        LinkStatus::Disconnected
    }
}

impl Radio for NmcliRadio {
    async fn join_network(&self, ssid: &str, passphrase: &str) -> Result<()> {
        info!("join {ssid} on {}", self.interface);

        let mut args = vec!["--wait", "0", "device", "wifi", "connect", ssid];
        if !passphrase.is_empty() {
            args.extend(["password", passphrase]);
        }
        args.extend(["ifname", self.interface.as_str()]);

        self.run("connect", &args).await?;
        Ok(())
    }

    async fn status(&self) -> Result<LinkStatus> {
        let output = self
            .run(
                "status",
                &["--fields", "GENERAL.STATE", "device", "show", &self.interface],
            )
            .await?;
        Ok(parse_state(&output))
    }

    async fn scan(&self) -> Result<Vec<VisibleNetwork>> {
        let output = self
            .run(
                "scan",
                &[
                    "--fields",
                    "SSID,SIGNAL",
                    "device",
                    "wifi",
                    "list",
                    "--rescan",
                    "yes",
                    "ifname",
                    &self.interface,
                ],
            )
            .await?;
        Ok(parse_scan(&output))
    }

    async fn start_self_hosted_network(&self, name: &str, passphrase: &str) -> Result<()> {
        info!("start self-hosted network {name}");

        self.run(
            "hotspot",
            &[
                "device",
                "wifi",
                "hotspot",
                "ifname",
                &self.interface,
                "con-name",
                Self::AP_CONNECTION,
                "ssid",
                name,
                "password",
                passphrase,
            ],
        )
        .await?;
        Ok(())
    }

    async fn stop_self_hosted_network(&self) -> Result<()> {
        info!("stop self-hosted network");

        self.run("hotspot down", &["connection", "down", "id", Self::AP_CONNECTION])
            .await?;
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        let output = self
            .run(
                "active ssid",
                &[
                    "--fields",
                    "ACTIVE,SSID",
                    "device",
                    "wifi",
                    "list",
                    "--rescan",
                    "no",
                    "ifname",
                    &self.interface,
                ],
            )
            .await?;
        Ok(parse_active_ssid(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_terse_handles_escaped_colons() {
        assert_eq!(split_terse(r"my\:net:70"), vec!["my:net", "70"]);
        assert_eq!(split_terse("plain:42"), vec!["plain", "42"]);
    }

    #[test]
    fn parse_scan_skips_hidden_and_malformed_lines() {
        let output = "home:80\n:55\ngarbage\nshop:30\n";

        let networks = parse_scan(output);

        assert_eq!(
            networks,
            vec![
                VisibleNetwork {
                    ssid: "home".to_string(),
                    signal_strength: -60
                },
                VisibleNetwork {
                    ssid: "shop".to_string(),
                    signal_strength: -85
                },
            ]
        );
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(quality_to_dbm(0), -100);
        assert_eq!(quality_to_dbm(100), -50);
        assert_eq!(quality_to_dbm(250), -50);
    }

    #[test]
    fn parse_active_ssid_finds_active_line() {
        let output = "no:shop\nyes:home\n";
        assert_eq!(parse_active_ssid(output), Some("home".to_string()));
        assert_eq!(parse_active_ssid("no:shop\n"), None);
    }

    #[test]
    fn parse_state_recognizes_connected() {
        assert_eq!(
            parse_state("GENERAL.STATE:100 (connected)\n"),
            LinkStatus::Connected
        );
        assert_eq!(
            parse_state("GENERAL.STATE:30 (disconnected)\n"),
            LinkStatus::Disconnected
        );
    }
}
