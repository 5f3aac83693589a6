//! Config file loading (§6 "Environment"): a TOML file with top-level
//! tables `[registry]`, `[node]`, `[launcher]`, overridable by
//! `--config`/`--tag`/`--log`. CLI tools merge flags over file values
//! over built-in defaults, flags winning.

use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;

use nimo_types::NimoError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NimoConfig {
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub launcher: LauncherSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    #[serde(default = "default_machine_address")]
    pub address: Ipv4Addr,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub multicast_group: Option<Ipv4Addr>,
    #[serde(default)]
    pub multicast_port: Option<u16>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            address: default_machine_address(),
            tag: None,
            multicast_group: None,
            multicast_port: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeSection {
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LauncherSection {
    #[serde(default)]
    pub apps: Vec<AppConfigEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfigEntry {
    pub short_name: String,
    pub description: String,
    pub executable_path: String,
    #[serde(default)]
    pub argument_template: Vec<String>,
    #[serde(default)]
    pub option_template: Vec<String>,
}

fn default_machine_address() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

impl NimoConfig {
    /// Load and parse a TOML config file. A missing `--config` path is
    /// not an error at this layer — callers fall back to
    /// `NimoConfig::default()` per the flags-over-file-over-defaults
    /// precedence (§6).
    pub fn load(path: &Path) -> Result<Self, NimoError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| NimoError::bad_argument(format!("reading {path:?}: {e}")))?;
        toml::from_str(&text)
            .map_err(|e| NimoError::bad_argument(format!("parsing {path:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let cfg: NimoConfig = toml::from_str(
            r#"
            [registry]
            address = "10.0.0.1"

            [node]
            machine = "alpha"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.registry.address, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(cfg.node.machine.as_deref(), Some("alpha"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: NimoConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.registry.address, Ipv4Addr::LOCALHOST);
        assert!(cfg.launcher.apps.is_empty());
    }
}
