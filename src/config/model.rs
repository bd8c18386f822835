use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Declarative description of every service the hub manages.
///
/// All three maps are always present after loading, even when a section is
/// missing or explicitly `~` in YAML, so callers can iterate them
/// unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubManifest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub infrastructure: BTreeMap<String, ServiceEntry>,
    #[serde(default, rename = "mcp_servers", deserialize_with = "null_as_empty")]
    pub tool_servers: BTreeMap<String, ServiceEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tools: BTreeMap<String, ServiceEntry>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, ServiceEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, ServiceEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// `None` means enabled. Only an explicit `false` disables a service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supergateway_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ReadinessProbe>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<String>,
}

fn is_zero(port: &u16) -> bool {
    *port == 0
}

fn default_probe_path() -> String {
    "/healthz".to_string()
}

fn default_initial_delay() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_probe_period() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessProbe {
    #[serde(default = "default_probe_path")]
    pub path: String,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_probe_period")]
    pub period_seconds: u64,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            initial_delay_seconds: default_initial_delay(),
            timeout_seconds: default_probe_timeout(),
            period_seconds: default_probe_period(),
        }
    }
}

impl ServiceEntry {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// The path used to health-check this service: the explicit health
    /// endpoint, else the readiness probe path.
    pub fn health_path(&self) -> Option<&str> {
        self.health_endpoint
            .as_deref()
            .or_else(|| self.readiness_probe.as_ref().map(|p| p.path.as_str()))
    }
}

/// Which manifest section an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Infrastructure,
    McpServer,
    Tool,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Infrastructure => "infrastructure",
            ServiceKind::McpServer => "mcp_server",
            ServiceKind::Tool => "tool",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HubManifest {
    /// Iterate every entry across all sections, in section order.
    pub fn entries(&self) -> impl Iterator<Item = (ServiceKind, &String, &ServiceEntry)> {
        self.infrastructure
            .iter()
            .map(|(n, e)| (ServiceKind::Infrastructure, n, e))
            .chain(
                self.tool_servers
                    .iter()
                    .map(|(n, e)| (ServiceKind::McpServer, n, e)),
            )
            .chain(self.tools.iter().map(|(n, e)| (ServiceKind::Tool, n, e)))
    }

    pub fn is_empty(&self) -> bool {
        self.infrastructure.is_empty() && self.tool_servers.is_empty() && self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_is_tri_state() {
        let mut entry = ServiceEntry::default();
        assert!(entry.is_enabled());
        entry.enabled = Some(true);
        assert!(entry.is_enabled());
        entry.enabled = Some(false);
        assert!(!entry.is_enabled());
    }

    #[test]
    fn null_sections_deserialize_as_empty() {
        let yaml = "infrastructure:\nmcp_servers: ~\n";
        let manifest: HubManifest = serde_yaml::from_str(yaml).unwrap();
        assert!(manifest.infrastructure.is_empty());
        assert!(manifest.tool_servers.is_empty());
        assert!(manifest.tools.is_empty());
    }

    #[test]
    fn readiness_probe_defaults_fill_missing_fields() {
        let yaml = "path: /health\n";
        let probe: ReadinessProbe = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(probe.path, "/health");
        assert_eq!(probe.initial_delay_seconds, 5);
        assert_eq!(probe.timeout_seconds, 3);
        assert_eq!(probe.period_seconds, 10);
    }

    #[test]
    fn health_path_prefers_explicit_endpoint() {
        let entry = ServiceEntry {
            health_endpoint: Some("/health".to_string()),
            readiness_probe: Some(ReadinessProbe::default()),
            ..ServiceEntry::default()
        };
        assert_eq!(entry.health_path(), Some("/health"));

        let entry = ServiceEntry {
            readiness_probe: Some(ReadinessProbe::default()),
            ..ServiceEntry::default()
        };
        assert_eq!(entry.health_path(), Some("/healthz"));
        assert_eq!(ServiceEntry::default().health_path(), None);
    }

    #[test]
    fn entries_walks_all_sections() {
        let mut manifest = HubManifest::default();
        manifest
            .infrastructure
            .insert("gateway".into(), ServiceEntry::default());
        manifest
            .tool_servers
            .insert("memory".into(), ServiceEntry::default());
        manifest.tools.insert("inspector".into(), ServiceEntry::default());

        let kinds: Vec<_> = manifest.entries().map(|(k, n, _)| (k, n.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (ServiceKind::Infrastructure, "gateway".to_string()),
                (ServiceKind::McpServer, "memory".to_string()),
                (ServiceKind::Tool, "inspector".to_string()),
            ]
        );
    }
}
