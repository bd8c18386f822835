use std::collections::BTreeMap;

use crate::config::model::{HubManifest, ReadinessProbe, ServiceEntry};
use crate::config::settings::PortConfig;

/// Starter tool servers: (name, npm package, description, required env).
const STARTER_SERVERS: &[(&str, &str, &str, &[&str])] = &[
    (
        "filesystem",
        "@modelcontextprotocol/server-filesystem",
        "Read and write files under the serve directory",
        &[],
    ),
    (
        "memory",
        "@modelcontextprotocol/server-memory",
        "Knowledge-graph memory store",
        &[],
    ),
    (
        "fetch",
        "@modelcontextprotocol/server-fetch",
        "Fetch web content for the model",
        &[],
    ),
    (
        "sequential-thinking",
        "@modelcontextprotocol/server-sequential-thinking",
        "Structured step-by-step reasoning",
        &[],
    ),
];

/// Command template wrapping a stdio MCP server behind an HTTP gateway.
/// `{port}` is substituted by the orchestrator at launch time.
pub fn supergateway_template(stdio_command: &str) -> String {
    format!("npx -y supergateway --stdio \"{stdio_command}\" --port {{port}} --healthEndpoint /healthz")
}

/// Build the manifest written on first workspace init.
pub fn default_manifest(ports: &PortConfig) -> HubManifest {
    let mut infrastructure = BTreeMap::new();
    infrastructure.insert(
        "gateway".to_string(),
        ServiceEntry {
            port: ports.proxy,
            command: Some(format!(
                "traefik --entrypoints.web.address=:{} --api.insecure=true --entrypoints.traefik.address=:{} --ping=true --ping.entrypoint=web",
                ports.proxy, ports.admin_api
            )),
            health_endpoint: Some("/health".to_string()),
            description: Some("Reverse proxy routing /mcp/<server> to tool servers".to_string()),
            readiness_probe: Some(ReadinessProbe {
                path: "/health".to_string(),
                initial_delay_seconds: 2,
                timeout_seconds: 2,
                period_seconds: 5,
            }),
            labels: vec!["infra".to_string()],
            ..ServiceEntry::default()
        },
    );

    let mut tool_servers = BTreeMap::new();
    for (offset, (name, package, description, env_vars)) in STARTER_SERVERS.iter().enumerate() {
        let serve_dir = (*name == "filesystem").then(|| ".".to_string());
        let stdio = match &serve_dir {
            Some(dir) => format!("npx -y {package} {dir}"),
            None => format!("npx -y {package}"),
        };
        tool_servers.insert(
            name.to_string(),
            ServiceEntry {
                port: ports.service_start.saturating_add(offset as u16),
                supergateway_command: Some(supergateway_template(&stdio)),
                health_endpoint: Some("/healthz".to_string()),
                description: Some(description.to_string()),
                serve_dir,
                readiness_probe: Some(ReadinessProbe {
                    path: "/healthz".to_string(),
                    initial_delay_seconds: 5,
                    timeout_seconds: 3,
                    period_seconds: 10,
                }),
                labels: vec!["mcp".to_string()],
                env_vars: env_vars.iter().map(|s| s.to_string()).collect(),
                ..ServiceEntry::default()
            },
        );
    }

    let mut tools = BTreeMap::new();
    tools.insert(
        "inspector".to_string(),
        ServiceEntry {
            port: ports.inspector_ui,
            command: Some(format!(
                "CLIENT_PORT={} SERVER_PORT={} npx -y @modelcontextprotocol/inspector",
                ports.inspector_ui, ports.inspector_proxy
            )),
            health_endpoint: Some("/".to_string()),
            description: Some("MCP Inspector web UI".to_string()),
            readiness_probe: Some(ReadinessProbe {
                path: "/".to_string(),
                initial_delay_seconds: 10,
                timeout_seconds: 5,
                period_seconds: 15,
            }),
            labels: vec!["tools".to_string()],
            ..ServiceEntry::default()
        },
    );

    HubManifest {
        infrastructure,
        tool_servers,
        tools,
    }
}

/// Defaults-then-overrides, per section and per key. A user entry replaces
/// the default entry of the same name wholesale; no field-level merge.
pub fn merge_manifests(defaults: &HubManifest, user: &HubManifest) -> HubManifest {
    fn merge_map(
        defaults: &BTreeMap<String, ServiceEntry>,
        user: &BTreeMap<String, ServiceEntry>,
    ) -> BTreeMap<String, ServiceEntry> {
        let mut merged = defaults.clone();
        for (name, entry) in user {
            merged.insert(name.clone(), entry.clone());
        }
        merged
    }

    HubManifest {
        infrastructure: merge_map(&defaults.infrastructure, &user.infrastructure),
        tool_servers: merge_map(&defaults.tool_servers, &user.tool_servers),
        tools: merge_map(&defaults.tools, &user.tools),
    }
}
