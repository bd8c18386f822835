use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::settings::{HubSettings, PortConfig};

#[derive(Debug, Parser)]
#[command(name = "toolhub", version, about = "Supervisor for a local MCP tool-server hub")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub workspace directory (default: nearest `.toolhub` upward from cwd)
    #[arg(short = 'w', long = "workspace", global = true, env = "TOOLHUB_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Orchestrator binary that owns the process tree
    #[arg(long, global = true, env = "TOOLHUB_ORCHESTRATOR", default_value = "tilt")]
    pub orchestrator: String,

    /// Reverse proxy binary (checked for presence only)
    #[arg(long, global = true, env = "TOOLHUB_PROXY", default_value = "traefik")]
    pub proxy: String,

    /// Secret store file (default: user config dir)
    #[arg(long, global = true, env = "TOOLHUB_SECRETS_FILE")]
    pub secrets_file: Option<PathBuf>,

    #[command(flatten)]
    pub ports: PortOpts,

    /// How long to wait for the proxy health check, e.g. "30s"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub readiness_timeout: Option<Duration>,
}

#[derive(Debug, Args, Default)]
pub struct PortOpts {
    /// Orchestrator control-plane port
    #[arg(long, global = true, env = "TOOLHUB_CONTROL_PLANE_PORT")]
    pub control_plane_port: Option<u16>,

    /// Proxy admin API port
    #[arg(long, global = true, env = "TOOLHUB_ADMIN_API_PORT")]
    pub admin_api_port: Option<u16>,

    /// Public proxy port
    #[arg(long, global = true, env = "TOOLHUB_PROXY_PORT")]
    pub proxy_port: Option<u16>,

    /// Inspector UI port
    #[arg(long, global = true, env = "TOOLHUB_INSPECTOR_UI_PORT")]
    pub inspector_ui_port: Option<u16>,

    /// Inspector proxy port
    #[arg(long, global = true, env = "TOOLHUB_INSPECTOR_PROXY_PORT")]
    pub inspector_proxy_port: Option<u16>,

    /// First port handed to new tool servers
    #[arg(long, global = true, env = "TOOLHUB_SERVICE_START_PORT")]
    pub service_start_port: Option<u16>,
}

impl PortOpts {
    pub fn apply(&self, base: PortConfig) -> PortConfig {
        PortConfig {
            control_plane: self.control_plane_port.unwrap_or(base.control_plane),
            admin_api: self.admin_api_port.unwrap_or(base.admin_api),
            proxy: self.proxy_port.unwrap_or(base.proxy),
            inspector_ui: self.inspector_ui_port.unwrap_or(base.inspector_ui),
            inspector_proxy: self.inspector_proxy_port.unwrap_or(base.inspector_proxy),
            service_start: self.service_start_port.unwrap_or(base.service_start),
        }
    }
}

impl GlobalOpts {
    /// Build supervisor settings for the given workspace directory.
    pub fn settings(&self, workspace_dir: PathBuf) -> HubSettings {
        let mut settings = HubSettings::new(workspace_dir);
        settings.orchestrator_bin = self.orchestrator.clone();
        settings.proxy_bin = self.proxy.clone();
        settings.ports = self.ports.apply(settings.ports);
        if let Some(timeout) = self.readiness_timeout {
            settings.timings.readiness_timeout = timeout;
        }
        settings
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the hub in the foreground and stream its output (Ctrl-C stops it)
    Start {
        /// Do not stream hub output; print the tail only if it fails
        #[arg(short, long)]
        quiet: bool,
        /// Buffered lines to print when a quiet hub exits on its own
        #[arg(long, default_value_t = 50)]
        tail: usize,
    },
    /// Stop a hub left running by another session
    Stop,
    /// Show hub status and endpoints
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create the workspace with a default manifest and env file
    Init {
        /// Add any missing default services to an existing manifest
        #[arg(long)]
        merge_defaults: bool,
    },
    /// Check that required binaries are installed and ports are free
    Doctor,
    /// Validate the manifest
    Validate,
    /// Manage tool servers in the manifest
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Manage workspace environment variables
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },
    /// Manage stored secrets
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Fields shared by `server add` and `server update`.
#[derive(Debug, Args, Default)]
pub struct ServerFields {
    /// Port (0 or omitted picks the next free one on add)
    #[arg(long)]
    pub port: Option<u16>,
    /// Stdio command of the server
    #[arg(long)]
    pub command: Option<String>,
    /// Full gateway command; defaults to wrapping --command
    #[arg(long)]
    pub supergateway_command: Option<String>,
    /// Health check path, e.g. /healthz
    #[arg(long)]
    pub health_endpoint: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Directory the server is allowed to serve
    #[arg(long)]
    pub serve_dir: Option<String>,
    /// Label (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,
    /// Environment variable the server requires (repeatable)
    #[arg(long = "env-var")]
    pub env_vars: Vec<String>,
    /// Add the server disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Debug, Subcommand)]
pub enum ServerCommands {
    /// List every service in the manifest
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add a tool server
    Add {
        name: String,
        #[command(flatten)]
        fields: ServerFields,
    },
    /// Update a tool server
    ///
    /// Omitted --port, --supergateway-command, --health-endpoint, --serve-dir
    /// and --label keep their current values, as do the readiness probe and
    /// the enabled flag. Omitted --command, --description and --env-var are
    /// cleared.
    Update {
        name: String,
        #[command(flatten)]
        fields: ServerFields,
    },
    /// Remove a tool server
    Remove { name: String },
    /// Enable or disable a tool server
    Toggle {
        name: String,
        /// `on` or `off`
        #[arg(value_parser = parse_on_off, action = clap::ArgAction::Set)]
        state: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum EnvCommands {
    /// List env vars (secret references are shown, never secret values)
    List,
    /// Set a literal value
    Set { key: String, value: String },
    /// Point a variable at a stored secret
    Secret { key: String, secret: String },
    /// Show which variables are set and whether referenced secrets exist
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Show variables required by enabled tool servers
    Required {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum SecretCommands {
    /// Store a secret; reads the value from stdin when omitted
    Set { name: String, value: Option<String> },
    /// Delete a secret
    Delete { name: String },
    /// List secret names
    List,
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "enable" | "enabled" => Ok(true),
        "off" | "false" | "disable" | "disabled" => Ok(false),
        _ => Err(format!("expected `on` or `off`, got `{s}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn port_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "toolhub",
            "--proxy-port",
            "18000",
            "--readiness-timeout",
            "5s",
            "status",
        ])
        .unwrap();
        let settings = cli.global.settings(PathBuf::from("/tmp/ws"));
        assert_eq!(settings.ports.proxy, 18000);
        assert_eq!(settings.ports.control_plane, 10350);
        assert_eq!(settings.timings.readiness_timeout, Duration::from_secs(5));
    }

    #[test]
    fn update_help_names_cleared_fields() {
        let mut cmd = Cli::command();
        let help = cmd
            .find_subcommand_mut("server")
            .and_then(|server| server.find_subcommand_mut("update"))
            .unwrap()
            .render_long_help()
            .to_string();
        assert!(help.contains("cleared"));
        for flag in ["--command", "--description", "--env-var", "--port"] {
            assert!(help.contains(flag), "help does not mention {flag}");
        }
    }

    #[test]
    fn toggle_accepts_on_off() {
        let cli = Cli::try_parse_from(["toolhub", "server", "toggle", "memory", "off"]).unwrap();
        match cli.command {
            Commands::Server {
                command: ServerCommands::Toggle { name, state },
            } => {
                assert_eq!(name, "memory");
                assert!(!state);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["toolhub", "server", "toggle", "memory", "maybe"]).is_err());
    }
}
