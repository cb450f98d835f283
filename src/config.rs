use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// taskwire task/project management server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "taskwire-server", version, about = "Task management backend with live push")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "TASKWIRE_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "TASKWIRE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./taskwire.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "TASKWIRE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "TASKWIRE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Origin the browser client is served from (CORS allow-origin)
    #[arg(long, env = "TASKWIRE_CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Public base URL used in verification mail links
    #[arg(long, env = "TASKWIRE_PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
    pub public_base_url: String,

    /// Mail relay webhook endpoint; unset means log-only delivery
    #[arg(skip)]
    #[serde(default)]
    pub mail_webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./taskwire.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            mail_webhook_url: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TASKWIRE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("TASKWIRE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# taskwire server configuration
# Place this file at ./taskwire.toml or specify with --config <path>
# All settings can be overridden via environment variables (TASKWIRE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Origin the browser client is served from (CORS allow-origin)
# cors_origin = "http://localhost:3000"

# Public base URL used in verification mail links
# public_base_url = "http://localhost:8080"

# Mail relay webhook endpoint. When unset, verification links are only
# written to the log (development mode).
# mail_webhook_url = "https://mail-relay.internal/send"
"#
    .to_string()
}
