use clap::{Args, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration overrides shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (e.g. http://localhost:8000)
    #[arg(long, env = "ADOPPET_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Access token, the value of the `access_token` cookie
    #[arg(long, env = "ADOPPET_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
}

/// Standalone parser so configuration can be loaded from an argument list.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ConfigCli {
    #[command(flatten)]
    args: ConfigArgs,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub ui: UiConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    pub login_url: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("login_url", &self.login_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub default_avatar: String,
    /// Script URL for htmx; point it at a local copy to run offline.
    pub htmx_src: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl AppConfig {
    /// Load configuration from the process arguments.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = ConfigCli::try_parse_from(args)
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::load(&cli.args)
    }

    /// Resolve configuration.
    ///
    /// Priority: CLI flag (or its env var) > `ADOPPET_*` env > config file > defaults.
    pub fn load(args: &ConfigArgs) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("backend.base_url", "http://localhost:8000")?
            .set_default("backend.timeout_secs", 10)?
            .set_default("auth.login_url", "/login")?
            .set_default("ui.default_avatar", "/static/img/default-avatar.svg")?
            .set_default("ui.htmx_src", crate::render::DEFAULT_HTMX_SRC)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.static_dir", "static")?;

        builder = match &args.config {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            // ./adoppet.yaml, ./adoppet.toml, ... when present
            None => builder.add_source(File::with_name("adoppet").required(false)),
        };

        // E.g. ADOPPET_SERVER__PORT=8080, ADOPPET_AUTH__LOGIN_URL=/signin
        builder = builder.add_source(
            Environment::with_prefix("ADOPPET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &args.backend_url {
            builder = builder.set_override("backend.base_url", url.as_str())?;
        }
        if let Some(token) = &args.token {
            builder = builder.set_override("auth.access_token", token.as_str())?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "backend.base_url cannot be empty".to_string(),
            ));
        }
        if self.auth.login_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "auth.login_url cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout for backend calls.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Access token, ignoring blank values.
    pub fn access_token(&self) -> Option<&str> {
        self.auth
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// `host:port` the preview server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
