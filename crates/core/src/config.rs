//! SIGMA client configuration

use crate::error::CoreResult;
use crate::storage::StorageKeys;
use crate::validation::{ValidateConfig, validators};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigmaConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Application paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix every page path lives under ("" for the root)
    #[serde(default)]
    pub base_path: String,
    /// Login page, relative to `base_path`
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Pages reachable without a token (substring match)
    #[serde(default = "default_public_pages")]
    pub public_pages: Vec<String>,
}

/// Token handling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_key")]
    pub token_key: String,
    #[serde(default = "default_validation_token_key")]
    pub validation_token_key: String,
    /// Shortest time the login loading state is shown
    #[serde(default = "default_min_login_duration_ms")]
    pub min_login_duration_ms: u64,
    /// API path fragments sent without a token and exempt from 401 redirects
    #[serde(default = "default_public_endpoints")]
    pub public_endpoints: Vec<String>,
}

/// One backend service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Backend services, one client each
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub users: ServiceEndpoint,
    pub main: ServiceEndpoint,
    pub audit: ServiceEndpoint,
    pub location: ServiceEndpoint,
    pub billing: ServiceEndpoint,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_public_pages() -> Vec<String> {
    ["/login", "/preregister", "/passwordRecovery", "/activate", "/completeRegister"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_token_key() -> String {
    StorageKeys::default().token
}

fn default_validation_token_key() -> String {
    StorageKeys::default().validation_token
}

fn default_min_login_duration_ms() -> u64 {
    1200
}

fn default_public_endpoints() -> Vec<String> {
    [
        "/auth/login",
        "/auth/password-reset/request",
        "/auth/password-reset/confirm",
        "/auth/resend-activation",
        "/pre-register/validate",
        "/pre-register/complete",
        "/auth/activate",
        "/type-documents",
        "/genders",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            login_path: default_login_path(),
            public_pages: default_public_pages(),
        }
    }
}

impl AppConfig {
    /// Full path of the login page
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_path.trim_end_matches('/'), self.login_path)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_key: default_token_key(),
            validation_token_key: default_validation_token_key(),
            min_login_duration_ms: default_min_login_duration_ms(),
            public_endpoints: default_public_endpoints(),
        }
    }
}

impl AuthConfig {
    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys {
            token: self.token_key.clone(),
            validation_token: self.validation_token_key.clone(),
        }
    }

    pub fn min_login_duration(&self) -> Duration {
        Duration::from_millis(self.min_login_duration_ms)
    }
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            users: ServiceEndpoint::new("http://localhost:8001", 10),
            main: ServiceEndpoint::new("http://localhost:8000", 30),
            audit: ServiceEndpoint::new("http://localhost:8002", 10),
            location: ServiceEndpoint::new("http://localhost:8003", 10),
            billing: ServiceEndpoint::new("http://localhost:8004", 30),
        }
    }
}

impl ServicesConfig {
    /// Services by name, in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ServiceEndpoint)> {
        [
            ("users", &self.users),
            ("main", &self.main),
            ("audit", &self.audit),
            ("location", &self.location),
            ("billing", &self.billing),
        ]
        .into_iter()
    }
}

/// `SIGMA__SECTION__KEY` variables; the path lists take comma-separated values
fn environment() -> Environment {
    Environment::with_prefix("SIGMA")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("auth.public_endpoints")
        .with_list_parse_key("app.public_pages")
}

impl SigmaConfig {
    /// Load configuration from defaults, common file locations and the
    /// environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        for path in ["sigma.toml", "config/sigma.toml"] {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        Self::assemble(builder, environment())
    }

    /// Load configuration from a specific file; the environment can still
    /// override it
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(File::from(path.as_ref()));
        Self::assemble(builder, environment())
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder().add_source(Config::try_from(&Self::default())?))
    }

    fn assemble(
        builder: ConfigBuilder<DefaultState>,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let config: Self = builder.add_source(environment).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl ValidateConfig for SigmaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.app.base_path.is_empty() {
            validators::validate_app_path(&self.app.base_path, "app.base_path")?;
        }
        validators::validate_app_path(&self.app.login_path, "app.login_path")?;

        validators::validate_not_empty(&self.auth.token_key, "auth.token_key")?;
        validators::validate_not_empty(
            &self.auth.validation_token_key,
            "auth.validation_token_key",
        )?;
        if self.auth.token_key == self.auth.validation_token_key {
            return Err(ConfigError::Message(
                "auth.validation_token_key: must differ from auth.token_key".into(),
            ));
        }
        validators::validate_range(
            self.auth.min_login_duration_ms,
            0,
            60_000,
            "auth.min_login_duration_ms",
        )?;

        for (name, endpoint) in self.services.iter() {
            validators::validate_url(&endpoint.base_url, &format!("services.{name}.base_url"))?;
            validators::validate_range(
                endpoint.timeout_secs,
                1,
                600,
                &format!("services.{name}.timeout_secs"),
            )?;
        }

        Ok(())
    }
}
