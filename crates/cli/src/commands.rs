//! CLI commands

use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Subcommand, ValueEnum};
use sigma_core::{AccessDecision, AccessRequirement, Identifier, Match, SessionState};
use sigma_http::types::{CatalogItem, LoginRequest};
use sigma_http::{AuthSession, ClientError, Method};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config;
use crate::navigator::TerminalNavigator;

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Session(SessionCommands),

    /// Generate default configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that talk to the services or read the stored session
#[derive(Subcommand)]
pub enum SessionCommands {
    /// Sign in and store the session token
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "SIGMA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Keep the token after the session ends
        #[arg(long)]
        remember: bool,
    },

    /// Drop the stored token
    Logout,

    /// Show the roles and permissions carried by the stored token
    Whoami,

    /// Check the stored token against an access requirement
    Check {
        /// Required permission id (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<Identifier>,

        /// Required role id or name (repeatable)
        #[arg(long = "role")]
        roles: Vec<Identifier>,

        /// Require every listed permission and role instead of any
        #[arg(long)]
        all: bool,
    },

    /// Send an authenticated request to one of the services
    Request {
        /// Service name
        #[arg(long, default_value = "main")]
        service: String,

        #[arg(short = 'X', long, value_enum, default_value = "get")]
        method: RequestMethod,

        /// Query parameter as KEY=VALUE (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,

        /// Path relative to the service base URL
        path: String,
    },

    /// Ask for a password reset email
    PasswordReset {
        #[arg(long)]
        email: String,
    },

    /// Activate an account with the token from the activation email
    Activate { token: String },

    /// List a public lookup table
    Catalog {
        #[arg(value_enum)]
        kind: CatalogKind,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CatalogKind {
    DocumentTypes,
    Genders,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<RequestMethod> for Method {
    fn from(method: RequestMethod) -> Self {
        match method {
            RequestMethod::Get => Self::GET,
            RequestMethod::Post => Self::POST,
            RequestMethod::Put => Self::PUT,
            RequestMethod::Delete => Self::DELETE,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration
    Generate {
        /// Output file path (defaults to DATA_DIR/sigma.toml)
        output: Option<PathBuf>,
    },
}

impl Commands {
    pub async fn execute(self, data_dir: PathBuf, config_file: Option<PathBuf>) -> Result<()> {
        match self {
            Commands::Session(command) => command.execute(data_dir, config_file).await,
            Commands::Config { command } => command.execute(data_dir),
        }
    }
}

impl SessionCommands {
    pub async fn execute(self, data_dir: PathBuf, config_file: Option<PathBuf>) -> Result<()> {
        let config = config::load_config(config_file.as_deref(), &data_dir)?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating {}", data_dir.display()))?;
        let store = config::token_store(&config, &data_dir);
        let session = AuthSession::new(&config, store, Arc::new(TerminalNavigator))?;

        match self {
            SessionCommands::Login {
                email,
                password,
                remember,
            } => login(&session, email, password, remember).await,
            SessionCommands::Logout => {
                session.logout();
                println!("Signed out");
                Ok(())
            }
            SessionCommands::Whoami => whoami(&session),
            SessionCommands::Check {
                permissions,
                roles,
                all,
            } => check(&session, permissions, roles, all),
            SessionCommands::Request {
                service,
                method,
                query,
                data,
                path,
            } => request(&session, &service, method, &query, data.as_deref(), &path).await,
            SessionCommands::PasswordReset { email } => {
                let response = session.clients().users.request_password_reset(&email).await?;
                println!(
                    "{}",
                    response
                        .message
                        .unwrap_or_else(|| format!("Password reset requested for {email}"))
                );
                Ok(())
            }
            SessionCommands::Activate { token } => {
                let response = session.clients().users.activate_account(&token).await?;
                println!(
                    "{}",
                    response.message.unwrap_or_else(|| "Account activated".to_string())
                );
                Ok(())
            }
            SessionCommands::Catalog { kind } => catalog(&session, kind).await,
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, data_dir: PathBuf) -> Result<()> {
        match self {
            ConfigCommands::Generate { output } => {
                let config_path = output.unwrap_or_else(|| data_dir.join(config::CONFIG_FILE));

                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!("Generated configuration at: {}", config_path.display());
                Ok(())
            }
        }
    }
}

async fn login(session: &AuthSession, email: String, password: String, remember: bool) -> Result<()> {
    let credentials = LoginRequest { email, password };
    let done = session
        .login(&credentials, remember, || debug!("Login gate released"))
        .await
        .map_err(|e| match e {
            ClientError::AuthenticationFailed(message) => anyhow!("Login rejected: {message}"),
            other => other.into(),
        })?;
    done.await?;

    let state = session.context().snapshot();
    println!("Signed in as {}", credentials.email);
    print_state(&state);
    Ok(())
}

fn whoami(session: &AuthSession) -> Result<()> {
    let context = session.context();
    context.initialize();
    let state = context.snapshot();

    if state.user_data.is_none() {
        bail!("Not signed in");
    }
    print_state(&state);
    Ok(())
}

fn check(
    session: &AuthSession,
    permissions: Vec<Identifier>,
    roles: Vec<Identifier>,
    all: bool,
) -> Result<()> {
    let requirement = requirement_from_args(permissions, roles, all);
    let context = session.context();
    context.initialize();

    match requirement.evaluate(&context.snapshot()) {
        AccessDecision::Granted => {
            println!("granted");
            Ok(())
        }
        AccessDecision::Denied => bail!("denied"),
        AccessDecision::Pending => bail!("session is still loading"),
    }
}

fn requirement_from_args(
    permissions: Vec<Identifier>,
    roles: Vec<Identifier>,
    all: bool,
) -> AccessRequirement {
    let mode = if all { Match::All } else { Match::Any };
    let mut requirement = AccessRequirement::new();
    if !permissions.is_empty() {
        requirement = requirement.permissions(permissions, mode);
    }
    if !roles.is_empty() {
        requirement = requirement.roles(roles, mode);
    }
    requirement
}

async fn request(
    session: &AuthSession,
    service: &str,
    method: RequestMethod,
    query: &[(String, String)],
    data: Option<&str>,
    path: &str,
) -> Result<()> {
    let client = session
        .clients()
        .get(service)
        .ok_or_else(|| anyhow!("Unknown service: {service}"))?;
    let body: Option<serde_json::Value> = data
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--data is not valid JSON")?;
    info!(service, path, ?method, "Sending request");

    let mut request = client.request(method.into(), path)?;
    if !query.is_empty() {
        request = request.query(query);
    }
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response: serde_json::Value = client.execute(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn catalog(session: &AuthSession, kind: CatalogKind) -> Result<()> {
    let users = &session.clients().users;
    let items: Vec<CatalogItem> = match kind {
        CatalogKind::DocumentTypes => users.type_documents().await?,
        CatalogKind::Genders => users.genders().await?,
    };
    for item in items {
        println!("{}\t{}", item.id, item.name);
    }
    Ok(())
}

fn print_state(state: &SessionState) {
    if let Some(exp) = state
        .user_data
        .as_ref()
        .and_then(|claims| claims.exp)
        .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0))
    {
        println!("Token expires: {}", exp.to_rfc3339());
    }

    let roles: Vec<String> = state
        .roles
        .iter()
        .map(|role| match (&role.id, &role.name) {
            (Some(id), Some(name)) => format!("{name} ({id})"),
            (Some(id), None) => id.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => "?".to_string(),
        })
        .collect();
    println!("Roles: {}", roles.join(", "));

    let permissions: Vec<String> = state
        .permissions
        .iter()
        .map(|p| format!("{} {}", p.id, p.name))
        .collect();
    println!("Permissions: {}", permissions.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use sigma_core::{Permission, SessionPhase};

    fn populated(permissions: &[i64]) -> SessionState {
        SessionState {
            phase: SessionPhase::Populated,
            permissions: permissions
                .iter()
                .map(|id| Permission::new(*id, format!("perm-{id}")))
                .collect(),
            ..SessionState::default()
        }
    }

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn config_commands_are_kept_apart_from_session_commands() {
        let parsed = Harness::try_parse_from(["sigma", "config", "generate", "out.toml"]).unwrap();
        assert!(matches!(
            parsed.command,
            Commands::Config {
                command: ConfigCommands::Generate { output: Some(_) }
            }
        ));

        let parsed = Harness::try_parse_from(["sigma", "logout"]).unwrap();
        assert!(matches!(parsed.command, Commands::Session(SessionCommands::Logout)));
    }

    #[test]
    fn request_takes_method_query_and_body() {
        let parsed = Harness::try_parse_from([
            "sigma", "request", "--service", "billing", "-X", "put", "-q", "page=2", "-q",
            "sort=date", "--data", r#"{"paid":true}"#, "/invoices/7",
        ])
        .unwrap();

        let Commands::Session(SessionCommands::Request {
            service,
            method,
            query,
            data,
            path,
        }) = parsed.command
        else {
            panic!("expected a request command");
        };
        assert_eq!(service, "billing");
        assert_eq!(method, RequestMethod::Put);
        assert_eq!(Method::from(method), Method::PUT);
        assert_eq!(
            query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "date".to_string())
            ]
        );
        assert_eq!(data.as_deref(), Some(r#"{"paid":true}"#));
        assert_eq!(path, "/invoices/7");
    }

    #[test]
    fn query_pairs_need_a_key() {
        assert_eq!(
            parse_key_value("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[tokio::test]
    async fn config_generate_runs_without_a_session() {
        let dir = tempfile::tempdir().unwrap();
        Commands::Config {
            command: ConfigCommands::Generate { output: None },
        }
        .execute(dir.path().to_path_buf(), None)
        .await
        .unwrap();

        assert!(dir.path().join(config::CONFIG_FILE).exists());
        assert!(!dir.path().join("storage.json").exists());
    }

    #[test]
    fn any_mode_needs_one_permission() {
        let requirement = requirement_from_args(vec![1.into(), 9.into()], vec![], false);
        assert_eq!(requirement.evaluate(&populated(&[1])), AccessDecision::Granted);
    }

    #[test]
    fn all_mode_needs_every_permission() {
        let requirement = requirement_from_args(vec![1.into(), 9.into()], vec![], true);
        assert_eq!(requirement.evaluate(&populated(&[1])), AccessDecision::Denied);
        assert_eq!(requirement.evaluate(&populated(&[1, 9])), AccessDecision::Granted);
    }

    #[test]
    fn no_flags_grants_any_settled_session() {
        let requirement = requirement_from_args(vec![], vec![], false);
        assert_eq!(requirement.evaluate(&populated(&[])), AccessDecision::Granted);
    }
}
