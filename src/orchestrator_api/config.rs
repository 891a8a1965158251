use crate::orchestrator_api::types::OrchestratorError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;

/// Identity endpoint used for the cloud refresh-token grant
pub const DEFAULT_CLOUD_IDENTITY_URL: &str = "https://account.uipath.com/oauth/token";

/// Environment variables read by [`SessionConfig::from_env`]
pub const ENV_URL: &str = "ORCHESTRATOR_URL";
pub const ENV_TENANT: &str = "ORCHESTRATOR_TENANT";
pub const ENV_CLOUD: &str = "ORCHESTRATOR_CLOUD";
pub const ENV_TENANT_LOGICAL_NAME: &str = "ORCHESTRATOR_TENANT_LOGICAL_NAME";
pub const ENV_CLIENT_ID: &str = "ORCHESTRATOR_CLIENT_ID";
pub const ENV_REFRESH_TOKEN: &str = "ORCHESTRATOR_REFRESH_TOKEN";
pub const ENV_MATCH_POLICY: &str = "ORCHESTRATOR_MATCH_POLICY";
pub const ENV_IDENTITY_URL: &str = "ORCHESTRATOR_IDENTITY_URL";

/// How name lookups treat multiple server-side matches
///
/// Substring filters give no guarantee of a unique or stably ordered match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Take the first element the server returns (logs a warning if there are more)
    #[default]
    First,
    /// Fail with `OrchestratorError::Ambiguous` when more than one element matches
    Unique,
}

impl std::str::FromStr for MatchPolicy {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(MatchPolicy::First),
            "unique" => Ok(MatchPolicy::Unique),
            other => Err(OrchestratorError::Config(format!(
                "Unknown match policy '{}', expected 'first' or 'unique'",
                other
            ))),
        }
    }
}

/// Settings only used by the cloud refresh-token grant
#[derive(Debug, Clone)]
pub struct CloudSettings {
    pub tenant_logical_name: String,
    pub client_id: String,
    pub refresh_token: SecretString,
    pub identity_url: String,
}

/// Operating mode of the Orchestrator
#[derive(Debug, Clone)]
pub enum Mode {
    OnPremise,
    Cloud(CloudSettings),
}

/// Connection configuration for an [`OrchestratorSession`](crate::OrchestratorSession)
///
/// Immutable once built. Use [`SessionConfig::builder`], [`SessionConfig::from_env`]
/// or [`SessionConfig::from_toml_file`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    base_url: String,
    tenant: String,
    mode: Mode,
    match_policy: MatchPolicy,
}

impl SessionConfig {
    pub fn builder(base_url: impl Into<String>, tenant: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(base_url, tenant)
    }

    /// Orchestrator base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self.mode, Mode::Cloud(_))
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    /// Load configuration from `ORCHESTRATOR_*` environment variables
    ///
    /// `ORCHESTRATOR_URL` and `ORCHESTRATOR_TENANT` are required. Cloud mode is
    /// selected with `ORCHESTRATOR_CLOUD=1` (or `true`).
    pub fn from_env() -> Result<Self, OrchestratorError> {
        let base_url = require_env(ENV_URL)?;
        let tenant = require_env(ENV_TENANT)?;

        let mut builder = SessionConfigBuilder::new(base_url, tenant)
            .cloud(env_flag(ENV_CLOUD));

        if let Some(value) = optional_env(ENV_TENANT_LOGICAL_NAME) {
            builder = builder.tenant_logical_name(value);
        }
        if let Some(value) = optional_env(ENV_CLIENT_ID) {
            builder = builder.client_id(value);
        }
        if let Some(value) = optional_env(ENV_REFRESH_TOKEN) {
            builder = builder.refresh_token(value);
        }
        if let Some(value) = optional_env(ENV_IDENTITY_URL) {
            builder = builder.identity_url(value);
        }
        if let Some(value) = optional_env(ENV_MATCH_POLICY) {
            builder = builder.match_policy(value.parse()?);
        }

        builder.build()
    }

    /// Parse configuration from a TOML document
    ///
    /// ```
    /// use orchestrator_sdk::SessionConfig;
    ///
    /// let config = SessionConfig::from_toml_str(r#"
    ///     base_url = "https://orchestrator.example.com"
    ///     tenant = "Default"
    /// "#).unwrap();
    /// assert!(!config.is_cloud());
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, OrchestratorError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| OrchestratorError::Config(format!("Invalid TOML configuration: {}", e)))?;
        file.into_builder().build()
    }

    /// Read and parse a TOML configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let path = path.as_ref();
        tracing::debug!("Loading session configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

/// On-disk configuration layout
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: String,
    tenant: String,
    #[serde(default)]
    cloud: bool,
    #[serde(default)]
    tenant_logical_name: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    refresh_token: Option<SecretString>,
    #[serde(default)]
    identity_url: Option<String>,
    #[serde(default)]
    match_policy: MatchPolicy,
}

impl ConfigFile {
    fn into_builder(self) -> SessionConfigBuilder {
        SessionConfigBuilder {
            base_url: self.base_url,
            tenant: self.tenant,
            cloud: self.cloud,
            tenant_logical_name: self.tenant_logical_name,
            client_id: self.client_id,
            refresh_token: self.refresh_token,
            identity_url: self.identity_url,
            match_policy: self.match_policy,
        }
    }
}

/// Builder for [`SessionConfig`]
///
/// Mirrors the flat inputs of a session: base URL, tenant, a cloud flag and
/// the optional cloud fields. `build` enforces that cloud mode has all of them.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    base_url: String,
    tenant: String,
    cloud: bool,
    tenant_logical_name: Option<String>,
    client_id: Option<String>,
    refresh_token: Option<SecretString>,
    identity_url: Option<String>,
    match_policy: MatchPolicy,
}

impl SessionConfigBuilder {
    pub fn new(base_url: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tenant: tenant.into(),
            cloud: false,
            tenant_logical_name: None,
            client_id: None,
            refresh_token: None,
            identity_url: None,
            match_policy: MatchPolicy::default(),
        }
    }

    pub fn cloud(mut self, cloud: bool) -> Self {
        self.cloud = cloud;
        self
    }

    pub fn tenant_logical_name(mut self, name: impl Into<String>) -> Self {
        self.tenant_logical_name = Some(name.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    /// Override the cloud identity endpoint (defaults to [`DEFAULT_CLOUD_IDENTITY_URL`])
    pub fn identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = Some(url.into());
        self
    }

    pub fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    pub fn build(self) -> Result<SessionConfig, OrchestratorError> {
        let base_url = normalize_url(&self.base_url)?;

        let mode = if self.cloud {
            // Blank values count as missing, same as blank environment variables
            let tenant_logical_name = self.tenant_logical_name.filter(|v| !v.trim().is_empty());
            let client_id = self.client_id.filter(|v| !v.trim().is_empty());
            let refresh_token = self
                .refresh_token
                .filter(|v| !v.expose_secret().trim().is_empty());

            let missing: Vec<&str> = [
                ("tenant logical name", tenant_logical_name.is_none()),
                ("client id", client_id.is_none()),
                ("refresh token", refresh_token.is_none()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| *name)
            .collect();

            match (tenant_logical_name, client_id, refresh_token) {
                (Some(tenant_logical_name), Some(client_id), Some(refresh_token)) => {
                    let identity_url = match self.identity_url {
                        Some(url) => normalize_url(&url)?,
                        None => DEFAULT_CLOUD_IDENTITY_URL.to_string(),
                    };
                    Mode::Cloud(CloudSettings {
                        tenant_logical_name,
                        client_id,
                        refresh_token,
                        identity_url,
                    })
                }
                _ => {
                    return Err(OrchestratorError::Precondition(format!(
                        "Cloud mode requires {}",
                        missing.join(", ")
                    )))
                }
            }
        } else {
            Mode::OnPremise
        };

        Ok(SessionConfig {
            base_url,
            tenant: self.tenant,
            mode,
            match_policy: self.match_policy,
        })
    }
}

/// Validate an absolute http(s) URL and strip its trailing slash
fn normalize_url(raw: &str) -> Result<String, OrchestratorError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| OrchestratorError::Config(format!("Invalid URL '{}': {}", raw, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OrchestratorError::Config(format!(
            "Unsupported URL scheme '{}' in '{}'",
            parsed.scheme(),
            raw
        )));
    }

    Ok(raw.trim().trim_end_matches('/').to_string())
}

fn require_env(name: &str) -> Result<String, OrchestratorError> {
    optional_env(name)
        .ok_or_else(|| OrchestratorError::Config(format!("{} environment variable is not set", name)))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_flag(name: &str) -> bool {
    optional_env(name)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
