//! Authentication grants and bearer tokens
//!
//! The Orchestrator issues bearer tokens through two mutually exclusive flows:
//!
//! - **On-premise**: tenant, username and password are posted to
//!   `{base}/api/Account/Authenticate`; the token comes back in `result`.
//! - **Cloud**: an OAuth refresh-token grant is posted to the cloud identity
//!   service with the tenant logical name in the `X-UIPATH-TenantName` header;
//!   the token comes back in `access_token`.
//!
//! Both are modelled as variants of [`AuthGrant`], chosen once from the
//! session configuration.

use crate::orchestrator_api::config::{Mode, SessionConfig};
use crate::orchestrator_api::resources::serialize_secret;
use crate::orchestrator_api::types::OrchestratorError;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// Header carrying the tenant logical name on cloud requests
pub const TENANT_HEADER: &str = "X-UIPATH-TenantName";

/// Environment variables read by [`Credentials::from_env`]
pub const ENV_USERNAME: &str = "ORCHESTRATOR_USERNAME";
pub const ENV_PASSWORD: &str = "ORCHESTRATOR_PASSWORD";

/// Username/password pair for the on-premise flow
///
/// Consumed by authentication; the session does not keep it.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Read `ORCHESTRATOR_USERNAME` and `ORCHESTRATOR_PASSWORD`
    pub fn from_env() -> Result<Self, OrchestratorError> {
        let read = |name: &str| {
            std::env::var(name).map_err(|_| {
                OrchestratorError::Config(format!("{} environment variable is not set", name))
            })
        };
        Ok(Self::new(read(ENV_USERNAME)?, read(ENV_PASSWORD)?))
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Bearer token issued by the Orchestrator or the cloud identity service
///
/// Expiry is decided by the server and not tracked here.
#[derive(Debug, Clone)]
pub struct AuthToken(SecretString);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Value for the `Authorization` header
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// A grant mechanism that yields a bearer token
#[derive(Debug, Clone)]
pub enum AuthGrant {
    OnPremise {
        tenant: String,
        username: String,
        password: SecretString,
    },
    CloudRefreshToken {
        client_id: String,
        refresh_token: SecretString,
        tenant_logical_name: String,
        identity_url: String,
    },
}

impl AuthGrant {
    /// Select the grant for a configuration
    ///
    /// On-premise requires credentials; cloud ignores them and uses the
    /// refresh token held by the configuration.
    pub fn from_config(
        config: &SessionConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self, OrchestratorError> {
        match config.mode() {
            Mode::OnPremise => {
                let credentials = credentials.ok_or_else(|| {
                    OrchestratorError::Precondition(
                        "On-premise authentication requires a username and password".to_string(),
                    )
                })?;
                Ok(AuthGrant::OnPremise {
                    tenant: config.tenant().to_string(),
                    username: credentials.username,
                    password: credentials.password,
                })
            }
            Mode::Cloud(settings) => Ok(AuthGrant::CloudRefreshToken {
                client_id: settings.client_id.clone(),
                refresh_token: settings.refresh_token.clone(),
                tenant_logical_name: settings.tenant_logical_name.clone(),
                identity_url: settings.identity_url.clone(),
            }),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthGrant::OnPremise { .. } => "on-premise",
            AuthGrant::CloudRefreshToken { .. } => "cloud",
        }
    }

    /// Endpoint the grant is posted to
    pub(crate) fn endpoint(&self, base_url: &str) -> String {
        match self {
            AuthGrant::OnPremise { .. } => format!("{}/api/Account/Authenticate", base_url),
            AuthGrant::CloudRefreshToken { identity_url, .. } => identity_url.clone(),
        }
    }

    pub(crate) fn request_body(&self) -> AuthRequest<'_> {
        match self {
            AuthGrant::OnPremise {
                tenant,
                username,
                password,
            } => AuthRequest::Password(PasswordRequest {
                tenancy_name: tenant,
                username_or_email_address: username,
                password,
            }),
            AuthGrant::CloudRefreshToken {
                client_id,
                refresh_token,
                ..
            } => AuthRequest::RefreshToken(RefreshTokenRequest {
                grant_type: "refresh_token",
                client_id,
                refresh_token,
            }),
        }
    }

    /// Tenant header to send with the grant, cloud only
    pub(crate) fn tenant_header(&self) -> Option<&str> {
        match self {
            AuthGrant::CloudRefreshToken {
                tenant_logical_name,
                ..
            } => Some(tenant_logical_name),
            AuthGrant::OnPremise { .. } => None,
        }
    }
}

/// Request body for either grant
#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum AuthRequest<'a> {
    Password(PasswordRequest<'a>),
    RefreshToken(RefreshTokenRequest<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PasswordRequest<'a> {
    tenancy_name: &'a str,
    username_or_email_address: &'a str,
    #[serde(serialize_with = "serialize_secret_ref")]
    password: &'a SecretString,
}

#[derive(Serialize)]
pub(crate) struct RefreshTokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    #[serde(serialize_with = "serialize_secret_ref")]
    refresh_token: &'a SecretString,
}

fn serialize_secret_ref<S>(secret: &&SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serialize_secret(secret, serializer)
}
