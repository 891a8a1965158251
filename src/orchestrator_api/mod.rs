/// UiPath Orchestrator API integration module
///
/// This module provides the session type, authentication grants,
/// configuration loading and resource types for the Orchestrator REST/OData API.
///
/// ## Session Flow
///
/// 1. Caller builds a `SessionConfig` (builder, environment or TOML file)
/// 2. `OrchestratorSession::connect` selects the grant for the configured mode
/// 3. On-premise: credentials are exchanged at `/api/Account/Authenticate`;
///    cloud: the refresh token is exchanged at the cloud identity service
/// 4. The bearer token is kept in memory and attached to every later request
/// 5. Each operation checks the token, sends one request and compares the
///    status against its expected success code
pub mod auth;
pub mod client;
pub mod config;
pub mod resources;
pub mod types;

pub use auth::{AuthGrant, AuthToken, Credentials};
pub use client::OrchestratorSession;
pub use config::{MatchPolicy, Mode, SessionConfig, SessionConfigBuilder};
pub use resources::*;
pub use types::{ApiError, OrchestratorError};
