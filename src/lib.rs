//! Orchestrator SDK
//!
//! A Rust library for driving a UiPath Orchestrator through its REST/OData API.
//!
//! This SDK provides:
//! - Session authentication for on-premise (password) and cloud (refresh token) Orchestrators
//! - Release lookup, job start and job termination
//! - Queue transaction start
//! - Machine and robot registration
//! - Configuration loading from code, environment variables or TOML files
//!
//! # Example
//!
//! ```no_run
//! use orchestrator_sdk::{Credentials, OrchestratorSession, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load ORCHESTRATOR_URL, ORCHESTRATOR_TENANT, ...
//! let config = SessionConfig::from_env()?;
//!
//! // Authenticate; fails if the Orchestrator rejects the credentials
//! let session = OrchestratorSession::connect(config, Some(Credentials::from_env()?)).await?;
//!
//! // Start a job by release name
//! let release_key = session.resolve_release_key("Invoice").await?;
//! session.start_job(&release_key, None).await?;
//!
//! // Later, kill it again
//! session.stop_job("Invoice").await?;
//! # Ok(())
//! # }
//! ```

pub mod orchestrator_api;

// Re-export commonly used types and functions
pub use orchestrator_api::{
    auth::{AuthGrant, AuthToken, Credentials},
    client::OrchestratorSession,
    config::{CloudSettings, MatchPolicy, Mode, SessionConfig, SessionConfigBuilder},
    resources::{HostingType, Job, MachineType, NewMachine, NewRobot, Release, RobotType},
    types::{ApiError, ODataCollection, OrchestratorError},
};
