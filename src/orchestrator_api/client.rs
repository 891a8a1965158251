use crate::orchestrator_api::auth::{AuthGrant, AuthToken, Credentials, TENANT_HEADER};
use crate::orchestrator_api::config::{MatchPolicy, Mode, SessionConfig};
use crate::orchestrator_api::resources::{Job, NewMachine, NewRobot, Release};
use crate::orchestrator_api::types::{
    extract_error_message, ApiError, ODataCollection, OrchestratorError, TokenResponse,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Authenticated session against a UiPath Orchestrator
///
/// A session is only handed out by [`connect`](OrchestratorSession::connect)
/// once a bearer token has been obtained. Every operation issues exactly one
/// HTTP round trip (except [`stop_job`](OrchestratorSession::stop_job), which
/// resolves the running job first) and compares the response status against
/// the single status code that operation treats as success.
#[derive(Debug, Clone)]
pub struct OrchestratorSession {
    config: SessionConfig,
    /// HTTP client for making requests
    client: reqwest::Client,
    /// Unset only after `sign_out`
    token: Option<AuthToken>,
}

/// Request payload for `StartJobs`
#[derive(Debug, Serialize)]
struct StartJobsRequest<'a> {
    #[serde(rename = "startInfo")]
    start_info: StartInfo<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartInfo<'a> {
    release_key: &'a str,
    /// The service expects the argument object serialized as a JSON string
    #[serde(skip_serializing_if = "Option::is_none")]
    input_arguments: Option<String>,
}

/// Request payload for `StopJob`
#[derive(Debug, Serialize)]
struct StopJobRequest {
    strategy: &'static str,
}

/// Only hard termination is supported
const STOP_STRATEGY: &str = "Kill";

/// Request payload for `StartTransaction`
#[derive(Debug, Serialize)]
struct StartTransactionRequest<'a> {
    #[serde(rename = "transactionData")]
    transaction_data: TransactionData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TransactionData<'a> {
    name: &'a str,
}

impl OrchestratorSession {
    /// Authenticate and open a session
    ///
    /// The grant is chosen from the configuration: on-premise sessions post
    /// the credentials to `/api/Account/Authenticate`, cloud sessions post
    /// the configured refresh token to the cloud identity service and ignore
    /// `credentials`.
    ///
    /// # Errors
    ///
    /// - `Precondition` when on-premise credentials are missing (no request is sent)
    /// - `Authentication` when the server answers anything but HTTP 200
    /// - `Api` on transport or decoding failures
    ///
    /// # Example
    ///
    /// ```no_run
    /// use orchestrator_sdk::{Credentials, OrchestratorSession, SessionConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = SessionConfig::builder("https://orchestrator.example.com", "Default").build()?;
    /// let session = OrchestratorSession::connect(
    ///     config,
    ///     Some(Credentials::new("admin", "password")),
    /// ).await?;
    ///
    /// let key = session.resolve_release_key("Invoice").await?;
    /// session.start_job(&key, None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        config: SessionConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self, OrchestratorError> {
        Self::connect_with_client(config, credentials, reqwest::Client::new()).await
    }

    /// Like [`connect`](Self::connect), using a caller-supplied HTTP client
    ///
    /// Useful to set timeouts, proxies or custom root certificates.
    pub async fn connect_with_client(
        config: SessionConfig,
        credentials: Option<Credentials>,
        client: reqwest::Client,
    ) -> Result<Self, OrchestratorError> {
        tracing::debug!(
            "Creating OrchestratorSession with base URL: {}",
            config.base_url()
        );

        let grant = AuthGrant::from_config(&config, credentials)?;
        let token = request_token(&client, &config, &grant).await?;

        Ok(Self {
            config,
            client,
            token: Some(token),
        })
    }

    /// Obtain a fresh token with the configured grant
    ///
    /// There is no automatic refresh; call this when the server starts
    /// answering 401. On failure the previous token is kept.
    pub async fn authenticate(
        &mut self,
        credentials: Option<Credentials>,
    ) -> Result<(), OrchestratorError> {
        let grant = AuthGrant::from_config(&self.config, credentials)?;
        let token = request_token(&self.client, &self.config, &grant).await?;
        self.token = Some(token);
        Ok(())
    }

    /// Drop the token; every later operation fails with `Precondition`
    pub fn sign_out(&mut self) {
        tracing::debug!("Discarding bearer token for {}", self.config.base_url());
        self.token = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Current bearer token, if any
    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the base URL for this session
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// Resolve the key of the release whose name contains `job_name`
    ///
    /// The server filters with `contains(Name,'{job_name}')`. When several
    /// releases match, the configured [`MatchPolicy`] decides between taking
    /// the first one and failing with `Ambiguous`.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the lookup succeeded but nothing matched
    /// - `Server` when the response status is not 200
    pub async fn resolve_release_key(&self, job_name: &str) -> Result<String, OrchestratorError> {
        let releases = self.find_releases(job_name).await?;
        let release = self.pick_one(
            releases,
            job_name,
            format!(
                "No release matches '{}', please check the job name",
                job_name
            ),
        )?;

        tracing::debug!("Resolved release '{}' to key {}", job_name, release.key);
        Ok(release.key)
    }

    /// All releases whose name contains `name`, in server order
    pub async fn find_releases(&self, name: &str) -> Result<Vec<Release>, OrchestratorError> {
        let filter = format!("contains(Name,'{}')", odata_literal(name));
        self.query("odata/Releases", &filter, "list releases").await
    }

    /// Start a job for a release
    ///
    /// `input_arguments` is sent as the job's input arguments when present and
    /// non-empty. Success is exactly HTTP 201.
    ///
    /// Returns the jobs the server reports as created. Callers can keep a
    /// job's `id` and later pass it to [`stop_job_by_id`](Self::stop_job_by_id)
    /// instead of resolving the job by name. The list is empty if the server
    /// sent no parseable body.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use orchestrator_sdk::OrchestratorSession;
    /// # async fn example(session: OrchestratorSession) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut args = serde_json::Map::new();
    /// args.insert("InvoiceId".to_string(), serde_json::json!("INV-001"));
    ///
    /// let jobs = session.start_job("abc-123", Some(&args)).await?;
    /// if let Some(job) = jobs.first() {
    ///     println!("Started job {}", job.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start_job(
        &self,
        release_key: &str,
        input_arguments: Option<&Map<String, Value>>,
    ) -> Result<Vec<Job>, OrchestratorError> {
        let url = self.url("odata/Jobs/UiPath.Server.Configuration.OData.StartJobs");

        let input_arguments = match input_arguments {
            Some(args) if !args.is_empty() => Some(serde_json::to_string(args).map_err(|e| {
                ApiError::Request(format!("Failed to serialize input arguments: {}", e))
            })?),
            _ => None,
        };

        let payload = StartJobsRequest {
            start_info: StartInfo {
                release_key,
                input_arguments,
            },
        };

        let request = self.request(Method::POST, &url)?.json(&payload);
        let response = self.send(request, StatusCode::CREATED, "start job").await?;

        let body = response.text().await.unwrap_or_else(|e| {
            tracing::debug!("Failed to read StartJobs response body: {}", e);
            String::new()
        });
        let jobs = if body.trim().is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str::<ODataCollection<Job>>(&body) {
                Ok(collection) => collection.value,
                Err(e) => {
                    tracing::debug!("Ignoring unparseable StartJobs response: {}", e);
                    Vec::new()
                }
            }
        };

        tracing::info!(
            "Robot job has successfully been initiated: release_key={}, jobs={}",
            release_key,
            jobs.len()
        );
        Ok(jobs)
    }

    /// Id of the running job whose release name contains `release_name`
    ///
    /// # Errors
    ///
    /// - `NotFound` when no matching job is in the `Running` state
    /// - `Server` when the response status is not 200
    pub async fn resolve_running_job_id(
        &self,
        release_name: &str,
    ) -> Result<i64, OrchestratorError> {
        let jobs = self.find_running_jobs(release_name).await?;
        let job = self.pick_one(
            jobs,
            release_name,
            format!(
                "No running job for '{}', please make sure the name of the job is correct and the job is running",
                release_name
            ),
        )?;
        Ok(job.id)
    }

    /// All running jobs whose release name contains `release_name`
    pub async fn find_running_jobs(
        &self,
        release_name: &str,
    ) -> Result<Vec<Job>, OrchestratorError> {
        let filter = format!(
            "contains(ReleaseName,'{}') and State eq 'Running'",
            odata_literal(release_name)
        );
        self.query("odata/Jobs", &filter, "list running jobs").await
    }

    /// Kill the running job for a release
    ///
    /// The job is looked up by name first; if that fails, no stop request is
    /// sent.
    pub async fn stop_job(&self, release_name: &str) -> Result<(), OrchestratorError> {
        self.ensure_authenticated()?;
        let job_id = self.resolve_running_job_id(release_name).await?;
        self.stop_job_by_id(job_id).await
    }

    /// Kill a job by id. Success is exactly HTTP 200.
    pub async fn stop_job_by_id(&self, job_id: i64) -> Result<(), OrchestratorError> {
        let url = self.url(&format!(
            "odata/Jobs({})/UiPath.Server.Configuration.OData.StopJob",
            job_id
        ));
        let payload = StopJobRequest {
            strategy: STOP_STRATEGY,
        };

        let request = self.request(Method::POST, &url)?.json(&payload);
        self.send(request, StatusCode::OK, "stop job").await?;

        tracing::info!("Robot job {} has successfully been terminated", job_id);
        Ok(())
    }

    /// Start the next transaction of a queue. Success is exactly HTTP 204.
    pub async fn start_transaction(&self, queue_name: &str) -> Result<(), OrchestratorError> {
        let url = self.url("odata/Queues/UiPathODataSvc.StartTransaction");
        let payload = StartTransactionRequest {
            transaction_data: TransactionData { name: queue_name },
        };

        let request = self.request(Method::POST, &url)?.json(&payload);
        self.send(request, StatusCode::NO_CONTENT, "start transaction")
            .await?;

        tracing::info!("Transaction has successfully been initiated for queue {}", queue_name);
        Ok(())
    }

    /// Register a standard machine. Success is exactly HTTP 201.
    pub async fn create_machine(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), OrchestratorError> {
        let url = self.url("odata/Machines");
        let payload = NewMachine::new(name, description);

        let request = self.request(Method::POST, &url)?.json(&payload);
        self.send(request, StatusCode::CREATED, "create machine").await?;

        tracing::info!("Machine {} has successfully been created", name);
        Ok(())
    }

    /// Register a robot. Success is exactly HTTP 201.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use orchestrator_sdk::{NewRobot, OrchestratorSession, RobotType};
    /// # async fn example(session: OrchestratorSession) -> Result<(), Box<dyn std::error::Error>> {
    /// let robot = NewRobot::new("BUILD-01", "nightly", "CORP\\svc_rpa", "password", "Nightly runs")
    ///     .with_robot_type(RobotType::Unattended);
    /// session.create_robot(&robot).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_robot(&self, robot: &NewRobot) -> Result<(), OrchestratorError> {
        let url = self.url("odata/Robots");

        let request = self.request(Method::POST, &url)?.json(robot);
        self.send(request, StatusCode::CREATED, "create robot").await?;

        tracing::info!(
            "Robot {} has successfully been created on machine {}",
            robot.name,
            robot.machine_name
        );
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path)
    }

    fn ensure_authenticated(&self) -> Result<&AuthToken, OrchestratorError> {
        self.token.as_ref().ok_or_else(|| {
            OrchestratorError::Precondition("You must authenticate first".to_string())
        })
    }

    /// Build an authenticated request; fails before touching the network when unauthenticated
    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, OrchestratorError> {
        let token = self.ensure_authenticated()?;

        let mut request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json")
            .header("Authorization", token.bearer());

        if let Mode::Cloud(settings) = self.config.mode() {
            request = request.header(TENANT_HEADER, &settings.tenant_logical_name);
        }

        Ok(request)
    }

    /// Send a request and require exactly `expected` as the response status
    async fn send(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
        operation: &str,
    ) -> Result<Response, OrchestratorError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send {} request: {}", operation, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        tracing::debug!("Received {} response with status: {}", operation, status);

        if status != expected {
            let message = read_error_message(response).await;
            tracing::error!(
                "Failed to {}: HTTP {} - {}",
                operation,
                status.as_u16(),
                message
            );
            return Err(OrchestratorError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// GET an OData collection with a `$filter`, expecting HTTP 200
    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: &str,
        operation: &str,
    ) -> Result<Vec<T>, OrchestratorError> {
        let url = self.url(path);
        tracing::debug!("Querying {} with $filter={}", url, filter);

        let request = self
            .request(Method::GET, &url)?
            .query(&[("$filter", filter)]);
        let response = self.send(request, StatusCode::OK, operation).await?;

        let collection: ODataCollection<T> = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse {} response: {}", operation, e);
            ApiError::Parse(format!("Failed to parse response JSON: {}", e))
        })?;

        Ok(collection.value)
    }

    /// Apply the match policy to lookup results
    fn pick_one<T>(
        &self,
        items: Vec<T>,
        name: &str,
        not_found: String,
    ) -> Result<T, OrchestratorError> {
        let count = items.len();
        if count > 1 {
            match self.config.match_policy() {
                MatchPolicy::Unique => {
                    return Err(OrchestratorError::Ambiguous {
                        name: name.to_string(),
                        count,
                    })
                }
                MatchPolicy::First => {
                    tracing::warn!(
                        "{} elements match '{}', using the first one returned by the server",
                        count,
                        name
                    );
                }
            }
        }

        items
            .into_iter()
            .next()
            .ok_or(OrchestratorError::NotFound(not_found))
    }
}

/// Run a grant against its endpoint and extract the token
async fn request_token(
    client: &reqwest::Client,
    config: &SessionConfig,
    grant: &AuthGrant,
) -> Result<AuthToken, OrchestratorError> {
    let url = grant.endpoint(config.base_url());
    tracing::info!(
        "Authenticating with Orchestrator: mode={}, tenant={}",
        grant.kind(),
        config.tenant()
    );
    tracing::debug!("Sending authentication request to: {}", url);

    let mut request = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&grant.request_body());

    if let Some(tenant_logical_name) = grant.tenant_header() {
        request = request.header(TENANT_HEADER, tenant_logical_name);
    }

    let response = request.send().await.map_err(|e| {
        tracing::error!("Failed to send authentication request: {}", e);
        ApiError::from(e)
    })?;

    let status = response.status();
    tracing::debug!("Received response with status: {}", status);

    if status != StatusCode::OK {
        let message = read_error_message(response).await;
        tracing::error!(
            "Authentication failed: HTTP {} - {}",
            status.as_u16(),
            message
        );
        return Err(OrchestratorError::Authentication {
            status: status.as_u16(),
            message,
        });
    }

    let token_response: TokenResponse = response.json().await.map_err(|e| {
        tracing::error!("Failed to parse authentication response: {}", e);
        ApiError::Parse(format!("Failed to parse response JSON: {}", e))
    })?;

    if let Some(expires_in) = token_response.expires_in {
        tracing::debug!(
            "Token type {:?} expires in {}s",
            token_response.token_type,
            expires_in
        );
    }

    let token = token_response.into_token().ok_or_else(|| {
        tracing::error!("Authentication response did not contain a token");
        OrchestratorError::Authentication {
            status: status.as_u16(),
            message: "Response contained neither 'access_token' nor 'result'".to_string(),
        }
    })?;

    tracing::info!("Authenticated");
    Ok(AuthToken::new(token))
}

/// Read a failed response body and pull out the server's message
async fn read_error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_else(|e| {
        tracing::debug!("Failed to read error response body: {}", e);
        String::new()
    });
    extract_error_message(&body)
}

/// Escape a value for use inside a single-quoted OData string literal
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}
