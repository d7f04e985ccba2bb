//! Synology DownloadStation backend.
//!
//! DownloadStation does not hand back a task id on create, so the locator
//! itself is the download id and the task is looked up by uri on cancel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::DownloadStationConfig;
use crate::searcher::{Release, ReleaseKind};

use super::session::Session;
use super::{CancelOutcome, DownloadClient, DownloadClientError, SessionState};

const TASK_API: &str = "/webapi/DownloadStation/task.cgi?api=SYNO.DownloadStation.Task";

/// Synology API error codes.
const ERRORS: &[(i64, &str)] = &[
    (100, "Unknown error"),
    (101, "Invalid parameter"),
    (102, "The requested API does not exist"),
    (103, "The requested method does not exist"),
    (104, "The requested version does not support the functionality"),
    (105, "The logged in session does not have permission"),
    (106, "Session timeout"),
    (107, "Session interrupted by duplicate login"),
];

/// Message for a Synology error code, "Unknown error" when unlisted.
pub fn error_message(code: i64) -> &'static str {
    ERRORS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| *message)
        .unwrap_or(ERRORS[0].1)
}

/// Codes after which the session id is no longer usable.
fn is_session_error(code: i64) -> bool {
    matches!(code, 105..=107)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorField {
    Code(i64),
    Object { code: i64 },
}

impl ApiErrorField {
    fn code(&self) -> i64 {
        match self {
            ApiErrorField::Code(code) | ApiErrorField::Object { code } => *code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiErrorField>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct Task {
    id: String,
    #[serde(default)]
    additional: Option<TaskAdditional>,
}

#[derive(Debug, Deserialize)]
struct TaskAdditional {
    #[serde(default)]
    detail: Option<TaskDetail>,
}

#[derive(Debug, Deserialize)]
struct TaskDetail {
    #[serde(default)]
    uri: String,
}

impl Task {
    fn uri(&self) -> Option<&str> {
        self.additional
            .as_ref()
            .and_then(|a| a.detail.as_ref())
            .map(|d| d.uri.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct DeleteResult {
    #[serde(default)]
    error: i64,
}

/// DownloadStation client with a per-instance session id.
pub struct DownloadStationClient {
    client: Client,
    config: DownloadStationConfig,
    session: Session<String>,
}

impl DownloadStationClient {
    pub fn new(config: DownloadStationConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build DownloadStation HTTP client, using defaults");
                Client::new()
            });
        Self {
            client,
            config,
            session: Session::new(),
        }
    }

    fn base_url(&self) -> String {
        format!(
            "{}:{}",
            self.config.host.trim_end_matches('/'),
            self.config.port
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<ApiResponse<T>, DownloadClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DownloadClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadClientError::Backend(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(DownloadClientError::from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| {
            DownloadClientError::Protocol(format!("Failed to parse response: {}", e))
        })
    }

    async fn login(&self) -> Result<String, DownloadClientError> {
        info!(client = %self.config.name, "Logging in to Synology");
        let url = format!(
            "{}/webapi/auth.cgi?api=SYNO.API.Auth&version=2&method=login&account={}&passwd={}&session=DownloadStation&format=cookie",
            self.base_url(),
            urlencoding::encode(&self.config.username),
            urlencoding::encode(&self.config.password)
        );

        let response: ApiResponse<LoginData> = self.get_json(&url).await?;
        match response.data {
            Some(data) if response.success => Ok(data.sid),
            _ => Err(DownloadClientError::AuthenticationFailed(
                "Invalid Credentials".to_string(),
            )),
        }
    }

    async fn sid(&self) -> Result<String, DownloadClientError> {
        self.session.get_or_login(|| self.login()).await
    }

    /// Turn an unsuccessful response into an error, dropping the session when it expired.
    async fn api_error<T>(&self, response: &ApiResponse<T>) -> DownloadClientError {
        let code = response.error.as_ref().map(ApiErrorField::code).unwrap_or(100);
        let message = error_message(code).to_string();
        if is_session_error(code) {
            warn!(client = %self.config.name, code = code, "DownloadStation session invalid");
            self.session.invalidate().await;
            DownloadClientError::AuthenticationFailed(message)
        } else {
            DownloadClientError::Backend(message)
        }
    }

    async fn find_task_id(
        &self,
        sid: &str,
        uri: &str,
    ) -> Result<Option<String>, DownloadClientError> {
        let url = format!(
            "{}{}&version=2&method=list&additional=detail&_sid={}",
            self.base_url(),
            TASK_API,
            sid
        );
        let response: ApiResponse<TaskList> = self.get_json(&url).await?;
        if !response.success {
            return Err(self.api_error(&response).await);
        }

        Ok(response
            .data
            .map(|list| list.tasks)
            .unwrap_or_default()
            .into_iter()
            .find(|task| task.uri() == Some(uri))
            .map(|task| task.id))
    }
}

#[async_trait]
impl DownloadClient for DownloadStationClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn backend(&self) -> &'static str {
        "download_station"
    }

    fn accepts(&self, _kind: ReleaseKind) -> bool {
        true
    }

    async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    async fn test_connection(&self) -> Result<(), DownloadClientError> {
        info!(client = %self.config.name, "Testing connection to DownloadStation");
        self.session.invalidate().await;
        self.sid().await.map(|_| ())
    }

    async fn submit(&self, release: &Release) -> Result<String, DownloadClientError> {
        let sid = self.sid().await?;
        info!(
            client = %self.config.name,
            kind = release.kind.as_str(),
            title = %release.title,
            "Sending release to DownloadStation"
        );

        let url = format!(
            "{}{}&version=2&method=create&uri={}&destination={}&_sid={}",
            self.base_url(),
            TASK_API,
            urlencoding::encode(&release.locator),
            urlencoding::encode(&self.config.destination),
            sid
        );

        let response: ApiResponse<serde_json::Value> = self.get_json(&url).await?;
        if !response.success {
            return Err(self.api_error(&response).await);
        }

        debug!(uri = %release.locator, "DownloadStation task created");
        Ok(release.locator.clone())
    }

    async fn cancel(&self, download_id: &str) -> Result<CancelOutcome, DownloadClientError> {
        let sid = self.sid().await?;
        info!(client = %self.config.name, "Cancelling download in DownloadStation");

        let Some(task_id) = self.find_task_id(&sid, download_id).await? else {
            return Ok(CancelOutcome::NotFound(
                "no DownloadStation task matches the download uri".to_string(),
            ));
        };

        let url = format!(
            "{}{}&version=1&method=delete&id={}&force_complete=false&_sid={}",
            self.base_url(),
            TASK_API,
            urlencoding::encode(&task_id),
            sid
        );
        let response: ApiResponse<Vec<DeleteResult>> = self.get_json(&url).await?;
        if !response.success {
            return Err(self.api_error(&response).await);
        }

        let code = response
            .data
            .and_then(|results| results.into_iter().next())
            .map(|r| r.error)
            .unwrap_or(0);
        if code != 0 {
            let message = error_message(code);
            error!(task_id = %task_id, error = message, "Cannot cancel DownloadStation download");
            return Err(DownloadClientError::Backend(message.to_string()));
        }

        Ok(CancelOutcome::Removed)
    }
}
