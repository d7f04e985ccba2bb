//! Per-instance login session shared by concurrent calls.

use std::future::Future;

use tokio::sync::Mutex;

use super::{DownloadClientError, SessionState};

/// Holds one backend session token.
///
/// Login is serialized: the first caller logs in while later callers wait on
/// the lock and then reuse the stored token. Requests themselves run outside
/// the lock.
#[derive(Debug)]
pub struct Session<T> {
    token: Mutex<Option<T>>,
}

impl<T: Clone> Session<T> {
    pub fn new() -> Self {
        Self {
            token: Mutex::new(None),
        }
    }

    /// Return the current token, logging in first if there is none.
    pub async fn get_or_login<F, Fut>(&self, login: F) -> Result<T, DownloadClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DownloadClientError>>,
    {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }
        let fresh = login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the token so the next call logs in again.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    pub async fn state(&self) -> SessionState {
        if self.token.lock().await.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::NotConnected
        }
    }
}
