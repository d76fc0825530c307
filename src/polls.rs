//! Request/response client for the poll endpoints, including the one-shot
//! authoritative results pull used at startup and after a local vote.

use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::models::{NewPoll, Poll, PollUpdate, ResultSnapshot};
use crate::session::SessionProvider;

#[derive(Clone)]
pub struct PollsClient {
    http: reqwest::Client,
    base: String,
    session: Option<Arc<dyn SessionProvider>>,
}

impl PollsClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::build(config, None)
    }

    /// A client that attaches the session's bearer token to mutating
    /// requests.
    pub fn with_session(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> Self {
        Self::build(config, Some(session))
    }

    fn build(config: &ClientConfig, session: Option<Arc<dyn SessionProvider>>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("HTTP client construction failed");
        PollsClient {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub async fn list_polls(&self) -> Result<Vec<Poll>, SyncError> {
        self.get_json("/polls").await
    }

    pub async fn get_poll(&self, poll_id: &str) -> Result<Poll, SyncError> {
        self.get_json(&format!("/polls/{poll_id}")).await
    }

    /// One-shot authoritative pull of the current tallies.
    pub async fn fetch_results(&self, poll_id: &str) -> Result<ResultSnapshot, SyncError> {
        debug!("Fetching results for poll {poll_id}");
        self.get_json(&format!("/polls/{poll_id}/results")).await
    }

    pub async fn create_poll(&self, poll: &NewPoll) -> Result<Poll, SyncError> {
        let request = self.http.post(self.url("/polls")).json(poll);
        self.send_write(request).await
    }

    pub async fn update_poll(&self, poll_id: &str, update: &PollUpdate) -> Result<Poll, SyncError> {
        let request = self.http.put(self.url(&format!("/polls/{poll_id}"))).json(update);
        self.send_write(request).await
    }

    pub async fn delete_poll(&self, poll_id: &str) -> Result<(), SyncError> {
        let request = self.http.delete(self.url(&format!("/polls/{poll_id}")));
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SyncError::SubmitFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SyncError::SubmitFailed(format!(
                "DELETE /polls/{poll_id} returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.as_ref().and_then(|s| s.token()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let response = self.http.get(self.url(path)).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::FetchFailed(format!(
                "GET {path} returned {}",
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::FetchFailed(e.to_string()))
    }

    async fn send_write<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SyncError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SyncError::SubmitFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SubmitFailed(format!("server returned {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::SubmitFailed(e.to_string()))
    }
}
