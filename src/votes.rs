//! Vote submission and the policy around it.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::models::{Vote, VoteRequest};
use crate::session::SessionProvider;

/// Sends a vote intent over `POST /votes`.
///
/// Submission is never retried automatically: votes carry no client-side
/// dedup key, so a blind retry could double-count. The caller decides
/// whether to offer the user another attempt.
pub struct VoteSubmitter {
    http: reqwest::Client,
    base: String,
    session: Arc<dyn SessionProvider>,
}

impl VoteSubmitter {
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("HTTP client construction failed");
        VoteSubmitter {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Submit one vote. Named votes require a current session token and
    /// carry it as a bearer header; anonymous votes go out bare.
    pub async fn submit(
        &self,
        poll_id: &str,
        option_id: &str,
        anonymous: bool,
    ) -> Result<Vote, SyncError> {
        if option_id.is_empty() {
            return Err(SyncError::ValidationFailed);
        }

        let mut request = self.http.post(format!("{}/votes", self.base)).json(&VoteRequest {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            anonymous,
        });
        if !anonymous {
            if !self.session.is_authenticated() {
                return Err(SyncError::AuthRequired);
            }
            let token = self.session.token().ok_or(SyncError::AuthRequired)?;
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::SubmitFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SubmitFailed(format!("server returned {status}")));
        }
        let vote: Vote = response
            .json()
            .await
            .map_err(|e| SyncError::SubmitFailed(e.to_string()))?;
        info!("Vote {} recorded for poll {poll_id}", vote.id);
        Ok(vote)
    }
}
