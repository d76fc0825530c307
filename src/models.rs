use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque poll identifier assigned by the backend. Keys every snapshot and
/// subscription.
pub type PollId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub vote_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub created_by: Option<User>,
    pub multiple_choice_allowed: bool,
    pub anonymous_voting_allowed: bool,
}

/// Per-option tally inside a snapshot. `percentage` is computed by the
/// backend; the client only ever fills it in for the synthesized zero
/// snapshot, where it is 0 by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option_id: String,
    pub option_text: String,
    pub vote_count: u64,
    pub percentage: f64,
}

/// A complete, self-consistent statement of one poll's tallies at one
/// instant. Snapshots are immutable values; the store replaces them
/// wholesale and never mutates one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSnapshot {
    pub poll_id: PollId,
    pub poll_title: String,
    pub total_votes: u64,
    pub options: Vec<OptionTally>,
    /// Emission time in epoch milliseconds, monotonically intended by the
    /// backend. Used by the live channel to reject out-of-order pushes.
    pub timestamp: i64,
}

impl ResultSnapshot {
    /// Local placeholder built from the poll's option list when no snapshot
    /// has arrived and the fallback fetch itself failed. Keeps the view
    /// renderable without fabricating plausible-looking counts.
    pub fn zero(poll: &Poll) -> Self {
        ResultSnapshot {
            poll_id: poll.id.clone(),
            poll_title: poll.title.clone(),
            total_votes: 0,
            options: poll
                .options
                .iter()
                .map(|option| OptionTally {
                    option_id: option.id.clone(),
                    option_text: option.text.clone(),
                    vote_count: 0,
                    percentage: 0.0,
                })
                .collect(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Whether the per-option counts add up to `total_votes`.
    pub fn is_consistent(&self) -> bool {
        self.options.iter().map(|o| o.vote_count).sum::<u64>() == self.total_votes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub poll_id: PollId,
    pub option_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_id: PollId,
    pub option_id: String,
    pub anonymous: bool,
}

/// Body for `POST /polls`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPoll {
    pub title: String,
    pub description: String,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub multiple_choice_allowed: bool,
    pub anonymous_voting_allowed: bool,
    pub options: Vec<NewPollOption>,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPollOption {
    pub text: String,
}

/// Body for `PUT /polls/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}
