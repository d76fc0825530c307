//! Wire messages exchanged on the push channel. JSON, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::models::{PollId, ResultSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "SUBSCRIBE")]
    Subscribe {
        #[serde(rename = "pollId")]
        poll_id: PollId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "VOTE_UPDATE")]
    VoteUpdate {
        #[serde(rename = "pollId")]
        poll_id: PollId,
        result: ResultSnapshot,
    },
    /// Message types this client does not know. Ignored without error.
    #[serde(other)]
    Unknown,
}
