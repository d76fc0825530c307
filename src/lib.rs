//! Client-side live result synchronization for the polling service.
//!
//! After an initial fetch, a poll's tallies are kept current by a push
//! subscription, reconciled with post-vote refetches, and degraded to a
//! stale-but-usable view when the push channel is unavailable. The pieces:
//!
//! - [`ResultStore`] holds the latest snapshot per poll and fans updates
//!   out to listeners.
//! - [`PollsClient`] is the REST side: poll records, CRUD and the one-shot
//!   authoritative results pull.
//! - [`live::LiveChannel`] maintains the WebSocket subscription for one
//!   poll, with backoff reconnect and stale-update rejection.
//! - [`VoteSubmitter`] sends vote intents.
//! - [`PollSession`] wires all of the above together the way a poll detail
//!   page uses them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pollsync::{ClientConfig, MemorySession, PollSession, ResultStore};
//!
//! # async fn example() -> Result<(), pollsync::SyncError> {
//! let config = ClientConfig::from_env();
//! let session = Arc::new(MemorySession::new());
//! let store = ResultStore::new();
//!
//! let mut page = PollSession::open(&config, session, store, "some-poll-id").await?;
//! let _sub = page.subscribe(|snapshot| {
//!     println!("{} votes", snapshot.total_votes);
//! });
//! page.vote("some-option-id", true).await?;
//! page.close();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod live;
mod models;
mod polls;
mod session;
mod store;
mod sync;
mod votes;

pub use config::{ChannelConfig, ClientConfig};
pub use error::SyncError;
pub use models::{
    NewPoll, NewPollOption, OptionTally, Poll, PollId, PollOption, PollUpdate, ResultSnapshot,
    User, Vote, VoteRequest,
};
pub use polls::PollsClient;
pub use session::{MemorySession, SessionProvider};
pub use store::{ResultStore, Subscription, SubscriptionId};
pub use sync::PollSession;
pub use votes::VoteSubmitter;
