//! One poll's live results session: initial pull, push subscription, vote
//! reconciliation, teardown. This is the piece a page mounts and unmounts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::live::{ChannelEvent, LiveChannel};
use crate::models::{Poll, ResultSnapshot, Vote};
use crate::polls::PollsClient;
use crate::session::SessionProvider;
use crate::store::{ResultStore, Subscription};
use crate::votes::VoteSubmitter;

/// Live view over one poll's results.
///
/// Updates reach the store from two independent paths, the fallback fetch
/// and the push channel, in unpredictable order; the channel's stale guard
/// plus the store's idempotent replace keep the displayed tallies from
/// regressing. If the push channel never comes up the session still works,
/// it is just not live.
pub struct PollSession {
    poll: Poll,
    store: ResultStore,
    polls: PollsClient,
    votes: VoteSubmitter,
    channel: Option<LiveChannel>,
    live: Arc<AtomicBool>,
}

impl PollSession {
    /// Mount flow: fetch the poll record, pull initial results into the
    /// store and open the push subscription.
    ///
    /// A failed initial pull is transient and non-fatal. When nothing is
    /// cached yet a zero snapshot synthesized from the poll's option list
    /// keeps the view renderable; an existing snapshot is left in place.
    pub async fn open(
        config: &ClientConfig,
        session: Arc<dyn SessionProvider>,
        store: ResultStore,
        poll_id: &str,
    ) -> Result<PollSession, SyncError> {
        let polls = PollsClient::with_session(config, session.clone());
        let poll = polls.get_poll(poll_id).await?;

        match polls.fetch_results(poll_id).await {
            Ok(snapshot) => store.set(poll_id, snapshot),
            Err(e) => {
                warn!("Initial results fetch for poll {poll_id} failed: {e}");
                if store.get(poll_id).is_none() {
                    store.set(poll_id, ResultSnapshot::zero(&poll));
                }
            }
        }

        let live = Arc::new(AtomicBool::new(true));
        let channel = {
            let store = store.clone();
            let live = live.clone();
            let poll_id = poll_id.to_string();
            LiveChannel::open(
                &config.ws_url,
                config.channel.clone(),
                poll_id.clone(),
                move |event| match event {
                    ChannelEvent::Update(snapshot) => store.set(&poll_id, snapshot),
                    ChannelEvent::Degraded => {
                        live.store(false, Ordering::SeqCst);
                        warn!("Live updates degraded for poll {poll_id}, results may be stale");
                    }
                },
            )
        };

        Ok(PollSession {
            poll,
            store,
            polls,
            votes: VoteSubmitter::new(config, session),
            channel: Some(channel),
            live,
        })
    }

    pub fn poll(&self) -> &Poll {
        &self.poll
    }

    /// Latest known snapshot for this poll, from whichever path delivered
    /// it last.
    pub fn results(&self) -> Option<ResultSnapshot> {
        self.store.get(&self.poll.id)
    }

    /// False once the push channel has given up reconnecting.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ResultSnapshot) + Send + Sync + 'static,
    {
        self.store.subscribe(&self.poll.id, listener)
    }

    /// Submit a vote, then pull the authoritative tally once. The refetch
    /// covers the case where the corresponding push was missed; whichever
    /// of the two lands last wins in the store. A failed refetch is logged
    /// and swallowed since the push channel may still deliver.
    pub async fn vote(&self, option_id: &str, anonymous: bool) -> Result<Vote, SyncError> {
        let vote = self.votes.submit(&self.poll.id, option_id, anonymous).await?;
        match self.polls.fetch_results(&self.poll.id).await {
            Ok(snapshot) => self.store.set(&self.poll.id, snapshot),
            Err(e) => warn!("Post-vote refetch for poll {} failed: {e}", self.poll.id),
        }
        Ok(vote)
    }

    /// Release the push subscription. Callable more than once; dropping the
    /// session does the same.
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
    }
}
