//! App-session lifecycle over the clearinghouse protocol.
//!
//! A [`Session`] binds a clearinghouse channel id to the latest transmitted
//! allocation state. State versions count transmitted states: creation
//! seeds version 0, and every successful [`Session::update`] advances it by
//! exactly one. The session's async mutex is held across the transmit, so
//! only one update is ever in flight per session; a failed transmit leaves
//! the version untouched.

use std::collections::HashMap;
use std::sync::Arc;

use clearbook_types::{constants, ChannelId, Error, Result};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::client::ChannelTransport;
use crate::protocol::{
    self, AppDefinition, CloseSessionResult, CreateSessionResult, StateUpdate, WireAllocation,
};
use crate::signer::StateSigner;

struct SessionState {
    version: u64,
    allocations: Vec<WireAllocation>,
    app_data: String,
    active: bool,
}

/// One live settlement channel.
pub struct Session {
    channel_id: ChannelId,
    participants: Vec<String>,
    transport: Arc<dyn ChannelTransport>,
    signer: Arc<dyn StateSigner>,
    state: tokio::sync::Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("channel_id", &self.channel_id)
            .field("participants", &self.participants)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    #[must_use]
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    /// Version of the last transmitted state.
    pub async fn version(&self) -> u64 {
        self.state.lock().await.version
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// The allocations carried by the last transmitted state.
    pub async fn allocations(&self) -> Vec<WireAllocation> {
        self.state.lock().await.allocations.clone()
    }

    /// Sign and transmit the next state. Commits the version bump only on
    /// success; transport failures leave the session where it was.
    ///
    /// # Errors
    /// - `SessionInactive` once the session is closed
    /// - `Signing` / `Transport` / `Timeout` / `Clearinghouse` from the wire
    pub async fn update(&self, allocations: Vec<WireAllocation>, app_data: String) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.active {
            return Err(Error::SessionInactive);
        }

        let next = StateUpdate {
            version: state.version + 1,
            allocations,
            app_data,
        };
        let payload =
            serde_json::to_vec(&next).map_err(|e| Error::Serialization(e.to_string()))?;
        let signature = self.signer.sign(&payload)?;

        let request = protocol::app_session_message(self.channel_id.as_str(), next.clone(), signature)?;
        let response = self.transport.request(request).await?;
        // Any RPC-level rejection surfaces here, before we commit.
        response.into_result::<serde_json::Value>()?;

        state.version = next.version;
        state.allocations = next.allocations;
        state.app_data = next.app_data;
        debug!(channel_id = %self.channel_id, version = state.version, "channel state updated");
        Ok(())
    }

    /// Transmit a close with the final allocations and mark the session
    /// inactive. Closing an already-closed session is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.active {
            return Ok(());
        }

        let request =
            protocol::close_app_session(self.channel_id.as_str(), state.allocations.clone())?;
        let response = self.transport.request(request).await?;
        let result: CloseSessionResult = response.into_result()?;

        state.active = false;
        info!(channel_id = %result.channel_id, "channel session closed");
        Ok(())
    }
}

/// Owns every live session, keyed by channel id.
pub struct SessionManager {
    transport: Arc<dyn ChannelTransport>,
    signer: Arc<dyn StateSigner>,
    adjudicator_addr: String,
    sessions: RwLock<HashMap<ChannelId, Arc<Session>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        signer: Arc<dyn StateSigner>,
        adjudicator_addr: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            signer,
            adjudicator_addr: adjudicator_addr.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Ask the clearinghouse to open an app session and bind the returned
    /// channel id. The new session starts at version 0 with the initial
    /// allocations as its state.
    ///
    /// # Errors
    /// - `NotConnected` before authentication completes
    /// - wire errors from the create call
    pub async fn create(
        &self,
        participants: Vec<String>,
        initial_allocations: Vec<WireAllocation>,
    ) -> Result<Arc<Session>> {
        if !self.transport.is_authenticated() {
            return Err(Error::NotConnected {
                reason: "clearinghouse auth incomplete".into(),
            });
        }

        let definition = AppDefinition {
            protocol: "clearbook".to_string(),
            participants: participants.clone(),
            weights: vec![1; participants.len()],
            quorum: participants.len(),
            challenge: constants::SESSION_CHALLENGE_SECS,
            nonce: i64::from(rand::random::<u32>()),
        };
        debug!(
            adjudicator = %self.adjudicator_addr,
            participants = participants.len(),
            "creating app session"
        );

        let request = protocol::create_app_session(definition, initial_allocations.clone())?;
        let response = self.transport.request(request).await?;
        let result: CreateSessionResult = response.into_result()?;

        let session = Arc::new(Session {
            channel_id: ChannelId::new(result.channel_id),
            participants,
            transport: Arc::clone(&self.transport),
            signer: Arc::clone(&self.signer),
            state: tokio::sync::Mutex::new(SessionState {
                version: 0,
                allocations: initial_allocations,
                app_data: String::new(),
                active: true,
            }),
        });

        self.sessions
            .write()
            .insert(session.channel_id.clone(), Arc::clone(&session));
        info!(channel_id = %session.channel_id, "app session created");
        Ok(session)
    }

    /// Look up a live session.
    #[must_use]
    pub fn get(&self, channel_id: &ChannelId) -> Option<Arc<Session>> {
        self.sessions.read().get(channel_id).cloned()
    }

    /// Close a session and forget it.
    ///
    /// # Errors
    /// - `SessionNotFound` for unknown channels
    /// - wire errors from the close call (the session is still forgotten)
    pub async fn close(&self, channel_id: &ChannelId) -> Result<()> {
        let session = self
            .sessions
            .write()
            .remove(channel_id)
            .ok_or_else(|| Error::SessionNotFound(channel_id.clone()))?;

        if let Err(err) = session.close().await {
            warn!(channel_id = %channel_id, error = %err, "session close failed");
            return Err(err);
        }
        Ok(())
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}
