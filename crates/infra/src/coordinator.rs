//! Coordinator runtime
//!
//! The event loop that owns the [`StateRelay`]. Control clients reach it
//! through a [`CoordinatorHandle`]; commands are handled one at a time in
//! mailbox order, and each reply is sent once the broadcast to every matching
//! page has finished.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use voicefocus_core::domain::message::{Command, FeatureState, Reply};
use voicefocus_core::domain::relay::{PageDirectory, StateRelay, UrlPattern};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Coordinator is not running")]
    Closed,

    #[error("Coordinator dropped the reply")]
    NoReply,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Reply>,
}

/// Client-side handle to the coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    mailbox: mpsc::Sender<Request>,
}

impl CoordinatorHandle {
    /// Send one command and wait for the reply
    pub async fn send(&self, command: Command) -> Result<Reply, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Request { command, reply })
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        response.await.map_err(|_| CoordinatorError::NoReply)
    }

    pub async fn state(&self) -> Result<FeatureState, CoordinatorError> {
        match self.send(Command::GetState).await? {
            Reply::State(state) | Reply::Toggled { state, .. } => Ok(state),
        }
    }
}

pub struct CoordinatorRuntime<P> {
    relay: StateRelay<P>,
    mailbox: mpsc::Receiver<Request>,
}

impl<P: PageDirectory + 'static> CoordinatorRuntime<P> {
    pub fn new(
        pages: P,
        pattern: UrlPattern,
        initial: FeatureState,
        capacity: usize,
    ) -> (Self, CoordinatorHandle) {
        let (tx, mailbox) = mpsc::channel(capacity.max(1));
        let runtime = Self {
            relay: StateRelay::new(pages, pattern, initial),
            mailbox,
        };
        (runtime, CoordinatorHandle { mailbox: tx })
    }

    /// Bound how long a broadcast waits for any single page
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.relay = self.relay.with_ack_timeout(timeout);
        self
    }

    pub fn spawn(self) -> JoinHandle<StateRelay<P>> {
        tokio::spawn(self.run())
    }

    /// Run until every handle is dropped, then give the relay back
    #[instrument(skip(self), fields(pattern = %self.relay.pattern()))]
    pub async fn run(mut self) -> StateRelay<P> {
        info!(state = ?self.relay.state(), "Coordinator started");

        while let Some(Request { command, reply }) = self.mailbox.recv().await {
            let response = self.relay.handle(command).await;
            if reply.send(response).is_err() {
                debug!("Client went away before the reply");
            }
        }

        info!("Coordinator stopped");
        self.relay
    }
}
