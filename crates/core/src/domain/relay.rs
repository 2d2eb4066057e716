//! State relay (coordinator side)
//!
//! Keeps the extension-wide [`FeatureState`] for the lifetime of the
//! coordinator and fans every toggle out to the hosted pages matching the site
//! pattern. Delivery is per page and best effort: every page is contacted
//! concurrently, failures are logged and counted, and a page that never
//! acknowledges is given up on after the acknowledgement timeout.

use crate::domain::message::{BroadcastSummary, Command, FeatureState, PageAck, Reply};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Pattern the coordinator broadcasts to by default
pub const DEFAULT_SITE_PATTERN: &str = "https://www.youtube.com/*";

/// How long one page may take to acknowledge a forwarded command
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors delivering a command to one page
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No runtime listening (page not loaded yet, or closed)
    #[error("Page {0} not ready")]
    NotReady(PageId),

    /// Runtime accepted the command but dropped the acknowledgement
    #[error("Page {0} dropped the acknowledgement")]
    NoAck(PageId),

    /// No acknowledgement within the relay's timeout
    #[error("Page {0} did not acknowledge in time")]
    TimedOut(PageId),
}

/// Identifier of a hosted page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(u64);

impl PageId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hosted page as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageId,
    pub url: String,
}

/// URL match pattern where `*` matches any run of characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlPattern(String);

impl UrlPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, url: &str) -> bool {
        let mut parts = self.0.split('*');
        // split always yields at least one element
        let first = parts.next().unwrap_or_default();
        let Some(mut rest) = url.strip_prefix(first) else {
            return false;
        };

        let parts: Vec<&str> = parts.collect();
        let Some((last, middle)) = parts.split_last() else {
            // No wildcard at all: exact match
            return rest.is_empty();
        };

        for part in middle {
            match rest.find(part) {
                Some(index) => rest = &rest[index + part.len()..],
                None => return false,
            }
        }
        rest.ends_with(last)
    }
}

impl Default for UrlPattern {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_PATTERN)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of hosted pages the relay broadcasts through
#[async_trait]
pub trait PageDirectory: Send + Sync {
    /// Pages whose URL matches `pattern`
    async fn pages(&self, pattern: &UrlPattern) -> Vec<PageInfo>;

    /// Forward one command and wait for its acknowledgement
    async fn deliver(&self, page: PageId, command: Command) -> Result<PageAck, DeliveryError>;
}

/// Coordinator state: feature toggles plus the broadcast target
pub struct StateRelay<P> {
    state: FeatureState,
    pattern: UrlPattern,
    pages: Arc<P>,
    ack_timeout: Duration,
}

impl<P: PageDirectory + 'static> StateRelay<P> {
    pub fn new(pages: P, pattern: UrlPattern, initial: FeatureState) -> Self {
        Self {
            state: initial,
            pattern,
            pages: Arc::new(pages),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    pub fn state(&self) -> FeatureState {
        self.state
    }

    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    pub fn pages(&self) -> &P {
        &self.pages
    }

    /// Handle one client command
    #[instrument(skip(self), fields(kind = command.kind()))]
    pub async fn handle(&mut self, command: Command) -> Reply {
        if !self.state.apply(&command) {
            debug!("State queried");
            return Reply::State(self.state);
        }

        info!(state = ?self.state, "Feature state updated");

        // Voice focus is forwarded with the relay's own normalised flags
        let forwarded = match command {
            Command::VoiceFocusToggle { .. } => self.state.voice_focus_command(),
            other => other,
        };
        let broadcast = self.broadcast(forwarded).await;

        Reply::Toggled {
            success: true,
            state: self.state,
            broadcast,
        }
    }

    /// Forward `command` to every matching page, one delivery per page
    ///
    /// Deliveries run concurrently; a slow or stuck page only costs its own
    /// slot in the summary.
    pub async fn broadcast(&self, command: Command) -> BroadcastSummary {
        let targets = self.pages.pages(&self.pattern).await;
        let mut summary = BroadcastSummary {
            targeted: targets.len(),
            ..BroadcastSummary::default()
        };

        let mut deliveries = JoinSet::new();
        for page in targets {
            let pages = Arc::clone(&self.pages);
            let command = command.clone();
            let timeout = self.ack_timeout;
            deliveries.spawn(async move {
                let result = match tokio::time::timeout(timeout, pages.deliver(page.id, command)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::TimedOut(page.id)),
                };
                (page, result)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((page, Ok(ack))) if ack.ok => {
                    debug!(page = %page.id, "Message delivered");
                    summary.delivered += 1;
                }
                Ok((page, Ok(ack))) => {
                    info!(page = %page.id, error = ?ack.error, "Page rejected message");
                    summary.rejected += 1;
                }
                Ok((page, Err(e))) => {
                    warn!(page = %page.id, url = %page.url, error = %e, "Page not reachable");
                    summary.unreachable += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Delivery task failed");
                    summary.unreachable += 1;
                }
            }
        }

        debug!(?summary, "Broadcast finished");
        summary
    }
}
