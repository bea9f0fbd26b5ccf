//! `nostr-sdk` backed relay pool
//!
//! One [`NostrSdkClient`] owns one `nostr_sdk::Client`. Events are signed by
//! the session's [`Signer`] before they reach the pool, so the sdk client is
//! only used for transport. A client built without a signer can still read.

use std::sync::Arc;
use std::time::Duration;

use ::url::Url;
use async_trait::async_trait;
use nostr_sdk::{Client, Event, Filter, JsonUtil, Kind, PublicKey, RelayPoolNotification};
use nostrex_core::Identity;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{NetworkClient, NetworkClientFactory};
use crate::config::SessionConfig;
use crate::error::NetworkError;
use crate::metadata::ProfileSnapshot;
use crate::signer::{EventDraft, Signer};

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

pub struct NostrSdkClient {
    client: Client,
    relays: Vec<Url>,
    signer: Option<Arc<dyn Signer>>,
    settle_delay: Duration,
    fetch_timeout: Duration,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl NostrSdkClient {
    pub fn new(
        relays: &[String],
        signer: Option<Arc<dyn Signer>>,
        settle_delay: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let relays = relays
            .iter()
            .map(|relay| {
                Url::parse(relay).map_err(|_| NetworkError::InvalidRelayUrl { url: relay.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            client: Client::default(),
            relays,
            signer,
            settle_delay,
            fetch_timeout,
            listener: Mutex::new(None),
        })
    }

    /// Log relay notices until the pool shuts down
    async fn start_listener(&self) {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return;
        }

        let mut notifications = self.client.notifications();
        *listener = Some(tokio::spawn(async move {
            while let Ok(notification) = notifications.recv().await {
                match notification {
                    RelayPoolNotification::Message { message, .. } => {
                        debug!("Relay message: {:?}", message);
                    }
                    RelayPoolNotification::Shutdown => {
                        debug!("Relay pool shut down");
                        break;
                    }
                    _ => {}
                }
            }
        }));
    }
}

#[async_trait]
impl NetworkClient for NostrSdkClient {
    fn relays(&self) -> Vec<String> {
        self.relays.iter().map(|url| url.to_string()).collect()
    }

    async fn connect(&self) -> Result<Vec<String>, NetworkError> {
        for url in &self.relays {
            self.client
                .add_relay(url.as_str())
                .await
                .map_err(|e| NetworkError::RelayRejected {
                    relay: url.to_string(),
                    reason: e.to_string(),
                })?;
        }

        self.client.connect().await;

        // Wait a bit for connections to establish
        sleep(self.settle_delay).await;

        let mut connected = Vec::new();
        for (url, relay) in self.client.relays().await {
            if relay.is_connected().await {
                connected.push(url.to_string());
            }
        }

        // Nothing came up within the settle delay
        if connected.is_empty() {
            return Err(if self.relays.is_empty() {
                NetworkError::NoRelayConnected
            } else {
                NetworkError::Timeout
            });
        }

        self.start_listener().await;
        info!(
            "Connected to {}/{} relays",
            connected.len(),
            self.relays.len()
        );
        Ok(connected)
    }

    async fn fetch_profile(
        &self,
        identity: &Identity,
    ) -> Result<Option<ProfileSnapshot>, NetworkError> {
        let author = PublicKey::from_hex(identity.raw().as_str())
            .map_err(|e| NetworkError::InvalidEvent(format!("bad author key: {}", e)))?;
        let filter = Filter::new().author(author).kind(Kind::Metadata).limit(1);

        let events = self
            .client
            .get_events_of(vec![filter], Some(self.fetch_timeout))
            .await?;
        debug!(
            "Got {} metadata events for {}",
            events.len(),
            identity.raw().short()
        );

        let mut latest: Option<ProfileSnapshot> = None;
        for event in events {
            match ProfileSnapshot::from_event_json(&event.as_json()) {
                Ok(profile) => {
                    if latest
                        .as_ref()
                        .map_or(true, |current| profile.created_at > current.created_at)
                    {
                        latest = Some(profile);
                    }
                }
                Err(e) => warn!("Skipping malformed metadata event: {}", e),
            }
        }
        Ok(latest)
    }

    async fn publish(&self, draft: EventDraft) -> Result<String, NetworkError> {
        let signer = self.signer.as_ref().ok_or(NetworkError::ReadOnly)?;
        let signed = signer.sign_event(draft).await?;
        let event = Event::from_json(serde_json::to_string(&signed)?)
            .map_err(|e| NetworkError::InvalidEvent(e.to_string()))?;

        let event_id = self.client.send_event(event).await?;
        info!("Published event {}", event_id.to_hex());
        Ok(event_id.to_hex())
    }

    async fn disconnect(&self) -> Result<(), NetworkError> {
        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }
        self.client.disconnect().await?;
        info!("Disconnected from all relays");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Factory
// ----------------------------------------------------------------------------

/// Builds [`NostrSdkClient`]s with the session's timing configuration
#[derive(Debug, Clone)]
pub struct NostrSdkClientFactory {
    settle_delay: Duration,
    fetch_timeout: Duration,
}

impl NostrSdkClientFactory {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            fetch_timeout: config.fetch_timeout,
        }
    }
}

impl NetworkClientFactory for NostrSdkClientFactory {
    fn build(
        &self,
        relays: &[String],
        signer: Option<Arc<dyn Signer>>,
    ) -> Result<Arc<dyn NetworkClient>, NetworkError> {
        let client = NostrSdkClient::new(relays, signer, self.settle_delay, self.fetch_timeout)?;
        Ok(Arc::new(client))
    }
}
