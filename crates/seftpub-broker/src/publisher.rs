//! AmqpPublisher - IDeliveryPort implementation for AMQP 0-9-1
//!
//! ## Design Notes
//!
//! - [`AmqpPublisher::run`] owns the connection. It connects, declares the
//!   topology, enables publisher confirms, publishes the channel for
//!   [`publish`](IDeliveryPort::publish) to use and then waits for either
//!   shutdown or a connection error. After an error it waits
//!   `reconnect_delay_secs` and starts over.
//! - Delivery handles come from a process-wide counter, never from the
//!   channel's delivery tag, so they stay unique across reconnects.
//! - The confirm for every publish is awaited on its own task; the result
//!   lands in the shared [`ConfirmTracker`].
//! - Every connection gets a [`ConnectionId`] whose token is cancelled once
//!   that connection is lost. Reports against an older connection never
//!   affect the current one.
//! - A connection that fails or times out during setup is closed before the
//!   next attempt.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use seftpub_core::config::BrokerConfig;
use seftpub_core::domain::DeliveryHandle;
use seftpub_core::ports::{Headers, IDeliveryPort};

use crate::confirms::{ConfirmOutcome, ConfirmTracker, PublisherStats};
use crate::BrokerError;

/// `app_id` property set on every published message
pub const APP_ID: &str = "seftpub";

/// Persistent delivery mode
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Upper bound on a connection close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One broker connection; `lost` is cancelled when it goes away
#[derive(Debug, Clone)]
struct ConnectionId {
    generation: u64,
    lost: CancellationToken,
}

/// State shared between the connection loop, publishers and confirm tasks
#[derive(Debug, Default)]
struct Shared {
    /// Generation of the connection publishes go to, 0 when not ready
    active: AtomicU64,
    generations: AtomicU64,
    channel: Mutex<Option<(ConnectionId, Channel)>>,
    next_handle: AtomicU64,
    tracker: ConfirmTracker,
}

impl Shared {
    fn begin_connection(&self) -> ConnectionId {
        ConnectionId {
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            lost: CancellationToken::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.active.load(Ordering::SeqCst) != 0
    }

    fn channel(&self) -> Option<(ConnectionId, Channel)> {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, id: ConnectionId, channel: Channel) {
        let generation = id.generation;
        *self.channel.lock().unwrap_or_else(PoisonError::into_inner) = Some((id, channel));
        self.active.store(generation, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.active.store(0, Ordering::SeqCst);
        *self.channel.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Marks `id` as lost; only clears readiness if it is still the active connection
    fn mark_lost(&self, id: &ConnectionId) {
        id.lost.cancel();
        if self
            .active
            .compare_exchange(id.generation, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let mut slot = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|(current, _)| current.generation == id.generation) {
                *slot = None;
            }
        }
    }
}

/// Publishes payloads to a topic exchange and tracks their confirmation
#[derive(Debug, Clone)]
pub struct AmqpPublisher {
    config: BrokerConfig,
    shared: Arc<Shared>,
}

impl AmqpPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Counters for published messages and their outcomes
    pub fn stats(&self) -> PublisherStats {
        self.shared.tracker.stats()
    }

    /// Maintains the broker connection until `shutdown` is cancelled
    ///
    /// Should be spawned as a background task.
    pub async fn run(&self, shutdown: CancellationToken) {
        let reconnect_delay = Duration::from_secs(self.config.reconnect_delay_secs);

        loop {
            match self.connect().await {
                Ok((connection, id)) => {
                    info!(
                        exchange = %self.config.exchange,
                        queue = %self.config.queue,
                        "Broker connection ready"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            self.shared.clear();
                            if let Err(e) = connection.close(200, "shutting down").await {
                                debug!(error = %e, "Error closing broker connection");
                            }
                            info!("Broker connection closed");
                            return;
                        }
                        _ = id.lost.cancelled() => {
                            self.shared.mark_lost(&id);
                            close_quietly(&connection).await;
                            warn!(
                                delay_secs = reconnect_delay.as_secs(),
                                "Broker connection lost, reconnecting"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        delay_secs = reconnect_delay.as_secs(),
                        "Broker connection failed, retrying"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }
    }

    /// Connects and declares the topology, bounded by `connect_timeout_secs`
    ///
    /// The connection is closed again if any setup step fails or runs out of
    /// time.
    async fn connect(&self) -> Result<(Connection, ConnectionId), BrokerError> {
        let timeout = self.config.connect_timeout_secs;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout);

        let connection = tokio::time::timeout_at(
            deadline,
            Connection::connect(&self.config.amqp_uri(), ConnectionProperties::default()),
        )
        .await
        .map_err(|_| BrokerError::Timeout(timeout))?
        .map_err(BrokerError::Connect)?;

        let setup = match tokio::time::timeout_at(deadline, self.setup(&connection)).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout(timeout)),
        };
        match setup {
            Ok(id) => Ok((connection, id)),
            Err(e) => {
                close_quietly(&connection).await;
                Err(e)
            }
        }
    }

    async fn setup(&self, connection: &Connection) -> Result<ConnectionId, BrokerError> {
        let id = self.shared.begin_connection();

        let shared = Arc::downgrade(&self.shared);
        let watched = id.clone();
        connection.on_error(move |e| {
            warn!(error = %e, "Broker connection error");
            match shared.upgrade() {
                Some(shared) => shared.mark_lost(&watched),
                None => watched.lost.cancel(),
            }
        });

        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::Connect)?;
        self.declare_topology(&channel).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|source| BrokerError::Topology {
                what: "publisher confirms",
                source,
            })?;

        self.shared.install(id.clone(), channel);
        Ok(id)
    }

    async fn declare_topology(&self, channel: &Channel) -> Result<(), BrokerError> {
        let config = &self.config;
        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                what: "exchange",
                source,
            })?;
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                what: "queue",
                source,
            })?;
        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                &config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                what: "binding",
                source,
            })?;
        debug!(
            exchange = %config.exchange,
            queue = %config.queue,
            routing_key = %config.routing_key,
            "Declared broker topology"
        );
        Ok(())
    }

    fn next_handle(&self) -> DeliveryHandle {
        DeliveryHandle::new(self.shared.next_handle.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Closes `connection`, giving up after a few seconds
async fn close_quietly(connection: &Connection) {
    if !connection.status().connected() {
        return;
    }
    match tokio::time::timeout(CLOSE_TIMEOUT, connection.close(200, "closing")).await {
        Ok(Ok(())) => debug!("Closed broker connection"),
        Ok(Err(e)) => debug!(error = %e, "Error closing broker connection"),
        Err(_) => debug!("Timed out closing broker connection"),
    }
}

/// Converts string headers into an AMQP field table
pub fn field_table(headers: &BTreeMap<String, String>) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers {
        table.insert(
            ShortString::from(key.clone()),
            AMQPValue::LongString(LongString::from(value.clone())),
        );
    }
    table
}

#[async_trait::async_trait]
impl IDeliveryPort for AmqpPublisher {
    fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    async fn publish(&self, payload: Vec<u8>, headers: Headers) -> anyhow::Result<DeliveryHandle> {
        let (id, channel) = match self.shared.channel() {
            Some(link) if self.is_ready() => link,
            _ => return Err(BrokerError::NotReady.into()),
        };

        let handle = self.next_handle();
        let properties = BasicProperties::default()
            .with_app_id(ShortString::from(APP_ID))
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_headers(field_table(&headers));

        let confirm = match channel
            .basic_publish(
                &self.config.exchange,
                &self.config.routing_key,
                BasicPublishOptions {
                    mandatory: true,
                    ..BasicPublishOptions::default()
                },
                &payload,
                properties,
            )
            .await
        {
            Ok(confirm) => confirm,
            Err(e) => {
                if !channel.status().connected() {
                    self.shared.mark_lost(&id);
                }
                return Err(BrokerError::Publish(e).into());
            }
        };

        self.shared.tracker.record_published();
        debug!(handle = %handle, bytes = payload.len(), "Published message");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = ConfirmOutcome::from_lapin(confirm.await);
            shared.tracker.record(handle, outcome);
        });

        Ok(handle)
    }

    fn is_confirmed(&self, handle: DeliveryHandle) -> bool {
        self.shared.tracker.is_confirmed(handle)
    }
}
