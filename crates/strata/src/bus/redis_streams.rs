//! Redis Streams transport.
//!
//! - topic: one stream, written with `XADD`
//! - subscription: one consumer group on the topic stream
//! - ack: `XACK`; a nacked entry stays in the group's pending list and is
//!   re-read from history until it has been seen `max_attempts` times, then
//!   copied to `<topic>.deadletter` and acknowledged
//! - recovery: entries idle in another consumer's pending list are moved
//!   over with `XAUTOCLAIM` (Redis 6.2+)
//!
//! Each subscriber reads on its own connection because `XREADGROUP BLOCK`
//! would stall every other command multiplexed on a shared one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use strata_core::bus::{
    Acknowledgement, BusError, BusMessage, MessageHandler, Result, TopicPublisher,
    TopicSubscriber, Transport,
};

use crate::shutdown::Shutdown;

const DATA_FIELD: &str = "data";
const ATTRIBUTE_PREFIX: &str = "attr.";
const DEAD_LETTER_SUFFIX: &str = ".deadletter";
const READ_BATCH: usize = 16;
const BLOCK_MS: usize = 1000;
const RETRY_DELAY: Duration = Duration::from_millis(250);
const CLAIM_INTERVAL: Duration = Duration::from_secs(30);
const CLAIM_MIN_IDLE: Duration = Duration::from_secs(60);

fn map_redis_error(err: redis::RedisError) -> BusError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        BusError::ConnectionFailed(err.to_string())
    } else {
        BusError::InvalidMessage(err.to_string())
    }
}

fn to_fields(message: &BusMessage) -> Vec<(String, Vec<u8>)> {
    let mut fields = Vec::with_capacity(message.attributes.len() + 1);
    fields.push((DATA_FIELD.to_string(), message.data.clone()));
    for (name, value) in &message.attributes {
        fields.push((format!("{ATTRIBUTE_PREFIX}{name}"), value.clone().into_bytes()));
    }
    fields
}

fn from_entry(entry: &StreamId) -> Option<BusMessage> {
    let data: Vec<u8> = entry.get(DATA_FIELD)?;
    let attributes = entry
        .map
        .keys()
        .filter_map(|key| {
            let name = key.strip_prefix(ATTRIBUTE_PREFIX)?;
            let value: String = entry.get(key)?;
            Some((name.to_string(), value))
        })
        .collect();
    Some(BusMessage { data, attributes })
}

/// Transport backed by Redis Streams consumer groups.
#[derive(Clone)]
pub struct RedisStreamTransport {
    client: redis::Client,
    conn: ConnectionManager,
    consumer: String,
    max_attempts: u32,
}

impl RedisStreamTransport {
    /// Connects to Redis. `consumer` names this process inside every group.
    ///
    /// Keep it stable across restarts and distinct per replica: a restarted
    /// process re-reads the entries still pending under its name.
    pub async fn new(url: &str, consumer: &str, max_attempts: u32) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(map_redis_error)?;
        Ok(Self {
            client,
            conn,
            consumer: consumer.to_string(),
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }
}

#[async_trait]
impl Transport for RedisStreamTransport {
    async fn publisher(&self, topic: &str) -> Result<Arc<dyn TopicPublisher>> {
        Ok(Arc::new(StreamPublisher {
            topic: topic.to_string(),
            conn: self.conn.clone(),
        }))
    }

    async fn subscriber(
        &self,
        subscription: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Arc<dyn TopicSubscriber>> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(topic, subscription, "$").await;
        match created {
            Ok(()) => info!(topic, group = subscription, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(topic, group = subscription, "Consumer group exists")
            }
            Err(e) => {
                return Err(BusError::SubscribeFailed {
                    subscription: subscription.to_string(),
                    message: e.to_string(),
                })
            }
        }

        Ok(Arc::new(StreamSubscriber::new(GroupReader {
            client: self.client.clone(),
            topic: topic.to_string(),
            group: subscription.to_string(),
            consumer: self.consumer.clone(),
            max_attempts: self.max_attempts,
            handler,
        })))
    }
}

struct StreamPublisher {
    topic: String,
    conn: ConnectionManager,
}

#[async_trait]
impl TopicPublisher for StreamPublisher {
    async fn send(&self, message: BusMessage) -> Result<String> {
        let mut conn = self.conn.clone();
        conn.xadd(&self.topic, "*", &to_fields(&message))
            .await
            .map_err(|e| BusError::PublishFailed {
                topic: self.topic.clone(),
                message: e.to_string(),
            })
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Waits out `RETRY_DELAY`. Returns `false` if `stop` fired first.
async fn pause(stop: &Shutdown) -> bool {
    tokio::select! {
        _ = stop.wait() => false,
        _ = tokio::time::sleep(RETRY_DELAY) => true,
    }
}

/// Splits an `XAUTOCLAIM ... JUSTID` reply into the next cursor and the
/// claimed ids. Redis 7 appends a third element (deleted ids), ignored here.
fn parse_autoclaim(reply: &[redis::Value]) -> Result<(String, Vec<String>)> {
    let (Some(next), Some(ids)) = (reply.first(), reply.get(1)) else {
        return Err(BusError::InvalidMessage(
            "malformed XAUTOCLAIM reply".to_string(),
        ));
    };
    let next: String = redis::from_redis_value(next).map_err(map_redis_error)?;
    let ids: Vec<String> = redis::from_redis_value(ids).map_err(map_redis_error)?;
    Ok((next, ids))
}

struct GroupReader {
    client: redis::Client,
    topic: String,
    group: String,
    consumer: String,
    max_attempts: u32,
    handler: Arc<dyn MessageHandler>,
}

impl GroupReader {
    async fn connect(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::SubscribeFailed {
                subscription: self.group.clone(),
                message: e.to_string(),
            })
    }

    async fn run(self: Arc<Self>, mut conn: MultiplexedConnection, stop: Shutdown) {
        let mut attempts: HashMap<String, u32> = HashMap::new();
        // Entries delivered to this consumer name but never acknowledged.
        let mut cursor = "0".to_string();
        let mut retry_pending = false;
        let mut next_claim = Instant::now();

        info!(topic = %self.topic, group = %self.group, consumer = %self.consumer, "Stream subscriber started");
        loop {
            if Instant::now() >= next_claim {
                next_claim = Instant::now() + CLAIM_INTERVAL;
                match self.claim_idle(&mut conn).await {
                    Ok(0) => {}
                    Ok(claimed) => {
                        info!(group = %self.group, claimed, "Claimed idle stream entries");
                        cursor = "0".to_string();
                    }
                    Err(e) => warn!(group = %self.group, error = %e, "XAUTOCLAIM failed"),
                }
            }

            let reply = tokio::select! {
                biased;
                _ = stop.wait() => break,
                reply = self.read(&mut conn, &cursor) => reply,
            };

            let entries = match reply {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(group = %self.group, error = %e, "Stream read failed, reconnecting");
                    if !pause(&stop).await {
                        break;
                    }
                    match self.connect().await {
                        Ok(fresh) => conn = fresh,
                        Err(e) => warn!(group = %self.group, error = %e, "Reconnect failed"),
                    }
                    continue;
                }
            };

            let reading_history = cursor != ">";
            if reading_history && entries.is_empty() {
                cursor = ">".to_string();
                if retry_pending {
                    retry_pending = false;
                    cursor = "0".to_string();
                    if !pause(&stop).await {
                        break;
                    }
                }
                continue;
            }

            for entry in &entries {
                if !self.process(&mut conn, entry, &mut attempts).await {
                    retry_pending = true;
                }
            }

            if reading_history {
                if let Some(last) = entries.last() {
                    cursor = last.id.clone();
                }
            } else if retry_pending {
                retry_pending = false;
                cursor = "0".to_string();
                if !pause(&stop).await {
                    break;
                }
            }
        }
        info!(group = %self.group, "Stream subscriber stopped");
    }

    /// Moves entries other consumers of the group left idle onto this one.
    async fn claim_idle(&self, conn: &mut MultiplexedConnection) -> Result<usize> {
        let mut start = "0-0".to_string();
        let mut claimed = 0;
        loop {
            let reply: Vec<redis::Value> = redis::cmd("XAUTOCLAIM")
                .arg(&self.topic)
                .arg(&self.group)
                .arg(&self.consumer)
                .arg(CLAIM_MIN_IDLE.as_millis() as u64)
                .arg(&start)
                .arg("COUNT")
                .arg(READ_BATCH)
                .arg("JUSTID")
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;
            let (next, ids) = parse_autoclaim(&reply)?;
            claimed += ids.len();
            if next == "0-0" {
                return Ok(claimed);
            }
            start = next;
        }
    }

    async fn read(&self, conn: &mut MultiplexedConnection, cursor: &str) -> Result<Vec<StreamId>> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(READ_BATCH)
            .block(BLOCK_MS);
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.topic], &[cursor], &options)
            .await
            .map_err(map_redis_error)?;

        Ok(reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default())
    }

    /// Handles one entry. Returns `false` when it stays pending for a retry.
    async fn process(
        &self,
        conn: &mut MultiplexedConnection,
        entry: &StreamId,
        attempts: &mut HashMap<String, u32>,
    ) -> bool {
        let seen = attempts.entry(entry.id.clone()).or_insert(0);
        *seen += 1;
        let seen = *seen;

        let outcome = match from_entry(entry) {
            Some(message) => self.handler.handle(&message).await,
            None => {
                warn!(group = %self.group, id = %entry.id, "Stream entry has no payload");
                Acknowledgement::Nack
            }
        };

        match outcome {
            Acknowledgement::Ack => {}
            Acknowledgement::Nack if seen < self.max_attempts => return false,
            Acknowledgement::Nack => {
                warn!(group = %self.group, id = %entry.id, attempts = seen, "Dead-lettering stream entry");
                if let Err(e) = self.dead_letter(conn, entry).await {
                    error!(group = %self.group, id = %entry.id, error = %e, "Dead-letter write failed");
                    return false;
                }
            }
        }

        attempts.remove(&entry.id);
        let acked: redis::RedisResult<()> = conn.xack(&self.topic, &self.group, &[&entry.id]).await;
        if let Err(e) = acked {
            warn!(group = %self.group, id = %entry.id, error = %e, "XACK failed");
        }
        true
    }

    async fn dead_letter(&self, conn: &mut MultiplexedConnection, entry: &StreamId) -> Result<()> {
        let mut fields: Vec<(String, Vec<u8>)> = match from_entry(entry) {
            Some(message) => to_fields(&message),
            None => Vec::new(),
        };
        fields.push(("sourceId".to_string(), entry.id.clone().into_bytes()));
        fields.push(("group".to_string(), self.group.clone().into_bytes()));

        let _: String = conn
            .xadd(format!("{}{DEAD_LETTER_SUFFIX}", self.topic), "*", &fields)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}

struct StreamSubscriber {
    reader: Arc<GroupReader>,
    running: Mutex<Option<(Shutdown, JoinHandle<()>)>>,
}

impl StreamSubscriber {
    fn new(reader: GroupReader) -> Self {
        Self {
            reader: Arc::new(reader),
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TopicSubscriber for StreamSubscriber {
    /// Opens the subscriber's own connection, then spawns the read loop.
    async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }
        let conn = self.reader.connect().await.inspect_err(|e| {
            error!(group = %self.reader.group, error = %e, "Subscriber could not connect");
        })?;
        let stop = Shutdown::new();
        let handle = tokio::spawn(self.reader.clone().run(conn, stop.clone()));
        *running = Some((stop, handle));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some((stop, handle)) = self.running.lock().await.take() else {
            return Ok(());
        };
        stop.trigger();
        handle.await.map_err(|e| BusError::SubscribeFailed {
            subscription: self.reader.group.clone(),
            message: e.to_string(),
        })
    }
}
