//! In-process transport.
//!
//! Each subscription owns an unbounded queue. Publishing to a topic copies
//! the message into every subscription bound to that topic. A nacked
//! message is requeued until it has been delivered `max_attempts` times,
//! then moved to the subscription's dead-letter list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use strata_core::bus::{
    Acknowledgement, BusError, BusMessage, MessageHandler, Result, TopicPublisher,
    TopicSubscriber, Transport,
};

use crate::shutdown::Shutdown;

#[derive(Debug)]
struct Delivery {
    message: BusMessage,
    attempt: u32,
}

struct Binding {
    topic: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct BrokerState {
    bindings: HashMap<String, Binding>,
    published: HashMap<String, Vec<BusMessage>>,
    dead_letters: HashMap<String, Vec<BusMessage>>,
}

struct Broker {
    max_attempts: u32,
    state: Mutex<BrokerState>,
    publishers_created: AtomicUsize,
    acked: AtomicUsize,
}

impl Broker {
    fn state(&self) -> MutexGuard<'_, BrokerState> {
        // State stays consistent across a panic: every update is a single insert or push.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-memory broker shared by every handle it creates. Clones share state.
#[derive(Clone)]
pub struct MemoryTransport {
    broker: Arc<Broker>,
}

impl MemoryTransport {
    /// `max_attempts` of zero is treated as one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            broker: Arc::new(Broker {
                max_attempts: max_attempts.max(1),
                state: Mutex::new(BrokerState::default()),
                publishers_created: AtomicUsize::new(0),
                acked: AtomicUsize::new(0),
            }),
        }
    }

    /// Every message ever published to `topic`.
    pub fn published(&self, topic: &str) -> Vec<BusMessage> {
        self.broker
            .state()
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Messages that exhausted their delivery attempts on `subscription`.
    pub fn dead_letters(&self, subscription: &str) -> Vec<BusMessage> {
        self.broker
            .state()
            .dead_letters
            .get(subscription)
            .cloned()
            .unwrap_or_default()
    }

    pub fn dead_letter_count(&self, subscription: &str) -> usize {
        self.broker
            .state()
            .dead_letters
            .get(subscription)
            .map_or(0, Vec::len)
    }

    pub fn acked_count(&self) -> usize {
        self.broker.acked.load(Ordering::SeqCst)
    }

    pub fn publishers_created(&self) -> usize {
        self.broker.publishers_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publisher(&self, topic: &str) -> Result<Arc<dyn TopicPublisher>> {
        self.broker.publishers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryPublisher {
            topic: topic.to_string(),
            broker: self.broker.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn subscriber(
        &self,
        subscription: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Arc<dyn TopicSubscriber>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.broker.state().bindings.insert(
            subscription.to_string(),
            Binding {
                topic: topic.to_string(),
                tx: tx.clone(),
            },
        );

        Ok(Arc::new(MemorySubscriber {
            name: subscription.to_string(),
            broker: self.broker.clone(),
            handler,
            tx,
            rx: tokio::sync::Mutex::new(Some(rx)),
            running: tokio::sync::Mutex::new(None),
        }))
    }
}

struct MemoryPublisher {
    topic: String,
    broker: Arc<Broker>,
    closed: AtomicBool,
}

#[async_trait]
impl TopicPublisher for MemoryPublisher {
    async fn send(&self, message: BusMessage) -> Result<String> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let mut state = self.broker.state();
        for binding in state.bindings.values().filter(|b| b.topic == self.topic) {
            // A closed receiver means the subscription was replaced; skip it.
            let _ = binding.tx.send(Delivery {
                message: message.clone(),
                attempt: 1,
            });
        }
        state
            .published
            .entry(self.topic.clone())
            .or_default()
            .push(message);

        Ok(Uuid::new_v4().to_string())
    }

    async fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

type Pump = (Shutdown, JoinHandle<mpsc::UnboundedReceiver<Delivery>>);

struct MemorySubscriber {
    name: String,
    broker: Arc<Broker>,
    handler: Arc<dyn MessageHandler>,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
    running: tokio::sync::Mutex<Option<Pump>>,
}

#[async_trait]
impl TopicSubscriber for MemorySubscriber {
    async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let rx = self.rx.lock().await.take().ok_or(BusError::Closed)?;
        let stop = Shutdown::new();
        let handle = tokio::spawn(pump(
            self.name.clone(),
            self.broker.clone(),
            self.handler.clone(),
            self.tx.clone(),
            rx,
            stop.clone(),
        ));
        *running = Some((stop, handle));
        debug!(subscription = %self.name, "Started memory subscriber");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some((stop, handle)) = self.running.lock().await.take() else {
            return Ok(());
        };

        stop.trigger();
        let rx = handle.await.map_err(|e| BusError::SubscribeFailed {
            subscription: self.name.clone(),
            message: e.to_string(),
        })?;
        // Keep undelivered messages for a later restart.
        *self.rx.lock().await = Some(rx);
        debug!(subscription = %self.name, "Stopped memory subscriber");
        Ok(())
    }
}

async fn pump(
    name: String,
    broker: Arc<Broker>,
    handler: Arc<dyn MessageHandler>,
    tx: mpsc::UnboundedSender<Delivery>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    stop: Shutdown,
) -> mpsc::UnboundedReceiver<Delivery> {
    loop {
        let delivery = tokio::select! {
            biased;
            _ = stop.wait() => break,
            delivery = rx.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        match handler.handle(&delivery.message).await {
            Acknowledgement::Ack => {
                broker.acked.fetch_add(1, Ordering::SeqCst);
            }
            Acknowledgement::Nack if delivery.attempt < broker.max_attempts => {
                debug!(
                    subscription = %name,
                    attempt = delivery.attempt,
                    "Message nacked, redelivering"
                );
                let _ = tx.send(Delivery {
                    message: delivery.message,
                    attempt: delivery.attempt + 1,
                });
            }
            Acknowledgement::Nack => {
                warn!(
                    subscription = %name,
                    attempts = delivery.attempt,
                    event_id = ?delivery.message.event_id(),
                    "Message dead-lettered"
                );
                broker
                    .state()
                    .dead_letters
                    .entry(name.clone())
                    .or_default()
                    .push(delivery.message);
            }
        }
    }
    rx
}
