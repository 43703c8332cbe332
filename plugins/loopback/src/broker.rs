//! The in-process broker and its transport links.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use sensorlink::transport::{Transport, TransportError, TransportLink};

/// Capacity of each named queue.
const QUEUE_CAPACITY: usize = 1024;

struct Queue {
    tx: mpsc::Sender<Vec<u8>>,
    /// Taken by the first subscriber of the queue.
    rx: Option<mpsc::Receiver<Vec<u8>>>,
}

/// A set of named, bounded, in-memory queues shared within the process.
///
/// Cloning the broker clones a handle to the same queues. A frame sent to a
/// full queue is dropped with a warning; the broker never blocks a sender.
#[derive(Clone, Default)]
pub struct LoopbackBroker {
    queues: Arc<Mutex<FxHashMap<String, Queue>>>,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a transport endpoint for one named queue.
    pub fn transport(&self, queue: &str) -> LoopbackTransport {
        LoopbackTransport {
            broker: self.clone(),
            queue: queue.to_owned(),
        }
    }

    fn sender(&self, queue: &str) -> mpsc::Sender<Vec<u8>> {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(queue.to_owned()).or_insert_with(new_queue).tx.clone()
    }

    fn take_receiver(&self, queue: &str) -> Option<mpsc::Receiver<Vec<u8>>> {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(queue.to_owned()).or_insert_with(new_queue).rx.take()
    }
}

fn new_queue() -> Queue {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    Queue { tx, rx: Some(rx) }
}

/// A [`Transport`] connecting to one named queue of a [`LoopbackBroker`].
pub struct LoopbackTransport {
    broker: LoopbackBroker,
    queue: String,
}

impl Transport for LoopbackTransport {
    fn open(&self) -> Result<Box<dyn TransportLink>, TransportError> {
        Ok(Box::new(LoopbackLink {
            broker: self.broker.clone(),
            queue: self.queue.clone(),
            closed: false,
        }))
    }
}

struct LoopbackLink {
    broker: LoopbackBroker,
    queue: String,
    closed: bool,
}

impl TransportLink for LoopbackLink {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Send(format!("link to queue '{}' is closed", self.queue)));
        }
        match self.broker.sender(&self.queue).try_send(frame.to_vec()) {
            Ok(()) => Ok(()),
            // Overflow policy of the broker: the frame is lost, the link
            // stays usable.
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("queue '{}' is full, dropping the frame", self.queue);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(TransportError::Send(format!("queue '{}' is gone", self.queue)))
            }
        }
    }

    fn subscribe(&mut self, frames: mpsc::Sender<Vec<u8>>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Subscribe(format!(
                "link to queue '{}' is closed",
                self.queue
            )));
        }
        let mut rx = self.broker.take_receiver(&self.queue).ok_or_else(|| {
            TransportError::Subscribe(format!("queue '{}' already has a subscriber", self.queue))
        })?;

        // Forward queued frames until the subscriber goes away.
        let queue = self.queue.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = frames.closed() => break,
                    frame = rx.recv() => match frame {
                        Some(frame) => {
                            if frames.send(frame).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            log::trace!("loopback delivery for queue '{queue}' stopped");
        });
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
