//! The send loop: periodic production of outbound messages.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::SensorMessage;
use crate::transport::TransportLink;

use super::converter::MessageConverter;
use super::error::{EnqueueError, ProduceError};
use super::ChannelId;

/// Produces outbound messages, one per send-loop iteration.
pub trait Producer: Send {
    /// Returns the next message to send, or `None` to skip this iteration.
    ///
    /// Returning [`ProduceError::NormalStop`] terminates the send loop in an
    /// expected way.
    fn produce(&mut self) -> Result<Option<SensorMessage>, ProduceError>;
}

impl<F> Producer for F
where
    F: FnMut() -> Result<Option<SensorMessage>, ProduceError> + Send,
{
    fn produce(&mut self) -> Result<Option<SensorMessage>, ProduceError> {
        self()
    }
}

/// The write half of an open OUT channel.
///
/// Enqueuing converts the message and hands the encoded frame to the
/// channel's bounded outbound queue. A full queue applies backpressure:
/// `enqueue` waits for space, it never drops.
pub struct Outbound {
    pub(super) id: ChannelId,
    pub(super) converter: Arc<dyn MessageConverter>,
    pub(super) frames: mpsc::Sender<Vec<u8>>,
}

impl Outbound {
    pub fn channel_id(&self) -> &ChannelId {
        &self.id
    }

    pub async fn enqueue(&self, msg: &SensorMessage) -> Result<(), EnqueueError> {
        self.enqueue_hint(msg, None).await
    }

    pub async fn enqueue_hint(&self, msg: &SensorMessage, hint: Option<&str>) -> Result<(), EnqueueError> {
        let frame = self.converter.encode(msg, hint)?;
        self.frames
            .send(frame)
            .await
            .map_err(|_| EnqueueError::Closed(self.id.clone()))
    }
}

/// The periodic production task of a send loop.
///
/// Cancellation is cooperative: it is observed at the top of each iteration
/// and during the (possibly blocking) enqueue, never in the middle of a
/// `produce` call. A cancellation that arrives while the enqueue is waiting
/// for queue space abandons the in-flight message.
pub(super) async fn run_produce(
    id: ChannelId,
    mut producer: Box<dyn Producer>,
    outbound: Outbound,
    interval: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        match producer.produce() {
            Ok(Some(msg)) => {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        log::debug!("{id}: send loop cancelled during enqueue, message abandoned");
                    }
                    res = outbound.enqueue(&msg) => match res {
                        Ok(()) => (),
                        Err(EnqueueError::Conversion(e)) => {
                            log::error!("Conversion failed on {id}, dropping the message: {e}");
                        }
                        Err(EnqueueError::Closed(_)) => {
                            log::warn!("Outbound queue of {id} is closed, the send loop will now stop.");
                            break;
                        }
                    },
                }
            }
            Ok(None) => (),
            Err(ProduceError::NormalStop) => {
                log::info!("Producer on {id} stopped itself.");
                break;
            }
            Err(ProduceError::CanRetry(e)) => {
                log::error!("Non-fatal error when producing on {id} (will retry): {e:#}");
            }
            Err(ProduceError::Fatal(e)) => {
                log::error!("Fatal error when producing on {id} (will stop running): {e:?}");
                return Err(e.context(format!("fatal error when producing on {id}")));
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => (),
        }
    }
    Ok(())
}

/// The drain task of an OUT channel: moves encoded frames from the bounded
/// outbound queue to the transport link. Owns the link and releases it on
/// exit.
pub(super) async fn run_drain(
    id: ChannelId,
    mut link: Box<dyn TransportLink>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = link.send(&frame) {
                        log::error!("Transport send failed on {id}, the channel will stop: {e}");
                        break Err(anyhow::Error::from(e).context(format!("transport send failed on {id}")));
                    }
                }
                // All writers are gone: nothing more to drain.
                None => break Ok(()),
            },
        }
    };
    link.close();
    result
}
