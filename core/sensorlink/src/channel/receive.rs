//! The receive loop: asynchronous consumption of inbound messages.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::SensorMessage;
use crate::transport::TransportLink;

use super::converter::MessageConverter;
use super::error::ConsumeError;
use super::ChannelId;

/// Consumes inbound messages, one call per delivered message.
///
/// `consume` runs on the channel's receive task and must not block
/// indefinitely; no internal timeout is enforced.
pub trait Consumer: Send {
    fn consume(&mut self, msg: SensorMessage) -> Result<(), ConsumeError>;
}

impl<F> Consumer for F
where
    F: FnMut(SensorMessage) -> Result<(), ConsumeError> + Send,
{
    fn consume(&mut self, msg: SensorMessage) -> Result<(), ConsumeError> {
        self(msg)
    }
}

/// The receive task of an IN channel.
///
/// The transport pushes raw frames into a bounded queue; each frame is
/// decoded exactly once before the consumer is invoked. Decode failures are
/// logged and the frame is dropped, the loop keeps running. Owns the link
/// and releases it on exit; an in-flight `consume` call always completes.
pub(super) async fn run_receive(
    id: ChannelId,
    mut link: Box<dyn TransportLink>,
    converter: Arc<dyn MessageConverter>,
    mut consumer: Box<dyn Consumer>,
    capacity: usize,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (tx, mut frames) = mpsc::channel(capacity);
    if let Err(e) = link.subscribe(tx) {
        link.close();
        return Err(anyhow::Error::from(e)).with_context(|| format!("failed to subscribe on {id}"));
    }

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            frame = frames.recv() => match frame {
                Some(frame) => match converter.decode(&frame) {
                    Ok(msg) => match consumer.consume(msg) {
                        Ok(()) => (),
                        Err(ConsumeError::CanRetry(e)) => {
                            log::error!("Non-fatal error when consuming on {id} (message lost): {e:#}");
                        }
                        Err(ConsumeError::Fatal(e)) => {
                            log::error!("Fatal error when consuming on {id} (will stop running): {e:?}");
                            break Err(e.context(format!("fatal error when consuming on {id}")));
                        }
                    },
                    Err(e) => {
                        log::error!("Failed to decode a message on {id}, dropping it: {e}");
                    }
                },
                None => {
                    log::debug!("{id}: transport stopped delivering, the receive loop will now stop");
                    break Ok(());
                }
            },
        }
    };
    link.close();
    result
}
