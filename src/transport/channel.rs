//! Channel-backed duplex transport
//!
//! A [`Connector`] yields a [`Connection`]: a bounded sender for outbound
//! JSON frames and a receiver for inbound ones. The manager's send hook
//! writes into the sender without blocking; an inbound pump task decodes
//! frames and feeds them to `MessageQueueManager::receive`.

use crate::core::error_handling::log_absorbed;
use crate::core::retry::{retry_async, RetryPolicy};
use crate::queue::api::{ConnectionQuality, HandlerId, MessageQueueManager};
use crate::transport::error::TransportError;
use crate::transport::frame::FrameCodec;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Both directions of an established connection
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

/// Opens connections to the agent backend
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable endpoint for logs and errors
    fn endpoint(&self) -> &str;

    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// Connect, retrying with exponential backoff
pub async fn connect_with_backoff<C>(connector: &C, policy: RetryPolicy) -> Result<Connection, TransportError>
where
    C: Connector + ?Sized,
{
    let connection = retry_async("transport_connect", policy, || connector.connect()).await?;
    log::info!("Connected to {}", connector.endpoint());
    Ok(connection)
}

/// Install a send hook writing encoded frames into `outbound`
///
/// A full channel is reported as a send failure so the queue retries
/// later; a closed channel marks the transport closed. When a batch only
/// partly fits, the hook reports how many frames went out so the queue
/// retries just the remainder.
pub fn bind_outbound(manager: &MessageQueueManager, outbound: mpsc::Sender<String>) -> HandlerId {
    manager.set_send_handler(move |_, dispatch| {
        let lines = FrameCodec::encode_dispatch(dispatch)?;
        let total = lines.len();
        for (sent, line) in lines.into_iter().enumerate() {
            if let Err(err) = outbound.try_send(line) {
                let err = match err {
                    mpsc::error::TrySendError::Full(_) => {
                        TransportError::Send("outbound channel full".to_string())
                    }
                    mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
                };
                return Err(if sent == 0 {
                    err
                } else {
                    TransportError::Partial {
                        sent,
                        total,
                        reason: err.to_string(),
                    }
                });
            }
        }
        Ok(())
    })
}

/// Decode inbound frames into the manager until the channel closes or
/// shutdown is broadcast; returns the number of frames received
///
/// A closed channel marks the connection offline.
pub fn spawn_inbound_pump(
    manager: Arc<MessageQueueManager>,
    mut inbound: mpsc::Receiver<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut received = 0;
        loop {
            tokio::select! {
                line = inbound.recv() => match line {
                    Some(line) => match FrameCodec::decode(&line) {
                        Ok(frame) => {
                            received += 1;
                            manager.receive(frame.class, frame.payload, frame.metadata);
                        }
                        Err(err) => log_absorbed(&err, "Dropping inbound frame"),
                    },
                    None => {
                        log::warn!("Inbound transport channel closed");
                        manager.set_connection_state(false, ConnectionQuality::Offline);
                        break;
                    }
                },
                _ = shutdown_rx.recv() => break,
            }
        }
        received
    })
}
