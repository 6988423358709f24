//! Rendezvous channel between the stream reader and the publisher.
//!
//! [`Sender::send`] resolves only once the receiver has taken the value, so
//! the reader can never run more than one snapshot ahead of the publisher.
//! A slow gateway throttles ingestion.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// The receiving side is gone; the value was not delivered.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("handoff receiver closed")]
pub struct Closed;

type Envelope<T> = (T, oneshot::Sender<()>);

/// Producer half of a handoff channel.
pub struct Sender<T> {
    tx: mpsc::Sender<Envelope<T>>,
}

/// Consumer half of a handoff channel.
pub struct Receiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
}

/// Creates a single-producer, single-consumer rendezvous channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (Sender { tx }, Receiver { rx })
}

impl<T> Sender<T> {
    /// Deliver `value`, waiting until the receiver has taken it.
    pub async fn send(&self, value: T) -> Result<(), Closed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx.send((value, ack_tx)).await.map_err(|_| Closed)?;
        ack_rx.await.map_err(|_| Closed)
    }

    /// Returns true once the receiver has been dropped or closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Receiver<T> {
    /// Take the next value, releasing its sender.
    ///
    /// Returns `None` once the sender is dropped. Cancel safe: a value is
    /// only acknowledged after it has been taken off the channel.
    pub async fn recv(&mut self) -> Option<T> {
        let (value, ack) = self.rx.recv().await?;
        let _ = ack.send(());
        Some(value)
    }

    /// Stop accepting values. A sender blocked in `send` fails with [`Closed`].
    pub fn close(&mut self) {
        self.rx.close();
    }
}
