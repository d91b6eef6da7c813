//! Receiving side of a transport primitive's event channel.
//!
//! A connection task drains [`TransportEvents`] either with
//! [`TransportEvents::next`] or through `StreamExt` combinators.
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let (tx, events) = TransportEvents::channel(16);
//! let source = factory.create(request, tx);
//! source.stream()?;
//!
//! while let Some(event) = events.next().await {
//!     // Open, Message, Error or Closed
//! }
//! ```

use crate::transport::TransportEvent;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Events reported by one transport primitive, in arrival order.
///
/// Ends once the primitive has dropped its sender, which happens when the
/// stream task finishes or the source is closed.
pub struct TransportEvents {
    inner: ReceiverStream<TransportEvent>,
}

impl TransportEvents {
    /// Create a channel whose sender goes to a [`TransportFactory`](crate::transport::TransportFactory).
    pub fn channel(capacity: usize) -> (mpsc::Sender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, TransportEvents::new(rx))
    }

    /// Wrap an existing receiver.
    pub fn new(receiver: mpsc::Receiver<TransportEvent>) -> Self {
        TransportEvents {
            inner: ReceiverStream::new(receiver),
        }
    }

    /// Receive the next event, `None` once the primitive is gone.
    pub async fn next(&mut self) -> Option<TransportEvent> {
        StreamExt::next(&mut self.inner).await
    }
}

impl Stream for TransportEvents {
    type Item = TransportEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
