//! Message streams between caller and service.
//!
//! The service reads requests from a [`RequestStream`] and writes responses
//! to a [`ResponseSink`]. Both are implemented for tokio channels, which is
//! how [`LogClient`](crate::LogClient) connects to an in-process server.

use crate::error::{ServerError, ServerResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound half of a streaming call.
#[async_trait]
pub trait RequestStream<T: Send>: Send {
    /// Receives the next request.
    ///
    /// Returns `Ok(None)` once the caller has finished sending.
    async fn recv(&mut self) -> ServerResult<Option<T>>;
}

/// Outbound half of a streaming call.
#[async_trait]
pub trait ResponseSink<T: Send>: Send {
    /// Sends one response.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the caller is gone.
    async fn send(&mut self, item: T) -> ServerResult<()>;
}

#[async_trait]
impl<T: Send> RequestStream<T> for mpsc::Receiver<T> {
    async fn recv(&mut self) -> ServerResult<Option<T>> {
        Ok(mpsc::Receiver::recv(self).await)
    }
}

#[async_trait]
impl<T: Send> ResponseSink<T> for mpsc::Sender<T> {
    async fn send(&mut self, item: T) -> ServerResult<()> {
        mpsc::Sender::send(self, item)
            .await
            .map_err(|_| ServerError::Transport("response stream closed".into()))
    }
}
