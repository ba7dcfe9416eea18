//! In-process client.

use crate::api::{ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse};
use crate::auth::PeerInfo;
use crate::context::{CallContext, CancelHandle, CancelSignal};
use crate::error::{ServerError, ServerResult};
use crate::service::{LogServer, LogService};
use commitlog_core::Record;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Calls a [`LogServer`] in the same process as a given peer.
///
/// Streaming calls run on their own tokio task, connected to the caller by
/// channels sized by [`ServerConfig::stream_buffer`](crate::ServerConfig).
#[derive(Debug, Clone)]
pub struct LogClient {
    server: Arc<LogServer>,
    peer: Option<PeerInfo>,
}

impl LogClient {
    /// Creates a client that presents `peer` on every call.
    #[must_use]
    pub fn new(server: Arc<LogServer>, peer: Option<PeerInfo>) -> Self {
        Self { server, peer }
    }

    fn context(&self) -> CallContext {
        CallContext::new(self.peer.clone())
    }

    /// Appends `value` and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns the server's error for the call.
    pub async fn produce(&self, value: impl Into<Vec<u8>>) -> ServerResult<u64> {
        let mut ctx = self.context();
        let response = self
            .server
            .produce(&mut ctx, Some(ProduceRequest::new(value)))
            .await?;
        Ok(response.offset)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::OffsetOutOfRange`] if there is no record there
    /// yet, or the server's error for the call.
    pub async fn consume(&self, offset: u64) -> ServerResult<Record> {
        let mut ctx = self.context();
        let response = self
            .server
            .consume(&mut ctx, Some(ConsumeRequest::new(offset)))
            .await?;
        Ok(response.record)
    }

    /// Opens a produce stream.
    #[must_use]
    pub fn produce_stream(&self) -> ProduceStream {
        let buffer = self.server.config().stream_buffer;
        let (request_tx, mut request_rx) = mpsc::channel::<ProduceRequest>(buffer);
        let (mut response_tx, response_rx) = mpsc::channel::<ProduceResponse>(buffer);
        let (cancel, signal) = CancelSignal::pair();

        let server = Arc::clone(&self.server);
        let mut ctx = self.context().with_cancel(signal);
        let task = tokio::spawn(async move {
            server
                .produce_stream(&mut ctx, &mut request_rx, &mut response_tx)
                .await
        });

        ProduceStream {
            requests: Some(request_tx),
            responses: response_rx,
            task,
            cancel,
        }
    }

    /// Opens a consume stream starting at `offset`.
    #[must_use]
    pub fn consume_stream(&self, offset: u64) -> ConsumeStream {
        let buffer = self.server.config().stream_buffer;
        let (mut response_tx, response_rx) = mpsc::channel::<ConsumeResponse>(buffer);
        let (cancel, signal) = CancelSignal::pair();

        let server = Arc::clone(&self.server);
        let mut ctx = self.context().with_cancel(signal);
        let task = tokio::spawn(async move {
            server
                .consume_stream(&mut ctx, Some(ConsumeRequest::new(offset)), &mut response_tx)
                .await
        });

        ConsumeStream {
            responses: response_rx,
            task,
            cancel,
        }
    }
}

/// Client end of a produce stream.
#[derive(Debug)]
pub struct ProduceStream {
    requests: Option<mpsc::Sender<ProduceRequest>>,
    responses: mpsc::Receiver<ProduceResponse>,
    task: JoinHandle<ServerResult<()>>,
    cancel: CancelHandle,
}

impl ProduceStream {
    /// Sends a value to be produced.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the call has already ended.
    pub async fn send(&self, value: impl Into<Vec<u8>>) -> ServerResult<()> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| ServerError::Transport("produce stream finished".into()))?;
        requests
            .send(ProduceRequest::new(value))
            .await
            .map_err(|_| ServerError::Transport("produce stream closed".into()))
    }

    /// Receives the next offset, or `None` once the call has ended.
    pub async fn recv(&mut self) -> Option<u64> {
        self.responses.recv().await.map(|r| r.offset)
    }

    /// Cancels the call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stops sending, waits for the call to end and returns the offsets not
    /// yet received.
    ///
    /// # Errors
    ///
    /// Returns the error the call ended with.
    pub async fn finish(mut self) -> ServerResult<Vec<u64>> {
        self.requests = None;

        let mut rest = Vec::new();
        while let Some(response) = self.responses.recv().await {
            rest.push(response.offset);
        }

        join(self.task).await?;
        Ok(rest)
    }
}

/// Client end of a consume stream.
#[derive(Debug)]
pub struct ConsumeStream {
    responses: mpsc::Receiver<ConsumeResponse>,
    task: JoinHandle<ServerResult<()>>,
    cancel: CancelHandle,
}

impl ConsumeStream {
    /// Receives the next record, or `None` once the call has ended.
    pub async fn recv(&mut self) -> Option<Record> {
        self.responses.recv().await.map(|r| r.record)
    }

    /// Cancels the call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels the call and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns the error the call ended with, normally
    /// [`ServerError::Cancelled`].
    pub async fn finish(self) -> ServerResult<()> {
        self.cancel.cancel();
        join(self.task).await
    }
}

async fn join(task: JoinHandle<ServerResult<()>>) -> ServerResult<()> {
    task.await
        .map_err(|e| ServerError::Internal(format!("stream task failed: {e}")))?
}
