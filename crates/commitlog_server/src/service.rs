//! The log service.

use crate::api::{ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse};
use crate::auth::{authenticate, AllowAll, Authorizer, CONSUME_ACTION, PRODUCE_ACTION, WILDCARD};
use crate::config::ServerConfig;
use crate::context::CallContext;
use crate::error::{ServerError, ServerResult};
use crate::stream::{RequestStream, ResponseSink};
use crate::tail::{Backoff, TailState, Termination};
use async_trait::async_trait;
use commitlog_core::{Log, Record};
use std::sync::Arc;
use tracing::{debug, warn, Instrument, Span};

/// Produce and consume calls over a commit log.
///
/// Every call authenticates its context before touching the log, then
/// checks the caller's permission for the action.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Appends the request's record and returns its offset.
    async fn produce(
        &self,
        ctx: &mut CallContext,
        request: Option<ProduceRequest>,
    ) -> ServerResult<ProduceResponse>;

    /// Reads the record at the requested offset.
    async fn consume(
        &self,
        ctx: &mut CallContext,
        request: Option<ConsumeRequest>,
    ) -> ServerResult<ConsumeResponse>;

    /// Produces every request from `requests`, one response each, in order.
    ///
    /// Ends with `Ok(())` when the caller stops sending.
    async fn produce_stream(
        &self,
        ctx: &mut CallContext,
        requests: &mut dyn RequestStream<ProduceRequest>,
        responses: &mut dyn ResponseSink<ProduceResponse>,
    ) -> ServerResult<()>;

    /// Sends every record from the requested offset on, waiting for records
    /// that are not written yet.
    ///
    /// Runs until the call is cancelled or fails.
    async fn consume_stream(
        &self,
        ctx: &mut CallContext,
        request: Option<ConsumeRequest>,
        responses: &mut dyn ResponseSink<ConsumeResponse>,
    ) -> ServerResult<()>;
}

/// [`LogService`] backed by a shared [`Log`].
///
/// Log operations run on tokio's blocking pool.
pub struct LogServer {
    log: Arc<Log>,
    authorizer: Arc<dyn Authorizer>,
    config: ServerConfig,
    span: Span,
}

impl LogServer {
    /// Creates a server that permits every authenticated caller.
    pub fn new(log: Arc<Log>, config: ServerConfig) -> Self {
        let span = tracing::info_span!("log_server", name = %config.name);
        Self {
            log,
            authorizer: Arc::new(AllowAll),
            config,
            span,
        }
    }

    /// Replaces the authorizer.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Returns the log being served.
    #[must_use]
    pub fn log(&self) -> &Arc<Log> {
        &self.log
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn authorize(&self, ctx: &mut CallContext, action: &str) -> ServerResult<()> {
        let subject = authenticate(ctx)?;
        self.authorizer.authorize(&subject, WILDCARD, action)
    }

    async fn append(&self, mut record: Record) -> ServerResult<u64> {
        let log = Arc::clone(&self.log);
        tokio::task::spawn_blocking(move || log.append(&mut record))
            .await
            .map_err(|e| ServerError::Internal(format!("append task failed: {e}")))?
            .map_err(ServerError::from)
    }

    async fn read(&self, offset: u64) -> ServerResult<Record> {
        let log = Arc::clone(&self.log);
        tokio::task::spawn_blocking(move || log.read(offset))
            .await
            .map_err(|e| ServerError::Internal(format!("read task failed: {e}")))?
            .map_err(ServerError::from)
    }

    async fn handle_produce(
        &self,
        ctx: &mut CallContext,
        request: Option<ProduceRequest>,
    ) -> ServerResult<ProduceResponse> {
        self.authorize(ctx, PRODUCE_ACTION)?;

        let record = request
            .and_then(|r| r.record)
            .ok_or_else(|| ServerError::invalid_argument("produce request has no record"))?;
        let offset = self.append(record).await?;

        debug!(offset, "produced");
        Ok(ProduceResponse { offset })
    }

    async fn handle_consume(
        &self,
        ctx: &mut CallContext,
        request: Option<ConsumeRequest>,
    ) -> ServerResult<ConsumeResponse> {
        self.authorize(ctx, CONSUME_ACTION)?;

        let request =
            request.ok_or_else(|| ServerError::invalid_argument("consume request is missing"))?;
        let record = self.read(request.offset).await?;
        Ok(ConsumeResponse { record })
    }

    async fn handle_produce_stream(
        &self,
        ctx: &mut CallContext,
        requests: &mut dyn RequestStream<ProduceRequest>,
        responses: &mut dyn ResponseSink<ProduceResponse>,
    ) -> ServerResult<()> {
        self.authorize(ctx, PRODUCE_ACTION)?;

        loop {
            if ctx.is_cancelled() {
                return Err(ServerError::Cancelled);
            }

            let request = tokio::select! {
                () = ctx.cancelled() => return Err(ServerError::Cancelled),
                request = requests.recv() => request?,
            };
            let Some(request) = request else {
                return Ok(());
            };

            let record = request
                .record
                .ok_or_else(|| ServerError::invalid_argument("produce request has no record"))?;
            let offset = self.append(record).await?;

            tokio::select! {
                () = ctx.cancelled() => return Err(ServerError::Cancelled),
                sent = responses.send(ProduceResponse { offset }) => sent?,
            }
        }
    }

    async fn handle_consume_stream(
        &self,
        ctx: &mut CallContext,
        request: Option<ConsumeRequest>,
        responses: &mut dyn ResponseSink<ConsumeResponse>,
    ) -> ServerResult<()> {
        self.authorize(ctx, CONSUME_ACTION)?;

        let mut offset = request
            .ok_or_else(|| ServerError::invalid_argument("consume request is missing"))?
            .offset;
        let mut backoff = Backoff::new(self.config.poll_interval, self.config.max_poll_interval);
        let mut state = TailState::Polling;
        let mut caught_up = false;

        loop {
            state = match state {
                TailState::Polling if ctx.is_cancelled() => {
                    TailState::Terminated(Termination::Cancelled)
                }
                TailState::Polling => {
                    let cancelled = caught_up && {
                        let delay = backoff.next_delay();
                        tokio::select! {
                            () = ctx.cancelled() => true,
                            () = tokio::time::sleep(delay) => false,
                        }
                    };

                    if cancelled {
                        TailState::Terminated(Termination::Cancelled)
                    } else {
                        let next = TailState::after_read(self.read(offset).await);
                        caught_up = matches!(next, TailState::Polling);
                        next
                    }
                }
                TailState::Delivering(record) => {
                    backoff.reset();
                    tokio::select! {
                        () = ctx.cancelled() => TailState::Terminated(Termination::Cancelled),
                        sent = responses.send(ConsumeResponse { record }) => match sent {
                            Ok(()) => {
                                offset += 1;
                                TailState::Polling
                            }
                            Err(e) => TailState::Terminated(Termination::Failed(e)),
                        },
                    }
                }
                TailState::Terminated(termination) => return termination.into_result(),
            };
        }
    }
}

impl std::fmt::Debug for LogServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogServer")
            .field("log", &self.log.dir())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn log_failure<T>(call: &'static str, result: ServerResult<T>) -> ServerResult<T> {
    if let Err(e) = &result {
        if e.is_server_error() {
            warn!(call, code = %e.code(), error = %e, "call failed");
        } else {
            debug!(call, code = %e.code(), error = %e, "call rejected");
        }
    }
    result
}

#[async_trait]
impl LogService for LogServer {
    async fn produce(
        &self,
        ctx: &mut CallContext,
        request: Option<ProduceRequest>,
    ) -> ServerResult<ProduceResponse> {
        let result = self
            .handle_produce(ctx, request)
            .instrument(self.span.clone())
            .await;
        log_failure("produce", result)
    }

    async fn consume(
        &self,
        ctx: &mut CallContext,
        request: Option<ConsumeRequest>,
    ) -> ServerResult<ConsumeResponse> {
        let result = self
            .handle_consume(ctx, request)
            .instrument(self.span.clone())
            .await;
        log_failure("consume", result)
    }

    async fn produce_stream(
        &self,
        ctx: &mut CallContext,
        requests: &mut dyn RequestStream<ProduceRequest>,
        responses: &mut dyn ResponseSink<ProduceResponse>,
    ) -> ServerResult<()> {
        let result = self
            .handle_produce_stream(ctx, requests, responses)
            .instrument(self.span.clone())
            .await;
        log_failure("produce_stream", result)
    }

    async fn consume_stream(
        &self,
        ctx: &mut CallContext,
        request: Option<ConsumeRequest>,
        responses: &mut dyn ResponseSink<ConsumeResponse>,
    ) -> ServerResult<()> {
        let result = self
            .handle_consume_stream(ctx, request, responses)
            .instrument(self.span.clone())
            .await;
        log_failure("consume_stream", result)
    }
}
