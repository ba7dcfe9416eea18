//! # Commitlog Server
//!
//! Streaming produce/consume service over a commit log.
//!
//! This crate provides:
//! - [`LogService`]: produce, consume, produce stream and tailing consume
//!   stream calls
//! - [`LogServer`]: the service over a shared [`commitlog_core::Log`]
//! - Identity from mutual TLS ([`authenticate`]) and pluggable
//!   authorization ([`Authorizer`], [`AclAuthorizer`])
//! - [`LogClient`]: an in-process client over tokio channels
//!
//! # Calls
//!
//! | call             | request                  | response                      |
//! |------------------|--------------------------|-------------------------------|
//! | `produce`        | `{record}`               | `{offset}`                    |
//! | `consume`        | `{offset}`               | `{record}` or `OUT_OF_RANGE`  |
//! | `produce_stream` | stream of `{record}`     | one `{offset}` per request    |
//! | `consume_stream` | `{offset}`               | every record from `offset` on |
//!
//! A consume stream that reaches the end of the log waits for new records
//! instead of ending; it stops only when cancelled or on a real failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use commitlog_core::{Config, Log};
//! use commitlog_server::{LogClient, LogServer, PeerInfo, ServerConfig};
//! use std::sync::Arc;
//!
//! let log = Arc::new(Log::open(dir, Config::default())?);
//! let server = Arc::new(LogServer::new(log, ServerConfig::default()));
//! let client = LogClient::new(server, Some(PeerInfo::mtls(addr, "root")));
//!
//! let offset = client.produce(b"hello".to_vec()).await?;
//! let record = client.consume(offset).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod api;
mod auth;
mod client;
mod config;
mod context;
mod error;
mod service;
mod stream;
mod tail;

pub use api::{ConsumeRequest, ConsumeResponse, ProduceRequest, ProduceResponse};
pub use auth::{
    authenticate, AclAuthorizer, AclRule, AllowAll, Authorizer, PeerCertificate, PeerInfo,
    TlsInfo, CONSUME_ACTION, PRODUCE_ACTION, WILDCARD,
};
pub use client::{ConsumeStream, LogClient, ProduceStream};
pub use config::ServerConfig;
pub use context::{CallContext, CancelHandle, CancelSignal};
pub use error::{Code, ServerError, ServerResult};
pub use service::{LogServer, LogService};
pub use stream::{RequestStream, ResponseSink};
pub use tail::{Backoff, TailState, Termination};
