//! Per-call context and cancellation.

use crate::auth::PeerInfo;
use std::sync::Arc;
use tokio::sync::watch;

/// State threaded through a single call.
///
/// Carries what the transport knows about the caller, the identity
/// established by authentication, and the call's cancellation signal.
#[derive(Debug, Clone)]
pub struct CallContext {
    peer: Option<PeerInfo>,
    subject: Option<String>,
    cancel: CancelSignal,
}

impl CallContext {
    /// Creates a context for a call from `peer` that is never cancelled.
    #[must_use]
    pub fn new(peer: Option<PeerInfo>) -> Self {
        Self {
            peer,
            subject: None,
            cancel: CancelSignal::never(),
        }
    }

    /// Replaces the cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the transport's view of the caller.
    #[must_use]
    pub fn peer(&self) -> Option<&PeerInfo> {
        self.peer.as_ref()
    }

    /// Returns the authenticated identity, once authentication has run.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub(crate) fn set_subject(&mut self, subject: String) {
        self.subject = Some(subject);
    }

    /// Returns true if the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the call is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Cancels a call. Dropping the handle cancels too.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels the call.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    /// Keeps the sender of a signal that nobody can cancel alive.
    _never: Option<Arc<watch::Sender<bool>>>,
}

impl CancelSignal {
    /// Creates a connected handle and signal.
    #[must_use]
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx, _never: None })
    }

    /// Creates a signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _never: Some(Arc::new(tx)),
        }
    }

    /// Returns true if the call has been cancelled or its handle dropped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Completes once the call is cancelled or its handle dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // an error means the handle is gone
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
