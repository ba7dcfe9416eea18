//! Caller identity and authorization.
//!
//! Identity comes from mutual TLS: the transport verifies the client's
//! certificate chain and the subject common name of the leaf certificate
//! becomes the caller's identity. [`authenticate`] extracts it once per call
//! and records it on the [`CallContext`]; an [`Authorizer`] then decides
//! whether that identity may act.
//!
//! ## Policy Format
//!
//! [`AclAuthorizer::from_policy`] reads one rule per line:
//!
//! ```text
//! p, root, *, produce
//! p, root, *, consume
//! p, reader, *, consume
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. `*` in any field
//! matches everything.

use crate::context::CallContext;
use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use std::net::SocketAddr;

/// Object name covering the whole log.
pub const WILDCARD: &str = "*";

/// Action checked for produce calls.
pub const PRODUCE_ACTION: &str = "produce";

/// Action checked for consume calls.
pub const CONSUME_ACTION: &str = "consume";

/// What the transport knows about the remote end of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Remote address.
    pub addr: SocketAddr,
    /// TLS state, if the connection is secured.
    pub tls: Option<TlsInfo>,
}

impl PeerInfo {
    /// Creates peer info for a connection without transport security.
    #[must_use]
    pub fn insecure(addr: SocketAddr) -> Self {
        Self { addr, tls: None }
    }

    /// Creates peer info for a mutual TLS connection whose verified leaf
    /// certificate has `common_name` as its subject.
    pub fn mtls(addr: SocketAddr, common_name: impl Into<String>) -> Self {
        Self {
            addr,
            tls: Some(TlsInfo {
                verified_chains: vec![vec![PeerCertificate {
                    subject_common_name: common_name.into(),
                }]],
            }),
        }
    }
}

/// TLS state of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsInfo {
    /// Certificate chains the transport verified, leaf first.
    pub verified_chains: Vec<Vec<PeerCertificate>>,
}

/// The parts of a peer certificate the service reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Subject common name.
    pub subject_common_name: String,
}

/// Establishes the caller's identity and records it on `ctx`.
///
/// The identity is the subject common name of the leaf of the first
/// verified chain.
///
/// # Errors
///
/// Returns [`ServerError::Unknown`] if the context carries no peer info, or
/// [`ServerError::Unauthenticated`] if the connection has no TLS state or no
/// verified certificate.
pub fn authenticate(ctx: &mut CallContext) -> ServerResult<String> {
    let peer = ctx
        .peer()
        .ok_or_else(|| ServerError::Unknown("couldn't find peer info".into()))?;

    let tls = peer
        .tls
        .as_ref()
        .ok_or_else(|| ServerError::Unauthenticated("no transport security being used".into()))?;

    let subject = tls
        .verified_chains
        .first()
        .and_then(|chain| chain.first())
        .map(|leaf| leaf.subject_common_name.clone())
        .ok_or_else(|| ServerError::Unauthenticated("no verified certificate chain".into()))?;

    ctx.set_subject(subject.clone());
    Ok(subject)
}

/// Decides whether an identity may perform an action on an object.
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(())` if `subject` may perform `action` on `object`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::PermissionDenied`] otherwise.
    fn authorize(&self, subject: &str, object: &str, action: &str) -> ServerResult<()>;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _subject: &str, _object: &str, _action: &str) -> ServerResult<()> {
        Ok(())
    }
}

/// A single permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    /// Identity the rule applies to, or `*`.
    pub subject: String,
    /// Object the rule applies to, or `*`.
    pub object: String,
    /// Action the rule permits, or `*`.
    pub action: String,
}

impl AclRule {
    fn matches(&self, subject: &str, object: &str, action: &str) -> bool {
        let field = |rule: &str, value: &str| rule == WILDCARD || rule == value;
        field(&self.subject, subject) && field(&self.object, object) && field(&self.action, action)
    }
}

/// Permits exactly what its rules allow.
#[derive(Debug, Default)]
pub struct AclAuthorizer {
    rules: RwLock<Vec<AclRule>>,
}

impl AclAuthorizer {
    /// Creates an authorizer that denies everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, builder style.
    #[must_use]
    pub fn allow(self, subject: &str, object: &str, action: &str) -> Self {
        self.add_rule(subject, object, action);
        self
    }

    /// Adds a rule to a live authorizer.
    pub fn add_rule(&self, subject: &str, object: &str, action: &str) {
        self.rules.write().push(AclRule {
            subject: subject.to_string(),
            object: object.to_string(),
            action: action.to_string(),
        });
    }

    /// Parses a policy text of `p, subject, object, action` lines.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidArgument`] naming the first malformed
    /// line.
    pub fn from_policy(policy: &str) -> ServerResult<Self> {
        let authorizer = Self::new();

        for (number, line) in policy.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            match fields.as_slice() {
                ["p", subject, object, action]
                    if !subject.is_empty() && !object.is_empty() && !action.is_empty() =>
                {
                    authorizer.add_rule(subject, object, action);
                }
                _ => {
                    return Err(ServerError::invalid_argument(format!(
                        "malformed policy line {}: {line}",
                        number + 1
                    )));
                }
            }
        }

        Ok(authorizer)
    }

    /// Returns a copy of the current rules.
    #[must_use]
    pub fn rules(&self) -> Vec<AclRule> {
        self.rules.read().clone()
    }
}

impl Authorizer for AclAuthorizer {
    fn authorize(&self, subject: &str, object: &str, action: &str) -> ServerResult<()> {
        let permitted = self
            .rules
            .read()
            .iter()
            .any(|rule| rule.matches(subject, object, action));

        if permitted {
            Ok(())
        } else {
            Err(ServerError::PermissionDenied {
                subject: subject.to_string(),
                object: object.to_string(),
                action: action.to_string(),
            })
        }
    }
}
