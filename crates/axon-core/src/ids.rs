//! Causality identifiers and the per-session sequence counter.
//!
//! Every event the kernel emits carries a `(session_id, turn_id, span_id,
//! seq, ts)` envelope. The identifier types here are branded newtypes over
//! prefixed UUIDv7 strings, so they are collision-resistant, time-ordered,
//! and self-describing in logs.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! causal_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh identifier.
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7().simple()))
            }

            /// Wrap an externally supplied identifier verbatim.
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

causal_id!(
    /// Identifies one session for its whole lifetime.
    SessionId, "sess"
);
causal_id!(
    /// Identifies one `execute` call. Fresh per turn, never reused.
    TurnId, "turn"
);
causal_id!(
    /// Identifies one nested operation within a turn (provider call, tool
    /// call, planning step).
    SpanId, "span"
);

/// A span identifier paired with its parent, for nesting operations.
///
/// Orchestrators open a root scope per step and derive child scopes for the
/// operations inside it; both ids go into the emitted event payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanScope {
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
}

impl SpanScope {
    /// A root scope with no parent.
    pub fn root() -> Self {
        Self {
            span_id: SpanId::new(),
            parent_span_id: None,
        }
    }

    /// A scope nested under this one.
    pub fn child(&self) -> Self {
        Self {
            span_id: SpanId::new(),
            parent_span_id: Some(self.span_id.clone()),
        }
    }
}

/// Per-session monotonic sequence counter.
///
/// Starts at 1 and never decreases within a session. Safe to share across
/// tasks; each `next()` returns a distinct value.
#[derive(Debug)]
pub struct SeqCounter(AtomicU64);

impl SeqCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// The next sequence number.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// The value the next call to `next()` would return.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for SeqCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Current UTC time as an ISO-8601 / RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
