//! Error taxonomy
//!
//! Every backend classifies its failures into one of four kinds so callers
//! can branch on the category instead of matching message text.

use std::fmt;
use std::io;
use thiserror::Error;

/// Store operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Open,
    Set,
    Get,
    Delete,
    Clear,
    Keys,
    Close,
    Purge,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Open => "make",
            Op::Set => "set",
            Op::Get => "get",
            Op::Delete => "del",
            Op::Clear => "clr",
            Op::Keys => "keys",
            Op::Close => "close",
            Op::Purge => "prg",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an error happened: backend, operation and (optionally) key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpContext {
    pub backend: &'static str,
    pub op: Op,
    pub key: Option<String>,
}

impl OpContext {
    pub fn new(backend: &'static str, op: Op) -> Self {
        Self {
            backend,
            op,
            key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }
}

impl fmt::Display for OpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.backend, self.op)?;
        if let Some(key) = &self.key {
            write!(f, " {}", key)?;
        }
        Ok(())
    }
}

/// Error category, stable across backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Permission denied on the backing resource
    Unauthorized,
    /// Unrecoverable I/O or encoding failure
    Halted,
    /// Read of an absent key
    NotFound,
    /// Reserved for backends that talk to something remote
    Unreachable,
}

/// Underlying reason for a `Halted` error
#[derive(Debug, Error)]
pub enum HaltCause {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("lock poisoned")]
    Poisoned,

    #[error("store closed")]
    Closed,
}

/// Store error
#[derive(Debug, Error)]
pub enum KvError {
    #[error("unauthorized {context}: {source}")]
    Unauthorized {
        context: OpContext,
        #[source]
        source: io::Error,
    },

    #[error("halted {context}: {source}")]
    Halted {
        context: OpContext,
        #[source]
        source: HaltCause,
    },

    #[error("not found {context}")]
    NotFound { context: OpContext },

    #[error("unreachable {context}: {reason}")]
    Unreachable { context: OpContext, reason: String },
}

pub type Result<T> = std::result::Result<T, KvError>;

impl KvError {
    pub fn not_found(context: OpContext) -> Self {
        Self::NotFound { context }
    }

    pub fn halted(context: OpContext, cause: impl Into<HaltCause>) -> Self {
        Self::Halted {
            context,
            source: cause.into(),
        }
    }

    /// Operation attempted on a store that was closed or purged
    pub fn closed(context: OpContext) -> Self {
        Self::halted(context, HaltCause::Closed)
    }

    pub fn poisoned(context: OpContext) -> Self {
        Self::halted(context, HaltCause::Poisoned)
    }

    /// Classify an OS error for a write-side operation.
    ///
    /// Permission denied becomes `Unauthorized`, everything else `Halted`.
    pub fn io(context: OpContext, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::Unauthorized {
                context,
                source: err,
            },
            _ => Self::halted(context, err),
        }
    }

    /// Classify an OS error for a lookup, where a missing file means a missing key.
    pub fn io_lookup(context: OpContext, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(context),
            _ => Self::io(context, err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::Unauthorized { .. } => ErrorKind::Unauthorized,
            KvError::Halted { .. } => ErrorKind::Halted,
            KvError::NotFound { .. } => ErrorKind::NotFound,
            KvError::Unreachable { .. } => ErrorKind::Unreachable,
        }
    }

    pub fn context(&self) -> &OpContext {
        match self {
            KvError::Unauthorized { context, .. }
            | KvError::Halted { context, .. }
            | KvError::NotFound { context }
            | KvError::Unreachable { context, .. } => context,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            KvError::Halted {
                source: HaltCause::Closed,
                ..
            }
        )
    }
}
