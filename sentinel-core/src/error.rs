//! Error Types
//!
//! The controller only filters events. Failures come from bad configuration,
//! from a host without visibility sensing, or from a caller's callback.

use std::error::Error as StdError;

use thiserror::Error;

use crate::scroll::Role;

/// Errors surfaced by the controller to its caller.
#[derive(Debug, Error)]
pub enum ScrollError {
    /// A threshold outside `[0, 1]` (or NaN) was supplied for a role.
    #[error("{role} threshold must be a ratio within [0, 1], got {value}")]
    InvalidThreshold { role: Role, value: f64 },

    /// The role's callback returned an error while handling a report.
    ///
    /// The role's subscription is left intact and keeps delivering.
    #[error("{role} callback failed: {source}")]
    Callback {
        role: Role,
        #[source]
        source: CallbackError,
    },

    /// Options could not be parsed.
    #[error("invalid scroll options: {0}")]
    Options(#[from] serde_json::Error),
}

/// Errors a host sensor may return when asked to create a subscription.
///
/// These never reach the caller of `configure`; the role degrades to
/// `Phase::Disabled` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The host has no visibility sensing capability.
    #[error("visibility sensing is not supported by this host")]
    Unsupported,

    /// The host refused the subscription.
    #[error("host rejected the subscription: {0}")]
    Rejected(String),
}

/// An error raised by a caller-supplied callback.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CallbackError(Box<dyn StdError + Send + Sync>);

impl CallbackError {
    /// Wrap any error (or message) raised by a callback.
    pub fn new(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(error.into())
    }

    /// Take back the error the callback raised.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.0
    }
}
