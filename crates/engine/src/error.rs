// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types of the session controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error value a failed session start leaves in the store.
///
/// It is part of the state snapshot, so it is cheap to clone and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct SessionFault {
    /// Human-readable description of the failure
    pub message: String,
}

impl SessionFault {
    /// Create a fault from any displayable error.
    pub fn new(message: impl ToString) -> Self {
        Self { message: message.to_string() }
    }
}

/// Errors surfaced by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An artifact's syntax tree lacks the definition of its own contract
    #[error("malformed artifact `{contract}`: {reason}")]
    MalformedArtifact {
        /// Name of the offending contract
        contract: String,
        /// What is wrong with it
        reason: String,
    },

    /// The requested file ordering names paths no artifact provides
    #[error("file ordering references unknown sources: {missing:?}")]
    StaleFileOrdering {
        /// Paths that have no matching source
        missing: Vec<String>,
    },

    /// The store reached an error status after start
    #[error("session failed to start: {0}")]
    Start(SessionFault),

    /// An awaited transition did not happen within the configured time
    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        /// The awaited operation
        operation: &'static str,
        /// The configured timeout
        after: Duration,
    },

    /// The store was dropped while an operation was waiting on it
    #[error("state store closed while waiting for {0}")]
    StoreClosed(&'static str),

    /// Sessions spawn their effect task onto the ambient tokio runtime
    #[error("no tokio runtime available to drive the session")]
    NoRuntime,

    /// No identifier of that name is in scope at the current step
    #[error("no identifier named `{0}` is in scope")]
    UnknownVariable(String),

    /// The decoder failed on a variable
    #[error("failed to decode `{name}`: {reason}")]
    Decode {
        /// Variable name
        name: String,
        /// Decoder error
        reason: String,
    },
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
