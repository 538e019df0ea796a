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

//! Actions understood by the state store.
//!
//! Actions are plain values. The functions at the bottom of this module build
//! the ones callers issue; the notification variants are emitted by the effect
//! layer while it carries out a caller's request.

use alloy_primitives::TxHash;
use sdb_common::{Breakpoint, DecodedValue, ExecutionContext, Source, Trace};
use serde::{Deserialize, Serialize};

use crate::{ProviderHandle, SessionFault};

/// Every state transition of a debugging session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    // session bootstrap
    /// Record the normalized contexts and sources
    RecordContracts {
        /// Execution contexts, creation before deployed per artifact
        contexts: Vec<ExecutionContext>,
        /// Deduplicated sources, indexed by source id
        sources: Vec<Source>,
    },
    /// Start debugging a transaction
    Start {
        /// Transaction to debug
        tx_hash: TxHash,
        /// Provider used to fetch the trace and decode values
        #[serde(skip)]
        provider: Option<ProviderHandle>,
    },
    /// The trace is loaded; the session is active
    Ready,
    /// Starting the session failed
    Error {
        /// What went wrong
        fault: SessionFault,
    },
    /// A trace was fetched for the transaction
    TraceLoaded {
        /// The recorded trace
        trace: Trace,
    },

    // controller
    /// Move forward by `count` steps (one when absent)
    Advance {
        /// Number of steps
        count: Option<usize>,
    },
    /// Move to the next step with a different source range
    StepNext,
    /// Move to the next line without entering calls
    StepOver,
    /// Move to the next line, entering calls
    StepInto,
    /// Move until the current call returns
    StepOut,
    /// Move back to the first step
    Reset,
    /// Move until a breakpoint is hit or the trace ends
    ContinueUntilBreakpoint {
        /// Breakpoints to use instead of the recorded ones
        breakpoints: Option<Vec<Breakpoint>>,
    },
    /// Stop a running continue
    Interrupt,
    /// Record a breakpoint
    AddBreakpoint {
        /// The breakpoint
        breakpoint: Breakpoint,
    },
    /// Forget a breakpoint
    RemoveBreakpoint {
        /// The breakpoint
        breakpoint: Breakpoint,
    },
    /// Forget all breakpoints
    RemoveAllBreakpoints,

    // effect notifications
    /// A stepping request is being carried out
    SteppingStarted,
    /// The current position changed
    Moved {
        /// New trace index
        index: usize,
    },
    /// The stepping request is done
    SteppingFinished,
    /// Decoding of `count` identifiers began
    DecodingStarted {
        /// Number of pending decodes added
        count: usize,
    },
    /// One identifier finished decoding; `None` when the decoder failed
    DecodingFinished {
        /// Identifier name
        name: String,
        /// Decoded value
        value: Option<DecodedValue>,
    },
}

impl Action {
    /// Whether this action asks the effect layer to move through the trace.
    pub fn is_stepping(&self) -> bool {
        matches!(
            self,
            Self::Advance { .. }
                | Self::StepNext
                | Self::StepOver
                | Self::StepInto
                | Self::StepOut
                | Self::Reset
                | Self::ContinueUntilBreakpoint { .. }
                | Self::Interrupt
        )
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RecordContracts { .. } => "record_contracts",
            Self::Start { .. } => "start",
            Self::Ready => "ready",
            Self::Error { .. } => "error",
            Self::TraceLoaded { .. } => "trace_loaded",
            Self::Advance { .. } => "advance",
            Self::StepNext => "step_next",
            Self::StepOver => "step_over",
            Self::StepInto => "step_into",
            Self::StepOut => "step_out",
            Self::Reset => "reset",
            Self::ContinueUntilBreakpoint { .. } => "continue_until_breakpoint",
            Self::Interrupt => "interrupt",
            Self::AddBreakpoint { .. } => "add_breakpoint",
            Self::RemoveBreakpoint { .. } => "remove_breakpoint",
            Self::RemoveAllBreakpoints => "remove_all_breakpoints",
            Self::SteppingStarted => "stepping_started",
            Self::Moved { .. } => "moved",
            Self::SteppingFinished => "stepping_finished",
            Self::DecodingStarted { .. } => "decoding_started",
            Self::DecodingFinished { .. } => "decoding_finished",
        }
    }
}

/// Record normalized contexts and sources.
pub fn record_contracts(contexts: Vec<ExecutionContext>, sources: Vec<Source>) -> Action {
    Action::RecordContracts { contexts, sources }
}

/// Start the session for `tx_hash`.
pub fn start(tx_hash: TxHash, provider: ProviderHandle) -> Action {
    Action::Start { tx_hash, provider: Some(provider) }
}

/// Advance `count` steps; one when `None`.
pub fn advance(count: Option<usize>) -> Action {
    Action::Advance { count }
}

/// Step to the next source range.
pub fn step_next() -> Action {
    Action::StepNext
}

/// Step over calls.
pub fn step_over() -> Action {
    Action::StepOver
}

/// Step into calls.
pub fn step_into() -> Action {
    Action::StepInto
}

/// Step out of the current call.
pub fn step_out() -> Action {
    Action::StepOut
}

/// Go back to the first step.
pub fn reset() -> Action {
    Action::Reset
}

/// Continue until a breakpoint; `None` uses the recorded breakpoints.
pub fn continue_until_breakpoint(breakpoints: Option<Vec<Breakpoint>>) -> Action {
    Action::ContinueUntilBreakpoint { breakpoints }
}

/// Interrupt a running continue.
pub fn interrupt() -> Action {
    Action::Interrupt
}

/// Record a breakpoint.
pub fn add_breakpoint(breakpoint: Breakpoint) -> Action {
    Action::AddBreakpoint { breakpoint }
}

/// Forget a breakpoint.
pub fn remove_breakpoint(breakpoint: Breakpoint) -> Action {
    Action::RemoveBreakpoint { breakpoint }
}

/// Forget every breakpoint.
pub fn remove_all_breakpoints() -> Action {
    Action::RemoveAllBreakpoints
}

// Notifications dispatched by the effect layer

/// The trace is loaded and the session is usable.
pub fn ready() -> Action {
    Action::Ready
}

/// Starting the session failed.
pub fn error(fault: SessionFault) -> Action {
    Action::Error { fault }
}

/// A trace was fetched.
pub fn trace_loaded(trace: Trace) -> Action {
    Action::TraceLoaded { trace }
}

/// A stepping request is being carried out.
pub fn stepping_started() -> Action {
    Action::SteppingStarted
}

/// The cursor moved to `index`.
pub fn moved(index: usize) -> Action {
    Action::Moved { index }
}

/// The stepping request settled.
pub fn stepping_finished() -> Action {
    Action::SteppingFinished
}

/// `count` decodes were scheduled.
pub fn decoding_started(count: usize) -> Action {
    Action::DecodingStarted { count }
}

/// One decode completed; `None` when it failed.
pub fn decoding_finished(name: impl Into<String>, value: Option<DecodedValue>) -> Action {
    Action::DecodingFinished { name: name.into(), value }
}
