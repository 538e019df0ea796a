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

//! The debugger state snapshot and its reducer.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::TxHash;
use sdb_common::{Breakpoint, DecodedValue, ExecutionContext, Source, Trace, TraceStep};
use serde::{Deserialize, Serialize};

use crate::{Action, SessionFault};

/// Lifecycle stage of a session.
///
/// Transitions are monotone: `Pending` moves to `Active` or to `Error`, and
/// neither of those ever changes again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Not started yet, or the trace is still loading
    #[default]
    Pending,
    /// The trace is loaded
    Active,
    /// Starting failed
    Error(SessionFault),
}

impl SessionStatus {
    /// Whether the session is active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// The embedded fault of a failed session.
    pub fn fault(&self) -> Option<&SessionFault> {
        match self {
            Self::Error(fault) => Some(fault),
            _ => None,
        }
    }
}

/// One immutable snapshot of a debugging session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebuggerState {
    /// Lifecycle stage
    pub status: SessionStatus,
    /// Transaction being debugged
    pub tx_hash: Option<TxHash>,
    /// Normalized execution contexts
    pub contexts: Arc<Vec<ExecutionContext>>,
    /// Normalized sources, indexed by source id
    pub sources: Arc<Vec<Source>>,
    /// Recorded breakpoints
    pub breakpoints: Vec<Breakpoint>,
    /// The loaded trace
    pub trace: Arc<Trace>,
    /// Index of the current step in `trace`
    pub current: usize,
    /// Whether the current step is the last one
    pub finished: bool,
    /// Whether a stepping request is being carried out
    pub stepping: bool,
    /// Set by an interrupt until the interrupting request settles
    pub interrupt_requested: bool,
    /// Number of interrupts dispatched so far
    pub interrupts: u64,
    /// Number of outstanding decodes
    pub decoding_keys: i64,
    /// Values decoded for the current step
    pub decoded: BTreeMap<String, DecodedValue>,
}

impl DebuggerState {
    /// The current trace step, if a trace is loaded.
    pub fn current_step(&self) -> Option<&TraceStep> {
        self.trace.get(self.current)
    }

    /// Apply `action` and return the resulting state.
    pub fn reduce(&self, action: &Action) -> Self {
        let mut next = self.clone();
        next.apply(action);
        next
    }

    fn apply(&mut self, action: &Action) {
        match action {
            Action::RecordContracts { contexts, sources } => {
                self.contexts = Arc::new(contexts.clone());
                self.sources = Arc::new(sources.clone());
            }
            Action::Start { tx_hash, .. } => self.tx_hash = Some(*tx_hash),
            Action::Ready => {
                if self.status == SessionStatus::Pending {
                    self.status = SessionStatus::Active;
                }
            }
            Action::Error { fault } => {
                if self.status == SessionStatus::Pending {
                    self.status = SessionStatus::Error(fault.clone());
                }
            }
            Action::TraceLoaded { trace } => {
                self.trace = Arc::new(trace.clone());
                self.current = 0;
                self.finished = trace.len() <= 1;
                self.decoded.clear();
            }
            Action::Interrupt => {
                self.interrupt_requested = true;
                self.interrupts += 1;
            }
            Action::AddBreakpoint { breakpoint } => {
                if !self.breakpoints.contains(breakpoint) {
                    self.breakpoints.push(breakpoint.clone());
                }
            }
            Action::RemoveBreakpoint { breakpoint } => {
                self.breakpoints.retain(|existing| existing != breakpoint)
            }
            Action::RemoveAllBreakpoints => self.breakpoints.clear(),
            Action::SteppingStarted => self.stepping = true,
            Action::Moved { index } => {
                if *index != self.current {
                    self.current = *index;
                    self.decoded.clear();
                }
                self.finished = self.trace.last_index().is_none_or(|last| self.current >= last);
            }
            Action::SteppingFinished => {
                self.stepping = false;
                self.interrupt_requested = false;
            }
            Action::DecodingStarted { count } => self.decoding_keys += *count as i64,
            Action::DecodingFinished { name, value } => {
                self.decoding_keys -= 1;
                if let Some(value) = value {
                    self.decoded.insert(name.clone(), value.clone());
                }
            }
            // carried out by the effect layer
            Action::Advance { .. }
            | Action::StepNext
            | Action::StepOver
            | Action::StepInto
            | Action::StepOut
            | Action::Reset
            | Action::ContinueUntilBreakpoint { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(start: usize) -> TraceStep {
        TraceStep {
            context: 0,
            source_id: Some(0),
            start,
            length: 1,
            depth: 0,
            node: None,
            scope: Default::default(),
        }
    }

    #[test]
    fn test_status_is_monotone() {
        let state = DebuggerState::default();
        let failed = state.reduce(&Action::Error { fault: SessionFault::new("boom") });
        assert_eq!(failed.status.fault(), Some(&SessionFault::new("boom")));

        let still_failed = failed.reduce(&Action::Ready);
        assert_eq!(still_failed, failed);

        let active = state.reduce(&Action::Ready);
        assert!(active.status.is_active());
        assert_eq!(active.reduce(&Action::Error { fault: SessionFault::new("late") }), active);
    }

    #[test]
    fn test_breakpoints_are_a_set() {
        let bp = Breakpoint::line(0, 3);
        let state = DebuggerState::default()
            .reduce(&Action::AddBreakpoint { breakpoint: bp.clone() })
            .reduce(&Action::AddBreakpoint { breakpoint: bp.clone() })
            .reduce(&Action::AddBreakpoint { breakpoint: Breakpoint::node(4) });
        assert_eq!(state.breakpoints.len(), 2);

        let state = state.reduce(&Action::RemoveBreakpoint { breakpoint: bp });
        assert_eq!(state.breakpoints, vec![Breakpoint::node(4)]);
        assert!(state.reduce(&Action::RemoveAllBreakpoints).breakpoints.is_empty());
    }

    #[test]
    fn test_moves_track_finished_and_clear_decoded() {
        let trace: Trace = vec![step(0), step(2), step(4)].into();
        let state = DebuggerState::default()
            .reduce(&Action::TraceLoaded { trace })
            .reduce(&Action::DecodingStarted { count: 1 })
            .reduce(&Action::DecodingFinished { name: "x".into(), value: Some(1.into()) });
        assert_eq!(state.decoding_keys, 0);
        assert_eq!(state.decoded.len(), 1);
        assert!(!state.finished);

        let moved = state.reduce(&Action::Moved { index: 2 });
        assert!(moved.finished);
        assert!(moved.decoded.is_empty());
        assert_eq!(moved.current_step().map(|s| s.start), Some(4));
    }

    #[test]
    fn test_controller_actions_leave_state_untouched() {
        let state = DebuggerState::default();
        assert_eq!(state.reduce(&Action::StepOver), state);
        assert_eq!(state.reduce(&Action::Advance { count: Some(2) }), state);
        assert!(state.reduce(&Action::Interrupt).interrupt_requested);
    }

    #[test]
    fn test_every_interrupt_changes_state() {
        let running = DebuggerState::default().reduce(&Action::SteppingStarted);
        let once = running.reduce(&Action::Interrupt);
        let twice = once.reduce(&Action::Interrupt);
        assert_ne!(once, twice);
        assert_eq!(twice.interrupts, 2);

        let settled = twice.reduce(&Action::SteppingFinished);
        assert!(!settled.interrupt_requested);
        assert!(!settled.stepping);
    }
}
