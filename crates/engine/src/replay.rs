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

//! Effect engine replaying a recorded trace.
//!
//! [`ReplayEngine`] carries out the actions the reducer leaves alone: it fetches
//! the trace on start, moves the cursor for stepping requests, and decodes the
//! identifiers in scope after every move. Every stepping request is bracketed
//! by `SteppingStarted` and `SteppingFinished`, even when the cursor stays put.

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::TxHash;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use sdb_common::{Binding, Breakpoint, DecodedValue, LineIndex, Source, Trace, TraceStep};
use tracing::{debug, info, warn};

use crate::{action, Action, DebuggerState, Dispatcher, Effects, ProviderHandle, SessionFault};

/// Steps a running continue walks before checking for an interrupt.
const INTERRUPT_CHECK_INTERVAL: usize = 64;

/// Where a stepping request moves the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Move a fixed number of steps
    Advance(usize),
    /// Next step mapping to a different source range
    Next,
    /// Next step on a different source line
    Into,
    /// Next step on a different line without entering deeper calls
    Over,
    /// First step in a shallower call frame
    Out,
    /// Back to the first step
    Reset,
    /// No movement
    Stay,
}

impl Motion {
    /// The motion a dispatched action asks for. `None` for non-stepping actions
    /// and for continue, which walks the trace itself.
    pub fn from_action(action: &Action) -> Option<Self> {
        Some(match action {
            Action::Advance { count } => Self::Advance(count.unwrap_or(1)),
            Action::StepNext => Self::Next,
            Action::StepInto => Self::Into,
            Action::StepOver => Self::Over,
            Action::StepOut => Self::Out,
            Action::Reset => Self::Reset,
            Action::Interrupt => Self::Stay,
            _ => return None,
        })
    }
}

/// Read-only view of a trace with line lookups for its sources.
#[derive(Debug)]
pub struct TraceCursor<'a> {
    trace: &'a Trace,
    lines: Vec<LineIndex>,
}

impl<'a> TraceCursor<'a> {
    /// Index `sources` so steps can be mapped to lines.
    pub fn new(trace: &'a Trace, sources: &[Source]) -> Self {
        Self { trace, lines: sources.iter().map(|source| LineIndex::new(&source.source)).collect() }
    }

    fn step(&self, index: usize) -> Option<&'a TraceStep> {
        self.trace.get(index)
    }

    /// `(source_id, line)` of a step, if it maps to a known source.
    pub fn location(&self, index: usize) -> Option<(usize, usize)> {
        let step = self.step(index)?;
        let source_id = step.source_id?;
        let line = self.lines.get(source_id)?.line_of(step.start);
        Some((source_id, line))
    }

    /// Index the cursor lands on when `motion` is applied at `from`.
    ///
    /// Searches that find nothing end on the last step.
    pub fn target(&self, from: usize, motion: Motion) -> usize {
        let Some(last) = self.trace.last_index() else {
            return 0;
        };
        let from = from.min(last);
        let mut later = from + 1..=last;

        let found = match motion {
            Motion::Advance(count) => return from.saturating_add(count).min(last),
            Motion::Reset => return 0,
            Motion::Stay => return from,
            Motion::Next => {
                let current = self.step(from).map(|step| (step.source_id, step.range()));
                later.find(|&index| {
                    self.step(index).is_some_and(|step| {
                        step.source_id.is_some() && Some((step.source_id, step.range())) != current
                    })
                })
            }
            Motion::Into => {
                let current = self.location(from);
                later.find(|&index| {
                    let location = self.location(index);
                    location.is_some() && location != current
                })
            }
            Motion::Over => {
                let current = self.location(from);
                let depth = self.step(from).map_or(0, |step| step.depth);
                later.find(|&index| {
                    let location = self.location(index);
                    location.is_some()
                        && location != current
                        && self.step(index).is_some_and(|step| step.depth <= depth)
                })
            }
            Motion::Out => {
                let depth = self.step(from).map_or(0, |step| step.depth);
                later.find(|&index| self.step(index).is_some_and(|step| step.depth < depth))
            }
        };

        found.unwrap_or(last)
    }

    /// Whether the step at `index` enters a location one of `breakpoints` is set on.
    ///
    /// A line breakpoint is hit when the step is on its line and the previous
    /// step was not. A node breakpoint is hit when the step maps to its node
    /// and the previous step did not.
    pub fn hits_breakpoint(&self, index: usize, breakpoints: &[Breakpoint]) -> bool {
        let Some(step) = self.step(index) else {
            return false;
        };
        let location = self.location(index);
        let previous_location = index.checked_sub(1).and_then(|prev| self.location(prev));
        let previous_node =
            index.checked_sub(1).and_then(|prev| self.step(prev)).and_then(|prev| prev.node);

        breakpoints.iter().any(|breakpoint| match breakpoint {
            Breakpoint::Line { source_id, line, .. } => {
                location == Some((*source_id, *line)) && previous_location != location
            }
            Breakpoint::Node { node, .. } => {
                step.node == Some(*node) && previous_node != Some(*node)
            }
        })
    }
}

/// Effect layer backed by a [`TraceProvider`](crate::TraceProvider).
///
/// The provider arrives with the `Start` action and is kept for decoding.
#[derive(Debug, Default)]
pub struct ReplayEngine {
    provider: Mutex<Option<ProviderHandle>>,
}

impl ReplayEngine {
    /// Create an engine waiting for its `Start` action.
    pub fn new() -> Self {
        Self::default()
    }

    fn provider(&self) -> Option<ProviderHandle> {
        self.provider.lock().clone()
    }

    async fn start(
        &self,
        tx_hash: TxHash,
        provider: Option<ProviderHandle>,
        dispatcher: &Dispatcher,
    ) {
        let Some(provider) = provider else {
            dispatcher.dispatch(action::error(SessionFault::new("no trace provider")));
            return;
        };
        *self.provider.lock() = Some(provider.clone());

        info!(%tx_hash, "Fetching trace");
        let trace = match provider.fetch_trace(tx_hash).await {
            Ok(trace) => trace,
            Err(e) => {
                warn!(%tx_hash, "Failed to fetch trace: {e:#}");
                dispatcher.dispatch(action::error(SessionFault::new(format!("{e:#}"))));
                return;
            }
        };
        info!(%tx_hash, steps = trace.len(), "Trace loaded");

        let scope = trace.first().map(|step| step.scope.clone()).unwrap_or_default();
        if !dispatcher.dispatch(action::trace_loaded(trace)) {
            return;
        }
        if !scope.is_empty() {
            dispatcher.dispatch(action::decoding_started(scope.len()));
        }
        dispatcher.dispatch(action::ready());
        self.decode_scope(scope, dispatcher).await;
    }

    async fn step(
        &self,
        motion: Option<Motion>,
        breakpoints: Option<Vec<Breakpoint>>,
        dispatcher: &Dispatcher,
    ) {
        if !dispatcher.dispatch(action::stepping_started()) {
            return;
        }
        let Some(state) = dispatcher.state() else {
            return;
        };

        let cursor = TraceCursor::new(&state.trace, &state.sources);
        let from = state.current;
        let target = match motion {
            Some(motion) => cursor.target(from, motion),
            None => {
                let breakpoints = breakpoints.unwrap_or_else(|| state.breakpoints.clone());
                continue_until(&cursor, from, &breakpoints, dispatcher).await
            }
        };
        debug!(from, target, ?motion, "Moving cursor");

        let scope = state.trace.get(target).map(|step| step.scope.clone()).unwrap_or_default();
        let moved = target != from;

        dispatcher.dispatch(action::moved(target));
        if moved && !scope.is_empty() {
            dispatcher.dispatch(action::decoding_started(scope.len()));
        }
        dispatcher.dispatch(action::stepping_finished());

        if moved {
            self.decode_scope(scope, dispatcher).await;
        }
    }

    async fn decode_scope(
        &self,
        scope: BTreeMap<String, Binding>,
        dispatcher: &Dispatcher,
    ) {
        if scope.is_empty() {
            return;
        }
        let provider = self.provider();

        for (name, binding) in scope {
            let value: Option<DecodedValue> = match &provider {
                Some(provider) => match provider.decode(&binding).await {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(variable = %name, "Failed to decode: {e:#}");
                        None
                    }
                },
                None => None,
            };
            if !dispatcher.dispatch(action::decoding_finished(name, value)) {
                return;
            }
        }
    }
}

async fn continue_until(
    cursor: &TraceCursor<'_>,
    from: usize,
    breakpoints: &[Breakpoint],
    dispatcher: &Dispatcher,
) -> usize {
    let Some(last) = cursor.trace.last_index() else {
        return 0;
    };
    let mut index = from.min(last);

    while index < last {
        index += 1;
        if cursor.hits_breakpoint(index, breakpoints) {
            debug!(index, "Breakpoint hit");
            break;
        }
        if index % INTERRUPT_CHECK_INTERVAL == 0 {
            tokio::task::yield_now().await;
            if dispatcher.state().is_none_or(|state: Arc<DebuggerState>| state.interrupt_requested) {
                debug!(index, "Continue interrupted");
                break;
            }
        }
    }

    index
}

impl Effects for ReplayEngine {
    fn handle<'a>(&'a self, action: Action, dispatcher: &'a Dispatcher) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match action {
                Action::Start { tx_hash, provider } => self.start(tx_hash, provider, dispatcher).await,
                Action::ContinueUntilBreakpoint { breakpoints } => {
                    self.step(None, breakpoints, dispatcher).await
                }
                Action::Interrupt => {
                    // a request that settled after the interrupt was raised already took it
                    if dispatcher.state().is_some_and(|state| state.interrupt_requested) {
                        self.step(Some(Motion::Stay), None, dispatcher).await
                    } else {
                        debug!("Interrupt consumed by a settled request");
                    }
                }
                other => {
                    if let Some(motion) = Motion::from_action(&other) {
                        self.step(Some(motion), None, dispatcher).await
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "a;\nb;\nc;\nd;\n";

    fn source() -> Source {
        Source { source_path: "A.sol".into(), source: SOURCE.into(), ast: json!({}) }
    }

    fn step(start: usize, depth: usize, node: Option<i64>) -> TraceStep {
        TraceStep {
            context: 0,
            source_id: Some(0),
            start,
            length: 2,
            depth,
            node,
            scope: Default::default(),
        }
    }

    /// lines: 0 0 1 (deeper) 2 (deeper) 1 3 ; unmapped step at index 6
    fn trace() -> Trace {
        let mut steps = vec![
            step(0, 0, Some(1)),
            step(0, 0, Some(1)),
            step(3, 1, Some(2)),
            step(6, 1, Some(3)),
            step(3, 0, Some(2)),
            step(9, 0, Some(4)),
        ];
        steps.push(TraceStep { source_id: None, ..step(0, 0, None) });
        steps.into()
    }

    #[test]
    fn test_advance_clamps_to_last() {
        let trace = trace();
        let cursor = TraceCursor::new(&trace, &[source()]);
        assert_eq!(cursor.target(0, Motion::Advance(1)), 1);
        assert_eq!(cursor.target(0, Motion::Advance(100)), 6);
        assert_eq!(cursor.target(5, Motion::Advance(usize::MAX)), 6);
        assert_eq!(cursor.target(4, Motion::Reset), 0);
        assert_eq!(cursor.target(4, Motion::Stay), 4);
    }

    #[test]
    fn test_line_motions() {
        let trace = trace();
        let cursor = TraceCursor::new(&trace, &[source()]);
        assert_eq!(cursor.location(2), Some((0, 1)));
        assert_eq!(cursor.location(6), None);

        // step 1 has the same range as step 0
        assert_eq!(cursor.target(0, Motion::Next), 2);
        assert_eq!(cursor.target(0, Motion::Into), 2);
        // skips the deeper steps
        assert_eq!(cursor.target(0, Motion::Over), 4);
        assert_eq!(cursor.target(2, Motion::Out), 4);
        // nothing shallower than depth 0
        assert_eq!(cursor.target(0, Motion::Out), 6);
        // no later mapped step on another line
        assert_eq!(cursor.target(5, Motion::Into), 6);
    }

    #[test]
    fn test_motions_on_empty_trace() {
        let trace = Trace::default();
        let cursor = TraceCursor::new(&trace, &[]);
        for motion in [Motion::Advance(3), Motion::Next, Motion::Into, Motion::Over, Motion::Out] {
            assert_eq!(cursor.target(0, motion), 0);
        }
    }

    #[test]
    fn test_breakpoints_hit_on_entry() {
        let trace = trace();
        let cursor = TraceCursor::new(&trace, &[source()]);
        let on_first_line = [Breakpoint::line(0, 0)];
        assert!(cursor.hits_breakpoint(0, &on_first_line));
        // still on line 0
        assert!(!cursor.hits_breakpoint(1, &on_first_line));

        let on_line_one = [Breakpoint::line(0, 1)];
        assert!(cursor.hits_breakpoint(2, &on_line_one));
        assert!(cursor.hits_breakpoint(4, &on_line_one));

        let on_node = [Breakpoint::node(3)];
        assert!(cursor.hits_breakpoint(3, &on_node));
        assert!(!cursor.hits_breakpoint(5, &on_node));
        assert!(!cursor.hits_breakpoint(99, &on_node));
    }

    #[test]
    fn test_motion_from_action() {
        assert_eq!(Motion::from_action(&Action::Advance { count: None }), Some(Motion::Advance(1)));
        assert_eq!(Motion::from_action(&Action::Interrupt), Some(Motion::Stay));
        assert_eq!(Motion::from_action(&Action::RemoveAllBreakpoints), None);
        assert_eq!(Motion::from_action(&Action::ContinueUntilBreakpoint { breakpoints: None }), None);
    }
}
