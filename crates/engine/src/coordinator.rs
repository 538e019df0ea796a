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

//! Completion detection.
//!
//! Every awaited session operation follows the same protocol: subscribe to the
//! store, optionally dispatch an action, and watch the snapshots until a
//! [`Transition`] state machine reports an outcome. The outcome is handed over
//! through a oneshot channel and the listener deregisters itself in the same
//! call, so an operation resolves exactly once.

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    Action, DebuggerState, ListenerControl, SessionError, SessionResult, SessionStatus, StateStore,
    SubscriptionId,
};

/// A small state machine fed with state snapshots until it produces an outcome.
pub trait Transition: Send + 'static {
    /// Value produced on success
    type Output: Send + 'static;

    /// Whether the snapshot current at subscription time is also observed.
    const EAGER: bool;

    /// Operation name used in logs and errors.
    const NAME: &'static str;

    /// Observe one snapshot. `Some` ends the transition.
    fn observe(&mut self, state: &DebuggerState) -> Option<SessionResult<Self::Output>>;
}

/// Subscribe, dispatch `action` (if any), and wait for `transition` to finish.
///
/// With `timeout` set, a transition that does not finish in time is abandoned:
/// its listener is removed and [`SessionError::Timeout`] is returned. Dropping
/// the returned future removes the listener as well.
pub async fn await_transition<T: Transition>(
    store: &StateStore,
    action: Option<Action>,
    mut transition: T,
    timeout: Option<Duration>,
) -> SessionResult<T::Output> {
    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);

    let listener = Box::new(move |state: &Arc<DebuggerState>| {
        match transition.observe(state) {
            Some(outcome) => {
                if let Some(tx) = tx.take() {
                    // the receiver is gone only if the caller gave up waiting
                    let _ = tx.send(outcome);
                }
                ListenerControl::Unsubscribe
            }
            None => ListenerControl::Keep,
        }
    });

    let subscription =
        if T::EAGER { store.subscribe_with_current(listener) } else { Some(store.subscribe(listener)) };
    let _guard = SubscriptionGuard { store, id: subscription };

    if let Some(action) = action {
        debug!(operation = T::NAME, action = action.name(), "Dispatching");
        store.dispatch(action);
    }

    let outcome = match timeout {
        Some(after) => match tokio::time::timeout(after, rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(operation = T::NAME, ?after, "Timed out");
                return Err(SessionError::Timeout { operation: T::NAME, after });
            }
        },
        None => rx.await,
    };

    outcome.map_err(|_| SessionError::StoreClosed(T::NAME))?
}

/// Deregisters a listener when the waiting operation ends, including when its
/// future is dropped before an outcome arrived.
struct SubscriptionGuard<'a> {
    store: &'a StateStore,
    id: Option<SubscriptionId>,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.store.unsubscribe(id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SteppingPhase {
    WaitingForStart,
    WaitingForStop,
    Done,
}

/// Finishes once the stepping flag has been seen raised and then lowered.
///
/// A snapshot emitted before the dispatched step actually started must not
/// count, hence the start has to be observed first.
#[derive(Debug)]
pub struct SteppingDone {
    phase: SteppingPhase,
}

impl Default for SteppingDone {
    fn default() -> Self {
        Self { phase: SteppingPhase::WaitingForStart }
    }
}

impl Transition for SteppingDone {
    type Output = bool;
    const EAGER: bool = false;
    const NAME: &'static str = "stepping";

    fn observe(&mut self, state: &DebuggerState) -> Option<SessionResult<bool>> {
        match (self.phase, state.stepping) {
            (SteppingPhase::WaitingForStart, true) => {
                debug!("heard step start");
                self.phase = SteppingPhase::WaitingForStop;
                None
            }
            (SteppingPhase::WaitingForStop, false) => {
                debug!("heard step stop");
                self.phase = SteppingPhase::Done;
                Some(Ok(true))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitPhase {
    Waiting,
    Done,
}

/// Finishes once no decode is outstanding.
#[derive(Debug)]
pub struct DecodeReady {
    phase: WaitPhase,
}

impl Default for DecodeReady {
    fn default() -> Self {
        Self { phase: WaitPhase::Waiting }
    }
}

impl Transition for DecodeReady {
    type Output = ();
    const EAGER: bool = true;
    const NAME: &'static str = "decoding";

    fn observe(&mut self, state: &DebuggerState) -> Option<SessionResult<()>> {
        debug!(decoding_keys = state.decoding_keys, "following decoding counter");
        if self.phase == WaitPhase::Waiting && state.decoding_keys <= 0 {
            self.phase = WaitPhase::Done;
            return Some(Ok(()));
        }
        None
    }
}

/// Finishes once the session is active, or fails with its start error.
#[derive(Debug)]
pub struct SessionReady {
    phase: WaitPhase,
}

impl Default for SessionReady {
    fn default() -> Self {
        Self { phase: WaitPhase::Waiting }
    }
}

impl Transition for SessionReady {
    type Output = ();
    const EAGER: bool = true;
    const NAME: &'static str = "session start";

    fn observe(&mut self, state: &DebuggerState) -> Option<SessionResult<()>> {
        if self.phase == WaitPhase::Done {
            return None;
        }
        let outcome = match &state.status {
            SessionStatus::Pending => return None,
            SessionStatus::Active => Ok(()),
            SessionStatus::Error(fault) => Err(SessionError::Start(fault.clone())),
        };
        self.phase = WaitPhase::Done;
        Some(outcome)
    }
}
