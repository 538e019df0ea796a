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

//! The in-process state store.
//!
//! The store owns a single [`DebuggerState`] snapshot. Every dispatched action
//! is reduced synchronously; when the snapshot changes, each registered
//! listener is invoked once with the new snapshot, in registration order and
//! before `dispatch` returns. The action is then forwarded to the effect layer,
//! which runs in its own task and may dispatch follow-up actions.
//!
//! Listeners run while the store holds its listener list, so they must not
//! subscribe, unsubscribe, or dispatch themselves. A listener deregisters
//! itself by returning [`ListenerControl::Unsubscribe`].

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, trace};

use crate::{Action, DebuggerState, SessionError, SessionResult};

/// What a listener wants after seeing a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    /// Keep receiving snapshots
    Keep,
    /// Deregister now; no further snapshot is delivered
    Unsubscribe,
}

/// A registered snapshot observer.
pub type Listener = Box<dyn FnMut(&Arc<DebuggerState>) -> ListenerControl + Send>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The effect layer: carries out actions that need more than a state update.
pub trait Effects: Send + Sync + 'static {
    /// Handle one dispatched action. Actions arrive one at a time, in dispatch order.
    fn handle<'a>(&'a self, action: Action, dispatcher: &'a Dispatcher) -> BoxFuture<'a, ()>;
}

/// Effects that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffects;

impl Effects for NoEffects {
    fn handle<'a>(&'a self, _action: Action, _dispatcher: &'a Dispatcher) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

struct StoreInner {
    state: RwLock<Arc<DebuggerState>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    /// Serializes reduce + notify so snapshots are emitted in order
    dispatch_lock: Mutex<()>,
    effects_tx: mpsc::UnboundedSender<Action>,
}

impl StoreInner {
    fn dispatch(&self, action: Action) {
        let _guard = self.dispatch_lock.lock();
        let current = self.state.read().clone();
        let next = current.reduce(&action);

        if next != *current {
            trace!(action = action.name(), "State changed");
            let next = Arc::new(next);
            *self.state.write() = next.clone();
            self.listeners.lock().retain_mut(|(_, listener)| listener(&next) == ListenerControl::Keep);
        }

        // effects receive actions in dispatch order
        if self.effects_tx.send(action).is_err() {
            debug!("Effect task has stopped; action not forwarded");
        }
    }
}

/// Owned state store. Dropping it stops its effect task.
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.inner.state.read())
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

impl StateStore {
    /// Create a store with an empty state and spawn its effect task on the
    /// current tokio runtime.
    pub fn new(effects: Arc<dyn Effects>) -> SessionResult<Self> {
        let handle = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let (effects_tx, mut effects_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(StoreInner {
            state: RwLock::new(Arc::new(DebuggerState::default())),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            dispatch_lock: Mutex::new(()),
            effects_tx,
        });

        let dispatcher = Dispatcher { inner: Arc::downgrade(&inner) };
        handle.spawn(async move {
            while let Some(action) = effects_rx.recv().await {
                effects.handle(action, &dispatcher).await;
            }
            debug!("Effect task finished");
        });

        Ok(Self { inner })
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<DebuggerState> {
        self.inner.state.read().clone()
    }

    /// Reduce `action`, notify listeners on change, then forward it to the effects.
    pub fn dispatch(&self, action: Action) {
        self.inner.dispatch(action)
    }

    /// Register a listener for future snapshots.
    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = self.next_id();
        self.inner.listeners.lock().push((id, listener));
        id
    }

    /// Invoke `listener` with the current snapshot, then register it for future
    /// snapshots unless it asked to unsubscribe.
    ///
    /// Both happen without a dispatch in between, so no snapshot is missed.
    /// Returns `None` when the listener was satisfied by the current snapshot.
    pub fn subscribe_with_current(&self, mut listener: Listener) -> Option<SubscriptionId> {
        let _guard = self.inner.dispatch_lock.lock();
        let current = self.state();
        if listener(&current) == ListenerControl::Unsubscribe {
            return None;
        }
        Some(self.subscribe(listener))
    }

    /// Deregister a listener. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// A handle for dispatching from the effect layer.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher { inner: Arc::downgrade(&self.inner) }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Weak dispatch handle used by the effect layer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Weak<StoreInner>,
}

impl Dispatcher {
    /// Dispatch `action`. Returns `false` when the store is gone.
    pub fn dispatch(&self, action: Action) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.dispatch(action);
                true
            }
            None => false,
        }
    }

    /// The current snapshot, `None` when the store is gone.
    pub fn state(&self) -> Option<Arc<DebuggerState>> {
        self.inner.upgrade().map(|inner| inner.state.read().clone())
    }
}
