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

//! The session facade.
//!
//! A [`Session`] owns one state store for one transaction. Construction
//! normalizes the artifacts and kicks off the start sequence without waiting
//! for it; every awaited operation then goes through [`await_transition`].
//!
//! ```ignore
//! let session = Session::new(artifacts, None, tx_hash, provider)?;
//! session.ready().await?;
//! session.step_over().await?;
//! let location = session.view(CurrentLocation);
//! ```

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::TxHash;
use sdb_common::{Breakpoint, ContractArtifact, DecodedValue};
use tracing::{debug, info};

use crate::{
    action, adjust_breakpoint, await_transition, normalize,
    selectors::{Decoded, Selector},
    Action, DebuggerState, DecodeReady, Effects, ProviderHandle, ReplayEngine, SessionConfig,
    SessionError, SessionReady, SessionResult, StateStore, SteppingDone, TraceProvider,
};

/// A debugging session over one transaction.
pub struct Session {
    store: StateStore,
    provider: ProviderHandle,
    config: SessionConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("store", &self.store).field("config", &self.config).finish()
    }
}

impl Session {
    /// Create a session with the default configuration and the replay engine.
    ///
    /// `files` optionally fixes the order of the sources; every listed path must
    /// belong to one of the artifacts. Must be called within a tokio runtime.
    pub fn new(
        contracts: Vec<ContractArtifact>,
        files: Option<Vec<String>>,
        tx_hash: TxHash,
        provider: Arc<dyn TraceProvider>,
    ) -> SessionResult<Self> {
        Self::with_config(contracts, files, tx_hash, provider, SessionConfig::default())
    }

    /// Create a session with the replay engine and a custom configuration.
    pub fn with_config(
        contracts: Vec<ContractArtifact>,
        files: Option<Vec<String>>,
        tx_hash: TxHash,
        provider: Arc<dyn TraceProvider>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        Self::with_effects(contracts, files, tx_hash, provider, config, Arc::new(ReplayEngine::new()))
    }

    /// Create a session driven by a custom effect layer.
    pub fn with_effects(
        contracts: Vec<ContractArtifact>,
        files: Option<Vec<String>>,
        tx_hash: TxHash,
        provider: Arc<dyn TraceProvider>,
        config: SessionConfig,
        effects: Arc<dyn Effects>,
    ) -> SessionResult<Self> {
        let (contexts, sources) = normalize(&contracts, files.as_deref())?.into_complete()?;
        info!(
            %tx_hash,
            contexts = contexts.len(),
            sources = sources.len(),
            "Starting debugging session"
        );

        let store = StateStore::new(effects)?;
        let provider = ProviderHandle::new(provider);

        store.dispatch(action::record_contracts(contexts, sources));
        store.dispatch(action::start(tx_hash, provider.clone()));

        Ok(Self { store, provider, config })
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wait until the session is active.
    ///
    /// Fails with [`SessionError::Start`] carrying the store's fault if starting
    /// failed; a failed session never becomes ready.
    pub async fn ready(&self) -> SessionResult<()> {
        await_transition(&self.store, None, SessionReady::default(), self.config.ready_timeout)
            .await?;
        info!("Session ready");
        Ok(())
    }

    async fn step(&self, action: Action) -> SessionResult<bool> {
        await_transition(&self.store, Some(action), SteppingDone::default(), self.config.step_timeout)
            .await
    }

    /// Interrupt a running stepping request.
    pub async fn interrupt(&self) -> SessionResult<bool> {
        self.step(action::interrupt()).await
    }

    /// Move `count` steps forward (one when `None`).
    pub async fn advance(&self, count: Option<usize>) -> SessionResult<bool> {
        self.step(action::advance(count)).await
    }

    /// Move to the next step mapping to a different source range.
    pub async fn step_next(&self) -> SessionResult<bool> {
        self.step(action::step_next()).await
    }

    /// Move to the next line without descending into calls.
    pub async fn step_over(&self) -> SessionResult<bool> {
        self.step(action::step_over()).await
    }

    /// Move to the next line, descending into calls.
    pub async fn step_into(&self) -> SessionResult<bool> {
        self.step(action::step_into()).await
    }

    /// Run until the current call returns.
    pub async fn step_out(&self) -> SessionResult<bool> {
        self.step(action::step_out()).await
    }

    /// Go back to the first step.
    pub async fn reset(&self) -> SessionResult<bool> {
        self.step(action::reset()).await
    }

    /// Run until a breakpoint is hit or the trace ends.
    ///
    /// `None` uses the breakpoints recorded in the store.
    pub async fn continue_until_breakpoint(
        &self,
        breakpoints: Option<Vec<Breakpoint>>,
    ) -> SessionResult<bool> {
        self.step(action::continue_until_breakpoint(breakpoints)).await
    }

    /// Record a breakpoint. Does not wait.
    pub fn add_breakpoint(&self, breakpoint: Breakpoint) {
        self.store.dispatch(action::add_breakpoint(breakpoint));
    }

    /// Remove a breakpoint. Does not wait.
    pub fn remove_breakpoint(&self, breakpoint: Breakpoint) {
        self.store.dispatch(action::remove_breakpoint(breakpoint));
    }

    /// Remove all breakpoints. Does not wait.
    pub fn remove_all_breakpoints(&self) {
        self.store.dispatch(action::remove_all_breakpoints());
    }

    /// Move a line breakpoint onto the first debuggable line at or after it.
    pub fn adjust_breakpoint(&self, breakpoint: &Breakpoint) -> Option<Breakpoint> {
        adjust_breakpoint(breakpoint, &self.store.state().sources)
    }

    /// Wait until no decode is outstanding. Resolves immediately when none is.
    pub async fn decode_ready(&self) -> SessionResult<()> {
        await_transition(&self.store, None, DecodeReady::default(), self.config.decode_timeout)
            .await
    }

    /// Decode the identifier `name` in scope at the current step.
    pub async fn variable(&self, name: &str) -> SessionResult<DecodedValue> {
        self.decode_ready().await?;

        let binding = self
            .store
            .state()
            .current_step()
            .and_then(|step| step.scope.get(name))
            .cloned()
            .ok_or_else(|| SessionError::UnknownVariable(name.to_string()))?;
        debug!(variable = name, reference = ?binding.reference, "Decoding");

        self.provider
            .decode(&binding)
            .await
            .map_err(|e| SessionError::Decode { name: name.to_string(), reason: format!("{e:#}") })
    }

    /// All identifiers decoded at the current step.
    pub async fn variables(&self) -> SessionResult<BTreeMap<String, DecodedValue>> {
        self.decode_ready().await?;
        Ok(self.view(Decoded))
    }

    /// Query the current snapshot.
    pub fn view<S: Selector>(&self, selector: S) -> S::Output {
        selector.select(&self.store.state())
    }

    /// Dispatch a raw action. Resolves to `true` once it is reduced.
    pub async fn dispatch(&self, action: Action) -> bool {
        self.store.dispatch(action);
        true
    }

    /// The current snapshot.
    pub fn state(&self) -> Arc<DebuggerState> {
        self.store.state()
    }
}
