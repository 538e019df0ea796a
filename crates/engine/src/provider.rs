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

//! Trace providers.
//!
//! A provider is the session's handle on the outside world: it produces the
//! recorded trace of a transaction and turns identifier bindings into values.
//! How either is done (node RPC, local replay, recorded fixtures) is up to the
//! implementation.

use std::{collections::BTreeMap, fmt, fs, path::Path, sync::Arc};

use alloy_primitives::TxHash;
use eyre::{eyre, Result, WrapErr};
use futures::future::{self, BoxFuture};
use sdb_common::{Binding, DecodedValue, Trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Source of execution traces and decoded values.
pub trait TraceProvider: Send + Sync + 'static {
    /// Fetch the recorded trace of `tx_hash`.
    fn fetch_trace(&self, tx_hash: TxHash) -> BoxFuture<'_, Result<Trace>>;

    /// Decode the value an identifier binding points at.
    fn decode<'a>(&'a self, binding: &'a Binding) -> BoxFuture<'a, Result<DecodedValue>>;
}

/// Shared, clonable handle to a [`TraceProvider`].
#[derive(Clone)]
pub struct ProviderHandle(pub Arc<dyn TraceProvider>);

impl ProviderHandle {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn TraceProvider>) -> Self {
        Self(provider)
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderHandle(..)")
    }
}

impl std::ops::Deref for ProviderHandle {
    type Target = dyn TraceProvider;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// A recorded value for one binding reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedValue {
    /// The reference as it appears in bindings
    pub reference: Value,
    /// The decoded value
    pub value: DecodedValue,
}

/// On-disk layout read by [`JsonTraceProvider`].
///
/// ```json
/// {
///   "traces": { "0x…txhash": [ { "context": 0, "sourceId": 0, "start": 10, "length": 4 } ] },
///   "values": [ { "reference": { "stack": 1 }, "value": "42" } ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedTraces {
    /// Traces keyed by transaction hash
    #[serde(default)]
    pub traces: BTreeMap<String, Trace>,
    /// Values keyed by binding reference
    #[serde(default)]
    pub values: Vec<RecordedValue>,
}

/// Provider backed by recorded traces and values.
#[derive(Debug, Clone, Default)]
pub struct JsonTraceProvider {
    traces: BTreeMap<TxHash, Trace>,
    values: Vec<RecordedValue>,
}

impl JsonTraceProvider {
    /// Build a provider from recorded data. Trace keys must be transaction hashes.
    pub fn new(recorded: RecordedTraces) -> Result<Self> {
        let traces: BTreeMap<TxHash, Trace> = recorded
            .traces
            .into_iter()
            .map(|(hash, trace)| {
                let hash = hash
                    .parse::<TxHash>()
                    .map_err(|e| eyre!("Invalid transaction hash {hash}: {e}"))?;
                Ok((hash, trace))
            })
            .collect::<Result<_>>()?;
        Ok(Self { traces, values: recorded.values })
    }

    /// Load recorded data from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read trace file {}", path.display()))?;
        let recorded: RecordedTraces = serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse trace file {}", path.display()))?;
        debug!(
            path = %path.display(),
            traces = recorded.traces.len(),
            values = recorded.values.len(),
            "Loaded recorded traces"
        );
        Self::new(recorded)
    }

    /// Add or replace the trace of a transaction.
    pub fn with_trace(mut self, tx_hash: TxHash, trace: Trace) -> Self {
        self.traces.insert(tx_hash, trace);
        self
    }

    /// Add a recorded value for a binding reference.
    pub fn with_value(mut self, reference: Value, value: DecodedValue) -> Self {
        self.values.push(RecordedValue { reference, value });
        self
    }
}

impl TraceProvider for JsonTraceProvider {
    fn fetch_trace(&self, tx_hash: TxHash) -> BoxFuture<'_, Result<Trace>> {
        let trace =
            self.traces.get(&tx_hash).cloned().ok_or_else(|| eyre!("No trace recorded for {tx_hash}"));
        Box::pin(future::ready(trace))
    }

    fn decode<'a>(&'a self, binding: &'a Binding) -> BoxFuture<'a, Result<DecodedValue>> {
        let value = self
            .values
            .iter()
            .find(|recorded| recorded.reference == binding.reference)
            .map(|recorded| recorded.value.clone())
            .ok_or_else(|| eyre!("No recorded value for reference {}", binding.reference));
        Box::pin(future::ready(value))
    }
}
