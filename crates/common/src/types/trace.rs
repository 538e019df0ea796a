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

use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SourceRange;

/// A decoded variable value as produced by the decoder.
pub type DecodedValue = Value;

/// Where one identifier in scope is declared and where its value lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// The declaring syntax-tree node
    pub definition: Value,
    /// Location of the value (stack slot, memory pointer, storage slot, ...)
    pub reference: Value,
}

/// One recorded step of an execution trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    /// Index of the execution context being executed
    pub context: usize,
    /// Source the step maps to, if the source map resolves it
    #[serde(default)]
    pub source_id: Option<usize>,
    /// Byte offset of the mapped source range
    #[serde(default)]
    pub start: usize,
    /// Byte length of the mapped source range
    #[serde(default)]
    pub length: usize,
    /// Call depth of the step
    #[serde(default)]
    pub depth: usize,
    /// AST id of the node the step maps to
    #[serde(default)]
    pub node: Option<i64>,
    /// Identifiers in scope at this step
    #[serde(default)]
    pub scope: BTreeMap<String, Binding>,
}

impl TraceStep {
    /// The mapped source range of this step.
    pub fn range(&self) -> SourceRange {
        SourceRange::new(self.start, self.length)
    }
}

/// A recorded execution trace, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    inner: Vec<TraceStep>,
}

impl Deref for Trace {
    type Target = Vec<TraceStep>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Trace {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl From<Vec<TraceStep>> for Trace {
    fn from(inner: Vec<TraceStep>) -> Self {
        Self { inner }
    }
}

impl FromIterator<TraceStep> for Trace {
    fn from_iter<I: IntoIterator<Item = TraceStep>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

impl Trace {
    /// Index of the last step, `None` for an empty trace.
    pub fn last_index(&self) -> Option<usize> {
        self.inner.len().checked_sub(1)
    }
}
