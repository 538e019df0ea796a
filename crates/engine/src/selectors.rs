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

//! Named queries against a [`DebuggerState`] snapshot.
//!
//! The set is closed: [`Selector`] is sealed, and every query the session
//! exposes through [`Session::view`](crate::Session::view) is listed here.

use std::{collections::BTreeMap, sync::Arc};

use sdb_common::{Breakpoint, DecodedValue, ExecutionContext, LineIndex, Source, TraceStep};
use serde::Serialize;
use serde_json::Value;

use crate::{DebuggerState, SessionStatus};

mod sealed {
    pub trait Sealed {}
}

/// A read-only query over a state snapshot.
pub trait Selector: sealed::Sealed {
    /// The query result
    type Output;

    /// Run the query.
    fn select(&self, state: &DebuggerState) -> Self::Output;
}

macro_rules! selector {
    ($(#[$meta:meta])* $name:ident -> $output:ty, |$state:ident| $body:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl Selector for $name {
            type Output = $output;

            fn select(&self, $state: &DebuggerState) -> Self::Output {
                $body
            }
        }
    };
}

/// Source position of the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Source id
    pub source_id: usize,
    /// Path of the source
    pub source_path: String,
    /// 0-indexed line
    pub line: usize,
}

selector!(
    /// Lifecycle stage of the session.
    Status -> SessionStatus, |state| state.status.clone()
);

selector!(
    /// Whether a stepping request is in progress.
    IsStepping -> bool, |state| state.stepping
);

selector!(
    /// Number of outstanding decodes.
    DecodingKeys -> i64, |state| state.decoding_keys
);

selector!(
    /// Declaring nodes of the identifiers in scope, by name.
    Definitions -> BTreeMap<String, Value>, |state| {
        state
            .current_step()
            .map(|step| {
                step.scope
                    .iter()
                    .map(|(name, binding)| (name.clone(), binding.definition.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
);

selector!(
    /// Value locations of the identifiers in scope, by name.
    Refs -> BTreeMap<String, Value>, |state| {
        state
            .current_step()
            .map(|step| {
                step.scope
                    .iter()
                    .map(|(name, binding)| (name.clone(), binding.reference.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
);

selector!(
    /// Values decoded so far for the current step.
    Decoded -> BTreeMap<String, DecodedValue>, |state| state.decoded.clone()
);

selector!(
    /// Normalized sources.
    Sources -> Arc<Vec<Source>>, |state| state.sources.clone()
);

selector!(
    /// Normalized execution contexts.
    Contexts -> Arc<Vec<ExecutionContext>>, |state| state.contexts.clone()
);

selector!(
    /// Recorded breakpoints.
    Breakpoints -> Vec<Breakpoint>, |state| state.breakpoints.clone()
);

selector!(
    /// The current trace step.
    CurrentStep -> Option<TraceStep>, |state| state.current_step().cloned()
);

selector!(
    /// Index of the current trace step.
    CurrentIndex -> usize, |state| state.current
);

selector!(
    /// Number of steps in the loaded trace.
    TraceLength -> usize, |state| state.trace.len()
);

selector!(
    /// Whether the last step has been reached.
    Finished -> bool, |state| state.finished
);

selector!(
    /// Source position of the current step.
    CurrentLocation -> Option<Location>, |state| {
        let step = state.current_step()?;
        let source = state.sources.get(step.source_id?)?;
        Some(Location {
            source_id: step.source_id?,
            source_path: source.source_path.clone(),
            line: LineIndex::new(&source.source).line_of(step.start),
        })
    }
);
