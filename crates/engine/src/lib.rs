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

//! SDB Engine - debugging session controller
//!
//! The engine sits between a caller (a UI or a script) and an execution-trace
//! state store. It normalizes compiled artifacts into execution contexts and
//! sources, drives the store through typed actions, and turns the stream of
//! state snapshots into asynchronous operations that complete exactly once:
//! a step has settled, pending decodes have drained, the session is ready.
//!
//! # Key Components
//!
//! - [`Session`] - the facade callers interact with
//! - [`StateStore`] - owned state machine with registered listeners
//! - [`await_transition`] - the completion protocol behind every awaited call
//! - [`normalize`] - artifact partitioning into contexts and sources
//! - [`adjust_breakpoint`] - moves line breakpoints onto debuggable lines
//! - [`ReplayEngine`] - effect layer replaying a recorded trace

pub mod action;
pub use action::*;

pub mod breakpoint;
pub use breakpoint::*;

pub mod config;
pub use config::*;

pub mod coordinator;
pub use coordinator::*;

pub mod error;
pub use error::*;

pub mod normalize;
pub use normalize::*;

pub mod provider;
pub use provider::*;

pub mod replay;
pub use replay::*;

pub mod selectors;

pub mod session;
pub use session::*;

pub mod state;
pub use state::*;

pub mod store;
pub use store::*;
