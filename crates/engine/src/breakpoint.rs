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

//! Breakpoint placement.

use sdb_common::{any_non_skipped_in_range, Breakpoint, LineIndex, Source};
use tracing::debug;

/// Move a line breakpoint down to the first line holding debuggable code.
///
/// Node breakpoints are returned unchanged. For a line breakpoint the scan
/// starts at the requested line and only ever moves forward; it stops at the
/// first line intersecting a non-skipped syntax-tree node. `None` means no such
/// line exists at or after the requested one, or the source id is unknown.
pub fn adjust_breakpoint(breakpoint: &Breakpoint, sources: &[Source]) -> Option<Breakpoint> {
    let Some((source_id, requested)) = breakpoint.source_line() else {
        debug!("Node breakpoint needs no adjustment");
        return Some(breakpoint.clone());
    };

    let Some(Source { source, ast, .. }) = sources.get(source_id) else {
        debug!(source_id, "Breakpoint refers to an unknown source");
        return None;
    };

    let lines = LineIndex::new(source);
    let mut line = requested;
    while let Some(range) = lines.line_range(line) {
        if any_non_skipped_in_range(ast, range.start, range.length) {
            debug!(requested, line, "Adjusted breakpoint");
            return Some(breakpoint.with_line(line));
        }
        line += 1;
    }

    debug!(requested, "No debuggable line at or after the requested one");
    None
}
