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

//! Adjust command - place a line breakpoint on debuggable code

use std::path::PathBuf;

use eyre::Result;
use sdb_common::Breakpoint;
use sdb_engine::{adjust_breakpoint, normalize};

use crate::utils::load_artifacts;

/// Print where a breakpoint on `source_id:line` would actually be placed.
pub fn adjust(
    artifacts: &[PathBuf],
    source_id: usize,
    line: usize,
    files: Option<Vec<String>>,
) -> Result<()> {
    let contracts = load_artifacts(artifacts)?;
    let (_, sources) = normalize(&contracts, files.as_deref())?.into_complete()?;

    let requested = Breakpoint::line(source_id, line);
    match adjust_breakpoint(&requested, &sources) {
        Some(adjusted) => println!("{requested} -> {adjusted}"),
        None => println!("{requested}: no debuggable line"),
    }
    Ok(())
}
