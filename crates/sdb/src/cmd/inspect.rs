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

//! Inspect command - list normalized contexts and sources

use std::path::PathBuf;

use eyre::Result;
use itertools::Itertools;
use sdb_common::ExecutionContext;
use sdb_engine::normalize;

use crate::utils::load_artifacts;

/// Normalize the artifacts and print their contexts and sources.
pub fn inspect(artifacts: &[PathBuf], files: Option<Vec<String>>) -> Result<()> {
    let contracts = load_artifacts(artifacts)?;
    let (contexts, sources) = normalize(&contracts, files.as_deref())?.into_complete()?;
    tracing::info!("Normalized {} contracts", contracts.len());

    println!("Contexts ({}):", contexts.len());
    for (index, context) in contexts.iter().enumerate() {
        println!("  [{index}] {}", describe_context(context));
    }

    println!("Sources ({}):", sources.len());
    for (index, source) in sources.iter().enumerate() {
        println!("  [{index}] {} ({} lines)", source.source_path, source.source.lines().count());
    }

    Ok(())
}

fn describe_context(context: &ExecutionContext) -> String {
    let kind = if context.is_deployed() { "deployed" } else { "creation" };
    let mut parts = vec![
        format!("{} ({kind})", context.contract_name),
        format!("contract id {}", context.contract_id),
        format!("{} bytecode bytes", context.binary.trim_start_matches("0x").len() / 2),
    ];
    if let Some(compiler) = &context.compiler {
        match compiler.semver() {
            Ok(version) => parts.push(format!("{} {version}", compiler.name)),
            Err(_) => parts.push(format!("{} {}", compiler.name, compiler.version)),
        }
    }
    parts.into_iter().join(", ")
}
