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

//! Artifact normalization.
//!
//! Several contracts can be defined in the same source file while having
//! different bytecodes. Normalization walks the artifacts once, collecting the
//! bytecodes as execution contexts and the files as deduplicated sources.

use std::collections::HashMap;

use sdb_common::{find_contract_id, ContractArtifact, ExecutionContext, Source};
use tracing::debug;

use crate::{SessionError, SessionResult};

/// Sources in the requested order.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOrdering {
    /// Every requested path (or, without a request, every path) has a source
    Complete(Vec<Source>),
    /// Some requested paths have no source; their slots are `None`
    Partial {
        /// One slot per requested path
        sources: Vec<Option<Source>>,
        /// The requested paths without a source
        missing: Vec<String>,
    },
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Execution contexts in artifact order, creation before deployed
    pub contexts: Vec<ExecutionContext>,
    /// Sources, in first-seen or requested order
    pub sources: SourceOrdering,
}

impl Normalized {
    /// Require a complete source ordering.
    pub fn into_complete(self) -> SessionResult<(Vec<ExecutionContext>, Vec<Source>)> {
        match self.sources {
            SourceOrdering::Complete(sources) => Ok((self.contexts, sources)),
            SourceOrdering::Partial { missing, .. } => {
                Err(SessionError::StaleFileOrdering { missing })
            }
        }
    }
}

/// Split artifacts into execution contexts and unique sources.
///
/// When `files` is given, sources are returned in exactly that order (source
/// ids are positions in this list); otherwise in the order their paths were
/// first seen. Two artifacts with the same path are expected to carry the same
/// source and syntax tree; the last one wins.
pub fn normalize(
    contracts: &[ContractArtifact],
    files: Option<&[String]>,
) -> SessionResult<Normalized> {
    let mut contexts = Vec::new();
    let mut sources: Vec<Source> = Vec::new();
    let mut index_by_path: HashMap<String, usize> = HashMap::new();

    for contract in contracts {
        debug!("sourceMap {:?}", contract.source_map);
        debug!("compiler {:?}", contract.compiler);

        let contract_id = find_contract_id(&contract.ast, &contract.contract_name).ok_or_else(
            || SessionError::MalformedArtifact {
                contract: contract.contract_name.clone(),
                reason: format!(
                    "no ContractDefinition named `{}` in the syntax tree of {}",
                    contract.contract_name, contract.source_path
                ),
            },
        )?;
        debug!(contract = %contract.contract_name, contract_id, "Found contract definition");

        let source = Source {
            source_path: contract.source_path.clone(),
            source: contract.source.clone(),
            ast: contract.ast.clone(),
        };
        match index_by_path.get(&contract.source_path) {
            Some(&index) => sources[index] = source,
            None => {
                index_by_path.insert(contract.source_path.clone(), sources.len());
                sources.push(source);
            }
        }

        if let Some(binary) = contract.creation_bytecode() {
            contexts.push(ExecutionContext {
                contract_name: contract.contract_name.clone(),
                binary: binary.to_string(),
                source_map: contract.source_map.clone(),
                contract_id,
                deployed: false,
                compiler: None,
            });
        }

        if let Some(binary) = contract.deployed_bytecode() {
            contexts.push(ExecutionContext {
                contract_name: contract.contract_name.clone(),
                binary: binary.to_string(),
                source_map: contract.deployed_source_map.clone(),
                contract_id,
                deployed: true,
                compiler: contract.compiler.clone(),
            });
        }
    }

    let sources = match files {
        None => SourceOrdering::Complete(sources),
        Some(files) => {
            let ordered: Vec<Option<Source>> = files
                .iter()
                .map(|file| index_by_path.get(file).map(|&index| sources[index].clone()))
                .collect();
            let missing: Vec<String> = files
                .iter()
                .zip(&ordered)
                .filter(|(_, source)| source.is_none())
                .map(|(file, _)| file.clone())
                .collect();

            if missing.is_empty() {
                SourceOrdering::Complete(ordered.into_iter().flatten().collect())
            } else {
                debug!(?missing, "File ordering references unknown sources");
                SourceOrdering::Partial { sources: ordered, missing }
            }
        }
    };

    Ok(Normalized { contexts, sources })
}
