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

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The literal a compiler emits for a bytecode that is not present, e.g. the
/// creation code of an interface or the deployed code of an abstract contract.
pub const EMPTY_BYTECODE: &str = "0x";

/// Name and version of the compiler that produced an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    /// Compiler name, usually `solc`
    pub name: String,
    /// Full compiler version string, e.g. `0.5.0+commit.1d4f565a.Emscripten.clang`
    pub version: String,
}

impl CompilerInfo {
    /// Parse the version string as a semantic version (build metadata kept).
    pub fn semver(&self) -> Result<semver::Version, semver::Error> {
        semver::Version::parse(self.version.trim_start_matches('v'))
    }
}

/// A compiled contract as produced by the build pipeline, one per contract.
///
/// The serialized form follows the JSON artifact layout (camelCase field names),
/// so artifacts written by the usual build tools deserialize directly. The
/// `bytecode`/`deployedBytecode` spellings are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Name of the contract
    pub contract_name: String,
    /// Creation bytecode, hex encoded
    #[serde(default, alias = "bytecode")]
    pub binary: Option<String>,
    /// Source map of the creation bytecode
    #[serde(default)]
    pub source_map: Option<String>,
    /// Deployed (runtime) bytecode, hex encoded
    #[serde(default, alias = "deployedBytecode")]
    pub deployed_binary: Option<String>,
    /// Source map of the deployed bytecode
    #[serde(default)]
    pub deployed_source_map: Option<String>,
    /// Path of the file the contract is defined in
    pub source_path: String,
    /// Full text of that file
    pub source: String,
    /// JSON syntax tree of that file
    pub ast: Value,
    /// Compiler that produced the artifact
    #[serde(default)]
    pub compiler: Option<CompilerInfo>,
}

impl ContractArtifact {
    /// Creation bytecode, if present and not the empty-bytecode sentinel.
    pub fn creation_bytecode(&self) -> Option<&str> {
        non_empty_bytecode(self.binary.as_deref())
    }

    /// Deployed bytecode, if present and not the empty-bytecode sentinel.
    pub fn deployed_bytecode(&self) -> Option<&str> {
        non_empty_bytecode(self.deployed_binary.as_deref())
    }
}

fn non_empty_bytecode(code: Option<&str>) -> Option<&str> {
    code.filter(|code| !code.is_empty() && *code != EMPTY_BYTECODE)
}

/// One source file together with its syntax tree.
///
/// Sources are keyed by `source_path`; several contracts of the same file share
/// a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Path of the file
    pub source_path: String,
    /// Full text of the file
    pub source: String,
    /// JSON syntax tree of the file
    pub ast: Value,
}

/// One deployable unit of bytecode plus its source map and owning contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Name of the contract the bytecode belongs to
    pub contract_name: String,
    /// Hex encoded bytecode
    pub binary: String,
    /// Source map matching `binary`
    pub source_map: Option<String>,
    /// AST id of the contract's `ContractDefinition` node
    pub contract_id: i64,
    /// Whether `binary` is the deployed (runtime) bytecode
    #[serde(default)]
    pub deployed: bool,
    /// Compiler information, only recorded for deployed bytecode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerInfo>,
}

impl ExecutionContext {
    /// Whether this context was produced from deployed bytecode.
    pub fn is_deployed(&self) -> bool {
        self.deployed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(binary: Option<&str>, deployed: Option<&str>) -> ContractArtifact {
        ContractArtifact {
            contract_name: "Token".into(),
            binary: binary.map(Into::into),
            source_map: None,
            deployed_binary: deployed.map(Into::into),
            deployed_source_map: None,
            source_path: "contracts/Token.sol".into(),
            source: String::new(),
            ast: json!({}),
            compiler: None,
        }
    }

    #[test]
    fn test_empty_bytecode_sentinel_is_absent() {
        let a = artifact(Some("0x"), Some("0x6080"));
        assert_eq!(a.creation_bytecode(), None);
        assert_eq!(a.deployed_bytecode(), Some("0x6080"));

        let b = artifact(None, Some(""));
        assert_eq!(b.creation_bytecode(), None);
        assert_eq!(b.deployed_bytecode(), None);
    }

    #[test]
    fn test_deserialize_artifact_json() {
        let raw = json!({
            "contractName": "Token",
            "bytecode": "0x6080",
            "sourceMap": "0:10:0:-",
            "deployedBytecode": "0x6060",
            "deployedSourceMap": "0:5:0:-",
            "sourcePath": "/tmp/Token.sol",
            "source": "contract Token {}",
            "ast": { "nodeType": "SourceUnit", "nodes": [] },
            "compiler": { "name": "solc", "version": "0.5.0+commit.1d4f565a.Emscripten.clang" }
        });

        let artifact: ContractArtifact = serde_json::from_value(raw).unwrap();
        assert_eq!(artifact.binary.as_deref(), Some("0x6080"));
        assert_eq!(artifact.deployed_binary.as_deref(), Some("0x6060"));
        assert_eq!(artifact.source_path, "/tmp/Token.sol");

        let version = artifact.compiler.unwrap().semver().unwrap();
        assert_eq!((version.major, version.minor, version.patch), (0, 5, 0));
    }
}
