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

//! Utility functions for the SDB binary

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Result, WrapErr};
use itertools::Itertools;
use sdb_common::ContractArtifact;
use serde_json::Value;
use tracing::debug;

/// Load contract artifacts from files and directories.
///
/// A file holds one artifact or an array of artifacts. A directory contributes
/// every `*.json` file directly inside it, in file-name order.
pub fn load_artifacts(paths: &[PathBuf]) -> Result<Vec<ContractArtifact>> {
    let mut artifacts = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .wrap_err_with(|| format!("Failed to read directory {}", path.display()))?;
            let files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|file| file.extension().is_some_and(|ext| ext == "json"))
                .sorted()
                .collect();
            for file in files {
                artifacts.extend(load_artifact_file(&file)?);
            }
        } else {
            artifacts.extend(load_artifact_file(path)?);
        }
    }
    debug!("Loaded {} artifacts", artifacts.len());
    Ok(artifacts)
}

fn load_artifact_file(path: &Path) -> Result<Vec<ContractArtifact>> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read artifact {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse artifact {}", path.display()))?;

    let artifacts = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ContractArtifact>, _>>(),
        single => serde_json::from_value(single).map(|artifact| vec![artifact]),
    };
    artifacts.wrap_err_with(|| format!("Invalid artifact in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(name: &str) -> Value {
        json!({
            "contractName": name,
            "sourcePath": format!("{name}.sol"),
            "source": "",
            "ast": {}
        })
    }

    #[test]
    fn test_load_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), artifact("B").to_string()).unwrap();
        fs::write(dir.path().join("a.json"), json!([artifact("A"), artifact("C")]).to_string())
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_artifacts(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<&str> = loaded.iter().map(|a| a.contract_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_invalid_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"contractName\": 3}").unwrap();
        let err = load_artifacts(&[path]).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid artifact"));
    }
}
