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

//! SDB - Solidity Debugger
//!
//! Source-level stepping through recorded transaction traces.

use std::path::PathBuf;

use alloy_primitives::TxHash;
use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;
mod utils;

/// Command-line interface for SDB
#[derive(Debug, Parser)]
#[command(name = "sdb")]
#[command(about = "Solidity Debugger - step through recorded transaction traces")]
#[command(version)]
pub struct Cli {
    /// Also write logs to a daily rolling file
    #[arg(long, env = "SDB_LOG_FILE")]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize artifacts and list their execution contexts and sources
    Inspect {
        /// Artifact files, or directories of *.json artifacts
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,

        /// Source paths in the order that assigns source ids
        #[arg(long, num_args = 1..)]
        files: Option<Vec<String>>,
    },
    /// Move a line breakpoint onto the next debuggable line
    Adjust {
        /// Artifact files, or directories of *.json artifacts
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,

        /// Source id of the breakpoint
        #[arg(long)]
        source_id: usize,

        /// 0-indexed line of the breakpoint
        #[arg(long)]
        line: usize,

        /// Source paths in the order that assigns source ids
        #[arg(long, num_args = 1..)]
        files: Option<Vec<String>>,
    },
    /// Replay a recorded transaction and debug it interactively
    Replay {
        /// Transaction hash to replay
        tx_hash: String,

        /// JSON file with recorded traces and values
        #[arg(long)]
        trace: PathBuf,

        /// Artifact files, or directories of *.json artifacts
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,

        /// Session configuration (default: ~/.sdb.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source paths in the order that assigns source ids
        #[arg(long, num_args = 1..)]
        files: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    sdb_common::logging::init_logging("sdb", cli.log_file)?;

    match cli.command {
        Commands::Inspect { artifacts, files } => cmd::inspect(&artifacts, files),
        Commands::Adjust { artifacts, source_id, line, files } => {
            cmd::adjust(&artifacts, source_id, line, files)
        }
        Commands::Replay { tx_hash, trace, artifacts, config, files } => {
            tracing::info!("Replaying transaction: {}", tx_hash);
            let tx_hash: TxHash = tx_hash.parse()?;
            cmd::replay_transaction(tx_hash, &trace, &artifacts, config.as_deref(), files).await
        }
    }
}
