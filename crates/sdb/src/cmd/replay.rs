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

//! Replay command - interactive debugging of a recorded transaction

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use alloy_primitives::TxHash;
use eyre::{bail, eyre, Result, WrapErr};
use sdb_common::Breakpoint;
use sdb_engine::{
    selectors::{Breakpoints, CurrentIndex, CurrentLocation, Finished, Sources, TraceLength},
    JsonTraceProvider, Session, SessionConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// A debugger command read from stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `n`: next source range
    Next,
    /// `o`: step over
    Over,
    /// `i`: step into
    Into,
    /// `u`: step out
    Out,
    /// `a [count]`: advance a number of steps
    Advance(Option<usize>),
    /// `c`: continue to the next breakpoint
    Continue,
    /// `r`: back to the first step
    Reset,
    /// `b <source> <line>`: set a breakpoint
    Break(usize, usize),
    /// `d <source> <line>`: remove a breakpoint
    Delete(usize, usize),
    /// `D`: remove all breakpoints
    DeleteAll,
    /// `v [name]`: print variables
    Variables(Option<String>),
    /// `q`: quit
    Quit,
}

impl FromStr for ReplCommand {
    type Err = eyre::Report;

    fn from_str(input: &str) -> Result<Self> {
        let mut words = input.split_whitespace();
        let Some(head) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();

        let command = match (head, args.as_slice()) {
            ("n", []) => Self::Next,
            ("o", []) => Self::Over,
            ("i", []) => Self::Into,
            ("u", []) => Self::Out,
            ("a", []) => Self::Advance(None),
            ("a", [count]) => Self::Advance(Some(parse_number(count)?)),
            ("c", []) => Self::Continue,
            ("r", []) => Self::Reset,
            ("b", args) => {
                let (source, line) = parse_location(args)?;
                Self::Break(source, line)
            }
            ("d", args) => {
                let (source, line) = parse_location(args)?;
                Self::Delete(source, line)
            }
            ("D", []) => Self::DeleteAll,
            ("v", []) => Self::Variables(None),
            ("v", [name]) => Self::Variables(Some(name.to_string())),
            ("q", []) => Self::Quit,
            _ => bail!("unknown command `{input}`"),
        };
        Ok(command)
    }
}

fn parse_number(word: &str) -> Result<usize> {
    word.parse().map_err(|_| eyre!("expected a number, got `{word}`"))
}

fn parse_location(args: &[&str]) -> Result<(usize, usize)> {
    match args {
        [source, line] => Ok((parse_number(source)?, parse_number(line)?)),
        _ => bail!("expected `<source> <line>`"),
    }
}

/// Start a session over a recorded trace and run debugger commands from stdin.
pub async fn replay_transaction(
    tx_hash: TxHash,
    trace: &Path,
    artifacts: &[PathBuf],
    config: Option<&Path>,
    files: Option<Vec<String>>,
) -> Result<()> {
    info!("Starting transaction replay workflow");

    let config = SessionConfig::load(config)?;
    let contracts = crate::utils::load_artifacts(artifacts)?;
    let provider = JsonTraceProvider::from_file(trace)?;

    let session = Session::with_config(contracts, files, tx_hash, Arc::new(provider), config)?;
    session.ready().await.wrap_err("Failed to start the debugging session")?;
    print_location(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match line.parse::<ReplCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {e}");
                continue;
            }
        };
        debug!(?command, "Executing");
        if command == ReplCommand::Quit {
            break;
        }
        execute(&session, command).await?;
    }

    info!("Replay finished");
    Ok(())
}

async fn execute(session: &Session, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::Next => session.step_next().await?,
        ReplCommand::Over => session.step_over().await?,
        ReplCommand::Into => session.step_into().await?,
        ReplCommand::Out => session.step_out().await?,
        ReplCommand::Advance(count) => session.advance(count).await?,
        ReplCommand::Continue => session.continue_until_breakpoint(None).await?,
        ReplCommand::Reset => session.reset().await?,
        ReplCommand::Break(source, line) => {
            let requested = Breakpoint::line(source, line);
            match session.adjust_breakpoint(&requested) {
                Some(adjusted) => {
                    println!("breakpoint set at {adjusted}");
                    session.add_breakpoint(adjusted);
                }
                None => println!("no debuggable line at or after {requested}"),
            }
            return Ok(());
        }
        ReplCommand::Delete(source, line) => {
            let requested = Breakpoint::line(source, line);
            let Some(breakpoint) = session.adjust_breakpoint(&requested) else {
                println!("no breakpoint at {requested}");
                return Ok(());
            };
            let before = session.view(Breakpoints).len();
            session.remove_breakpoint(breakpoint.clone());
            if session.view(Breakpoints).len() < before {
                println!("breakpoint {breakpoint} removed");
            } else {
                println!("no breakpoint at {breakpoint}");
            }
            return Ok(());
        }
        ReplCommand::DeleteAll => {
            session.remove_all_breakpoints();
            println!("all breakpoints removed");
            return Ok(());
        }
        ReplCommand::Variables(None) => {
            for (name, value) in session.variables().await? {
                println!("{name} = {value}");
            }
            return Ok(());
        }
        ReplCommand::Variables(Some(name)) => {
            match session.variable(&name).await {
                Ok(value) => println!("{name} = {value}"),
                Err(e) => println!("error: {e}"),
            }
            return Ok(());
        }
        ReplCommand::Quit => return Ok(()),
    };

    print_location(session);
    Ok(())
}

fn print_location(session: &Session) {
    let index = session.view(CurrentIndex);
    let total = session.view(TraceLength);

    match session.view(CurrentLocation) {
        Some(location) => {
            let sources = session.view(Sources);
            let text = sources
                .get(location.source_id)
                .and_then(|source| source.source.lines().nth(location.line))
                .unwrap_or_default()
                .trim();
            println!(
                "step {index}/{total} {}:{}  {text}",
                location.source_path, location.line
            );
        }
        None => println!("step {index}/{total} (no source)"),
    }

    if session.view(Finished) {
        println!("end of trace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("n".parse::<ReplCommand>().unwrap(), ReplCommand::Next);
        assert_eq!(" a  3 ".parse::<ReplCommand>().unwrap(), ReplCommand::Advance(Some(3)));
        assert_eq!("a".parse::<ReplCommand>().unwrap(), ReplCommand::Advance(None));
        assert_eq!("b 1 12".parse::<ReplCommand>().unwrap(), ReplCommand::Break(1, 12));
        assert_eq!("d 0 4".parse::<ReplCommand>().unwrap(), ReplCommand::Delete(0, 4));
        assert_eq!("D".parse::<ReplCommand>().unwrap(), ReplCommand::DeleteAll);
        assert_eq!(
            "v balance".parse::<ReplCommand>().unwrap(),
            ReplCommand::Variables(Some("balance".into()))
        );
        assert_eq!("q".parse::<ReplCommand>().unwrap(), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_rejects_malformed_commands() {
        assert!("".parse::<ReplCommand>().is_err());
        assert!("x".parse::<ReplCommand>().is_err());
        assert!("b 1".parse::<ReplCommand>().is_err());
        assert!("a many".parse::<ReplCommand>().is_err());
        assert!("n 2".parse::<ReplCommand>().is_err());
    }
}
