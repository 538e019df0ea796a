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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Represents a breakpoint in the debugger.
///
/// A breakpoint is either attached to a syntax-tree node, in which case it is
/// used as-is, or to a 0-indexed line of a source, in which case the debugger
/// may move it down to the next line that holds debuggable code. Any additional
/// fields a front end attaches are carried along untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Breakpoint {
    /// A breakpoint on a syntax-tree node.
    Node {
        /// AST id of the node
        node: i64,
        /// Opaque extra fields
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// A breakpoint on a source line.
    Line {
        /// Index of the source in the session's source list
        #[serde(rename = "sourceId")]
        source_id: usize,
        /// 0-indexed line number
        line: usize,
        /// Opaque extra fields
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl Breakpoint {
    /// Create a node-based breakpoint.
    pub fn node(node: i64) -> Self {
        Self::Node { node, extra: Map::new() }
    }

    /// Create a line-based breakpoint.
    pub fn line(source_id: usize, line: usize) -> Self {
        Self::Line { source_id, line, extra: Map::new() }
    }

    /// Whether this is a node-based breakpoint.
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }

    /// The `(source_id, line)` pair of a line-based breakpoint.
    pub fn source_line(&self) -> Option<(usize, usize)> {
        match self {
            Self::Line { source_id, line, .. } => Some((*source_id, *line)),
            Self::Node { .. } => None,
        }
    }

    /// Returns the same breakpoint on another line. Node breakpoints are unchanged.
    pub fn with_line(&self, new_line: usize) -> Self {
        match self {
            Self::Line { source_id, extra, .. } => {
                Self::Line { source_id: *source_id, line: new_line, extra: extra.clone() }
            }
            Self::Node { .. } => self.clone(),
        }
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node { node, .. } => write!(f, "#{node}"),
            Self::Line { source_id, line, .. } => write!(f, "@{source_id}:{line}"),
        }
    }
}

impl FromStr for Breakpoint {
    type Err = Error;

    /// Parses a breakpoint from a string.
    /// Format: `@<source_id>:<line>` or `#<node_id>`
    /// Examples:
    /// - `@0:12` - Breakpoint at line 12 (0-indexed) of source 0
    /// - `#42` - Breakpoint at AST node 42
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Some(node) = trimmed.strip_prefix('#') {
            let node = node.trim().parse::<i64>().map_err(|e| eyre!("Invalid node id: {e}"))?;
            return Ok(Self::node(node));
        }

        if let Some(loc) = trimmed.strip_prefix('@') {
            let Some((source_id, line)) = loc.split_once(':') else {
                bail!("Invalid line breakpoint. Expected @<source_id>:<line>, got: {s}");
            };
            let source_id =
                source_id.trim().parse::<usize>().map_err(|e| eyre!("Invalid source id: {e}"))?;
            let line = line.trim().parse::<usize>().map_err(|e| eyre!("Invalid line: {e}"))?;
            return Ok(Self::line(source_id, line));
        }

        bail!("Invalid breakpoint format. Expected @<source_id>:<line> or #<node>, got: {s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_breakpoints() {
        assert_eq!("@1:20".parse::<Breakpoint>().unwrap(), Breakpoint::line(1, 20));
        assert_eq!(" #57 ".parse::<Breakpoint>().unwrap(), Breakpoint::node(57));
        assert!("1:20".parse::<Breakpoint>().is_err());
        assert!("@1".parse::<Breakpoint>().is_err());
        assert!("#abc".parse::<Breakpoint>().is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for bp in [Breakpoint::line(3, 0), Breakpoint::node(12)] {
            assert_eq!(bp.to_string().parse::<Breakpoint>().unwrap(), bp);
        }
    }

    #[test]
    fn test_json_shapes() {
        let line: Breakpoint =
            serde_json::from_value(json!({ "sourceId": 2, "line": 7, "compilationId": "x" }))
                .unwrap();
        assert_eq!(line.source_line(), Some((2, 7)));
        match &line {
            Breakpoint::Line { extra, .. } => assert_eq!(extra["compilationId"], json!("x")),
            other => panic!("unexpected breakpoint {other:?}"),
        }

        let node: Breakpoint = serde_json::from_value(json!({ "node": 9, "sourceId": 0 })).unwrap();
        assert!(node.is_node());
        assert_eq!(serde_json::to_value(&node).unwrap(), json!({ "node": 9, "sourceId": 0 }));
    }

    #[test]
    fn test_with_line_keeps_extra_fields() {
        let mut extra = Map::new();
        extra.insert("label".into(), json!("entry"));
        let bp = Breakpoint::Line { source_id: 0, line: 1, extra };

        let moved = bp.with_line(4);
        assert_eq!(moved.source_line(), Some((0, 4)));
        assert_eq!(serde_json::to_value(&moved).unwrap()["label"], json!("entry"));
        assert_eq!(Breakpoint::node(5).with_line(9), Breakpoint::node(5));
    }
}
