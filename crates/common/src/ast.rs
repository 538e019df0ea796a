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

//! Syntax-tree helpers.
//!
//! Artifacts carry the compiler's JSON syntax tree. Every node is an object with
//! a `nodeType` and a `src` attribute of the form `start:length:fileIndex`, and
//! child nodes are nested inside their parent's byte range. The helpers here
//! work on that JSON directly: they locate contract definitions, map byte
//! offsets to lines, and answer whether a region of a file holds any node a
//! debugger can stop on.

use serde_json::Value;

/// Node types that never carry debuggable code of their own.
///
/// These are containers or pure declarations: a breakpoint on a line that only
/// intersects such nodes would never be hit.
pub const SKIPPED_NODE_TYPES: &[&str] = &[
    "SourceUnit",
    "PragmaDirective",
    "ImportDirective",
    "ContractDefinition",
    "FunctionDefinition",
    "ModifierDefinition",
    "Block",
    "UncheckedBlock",
    "ParameterList",
    "StructDefinition",
    "EnumDefinition",
    "EnumValue",
    "EventDefinition",
    "ErrorDefinition",
    "UsingForDirective",
    "StructuredDocumentation",
    "UserDefinedValueTypeDefinition",
];

/// A byte range in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceRange {
    /// Byte offset of the first byte
    pub start: usize,
    /// Length in bytes
    pub length: usize,
}

impl SourceRange {
    /// Create a new range.
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// Parse a `start:length[:fileIndex]` attribute. Negative (`-1`) or
    /// malformed components yield `None`.
    pub fn parse(src: &str) -> Option<Self> {
        let mut parts = src.split(':');
        let start = parts.next()?.trim().parse::<usize>().ok()?;
        let length = parts.next()?.trim().parse::<usize>().ok()?;
        Some(Self { start, length })
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Whether this range shares at least one byte with `[start, end)`.
    ///
    /// An empty range counts as a point and intersects when it lies inside.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        if end <= start {
            return false;
        }
        if self.length == 0 {
            return start <= self.start && self.start < end;
        }
        self.start < end && start < self.end()
    }
}

/// Byte offsets of the lines of a source text.
///
/// Lines are obtained by splitting on `'\n'`; `starts[i]` is the byte offset of
/// line `i`, i.e. `starts[0] = 0` and `starts[i] = starts[i - 1] + lengths[i - 1] + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    lengths: Vec<usize>,
}

impl LineIndex {
    /// Build the index for `source`.
    pub fn new(source: &str) -> Self {
        let lengths: Vec<usize> = source.split('\n').map(str::len).collect();
        let mut starts = Vec::with_capacity(lengths.len());
        let mut offset = 0;
        for length in &lengths {
            starts.push(offset);
            offset += length + 1;
        }
        Self { starts, lengths }
    }

    /// Number of lines. A text without newline still has one line.
    pub fn line_count(&self) -> usize {
        self.lengths.len()
    }

    /// Byte offset of the first byte of `line`.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.starts.get(line).copied()
    }

    /// Byte length of `line`, excluding the newline.
    pub fn line_length(&self, line: usize) -> Option<usize> {
        self.lengths.get(line).copied()
    }

    /// The byte range `[start, start + length)` covered by `line`.
    pub fn line_range(&self, line: usize) -> Option<SourceRange> {
        Some(SourceRange::new(self.line_start(line)?, self.line_length(line)?))
    }

    /// The line containing byte `offset`. Offsets past the end map to the last line.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|start| *start <= offset).saturating_sub(1)
    }
}

/// The `nodeType` of a JSON syntax-tree node.
pub fn node_type(node: &Value) -> Option<&str> {
    node.get("nodeType").and_then(Value::as_str)
}

/// The parsed `src` attribute of a JSON syntax-tree node.
pub fn node_range(node: &Value) -> Option<SourceRange> {
    node.get("src").and_then(Value::as_str).and_then(SourceRange::parse)
}

/// Whether a node is excluded from breakpoint placement.
pub fn is_skipped_node(node: &Value) -> bool {
    match (node_type(node), node_range(node)) {
        (Some(kind), Some(_)) => SKIPPED_NODE_TYPES.contains(&kind),
        _ => true,
    }
}

/// Find the `id` of the top-level `ContractDefinition` named `contract_name`.
pub fn find_contract_id(ast: &Value, contract_name: &str) -> Option<i64> {
    ast.get("nodes")?
        .as_array()?
        .iter()
        .find(|node| {
            node_type(node) == Some("ContractDefinition")
                && node.get("name").and_then(Value::as_str) == Some(contract_name)
        })?
        .get("id")?
        .as_i64()
}

/// Whether `ast` contains a non-skipped node whose range intersects
/// `[start, start + length)`.
///
/// Subtrees whose root range lies entirely outside the region are not visited,
/// since children never extend beyond their parent.
pub fn any_non_skipped_in_range(ast: &Value, start: usize, length: usize) -> bool {
    let end = start + length;
    let mut pending = vec![ast];

    while let Some(value) = pending.pop() {
        match value {
            Value::Object(map) => {
                if node_type(value).is_some() {
                    if let Some(range) = node_range(value) {
                        // a parent that covers nothing of the region hides its children too
                        if range.length > 0 && !range.intersects(start, end) {
                            continue;
                        }
                        if !is_skipped_node(value) && range.intersects(start, end) {
                            return true;
                        }
                    }
                }
                pending.extend(map.values());
            }
            Value::Array(items) => pending.extend(items.iter()),
            _ => {}
        }
    }

    false
}
