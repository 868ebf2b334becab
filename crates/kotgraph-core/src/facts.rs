//! Fact model: node/edge kinds, fact entries, and sinks.
//!
//! The extractor's output is an ordered, append-only sequence of facts:
//!
//! - NODE fact: a [`VName`] plus a closed [`NodeKind`] and optional payload
//!   (file text for file nodes, byte location for anchors).
//! - EDGE fact: source VName, [`EdgeKind`], target VName, optional ordinal
//!   for positional relations (parameters, upper bounds).
//!
//! No fact is ever retracted or updated. Sinks implement [`FactSink`];
//! [`MemorySink`] collects entries for inspection and [`JsonLinesSink`]
//! streams them as one JSON object per line.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::vname::VName;

// ============================================================================
// Node Kinds
// ============================================================================

/// Closed set of node kinds the extractor emits.
///
/// Kinds map onto Kythe's `node/kind` (+ optional `subkind`) fact strings;
/// singleton objects and companion objects are `constant` nodes with a
/// distinguishing subkind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    RecordClass,
    Interface,
    SumEnumClass,
    Object,
    CompanionObject,
    Constant,
    Function,
    FunctionConstructor,
    Property,
    VariableField,
    VariableLocal,
    VariableParameter,
    TypeAlias,
    AbsVar,
    Abs,
    TApply,
    FunctionType,
    Anchor,
}

impl NodeKind {
    /// The `node/kind` fact string.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::RecordClass => "record",
            NodeKind::Interface => "interface",
            NodeKind::SumEnumClass => "sum",
            NodeKind::Object | NodeKind::CompanionObject | NodeKind::Constant => "constant",
            NodeKind::Function | NodeKind::FunctionConstructor => "function",
            NodeKind::Property => "property",
            NodeKind::VariableField | NodeKind::VariableLocal | NodeKind::VariableParameter => {
                "variable"
            }
            NodeKind::TypeAlias => "talias",
            NodeKind::AbsVar => "absvar",
            NodeKind::Abs => "abs",
            NodeKind::TApply => "tapp",
            NodeKind::FunctionType => "fntype",
            NodeKind::Anchor => "anchor",
        }
    }

    /// The `subkind` fact string, when the kind alone is ambiguous.
    pub fn subkind(&self) -> Option<&'static str> {
        match self {
            NodeKind::RecordClass => Some("class"),
            NodeKind::SumEnumClass => Some("enumClass"),
            NodeKind::Object => Some("object"),
            NodeKind::CompanionObject => Some("companion"),
            NodeKind::FunctionConstructor => Some("constructor"),
            NodeKind::VariableField => Some("field"),
            NodeKind::VariableLocal => Some("local"),
            NodeKind::VariableParameter => Some("parameter"),
            _ => None,
        }
    }
}

// ============================================================================
// Edge Kinds
// ============================================================================

/// Closed set of edge kinds the extractor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    ChildOf,
    Defines,
    DefinesBinding,
    Extends,
    Overrides,
    Typed,
    Ref,
    Param,
    BoundedUpper,
}

impl EdgeKind {
    /// The edge-kind fact string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::ChildOf => "childof",
            EdgeKind::Defines => "defines",
            EdgeKind::DefinesBinding => "defines/binding",
            EdgeKind::Extends => "extends",
            EdgeKind::Overrides => "overrides",
            EdgeKind::Typed => "typed",
            EdgeKind::Ref => "ref",
            EdgeKind::Param => "param",
            EdgeKind::BoundedUpper => "bounded/upper",
        }
    }
}

// ============================================================================
// Fact Entries
// ============================================================================

/// Payload attached to a NODE fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePayload {
    /// Full byte content and declared encoding of a file node.
    FileText { content: Vec<u8>, encoding: String },
    /// Byte range of an anchor node within its file.
    Location { span: Span },
}

/// One fact in the output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    Node {
        vname: VName,
        kind: NodeKind,
        payload: Option<NodePayload>,
    },
    Edge {
        source: VName,
        kind: EdgeKind,
        target: VName,
        ordinal: Option<u32>,
    },
}

impl Entry {
    /// The node's VName, if this is a NODE fact.
    pub fn node_vname(&self) -> Option<&VName> {
        match self {
            Entry::Node { vname, .. } => Some(vname),
            Entry::Edge { .. } => None,
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Receiver for the emitted fact stream.
///
/// The extractor guarantees deterministic, at-most-once emission per fact
/// identity; a sink only appends. Sharing one sink across concurrently
/// indexed units is the caller's responsibility — the core provides no
/// synchronization.
pub trait FactSink {
    fn emit(&mut self, entry: Entry);
}

/// Sink that collects all entries in memory, preserving emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Vec<Entry>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// All entries in emission order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// All NODE facts with the given kind, in emission order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Node { kind: k, .. } if *k == kind))
            .collect()
    }

    /// All EDGE facts with the given kind, in emission order.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<(&VName, &VName, Option<u32>)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Edge {
                    source,
                    kind: k,
                    target,
                    ordinal,
                } if *k == kind => Some((source, target, *ordinal)),
                _ => None,
            })
            .collect()
    }
}

impl FactSink for MemorySink {
    fn emit(&mut self, entry: Entry) {
        self.entries.push(entry);
    }
}

/// Sink that streams entries as JSON lines to a writer.
///
/// Write failures are sticky: the first error stops further output and is
/// surfaced by [`finish`](Self::finish), so a truncated stream is never
/// mistaken for a complete one.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    error: Option<std::io::Error>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer,
            error: None,
        }
    }

    /// Consume the sink, returning the writer or the first write error.
    pub fn finish(self) -> std::io::Result<W> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.writer),
        }
    }

    fn try_emit(&mut self, entry: &Entry) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> FactSink for JsonLinesSink<W> {
    fn emit(&mut self, entry: Entry) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.try_emit(&entry) {
            self.error = Some(error);
        }
    }
}
