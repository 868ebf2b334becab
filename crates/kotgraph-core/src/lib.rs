//! Core infrastructure for kotgraph.
//!
//! This crate provides the language-agnostic half of the extractor:
//! - VNames: structural identifiers for graph entities
//! - Fact model: node/edge kinds, entries, and sinks
//! - Byte spans and content hashing
//! - The fatal error taxonomy shared by every component

pub mod error;
pub mod facts;
pub mod span;
pub mod vname;

pub use error::{IndexError, Result};
pub use facts::{Entry, EdgeKind, FactSink, JsonLinesSink, MemorySink, NodeKind, NodePayload};
pub use span::{ContentHash, Span};
pub use vname::VName;
