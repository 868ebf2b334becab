//! Kotlin semantic-graph extraction for kotgraph.
//!
//! This crate traverses a fully type-checked compilation unit exactly once
//! and emits a cross-reference graph: nodes for program entities, edges for
//! the relations between them, each anchored to byte ranges in source text.
//!
//! - [`ir`]: the arena-based typed-tree input model
//! - [`signatures`]: deterministic structural identifiers
//! - [`sources`]: source text access and span resolution
//! - [`entries`]: fact construction and the entry/fact caches
//! - [`indexer`]: the single-pass traversal
//!
//! Entry point: [`index_unit`].

pub mod entries;
pub mod indexer;
pub mod ir;
pub mod signatures;
pub mod sources;
pub mod tags;

/// VName language marker for every semantic node this crate emits.
pub const LANGUAGE: &str = "kotlin";

pub use indexer::{index_unit, GraphIndexer};
pub use signatures::SignatureEngine;
pub use sources::{compilation_vname, Sources, TextSources};
