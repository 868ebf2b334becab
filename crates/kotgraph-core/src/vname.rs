//! VNames: fully qualified identifiers for graph entities.
//!
//! A VName is the five-field tuple `{signature, corpus, root, path,
//! language}`. Semantic nodes carry a structural-path-derived signature plus
//! the language; file nodes instead carry corpus/root/path; anchor nodes
//! inherit the file fields and derive their signature from the byte span.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// Fully qualified identifier for a graph entity.
///
/// Two distinct declarations in one compilation unit never receive equal
/// VNames, and VNames are referentially stable across repeated runs over
/// unchanged input (they are derived purely from structure, never from
/// traversal order or addresses).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VName {
    pub signature: String,
    pub corpus: String,
    pub root: String,
    pub path: String,
    pub language: String,
}

impl VName {
    /// VName for a semantic entity: signature + language, empty file fields.
    pub fn semantic(signature: impl Into<String>, language: impl Into<String>) -> Self {
        VName {
            signature: signature.into(),
            corpus: String::new(),
            root: String::new(),
            path: String::new(),
            language: language.into(),
        }
    }

    /// VName for a file node: corpus-relative path plus corpus/root, no
    /// signature or language.
    pub fn file(path: impl Into<String>, corpus: impl Into<String>, root: impl Into<String>) -> Self {
        VName {
            signature: String::new(),
            corpus: corpus.into(),
            root: root.into(),
            path: path.into(),
            language: String::new(),
        }
    }

    /// VName for an anchor over `span` in the file named by `file`.
    ///
    /// The anchor inherits the file's corpus/root/path so the anchor is
    /// addressable relative to its file, and encodes the span in the
    /// signature so distinct ranges get distinct names.
    pub fn anchor(file: &VName, span: Span, language: impl Into<String>) -> Self {
        VName {
            signature: format!("anchor:{}", span),
            corpus: file.corpus.clone(),
            root: file.root.clone(),
            path: file.path.clone(),
            language: language.into(),
        }
    }
}

impl fmt::Display for VName {
    /// Render as a Kythe-style ticket, mainly for logs and test output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kythe://{}?root={}?path={}?lang={}#{}",
            self.corpus, self.root, self.path, self.language, self.signature
        )
    }
}
