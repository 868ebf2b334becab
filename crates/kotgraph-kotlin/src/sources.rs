//! Source text access and span resolution.
//!
//! Bridges the typed tree's character offsets to the byte-range anchors the
//! fact stream carries. The tree alone cannot distinguish an identifier
//! token from the declaration around it, so [`TextSources`] re-scans the
//! declaration's source slice with a small byte lexer.
//!
//! Offsets are treated as one byte per character: file content is exposed
//! in a single-byte encoding (non-ASCII characters are replaced), which
//! makes character offsets and byte offsets coincide. This is an explicit
//! approximation, not correct general-encoding behavior.

use kotgraph_core::{ContentHash, IndexError, Result, Span, VName};

use crate::ir::{AccessorRole, ClassKind, DeclId, DeclKind, FileId, Unit};
use crate::LANGUAGE;

/// Declared encoding of emitted file content.
pub const FILE_ENCODING: &str = "US-ASCII";

/// Span queries the indexer needs against source text.
///
/// Seam for the host environment: the default [`TextSources`] works off the
/// unit's embedded text, a host with richer syntax trees can substitute its
/// own resolver.
pub trait Sources {
    /// VName of a file node: corpus-relative path plus corpus/root.
    fn file_vname(&self, file: FileId) -> VName;

    /// Full file content in the declared single-byte encoding.
    fn file_content(&self, file: FileId) -> Vec<u8>;

    /// Declared encoding of [`file_content`](Self::file_content).
    fn file_encoding(&self) -> &'static str;

    /// The element's own start/end offsets, unmodified.
    fn span_for_whole_element(&self, decl: DeclId) -> Result<Span>;

    /// Span of the declaration's name token alone.
    fn span_for_identifier_only(&self, decl: DeclId) -> Result<Span>;

    /// Span of an explicit type annotation written in source; `None` when
    /// the type was inferred, or for constructors and property accessors,
    /// which never carry one.
    fn span_for_return_type(&self, decl: DeclId) -> Option<Span>;
}

/// Text-backed [`Sources`] over a unit's embedded file content.
#[derive(Debug)]
pub struct TextSources<'u> {
    unit: &'u Unit,
    corpus: String,
    root: String,
}

impl<'u> TextSources<'u> {
    pub fn new(unit: &'u Unit, corpus: impl Into<String>, root: impl Into<String>) -> Self {
        TextSources {
            unit,
            corpus: corpus.into(),
            root: root.into(),
        }
    }

    fn decl_span(&self, decl: DeclId) -> Result<Span> {
        self.unit.decl(decl).span.ok_or_else(|| {
            IndexError::malformed(format!(
                "declaration `{}` has no source span",
                self.unit.decl(decl).name
            ))
        })
    }

    /// First occurrence of `token` as a whole identifier inside `range`.
    fn token_span(&self, decl: DeclId, range: Span, token: &str) -> Option<Span> {
        let file = self.unit.containing_file(decl);
        let content = encode_single_byte(&self.unit.file(file).text);
        find_token(&content, range, token)
    }
}

impl Sources for TextSources<'_> {
    fn file_vname(&self, file: FileId) -> VName {
        VName::file(
            self.unit.file(file).path.clone(),
            self.corpus.clone(),
            self.root.clone(),
        )
    }

    fn file_content(&self, file: FileId) -> Vec<u8> {
        encode_single_byte(&self.unit.file(file).text)
    }

    fn file_encoding(&self) -> &'static str {
        FILE_ENCODING
    }

    fn span_for_whole_element(&self, decl: DeclId) -> Result<Span> {
        self.decl_span(decl)
    }

    fn span_for_identifier_only(&self, decl: DeclId) -> Result<Span> {
        let whole = self.decl_span(decl)?;
        let d = self.unit.decl(decl);
        match &d.kind {
            // An implicit receiver parameter has no written identifier; its
            // own offsets are the best available anchor.
            DeclKind::ValueParameter(p) if p.index < 0 => Ok(whole),
            // Constructors have no separate name token.
            DeclKind::Constructor(_) => Ok(whole),
            // Accessors anchor on their introducing keyword.
            DeclKind::Function(f) if f.accessor_role.is_some() => {
                let keyword = match f.accessor_role {
                    Some(AccessorRole::Setter) => "set",
                    _ => "get",
                };
                self.token_span(decl, whole, keyword).ok_or_else(|| {
                    IndexError::malformed(format!("no `{keyword}` keyword for accessor"))
                })
            }
            // A singleton declaration may be unnamed in source; fall back to
            // its introducing keyword.
            DeclKind::Class(c) if c.class_kind == ClassKind::Object => self
                .token_span(decl, whole, &d.name)
                .or_else(|| self.token_span(decl, whole, "object"))
                .ok_or_else(|| {
                    IndexError::malformed(format!("no identifier or `object` keyword for `{}`", d.name))
                }),
            _ => self.token_span(decl, whole, &d.name).ok_or_else(|| {
                IndexError::malformed(format!("no identifier token for `{}`", d.name))
            }),
        }
    }

    fn span_for_return_type(&self, decl: DeclId) -> Option<Span> {
        let d = self.unit.decl(decl);
        match &d.kind {
            DeclKind::Constructor(_) => None,
            DeclKind::Function(f) if f.accessor_role.is_some() => None,
            _ => d.type_annotation,
        }
    }
}

/// VName identifying the whole compilation unit, derived from its file set.
///
/// The signature is `#` followed by the SHA-256 of the corpus-relative
/// paths, so the same file set always names the same unit.
pub fn compilation_vname(unit: &Unit, target: Option<&str>) -> VName {
    let signature = match target {
        Some(target) => target.to_string(),
        None => {
            let joined = unit
                .files()
                .map(|(_, f)| f.path.as_str())
                .collect::<Vec<_>>()
                .join(":");
            format!("#{}", ContentHash::compute(joined.as_bytes()))
        }
    };
    VName::semantic(signature, LANGUAGE)
}

/// Lossy single-byte encoding: ASCII passes through, everything else
/// becomes `?`. Keeps byte offsets equal to character offsets.
fn encode_single_byte(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan `range` of `content` for `token` as a standalone identifier,
/// skipping comments and string/char literals.
fn find_token(content: &[u8], range: Span, token: &str) -> Option<Span> {
    let start = range.start as usize;
    let end = (range.end as usize).min(content.len());
    if start >= end {
        return None;
    }
    let bytes = &content[start..end];
    let needle = token.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b if is_ident_start(b) => {
                let ident_start = i;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                if &bytes[ident_start..i] == needle {
                    return Some(Span::new(
                        (start + ident_start) as u32,
                        (start + i) as u32,
                    ));
                }
            }
            _ => i += 1,
        }
    }
    None
}
