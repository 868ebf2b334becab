//! Fact construction and the entry/fact caches.
//!
//! [`EntrySets`] owns the sink, the signature engine, and every memo table,
//! and is the only path through which facts leave the indexer. Dedup sets
//! keyed on VName identity guarantee that no NODE or EDGE fact is emitted
//! twice within one unit traversal, regardless of how often recursion
//! revisits an entity (diamond inheritance, mutually recursive generics,
//! repeated reference sites).
//!
//! Cache lifetime equals exactly one compilation-unit traversal; entries are
//! never evicted mid-run.

use std::collections::{HashMap, HashSet};

use kotgraph_core::{
    EdgeKind, Entry, FactSink, IndexError, NodeKind, NodePayload, Result, Span, VName,
};

use crate::ir::{DeclId, Type, TypeArg, Unit};
use crate::signatures::SignatureEngine;
use crate::tags::type_node_kind;
use crate::LANGUAGE;

/// The two VNames a resolved type reference exposes.
///
/// `whole` identifies the type with arguments applied (`List<String>`);
/// `referencing` identifies what a usage site points at — the shared
/// abstraction for generic types, the type itself otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReferenceVNames {
    pub whole: VName,
    pub referencing: VName,
}

/// Fact factory with at-most-once emission per identity.
pub struct EntrySets<'u, 's> {
    unit: &'u Unit,
    signatures: SignatureEngine<'u>,
    sink: &'s mut dyn FactSink,
    emitted_nodes: HashSet<VName>,
    emitted_edges: HashSet<(VName, EdgeKind, VName, Option<u32>)>,
    /// One abstraction node per unresolved generic declaration, keyed by the
    /// declaration's VName and shared across every instantiation.
    abs_nodes: HashMap<VName, VName>,
    /// One instantiation node per (abstraction, ordered arguments) tuple.
    tapply_nodes: HashMap<(VName, Vec<VName>), VName>,
    /// One function-type node per (return type, ordered parameter types).
    function_types: HashMap<(VName, Vec<VName>), VName>,
}

impl<'u, 's> EntrySets<'u, 's> {
    pub fn new(unit: &'u Unit, sink: &'s mut dyn FactSink) -> Self {
        EntrySets {
            unit,
            signatures: SignatureEngine::new(unit),
            sink,
            emitted_nodes: HashSet::new(),
            emitted_edges: HashSet::new(),
            abs_nodes: HashMap::new(),
            tapply_nodes: HashMap::new(),
            function_types: HashMap::new(),
        }
    }

    pub fn enter_scope(&mut self, container: DeclId) {
        self.signatures.enter_scope(container);
    }

    pub fn leave_scope(&mut self) {
        self.signatures.leave_scope();
    }

    /// Current generic-scope depth; zero once a traversal has unwound.
    pub fn scope_depth(&self) -> usize {
        self.signatures.depth()
    }

    /// VName of a declaration, derived from its structural signature.
    pub fn vname(&self, decl: DeclId) -> Result<VName> {
        Ok(VName::semantic(
            self.signatures.full_signature(decl)?,
            LANGUAGE,
        ))
    }

    /// Emit a NODE fact unless one was already emitted for this VName.
    pub fn emit_node(&mut self, vname: &VName, kind: NodeKind, payload: Option<NodePayload>) {
        if self.emitted_nodes.insert(vname.clone()) {
            self.sink.emit(Entry::Node {
                vname: vname.clone(),
                kind,
                payload,
            });
        }
    }

    /// Emit an EDGE fact unless one was already emitted for this identity.
    pub fn emit_edge(
        &mut self,
        source: &VName,
        kind: EdgeKind,
        target: &VName,
        ordinal: Option<u32>,
    ) {
        let identity = (source.clone(), kind, target.clone(), ordinal);
        if self.emitted_edges.insert(identity) {
            self.sink.emit(Entry::Edge {
                source: source.clone(),
                kind,
                target: target.clone(),
                ordinal,
            });
        }
    }

    /// Emit one ordinal edge per target, numbering from `start`.
    pub fn emit_ordinal_edges(
        &mut self,
        source: &VName,
        kind: EdgeKind,
        targets: &[VName],
        start: u32,
    ) {
        for (i, target) in targets.iter().enumerate() {
            self.emit_edge(source, kind, target, Some(start + i as u32));
        }
    }

    /// Emit the FILE node carrying full byte content and encoding.
    pub fn file_node(&mut self, vname: &VName, content: Vec<u8>, encoding: &str) {
        self.emit_node(
            vname,
            NodeKind::File,
            Some(NodePayload::FileText {
                content,
                encoding: encoding.to_string(),
            }),
        );
    }

    /// Emit an anchor node over `span` in the file named by `file_vname`.
    ///
    /// Anchor spans must be non-empty and lie within the file's byte
    /// content; violations signal a front-end defect.
    pub fn anchor(&mut self, file_vname: &VName, span: Span, file_len: u32) -> Result<VName> {
        if span.is_empty() {
            return Err(IndexError::malformed(format!(
                "empty anchor span {span} in {}",
                file_vname.path
            )));
        }
        if span.end > file_len {
            return Err(IndexError::malformed(format!(
                "anchor span {span} exceeds {}-byte content of {}",
                file_len, file_vname.path
            )));
        }
        let vname = VName::anchor(file_vname, span, LANGUAGE);
        self.emit_node(&vname, NodeKind::Anchor, Some(NodePayload::Location { span }));
        Ok(vname)
    }

    /// The abstraction node wrapping a generic declaration, built at most
    /// once per declaration and shared across every instantiation.
    pub fn abs_node(&mut self, decl_vname: &VName, type_params: &[VName]) -> VName {
        if let Some(existing) = self.abs_nodes.get(decl_vname) {
            return existing.clone();
        }
        let vname = VName::semantic(format!("abs:{}", decl_vname.signature), LANGUAGE);
        self.emit_node(&vname, NodeKind::Abs, None);
        self.emit_ordinal_edges(&vname, EdgeKind::Param, type_params, 0);
        self.abs_nodes.insert(decl_vname.clone(), vname.clone());
        vname
    }

    /// The instantiation node for `abs` applied to `args`, built at most
    /// once per distinct argument tuple.
    pub fn tapply(&mut self, abs: &VName, args: &[VName]) -> VName {
        let key = (abs.clone(), args.to_vec());
        if let Some(existing) = self.tapply_nodes.get(&key) {
            return existing.clone();
        }
        let arg_signatures: Vec<&str> = args.iter().map(|v| v.signature.as_str()).collect();
        let vname = VName::semantic(
            format!("tapp:{}<{}>", abs.signature, arg_signatures.join(",")),
            LANGUAGE,
        );
        self.emit_node(&vname, NodeKind::TApply, None);
        self.emit_edge(&vname, EdgeKind::Param, abs, Some(0));
        self.emit_ordinal_edges(&vname, EdgeKind::Param, &key.1, 1);
        self.tapply_nodes.insert(key, vname.clone());
        vname
    }

    /// The function-type node for `(params) -> ret`, built at most once per
    /// distinct tuple.
    pub fn function_type(&mut self, ret: &VName, params: &[VName]) -> VName {
        let key = (ret.clone(), params.to_vec());
        if let Some(existing) = self.function_types.get(&key) {
            return existing.clone();
        }
        let param_signatures: Vec<&str> = params.iter().map(|v| v.signature.as_str()).collect();
        let vname = VName::semantic(
            format!("fntype:({});{}", param_signatures.join(","), ret.signature),
            LANGUAGE,
        );
        self.emit_node(&vname, NodeKind::FunctionType, None);
        self.function_types.insert(key, vname.clone());
        vname
    }

    /// Resolve a type reference into its (whole, referencing) VName pair,
    /// emitting any nodes the resolution creates.
    ///
    /// Generic instantiations share one abstraction node per unresolved
    /// declaration: `List<String>` and `List<Int>` get distinct whole-type
    /// VNames but one REF target. Error and dynamic types, and star
    /// projections in argument position, are fatal.
    pub fn type_reference(&mut self, ty: &Type) -> Result<TypeReferenceVNames> {
        match ty {
            Type::Simple {
                classifier,
                arguments,
                ..
            } => {
                if arguments.is_empty() {
                    let vname = VName::semantic(
                        self.signatures.full_signature_of_type(ty, None)?,
                        LANGUAGE,
                    );
                    let kind = type_node_kind(self.unit, ty)?;
                    self.emit_node(&vname, kind, None);
                    Ok(TypeReferenceVNames {
                        whole: vname.clone(),
                        referencing: vname,
                    })
                } else {
                    self.generic_type_reference(*classifier, arguments)
                }
            }
            Type::Error => Err(IndexError::unsupported("error types")),
            Type::Dynamic => Err(IndexError::unsupported("dynamic types")),
        }
    }

    fn generic_type_reference(
        &mut self,
        classifier: DeclId,
        arguments: &[TypeArg],
    ) -> Result<TypeReferenceVNames> {
        // `Foo<String, Int>` resolves against the unsubstituted `Foo<T, Q>`.
        let unsubstituted = self.vname(classifier)?;
        let type_param_vnames = self
            .unit
            .decl(classifier)
            .type_params()
            .iter()
            .map(|&tp| self.vname(tp))
            .collect::<Result<Vec<_>>>()?;
        let abs = self.abs_node(&unsubstituted, &type_param_vnames);

        let mut argument_vnames = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                TypeArg::Star => {
                    return Err(IndexError::unsupported("star projections"));
                }
                TypeArg::Projection { ty, .. } => {
                    argument_vnames.push(self.type_reference(ty)?.referencing);
                }
            }
        }
        let whole = self.tapply(&abs, &argument_vnames);

        Ok(TypeReferenceVNames {
            whole,
            referencing: abs,
        })
    }
}
