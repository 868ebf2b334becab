//! Shared fixture helpers for indexer integration tests.
//!
//! Units are built the way a front end would hand them over: real
//! declarations carry spans into the file text, builtins are synthetic and
//! unlisted, types are fully resolved.
#![allow(dead_code)]

use std::collections::HashMap;

use kotgraph_core::{EdgeKind, Entry, MemorySink, NodePayload, Span, VName};
use kotgraph_kotlin::ir::{
    AccessorRole, ClassDecl, ClassKind, DeclId, DeclKind, FileId, FunctionDecl, Origin, Parent,
    PropertyDecl, Type, TypeParameterDecl, UnitBuilder, ValueParameterDecl, Variance,
};

/// Span of the `n`th occurrence of `needle` in `text` (0-based).
pub fn span_of_nth(text: &str, needle: &str, n: usize) -> Span {
    let mut from = 0;
    for _ in 0..n {
        from = text[from..].find(needle).expect("needle occurrence") + from + needle.len();
    }
    let start = text[from..].find(needle).expect("needle occurrence") + from;
    Span::new(start as u32, (start + needle.len()) as u32)
}

/// Span of the first occurrence of `needle` in `text`.
pub fn span_of(text: &str, needle: &str) -> Span {
    span_of_nth(text, needle, 0)
}

pub fn class_kind(kind: ClassKind, is_inner: bool, is_companion: bool) -> DeclKind {
    DeclKind::Class(ClassDecl {
        class_kind: kind,
        is_inner,
        is_companion,
        type_params: Vec::new(),
        supertypes: Vec::new(),
        members: Vec::new(),
    })
}

/// Synthetic builtin class, reachable only through type references.
pub fn builtin_class(b: &mut UnitBuilder, file: FileId, name: &str) -> DeclId {
    b.unlisted_decl(
        name,
        Parent::File(file),
        Origin::Synthetic,
        None,
        class_kind(ClassKind::Class, false, false),
    )
}

pub fn real_class(b: &mut UnitBuilder, file: FileId, name: &str, span: Span) -> DeclId {
    b.decl(
        name,
        Parent::File(file),
        Origin::Real,
        Some(span),
        class_kind(ClassKind::Class, false, false),
    )
}

pub fn function_decl(return_type: Type) -> DeclKind {
    DeclKind::Function(FunctionDecl {
        type_params: Vec::new(),
        receiver: None,
        params: Vec::new(),
        return_type,
        body: Vec::new(),
        overrides: Vec::new(),
        accessor_role: None,
    })
}

pub fn function(
    b: &mut UnitBuilder,
    parent: Parent,
    name: &str,
    span: Span,
    return_type: Type,
) -> DeclId {
    b.decl(name, parent, Origin::Real, Some(span), function_decl(return_type))
}

/// Declared value parameter (index >= 0) or receiver parameter (index < 0),
/// registered with its owning function.
pub fn param(
    b: &mut UnitBuilder,
    func: DeclId,
    name: &str,
    ty: Type,
    index: i32,
    span: Span,
) -> DeclId {
    let id = b.decl(
        name,
        Parent::Decl(func),
        Origin::Real,
        Some(span),
        DeclKind::ValueParameter(ValueParameterDecl {
            param_type: ty,
            index,
            default_value: None,
        }),
    );
    if index < 0 {
        b.function_mut(func).receiver = Some(id);
    } else {
        b.function_mut(func).params.push(id);
    }
    id
}

/// Invariant type parameter, registered with its owning class.
pub fn class_type_param(
    b: &mut UnitBuilder,
    class: DeclId,
    name: &str,
    span: Option<Span>,
    bounds: Vec<Type>,
) -> DeclId {
    let origin = if span.is_some() {
        Origin::Real
    } else {
        Origin::Synthetic
    };
    let id = b.decl(
        name,
        Parent::Decl(class),
        origin,
        span,
        DeclKind::TypeParameter(TypeParameterDecl {
            variance: Variance::Invariant,
            bounds,
        }),
    );
    b.class_mut(class).type_params.push(id);
    id
}

pub fn property(
    b: &mut UnitBuilder,
    parent: Parent,
    name: &str,
    span: Span,
    value_type: Type,
) -> DeclId {
    b.decl(
        name,
        parent,
        Origin::Real,
        Some(span),
        DeclKind::Property(PropertyDecl {
            value_type,
            getter: None,
            setter: None,
            backing_field: None,
        }),
    )
}

/// Accessor function attached under `prop`, not listed as a class member.
pub fn accessor(
    b: &mut UnitBuilder,
    class: DeclId,
    prop: DeclId,
    role: AccessorRole,
    name: &str,
    span: Span,
    return_type: Type,
) -> DeclId {
    let id = b.unlisted_decl(
        name,
        Parent::Decl(class),
        Origin::Real,
        Some(span),
        function_decl(return_type),
    );
    b.function_mut(id).accessor_role = Some(role);
    b.set_owning_property(id, prop);
    match role {
        AccessorRole::Getter => b.property_mut(prop).getter = Some(id),
        AccessorRole::Setter => b.property_mut(prop).setter = Some(id),
    }
    id
}

/// Map every emitted anchor VName to its byte span.
pub fn anchor_spans(sink: &MemorySink) -> HashMap<VName, Span> {
    sink.entries()
        .iter()
        .filter_map(|entry| match entry {
            Entry::Node {
                vname,
                payload: Some(NodePayload::Location { span }),
                ..
            } => Some((vname.clone(), *span)),
            _ => None,
        })
        .collect()
}

/// Edges of `kind` rendered as (source-anchor span, target), for REF-style
/// assertions keyed on where the usage sits in source.
pub fn edges_by_anchor_span(sink: &MemorySink, kind: EdgeKind) -> Vec<(Span, VName)> {
    let spans = anchor_spans(sink);
    sink.edges_of_kind(kind)
        .into_iter()
        .filter_map(|(source, target, _)| spans.get(source).map(|s| (*s, target.clone())))
        .collect()
}

/// Count NODE facts for a given VName.
pub fn node_count(sink: &MemorySink, vname: &VName) -> usize {
    sink.entries()
        .iter()
        .filter(|entry| entry.node_vname() == Some(vname))
        .count()
}

pub fn semantic(signature: &str) -> VName {
    VName::semantic(signature, "kotlin")
}
