//! Single-pass graph extraction over one compilation unit.
//!
//! Traversal is pre-order and depth-first: files → declarations → bodies →
//! expressions. Declaration visits are memoized by id, so revisits through
//! supertype edges, override resolution, or repeated reference sites are
//! cache hits returning the prior VName.
//!
//! One [`GraphIndexer`] instance owns one unit's run from start to
//! completion-or-abort; caches and the scope stack are discarded with it.
//! Any failure aborts the unit immediately and facts already written must
//! be treated as partial by the caller.

use std::collections::HashMap;

use kotgraph_core::{EdgeKind, FactSink, IndexError, Result, Span, VName};
use tracing::{debug, trace};

use crate::entries::{EntrySets, TypeReferenceVNames};
use crate::ir::{
    DeclId, DeclKind, ExprId, ExprKind, FieldDecl, FileId, FunctionDecl, Origin, PropertyDecl,
    Type, Unit, VariableDecl, ValueParameterDecl,
};
use crate::sources::{Sources, TextSources};
use crate::tags::decl_node_kind;

/// Resolved identity of the file currently anchoring emission, threaded
/// explicitly through every visit instead of ambient state.
#[derive(Debug, Clone)]
struct FileCtx {
    vname: VName,
    content_len: u32,
}

/// Index `unit`, streaming facts into `sink`, with file VNames rooted at
/// `corpus`/`root`.
pub fn index_unit(unit: &Unit, corpus: &str, root: &str, sink: &mut dyn FactSink) -> Result<()> {
    let sources = TextSources::new(unit, corpus, root);
    GraphIndexer::new(unit, sources, sink).index()
}

/// One unit's extraction pass.
pub struct GraphIndexer<'u, 's, S: Sources> {
    unit: &'u Unit,
    sources: S,
    entries: EntrySets<'u, 's>,
    /// Declaration memo: at most one NODE fact per declaration.
    visited: HashMap<DeclId, VName>,
    /// Resolved-type memo, keyed structurally.
    visited_types: HashMap<Type, TypeReferenceVNames>,
    file_ctxs: HashMap<FileId, FileCtx>,
}

impl<'u, 's, S: Sources> GraphIndexer<'u, 's, S> {
    pub fn new(unit: &'u Unit, sources: S, sink: &'s mut dyn FactSink) -> Self {
        GraphIndexer {
            unit,
            sources,
            entries: EntrySets::new(unit, sink),
            visited: HashMap::new(),
            visited_types: HashMap::new(),
            file_ctxs: HashMap::new(),
        }
    }

    /// Traverse the whole unit once, in file order.
    pub fn index(mut self) -> Result<()> {
        let unit = self.unit;
        debug!(files = unit.files().count(), "indexing compilation unit");
        for (file, _) in unit.files() {
            self.visit_file(file)?;
        }
        debug_assert_eq!(self.entries.scope_depth(), 0, "unbalanced scope stack");
        Ok(())
    }

    // ========================================================================
    // Files and declarations
    // ========================================================================

    fn visit_file(&mut self, file: FileId) -> Result<()> {
        let unit = self.unit;
        let ctx = self.file_ctx(file);
        debug!(path = %unit.file(file).path, "indexing file");
        let content = self.sources.file_content(file);
        let encoding = self.sources.file_encoding();
        self.entries.file_node(&ctx.vname, content, encoding);

        for &decl in &unit.file(file).declarations {
            if let Some(vname) = self.visit_decl(decl)? {
                self.entries
                    .emit_edge(&vname, EdgeKind::ChildOf, &ctx.vname, None);
            }
        }
        Ok(())
    }

    /// Dispatch on declaration shape. Recognized-but-unsupported shapes are
    /// fatal here, before any fact for them is emitted.
    fn visit_decl(&mut self, id: DeclId) -> Result<Option<VName>> {
        match &self.unit.decl(id).kind {
            DeclKind::Class(_) => self.visit_class(id).map(Some),
            DeclKind::EnumEntry => self.visit_enum_entry(id).map(Some),
            DeclKind::Function(_) | DeclKind::Constructor(_) => self.visit_function(id),
            DeclKind::Property(_) => self.visit_property(id).map(Some),
            DeclKind::Field(_) => self.visit_field(id).map(Some),
            DeclKind::Variable(_) => self.visit_variable(id).map(Some),
            DeclKind::ValueParameter(_) => self.visit_value_parameter(id).map(Some),
            DeclKind::TypeParameter(_) => self.visit_type_parameter(id).map(Some),
            DeclKind::TypeAlias => Err(IndexError::unsupported("type aliases")),
            DeclKind::LocalDelegatedProperty => {
                Err(IndexError::unsupported("local delegated properties"))
            }
        }
    }

    fn visit_class(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let (members, supertypes) = match &self.unit.decl(id).kind {
            DeclKind::Class(class) => (class.members.clone(), class.supertypes.clone()),
            other => {
                return Err(IndexError::malformed(format!(
                    "class expected, found {other:?}"
                )))
            }
        };

        let vname = self.scoped(id, |this| {
            this.process_declaration(id, |this, class_vname| {
                for &member in &members {
                    if let Some(member_vname) = this.visit_decl(member)? {
                        this.entries
                            .emit_edge(&member_vname, EdgeKind::ChildOf, class_vname, None);
                    }
                }
                // Direct supertypes, after all members. Diamond shapes are
                // safe: resolution is cache-backed.
                for supertype in &supertypes {
                    let super_vname = this.visit_supertype_class(supertype)?;
                    this.entries
                        .emit_edge(class_vname, EdgeKind::Extends, &super_vname, None);
                }
                Ok(())
            })
        })?;

        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    /// A supertype's classifier must be a class; type parameters and broken
    /// types cannot be extended.
    fn visit_supertype_class(&mut self, supertype: &Type) -> Result<VName> {
        let classifier = match supertype {
            Type::Simple { classifier, .. } => *classifier,
            Type::Error => return Err(IndexError::unsupported("error types")),
            Type::Dynamic => return Err(IndexError::unsupported("dynamic types")),
        };
        match &self.unit.decl(classifier).kind {
            DeclKind::Class(_) => self.visit_class(classifier),
            other => Err(IndexError::unresolved(format!(
                "supertype classifier is not a class: {other:?}"
            ))),
        }
    }

    fn visit_function(&mut self, id: DeclId) -> Result<Option<VName>> {
        // Members inherited without redeclaration produce no facts of their
        // own; override edges point at the original declarations.
        if self.unit.decl(id).origin == Origin::FakeOverride {
            return Ok(None);
        }
        if let Some(vname) = self.visited.get(&id) {
            return Ok(Some(vname.clone()));
        }
        let function = match &self.unit.decl(id).kind {
            DeclKind::Function(f) | DeclKind::Constructor(f) => f.clone(),
            other => {
                return Err(IndexError::malformed(format!(
                    "function expected, found {other:?}"
                )))
            }
        };

        let vname = self.scoped(id, |this| {
            let vname = this.process_declaration(id, |this, _| {
                let file = this.unit.containing_file(id);
                for &statement in &function.body {
                    this.visit_expr(statement, file)?;
                }
                Ok(())
            })?;
            this.process_functional_type(id, &function, &vname)?;
            Ok(vname)
        })?;

        for &overridden in &function.overrides {
            let overridden_vname = self.entries.vname(overridden)?;
            self.entries
                .emit_edge(&vname, EdgeKind::Overrides, &overridden_vname, None);
        }

        self.visited.insert(id, vname.clone());
        Ok(Some(vname))
    }

    fn visit_property(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let property: PropertyDecl = match &self.unit.decl(id).kind {
            DeclKind::Property(p) => p.clone(),
            other => {
                return Err(IndexError::malformed(format!(
                    "property expected, found {other:?}"
                )))
            }
        };

        let vname = self.process_simple_typed(id, property.value_type.clone(), |this, prop_vname| {
            let children = [property.backing_field, property.getter, property.setter];
            for child in children.into_iter().flatten() {
                if let Some(child_vname) = this.visit_decl(child)? {
                    this.entries
                        .emit_edge(&child_vname, EdgeKind::ChildOf, prop_vname, None);
                }
            }
            Ok(())
        })?;

        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    fn visit_field(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let field: FieldDecl = match &self.unit.decl(id).kind {
            DeclKind::Field(f) => f.clone(),
            other => {
                return Err(IndexError::malformed(format!(
                    "field expected, found {other:?}"
                )))
            }
        };

        let vname = self.process_simple_typed(id, field.field_type.clone(), |this, _| {
            if let Some(initializer) = field.initializer {
                let file = this.unit.containing_file(id);
                this.visit_expr(initializer, file)?;
            }
            Ok(())
        })?;

        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    fn visit_variable(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let variable: VariableDecl = match &self.unit.decl(id).kind {
            DeclKind::Variable(v) => v.clone(),
            other => {
                return Err(IndexError::malformed(format!(
                    "variable expected, found {other:?}"
                )))
            }
        };

        let vname = self.process_simple_typed(id, variable.var_type.clone(), |this, _| {
            if let Some(initializer) = variable.initializer {
                let file = this.unit.containing_file(id);
                this.visit_expr(initializer, file)?;
            }
            Ok(())
        })?;

        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    fn visit_value_parameter(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let parameter: ValueParameterDecl = match &self.unit.decl(id).kind {
            DeclKind::ValueParameter(p) => p.clone(),
            other => {
                return Err(IndexError::malformed(format!(
                    "value parameter expected, found {other:?}"
                )))
            }
        };

        let vname = self.process_simple_typed(id, parameter.param_type.clone(), |this, _| {
            if let Some(default_value) = parameter.default_value {
                let file = this.unit.containing_file(id);
                this.visit_expr(default_value, file)?;
            }
            Ok(())
        })?;

        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    fn visit_type_parameter(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let bounds = match &self.unit.decl(id).kind {
            DeclKind::TypeParameter(tp) => tp.bounds.clone(),
            other => {
                return Err(IndexError::malformed(format!(
                    "type parameter expected, found {other:?}"
                )))
            }
        };

        let vname = self.process_declaration(id, |_, _| Ok(()))?;

        let mut bound_vnames = Vec::with_capacity(bounds.len());
        for bound in &bounds {
            bound_vnames.push(self.resolve_type(bound)?.whole);
        }
        if !bound_vnames.is_empty() {
            self.entries
                .emit_ordinal_edges(&vname, EdgeKind::BoundedUpper, &bound_vnames, 0);
        }

        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    fn visit_enum_entry(&mut self, id: DeclId) -> Result<VName> {
        if let Some(vname) = self.visited.get(&id) {
            return Ok(vname.clone());
        }
        let vname = self.process_declaration(id, |_, _| Ok(()))?;
        self.visited.insert(id, vname.clone());
        Ok(vname)
    }

    // ========================================================================
    // Shared declaration processing
    // ========================================================================

    /// Generic logic of visiting a declaration: builds and emits the node,
    /// the wrapping abstraction when type parameters exist, and — for
    /// declarations with real source — the whole-element DEFINES anchor and
    /// the identifier-only DEFINES/BINDING anchor, then recurses into
    /// `children`. Synthetic declarations skip anchors and children.
    fn process_declaration<F>(&mut self, id: DeclId, children: F) -> Result<VName>
    where
        F: FnOnce(&mut Self, &VName) -> Result<()>,
    {
        let unit = self.unit;
        let vname = self.entries.vname(id)?;
        trace!(signature = %vname.signature, "declaration");

        let abs = if unit.decl(id).type_params().is_empty() {
            None
        } else {
            let type_params = unit.decl(id).type_params().to_vec();
            let mut type_param_vnames = Vec::with_capacity(type_params.len());
            for tp in type_params {
                type_param_vnames.push(self.visit_type_parameter(tp)?);
            }
            let abs = self.entries.abs_node(&vname, &type_param_vnames);
            self.entries
                .emit_edge(&vname, EdgeKind::ChildOf, &abs, None);
            Some(abs)
        };

        let kind = decl_node_kind(unit, id)?;
        self.entries.emit_node(&vname, kind, None);

        if unit.decl(id).has_source() {
            let file = unit.containing_file(id);
            let ctx = self.file_ctx(file);

            let whole_span = self.sources.span_for_whole_element(id)?;
            let whole_anchor = self.entries.anchor(&ctx.vname, whole_span, ctx.content_len)?;
            self.entries
                .emit_edge(&whole_anchor, EdgeKind::Defines, &vname, None);

            let ident_span = self.sources.span_for_identifier_only(id)?;
            let ident_anchor = self.entries.anchor(&ctx.vname, ident_span, ctx.content_len)?;
            let binding_target = abs.as_ref().unwrap_or(&vname);
            self.entries
                .emit_edge(&ident_anchor, EdgeKind::DefinesBinding, binding_target, None);

            children(self, &vname)?;
        }

        Ok(vname)
    }

    /// [`process_declaration`](Self::process_declaration) plus the TYPED
    /// edge to the declared type and, when an explicit annotation exists in
    /// source, a REF edge from an anchor over it.
    fn process_simple_typed<F>(&mut self, id: DeclId, ty: Type, children: F) -> Result<VName>
    where
        F: FnOnce(&mut Self, &VName) -> Result<()>,
    {
        self.process_declaration(id, |this, vname| {
            let reference = this.resolve_type(&ty)?;
            this.entries
                .emit_edge(vname, EdgeKind::Typed, &reference.whole, None);
            this.emit_type_annotation_ref(id, &reference.referencing)?;
            children(this, vname)
        })
    }

    /// Parameter, return-type, and function-type facts of a function-like
    /// declaration: ordinal PARAM edges (receiver first when present), the
    /// cached function-type node, and its TYPED edge.
    fn process_functional_type(
        &mut self,
        id: DeclId,
        function: &FunctionDecl,
        function_vname: &VName,
    ) -> Result<()> {
        let return_reference = self.resolve_type(&function.return_type)?;
        self.emit_type_annotation_ref(id, &return_reference.referencing)?;

        let parameter_ids: Vec<DeclId> = function
            .receiver
            .iter()
            .chain(&function.params)
            .copied()
            .collect();
        let mut parameter_vnames = Vec::with_capacity(parameter_ids.len());
        let mut parameter_type_vnames = Vec::with_capacity(parameter_ids.len());
        for parameter in parameter_ids {
            parameter_vnames.push(self.visit_value_parameter(parameter)?);
            let param_type = match &self.unit.decl(parameter).kind {
                DeclKind::ValueParameter(p) => p.param_type.clone(),
                other => {
                    return Err(IndexError::malformed(format!(
                        "value parameter expected, found {other:?}"
                    )))
                }
            };
            parameter_type_vnames.push(self.resolve_type(&param_type)?.whole);
        }

        for parameter_vname in &parameter_vnames {
            self.entries
                .emit_edge(parameter_vname, EdgeKind::ChildOf, function_vname, None);
        }
        self.entries
            .emit_ordinal_edges(function_vname, EdgeKind::Param, &parameter_vnames, 0);

        let function_type = self
            .entries
            .function_type(&return_reference.whole, &parameter_type_vnames);
        self.entries
            .emit_edge(function_vname, EdgeKind::Typed, &function_type, None);
        Ok(())
    }

    /// REF edge from an explicit type-annotation anchor, when one exists.
    fn emit_type_annotation_ref(&mut self, id: DeclId, referencing: &VName) -> Result<()> {
        let span = match self.sources.span_for_return_type(id) {
            Some(span) => span,
            None => return Ok(()),
        };
        let file = self.unit.containing_file(id);
        let ctx = self.file_ctx(file);
        let anchor = self.entries.anchor(&ctx.vname, span, ctx.content_len)?;
        self.entries
            .emit_edge(&anchor, EdgeKind::Ref, referencing, None);
        Ok(())
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Memoized type resolution; structurally equal types resolve once.
    fn resolve_type(&mut self, ty: &Type) -> Result<TypeReferenceVNames> {
        if let Some(cached) = self.visited_types.get(ty) {
            return Ok(cached.clone());
        }
        let reference = self.entries.type_reference(ty)?;
        self.visited_types.insert(ty.clone(), reference.clone());
        Ok(reference)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Pre-order walk of one expression tree. Only declaration references,
    /// non-synthetic call targets, and explicit cast operators produce REF
    /// edges; literals, implicit operators, and instance-initializer calls
    /// produce nothing.
    fn visit_expr(&mut self, id: ExprId, file: FileId) -> Result<Option<VName>> {
        let unit = self.unit;
        let expr = unit.expr(id);
        match &expr.kind {
            ExprKind::DeclarationRef { target } => {
                let vname = self.entries.vname(*target)?;
                self.emit_usage(expr.span, file, &vname)?;
                Ok(Some(vname))
            }
            ExprKind::Call { callee, arguments } => {
                let vname = self.entries.vname(*callee)?;
                if unit.decl(*callee).has_source() {
                    self.emit_usage(expr.span, file, &vname)?;
                }
                for &argument in arguments {
                    self.visit_expr(argument, file)?;
                }
                Ok(Some(vname))
            }
            ExprKind::TypeOperator {
                operator,
                operand_classifier,
                argument,
            } => {
                if !operator.is_implicit() {
                    let vname = self.entries.vname(*operand_classifier)?;
                    self.emit_usage(expr.span, file, &vname)?;
                }
                self.visit_expr(*argument, file)?;
                Ok(None)
            }
            ExprKind::Return { value } => self.visit_expr(*value, file),
            ExprKind::Const | ExprKind::InstanceInitializerCall => Ok(None),
            ExprKind::CallableReference => {
                Err(IndexError::unsupported("callable references"))
            }
        }
    }

    /// REF edge from an anchor over the referencing syntax.
    fn emit_usage(&mut self, span: Option<Span>, file: FileId, target: &VName) -> Result<()> {
        let span =
            span.ok_or_else(|| IndexError::malformed("reference expression has no source span"))?;
        let ctx = self.file_ctx(file);
        let anchor = self.entries.anchor(&ctx.vname, span, ctx.content_len)?;
        self.entries.emit_edge(&anchor, EdgeKind::Ref, target, None);
        Ok(())
    }

    // ========================================================================
    // Context
    // ========================================================================

    fn file_ctx(&mut self, file: FileId) -> FileCtx {
        if let Some(ctx) = self.file_ctxs.get(&file) {
            return ctx.clone();
        }
        let ctx = FileCtx {
            vname: self.sources.file_vname(file),
            content_len: self.sources.file_content(file).len() as u32,
        };
        self.file_ctxs.insert(file, ctx.clone());
        ctx
    }

    /// Bracket `f` with the generic-parameter scope of `container`. The
    /// scope is left on every exit path, including failures, so the stack
    /// stays balanced across an aborted traversal.
    fn scoped<R>(
        &mut self,
        container: DeclId,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.entries.enter_scope(container);
        let result = f(self);
        self.entries.leave_scope();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ClassDecl, ClassKind, Origin, Parent, UnitBuilder};
    use kotgraph_core::MemorySink;

    #[test]
    fn scope_stack_unwinds_when_a_class_visit_fails() {
        let text = "class C { typealias T = Int }";
        let mut b = UnitBuilder::new();
        let file = b.file("a.kt", "test", text);
        let class = b.decl(
            "C",
            Parent::File(file),
            Origin::Real,
            Some(Span::new(0, text.len() as u32)),
            DeclKind::Class(ClassDecl {
                class_kind: ClassKind::Class,
                is_inner: false,
                is_companion: false,
                type_params: Vec::new(),
                supertypes: Vec::new(),
                members: Vec::new(),
            }),
        );
        b.decl(
            "T",
            Parent::Decl(class),
            Origin::Real,
            Some(Span::new(10, 27)),
            DeclKind::TypeAlias,
        );
        let unit = b.finish();

        let mut sink = MemorySink::new();
        let sources = TextSources::new(&unit, "", "");
        let mut indexer = GraphIndexer::new(&unit, sources, &mut sink);

        assert!(indexer.visit_decl(class).is_err());
        assert_eq!(indexer.entries.scope_depth(), 0);
    }
}
