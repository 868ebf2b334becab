//! Deterministic structural signatures for declarations and types.
//!
//! A signature is derived purely from a declaration's position in the tree,
//! so it is stable across repeated runs over identical input and distinct
//! for distinct declarations in one unit. The general shape is
//!
//! ```text
//! TAG:package.Ancestor.name(param-types)<type-params>;value-type
//! ```
//!
//! with one path fragment per ancestor, joined by a separator chosen by the
//! child's kind: `.` by default, `$` entering an inner class, `#` before a
//! value parameter or backing field, `~` before a type parameter.
//!
//! Rendering a function fragment includes its parameter types; a parameter
//! type naming one of that same function's type parameters is rendered as
//! the bare parameter name — the full path would recurse through the
//! function's own not-yet-complete signature.

use kotgraph_core::{IndexError, Result};

use crate::ir::{DeclId, DeclKind, Type, TypeArg, Unit, Variance};
use crate::tags::{decl_tag, type_tag};

/// Signature generator for one compilation unit.
///
/// Holds the scope stack of currently-open generic containers. The stack is
/// only mutated through [`enter_scope`](Self::enter_scope) /
/// [`leave_scope`](Self::leave_scope); the indexer brackets descent into any
/// generic container with [`GraphIndexer::scoped`](crate::indexer::GraphIndexer)
/// so the pair holds on every exit path, including failures.
#[derive(Debug)]
pub struct SignatureEngine<'u> {
    unit: &'u Unit,
    scopes: Vec<DeclId>,
}

impl<'u> SignatureEngine<'u> {
    pub fn new(unit: &'u Unit) -> Self {
        SignatureEngine {
            unit,
            scopes: Vec::new(),
        }
    }

    /// Open the generic-parameter scope of `container`.
    pub fn enter_scope(&mut self, container: DeclId) {
        self.scopes.push(container);
    }

    /// Close the innermost scope.
    pub fn leave_scope(&mut self) {
        let popped = self.scopes.pop();
        debug_assert!(popped.is_some(), "scope stack underflow");
    }

    /// Current scope depth. The stack must be empty once a unit's traversal
    /// completes or aborts.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Nearest enclosing open container that binds `type_param`.
    fn scoped_container_of(&self, type_param: DeclId) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .copied()
            .find(|&container| self.unit.decl(container).type_params().contains(&type_param))
    }

    /// Full signature of a declaration: tag, structural path, and — when the
    /// declaration carries a value type — a `;`-separated type signature.
    pub fn full_signature(&self, id: DeclId) -> Result<String> {
        let mut out = String::from(decl_tag(self.unit, id)?.id());
        out.push(':');
        self.element_signature(id, None, &mut out)?;
        if let Some(value_type) = self.value_type(id) {
            let immediate = self.unit.decl(id).is_type_params_container().then_some(id);
            out.push(';');
            self.type_signature(&value_type, immediate, &mut out)?;
        }
        Ok(out)
    }

    /// Full signature of a type reference: tag plus type signature.
    pub fn full_signature_of_type(&self, ty: &Type, immediate: Option<DeclId>) -> Result<String> {
        let mut out = String::from(type_tag(self.unit, ty)?.id());
        out.push(':');
        self.type_signature(ty, immediate, &mut out)?;
        Ok(out)
    }

    /// The declared value type rendered after the path, if the kind has one.
    fn value_type(&self, id: DeclId) -> Option<Type> {
        match &self.unit.decl(id).kind {
            DeclKind::Function(f) | DeclKind::Constructor(f) => Some(f.return_type.clone()),
            DeclKind::Property(p) => Some(p.value_type.clone()),
            DeclKind::ValueParameter(p) => Some(p.param_type.clone()),
            _ => None,
        }
    }

    /// Path signature of `id`: one fragment per ancestor from the root down,
    /// then the element itself. `type_args`, when given, substitute for the
    /// element's formal type parameters (instantiated generic types).
    fn element_signature(
        &self,
        id: DeclId,
        type_args: Option<&[TypeArg]>,
        out: &mut String,
    ) -> Result<()> {
        let mut path = String::new();
        let (file, chain) = self.unit.ancestors(id);
        path.push_str(&self.unit.file(file).package_fq_name);
        for &ancestor in &chain {
            self.write_separator(ancestor, &mut path);
            self.write_fragment(ancestor, None, &mut path)?;
        }
        self.write_separator(id, &mut path);
        self.write_fragment(id, type_args, &mut path)?;
        out.push_str(&path);
        Ok(())
    }

    /// Separator preceding `id`'s fragment, skipped at the start of a path.
    fn write_separator(&self, id: DeclId, out: &mut String) {
        if out.is_empty() {
            return;
        }
        let separator = match &self.unit.decl(id).kind {
            DeclKind::Class(class) if class.is_inner => '$',
            DeclKind::ValueParameter(_) | DeclKind::Field(_) => '#',
            DeclKind::TypeParameter(_) => '~',
            _ => '.',
        };
        out.push(separator);
    }

    /// One path fragment. Functions render their formal type parameters
    /// before the name so the parameter list reads `<T>foo(T)` rather than
    /// `foo(T)<T>`; everything else renders them after the name.
    fn write_fragment(
        &self,
        id: DeclId,
        type_args: Option<&[TypeArg]>,
        out: &mut String,
    ) -> Result<()> {
        let decl = self.unit.decl(id);
        let is_function = matches!(decl.kind, DeclKind::Function(_) | DeclKind::Constructor(_));
        if is_function && type_args.is_none() {
            self.write_type_params(id, out)?;
        }

        match &decl.kind {
            DeclKind::Class(_)
            | DeclKind::EnumEntry
            | DeclKind::Property(_)
            | DeclKind::Variable(_)
            | DeclKind::TypeParameter(_)
            | DeclKind::ValueParameter(_) => out.push_str(&decl.name),
            DeclKind::Function(f) => {
                out.push_str(&decl.name);
                self.write_value_params(id, f.receiver.iter().chain(&f.params), out)?;
            }
            DeclKind::Constructor(f) => {
                out.push_str(&self.constructor_owner_name(&f.return_type)?);
                self.write_value_params(id, f.receiver.iter().chain(&f.params), out)?;
            }
            DeclKind::Field(_) => out.push_str("field"),
            DeclKind::TypeAlias => return Err(IndexError::unsupported("type aliases")),
            DeclKind::LocalDelegatedProperty => {
                return Err(IndexError::unsupported("local delegated properties"))
            }
        }

        if !is_function && type_args.is_none() {
            self.write_type_params(id, out)?;
        } else {
            let immediate = decl.is_type_params_container().then_some(id);
            self.write_type_args(type_args, immediate, out)?;
        }
        Ok(())
    }

    /// `(T, Int)`: the parenthesized parameter-type list of a function-like
    /// fragment, receiver parameter first when present. Parameter types are
    /// rendered with the owning function as immediate context.
    fn write_value_params<'a>(
        &self,
        owner: DeclId,
        params: impl Iterator<Item = &'a DeclId>,
        out: &mut String,
    ) -> Result<()> {
        out.push('(');
        let mut first = true;
        for &param in params {
            if !first {
                out.push_str(", ");
            }
            first = false;
            match &self.unit.decl(param).kind {
                DeclKind::ValueParameter(p) => {
                    self.type_signature(&p.param_type, Some(owner), out)?
                }
                other => {
                    return Err(IndexError::malformed(format!(
                        "value parameter expected, found {other:?}"
                    )))
                }
            }
        }
        out.push(')');
        Ok(())
    }

    /// `<T, out U>`: formal type parameters with variance labels.
    fn write_type_params(&self, id: DeclId, out: &mut String) -> Result<()> {
        let type_params = self.unit.decl(id).type_params();
        if type_params.is_empty() {
            return Ok(());
        }
        out.push('<');
        for (i, &tp) in type_params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let decl = self.unit.decl(tp);
            if let DeclKind::TypeParameter(t) = &decl.kind {
                if t.variance != Variance::Invariant {
                    out.push_str(t.variance.label());
                    out.push(' ');
                }
            }
            out.push_str(&decl.name);
        }
        out.push('>');
        Ok(())
    }

    /// `<String,Int>`: substituted type arguments of an instantiated type.
    fn write_type_args(
        &self,
        type_args: Option<&[TypeArg]>,
        immediate: Option<DeclId>,
        out: &mut String,
    ) -> Result<()> {
        let args = match type_args {
            Some(args) if !args.is_empty() => args,
            _ => return Ok(()),
        };
        out.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match arg {
                TypeArg::Star => out.push('*'),
                TypeArg::Projection { variance, ty } => {
                    if *variance != Variance::Invariant {
                        out.push_str(variance.label());
                        out.push(' ');
                    }
                    self.type_signature(ty, immediate, out)?;
                }
            }
        }
        out.push('>');
        Ok(())
    }

    /// Signature of a type reference, without a tag prefix.
    ///
    /// A type parameter bound by `immediate` renders as its bare name; any
    /// other classifier renders its full path with the type's arguments
    /// substituted. Error types render a marker (resolving them to VNames is
    /// still fatal, see `EntrySets::type_reference`); dynamic types have no
    /// signature form at all.
    fn type_signature(&self, ty: &Type, immediate: Option<DeclId>, out: &mut String) -> Result<()> {
        match ty {
            Type::Error => {
                out.push_str("<ERROR_TYPE>");
                Ok(())
            }
            Type::Dynamic => Err(IndexError::unsupported("dynamic types")),
            Type::Simple {
                classifier,
                arguments,
                nullable,
            } => {
                let decl = self.unit.decl(*classifier);
                let bound_by_immediate = matches!(decl.kind, DeclKind::TypeParameter(_))
                    && immediate
                        .map(|c| self.unit.decl(c).type_params().contains(classifier))
                        .unwrap_or(false);
                if bound_by_immediate {
                    out.push_str(&decl.name);
                } else {
                    self.element_signature(*classifier, Some(arguments), out)?;
                }
                if *nullable {
                    out.push('?');
                }
                Ok(())
            }
        }
    }

    /// Class name a constructor belongs to, resolved through its constructed
    /// type's classifier. A type-parameter classifier must be bound by an
    /// open scope — the nearest enclosing matching container wins.
    fn constructor_owner_name(&self, constructed: &Type) -> Result<String> {
        let classifier = match constructed {
            Type::Simple { classifier, .. } => *classifier,
            other => {
                return Err(IndexError::unresolved(format!(
                    "constructor of non-classifier type {other:?}"
                )))
            }
        };
        let decl = self.unit.decl(classifier);
        match &decl.kind {
            DeclKind::Class(_) | DeclKind::EnumEntry => Ok(decl.name.clone()),
            DeclKind::TypeParameter(_) => match self.scoped_container_of(classifier) {
                Some(_) => Ok(decl.name.clone()),
                None => Err(IndexError::unresolved(format!(
                    "type parameter `{}` referenced outside its scope",
                    decl.name
                ))),
            },
            other => Err(IndexError::unresolved(format!(
                "unrecognized constructor classifier {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;
    use kotgraph_core::Span;

    struct Fixture {
        builder: UnitBuilder,
        file: FileId,
    }

    impl Fixture {
        fn new(package: &str) -> Self {
            let mut builder = UnitBuilder::new();
            let file = builder.file("a.kt", package, "");
            Fixture { builder, file }
        }

        fn class(&mut self, name: &str, parent: Option<DeclId>) -> DeclId {
            self.class_of_kind(name, parent, ClassKind::Class, false)
        }

        fn class_of_kind(
            &mut self,
            name: &str,
            parent: Option<DeclId>,
            kind: ClassKind,
            is_inner: bool,
        ) -> DeclId {
            let parent = parent.map(Parent::Decl).unwrap_or(Parent::File(self.file));
            self.builder.decl(
                name,
                parent,
                Origin::Real,
                Some(Span::new(0, 1)),
                DeclKind::Class(ClassDecl {
                    class_kind: kind,
                    is_inner,
                    is_companion: false,
                    type_params: Vec::new(),
                    supertypes: Vec::new(),
                    members: Vec::new(),
                }),
            )
        }

        fn function(&mut self, name: &str, parent: Parent, return_type: Type) -> DeclId {
            self.builder.decl(
                name,
                parent,
                Origin::Real,
                Some(Span::new(0, 1)),
                DeclKind::Function(FunctionDecl {
                    type_params: Vec::new(),
                    receiver: None,
                    params: Vec::new(),
                    return_type,
                    body: Vec::new(),
                    overrides: Vec::new(),
                    accessor_role: None,
                }),
            )
        }

        fn param(&mut self, name: &str, function: DeclId, ty: Type, index: i32) -> DeclId {
            let id = self.builder.decl(
                name,
                Parent::Decl(function),
                Origin::Real,
                Some(Span::new(0, 1)),
                DeclKind::ValueParameter(ValueParameterDecl {
                    param_type: ty,
                    index,
                    default_value: None,
                }),
            );
            if index >= 0 {
                self.builder.function_mut(function).params.push(id);
            } else {
                self.builder.function_mut(function).receiver = Some(id);
            }
            id
        }

        fn type_param(&mut self, name: &str, owner: DeclId, variance: Variance) -> DeclId {
            let id = self.builder.decl(
                name,
                Parent::Decl(owner),
                Origin::Real,
                Some(Span::new(0, 1)),
                DeclKind::TypeParameter(TypeParameterDecl {
                    variance,
                    bounds: Vec::new(),
                }),
            );
            match &mut self.builder.decl_mut(owner).kind {
                DeclKind::Class(c) => c.type_params.push(id),
                DeclKind::Function(f) | DeclKind::Constructor(f) => f.type_params.push(id),
                other => panic!("not a container: {other:?}"),
            }
            id
        }

        fn finish(self) -> Unit {
            self.builder.finish()
        }
    }

    fn sig(unit: &Unit, id: DeclId) -> String {
        SignatureEngine::new(unit).full_signature(id).unwrap()
    }

    #[test]
    fn toplevel_class_signature() {
        let mut fx = Fixture::new("test");
        let class = fx.class("Foo", None);
        let unit = fx.finish();
        assert_eq!(sig(&unit, class), "CLASS:test.Foo");
    }

    #[test]
    fn nested_and_inner_class_separators() {
        let mut fx = Fixture::new("test");
        let outer = fx.class("Outer", None);
        let nested = fx.class("Nested", Some(outer));
        let inner = fx.class_of_kind("Inner", Some(outer), ClassKind::Class, true);
        let unit = fx.finish();
        assert_eq!(sig(&unit, nested), "CLASS:test.Outer.Nested");
        assert_eq!(sig(&unit, inner), "CLASS:test.Outer$Inner");
    }

    #[test]
    fn function_signature_includes_parameter_types_and_return_type() {
        let mut fx = Fixture::new("test");
        let int = fx.class("Int", None);
        let unit_cls = fx.class("Unit", None);
        let f = fx.function("foo", Parent::File(fx.file), Type::simple(unit_cls));
        fx.param("x", f, Type::simple(int), 0);
        let unit = fx.finish();
        assert_eq!(sig(&unit, f), "FUN:test.foo(test.Int);test.Unit");
    }

    #[test]
    fn overloads_get_distinct_signatures() {
        let mut fx = Fixture::new("test");
        let int = fx.class("Int", None);
        let string = fx.class("String", None);
        let unit_cls = fx.class("Unit", None);
        let f1 = fx.function("foo", Parent::File(fx.file), Type::simple(unit_cls));
        fx.param("x", f1, Type::simple(int), 0);
        let f2 = fx.function("foo", Parent::File(fx.file), Type::simple(unit_cls));
        fx.param("x", f2, Type::simple(string), 0);
        let unit = fx.finish();
        assert_ne!(sig(&unit, f1), sig(&unit, f2));
    }

    #[test]
    fn value_parameter_uses_hash_separator_and_value_type() {
        let mut fx = Fixture::new("test");
        let int = fx.class("Int", None);
        let unit_cls = fx.class("Unit", None);
        let f = fx.function("foo", Parent::File(fx.file), Type::simple(unit_cls));
        let x = fx.param("x", f, Type::simple(int), 0);
        let unit = fx.finish();
        assert_eq!(sig(&unit, x), "VPARAM:test.foo(test.Int)#x;test.Int");
    }

    #[test]
    fn generic_function_renders_type_params_before_name_and_bare_param_type() {
        let mut fx = Fixture::new("test");
        let unit_cls = fx.class("Unit", None);
        let f = fx.function("foo", Parent::File(fx.file), Type::simple(unit_cls));
        let t = fx.type_param("T", f, Variance::Invariant);
        fx.param("x", f, Type::simple(t), 0);
        let unit = fx.finish();
        assert_eq!(sig(&unit, f), "FUN:test.<T>foo(T);test.Unit");
    }

    #[test]
    fn generic_class_renders_type_params_after_name() {
        let mut fx = Fixture::new("test");
        let class = fx.class("Box", None);
        fx.type_param("T", class, Variance::Invariant);
        let unit = fx.finish();
        assert_eq!(sig(&unit, class), "CLASS:test.Box<T>");
    }

    #[test]
    fn variance_labels_appear_in_type_params() {
        let mut fx = Fixture::new("test");
        let class = fx.class("Sink", None);
        fx.type_param("T", class, Variance::In);
        let unit = fx.finish();
        assert_eq!(sig(&unit, class), "CLASS:test.Sink<in T>");
    }

    #[test]
    fn class_member_type_param_renders_full_path_in_member_signature() {
        // T belongs to the class, not the function, so the function's return
        // type spells out the full path instead of the bare name.
        let mut fx = Fixture::new("test");
        let class = fx.class("Box", None);
        let t = fx.type_param("T", class, Variance::Invariant);
        let f = fx.function("get", Parent::Decl(class), Type::simple(t));
        let unit = fx.finish();
        assert_eq!(sig(&unit, f), "FUN:test.Box<T>.get();test.Box<T>~T");
    }

    #[test]
    fn nullable_type_appends_question_mark() {
        let mut fx = Fixture::new("test");
        let string = fx.class("String", None);
        let f = fx.function("name", Parent::File(fx.file), Type::simple(string).nullable());
        let unit = fx.finish();
        assert_eq!(sig(&unit, f), "FUN:test.name();test.String?");
    }

    #[test]
    fn instantiated_type_substitutes_arguments() {
        let mut fx = Fixture::new("test");
        let list = fx.class("List", None);
        fx.type_param("E", list, Variance::Invariant);
        let string = fx.class("String", None);
        let f = fx.function(
            "names",
            Parent::File(fx.file),
            Type::generic(list, vec![Type::simple(string)]),
        );
        let unit = fx.finish();
        assert_eq!(sig(&unit, f), "FUN:test.names();test.List<test.String>");
    }

    #[test]
    fn backing_field_renders_field_fragment_under_property() {
        let mut fx = Fixture::new("test");
        let int = fx.class("Int", None);
        let class = fx.class("C", None);
        let prop = fx.builder.decl(
            "x",
            Parent::Decl(class),
            Origin::Real,
            Some(Span::new(0, 1)),
            DeclKind::Property(PropertyDecl {
                value_type: Type::simple(int),
                getter: None,
                setter: None,
                backing_field: None,
            }),
        );
        let field = fx.builder.decl(
            "x",
            Parent::Decl(class),
            Origin::Synthetic,
            None,
            DeclKind::Field(FieldDecl {
                field_type: Type::simple(int),
                initializer: None,
            }),
        );
        fx.builder.set_owning_property(field, prop);
        let unit = fx.finish();
        assert_eq!(sig(&unit, prop), "PROP:test.C.x;test.Int");
        assert_eq!(sig(&unit, field), "BFIELD:test.C.x#field");
    }

    #[test]
    fn signatures_are_stable_across_engines() {
        let mut fx = Fixture::new("test");
        let class = fx.class("Foo", None);
        let unit = fx.finish();
        let first = SignatureEngine::new(&unit).full_signature(class).unwrap();
        let second = SignatureEngine::new(&unit).full_signature(class).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scope_stack_resolves_constructor_type_parameter_and_balances() {
        let mut fx = Fixture::new("test");
        let class = fx.class("Box", None);
        let t = fx.type_param("T", class, Variance::Invariant);
        let unit = fx.finish();
        let mut engine = SignatureEngine::new(&unit);

        assert!(engine
            .constructor_owner_name(&Type::simple(t))
            .is_err());

        engine.enter_scope(class);
        assert_eq!(
            engine.constructor_owner_name(&Type::simple(t)).unwrap(),
            "T"
        );
        engine.leave_scope();
        assert_eq!(engine.depth(), 0);
    }

    #[test]
    fn dynamic_types_are_fatal_in_signature_position() {
        let mut fx = Fixture::new("test");
        let f = fx.function("foo", Parent::File(fx.file), Type::Dynamic);
        let unit = fx.finish();
        assert!(matches!(
            SignatureEngine::new(&unit).full_signature(f),
            Err(IndexError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn error_types_render_marker_in_signature_position() {
        let mut fx = Fixture::new("test");
        let f = fx.function("foo", Parent::File(fx.file), Type::Error);
        let unit = fx.finish();
        assert_eq!(sig(&unit, f), "FUN:test.foo();<ERROR_TYPE>");
    }
}
