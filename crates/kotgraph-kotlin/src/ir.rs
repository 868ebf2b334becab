//! Typed-tree model for one compilation unit.
//!
//! The host compiler front end hands the extractor a fully type-checked tree:
//! modules → files → declarations → (nested declarations | statements |
//! expressions), every node carrying resolved type information, original
//! character offsets, and a real/synthetic origin marker.
//!
//! The tree is an arena: declarations and expressions live in flat vectors
//! inside [`Unit`] and refer to each other through u32 newtype ids. Ids make
//! structural identity trivial (memo caches key on them directly) and keep
//! the parent chain walkable without back-pointers into owned nodes.
//!
//! [`UnitBuilder`] is the construction API, used by front ends and by test
//! fixtures alike.

use std::collections::HashMap;

use kotgraph_core::Span;
use serde::{Deserialize, Serialize};

// ============================================================================
// Ids
// ============================================================================

/// Unique identifier for a file within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Unique identifier for a declaration within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl std::fmt::Display for DeclId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decl_{}", self.0)
    }
}

/// Unique identifier for an expression within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ExprId(pub u32);

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expr_{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Where a declaration came from.
///
/// Only `Real` declarations have originating source text; `Synthetic` covers
/// compiler builtins and stubs, and `FakeOverride` marks members inherited
/// without a redeclaration in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Real,
    Synthetic,
    FakeOverride,
}

/// Declared variance of a type parameter or type projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variance {
    Invariant,
    In,
    Out,
}

impl Variance {
    /// Source-level label, empty for invariant positions.
    pub fn label(&self) -> &'static str {
        match self {
            Variance::Invariant => "",
            Variance::In => "in",
            Variance::Out => "out",
        }
    }
}

/// Kind of a class-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    EnumClass,
    AnnotationClass,
    Object,
}

/// Which accessor of a property a function implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessorRole {
    Getter,
    Setter,
}

/// Cast/coercion operators appearing in source or inserted by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeOperator {
    Cast,
    SafeCast,
    InstanceOf,
    NotInstanceOf,
    ImplicitCast,
    ImplicitNotNull,
    ImplicitCoercionToUnit,
    ImplicitIntegerCoercion,
}

impl TypeOperator {
    /// Compiler-inserted operators leave no mark in source and emit no facts.
    pub fn is_implicit(&self) -> bool {
        matches!(
            self,
            TypeOperator::ImplicitCast
                | TypeOperator::ImplicitNotNull
                | TypeOperator::ImplicitCoercionToUnit
                | TypeOperator::ImplicitIntegerCoercion
        )
    }
}

// ============================================================================
// Types
// ============================================================================

/// A resolved type reference.
///
/// Structural `Eq + Hash` lets the type memo cache key on the reference
/// itself: structurally equal types always produce the same VName.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A classifier plus ordered type arguments and a nullability flag.
    Simple {
        classifier: DeclId,
        arguments: Vec<TypeArg>,
        nullable: bool,
    },
    /// Unresolvable type produced by a broken front end.
    Error,
    /// Platform dynamic type.
    Dynamic,
}

impl Type {
    /// Non-generic, non-nullable reference to `classifier`.
    pub fn simple(classifier: DeclId) -> Self {
        Type::Simple {
            classifier,
            arguments: Vec::new(),
            nullable: false,
        }
    }

    /// Generic reference to `classifier` with invariant arguments.
    pub fn generic(classifier: DeclId, arguments: Vec<Type>) -> Self {
        Type::Simple {
            classifier,
            arguments: arguments
                .into_iter()
                .map(|ty| TypeArg::Projection {
                    variance: Variance::Invariant,
                    ty,
                })
                .collect(),
            nullable: false,
        }
    }

    /// The same type with the nullability flag set.
    pub fn nullable(self) -> Self {
        match self {
            Type::Simple {
                classifier,
                arguments,
                ..
            } => Type::Simple {
                classifier,
                arguments,
                nullable: true,
            },
            other => other,
        }
    }
}

/// One argument in a generic type's argument list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArg {
    /// `*` projection.
    Star,
    /// A type with an optional use-site variance.
    Projection { variance: Variance, ty: Type },
}

// ============================================================================
// Declarations
// ============================================================================

/// Structural parent of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    File(FileId),
    Decl(DeclId),
}

/// One declaration in the arena.
#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub parent: Parent,
    pub origin: Origin,
    /// Character offsets of the whole declaration; `None` for synthetic
    /// declarations with no originating source.
    pub span: Option<Span>,
    /// Character offsets of an explicit type annotation written in source;
    /// `None` when the type was inferred or the kind has no annotation.
    pub type_annotation: Option<Span>,
    pub kind: DeclKind,
}

impl Decl {
    /// Whether this declaration has real originating source text.
    ///
    /// Synthetic declarations (builtins, stubs, anything without offsets)
    /// are excluded from anchor and usage emission.
    pub fn has_source(&self) -> bool {
        self.origin == Origin::Real && self.span.is_some()
    }

    /// Formal type parameters, empty for kinds that cannot declare any.
    pub fn type_params(&self) -> &[DeclId] {
        match &self.kind {
            DeclKind::Class(c) => &c.type_params,
            DeclKind::Function(f) | DeclKind::Constructor(f) => &f.type_params,
            _ => &[],
        }
    }

    /// Whether this declaration opens a generic-parameter scope.
    pub fn is_type_params_container(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Class(_) | DeclKind::Function(_) | DeclKind::Constructor(_)
        )
    }
}

/// Closed set of declaration shapes.
#[derive(Debug, Clone)]
pub enum DeclKind {
    Class(ClassDecl),
    EnumEntry,
    Function(FunctionDecl),
    Constructor(FunctionDecl),
    Property(PropertyDecl),
    Field(FieldDecl),
    Variable(VariableDecl),
    ValueParameter(ValueParameterDecl),
    TypeParameter(TypeParameterDecl),
    /// Recognized but unsupported: indexing one is fatal.
    TypeAlias,
    /// Recognized but unsupported: indexing one is fatal.
    LocalDelegatedProperty,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub class_kind: ClassKind,
    pub is_inner: bool,
    pub is_companion: bool,
    pub type_params: Vec<DeclId>,
    pub supertypes: Vec<Type>,
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub type_params: Vec<DeclId>,
    /// Extension receiver parameter, ordered before declared parameters.
    pub receiver: Option<DeclId>,
    pub params: Vec<DeclId>,
    pub return_type: Type,
    pub body: Vec<ExprId>,
    /// Supertype members this function overrides.
    pub overrides: Vec<DeclId>,
    /// Set when this function is a property accessor.
    pub accessor_role: Option<AccessorRole>,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub value_type: Type,
    pub getter: Option<DeclId>,
    pub setter: Option<DeclId>,
    pub backing_field: Option<DeclId>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub field_type: Type,
    pub initializer: Option<ExprId>,
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub var_type: Type,
    pub initializer: Option<ExprId>,
}

#[derive(Debug, Clone)]
pub struct ValueParameterDecl {
    pub param_type: Type,
    /// Position among declared parameters; `-1` marks a receiver parameter.
    pub index: i32,
    pub default_value: Option<ExprId>,
}

#[derive(Debug, Clone)]
pub struct TypeParameterDecl {
    pub variance: Variance,
    pub bounds: Vec<Type>,
}

// ============================================================================
// Expressions
// ============================================================================

/// One expression or statement in the arena.
#[derive(Debug, Clone)]
pub struct Expr {
    /// Character offsets of the expression in source, when it has any.
    pub span: Option<Span>,
    pub kind: ExprKind,
}

/// Closed set of expression shapes the extractor distinguishes.
///
/// Only declaration references, call targets, and explicit cast operators
/// produce facts; the rest are traversed (or rejected) without emission.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Direct reference to a declaration (variable read, property access).
    DeclarationRef { target: DeclId },
    /// Function or constructor call.
    Call {
        callee: DeclId,
        arguments: Vec<ExprId>,
    },
    /// Cast/coercion applying `operator` against `operand_classifier`.
    TypeOperator {
        operator: TypeOperator,
        operand_classifier: DeclId,
        argument: ExprId,
    },
    Return { value: ExprId },
    /// Literal constant; produces no facts.
    Const,
    /// Compiler-inserted superclass initializer call; produces no facts.
    InstanceInitializerCall,
    /// Recognized but unsupported: indexing one is fatal.
    CallableReference,
}

// ============================================================================
// Files and Unit
// ============================================================================

/// One source file plus its top-level declarations.
#[derive(Debug, Clone)]
pub struct FileData {
    /// Corpus-relative path.
    pub path: String,
    /// Fully qualified package name; empty for the root package.
    pub package_fq_name: String,
    /// Full source text. Spans index into this as char == byte offsets.
    pub text: String,
    pub declarations: Vec<DeclId>,
}

/// One fully type-checked compilation unit.
///
/// All ids handed out by [`UnitBuilder`] are dense indices into the arenas,
/// so lookups are plain indexing. The unit is immutable once built; the
/// extractor never mutates it.
#[derive(Debug)]
pub struct Unit {
    files: Vec<FileData>,
    decls: Vec<Decl>,
    exprs: Vec<Expr>,
    /// Explicit structural-parent fixup: a property accessor's or backing
    /// field's signature parent is its owning property, not its lexical
    /// container.
    property_of: HashMap<DeclId, DeclId>,
}

impl Unit {
    pub fn files(&self) -> impl Iterator<Item = (FileId, &FileData)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId(i as u32), f))
    }

    pub fn file(&self, id: FileId) -> &FileData {
        &self.files[id.0 as usize]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    /// Owning property of an accessor or backing field, if any.
    pub fn owning_property(&self, id: DeclId) -> Option<DeclId> {
        self.property_of.get(&id).copied()
    }

    /// Structural parent used for signature paths: the owning property for
    /// accessors and backing fields, the declared parent otherwise.
    pub fn structural_parent(&self, id: DeclId) -> Parent {
        match self.owning_property(id) {
            Some(property) => Parent::Decl(property),
            None => self.decl(id).parent,
        }
    }

    /// Ancestor chain of `id` from the traversal root (the file) down to the
    /// immediate parent, excluding `id` itself.
    pub fn ancestors(&self, id: DeclId) -> (FileId, Vec<DeclId>) {
        let mut chain = Vec::new();
        let mut cursor = id;
        loop {
            match self.structural_parent(cursor) {
                Parent::Decl(parent) => {
                    chain.push(parent);
                    cursor = parent;
                }
                Parent::File(file) => {
                    chain.reverse();
                    return (file, chain);
                }
            }
        }
    }

    /// File containing `id`, walking the structural parent chain.
    pub fn containing_file(&self, id: DeclId) -> FileId {
        self.ancestors(id).0
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Construction API for [`Unit`].
///
/// Declarations are created with their invariant fields up front; list
/// fields (members, parameters, supertypes) are filled in through the
/// `*_mut` accessors, which panic when the id names a different kind —
/// that is a construction bug, not input data.
#[derive(Debug, Default)]
pub struct UnitBuilder {
    files: Vec<FileData>,
    decls: Vec<Decl>,
    exprs: Vec<Expr>,
    property_of: HashMap<DeclId, DeclId>,
}

impl UnitBuilder {
    pub fn new() -> Self {
        UnitBuilder::default()
    }

    pub fn file(
        &mut self,
        path: impl Into<String>,
        package_fq_name: impl Into<String>,
        text: impl Into<String>,
    ) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(FileData {
            path: path.into(),
            package_fq_name: package_fq_name.into(),
            text: text.into(),
            declarations: Vec::new(),
        });
        id
    }

    /// Insert a declaration and register it with its parent's child list.
    ///
    /// Type parameters are not listed as members; containers track them
    /// through their `type_params` field. Non-class containers track their
    /// children through their own payload fields (params, accessors),
    /// filled by the caller.
    pub fn decl(
        &mut self,
        name: impl Into<String>,
        parent: Parent,
        origin: Origin,
        span: Option<Span>,
        kind: DeclKind,
    ) -> DeclId {
        let is_type_param = matches!(kind, DeclKind::TypeParameter(_));
        let id = self.unlisted_decl(name, parent, origin, span, kind);
        if !is_type_param {
            match parent {
                Parent::File(file) => self.files[file.0 as usize].declarations.push(id),
                Parent::Decl(container) => {
                    if let DeclKind::Class(class) = &mut self.decls[container.0 as usize].kind {
                        class.members.push(id);
                    }
                }
            }
        }
        id
    }

    /// Insert a declaration whose parent is recorded for signature paths but
    /// which is not listed among the parent's children: builtin/stub
    /// declarations reached only through references, and members reached
    /// through another declaration (property accessors, backing fields).
    pub fn unlisted_decl(
        &mut self,
        name: impl Into<String>,
        parent: Parent,
        origin: Origin,
        span: Option<Span>,
        kind: DeclKind,
    ) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl {
            name: name.into(),
            parent,
            origin,
            span,
            type_annotation: None,
            kind,
        });
        id
    }

    pub fn expr(&mut self, span: Option<Span>, kind: ExprKind) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr { span, kind });
        id
    }

    /// Record the explicit-type-annotation span for a declaration.
    pub fn set_type_annotation(&mut self, id: DeclId, span: Span) {
        self.decls[id.0 as usize].type_annotation = Some(span);
    }

    /// Record that `member` (accessor or backing field) belongs to
    /// `property` for structural-parent purposes.
    pub fn set_owning_property(&mut self, member: DeclId, property: DeclId) {
        self.property_of.insert(member, property);
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    pub fn class_mut(&mut self, id: DeclId) -> &mut ClassDecl {
        match &mut self.decls[id.0 as usize].kind {
            DeclKind::Class(class) => class,
            other => panic!("{id} is not a class: {other:?}"),
        }
    }

    pub fn function_mut(&mut self, id: DeclId) -> &mut FunctionDecl {
        match &mut self.decls[id.0 as usize].kind {
            DeclKind::Function(f) | DeclKind::Constructor(f) => f,
            other => panic!("{id} is not a function: {other:?}"),
        }
    }

    pub fn property_mut(&mut self, id: DeclId) -> &mut PropertyDecl {
        match &mut self.decls[id.0 as usize].kind {
            DeclKind::Property(p) => p,
            other => panic!("{id} is not a property: {other:?}"),
        }
    }

    pub fn finish(self) -> Unit {
        Unit {
            files: self.files,
            decls: self.decls,
            exprs: self.exprs,
            property_of: self.property_of,
        }
    }
}
