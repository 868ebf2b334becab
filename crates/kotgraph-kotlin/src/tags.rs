//! Signature tags and node-kind mappings.
//!
//! Every declaration and type maps onto a short tag that prefixes its
//! signature, and onto a [`NodeKind`] from the closed output taxonomy.
//! Both mappings are exhaustive matches: an unsupported shape fails here
//! rather than falling through to a wrong-but-plausible kind.

use kotgraph_core::{IndexError, NodeKind, Result};

use crate::ir::{ClassDecl, ClassKind, DeclId, DeclKind, Type, Unit};

/// Tag prefix identifying a declaration or type kind inside a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Class,
    Interface,
    Object,
    CompanionObject,
    EnumClass,
    EnumEntry,
    Function,
    Constructor,
    Property,
    BackingField,
    TypeParameter,
    ValueParameter,
    Variable,
}

impl Tag {
    /// The prefix string as it appears in signatures.
    pub fn id(&self) -> &'static str {
        match self {
            Tag::Class => "CLASS",
            Tag::Interface => "INTERFACE",
            Tag::Object => "OBJ",
            Tag::CompanionObject => "COMP",
            Tag::EnumClass => "ENUM",
            Tag::EnumEntry => "ENUM_ENTRY",
            Tag::Function => "FUN",
            Tag::Constructor => "CTOR",
            Tag::Property => "PROP",
            Tag::BackingField => "BFIELD",
            Tag::TypeParameter => "TPARAM",
            Tag::ValueParameter => "VPARAM",
            Tag::Variable => "VAR",
        }
    }
}

fn class_tag(class: &ClassDecl) -> Result<Tag> {
    match class.class_kind {
        ClassKind::Class => Ok(Tag::Class),
        ClassKind::Interface => Ok(Tag::Interface),
        ClassKind::EnumClass => Ok(Tag::EnumClass),
        ClassKind::AnnotationClass => Err(IndexError::unsupported("annotation classes")),
        ClassKind::Object => Ok(if class.is_companion {
            Tag::CompanionObject
        } else {
            Tag::Object
        }),
    }
}

/// Signature tag for a declaration.
pub fn decl_tag(unit: &Unit, id: DeclId) -> Result<Tag> {
    match &unit.decl(id).kind {
        DeclKind::Class(class) => class_tag(class),
        DeclKind::EnumEntry => Ok(Tag::EnumEntry),
        DeclKind::Function(_) => Ok(Tag::Function),
        DeclKind::Constructor(_) => Ok(Tag::Constructor),
        DeclKind::Property(_) => Ok(Tag::Property),
        DeclKind::Field(_) => Ok(Tag::BackingField),
        DeclKind::Variable(_) => Ok(Tag::Variable),
        DeclKind::ValueParameter(_) => Ok(Tag::ValueParameter),
        DeclKind::TypeParameter(_) => Ok(Tag::TypeParameter),
        DeclKind::TypeAlias => Err(IndexError::unsupported("type aliases")),
        DeclKind::LocalDelegatedProperty => {
            Err(IndexError::unsupported("local delegated properties"))
        }
    }
}

/// Signature tag for a type reference: the tag of its classifier.
pub fn type_tag(unit: &Unit, ty: &Type) -> Result<Tag> {
    match ty {
        Type::Simple { classifier, .. } => decl_tag(unit, *classifier),
        Type::Error => Err(IndexError::unsupported("error types")),
        Type::Dynamic => Err(IndexError::unsupported("dynamic types")),
    }
}

fn class_node_kind(class: &ClassDecl) -> Result<NodeKind> {
    match class.class_kind {
        ClassKind::Class => Ok(NodeKind::RecordClass),
        ClassKind::Interface => Ok(NodeKind::Interface),
        ClassKind::EnumClass => Ok(NodeKind::SumEnumClass),
        ClassKind::AnnotationClass => Err(IndexError::unsupported("annotation classes")),
        ClassKind::Object => Ok(if class.is_companion {
            NodeKind::CompanionObject
        } else {
            NodeKind::Object
        }),
    }
}

/// Output node kind for a declaration.
pub fn decl_node_kind(unit: &Unit, id: DeclId) -> Result<NodeKind> {
    match &unit.decl(id).kind {
        DeclKind::Class(class) => class_node_kind(class),
        DeclKind::EnumEntry => Ok(NodeKind::Constant),
        DeclKind::Function(_) => Ok(NodeKind::Function),
        DeclKind::Constructor(_) => Ok(NodeKind::FunctionConstructor),
        DeclKind::Property(_) => Ok(NodeKind::Property),
        DeclKind::Field(_) => Ok(NodeKind::VariableField),
        DeclKind::Variable(_) => Ok(NodeKind::VariableLocal),
        DeclKind::ValueParameter(_) => Ok(NodeKind::VariableParameter),
        DeclKind::TypeParameter(_) => Ok(NodeKind::AbsVar),
        DeclKind::TypeAlias => Ok(NodeKind::TypeAlias),
        DeclKind::LocalDelegatedProperty => {
            Err(IndexError::unsupported("local delegated properties"))
        }
    }
}

/// Output node kind for a type reference: the kind of its classifier.
pub fn type_node_kind(unit: &Unit, ty: &Type) -> Result<NodeKind> {
    match ty {
        Type::Simple { classifier, .. } => decl_node_kind(unit, *classifier),
        Type::Error => Err(IndexError::unsupported("error types")),
        Type::Dynamic => Err(IndexError::unsupported("dynamic types")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Origin, Parent, UnitBuilder};

    fn class_kind_decl(kind: ClassKind, is_companion: bool) -> DeclKind {
        DeclKind::Class(ClassDecl {
            class_kind: kind,
            is_inner: false,
            is_companion,
            type_params: Vec::new(),
            supertypes: Vec::new(),
            members: Vec::new(),
        })
    }

    #[test]
    fn class_kinds_map_to_tags_and_node_kinds() {
        let mut b = UnitBuilder::new();
        let file = b.file("a.kt", "test", "");
        let class = b.decl("C", Parent::File(file), Origin::Real, None, class_kind_decl(ClassKind::Class, false));
        let iface = b.decl("I", Parent::File(file), Origin::Real, None, class_kind_decl(ClassKind::Interface, false));
        let object = b.decl("O", Parent::File(file), Origin::Real, None, class_kind_decl(ClassKind::Object, false));
        let comp = b.decl("Companion", Parent::Decl(class), Origin::Real, None, class_kind_decl(ClassKind::Object, true));
        let unit = b.finish();

        assert_eq!(decl_tag(&unit, class).unwrap(), Tag::Class);
        assert_eq!(decl_tag(&unit, iface).unwrap(), Tag::Interface);
        assert_eq!(decl_tag(&unit, object).unwrap(), Tag::Object);
        assert_eq!(decl_tag(&unit, comp).unwrap(), Tag::CompanionObject);

        assert_eq!(decl_node_kind(&unit, class).unwrap(), NodeKind::RecordClass);
        assert_eq!(decl_node_kind(&unit, iface).unwrap(), NodeKind::Interface);
        assert_eq!(decl_node_kind(&unit, object).unwrap(), NodeKind::Object);
        assert_eq!(decl_node_kind(&unit, comp).unwrap(), NodeKind::CompanionObject);
    }

    #[test]
    fn annotation_classes_are_rejected() {
        let mut b = UnitBuilder::new();
        let file = b.file("a.kt", "test", "");
        let ann = b.decl(
            "A",
            Parent::File(file),
            Origin::Real,
            None,
            class_kind_decl(ClassKind::AnnotationClass, false),
        );
        let unit = b.finish();
        assert!(matches!(
            decl_tag(&unit, ann),
            Err(IndexError::UnsupportedConstruct { .. })
        ));
    }

    #[test]
    fn error_and_dynamic_types_are_rejected() {
        let unit = UnitBuilder::new().finish();
        assert!(type_tag(&unit, &Type::Error).is_err());
        assert!(type_tag(&unit, &Type::Dynamic).is_err());
        assert!(type_node_kind(&unit, &Type::Error).is_err());
    }
}
