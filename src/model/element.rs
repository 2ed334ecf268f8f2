use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::{ElementId, Multiplicity, SlotId, Span, TypeExpr};
use crate::incremental::ContentHash;
use crate::visibility::AccessLevel;

use super::expr::Statement;

/// What a reference slot is allowed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// Class, primitive or enumeration.
    Type,
    Profile,
    /// Any packageable element other than a package.
    Element,
    /// A function referenced by name, e.g. from a route.
    FunctionRef,
    /// A call site in a function body, resolved during validation.
    Call { arity: usize },
}

/// A textual reference declared by an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSlot {
    pub kind: SlotKind,
    pub text: String,
    pub span: Span,
    #[serde(skip)]
    pub resolved: Option<ElementId>,
}

impl ReferenceSlot {
    pub fn is_qualified(&self) -> bool {
        self.text.contains("::")
    }

    /// Last path segment of the reference text.
    pub fn simple_name(&self) -> &str {
        self.text.rsplit("::").next().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereotypeUse {
    pub profile: SlotId,
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedValue {
    pub profile: SlotId,
    pub tag: String,
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub stereotypes: Vec<StereotypeUse>,
    pub tagged_values: Vec<TaggedValue>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.stereotypes.is_empty() && self.tagged_values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub multiplicity: Multiplicity,
    pub annotations: Annotations,
    pub span: Span,
    pub name_span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub type_params: Vec<String>,
    pub generalizations: Vec<TypeExpr>,
    pub properties: Vec<PropertyDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDecl {
    pub properties: Vec<PropertyDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationDecl {
    pub values: Vec<EnumValueDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDecl {
    pub stereotypes: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveDecl {
    pub supertype: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub multiplicity: Multiplicity,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Unqualified function name; the element name is the signature id.
    pub function_name: String,
    pub type_params: Vec<String>,
    pub parameters: Vec<ParameterDecl>,
    pub return_type: TypeExpr,
    pub return_multiplicity: Multiplicity,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRef {
    pub role: String,
    pub slot: SlotId,
}

/// Element contributed by an extension section such as `###Route`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDecl {
    pub section: String,
    pub kind: String,
    pub attributes: BTreeMap<String, String>,
    pub references: Vec<ExtensionRef>,
}

impl ExtensionDecl {
    pub fn reference(&self, role: &str) -> Option<SlotId> {
        self.references.iter().find(|r| r.role == role).map(|r| r.slot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDecl {
    pub children: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementKind {
    Package(PackageDecl),
    Class(ClassDecl),
    Association(AssociationDecl),
    Enumeration(EnumerationDecl),
    Profile(ProfileDecl),
    PrimitiveType(PrimitiveDecl),
    ConcreteFunction(FunctionDecl),
    NativeFunction(FunctionDecl),
    Extension(ExtensionDecl),
}

impl ElementKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Package(_) => "Package",
            Self::Class(_) => "Class",
            Self::Association(_) => "Association",
            Self::Enumeration(_) => "Enumeration",
            Self::Profile(_) => "Profile",
            Self::PrimitiveType(_) => "PrimitiveType",
            Self::ConcreteFunction(_) => "ConcreteFunction",
            Self::NativeFunction(_) => "NativeFunction",
            Self::Extension(_) => "Extension",
        }
    }

    pub fn function(&self) -> Option<&FunctionDecl> {
        match self {
            Self::ConcreteFunction(f) | Self::NativeFunction(f) => Some(f),
            _ => None,
        }
    }

    pub fn class(&self) -> Option<&ClassDecl> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Self::Class(_) | Self::PrimitiveType(_) | Self::Enumeration(_))
    }

    pub fn type_params(&self) -> &[String] {
        match self {
            Self::Class(c) => &c.type_params,
            Self::ConcreteFunction(f) | Self::NativeFunction(f) => &f.type_params,
            _ => &[],
        }
    }
}

/// A bound element of the model graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageableElement {
    pub path: String,
    pub name: String,
    pub package: String,
    pub kind: ElementKind,
    pub annotations: Annotations,
    pub slots: Vec<ReferenceSlot>,
    /// Explicit access level, cached once the profile slots are resolved.
    pub access: Option<AccessLevel>,
    pub access_declarations: Vec<(AccessLevel, Span)>,
    /// Source id; empty for implicitly created packages.
    pub source: String,
    pub span: Span,
    pub name_span: Span,
    pub imports: Arc<Vec<String>>,
    pub fingerprint: ContentHash,
}

impl PackageableElement {
    pub fn is_function(&self) -> bool {
        self.kind.function().is_some()
    }

    /// Name used for import-based lookup: the function name for functions,
    /// the element name otherwise.
    pub fn lookup_name(&self) -> &str {
        match self.kind.function() {
            Some(f) => &f.function_name,
            None => &self.name,
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&ReferenceSlot> {
        self.slots.get(slot)
    }

    /// Resolved targets of all slots, in slot order.
    pub fn resolved_targets(&self) -> impl Iterator<Item = (SlotId, ElementId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.resolved.map(|t| (i, t)))
    }

    /// Render a declared type the way it was written, with simple names.
    pub fn render_type(&self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Named { slot, args, .. } => {
                let name = self.slots.get(*slot).map_or("?", |s| s.simple_name());
                if args.is_empty() {
                    name.to_string()
                } else {
                    let args: Vec<_> = args.iter().map(|a| self.render_type(a)).collect();
                    format!("{}<{}>", name, args.join(", "))
                }
            }
            TypeExpr::Param { name, .. } => name.clone(),
            TypeExpr::Function { params, ret, .. } => {
                let params: Vec<_> = params.iter().map(|(t, m)| format!("{}{}", self.render_type(t), m)).collect();
                format!("{{{}->{}{}}}", params.join(", "), self.render_type(&ret.0), ret.1)
            }
        }
    }

    /// Human readable name: `pkg::f(String[1]):Boolean[1]` for functions,
    /// the path otherwise.
    pub fn signature(&self) -> String {
        match self.kind.function() {
            Some(f) => {
                let params: Vec<_> = f
                    .parameters
                    .iter()
                    .map(|p| format!("{}{}", self.render_type(&p.ty), p.multiplicity))
                    .collect();
                format!(
                    "{}({}):{}{}",
                    qualify(&self.package, &f.function_name),
                    params.join(", "),
                    self.render_type(&f.return_type),
                    f.return_multiplicity
                )
            }
            None => self.path.clone(),
        }
    }
}

/// Join a package path and a simple name.
pub fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() || package == ROOT_PACKAGE {
        name.to_string()
    } else {
        format!("{}::{}", package, name)
    }
}

/// Split `a::b::C` into (`a::b`, `C`). Top-level names live in the root package.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind("::") {
        Some(i) => (&path[..i], &path[i + 2..]),
        None => (ROOT_PACKAGE, path),
    }
}

pub const ROOT_PACKAGE: &str = "::";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_qualify() {
        assert_eq!(split_path("a::b::C"), ("a::b", "C"));
        assert_eq!(split_path("C"), (ROOT_PACKAGE, "C"));
        assert_eq!(qualify("a::b", "C"), "a::b::C");
        assert_eq!(qualify(ROOT_PACKAGE, "C"), "C");
    }

    #[test]
    fn test_slot_simple_name() {
        let slot = ReferenceSlot {
            kind: SlotKind::Type,
            text: "model::domain::Person".into(),
            span: Span::default(),
            resolved: None,
        };
        assert!(slot.is_qualified());
        assert_eq!(slot.simple_name(), "Person");
    }
}
