//! Semantic type model shared by every declaration frontend.
//!
//! Payload types are described as a closed, in-memory graph: a [`TypeCatalog`] maps fully
//! qualified type names to [`TypeDef`]s, and fields point at other types through
//! [`TypeRef`]s. Named references are plain names, so self-referential and mutually
//! referential types need no special representation here; breaking the cycle is the
//! schema generator's job.
//!
//! Registry-declared types describe themselves through [`Describe`]:
//!
//! ```
//! use asyncapi_from_source::types::{Describe, TypeCatalog, TypeRef};
//!
//! struct Node;
//!
//! impl Describe for Node {
//!     fn type_ref() -> TypeRef {
//!         TypeRef::named::<Self>()
//!     }
//!
//!     fn define(types: &mut TypeCatalog) {
//!         types.define_object::<Self>(|object| {
//!             object
//!                 .field::<String>("name")
//!                 .field::<Vec<Node>>("children")
//!         });
//!     }
//! }
//!
//! let mut types = TypeCatalog::new();
//! Node::define(&mut types);
//! assert_eq!(types.len(), 1);
//! ```

use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Primitive types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
}

impl PrimitiveType {
    /// Parse a primitive type name as written in Rust source
    pub fn from_name(type_name: &str) -> Option<Self> {
        match type_name {
            "String" | "str" => Some(PrimitiveType::String),
            "i8" => Some(PrimitiveType::I8),
            "i16" => Some(PrimitiveType::I16),
            "i32" => Some(PrimitiveType::I32),
            "i64" | "isize" => Some(PrimitiveType::I64),
            "i128" => Some(PrimitiveType::I128),
            "u8" => Some(PrimitiveType::U8),
            "u16" => Some(PrimitiveType::U16),
            "u32" => Some(PrimitiveType::U32),
            "u64" | "usize" => Some(PrimitiveType::U64),
            "u128" => Some(PrimitiveType::U128),
            "f32" => Some(PrimitiveType::F32),
            "f64" => Some(PrimitiveType::F64),
            "bool" => Some(PrimitiveType::Bool),
            "char" => Some(PrimitiveType::Char),
            _ => None,
        }
    }
}

/// A reference to a type as it appears in a field, payload or parameter position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(PrimitiveType),
    /// Sequence of the inner type
    Array(Box<TypeRef>),
    /// String-keyed map of the inner type
    Map(Box<TypeRef>),
    /// Optional value; unwrapped by the generator and marks the field non-required
    Nullable(Box<TypeRef>),
    /// A struct or enum, by fully qualified name
    Named(String),
    /// Arbitrary JSON
    Any,
}

impl TypeRef {
    /// Reference to `T` by its fully qualified Rust type name
    pub fn named<T: ?Sized>() -> Self {
        TypeRef::Named(std::any::type_name::<T>().to_string())
    }

    pub fn array(inner: TypeRef) -> Self {
        TypeRef::Array(Box::new(inner))
    }

    pub fn map(inner: TypeRef) -> Self {
        TypeRef::Map(Box::new(inner))
    }

    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable(Box::new(inner))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Nullable(_))
    }

    /// Names of every struct/enum this reference mentions, in order of appearance
    pub fn named_types(&self) -> Vec<&str> {
        match self {
            TypeRef::Named(name) => vec![name.as_str()],
            TypeRef::Array(inner) | TypeRef::Map(inner) | TypeRef::Nullable(inner) => {
                inner.named_types()
            }
            TypeRef::Primitive(_) | TypeRef::Any => Vec::new(),
        }
    }
}

/// Definition of a named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Fully qualified name, e.g. `shop::orders::OrderPlaced`
    pub full_name: String,
    /// Doc comment or explicit description
    pub description: Option<String>,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// A struct with named fields
    Object(Vec<FieldDef>),
    /// A fieldless enum; holds the variant names
    Enum(Vec<String>),
}

/// Field definition in a struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as declared
    pub name: String,
    /// Explicit wire name; takes precedence over the property name selector
    pub rename: Option<String>,
    pub ty: TypeRef,
    pub description: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            rename: None,
            ty,
            description: None,
        }
    }
}

impl TypeDef {
    pub fn object(full_name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            full_name: full_name.into(),
            description: None,
            kind: TypeKind::Object(fields),
        }
    }

    pub fn enumeration(full_name: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            full_name: full_name.into(),
            description: None,
            kind: TypeKind::Enum(variants),
        }
    }

    /// Module part of the full name (`shop::orders` for `shop::orders::OrderPlaced`)
    pub fn namespace(&self) -> &str {
        split_type_name(&self.full_name).0
    }

    /// Type name without module paths, generic arguments included
    pub fn short_name(&self) -> String {
        short_type_name(&self.full_name)
    }
}

/// Closed catalog of every named type reachable from the scanned declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeDef>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, replacing any previous definition with the same name
    pub fn insert(&mut self, def: TypeDef) {
        self.types.insert(def.full_name.clone(), def);
    }

    pub fn get(&self, full_name: &str) -> Option<&TypeDef> {
        self.types.get(full_name)
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.types.contains_key(full_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Fully qualified names in catalog order
    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Find full names whose last path segments equal `written` (`Item`, `billing::Item`)
    pub fn find_by_suffix(&self, written: &str) -> Vec<&str> {
        let suffix = format!("::{}", written);
        self.types
            .keys()
            .filter(|name| name.as_str() == written || name.ends_with(&suffix))
            .map(String::as_str)
            .collect()
    }

    /// Define `T` as an object. A no-op if `T` is already defined, which is what stops
    /// recursive `define` calls on self-referential types.
    pub fn define_object<T: ?Sized>(&mut self, build: impl FnOnce(ObjectBuilder) -> ObjectBuilder) {
        let full_name = std::any::type_name::<T>();
        if self.contains(full_name) {
            return;
        }
        debug!("Defining object type: {}", full_name);

        // Placeholder first: field types may point back at T
        self.insert(TypeDef::object(full_name, Vec::new()));

        let builder = build(ObjectBuilder::default());
        let mut def = TypeDef::object(full_name, builder.fields);
        def.description = builder.description;
        self.insert(def);

        for define in builder.pending {
            define(self);
        }
    }

    /// Define `T` as a string enumeration
    pub fn define_enum<T: ?Sized>(&mut self, variants: &[&str]) {
        let full_name = std::any::type_name::<T>();
        if self.contains(full_name) {
            return;
        }
        debug!("Defining enum type: {}", full_name);
        self.insert(TypeDef::enumeration(
            full_name,
            variants.iter().map(|v| v.to_string()).collect(),
        ));
    }
}

/// Collects the fields of an object definition
#[derive(Default)]
pub struct ObjectBuilder {
    fields: Vec<FieldDef>,
    description: Option<String>,
    pending: Vec<fn(&mut TypeCatalog)>,
}

impl ObjectBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a field of type `F`
    pub fn field<F: Describe + ?Sized>(mut self, name: &str) -> Self {
        self.fields.push(FieldDef::new(name, F::type_ref()));
        self.pending.push(F::define);
        self
    }

    /// Add a field of type `F` with an explicit wire name
    pub fn renamed_field<F: Describe + ?Sized>(mut self, name: &str, rename: &str) -> Self {
        let mut field = FieldDef::new(name, F::type_ref());
        field.rename = Some(rename.to_string());
        self.fields.push(field);
        self.pending.push(F::define);
        self
    }

    /// Attach a description to the most recently added field
    pub fn with_description(mut self, description: &str) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.description = Some(description.to_string());
        }
        self
    }
}

/// Capability surface for types that can appear in a message payload.
pub trait Describe {
    /// How a field or payload of this type is referenced
    fn type_ref() -> TypeRef;

    /// Add this type (and anything it references) to the catalog
    fn define(types: &mut TypeCatalog) {
        let _ = types;
    }
}

macro_rules! describe_primitive {
    ($($ty:ty => $prim:ident),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::Primitive(PrimitiveType::$prim)
                }
            }
        )*
    };
}

describe_primitive! {
    String => String,
    str => String,
    char => Char,
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => U64,
    f32 => F32,
    f64 => F64,
}

impl Describe for serde_json::Value {
    fn type_ref() -> TypeRef {
        TypeRef::Any
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn define(types: &mut TypeCatalog) {
        T::define(types)
    }
}

impl<T: Describe> Describe for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::nullable(T::type_ref())
    }

    fn define(types: &mut TypeCatalog) {
        T::define(types)
    }
}

macro_rules! describe_sequence {
    ($($seq:ident),*) => {
        $(
            impl<T: Describe> Describe for $seq<T> {
                fn type_ref() -> TypeRef {
                    TypeRef::array(T::type_ref())
                }

                fn define(types: &mut TypeCatalog) {
                    T::define(types)
                }
            }
        )*
    };
}

describe_sequence!(Vec, BTreeSet, HashSet);

impl<T: Describe> Describe for [T] {
    fn type_ref() -> TypeRef {
        TypeRef::array(T::type_ref())
    }

    fn define(types: &mut TypeCatalog) {
        T::define(types)
    }
}

impl<T: Describe, S> Describe for HashMap<String, T, S> {
    fn type_ref() -> TypeRef {
        TypeRef::map(T::type_ref())
    }

    fn define(types: &mut TypeCatalog) {
        T::define(types)
    }
}

impl<T: Describe> Describe for BTreeMap<String, T> {
    fn type_ref() -> TypeRef {
        TypeRef::map(T::type_ref())
    }

    fn define(types: &mut TypeCatalog) {
        T::define(types)
    }
}

/// Split a fully qualified type name into (namespace, rest).
///
/// Generic arguments are ignored when looking for the last `::`, so
/// `a::Wrapper<b::Inner>` splits into `("a", "Wrapper<b::Inner>")`.
pub fn split_type_name(full_name: &str) -> (&str, &str) {
    let base_end = full_name.find('<').unwrap_or(full_name.len());
    match full_name[..base_end].rfind("::") {
        Some(pos) => (&full_name[..pos], &full_name[pos + 2..]),
        None => ("", full_name),
    }
}

/// Strip every module path from a type name: `a::Wrapper<b::Inner>` → `Wrapper<Inner>`
pub fn short_type_name(full_name: &str) -> String {
    let mut result = String::new();
    let mut token = String::new();

    let flush = |token: &mut String, result: &mut String| {
        let segment = token.rsplit("::").next().unwrap_or("");
        result.push_str(segment.trim());
        token.clear();
    };

    for ch in full_name.chars() {
        match ch {
            '<' | '>' | ',' | '[' | ']' | ';' | '(' | ')' | '&' => {
                flush(&mut token, &mut result);
                result.push(ch);
            }
            _ => token.push(ch),
        }
    }
    flush(&mut token, &mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node;

    impl Describe for Node {
        fn type_ref() -> TypeRef {
            TypeRef::named::<Self>()
        }

        fn define(types: &mut TypeCatalog) {
            types.define_object::<Self>(|object| {
                object
                    .field::<String>("name")
                    .field::<Vec<Node>>("children")
                    .field::<Option<Box<Node>>>("parent")
            });
        }
    }

    struct Ping;
    struct Pong;

    impl Describe for Ping {
        fn type_ref() -> TypeRef {
            TypeRef::named::<Self>()
        }

        fn define(types: &mut TypeCatalog) {
            types.define_object::<Self>(|object| object.field::<Pong>("pong"));
        }
    }

    impl Describe for Pong {
        fn type_ref() -> TypeRef {
            TypeRef::named::<Self>()
        }

        fn define(types: &mut TypeCatalog) {
            types.define_object::<Self>(|object| object.field::<Option<Ping>>("ping"));
        }
    }

    #[test]
    fn test_primitive_type_refs() {
        assert_eq!(String::type_ref(), TypeRef::Primitive(PrimitiveType::String));
        assert_eq!(u64::type_ref(), TypeRef::Primitive(PrimitiveType::U64));
        assert_eq!(f32::type_ref(), TypeRef::Primitive(PrimitiveType::F32));
        assert_eq!(bool::type_ref(), TypeRef::Primitive(PrimitiveType::Bool));
    }

    #[test]
    fn test_container_type_refs() {
        assert_eq!(
            Vec::<i32>::type_ref(),
            TypeRef::array(TypeRef::Primitive(PrimitiveType::I32))
        );
        assert_eq!(
            Option::<String>::type_ref(),
            TypeRef::nullable(TypeRef::Primitive(PrimitiveType::String))
        );
        assert_eq!(
            HashMap::<String, bool>::type_ref(),
            TypeRef::map(TypeRef::Primitive(PrimitiveType::Bool))
        );
        assert_eq!(Box::<u8>::type_ref(), TypeRef::Primitive(PrimitiveType::U8));
    }

    #[test]
    fn test_self_referential_define_terminates() {
        let mut types = TypeCatalog::new();
        Node::define(&mut types);

        assert_eq!(types.len(), 1);
        let def = types.get(std::any::type_name::<Node>()).unwrap();
        match &def.kind {
            TypeKind::Object(fields) => {
                assert_eq!(fields.len(), 3);
                assert_eq!(fields[1].ty, TypeRef::array(Node::type_ref()));
                assert!(fields[2].ty.is_nullable());
            }
            TypeKind::Enum(_) => panic!("Expected object type"),
        }
    }

    #[test]
    fn test_mutually_referential_define_terminates() {
        let mut types = TypeCatalog::new();
        Ping::define(&mut types);

        assert_eq!(types.len(), 2);
        assert!(types.contains(std::any::type_name::<Ping>()));
        assert!(types.contains(std::any::type_name::<Pong>()));
    }

    #[test]
    fn test_define_enum() {
        struct Status;
        let mut types = TypeCatalog::new();
        types.define_enum::<Status>(&["Active", "Inactive"]);

        let def = types.get(std::any::type_name::<Status>()).unwrap();
        assert_eq!(
            def.kind,
            TypeKind::Enum(vec!["Active".to_string(), "Inactive".to_string()])
        );
    }

    #[test]
    fn test_split_type_name() {
        assert_eq!(
            split_type_name("shop::orders::OrderPlaced"),
            ("shop::orders", "OrderPlaced")
        );
        assert_eq!(
            split_type_name("a::Wrapper<b::Inner>"),
            ("a", "Wrapper<b::Inner>")
        );
        assert_eq!(split_type_name("Plain"), ("", "Plain"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("shop::orders::OrderPlaced"), "OrderPlaced");
        assert_eq!(
            short_type_name("a::Wrapper<b::Inner, alloc::string::String>"),
            "Wrapper<Inner,String>"
        );
    }

    #[test]
    fn test_find_by_suffix() {
        let mut types = TypeCatalog::new();
        types.insert(TypeDef::object("crate::billing::Item", Vec::new()));
        types.insert(TypeDef::object("crate::shipping::Item", Vec::new()));

        assert_eq!(types.find_by_suffix("Item").len(), 2);
        assert_eq!(
            types.find_by_suffix("billing::Item"),
            vec!["crate::billing::Item"]
        );
        assert!(types.find_by_suffix("tem").is_empty());
    }
}
