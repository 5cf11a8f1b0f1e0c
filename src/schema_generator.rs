use crate::document::SCHEMA_REF_PREFIX;
use crate::error::{Error, Result};
use crate::options::GeneratorOptions;
use crate::schema_resolver::SchemaResolver;
use crate::types::{FieldDef, PrimitiveType, TypeCatalog, TypeDef, TypeKind, TypeRef};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON Schema fragment as used by AsyncAPI 2.x payloads and headers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Reference to another schema
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "float", "double")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object types
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    /// Required property names, in field order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Items schema for array types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for string-keyed maps, or `true`/`false`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    /// Enum values for enum types
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

/// `additionalProperties` in either of its JSON Schema forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

impl Schema {
    /// `{"type": schema_type}`
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    /// `{"$ref": "#/components/schemas/<id>"}`
    pub fn reference(id: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, id)),
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::typed("array")
        }
    }

    pub fn map(values: Schema) -> Self {
        Self {
            additional_properties: Some(AdditionalProperties::Schema(Box::new(values))),
            ..Self::typed("object")
        }
    }

    /// Schema id this fragment points at, if it is a `components.schemas` reference
    pub fn referenced_id(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(SCHEMA_REF_PREFIX))
    }

    /// Push every `$ref` below (and including) this node with its location
    pub fn collect_references(&self, location: &str, found: &mut Vec<(String, String)>) {
        if let Some(reference) = &self.reference {
            found.push((reference.clone(), location.to_string()));
        }
        for (name, property) in &self.properties {
            property.collect_references(&format!("{}/properties/{}", location, name), found);
        }
        if let Some(items) = &self.items {
            items.collect_references(&format!("{}/items", location), found);
        }
        if let Some(AdditionalProperties::Schema(values)) = &self.additional_properties {
            values.collect_references(&format!("{}/additionalProperties", location), found);
        }
    }
}

/// Schema generator - converts catalog types to JSON Schema fragments.
///
/// Object types with at least one field are registered in the [`SchemaResolver`] and
/// referenced with `$ref`; primitives, enums and field-less types are inlined.
pub struct SchemaGenerator<'a> {
    types: &'a TypeCatalog,
    resolver: &'a mut SchemaResolver,
    options: &'a GeneratorOptions,
    /// Named object types currently being resolved
    depth: usize,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(
        types: &'a TypeCatalog,
        resolver: &'a mut SchemaResolver,
        options: &'a GeneratorOptions,
    ) -> Self {
        debug!("Initializing SchemaGenerator over {} types", types.len());
        Self {
            types,
            resolver,
            options,
            depth: 0,
        }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        self.resolver
    }

    pub fn types(&self) -> &TypeCatalog {
        self.types
    }

    /// Generate a schema for a TypeRef
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaDepthExceeded`] when more than `max_depth` distinct object
    /// types are nested inside each other.
    pub fn generate(&mut self, ty: &TypeRef) -> Result<Schema> {
        match ty {
            TypeRef::Primitive(primitive) => Ok(Self::primitive_to_schema(*primitive)),
            TypeRef::Array(inner) => Ok(Schema::array(self.generate(inner)?)),
            TypeRef::Map(inner) => Ok(Schema::map(self.generate(inner)?)),
            // Optionality is expressed by leaving the field out of `required`
            TypeRef::Nullable(inner) => self.generate(inner),
            TypeRef::Any => Ok(Schema::default()),
            TypeRef::Named(name) => self.generate_named(name),
        }
    }

    /// Convert a primitive type to a schema
    pub fn primitive_to_schema(primitive: PrimitiveType) -> Schema {
        let (schema_type, format) = match primitive {
            PrimitiveType::String | PrimitiveType::Char => ("string", None),
            PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 => {
                ("integer", Some("int32"))
            }
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 => {
                ("integer", Some("int32"))
            }
            PrimitiveType::I64 | PrimitiveType::I128 => ("integer", Some("int64")),
            PrimitiveType::U64 | PrimitiveType::U128 => ("integer", Some("int64")),
            PrimitiveType::F32 => ("number", Some("float")),
            PrimitiveType::F64 => ("number", Some("double")),
            PrimitiveType::Bool => ("boolean", None),
        };

        Schema {
            format: format.map(str::to_string),
            ..Schema::typed(schema_type)
        }
    }

    fn generate_named(&mut self, name: &str) -> Result<Schema> {
        let types = self.types;
        let Some(def) = types.get(name) else {
            debug!("Unknown type: {}, using object placeholder", name);
            return Ok(Schema::typed("object"));
        };

        match &def.kind {
            TypeKind::Enum(variants) => Ok(Schema {
                description: def.description.clone(),
                enum_values: variants.clone(),
                ..Schema::typed("string")
            }),
            TypeKind::Object(fields) if fields.is_empty() => Ok(Schema {
                description: def.description.clone(),
                ..Schema::typed("object")
            }),
            TypeKind::Object(fields) => {
                if let Some(id) = self.resolver.id_for(name) {
                    return Ok(Schema::reference(id));
                }
                if self.depth >= self.options.max_depth() {
                    return Err(Error::SchemaDepthExceeded {
                        type_name: name.to_string(),
                        max_depth: self.options.max_depth(),
                    });
                }

                let preferred = self.options.schema_id(def);
                let id = self.resolver.reserve(def, &preferred);
                debug!("Generating object schema {} for {}", id, name);

                self.depth += 1;
                let schema = self.object_schema(def, fields);
                self.depth -= 1;

                self.resolver.finalize(&id, schema?);
                Ok(Schema::reference(&id))
            }
        }
    }

    fn object_schema(&mut self, def: &TypeDef, fields: &[FieldDef]) -> Result<Schema> {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for field in fields {
            let property_name = field
                .rename
                .clone()
                .unwrap_or_else(|| self.options.property_name(field));

            let mut property = self.generate(&field.ty)?;
            if property.reference.is_none() {
                if let Some(description) = &field.description {
                    property.description = Some(description.clone());
                }
            }

            if properties.contains_key(&property_name) {
                warn!(
                    "{}: field {} serializes as {}, which another field already uses; keeping the later one",
                    def.full_name, field.name, property_name
                );
                required.retain(|name| name != &property_name);
            }
            if !field.ty.is_nullable() {
                required.push(property_name.clone());
            }
            properties.insert(property_name, property);
        }

        Ok(Schema {
            description: def.description.clone(),
            properties,
            required,
            ..Schema::typed("object")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MarkerType;
    use crate::types::{Describe, FieldDef};
    use pretty_assertions::assert_eq;

    fn options() -> GeneratorOptions {
        GeneratorOptions::builder()
            .marker(MarkerType::module("crate"))
            .build()
    }

    fn string() -> TypeRef {
        TypeRef::Primitive(PrimitiveType::String)
    }

    fn catalog(defs: Vec<TypeDef>) -> TypeCatalog {
        let mut types = TypeCatalog::new();
        for def in defs {
            types.insert(def);
        }
        types
    }

    fn named(name: &str) -> TypeRef {
        TypeRef::Named(name.to_string())
    }

    #[test]
    fn test_primitive_schemas() {
        let cases = [
            (PrimitiveType::String, "string", None),
            (PrimitiveType::I32, "integer", Some("int32")),
            (PrimitiveType::U64, "integer", Some("int64")),
            (PrimitiveType::F32, "number", Some("float")),
            (PrimitiveType::F64, "number", Some("double")),
            (PrimitiveType::Bool, "boolean", None),
        ];

        for (primitive, schema_type, format) in cases {
            let schema = SchemaGenerator::primitive_to_schema(primitive);
            assert_eq!(schema.schema_type.as_deref(), Some(schema_type));
            assert_eq!(schema.format.as_deref(), format);
        }
    }

    #[test]
    fn test_containers() {
        let types = TypeCatalog::new();
        let options = options();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);

        let array = generator.generate(&TypeRef::array(string())).unwrap();
        assert_eq!(array, Schema::array(Schema::typed("string")));

        let map = generator
            .generate(&TypeRef::map(TypeRef::Primitive(PrimitiveType::Bool)))
            .unwrap();
        assert_eq!(map, Schema::map(Schema::typed("boolean")));

        let optional = generator.generate(&TypeRef::nullable(string())).unwrap();
        assert_eq!(optional, Schema::typed("string"));

        assert_eq!(generator.generate(&TypeRef::Any).unwrap(), Schema::default());
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_object_schema_is_registered_and_referenced() {
        let mut id = FieldDef::new("order_id", string());
        id.description = Some("Order identifier".to_string());
        let mut note = FieldDef::new("note", TypeRef::nullable(string()));
        note.rename = Some("customer_note".to_string());
        let total = FieldDef::new("total", TypeRef::Primitive(PrimitiveType::F64));

        let types = catalog(vec![TypeDef::object("shop::Order", vec![id, note, total])]);
        let options = options();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);

        let schema = generator.generate(&named("shop::Order")).unwrap();
        assert_eq!(schema, Schema::reference("Order"));

        let order = resolver.get("Order").unwrap();
        assert_eq!(order.schema_type.as_deref(), Some("object"));
        assert_eq!(
            order.properties.keys().collect::<Vec<_>>(),
            vec!["customer_note", "orderId", "total"]
        );
        assert_eq!(order.required, vec!["orderId", "total"]);
        assert_eq!(
            order.properties["orderId"].description.as_deref(),
            Some("Order identifier")
        );
    }

    #[test]
    fn test_clashing_property_names_keep_later_field() {
        let id = FieldDef::new("id", TypeRef::Primitive(PrimitiveType::U64));
        let mut legacy = FieldDef::new("legacy_id", TypeRef::nullable(string()));
        legacy.rename = Some("id".to_string());
        let mut external = FieldDef::new("external_id", string());
        external.rename = Some("id".to_string());

        let types = catalog(vec![TypeDef::object(
            "shop::Order",
            vec![id, legacy, external],
        )]);
        let options = options();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);
        generator.generate(&named("shop::Order")).unwrap();

        let order = resolver.get("Order").unwrap();
        assert_eq!(order.properties.len(), 1);
        assert_eq!(order.properties["id"].schema_type.as_deref(), Some("string"));
        assert_eq!(order.required, vec!["id"]);
    }

    #[test]
    fn test_enums_and_empty_objects_are_inlined() {
        let types = catalog(vec![
            TypeDef::enumeration("shop::Status", vec!["Open".to_string(), "Closed".to_string()]),
            TypeDef::object("shop::Ping", Vec::new()),
        ]);
        let options = options();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);

        let status = generator.generate(&named("shop::Status")).unwrap();
        assert_eq!(status.schema_type.as_deref(), Some("string"));
        assert_eq!(status.enum_values, vec!["Open", "Closed"]);

        let ping = generator.generate(&named("shop::Ping")).unwrap();
        assert_eq!(ping, Schema::typed("object"));

        let unknown = generator.generate(&named("chrono::DateTime")).unwrap();
        assert_eq!(unknown, Schema::typed("object"));

        assert!(resolver.is_empty());
    }

    struct Category;

    impl Describe for Category {
        fn type_ref() -> TypeRef {
            TypeRef::named::<Self>()
        }

        fn define(types: &mut TypeCatalog) {
            types.define_object::<Self>(|object| {
                object
                    .field::<String>("name")
                    .field::<Vec<Category>>("children")
                    .field::<Option<Box<Category>>>("parent")
            });
        }
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut types = TypeCatalog::new();
        Category::define(&mut types);
        let options = options();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);

        let schema = generator.generate(&Category::type_ref()).unwrap();
        assert_eq!(schema, Schema::reference("Category"));

        let schemas = resolver.schemas().unwrap();
        assert_eq!(schemas.len(), 1);
        let category = &schemas["Category"];
        assert_eq!(
            category.properties["children"],
            Schema::array(Schema::reference("Category"))
        );
        assert_eq!(category.properties["parent"], Schema::reference("Category"));
        assert_eq!(category.required, vec!["name", "children"]);
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let types = catalog(vec![
            TypeDef::object("a::Ping", vec![FieldDef::new("pong", named("a::Pong"))]),
            TypeDef::object(
                "a::Pong",
                vec![FieldDef::new("ping", TypeRef::nullable(named("a::Ping")))],
            ),
        ]);
        let options = options();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);

        generator.generate(&named("a::Ping")).unwrap();

        let schemas = resolver.schemas().unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas["Ping"].properties["pong"], Schema::reference("Pong"));
        assert_eq!(schemas["Pong"].properties["ping"], Schema::reference("Ping"));
    }

    #[test]
    fn test_depth_limit() {
        let defs = (0..5)
            .map(|i| {
                TypeDef::object(
                    format!("deep::Level{}", i),
                    vec![FieldDef::new("next", named(&format!("deep::Level{}", i + 1)))],
                )
            })
            .collect();
        let types = catalog(defs);
        let options = GeneratorOptions::builder()
            .marker(MarkerType::module("deep"))
            .max_depth(3)
            .build();
        let mut resolver = SchemaResolver::new();
        let mut generator = SchemaGenerator::new(&types, &mut resolver, &options);

        let err = generator.generate(&named("deep::Level0")).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaDepthExceeded { ref type_name, max_depth: 3 } if type_name == "deep::Level3"
        ));
    }

    #[test]
    fn test_collect_references() {
        let mut schema = Schema::typed("object");
        schema
            .properties
            .insert("items".to_string(), Schema::array(Schema::reference("Item")));
        schema
            .properties
            .insert("meta".to_string(), Schema::map(Schema::reference("Meta")));

        let mut found = Vec::new();
        schema.collect_references("/root", &mut found);

        assert_eq!(
            found,
            vec![
                (
                    "#/components/schemas/Item".to_string(),
                    "/root/properties/items/items".to_string()
                ),
                (
                    "#/components/schemas/Meta".to_string(),
                    "/root/properties/meta/additionalProperties".to_string()
                ),
            ]
        );
        assert_eq!(Schema::reference("Item").referenced_id(), Some("Item"));
    }
}
