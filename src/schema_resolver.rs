use crate::document::SCHEMA_REF_PREFIX;
use crate::error::{Error, Result};
use crate::schema_generator::Schema;
use crate::types::TypeDef;
use log::debug;
use std::collections::BTreeMap;

/// The `components.schemas` table of one generation run.
///
/// Identifiers go through two states: [`reserve`](Self::reserve) claims one before a
/// type's fields are walked, [`finalize`](Self::finalize) stores the finished fragment.
/// A type that is reached again while still reserved gets a `$ref` to its reserved id,
/// which is how recursive type graphs terminate.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    /// Fully qualified type name → schema id
    ids: BTreeMap<String, String>,
    slots: BTreeMap<String, Slot>,
    /// Type names in the order they were first reserved
    discovered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Reserved,
    Finalized(Schema),
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `schemas` as already-finalized entries with no source type.
    ///
    /// Used to seed a run with the base document's schemas and to resolve `$ref`s
    /// in parsed documents.
    pub fn from_components(schemas: &BTreeMap<String, Schema>) -> Self {
        let slots = schemas
            .iter()
            .map(|(id, schema)| (id.clone(), Slot::Finalized(schema.clone())))
            .collect();
        Self {
            ids: BTreeMap::new(),
            slots,
            discovered: Vec::new(),
        }
    }

    /// Schema id assigned to a type, reserved or finalized
    pub fn id_for(&self, type_name: &str) -> Option<&str> {
        self.ids.get(type_name).map(String::as_str)
    }

    /// Claim an identifier for `def`, starting from `preferred`.
    ///
    /// If `preferred` is taken by another type, trailing namespace segments are appended
    /// one at a time (`Item_billing`, `Item_shop_billing`, ...), then a counter. The first
    /// claimant always keeps the bare id, so the outcome only depends on claim order.
    pub fn reserve(&mut self, def: &TypeDef, preferred: &str) -> String {
        if let Some(id) = self.ids.get(&def.full_name) {
            return id.clone();
        }

        let id = self.disambiguate(preferred, def.namespace());
        if id != preferred {
            debug!(
                "Schema id {} is taken, using {} for {}",
                preferred, id, def.full_name
            );
        }

        self.ids.insert(def.full_name.clone(), id.clone());
        self.slots.insert(id.clone(), Slot::Reserved);
        self.discovered.push(def.full_name.clone());
        id
    }

    fn disambiguate(&self, preferred: &str, namespace: &str) -> String {
        if !self.slots.contains_key(preferred) {
            return preferred.to_string();
        }

        let segments: Vec<&str> = namespace
            .split("::")
            .filter(|segment| !segment.is_empty())
            .collect();
        for take in 1..=segments.len() {
            let suffix = segments[segments.len() - take..].join("_");
            let candidate = format!("{}_{}", preferred, suffix);
            if !self.slots.contains_key(&candidate) {
                return candidate;
            }
        }

        let mut counter = 2;
        loop {
            let candidate = format!("{}_{}", preferred, counter);
            if !self.slots.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Store the finished fragment for a reserved id
    pub fn finalize(&mut self, id: &str, schema: Schema) {
        debug!("Finalized schema {}", id);
        self.slots.insert(id.to_string(), Slot::Finalized(schema));
    }

    pub fn is_finalized(&self, id: &str) -> bool {
        matches!(self.slots.get(id), Some(Slot::Finalized(_)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Finalized fragment for `id`
    pub fn get(&self, id: &str) -> Option<&Schema> {
        match self.slots.get(id) {
            Some(Slot::Finalized(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Follow a `#/components/schemas/<id>` reference
    pub fn resolve_ref(&self, reference: &str) -> Option<&Schema> {
        reference
            .strip_prefix(SCHEMA_REF_PREFIX)
            .and_then(|id| self.get(id))
    }

    /// Types that were given a schema id, in discovery order
    pub fn discovered_types(&self) -> &[String] {
        &self.discovered
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The finished table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedSchema`] if any id is still only reserved.
    pub fn schemas(&self) -> Result<BTreeMap<String, Schema>> {
        self.slots
            .iter()
            .map(|(id, slot)| match slot {
                Slot::Finalized(schema) => Ok((id.clone(), schema.clone())),
                Slot::Reserved => Err(Error::UnresolvedSchema(id.clone())),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(full_name: &str) -> TypeDef {
        TypeDef::object(full_name, Vec::new())
    }

    #[test]
    fn test_reserve_is_stable_per_type() {
        let mut resolver = SchemaResolver::new();
        let first = resolver.reserve(&def("shop::Order"), "Order");
        let again = resolver.reserve(&def("shop::Order"), "Order");

        assert_eq!(first, "Order");
        assert_eq!(again, "Order");
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.discovered_types(), ["shop::Order".to_string()]);
    }

    #[test]
    fn test_collisions_append_namespace_segments() {
        let mut resolver = SchemaResolver::new();
        let a = resolver.reserve(&def("crate::shipping::Item"), "Item");
        let b = resolver.reserve(&def("crate::billing::Item"), "Item");
        let c = resolver.reserve(&def("crate::legacy::billing::Item"), "Item");
        let d = resolver.reserve(&def("Item"), "Item");

        assert_eq!(a, "Item");
        assert_eq!(b, "Item_billing");
        assert_eq!(c, "Item_legacy_billing");
        assert_eq!(d, "Item_2");
    }

    #[test]
    fn test_seeded_components_are_not_reused() {
        let mut seeded = BTreeMap::new();
        seeded.insert("Order".to_string(), Schema::typed("object"));
        let mut resolver = SchemaResolver::from_components(&seeded);

        let id = resolver.reserve(&def("crate::shop::Order"), "Order");
        assert_eq!(id, "Order_shop");
        assert!(resolver.resolve_ref("#/components/schemas/Order").is_some());
    }

    #[test]
    fn test_schemas_fail_while_reserved() {
        let mut resolver = SchemaResolver::new();
        let id = resolver.reserve(&def("shop::Node"), "Node");

        assert!(matches!(
            resolver.schemas(),
            Err(Error::UnresolvedSchema(ref pending)) if pending == "Node"
        ));
        assert!(resolver.resolve_ref("#/components/schemas/Node").is_none());

        resolver.finalize(&id, Schema::typed("object"));
        assert!(resolver.is_finalized("Node"));
        assert_eq!(resolver.schemas().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_ref_requires_schema_prefix() {
        let mut seeded = BTreeMap::new();
        seeded.insert("Order".to_string(), Schema::typed("object"));
        let resolver = SchemaResolver::from_components(&seeded);

        assert!(resolver.resolve_ref("#/components/messages/Order").is_none());
        assert!(resolver.resolve_ref("Order").is_none());
    }
}
