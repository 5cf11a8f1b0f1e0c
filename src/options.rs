//! Generation options.
//!
//! [`GeneratorOptions`] is built once per run and passed by reference to every stage;
//! nothing reads configuration from globals.

use crate::document::AsyncApiDocument;
use crate::filters::{ChannelFilter, DocumentFilter, Filter, OperationFilter};
use crate::types::{split_type_name, FieldDef, TypeDef};
use std::fmt;

/// Maps a type to its `components.schemas` id
pub type SchemaIdSelector = Box<dyn Fn(&TypeDef) -> String + Send + Sync>;

/// Maps a field to its property name
pub type PropertyNameSelector = Box<dyn Fn(&FieldDef) -> String + Send + Sync>;

pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Identifies a module to scan. The module and all of its sub-modules are included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerType {
    module_path: String,
}

impl MarkerType {
    /// The module `T` is defined in
    pub fn of<T: ?Sized>() -> Self {
        let (module_path, _) = split_type_name(std::any::type_name::<T>());
        Self {
            module_path: module_path.to_string(),
        }
    }

    /// A module named by path, e.g. `crate::orders`
    pub fn module(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
        }
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }
}

/// Immutable configuration for one generation run
pub struct GeneratorOptions {
    markers: Vec<MarkerType>,
    schema_id_selector: SchemaIdSelector,
    property_name_selector: PropertyNameSelector,
    filters: Vec<Filter>,
    base_document: AsyncApiDocument,
    max_depth: usize,
    default_content_type: Option<String>,
}

impl GeneratorOptions {
    pub fn builder() -> GeneratorOptionsBuilder {
        GeneratorOptionsBuilder::default()
    }

    /// Modules to scan, deduplicated
    pub fn markers(&self) -> &[MarkerType] {
        &self.markers
    }

    pub fn schema_id(&self, def: &TypeDef) -> String {
        (self.schema_id_selector)(def)
    }

    pub fn property_name(&self, field: &FieldDef) -> String {
        (self.property_name_selector)(field)
    }

    /// Filters in registration order
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn base_document(&self) -> &AsyncApiDocument {
        &self.base_document
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn default_content_type(&self) -> Option<&str> {
        self.default_content_type.as_deref()
    }
}

impl fmt::Debug for GeneratorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorOptions")
            .field("markers", &self.markers)
            .field("filters", &self.filters.len())
            .field("title", &self.base_document.info.title)
            .field("max_depth", &self.max_depth)
            .field("default_content_type", &self.default_content_type)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct GeneratorOptionsBuilder {
    markers: Vec<MarkerType>,
    schema_id_selector: Option<SchemaIdSelector>,
    property_name_selector: Option<PropertyNameSelector>,
    filters: Vec<Filter>,
    base_document: Option<AsyncApiDocument>,
    max_depth: Option<usize>,
    default_content_type: Option<String>,
}

impl GeneratorOptionsBuilder {
    pub fn marker(mut self, marker: MarkerType) -> Self {
        self.markers.push(marker);
        self
    }

    /// Scan the module `T` lives in
    pub fn marker_of<T: ?Sized>(self) -> Self {
        self.marker(MarkerType::of::<T>())
    }

    pub fn schema_id_selector(
        mut self,
        selector: impl Fn(&TypeDef) -> String + Send + Sync + 'static,
    ) -> Self {
        self.schema_id_selector = Some(Box::new(selector));
        self
    }

    pub fn property_name_selector(
        mut self,
        selector: impl Fn(&FieldDef) -> String + Send + Sync + 'static,
    ) -> Self {
        self.property_name_selector = Some(Box::new(selector));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn document_filter(self, filter: impl DocumentFilter + Send + Sync + 'static) -> Self {
        self.filter(Filter::Document(Box::new(filter)))
    }

    pub fn channel_filter(self, filter: impl ChannelFilter + Send + Sync + 'static) -> Self {
        self.filter(Filter::Channel(Box::new(filter)))
    }

    pub fn operation_filter(self, filter: impl OperationFilter + Send + Sync + 'static) -> Self {
        self.filter(Filter::Operation(Box::new(filter)))
    }

    /// Document the generated content is merged into
    pub fn base_document(mut self, document: AsyncApiDocument) -> Self {
        self.base_document = Some(document);
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = Some(content_type.into());
        self
    }

    pub fn build(self) -> GeneratorOptions {
        let mut markers = Vec::with_capacity(self.markers.len());
        for marker in self.markers {
            if !markers.contains(&marker) {
                markers.push(marker);
            }
        }

        GeneratorOptions {
            markers,
            schema_id_selector: self
                .schema_id_selector
                .unwrap_or_else(|| Box::new(default_schema_id) as SchemaIdSelector),
            property_name_selector: self
                .property_name_selector
                .unwrap_or_else(|| Box::new(default_property_name) as PropertyNameSelector),
            filters: self.filters,
            base_document: self.base_document.unwrap_or_default(),
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            default_content_type: self.default_content_type,
        }
    }
}

/// Short type name with generic arguments spelled out: `Page<Order>` → `PageOfOrder`,
/// `Pair<A, B>` → `PairOfAAndB`
pub fn default_schema_id(def: &TypeDef) -> String {
    spell_generics(&def.short_name())
}

pub(crate) fn spell_generics(name: &str) -> String {
    let Some(open) = name.find('<') else {
        return name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
    };
    let close = name.rfind('>').unwrap_or(name.len());
    let base = spell_generics(&name[..open]);
    let inner = &name[open + 1..close.max(open + 1)];

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(spell_generics(inner[start..i].trim()));
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(spell_generics(inner[start..].trim()));
    args.retain(|arg| !arg.is_empty());

    if args.is_empty() {
        base
    } else {
        format!("{}Of{}", base, args.join("And"))
    }
}

/// camelCase of the declared field name
pub fn default_property_name(field: &FieldDef) -> String {
    camel_case(&field.name)
}

/// Convert snake_case or PascalCase to camelCase
pub fn camel_case(name: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    let mut in_first_word = true;
    let chars: Vec<char> = name.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '_' {
            // A leading underscore does not start a new word
            capitalize_next = !result.is_empty();
            in_first_word = result.is_empty();
        } else if in_first_word {
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if ch.is_uppercase() && next_is_lower && !result.is_empty() {
                in_first_word = false;
                result.push(ch);
            } else {
                result.extend(ch.to_lowercase());
            }
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}
