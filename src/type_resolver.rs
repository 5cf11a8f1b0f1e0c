use crate::parser::ParsedFile;
use crate::types::{FieldDef, PrimitiveType, TypeCatalog, TypeDef, TypeKind, TypeRef};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use syn::punctuated::Punctuated;
use syn::visit::Visit;
use syn::Token;

/// Type resolver - turns struct and enum definitions found in source into a [`TypeCatalog`].
///
/// Every definition is keyed by its module-qualified name (`crate::orders::OrderPlaced`).
/// Field types are written relative to the module they appear in, so after collection each
/// field is linked: `use` imports, `crate::`/`self::`/`super::` prefixes and same-module
/// names are tried first, then a unique suffix match across the whole tree.
pub struct TypeResolver {
    catalog: TypeCatalog,
    imports: HashMap<String, BTreeMap<String, String>>,
}

/// Serde attributes that change how a field or variant appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeAttributes {
    /// Renamed field name
    pub rename: Option<String>,
    /// Whether to skip this field during serialization
    pub skip: bool,
}

struct RawDefinition {
    module_path: String,
    def: TypeDef,
}

/// Walks a file collecting definitions and imports, tracking inline `mod` blocks.
struct DefinitionCollector<'a> {
    module_stack: Vec<String>,
    definitions: &'a mut Vec<RawDefinition>,
    imports: &'a mut HashMap<String, BTreeMap<String, String>>,
}

impl DefinitionCollector<'_> {
    fn current_module(&self) -> String {
        self.module_stack.join("::")
    }
}

impl<'ast> Visit<'ast> for DefinitionCollector<'_> {
    fn visit_item_mod(&mut self, item_mod: &'ast syn::ItemMod) {
        if item_mod.content.is_some() {
            self.module_stack.push(item_mod.ident.to_string());
            syn::visit::visit_item_mod(self, item_mod);
            self.module_stack.pop();
        }
    }

    // Definitions inside function bodies are not nameable from outside.
    fn visit_item_fn(&mut self, _item_fn: &'ast syn::ItemFn) {}

    fn visit_item_impl(&mut self, _item_impl: &'ast syn::ItemImpl) {}

    fn visit_item_use(&mut self, item_use: &'ast syn::ItemUse) {
        let module = self.current_module();
        let mut found = Vec::new();
        collect_use_tree(&item_use.tree, String::new(), &mut found);
        let entry = self.imports.entry(module).or_default();
        for (alias, path) in found {
            entry.insert(alias, path);
        }
    }

    fn visit_item_struct(&mut self, item_struct: &'ast syn::ItemStruct) {
        let module_path = self.current_module();
        let def = TypeResolver::parse_struct_definition(&module_path, item_struct);
        self.definitions.push(RawDefinition { module_path, def });
    }

    fn visit_item_enum(&mut self, item_enum: &'ast syn::ItemEnum) {
        let module_path = self.current_module();
        let def = TypeResolver::parse_enum_definition(&module_path, item_enum);
        self.definitions.push(RawDefinition { module_path, def });
    }
}

fn collect_use_tree(tree: &syn::UseTree, prefix: String, found: &mut Vec<(String, String)>) {
    let join = |prefix: &str, ident: &str| {
        if prefix.is_empty() {
            ident.to_string()
        } else {
            format!("{}::{}", prefix, ident)
        }
    };

    match tree {
        syn::UseTree::Path(path) => {
            let next = join(&prefix, &path.ident.to_string());
            collect_use_tree(&path.tree, next, found);
        }
        syn::UseTree::Name(name) => {
            let ident = name.ident.to_string();
            if ident != "self" {
                found.push((ident.clone(), join(&prefix, &ident)));
            } else if let Some(last) = prefix.rsplit("::").next() {
                found.push((last.to_string(), prefix.clone()));
            }
        }
        syn::UseTree::Rename(rename) => {
            found.push((
                rename.rename.to_string(),
                join(&prefix, &rename.ident.to_string()),
            ));
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(item, prefix.clone(), found);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

impl TypeResolver {
    /// Collect and link every struct/enum definition in `parsed_files`
    pub fn new(parsed_files: &[ParsedFile]) -> Self {
        debug!("Initializing TypeResolver with {} files", parsed_files.len());

        let mut definitions = Vec::new();
        let mut imports = HashMap::new();
        for parsed_file in parsed_files {
            let mut collector = DefinitionCollector {
                module_stack: vec![parsed_file.module_path.clone()],
                definitions: &mut definitions,
                imports: &mut imports,
            };
            collector.visit_file(&parsed_file.syntax_tree);
        }

        let mut unlinked = TypeCatalog::new();
        for raw in &definitions {
            if unlinked.contains(&raw.def.full_name) {
                warn!("Duplicate type definition: {}", raw.def.full_name);
            }
            unlinked.insert(raw.def.clone());
        }

        let mut resolver = Self {
            catalog: unlinked,
            imports,
        };

        let mut linked = TypeCatalog::new();
        for raw in definitions {
            let mut def = raw.def;
            if let TypeKind::Object(fields) = &mut def.kind {
                for field in fields.iter_mut() {
                    field.ty = resolver.link(&field.ty, &raw.module_path);
                }
            }
            linked.insert(def);
        }
        resolver.catalog = linked;

        debug!("Resolved {} type definitions", resolver.catalog.len());
        resolver
    }

    /// Every definition found, fields linked to fully qualified names
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Resolve a type name as written in `from_module` to its definition
    pub fn resolve_type(&self, written: &str, from_module: &str) -> Option<&TypeDef> {
        self.resolve_name(written, from_module)
            .and_then(|full_name| self.catalog.get(&full_name))
    }

    /// Rewrite every written name in `ty` to the fully qualified name it refers to.
    ///
    /// Names that resolve to nothing are kept as written; the schema generator renders
    /// them as plain objects.
    pub fn link(&self, ty: &TypeRef, from_module: &str) -> TypeRef {
        match ty {
            TypeRef::Named(written) => match self.resolve_name(written, from_module) {
                Some(full_name) => TypeRef::Named(full_name),
                None => {
                    warn!("Could not resolve type {} from {}", written, from_module);
                    ty.clone()
                }
            },
            TypeRef::Array(inner) => TypeRef::array(self.link(inner, from_module)),
            TypeRef::Map(inner) => TypeRef::map(self.link(inner, from_module)),
            TypeRef::Nullable(inner) => TypeRef::nullable(self.link(inner, from_module)),
            TypeRef::Primitive(_) | TypeRef::Any => ty.clone(),
        }
    }

    /// Copy the definition of every type reachable from `ty` into `types`
    pub fn define_reachable(&self, ty: &TypeRef, types: &mut TypeCatalog) {
        let mut pending: Vec<String> = ty.named_types().into_iter().map(String::from).collect();

        while let Some(name) = pending.pop() {
            if types.contains(&name) {
                continue;
            }
            let Some(def) = self.catalog.get(&name) else {
                continue;
            };
            if let TypeKind::Object(fields) = &def.kind {
                for field in fields {
                    pending.extend(field.ty.named_types().into_iter().map(String::from));
                }
            }
            types.insert(def.clone());
        }
    }

    fn resolve_name(&self, written: &str, from_module: &str) -> Option<String> {
        let expanded = self.expand_import(written, from_module);

        if let Some(absolute) = absolute_path(&expanded, from_module) {
            if self.catalog.contains(&absolute) {
                return Some(absolute);
            }
        }

        let local = format!("{}::{}", from_module, expanded);
        if self.catalog.contains(&local) {
            return Some(local);
        }

        let bare = expanded
            .trim_start_matches("crate::")
            .trim_start_matches("self::")
            .trim_start_matches("super::");
        let candidates = self.catalog.find_by_suffix(bare);
        if candidates.len() > 1 {
            debug!(
                "Type {} is ambiguous from {}, using {}",
                written, from_module, candidates[0]
            );
        }
        candidates.first().map(|name| name.to_string())
    }

    fn expand_import(&self, written: &str, from_module: &str) -> String {
        let (head, tail) = match written.split_once("::") {
            Some((head, tail)) => (head, Some(tail)),
            None => (written, None),
        };

        let imported = self
            .imports
            .get(from_module)
            .and_then(|imports| imports.get(head));

        match (imported, tail) {
            (Some(path), Some(tail)) => {
                format!("{}::{}", absolute_path(path, from_module).unwrap_or_else(|| path.clone()), tail)
            }
            (Some(path), None) => absolute_path(path, from_module).unwrap_or_else(|| path.clone()),
            (None, _) => written.to_string(),
        }
    }

    /// Parse a struct definition into a TypeDef
    fn parse_struct_definition(module_path: &str, item_struct: &syn::ItemStruct) -> TypeDef {
        let full_name = format!("{}::{}", module_path, item_struct.ident);
        debug!("Parsing struct definition: {}", full_name);

        let generics = generic_params(&item_struct.generics);
        let mut fields = Vec::new();
        if let syn::Fields::Named(named_fields) = &item_struct.fields {
            for field in &named_fields.named {
                if let Some(field_def) = Self::parse_field(field, &generics) {
                    fields.push(field_def);
                }
            }
        }
        debug!("Parsed {} fields", fields.len());

        let mut def = TypeDef::object(full_name, fields);
        def.description = doc_comment(&item_struct.attrs);
        def
    }

    /// Parse an enum definition into a TypeDef
    fn parse_enum_definition(module_path: &str, item_enum: &syn::ItemEnum) -> TypeDef {
        let full_name = format!("{}::{}", module_path, item_enum.ident);
        debug!("Parsing enum definition: {}", full_name);

        let variants: Vec<String> = item_enum
            .variants
            .iter()
            .filter_map(|variant| {
                let serde_attrs = Self::parse_serde_attributes(&variant.attrs);
                if serde_attrs.skip {
                    return None;
                }
                if !matches!(variant.fields, syn::Fields::Unit) {
                    debug!("Variant {} carries data, listing its name only", variant.ident);
                }
                Some(serde_attrs.rename.unwrap_or_else(|| variant.ident.to_string()))
            })
            .collect();

        let mut def = TypeDef::enumeration(full_name, variants);
        def.description = doc_comment(&item_enum.attrs);
        def
    }

    /// Parse a single field; skipped fields yield `None`
    fn parse_field(field: &syn::Field, generics: &[String]) -> Option<FieldDef> {
        let field_name = field.ident.as_ref()?.to_string();
        let serde_attrs = Self::parse_serde_attributes(&field.attrs);
        if serde_attrs.skip {
            debug!("Skipping field: {}", field_name);
            return None;
        }

        let mut field_def = FieldDef::new(field_name, Self::extract_type_ref(&field.ty, generics));
        field_def.rename = serde_attrs.rename;
        field_def.description = doc_comment(&field.attrs);
        Some(field_def)
    }

    /// Parse Serde attributes from field or variant attributes
    pub fn parse_serde_attributes(attrs: &[syn::Attribute]) -> SerdeAttributes {
        let mut serde_attrs = SerdeAttributes::default();

        for attr in attrs {
            if !attr.path().is_ident("serde") {
                continue;
            }

            let Ok(items) = attr.parse_args_with(Punctuated::<syn::Meta, Token![,]>::parse_terminated)
            else {
                warn!("Ignoring unparseable serde attribute");
                continue;
            };

            for item in items {
                match item {
                    syn::Meta::Path(path) if path.is_ident("skip") || path.is_ident("skip_serializing") => {
                        serde_attrs.skip = true;
                    }
                    syn::Meta::NameValue(name_value) if name_value.path.is_ident("rename") => {
                        if let syn::Expr::Lit(syn::ExprLit {
                            lit: syn::Lit::Str(value),
                            ..
                        }) = &name_value.value
                        {
                            debug!("Found serde rename: {}", value.value());
                            serde_attrs.rename = Some(value.value());
                        }
                    }
                    syn::Meta::List(list) if list.path.is_ident("rename") => {
                        // rename(serialize = "..", deserialize = "..")
                        let nested = list.parse_args_with(
                            Punctuated::<syn::MetaNameValue, Token![,]>::parse_terminated,
                        );
                        for name_value in nested.into_iter().flatten() {
                            if !name_value.path.is_ident("serialize") {
                                continue;
                            }
                            if let syn::Expr::Lit(syn::ExprLit {
                                lit: syn::Lit::Str(value),
                                ..
                            }) = &name_value.value
                            {
                                serde_attrs.rename = Some(value.value());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        serde_attrs
    }

    /// Convert a written type into a TypeRef; struct/enum names stay as written.
    ///
    /// `generics` lists the enclosing item's type parameters, which become `Any`.
    pub fn extract_type_ref(ty: &syn::Type, generics: &[String]) -> TypeRef {
        match ty {
            syn::Type::Path(type_path) => Self::extract_type_ref_from_path(&type_path.path, generics),
            syn::Type::Reference(reference) => Self::extract_type_ref(&reference.elem, generics),
            syn::Type::Slice(slice) => TypeRef::array(Self::extract_type_ref(&slice.elem, generics)),
            syn::Type::Array(array) => TypeRef::array(Self::extract_type_ref(&array.elem, generics)),
            syn::Type::Paren(paren) => Self::extract_type_ref(&paren.elem, generics),
            syn::Type::Group(group) => Self::extract_type_ref(&group.elem, generics),
            _ => {
                debug!("Unsupported type form, treating as any");
                TypeRef::Any
            }
        }
    }

    fn extract_type_ref_from_path(path: &syn::Path, generics: &[String]) -> TypeRef {
        let Some(segment) = path.segments.last() else {
            return TypeRef::Any;
        };
        let type_name = segment.ident.to_string();
        let type_args: Vec<&syn::Type> = match &segment.arguments {
            syn::PathArguments::AngleBracketed(args) => args
                .args
                .iter()
                .filter_map(|arg| match arg {
                    syn::GenericArgument::Type(ty) => Some(ty),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let arg = |index: usize| {
            type_args
                .get(index)
                .map(|ty| Self::extract_type_ref(ty, generics))
                .unwrap_or(TypeRef::Any)
        };

        match type_name.as_str() {
            "Option" => TypeRef::nullable(arg(0)),
            "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" => TypeRef::array(arg(0)),
            "HashMap" | "BTreeMap" => TypeRef::map(arg(1)),
            "Box" | "Arc" | "Rc" | "Cow" => arg(0),
            "Value" => TypeRef::Any,
            _ => {
                if let Some(primitive) = PrimitiveType::from_name(&type_name) {
                    return TypeRef::Primitive(primitive);
                }
                if path.segments.len() == 1 && generics.contains(&type_name) {
                    return TypeRef::Any;
                }
                let written = path
                    .segments
                    .iter()
                    .map(|s| s.ident.to_string())
                    .collect::<Vec<_>>()
                    .join("::");
                TypeRef::Named(written)
            }
        }
    }
}

fn generic_params(generics: &syn::Generics) -> Vec<String> {
    generics
        .type_params()
        .map(|param| param.ident.to_string())
        .collect()
}

/// Resolve `crate::`, `self::` and `super::` prefixes against `from_module`
fn absolute_path(written: &str, from_module: &str) -> Option<String> {
    if written == "crate" || written.starts_with("crate::") {
        return Some(written.to_string());
    }
    if let Some(rest) = written.strip_prefix("self::") {
        return Some(format!("{}::{}", from_module, rest));
    }

    let mut module = from_module;
    let mut rest = written;
    let mut climbed = false;
    while let Some(next) = rest.strip_prefix("super::") {
        module = module.rsplit_once("::").map(|(parent, _)| parent).unwrap_or(module);
        rest = next;
        climbed = true;
    }
    climbed.then(|| format!("{}::{}", module, rest))
}

/// Concatenated `///` lines, or `None` if there are none
pub fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(syn::MetaNameValue {
                value:
                    syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(text),
                        ..
                    }),
                ..
            }) => Some(text.value().trim().to_string()),
            _ => None,
        })
        .collect();

    let joined = lines.join("\n").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}
