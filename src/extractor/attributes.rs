//! Declaration discovery from annotated source.
//!
//! Parses every `.rs` file of a project with `syn` and reads the attribute set
//!
//! ```ignore
//! #[server("production", url = "kafka.example.com:9092", protocol = "kafka")]
//! pub struct Broker;
//!
//! /// Order lifecycle events
//! #[message(name = "orderPlaced", content_type = "application/json")]
//! pub struct OrderPlaced { pub id: String, pub total: f64 }
//!
//! #[channel("orders", servers("production"))]
//! #[publish(operation_id = "placeOrder", message = OrderPlaced, tags("orders"))]
//! pub struct OrderService;
//! ```
//!
//! from structs, enums, free functions and methods in impl blocks. Payload types named in
//! `message = ..` are looked up through the [`TypeResolver`], so the same module rules
//! as ordinary Rust name lookup apply.

use super::DeclarationExtractor;
use crate::declaration::{
    ChannelDeclaration, Declaration, Direction, MessageDeclaration, OperationDeclaration,
    Origin, ServerDeclaration,
};
use crate::document::Server;
use crate::files::SourceTree;
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::ModuleSet;
use crate::type_resolver::{doc_comment, TypeResolver};
use crate::types::{TypeCatalog, TypeRef};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::visit::Visit;
use syn::{LitStr, Token};

const ATTRIBUTE_NAMES: [&str; 5] = ["channel", "publish", "subscribe", "message", "server"];

/// Extractor over the annotated source of one project
pub struct AttributeExtractor {
    parsed_files: Vec<ParsedFile>,
    resolver: TypeResolver,
}

impl AttributeExtractor {
    pub fn new(parsed_files: Vec<ParsedFile>) -> Self {
        let resolver = TypeResolver::new(&parsed_files);
        Self {
            parsed_files,
            resolver,
        }
    }

    /// Walk and parse every source file under `root`.
    ///
    /// Files that fail to parse are logged and left out.
    pub fn from_project(root: &Path) -> Result<Self> {
        let tree = SourceTree::new(root.to_path_buf());
        let listing = tree
            .walk()
            .with_context(|| format!("Failed to scan project directory: {}", root.display()))?;
        info!("Found {} Rust files", listing.rust_files.len());

        let parsed_files: Vec<ParsedFile> = AstParser::parse_files(root, &listing.rust_files)
            .into_iter()
            .filter_map(|result| result.ok())
            .collect();
        info!("Parsed {} files", parsed_files.len());

        Ok(Self::new(parsed_files))
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Message metadata declared with `#[message]`, keyed by payload type
    fn message_templates(&self, items: &[AnnotatedItem]) -> HashMap<String, MessageDeclaration> {
        let mut templates = HashMap::new();

        for item in items {
            let Some(self_type) = &item.self_type else {
                continue;
            };
            for (name, args) in &item.attributes {
                if name == "message" {
                    let message = self.message_from_args(item, args, TypeRef::Named(self_type.clone()));
                    templates.insert(self_type.clone(), message);
                }
            }
        }

        templates
    }

    fn message_from_args(
        &self,
        item: &AnnotatedItem,
        args: &AttributeArgs,
        payload: TypeRef,
    ) -> MessageDeclaration {
        let mut message = MessageDeclaration::with_payload(payload);
        message.name = args.string("name").or_else(|| args.positional.clone());
        message.title = args.string("title");
        message.summary = args.string("summary");
        message.description = args.string("description").or_else(|| item.doc.clone());
        message.content_type = args.string("content_type");
        message.headers = args
            .types("headers")
            .first()
            .map(|ty| self.link(ty, &item.module_path));
        if let Some(location) = args.string("correlation_id") {
            message = message.correlation_id(location);
        }
        for tag in args.list("tags") {
            message = message.tag(tag);
        }
        message
    }

    fn link(&self, ty: &syn::Type, module_path: &str) -> TypeRef {
        self.resolver
            .link(&TypeResolver::extract_type_ref(ty, &[]), module_path)
    }

    fn operation_from_args(
        &self,
        item: &AnnotatedItem,
        direction: Direction,
        args: &AttributeArgs,
        channel: Option<&str>,
        templates: &HashMap<String, MessageDeclaration>,
    ) -> Option<OperationDeclaration> {
        let Some(channel) = args
            .string("channel")
            .or_else(|| args.positional.clone())
            .or_else(|| channel.map(str::to_string))
        else {
            warn!("{} operation on {} names no channel, skipping", direction, item.origin);
            return None;
        };

        let mut operation = OperationDeclaration::new(channel, direction);
        operation.origin = item.origin.clone();
        operation.operation_id = args.string("operation_id");
        operation.summary = args.string("summary");
        operation.description = args.string("description").or_else(|| item.doc.clone());
        for tag in args.list("tags") {
            operation = operation.tag(tag);
        }

        let mut payloads: Vec<TypeRef> = args
            .types("message")
            .into_iter()
            .map(|ty| self.link(ty, &item.module_path))
            .collect();
        if payloads.is_empty() {
            payloads.extend(item.implied_payload(&self.resolver));
        }

        for payload in payloads {
            let mut message = match &payload {
                TypeRef::Named(name) => templates
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| MessageDeclaration::with_payload(payload.clone())),
                _ => MessageDeclaration::with_payload(payload.clone()),
            };
            message.origin = item.origin.clone();
            operation = operation.message(message);
        }

        if operation.messages.is_empty() {
            debug!("{} operation on {} carries no message", direction, item.origin);
        }
        Some(operation)
    }

    fn declarations_for(
        &self,
        item: &AnnotatedItem,
        templates: &HashMap<String, MessageDeclaration>,
    ) -> Vec<Declaration> {
        let mut declarations = Vec::new();

        let channel_name = item
            .attributes
            .iter()
            .find(|(name, _)| name == "channel")
            .and_then(|(_, args)| args.positional.clone().or_else(|| args.string("name")));

        for (name, args) in &item.attributes {
            match name.as_str() {
                "channel" => {
                    let Some(channel_name) = &channel_name else {
                        warn!("#[channel] on {} has no name, skipping", item.origin);
                        continue;
                    };
                    let mut channel = ChannelDeclaration::new(channel_name.clone());
                    channel.origin = item.origin.clone();
                    channel.description = args.string("description").or_else(|| item.doc.clone());
                    for server in args.list("servers") {
                        channel = channel.server(server);
                    }
                    declarations.push(Declaration::Channel(channel));
                }
                "publish" | "subscribe" => {
                    let direction = if name == "publish" {
                        Direction::Publish
                    } else {
                        Direction::Subscribe
                    };
                    if let Some(operation) = self.operation_from_args(
                        item,
                        direction,
                        args,
                        channel_name.as_deref(),
                        templates,
                    ) {
                        declarations.push(Declaration::Operation(operation));
                    }
                }
                "message" => {
                    let Some(self_type) = &item.self_type else {
                        warn!("#[message] on {} is not on a type, skipping", item.origin);
                        continue;
                    };
                    let mut message = templates.get(self_type).cloned().unwrap_or_else(|| {
                        self.message_from_args(item, args, TypeRef::Named(self_type.clone()))
                    });
                    message.origin = item.origin.clone();
                    declarations.push(Declaration::Message(message));
                }
                "server" => {
                    let (Some(server_name), Some(url), Some(protocol)) = (
                        args.positional.clone().or_else(|| args.string("name")),
                        args.string("url"),
                        args.string("protocol"),
                    ) else {
                        warn!("#[server] on {} needs a name, url and protocol", item.origin);
                        continue;
                    };
                    let mut server = Server::new(url, protocol);
                    server.protocol_version = args.string("protocol_version");
                    server.description = args.string("description");
                    let mut declaration = ServerDeclaration::new(server_name, server);
                    declaration.origin = item.origin.clone();
                    declarations.push(Declaration::Server(declaration));
                }
                _ => {}
            }
        }

        declarations
    }
}

impl DeclarationExtractor for AttributeExtractor {
    fn extract(&self, modules: &ModuleSet, types: &mut TypeCatalog) -> Vec<Declaration> {
        let mut visitor = AnnotationVisitor::default();
        for parsed_file in &self.parsed_files {
            visitor.module_stack = vec![parsed_file.module_path.clone()];
            visitor.visit_file(&parsed_file.syntax_tree);
        }
        debug!("Found {} annotated items", visitor.items.len());

        let templates = self.message_templates(&visitor.items);

        let mut declarations = Vec::new();
        for item in &visitor.items {
            if !modules.contains(&item.module_path) {
                continue;
            }
            for declaration in self.declarations_for(item, &templates) {
                for type_name in declaration.referenced_types() {
                    self.resolver
                        .define_reachable(&TypeRef::Named(type_name.to_string()), types);
                }
                declarations.push(declaration);
            }
        }

        debug!("Source yielded {} declarations", declarations.len());
        declarations
    }
}

/// One element carrying at least one recognised attribute
#[derive(Debug)]
struct AnnotatedItem {
    module_path: String,
    origin: Origin,
    /// Full name of the annotated struct/enum, if the element is one
    self_type: Option<String>,
    /// First typed argument of an annotated function
    first_argument: Option<syn::Type>,
    doc: Option<String>,
    attributes: Vec<(String, AttributeArgs)>,
}

impl AnnotatedItem {
    /// Payload used when an operation names no message: the annotated type itself, or
    /// the first argument of an annotated function.
    fn implied_payload(&self, resolver: &TypeResolver) -> Option<TypeRef> {
        if let Some(self_type) = &self.self_type {
            return Some(TypeRef::Named(self_type.clone()));
        }
        self.first_argument.as_ref().map(|ty| {
            resolver.link(&TypeResolver::extract_type_ref(ty, &[]), &self.module_path)
        })
    }
}

#[derive(Default)]
struct AnnotationVisitor {
    module_stack: Vec<String>,
    items: Vec<AnnotatedItem>,
}

impl AnnotationVisitor {
    fn current_module(&self) -> String {
        self.module_stack.join("::")
    }

    fn record(
        &mut self,
        origin: Origin,
        self_type: Option<String>,
        first_argument: Option<syn::Type>,
        attrs: &[syn::Attribute],
    ) {
        let attributes = recognised_attributes(attrs, &origin);
        if attributes.is_empty() {
            return;
        }
        debug!("Found {} annotations on {}", attributes.len(), origin);

        self.items.push(AnnotatedItem {
            module_path: self.current_module(),
            origin,
            self_type,
            first_argument,
            doc: doc_comment(attrs),
            attributes,
        });
    }

    fn record_type(&mut self, ident: &syn::Ident, attrs: &[syn::Attribute]) {
        let module_path = self.current_module();
        let full_name = format!("{}::{}", module_path, ident);
        let origin = Origin::new(module_path, full_name.clone());
        self.record(origin, Some(full_name), None, attrs);
    }
}

impl<'ast> Visit<'ast> for AnnotationVisitor {
    fn visit_item_mod(&mut self, item_mod: &'ast syn::ItemMod) {
        if item_mod.content.is_some() {
            self.module_stack.push(item_mod.ident.to_string());
            syn::visit::visit_item_mod(self, item_mod);
            self.module_stack.pop();
        }
    }

    fn visit_item_struct(&mut self, item_struct: &'ast syn::ItemStruct) {
        self.record_type(&item_struct.ident, &item_struct.attrs);
    }

    fn visit_item_enum(&mut self, item_enum: &'ast syn::ItemEnum) {
        self.record_type(&item_enum.ident, &item_enum.attrs);
    }

    fn visit_item_fn(&mut self, item_fn: &'ast syn::ItemFn) {
        let module_path = self.current_module();
        let origin =
            Origin::new(module_path.clone(), module_path).with_member(item_fn.sig.ident.to_string());
        self.record(origin, None, first_argument(&item_fn.sig), &item_fn.attrs);
    }

    fn visit_item_impl(&mut self, item_impl: &'ast syn::ItemImpl) {
        let syn::Type::Path(self_ty) = item_impl.self_ty.as_ref() else {
            return;
        };
        let Some(segment) = self_ty.path.segments.last() else {
            return;
        };
        let module_path = self.current_module();
        let type_name = format!("{}::{}", module_path, segment.ident);

        for impl_item in &item_impl.items {
            if let syn::ImplItem::Fn(method) = impl_item {
                let origin = Origin::new(module_path.clone(), type_name.clone())
                    .with_member(method.sig.ident.to_string());
                self.record(origin, None, first_argument(&method.sig), &method.attrs);
            }
        }
    }
}

fn first_argument(sig: &syn::Signature) -> Option<syn::Type> {
    sig.inputs.iter().find_map(|input| match input {
        syn::FnArg::Typed(pat_type) => Some((*pat_type.ty).clone()),
        syn::FnArg::Receiver(_) => None,
    })
}

/// `#[channel]`, `#[asyncapi::channel]` and friends, parsed, in source order
fn recognised_attributes(attrs: &[syn::Attribute], origin: &Origin) -> Vec<(String, AttributeArgs)> {
    let mut recognised = Vec::new();

    for attr in attrs {
        let path = attr.path();
        let Some(last) = path.segments.last() else {
            continue;
        };
        let name = last.ident.to_string();
        let qualified_ok = path.segments.len() == 1
            || (path.segments.len() == 2 && path.segments[0].ident == "asyncapi");
        if !qualified_ok || !ATTRIBUTE_NAMES.contains(&name.as_str()) {
            continue;
        }

        let args = match &attr.meta {
            syn::Meta::Path(_) => Ok(AttributeArgs::default()),
            syn::Meta::List(_) => attr.parse_args::<AttributeArgs>(),
            syn::Meta::NameValue(name_value) => Err(syn::Error::new_spanned(
                name_value,
                "expected a parenthesised argument list",
            )),
        };

        match args {
            Ok(args) => recognised.push((name, args)),
            Err(e) => warn!("Ignoring malformed #[{}] on {}: {}", name, origin, e),
        }
    }

    recognised
}

/// Arguments of one recognised attribute
#[derive(Debug, Default)]
struct AttributeArgs {
    positional: Option<String>,
    entries: Vec<(String, ArgValue)>,
}

#[derive(Debug)]
enum ArgValue {
    Str(String),
    Type(Box<syn::Type>),
    List(Vec<String>),
    Flag,
}

impl AttributeArgs {
    fn string(&self, key: &str) -> Option<String> {
        self.entries.iter().rev().find_map(|(k, v)| match v {
            ArgValue::Str(s) if k == key => Some(s.clone()),
            _ => None,
        })
    }

    fn types(&self, key: &str) -> Vec<&syn::Type> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match v {
                ArgValue::Type(ty) if k == key => Some(ty.as_ref()),
                _ => None,
            })
            .collect()
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(k, v)| match v {
                ArgValue::List(items) if k == key => Some(items.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl Parse for AttributeArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = AttributeArgs::default();

        while !input.is_empty() {
            if input.peek(LitStr) {
                let literal: LitStr = input.parse()?;
                if args.positional.is_some() {
                    return Err(syn::Error::new(literal.span(), "only one positional name is allowed"));
                }
                args.positional = Some(literal.value());
            } else {
                let key: syn::Ident = input.parse()?;
                let value = if input.peek(Token![=]) {
                    input.parse::<Token![=]>()?;
                    if input.peek(LitStr) {
                        ArgValue::Str(input.parse::<LitStr>()?.value())
                    } else {
                        ArgValue::Type(Box::new(input.parse()?))
                    }
                } else if input.peek(syn::token::Paren) {
                    let content;
                    syn::parenthesized!(content in input);
                    let items = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                    ArgValue::List(items.into_iter().map(|item| item.value()).collect())
                } else {
                    ArgValue::Flag
                };
                args.entries.push((key.to_string(), value));
            }

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        Ok(args)
    }
}
