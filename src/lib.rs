//! AsyncAPI Generator - AsyncAPI 2.x documents from annotated Rust messaging code.
//!
//! Channels, publish/subscribe operations, messages and servers are declared either by
//! implementing the `Declares*` traits and registering the type, or by annotating source
//! with `#[channel]`, `#[publish]`, `#[subscribe]`, `#[message]` and `#[server]`. A
//! generation run turns those declarations into an [`AsyncApiDocument`] with a JSON
//! schema for every payload type.
//!
//! # Architecture
//!
//! 1. [`extractor`] - Finds declarations (registry or source attributes)
//! 2. [`scanner`] - Selects modules by marker type, orders declarations, drops conflicts
//! 3. [`document_builder`] - Folds declarations into the document graph
//! 4. [`schema_generator`] / [`schema_resolver`] - Payload types to JSON schema, with
//!    stable ids and `$ref`s for shared and recursive types
//! 5. [`filters`] - Caller hooks that mutate the finished graph
//! 6. [`serializer`] - Canonical JSON/YAML in both directions
//!
//! [`generator`] wires these together.
//!
//! # Example Usage
//!
//! ```no_run
//! use asyncapi_from_source::declaration::{DeclaresOperation, MessageDeclaration, OperationDeclaration};
//! use asyncapi_from_source::types::{Describe, TypeCatalog, TypeRef};
//! use asyncapi_from_source::{generate, serialize_yaml, GeneratorOptions};
//!
//! pub struct OrderPlaced;
//!
//! impl Describe for OrderPlaced {
//!     fn type_ref() -> TypeRef {
//!         TypeRef::named::<Self>()
//!     }
//!
//!     fn define(types: &mut TypeCatalog) {
//!         types.define_object::<Self>(|o| o.field::<String>("id").field::<f64>("total"));
//!     }
//! }
//!
//! pub struct OrderService;
//!
//! impl DeclaresOperation for OrderService {
//!     fn operations(types: &mut TypeCatalog) -> Vec<OperationDeclaration> {
//!         vec![OperationDeclaration::publish("orders")
//!             .message(MessageDeclaration::of::<OrderPlaced>(types))]
//!     }
//! }
//!
//! asyncapi_from_source::register_operations!(OrderService);
//!
//! fn main() {
//!     let options = GeneratorOptions::builder().marker_of::<OrderService>().build();
//!     let generated = generate(&options).unwrap();
//!     println!("{}", serialize_yaml(&generated.document).unwrap());
//! }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod declaration;
pub mod document;
pub mod document_builder;
pub mod error;
pub mod extractor;
pub mod files;
pub mod filters;
pub mod generator;
pub mod options;
pub mod parser;
pub mod scanner;
pub mod schema_generator;
pub mod schema_resolver;
pub mod serializer;
pub mod type_resolver;
pub mod types;

#[doc(hidden)]
pub use inventory;

pub use document::AsyncApiDocument;
pub use error::{Error, Result, Warning};
pub use generator::{generate, generate_with, render_current_document, Generated};
pub use options::{GeneratorOptions, MarkerType};
pub use serializer::{deserialize_json, deserialize_yaml, serialize_json, serialize_yaml};
