//! One generation run, end to end.
//!
//! scan → build (with schema generation) → filters → validation. Every run owns its own
//! [`SchemaResolver`]; nothing is cached between runs.

use crate::declaration::Declaration;
use crate::document::AsyncApiDocument;
use crate::document_builder::DocumentBuilder;
use crate::error::{Result, Warning};
use crate::extractor::registry::RegistryExtractor;
use crate::extractor::DeclarationExtractor;
use crate::filters::{FilterContext, FilterPipeline};
use crate::options::GeneratorOptions;
use crate::scanner::MetadataScanner;
use crate::schema_generator::SchemaGenerator;
use crate::schema_resolver::SchemaResolver;
use crate::serializer::serialize_json;
use log::info;
use std::collections::BTreeSet;

/// Content type of [`render_current_document`]'s output
pub const DOCUMENT_CONTENT_TYPE: &str = "application/json";

/// A finished document and the non-fatal findings collected on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub document: AsyncApiDocument,
    pub warnings: Vec<Warning>,
}

/// Generate a document from the process-wide declaration registry
pub fn generate(options: &GeneratorOptions) -> Result<Generated> {
    generate_with(&RegistryExtractor, options)
}

/// Generate a document from the declarations `extractor` finds.
///
/// # Errors
///
/// Any fatal [`Error`](crate::error::Error) aborts the run; no partial document is
/// returned.
pub fn generate_with(
    extractor: &dyn DeclarationExtractor,
    options: &GeneratorOptions,
) -> Result<Generated> {
    info!("Starting AsyncAPI document generation");

    let mut report = MetadataScanner::new(options).scan(extractor)?;
    let mut warnings = report.warnings;

    let mut base = options.base_document().clone();
    if base.default_content_type.is_none() {
        base.default_content_type = options.default_content_type().map(str::to_string);
    }

    let mut resolver = SchemaResolver::from_components(&base.components.schemas);
    let mut builder = DocumentBuilder::new(base);
    {
        let mut schemas = SchemaGenerator::new(&report.types, &mut resolver, options);
        for declaration in &report.declarations {
            builder.add_declaration(declaration, &mut schemas)?;
        }
    }
    let (mut document, build_warnings) = builder.build(&resolver)?;
    warnings.extend(build_warnings);

    let discovered_types = declaring_types(&report.declarations);
    let context = FilterContext::new(&discovered_types, &mut report.types, &mut resolver, options);
    FilterPipeline::new(options.filters()).run(&mut document, &context)?;

    document.validate()?;

    info!(
        "Generated document with {} channels and {} warnings",
        document.channels.len(),
        warnings.len()
    );
    Ok(Generated { document, warnings })
}

/// Types that carried at least one declaration, sorted
fn declaring_types(declarations: &[Declaration]) -> Vec<String> {
    declarations
        .iter()
        .map(|declaration| declaration.origin().type_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Bytes for the document as the hosting layer serves it
pub fn render_current_document(options: &GeneratorOptions) -> Result<(&'static str, Vec<u8>)> {
    let generated = generate(options)?;
    let json = serialize_json(&generated.document)?;
    Ok((DOCUMENT_CONTENT_TYPE, json.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{MessageDeclaration, OperationDeclaration, Origin};
    use crate::error::Error;
    use crate::filters::Filter;
    use crate::options::MarkerType;
    use crate::scanner::ModuleSet;
    use crate::types::{FieldDef, PrimitiveType, TypeCatalog, TypeDef, TypeRef};
    use pretty_assertions::assert_eq;

    struct Canned;

    impl DeclarationExtractor for Canned {
        fn extract(&self, _modules: &ModuleSet, types: &mut TypeCatalog) -> Vec<Declaration> {
            types.insert(TypeDef::object(
                "shop::OrderPlaced",
                vec![FieldDef::new(
                    "id",
                    TypeRef::Primitive(PrimitiveType::String),
                )],
            ));
            let mut operation = OperationDeclaration::publish("orders")
                .operation_id("placeOrder")
                .message(MessageDeclaration::with_payload(TypeRef::Named(
                    "shop::OrderPlaced".to_string(),
                )));
            operation.origin = Origin::new("shop", "shop::Orders");
            vec![Declaration::Operation(operation)]
        }
    }

    fn options() -> crate::options::GeneratorOptionsBuilder {
        GeneratorOptions::builder().marker(MarkerType::module("shop"))
    }

    #[test]
    fn test_generate_with_runs_pipeline() {
        let options = options().default_content_type("application/json").build();
        let generated = generate_with(&Canned, &options).unwrap();

        assert!(generated.warnings.is_empty());
        assert_eq!(
            generated.document.default_content_type.as_deref(),
            Some("application/json")
        );
        assert!(generated.document.channels["orders"].publish.is_some());
        assert!(generated.document.components.schemas.contains_key("OrderPlaced"));
    }

    #[test]
    fn test_filters_see_declaring_types() {
        let options = options()
            .filter(Filter::document_fn("RecordTypes", |document, context| {
                document.info.description = Some(context.discovered_types.join(","));
                Ok(())
            }))
            .build();

        let generated = generate_with(&Canned, &options).unwrap();
        assert_eq!(
            generated.document.info.description.as_deref(),
            Some("shop::Orders")
        );
    }

    #[test]
    fn test_validation_runs_after_filters() {
        let options = options()
            .filter(Filter::document_fn("CopyOperation", |document, _| {
                let operation = document.channels["orders"].publish.clone();
                document.channels.entry("audit".to_string()).or_default().subscribe = operation;
                Ok(())
            }))
            .build();

        assert!(matches!(
            generate_with(&Canned, &options),
            Err(Error::DuplicateOperationId { .. })
        ));
    }

    #[test]
    fn test_no_markers_is_fatal() {
        let options = GeneratorOptions::builder().build();
        assert!(matches!(
            generate_with(&Canned, &options),
            Err(Error::NoMarkerTypes)
        ));
    }
}
