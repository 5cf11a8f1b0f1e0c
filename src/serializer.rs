//! Serialization module for converting AsyncAPI documents to and from YAML or JSON.
//!
//! Output is canonical: every map in the document model is ordered, so the same document
//! always produces the same bytes. Before anything is written, every `$ref` is checked
//! against `components`; parsing resolves references the same way, through a
//! [`SchemaResolver`] rebuilt from the parsed components.

use crate::document::{AsyncApiDocument, MESSAGE_REF_PREFIX, SCHEMA_REF_PREFIX};
use crate::error::{Error, Result};
use crate::schema_resolver::SchemaResolver;
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an AsyncAPI document to YAML format.
///
/// # Errors
///
/// Returns [`Error::DanglingReference`] if a `$ref` does not resolve, or
/// [`Error::Serialization`] if YAML encoding fails.
pub fn serialize_yaml(doc: &AsyncApiDocument) -> Result<String> {
    debug!("Serializing AsyncAPI document to YAML");
    check_references(doc)?;
    Ok(serde_yaml::to_string(doc)?)
}

/// Serializes an AsyncAPI document to JSON format with pretty printing.
///
/// # Errors
///
/// Returns [`Error::DanglingReference`] if a `$ref` does not resolve, or
/// [`Error::Serialization`] if JSON encoding fails.
pub fn serialize_json(doc: &AsyncApiDocument) -> Result<String> {
    debug!("Serializing AsyncAPI document to JSON");
    check_references(doc)?;
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parses a JSON AsyncAPI document.
///
/// # Errors
///
/// Returns [`Error::MalformedDocument`] if the text is not a structurally valid document
/// and [`Error::SchemaResolution`] if a `$ref` points nowhere.
pub fn deserialize_json(text: &str) -> Result<AsyncApiDocument> {
    debug!("Parsing AsyncAPI document from JSON");
    let doc: AsyncApiDocument =
        serde_json::from_str(text).map_err(|err| Error::MalformedDocument(err.to_string()))?;
    resolve_references(&doc)?;
    Ok(doc)
}

/// Parses a YAML AsyncAPI document.
///
/// # Errors
///
/// Same as [`deserialize_json`].
pub fn deserialize_yaml(text: &str) -> Result<AsyncApiDocument> {
    debug!("Parsing AsyncAPI document from YAML");
    let doc: AsyncApiDocument =
        serde_yaml::from_str(text).map_err(|err| Error::MalformedDocument(err.to_string()))?;
    resolve_references(&doc)?;
    Ok(doc)
}

/// Ensure every `$ref` in `doc` has a target in `components`.
///
/// # Errors
///
/// Returns [`Error::DanglingReference`] for the first reference that does not resolve.
pub fn check_references(doc: &AsyncApiDocument) -> Result<()> {
    let resolver = SchemaResolver::from_components(&doc.components.schemas);
    for (reference, location) in doc.references() {
        if !reference_resolves(doc, &resolver, &reference) {
            return Err(Error::DanglingReference {
                reference,
                location,
            });
        }
    }
    Ok(())
}

fn resolve_references(doc: &AsyncApiDocument) -> Result<()> {
    let resolver = SchemaResolver::from_components(&doc.components.schemas);
    for (reference, location) in doc.references() {
        if !reference_resolves(doc, &resolver, &reference) {
            return Err(Error::SchemaResolution {
                reference,
                location,
            });
        }
    }
    Ok(())
}

fn reference_resolves(doc: &AsyncApiDocument, resolver: &SchemaResolver, reference: &str) -> bool {
    if reference.starts_with(SCHEMA_REF_PREFIX) {
        return resolver.resolve_ref(reference).is_some();
    }
    reference
        .strip_prefix(MESSAGE_REF_PREFIX)
        .is_some_and(|name| doc.components.messages.contains_key(name))
}

/// Writes string content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory or the file cannot be written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ChannelItem, Info, Message, Messages, Operation};
    use crate::schema_generator::{AdditionalProperties, Schema};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// A document with one channel whose message points at a component schema
    fn create_test_document() -> AsyncApiDocument {
        let mut doc = AsyncApiDocument::new(Info::new("Test API", "1.0.0"));
        doc.info.description = Some("A test API".to_string());

        let mut order = Schema::typed("object");
        order
            .properties
            .insert("id".to_string(), Schema::typed("string"));
        order.required.push("id".to_string());
        doc.components.schemas.insert("Order".to_string(), order);

        let message = Message {
            name: Some("Order".to_string()),
            payload: Some(Schema::reference("Order")),
            ..Default::default()
        };
        doc.channels.insert(
            "orders".to_string(),
            ChannelItem {
                publish: Some(Operation {
                    operation_id: Some("placeOrder".to_string()),
                    message: Some(Messages::Single(Box::new(message))),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        doc
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_document()).unwrap();

        assert!(yaml.contains("asyncapi:"));
        assert!(yaml.contains("2.6.0"));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("orders:"));
        assert!(yaml.contains("#/components/schemas/Order"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_document()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["asyncapi"], "2.6.0");
        assert_eq!(parsed["info"]["title"], "Test API");
        assert_eq!(
            parsed["channels"]["orders"]["publish"]["message"]["payload"]["$ref"],
            "#/components/schemas/Order"
        );
        assert!(json.contains("\n  \"info\""));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let first = serialize_json(&create_test_document()).unwrap();
        let second = serialize_json(&create_test_document()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let mut doc = create_test_document();
        doc.components.schemas.clear();

        match serialize_json(&doc) {
            Err(Error::DanglingReference {
                reference,
                location,
            }) => {
                assert_eq!(reference, "#/components/schemas/Order");
                assert_eq!(location, "/channels/orders/publish/message/payload");
            }
            other => panic!("expected a dangling reference, got {:?}", other),
        }
        assert!(serialize_yaml(&doc).is_err());
    }

    #[test]
    fn test_message_reference_must_exist() {
        let mut doc = create_test_document();
        doc.channels.get_mut("orders").unwrap().subscribe = Some(Operation {
            message: Some(Messages::Single(Box::new(Message::reference_to("Shipped")))),
            ..Default::default()
        });
        assert!(matches!(
            serialize_json(&doc),
            Err(Error::DanglingReference { .. })
        ));

        doc.components
            .messages
            .insert("Shipped".to_string(), Message::default());
        assert!(serialize_json(&doc).is_ok());
    }

    #[test]
    fn test_roundtrip_json_serialization() {
        let doc = create_test_document();
        let json = serialize_json(&doc).unwrap();

        let parsed = deserialize_json(&json).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(serialize_json(&parsed).unwrap(), json);
    }

    #[test]
    fn test_roundtrip_yaml_serialization() {
        let doc = create_test_document();
        let yaml = serialize_yaml(&doc).unwrap();

        let parsed = deserialize_yaml(&yaml).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(serialize_yaml(&parsed).unwrap(), yaml);
    }

    #[test]
    fn test_deserialize_malformed_document() {
        assert!(matches!(
            deserialize_json("{ not json"),
            Err(Error::MalformedDocument(_))
        ));
        // `channels` is required
        assert!(matches!(
            deserialize_json(r#"{"asyncapi": "2.6.0", "info": {"title": "t", "version": "1"}}"#),
            Err(Error::MalformedDocument(_))
        ));
        assert!(matches!(
            deserialize_yaml("info: [1, 2]"),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_deserialize_unresolvable_reference() {
        let text = r##"{
            "asyncapi": "2.6.0",
            "info": {"title": "t", "version": "1"},
            "channels": {
                "orders": {"publish": {"message": {"payload": {"$ref": "#/components/schemas/Missing"}}}}
            }
        }"##;

        match deserialize_json(text) {
            Err(Error::SchemaResolution { reference, .. }) => {
                assert_eq!(reference, "#/components/schemas/Missing")
            }
            other => panic!("expected a resolution error, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_additional_properties() {
        let text = r##"{
            "asyncapi": "2.6.0",
            "info": {"title": "t", "version": "1"},
            "channels": {
                "orders": {"publish": {"message": {"payload": {"$ref": "#/components/schemas/Order"}}}}
            },
            "components": {
                "schemas": {
                    "Order": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {
                            "lines": {"type": "object", "additionalProperties": {"$ref": "#/components/schemas/Line"}}
                        }
                    },
                    "Line": {"type": "object", "additionalProperties": true}
                }
            }
        }"##;

        let doc = deserialize_json(text).unwrap();
        let order = &doc.components.schemas["Order"];
        assert_eq!(
            order.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );
        assert_eq!(
            order.properties["lines"],
            Schema::map(Schema::reference("Line"))
        );

        let json = serialize_json(&doc).unwrap();
        assert!(json.contains("\"additionalProperties\": false"));
        assert_eq!(deserialize_json(&json).unwrap(), doc);
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("asyncapi.yaml");

        write_to_file("test content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");
    }

    #[test]
    fn test_write_to_file_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("asyncapi.json");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }
}
