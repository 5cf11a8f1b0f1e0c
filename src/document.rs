//! The AsyncAPI 2.x document model.
//!
//! Every map is a `BTreeMap` so serialized key order only depends on the keys.
//! Empty collections are left out when writing and default when reading, which keeps
//! `parse(render(doc)) == doc` exact.

use crate::error::{Error, Result};
use crate::schema_generator::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// AsyncAPI specification version written into generated documents
pub const ASYNCAPI_VERSION: &str = "2.6.0";

/// Prefix of references into `components.schemas`
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Prefix of references into `components.messages`
pub const MESSAGE_REF_PREFIX: &str = "#/components/messages/";

fn default_asyncapi_version() -> String {
    ASYNCAPI_VERSION.to_string()
}

/// Complete AsyncAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncApiDocument {
    #[serde(default = "default_asyncapi_version")]
    pub asyncapi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub info: Info,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub servers: BTreeMap<String, Server>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_content_type: Option<String>,
    pub channels: BTreeMap<String, ChannelItem>,
    #[serde(default, skip_serializing_if = "Components::is_empty")]
    pub components: Components,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocumentation>,
}

impl Default for AsyncApiDocument {
    fn default() -> Self {
        Self::new(Info::new("Generated API", "1.0.0"))
    }
}

/// API metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A message broker the API is reachable through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// May contain `{variable}` placeholders
    pub url: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, ServerVariable>,
    /// Security requirements: scheme name → scopes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerVariable {
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// One channel and the operations on it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Names of servers this channel is available on; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<Operation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Runtime expression locating the value in a message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A publish or subscribe operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocumentation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Messages>,
}

/// A single message, or a choice between several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Messages {
    OneOf {
        #[serde(rename = "oneOf")]
        one_of: Vec<Message>,
    },
    Single(Box<Message>),
}

impl Messages {
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        let messages: Vec<&Message> = match self {
            Messages::OneOf { one_of } => one_of.iter().collect(),
            Messages::Single(message) => vec![message.as_ref()],
        };
        messages.into_iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Reference to `#/components/messages/<name>`; other fields are empty when set
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

impl Message {
    /// A message that only points at `components.messages[name]`
    pub fn reference_to(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", MESSAGE_REF_PREFIX, name)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocumentation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalDocumentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
}

/// Reusable objects referenced from the rest of the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, Message>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub server_bindings: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_bindings: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operation_bindings: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub message_bindings: BTreeMap<String, Value>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.messages.is_empty()
            && self.security_schemes.is_empty()
            && self.server_bindings.is_empty()
            && self.channel_bindings.is_empty()
            && self.operation_bindings.is_empty()
            && self.message_bindings.is_empty()
    }
}

impl AsyncApiDocument {
    pub fn new(info: Info) -> Self {
        Self {
            asyncapi: default_asyncapi_version(),
            id: None,
            info,
            servers: BTreeMap::new(),
            default_content_type: None,
            channels: BTreeMap::new(),
            components: Components::default(),
            tags: Vec::new(),
            external_docs: None,
        }
    }

    /// Check the invariants that filters could have broken: server variables must
    /// appear in their url, and operationIds must be unique document-wide.
    pub fn validate(&self) -> Result<()> {
        for (name, server) in &self.servers {
            for variable in server.variables.keys() {
                if !server.url.contains(&format!("{{{}}}", variable)) {
                    return Err(Error::UnknownServerVariable {
                        server: name.clone(),
                        variable: variable.clone(),
                    });
                }
            }
        }

        let mut seen: BTreeMap<&str, String> = BTreeMap::new();
        for (channel, operation, direction) in self.operations() {
            let Some(operation_id) = operation.operation_id.as_deref() else {
                continue;
            };
            let location = format!("{}/{}", channel, direction);
            if let Some(first) = seen.get(operation_id) {
                return Err(Error::DuplicateOperationId {
                    operation_id: operation_id.to_string(),
                    first: first.clone(),
                    second: location,
                });
            }
            seen.insert(operation_id, location);
        }

        Ok(())
    }

    /// Every operation as (channel, operation, "publish"/"subscribe"), channels in key
    /// order, publish before subscribe
    pub fn operations(&self) -> Vec<(&str, &Operation, &'static str)> {
        let mut operations = Vec::new();
        for (name, channel) in &self.channels {
            if let Some(publish) = &channel.publish {
                operations.push((name.as_str(), publish, "publish"));
            }
            if let Some(subscribe) = &channel.subscribe {
                operations.push((name.as_str(), subscribe, "subscribe"));
            }
        }
        operations
    }

    /// Every `$ref` in the document, with a JSON-pointer-like location
    pub fn references(&self) -> Vec<(String, String)> {
        let mut found = Vec::new();

        for (name, schema) in &self.components.schemas {
            schema.collect_references(&format!("/components/schemas/{}", name), &mut found);
        }
        for (name, message) in &self.components.messages {
            message_references(message, &format!("/components/messages/{}", name), &mut found);
        }
        for (name, channel) in &self.channels {
            let base = format!("/channels/{}", name);
            for (parameter_name, parameter) in &channel.parameters {
                if let Some(schema) = &parameter.schema {
                    schema.collect_references(
                        &format!("{}/parameters/{}/schema", base, parameter_name),
                        &mut found,
                    );
                }
            }
        }
        for (channel, operation, direction) in self.operations() {
            let base = format!("/channels/{}/{}/message", channel, direction);
            match &operation.message {
                Some(Messages::Single(message)) => message_references(message, &base, &mut found),
                Some(Messages::OneOf { one_of }) => {
                    for (index, message) in one_of.iter().enumerate() {
                        message_references(message, &format!("{}/oneOf/{}", base, index), &mut found);
                    }
                }
                None => {}
            }
        }

        found
    }
}

fn message_references(message: &Message, location: &str, found: &mut Vec<(String, String)>) {
    if let Some(reference) = &message.reference {
        found.push((reference.clone(), location.to_string()));
    }
    if let Some(payload) = &message.payload {
        payload.collect_references(&format!("{}/payload", location), found);
    }
    if let Some(headers) = &message.headers {
        headers.collect_references(&format!("{}/headers", location), found);
    }
}

impl Info {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
            terms_of_service: None,
            contact: None,
            license: None,
        }
    }
}

impl Server {
    pub fn new(url: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol: protocol.into(),
            protocol_version: None,
            description: None,
            variables: BTreeMap::new(),
            security: Vec::new(),
            tags: Vec::new(),
            bindings: BTreeMap::new(),
        }
    }
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            external_docs: None,
        }
    }
}
