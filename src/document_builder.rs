use crate::declaration::{
    ChannelDeclaration, Declaration, Direction, MessageDeclaration, OperationDeclaration,
    ServerDeclaration,
};
use crate::document::{AsyncApiDocument, Message, Messages, Operation, Parameter};
use crate::error::{Result, Warning};
use crate::options::spell_generics;
use crate::schema_generator::{Schema, SchemaGenerator};
use crate::schema_resolver::SchemaResolver;
use crate::types::{short_type_name, TypeRef};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Folds declarations into an AsyncAPI document
pub struct DocumentBuilder {
    document: AsyncApiDocument,
    /// Who put the operation currently sitting in each (channel, direction) slot
    owners: BTreeMap<(String, Direction), String>,
    /// Who put each entry of `components.messages`
    message_owners: BTreeMap<String, String>,
    warnings: Vec<Warning>,
}

impl DocumentBuilder {
    /// Start from a base document; its info, servers and channels are kept
    pub fn new(base: AsyncApiDocument) -> Self {
        debug!("Initializing DocumentBuilder");
        Self {
            document: base,
            owners: BTreeMap::new(),
            message_owners: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Add one declaration, generating schemas for every type it references
    pub fn add_declaration(
        &mut self,
        declaration: &Declaration,
        schemas: &mut SchemaGenerator<'_>,
    ) -> Result<()> {
        match declaration {
            Declaration::Channel(channel) => self.add_channel(channel, schemas),
            Declaration::Operation(operation) => self.add_operation(operation, schemas),
            Declaration::Message(message) => self.add_message(message, schemas),
            Declaration::Server(server) => {
                self.add_server(server);
                Ok(())
            }
        }
    }

    fn add_channel(
        &mut self,
        declaration: &ChannelDeclaration,
        schemas: &mut SchemaGenerator<'_>,
    ) -> Result<()> {
        debug!("Adding channel: {}", declaration.name);

        let mut parameters = BTreeMap::new();
        for parameter in &declaration.parameters {
            parameters.insert(
                parameter.name.clone(),
                Parameter {
                    description: parameter.description.clone(),
                    schema: Some(schemas.generate(&parameter.ty)?),
                    location: parameter.location.clone(),
                },
            );
        }

        let channel = self
            .document
            .channels
            .entry(declaration.name.clone())
            .or_default();
        if declaration.description.is_some() {
            channel.description = declaration.description.clone();
        }
        for server in &declaration.servers {
            if !channel.servers.contains(server) {
                channel.servers.push(server.clone());
            }
        }
        channel.parameters.extend(parameters);
        channel
            .bindings
            .extend(declaration.bindings.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(())
    }

    fn add_operation(
        &mut self,
        declaration: &OperationDeclaration,
        schemas: &mut SchemaGenerator<'_>,
    ) -> Result<()> {
        debug!(
            "Adding {} operation on channel {}",
            declaration.direction, declaration.channel
        );

        let mut messages = Vec::with_capacity(declaration.messages.len());
        for message in &declaration.messages {
            messages.push(build_message(message, schemas)?);
        }
        let message = match messages.len() {
            0 => None,
            1 => messages.pop().map(|m| Messages::Single(Box::new(m))),
            _ => Some(Messages::OneOf { one_of: messages }),
        };

        let operation = Operation {
            operation_id: declaration.operation_id.clone(),
            summary: declaration.summary.clone(),
            description: declaration.description.clone(),
            tags: declaration.tags.clone(),
            external_docs: None,
            bindings: declaration.bindings.clone(),
            message,
        };

        let channel = self
            .document
            .channels
            .entry(declaration.channel.clone())
            .or_default();
        let slot = match declaration.direction {
            Direction::Publish => &mut channel.publish,
            Direction::Subscribe => &mut channel.subscribe,
        };

        let key = (declaration.channel.clone(), declaration.direction);
        let winner = declaration.origin.to_string();
        if slot.is_some() {
            let superseded = self
                .owners
                .get(&key)
                .cloned()
                .unwrap_or_else(|| "the base document".to_string());
            let warning = Warning::DuplicateOperation {
                channel: declaration.channel.clone(),
                direction: declaration.direction,
                superseded,
                winner: winner.clone(),
            };
            warn!("{}", warning);
            self.warnings.push(warning);
        }
        *slot = Some(operation);
        self.owners.insert(key, winner);

        Ok(())
    }

    fn add_message(
        &mut self,
        declaration: &MessageDeclaration,
        schemas: &mut SchemaGenerator<'_>,
    ) -> Result<()> {
        let mut message = build_message(declaration, schemas)?;
        let Some(mut name) = message.name.clone() else {
            warn!(
                "Skipping message from {}: it has no name and its payload is not a named type",
                declaration.origin
            );
            return Ok(());
        };

        // A defaulted name follows the payload's schema id, which is already unique
        let messages = &self.document.components.messages;
        if declaration.name.is_none() && messages.contains_key(&name) {
            let schema_id = message
                .payload
                .as_ref()
                .and_then(Schema::referenced_id)
                .filter(|id| !messages.contains_key(*id))
                .map(str::to_string);
            if let Some(schema_id) = schema_id {
                debug!(
                    "Message name {} is taken, using {} for {}",
                    name, schema_id, declaration.origin
                );
                name = schema_id;
                message.name = Some(name.clone());
            }
        }

        let winner = declaration.origin.to_string();
        if self.document.components.messages.contains_key(&name) {
            let superseded = self
                .message_owners
                .get(&name)
                .cloned()
                .unwrap_or_else(|| "the base document".to_string());
            let warning = Warning::DuplicateMessage {
                name: name.clone(),
                superseded,
                winner: winner.clone(),
            };
            warn!("{}", warning);
            self.warnings.push(warning);
        }

        debug!("Adding component message: {}", name);
        self.message_owners.insert(name.clone(), winner);
        self.document.components.messages.insert(name, message);
        Ok(())
    }

    fn add_server(&mut self, declaration: &ServerDeclaration) {
        if self.document.servers.contains_key(&declaration.name) {
            debug!("Server {} redeclared by {}", declaration.name, declaration.origin);
        }
        self.document
            .servers
            .insert(declaration.name.clone(), declaration.server.clone());
    }

    /// Finish the document: declare implied channel parameters and copy the schema
    /// table into `components.schemas`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedSchema`](crate::error::Error::UnresolvedSchema) if the
    /// resolver still holds a reserved id.
    pub fn build(mut self, resolver: &SchemaResolver) -> Result<(AsyncApiDocument, Vec<Warning>)> {
        for (name, channel) in self.document.channels.iter_mut() {
            for parameter in channel_parameters(name) {
                channel.parameters.entry(parameter).or_insert_with(|| Parameter {
                    schema: Some(Schema::typed("string")),
                    ..Default::default()
                });
            }
        }

        self.document.components.schemas.extend(resolver.schemas()?);

        info!(
            "Built document with {} channels, {} schemas and {} messages",
            self.document.channels.len(),
            self.document.components.schemas.len(),
            self.document.components.messages.len()
        );
        Ok((self.document, self.warnings))
    }
}

fn build_message(
    declaration: &MessageDeclaration,
    schemas: &mut SchemaGenerator<'_>,
) -> Result<Message> {
    let payload = schemas.generate(&declaration.payload)?;
    let headers = declaration
        .headers
        .as_ref()
        .map(|headers| schemas.generate(headers))
        .transpose()?;

    Ok(Message {
        name: declaration
            .name
            .clone()
            .or_else(|| default_message_name(&declaration.payload)),
        title: declaration.title.clone(),
        summary: declaration.summary.clone(),
        description: declaration.description.clone(),
        content_type: declaration.content_type.clone(),
        headers,
        payload: Some(payload),
        correlation_id: declaration.correlation_id.clone(),
        tags: declaration.tags.clone(),
        bindings: declaration.bindings.clone(),
        ..Default::default()
    })
}

fn default_message_name(payload: &TypeRef) -> Option<String> {
    match payload {
        TypeRef::Named(name) => Some(spell_generics(&short_type_name(name))),
        _ => None,
    }
}

/// `{name}` placeholders in a channel name, in order
fn channel_parameters(channel: &str) -> Vec<String> {
    let mut parameters = Vec::new();
    let mut rest = channel;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let name = &after[..close];
        if !name.is_empty() && !parameters.iter().any(|p| p == name) {
            parameters.push(name.to_string());
        }
        rest = &after[close + 1..];
    }
    parameters
}
