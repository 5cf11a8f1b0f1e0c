//! Declaration records and the capability traits that produce them.
//!
//! A declaration is one annotated element found by an extractor: a channel, an
//! operation, a standalone message or a server. Declarations carry everything the
//! document builder needs, so nothing downstream goes back to the source.

use crate::document::{CorrelationId, Server, Tag};
use crate::types::{Describe, TypeCatalog, TypeRef};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Where a declaration came from
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Origin {
    /// Fully qualified name of the declaring type
    pub type_name: String,
    /// Method or function carrying the annotation, if not the type itself
    pub member: Option<String>,
    /// Module the declaration lives in
    pub module_path: String,
}

impl Origin {
    pub fn new(module_path: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            member: None,
            module_path: module_path.into(),
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}::{}", self.type_name, member),
            None => write!(f, "{}", self.type_name),
        }
    }
}

/// Operation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Publish,
    Subscribe,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Publish => write!(f, "publish"),
            Direction::Subscribe => write!(f, "subscribe"),
        }
    }
}

/// A channel parameter declared alongside a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDeclaration {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelDeclaration {
    pub origin: Origin,
    pub name: String,
    pub description: Option<String>,
    pub servers: Vec<String>,
    pub parameters: Vec<ParameterDeclaration>,
    pub bindings: BTreeMap<String, Value>,
}

impl ChannelDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.servers.push(server.into());
        self
    }

    /// Declare a `{name}` parameter of type `T`
    pub fn parameter<T: Describe + ?Sized>(
        mut self,
        types: &mut TypeCatalog,
        name: impl Into<String>,
        description: Option<&str>,
    ) -> Self {
        T::define(types);
        self.parameters.push(ParameterDeclaration {
            name: name.into(),
            description: description.map(str::to_string),
            ty: T::type_ref(),
            location: None,
        });
        self
    }

    pub fn binding(mut self, protocol: impl Into<String>, binding: Value) -> Self {
        self.bindings.insert(protocol.into(), binding);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDeclaration {
    pub origin: Origin,
    pub channel: String,
    pub direction: Direction,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<Tag>,
    pub bindings: BTreeMap<String, Value>,
    pub messages: Vec<MessageDeclaration>,
}

impl OperationDeclaration {
    pub fn new(channel: impl Into<String>, direction: Direction) -> Self {
        Self {
            origin: Origin::default(),
            channel: channel.into(),
            direction,
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            bindings: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    pub fn publish(channel: impl Into<String>) -> Self {
        Self::new(channel, Direction::Publish)
    }

    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self::new(channel, Direction::Subscribe)
    }

    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name));
        self
    }

    pub fn binding(mut self, protocol: impl Into<String>, binding: Value) -> Self {
        self.bindings.insert(protocol.into(), binding);
        self
    }

    pub fn message(mut self, message: MessageDeclaration) -> Self {
        self.messages.push(message);
        self
    }

    /// Whether two operations describe the same thing. Used to tell a harmless
    /// repeat from a conflict.
    pub fn same_shape(&self, other: &OperationDeclaration) -> bool {
        self.channel == other.channel
            && self.direction == other.direction
            && self.messages.len() == other.messages.len()
            && self
                .messages
                .iter()
                .zip(&other.messages)
                .all(|(a, b)| a.name == b.name && a.payload == b.payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDeclaration {
    pub origin: Origin,
    /// Machine-friendly name; defaults to the payload's short type name
    pub name: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub payload: TypeRef,
    pub headers: Option<TypeRef>,
    pub correlation_id: Option<CorrelationId>,
    pub tags: Vec<Tag>,
    pub bindings: BTreeMap<String, Value>,
}

impl MessageDeclaration {
    /// Message whose payload is `T`; defines `T` (and its dependencies) in the catalog
    pub fn of<T: Describe + ?Sized>(types: &mut TypeCatalog) -> Self {
        T::define(types);
        Self::with_payload(T::type_ref())
    }

    /// Message as declared by `T`'s [`DeclaresMessage`] implementation
    pub fn declared<T: DeclaresMessage + ?Sized>(types: &mut TypeCatalog) -> Self {
        T::message(types)
    }

    pub fn with_payload(payload: TypeRef) -> Self {
        Self {
            origin: Origin::default(),
            name: None,
            title: None,
            summary: None,
            description: None,
            content_type: None,
            payload,
            headers: None,
            correlation_id: None,
            tags: Vec::new(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn headers<T: Describe + ?Sized>(mut self, types: &mut TypeCatalog) -> Self {
        T::define(types);
        self.headers = Some(T::type_ref());
        self
    }

    pub fn correlation_id(mut self, location: impl Into<String>) -> Self {
        self.correlation_id = Some(CorrelationId {
            description: None,
            location: location.into(),
        });
        self
    }

    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(Tag::new(name));
        self
    }

    pub fn binding(mut self, protocol: impl Into<String>, binding: Value) -> Self {
        self.bindings.insert(protocol.into(), binding);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerDeclaration {
    pub origin: Origin,
    pub name: String,
    pub server: Server,
}

impl ServerDeclaration {
    pub fn new(name: impl Into<String>, server: Server) -> Self {
        Self {
            origin: Origin::default(),
            name: name.into(),
            server,
        }
    }
}

/// One discovered declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Channel(ChannelDeclaration),
    Operation(OperationDeclaration),
    Message(MessageDeclaration),
    Server(ServerDeclaration),
}

impl Declaration {
    pub fn origin(&self) -> &Origin {
        match self {
            Declaration::Channel(d) => &d.origin,
            Declaration::Operation(d) => &d.origin,
            Declaration::Message(d) => &d.origin,
            Declaration::Server(d) => &d.origin,
        }
    }

    pub fn set_origin(&mut self, origin: Origin) {
        match self {
            Declaration::Channel(d) => d.origin = origin,
            Declaration::Operation(d) => {
                for message in &mut d.messages {
                    if message.origin.type_name.is_empty() {
                        message.origin = origin.clone();
                    }
                }
                d.origin = origin;
            }
            Declaration::Message(d) => d.origin = origin,
            Declaration::Server(d) => d.origin = origin,
        }
    }

    /// Every type this declaration references
    pub fn referenced_types(&self) -> Vec<&str> {
        let mut names = Vec::new();
        match self {
            Declaration::Channel(d) => {
                for parameter in &d.parameters {
                    names.extend(parameter.ty.named_types());
                }
            }
            Declaration::Operation(d) => {
                for message in &d.messages {
                    names.extend(message_types(message));
                }
            }
            Declaration::Message(d) => names.extend(message_types(d)),
            Declaration::Server(_) => {}
        }
        names
    }
}

fn message_types(message: &MessageDeclaration) -> Vec<&str> {
    let mut names = message.payload.named_types();
    if let Some(headers) = &message.headers {
        names.extend(headers.named_types());
    }
    names
}

/// A type that declares a channel
pub trait DeclaresChannel {
    fn channel(types: &mut TypeCatalog) -> ChannelDeclaration;
}

/// A type that declares publish and/or subscribe operations
pub trait DeclaresOperation {
    fn operations(types: &mut TypeCatalog) -> Vec<OperationDeclaration>;
}

/// A type that declares a reusable message
pub trait DeclaresMessage {
    fn message(types: &mut TypeCatalog) -> MessageDeclaration;
}

/// A type that declares a server
pub trait DeclaresServer {
    fn server() -> ServerDeclaration;
}
