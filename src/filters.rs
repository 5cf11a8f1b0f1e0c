//! Post-build filters.
//!
//! Filters run after the document graph is built and before it is validated and
//! serialized. There are three stages, each over its own target:
//!
//! - operation filters see every operation (channels in key order, publish first),
//! - channel filters see every channel (key order),
//! - document filters see the whole document.
//!
//! Stages run in that order. Within a stage, filters run in registration order, so a
//! later filter observes the changes of an earlier one. The first failing filter stops
//! the run.

use crate::declaration::Direction;
use crate::document::{AsyncApiDocument, ChannelItem, Operation};
use crate::error::{Error, Result};
use crate::options::GeneratorOptions;
use crate::schema_generator::{Schema, SchemaGenerator};
use crate::schema_resolver::SchemaResolver;
use crate::types::{short_type_name, Describe, TypeCatalog, TypeRef};
use log::debug;
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;

/// Which extension point a filter is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Document,
    Channel,
    Operation,
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStage::Document => write!(f, "document"),
            FilterStage::Channel => write!(f, "channel"),
            FilterStage::Operation => write!(f, "operation"),
        }
    }
}

/// View of the generation run handed to every filter.
///
/// Filters that add messages get payload schemas through [`FilterContext::schema_for`]
/// or [`FilterContext::schema_of`]; any component those create is copied into
/// `components.schemas` once the filter returns.
pub struct FilterContext<'a> {
    /// Types that carried declarations, sorted
    pub discovered_types: &'a [String],
    pub options: &'a GeneratorOptions,
    types: RefCell<&'a mut TypeCatalog>,
    resolver: RefCell<&'a mut SchemaResolver>,
    /// Schema ids created by filters and not yet copied into the document
    pending: RefCell<Vec<String>>,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        discovered_types: &'a [String],
        types: &'a mut TypeCatalog,
        resolver: &'a mut SchemaResolver,
        options: &'a GeneratorOptions,
    ) -> Self {
        Self {
            discovered_types,
            options,
            types: RefCell::new(types),
            resolver: RefCell::new(resolver),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Every payload type known to the run
    pub fn types(&self) -> Ref<'_, TypeCatalog> {
        Ref::map(self.types.borrow(), |types| &**types)
    }

    pub fn resolver(&self) -> Ref<'_, SchemaResolver> {
        Ref::map(self.resolver.borrow(), |resolver| &**resolver)
    }

    /// Schema for `ty`, registering components the same way the builder does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaDepthExceeded`] like any other schema generation.
    pub fn schema_for(&self, ty: &TypeRef) -> Result<Schema> {
        let types = self.types.borrow();
        let mut resolver = self.resolver.borrow_mut();
        let before = resolver.discovered_types().len();

        let schema = SchemaGenerator::new(&**types, &mut **resolver, self.options).generate(ty)?;

        let created: Vec<String> = resolver.discovered_types()[before..]
            .iter()
            .filter_map(|name| resolver.id_for(name).map(str::to_string))
            .collect();
        self.pending.borrow_mut().extend(created);
        Ok(schema)
    }

    /// Define `T` in the run's catalog, then build its schema
    pub fn schema_of<T: Describe + ?Sized>(&self) -> Result<Schema> {
        T::define(&mut **self.types.borrow_mut());
        self.schema_for(&T::type_ref())
    }

    /// Move schemas created by filters into `schemas`
    fn merge_created(&self, schemas: &mut BTreeMap<String, Schema>) -> Result<()> {
        let created: Vec<String> = self.pending.borrow_mut().drain(..).collect();
        let resolver = self.resolver.borrow();
        for id in created {
            let Some(schema) = resolver.get(&id) else {
                return Err(Error::UnresolvedSchema(id));
            };
            debug!("Adding schema {} created by a filter", id);
            schemas.insert(id, schema.clone());
        }
        Ok(())
    }
}

pub trait DocumentFilter {
    /// Identity used in error reports
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    fn apply(&self, document: &mut AsyncApiDocument, context: &FilterContext<'_>) -> anyhow::Result<()>;
}

pub trait ChannelFilter {
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    fn apply(
        &self,
        channel_name: &str,
        channel: &mut ChannelItem,
        context: &FilterContext<'_>,
    ) -> anyhow::Result<()>;
}

pub trait OperationFilter {
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    fn apply(
        &self,
        channel_name: &str,
        direction: Direction,
        operation: &mut Operation,
        context: &FilterContext<'_>,
    ) -> anyhow::Result<()>;
}

/// A registered filter
pub enum Filter {
    Document(Box<dyn DocumentFilter + Send + Sync>),
    Channel(Box<dyn ChannelFilter + Send + Sync>),
    Operation(Box<dyn OperationFilter + Send + Sync>),
}

impl Filter {
    pub fn stage(&self) -> FilterStage {
        match self {
            Filter::Document(_) => FilterStage::Document,
            Filter::Channel(_) => FilterStage::Channel,
            Filter::Operation(_) => FilterStage::Operation,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Filter::Document(f) => f.name(),
            Filter::Channel(f) => f.name(),
            Filter::Operation(f) => f.name(),
        }
    }

    /// Document filter from a closure
    pub fn document_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut AsyncApiDocument, &FilterContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Filter::Document(Box::new(FnFilter {
            name: name.into(),
            f,
        }))
    }

    /// Channel filter from a closure
    pub fn channel_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &mut ChannelItem, &FilterContext<'_>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Filter::Channel(Box::new(FnFilter {
            name: name.into(),
            f,
        }))
    }

    /// Operation filter from a closure
    pub fn operation_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, Direction, &mut Operation, &FilterContext<'_>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Filter::Operation(Box::new(FnFilter {
            name: name.into(),
            f,
        }))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({}, {})", self.stage(), self.name())
    }
}

/// A closure with a name
struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F> DocumentFilter for FnFilter<F>
where
    F: Fn(&mut AsyncApiDocument, &FilterContext<'_>) -> anyhow::Result<()>,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn apply(&self, document: &mut AsyncApiDocument, context: &FilterContext<'_>) -> anyhow::Result<()> {
        (self.f)(document, context)
    }
}

impl<F> ChannelFilter for FnFilter<F>
where
    F: Fn(&str, &mut ChannelItem, &FilterContext<'_>) -> anyhow::Result<()>,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn apply(
        &self,
        channel_name: &str,
        channel: &mut ChannelItem,
        context: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        (self.f)(channel_name, channel, context)
    }
}

impl<F> OperationFilter for FnFilter<F>
where
    F: Fn(&str, Direction, &mut Operation, &FilterContext<'_>) -> anyhow::Result<()>,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn apply(
        &self,
        channel_name: &str,
        direction: Direction,
        operation: &mut Operation,
        context: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        (self.f)(channel_name, direction, operation, context)
    }
}

/// Runs registered filters over a built document
pub struct FilterPipeline<'a> {
    filters: &'a [Filter],
}

impl<'a> FilterPipeline<'a> {
    pub fn new(filters: &'a [Filter]) -> Self {
        Self { filters }
    }

    /// Apply every filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterExecution`] for the first filter that fails; no later
    /// filter runs.
    pub fn run(&self, document: &mut AsyncApiDocument, context: &FilterContext<'_>) -> Result<()> {
        debug!("Running {} filters", self.filters.len());

        let operation_filters: Vec<&(dyn OperationFilter + Send + Sync)> = self
            .filters
            .iter()
            .filter_map(|f| match f {
                Filter::Operation(f) => Some(f.as_ref()),
                _ => None,
            })
            .collect();
        if !operation_filters.is_empty() {
            for (channel_name, channel) in document.channels.iter_mut() {
                let operations = [
                    (Direction::Publish, channel.publish.as_mut()),
                    (Direction::Subscribe, channel.subscribe.as_mut()),
                ];
                for (direction, operation) in operations {
                    let Some(operation) = operation else {
                        continue;
                    };
                    for filter in &operation_filters {
                        filter
                            .apply(channel_name, direction, operation, context)
                            .map_err(|source| Error::FilterExecution {
                                filter: filter.name(),
                                stage: FilterStage::Operation,
                                source,
                            })?;
                        context.merge_created(&mut document.components.schemas)?;
                    }
                }
            }
        }

        for (channel_name, channel) in document.channels.iter_mut() {
            for filter in self.filters {
                if let Filter::Channel(filter) = filter {
                    filter
                        .apply(channel_name, channel, context)
                        .map_err(|source| Error::FilterExecution {
                            filter: filter.name(),
                            stage: FilterStage::Channel,
                            source,
                        })?;
                    context.merge_created(&mut document.components.schemas)?;
                }
            }
        }

        for filter in self.filters {
            if let Filter::Document(filter) = filter {
                debug!("Applying document filter {}", filter.name());
                filter.apply(document, context).map_err(|source| Error::FilterExecution {
                    filter: filter.name(),
                    stage: FilterStage::Document,
                    source,
                })?;
                context.merge_created(&mut document.components.schemas)?;
            }
        }

        Ok(())
    }
}
