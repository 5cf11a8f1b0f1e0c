//! Declaration extraction.
//!
//! This module provides a unified interface for discovering channel, operation, message
//! and server declarations. Each frontend knows one way of finding annotated elements and
//! turns them into [`Declaration`] records plus the [`TypeCatalog`] entries for every type
//! those records mention.
//!
//! # Frontends
//!
//! - **Registry**: types implementing the `Declares*` capability traits, registered at
//!   process start with the `register_*!` macros. See [`registry::RegistryExtractor`].
//! - **Attributes**: `#[channel]`, `#[publish]`, `#[subscribe]`, `#[message]` and
//!   `#[server]` attributes found by parsing Rust source. See
//!   [`attributes::AttributeExtractor`].

pub mod attributes;
pub mod registry;

use crate::declaration::Declaration;
use crate::scanner::ModuleSet;
use crate::types::TypeCatalog;

/// Trait for extracting declarations from one kind of input.
pub trait DeclarationExtractor {
    /// Extracts every declaration that lives in one of `modules`.
    ///
    /// Implementations must set each declaration's [`Origin`](crate::declaration::Origin)
    /// and must define every referenced struct/enum in `types`.
    fn extract(&self, modules: &ModuleSet, types: &mut TypeCatalog) -> Vec<Declaration>;
}
