//! Declaration discovery via `inventory`.
//!
//! Each `register_*!` macro emits an `inventory::submit!` holding a [`Registration`]
//! for one type. The entries are collected at link time, so the registry is fully
//! populated before `main` runs and scanning never inspects types at runtime.
//!
//! ```ignore
//! use asyncapi_from_source::declaration::{DeclaresOperation, MessageDeclaration, OperationDeclaration};
//! use asyncapi_from_source::types::TypeCatalog;
//!
//! struct OrderService;
//!
//! impl DeclaresOperation for OrderService {
//!     fn operations(types: &mut TypeCatalog) -> Vec<OperationDeclaration> {
//!         vec![OperationDeclaration::publish("orders")
//!             .operation_id("placeOrder")
//!             .message(MessageDeclaration::of::<OrderPlaced>(types))]
//!     }
//! }
//!
//! asyncapi_from_source::register_operations!(OrderService);
//! ```

use super::DeclarationExtractor;
use crate::declaration::{
    Declaration, DeclaresChannel, DeclaresMessage, DeclaresOperation, DeclaresServer, Origin,
};
use crate::scanner::ModuleSet;
use crate::types::TypeCatalog;
use log::debug;

/// One registered type, collected at link time.
pub struct Registration {
    /// `module_path!()` at the registration site
    pub module_path: &'static str,
    /// Fully qualified name of the registered type
    pub type_name: &'static str,
    /// Produces the type's declarations
    pub declare: fn(&mut TypeCatalog) -> Vec<Declaration>,
}

inventory::collect!(Registration);

impl Registration {
    pub const fn channel<T: DeclaresChannel>(
        module_path: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            module_path,
            type_name,
            declare: declare_channel::<T>,
        }
    }

    pub const fn operations<T: DeclaresOperation>(
        module_path: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            module_path,
            type_name,
            declare: declare_operations::<T>,
        }
    }

    pub const fn message<T: DeclaresMessage>(
        module_path: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            module_path,
            type_name,
            declare: declare_message::<T>,
        }
    }

    pub const fn server<T: DeclaresServer>(
        module_path: &'static str,
        type_name: &'static str,
    ) -> Self {
        Self {
            module_path,
            type_name,
            declare: declare_server::<T>,
        }
    }
}

fn declare_channel<T: DeclaresChannel>(types: &mut TypeCatalog) -> Vec<Declaration> {
    vec![Declaration::Channel(T::channel(types))]
}

fn declare_operations<T: DeclaresOperation>(types: &mut TypeCatalog) -> Vec<Declaration> {
    T::operations(types)
        .into_iter()
        .map(Declaration::Operation)
        .collect()
}

fn declare_message<T: DeclaresMessage>(types: &mut TypeCatalog) -> Vec<Declaration> {
    vec![Declaration::Message(T::message(types))]
}

fn declare_server<T: DeclaresServer>(_types: &mut TypeCatalog) -> Vec<Declaration> {
    vec![Declaration::Server(T::server())]
}

/// Register a [`DeclaresChannel`] type
#[macro_export]
macro_rules! register_channel {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::extractor::registry::Registration::channel::<$ty>(
                module_path!(),
                concat!(module_path!(), "::", stringify!($ty)),
            )
        }
    };
}

/// Register a [`DeclaresOperation`] type
#[macro_export]
macro_rules! register_operations {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::extractor::registry::Registration::operations::<$ty>(
                module_path!(),
                concat!(module_path!(), "::", stringify!($ty)),
            )
        }
    };
}

/// Register a [`DeclaresMessage`] type
#[macro_export]
macro_rules! register_message {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::extractor::registry::Registration::message::<$ty>(
                module_path!(),
                concat!(module_path!(), "::", stringify!($ty)),
            )
        }
    };
}

/// Register a [`DeclaresServer`] type
#[macro_export]
macro_rules! register_server {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::extractor::registry::Registration::server::<$ty>(
                module_path!(),
                concat!(module_path!(), "::", stringify!($ty)),
            )
        }
    };
}

/// Extractor over the process-wide `inventory` registry
pub struct RegistryExtractor;

impl DeclarationExtractor for RegistryExtractor {
    fn extract(&self, modules: &ModuleSet, types: &mut TypeCatalog) -> Vec<Declaration> {
        let mut declarations = Vec::new();

        for registration in inventory::iter::<Registration> {
            if !modules.contains(registration.module_path) {
                continue;
            }
            debug!("Collecting declarations from {}", registration.type_name);

            let origin = Origin::new(registration.module_path, registration.type_name);
            for mut declaration in (registration.declare)(types) {
                declaration.set_origin(origin.clone());
                declarations.push(declaration);
            }
        }

        debug!("Registry yielded {} declarations", declarations.len());
        declarations
    }
}
