//! Serves owners and their pets over GraphQL from an in-memory relational store.

#![warn(unreachable_pub)]

pub mod json_ext;

pub mod axum_factory;
pub mod configuration;
pub mod error;
mod executable;
pub mod execution;
pub mod graphql;
pub mod service;
pub mod spec;
pub mod store;

pub use configuration::Configuration;
pub use executable::Executable;
pub use executable::main;
pub use execution::Executor;
pub use service::GraphQLService;
pub use spec::Schema;
pub use store::Store;
