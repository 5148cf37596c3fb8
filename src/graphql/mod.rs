//! GraphQL endpoint.

pub mod schema;

pub use schema::{build_schema, AppSchema, MutationRoot, QueryRoot};
