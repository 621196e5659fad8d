pub mod connection;
pub mod query;
pub mod schema;

pub use query::{ExecutionResult, PgQueryExecutor, QueryExecutor};
pub use schema::SchemaCatalog;
