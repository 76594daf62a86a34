//! Elasticsearch Query DSL and response shapes

mod response;
mod types;

pub use response::*;
pub use types::*;
