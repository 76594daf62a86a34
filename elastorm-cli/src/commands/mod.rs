pub mod admin;
pub mod query;

pub use admin::{run_create_index, run_drop_index, run_flush, run_sync};
pub use query::{run_count, run_insert, run_search};
