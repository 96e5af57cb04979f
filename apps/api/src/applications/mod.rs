// Application lifecycle and candidate aggregation.
// All database access goes through the `ApplicationStore` trait; CV files go through `uploads`.

pub mod candidates;
pub mod handlers;
pub mod lifecycle;
#[cfg(test)]
pub mod memory;
pub mod pg_store;
pub mod status;
pub mod store;
