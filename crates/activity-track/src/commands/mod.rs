pub mod events;
pub mod query;
pub mod summary;
