pub mod aggregate;
pub mod hit;
pub mod metric;
pub mod retriever;
pub mod source;
pub mod store;
