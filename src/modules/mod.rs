pub mod catalog;
pub mod ingest;
