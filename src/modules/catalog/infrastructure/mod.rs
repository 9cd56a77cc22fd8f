pub mod models;
pub mod pg_store;

pub use pg_store::PgGazetteerStore;
