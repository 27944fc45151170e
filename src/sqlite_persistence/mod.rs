//! Declarative SQLite schemas shared by the catalog and user databases.

mod versioned_schema;

pub use versioned_schema::{
    open_versioned, CascadeReference, Column, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};
