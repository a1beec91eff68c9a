//! Read interface to the catalog and listening-history data.
//!
//! The pipeline only ever reads this store; the write operations exist for
//! the external importer and for test fixtures.

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{Album, Artist, Scrobble, Track};
pub use store::SqliteHistoryStore;
pub use trait_def::{
    AggregateQuery, AggregateResult, AggregateRow, CatalogName, EntityLevel, HistoryStore,
    SqlValue, StoreError,
};
