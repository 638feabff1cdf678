//! Session history: one record per completed or failed live run.

mod sqlite;
mod store;

pub use sqlite::SqliteHistoryStore;
pub use store::{
    HistoryError, HistoryFilter, HistoryStats, HistoryStore, NewSessionRecord, SessionOutcome,
    SessionRecord,
};
