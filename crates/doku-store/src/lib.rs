//! Persistence for doku scan results.
//!
//! Every scan type owns one keyspace: a SQL table of JSON values keyed by
//! string. Scanners open a [`KvStore`] for the duration of a single scan,
//! write through a typed [`Table`], and record when they last started in a
//! small side file managed by [`ScanClock`].
//!
//! ```rust,no_run
//! use doku_store::KvStore;
//!
//! let store = KvStore::open("/var/lib/doku/df.sqlite3").unwrap();
//! let table = store.table::<u64>("sizes").unwrap();
//! table.set("a", &42).unwrap();
//! assert_eq!(table.get("a").unwrap(), Some(42));
//! ```

mod clock;
mod error;
mod kv;

pub use clock::ScanClock;
pub use error::StoreError;
pub use kv::{KvStore, Table};

pub const TABLE_SYSTEM_DF: &str = "system_df";
pub const TABLE_LOGFILES: &str = "logfiles";
pub const TABLE_BINDMOUNTS: &str = "bindmounts";
pub const TABLE_OVERLAY2: &str = "overlay2";
