//! Record - multi-field records over a hierarchical key-value store.
//!
//! Exposes the read/insert/update/delete record interface of a benchmark
//! driver on top of a store that only offers single-key get, put, delete and
//! prefix scan, such as etcd.
//!
//! # Architecture
//!
//! Every worker holds a [`RecordClient`] handed out by one shared
//! [`RecordDb`]. Clients acquire the single store connection through the
//! [`ConnectionManager`] on init and release it on cleanup. Client operations
//! map records to store keys using the configured [`Encoding`] and optionally
//! serve subset reads from a process-local cache shared by every client of
//! the same [`RecordDb`].
//!
//! # Key Concepts
//!
//! - **Per-field encoding**: each field lives at `/<key>/<field>`; reading
//!   every field or deleting the record is one prefix scan of `/<key>/`.
//! - **Whole-record encoding**: the record lives at `/<key>` as one value in a
//!   versioned binary format (see [`codec`]).
//! - **Merge on update**: both encodings overwrite only the fields named in an
//!   update.
//!
//! # Example
//!
//! ```ignore
//! use record::{Config, FieldMap, RecordDb, Status};
//! use bytes::Bytes;
//!
//! let db = RecordDb::new(Config::load("record.toml")?);
//! let mut client = db.client();
//! client.init().await?;
//!
//! let values = FieldMap::from([("field0".to_string(), Bytes::from("alice"))]);
//! assert_eq!(client.insert("usertable", "user1", &values).await, Status::Ok);
//!
//! let mut result = FieldMap::new();
//! assert_eq!(client.read("usertable", "user1", None, &mut result).await, Status::Ok);
//!
//! client.cleanup()?;
//! ```

mod cache;
mod client;
pub mod codec;
mod config;
mod connection;
mod error;
mod layout;
mod locks;
mod model;
pub mod path;
mod store;

pub use client::{RecordClient, RecordDb, Status};
pub use config::{CacheConfig, Config, Encoding, Endpoints};
pub use connection::{ConnectionManager, Connector, StorageConnector};
pub use error::{Error, Result};
pub use model::{FieldMap, FieldSet};
