//! Durable liveness storage
//!
//! `kv` holds the primitive key/value backends (sled and in-memory);
//! `heartbeat` is the typed record every other component reads and writes.

pub mod heartbeat;
pub mod kv;

pub use heartbeat::{HeartbeatRecord, HeartbeatStore, RecoveryDiagnostics};
pub use kv::{InMemoryStore, KeyValueStore, SledStore, StorageError};
