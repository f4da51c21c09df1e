//! Store implementations
//!
//! - `MemoryStore`: in-memory, for tests and restart-tolerant deployments
//! - `FileStore`: dual-slot checksummed snapshot files with torn-write
//!   recovery

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
