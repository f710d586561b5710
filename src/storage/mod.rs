pub mod collection;
pub mod document;
pub mod filter;
pub mod memory;
pub mod persistence;
pub mod store;

pub use collection::{Doc, DocCollection};
pub use document::Document;
pub use filter::{Filter, SortOrder};
pub use memory::MemoryStore;
pub use persistence::{SnapshotFile, StoreSnapshot};
pub use store::DocumentStore;
