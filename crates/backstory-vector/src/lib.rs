//! Flat squared-L2 vector stores persisted as paired artifacts.
//!
//! One store per source. Building is offline ([`builder`]); the verifier only
//! restores and searches.

pub mod artifacts;
pub mod builder;
pub mod index;
pub mod search;
pub mod store;

pub use builder::{build_source_store, build_store, BuildReport};
pub use index::FlatIndex;
pub use search::squared_l2;
pub use store::VectorStore;
