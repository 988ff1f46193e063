//! Claim verification: route a request to its source store, gather evidence
//! for it and ask the judge.

pub mod batch_io;
pub mod catalog;
pub mod eval;
pub mod evidence;
pub mod runner;

pub use catalog::StoreCatalog;
pub use evidence::{aggregate, compose_query, EvidenceRetriever};
pub use runner::{BatchOutcome, Verifier, NO_EVIDENCE};
