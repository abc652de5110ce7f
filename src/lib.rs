//! AI Bookkeeping Bot
//!
//! Converts free-text spending/income descriptions into structured ledger
//! entries via one LLM completion call, then persists them:
//! - Builds a strict prompt around a fixed category taxonomy
//! - Validates the model reply deterministically before anything is stored
//! - Assigns ids and persists records through a pluggable record store
//!
//! FLOW: raw text → Parser/Validator → CandidateRecord → Record Sink → StoredRecord

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod provider;
pub mod service;
pub mod sink;
pub mod taxonomy;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use parser::RecordParser;
pub use service::LedgerService;
