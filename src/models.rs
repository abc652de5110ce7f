//! Core data models for the bookkeeping bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Record type =================
//

/// Income or expense. Serialized with the upstream ledger's wire values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordType {
    #[serde(rename = "收入")]
    Income,
    #[serde(rename = "支出")]
    Expense,
}

impl RecordType {
    /// Wire representation, as emitted by the model and stored in the DB.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Income => "收入",
            RecordType::Expense => "支出",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "收入" => Some(RecordType::Income),
            "支出" => Some(RecordType::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Records =================
//

/// A parsed and validated entry that has not been persisted yet.
///
/// Field invariants (enforced by the parser, relied on by the sink):
/// - `(main_category, sub_category)` is a valid taxonomy pair
/// - `amount` is negative for expenses and positive for income
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub account: String,
    pub currency: String,
    pub record_type: RecordType,
    pub main_category: String,
    pub sub_category: String,
    pub amount: f64,
    pub name: String,
    pub merchant: String,
    /// `YYYY/MM/DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub project: String,
    pub description: String,
}

/// A durably persisted record. Created only by the record store on a
/// successful insert; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: CandidateRecord,
}

//
// ================= Health probe =================
//

/// Liveness report: provider configuration presence plus a trivial
/// storage round-trip. No real parse or insert is performed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub parser_available: bool,
    pub storage_available: bool,
}
