//! Bookkeeping service
//!
//! Composition root for one message: Parser/Validator then Record Sink.
//! Constructed once at startup with its collaborators injected; requests are
//! stateless and independent, so concurrent callers need no coordination
//! beyond what the store provides.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{HealthStatus, StoredRecord};
use crate::parser::RecordParser;
use crate::sink::RecordStore;

pub struct LedgerService {
    parser: RecordParser,
    store: Arc<dyn RecordStore>,
}

impl LedgerService {
    pub fn new(parser: RecordParser, store: Arc<dyn RecordStore>) -> Self {
        Self { parser, store }
    }

    /// Parse one free-text message and persist the resulting record.
    ///
    /// The current wall-clock time grounds the model's relative date
    /// expressions. Failures come back typed; no retry happens here.
    pub async fn parse_and_store(&self, text: &str) -> crate::Result<StoredRecord> {
        info!("parsing message: {}", text);

        let candidate = self.parser.parse(text, Utc::now()).await?;
        let stored = self.store.insert(&candidate).await.map_err(|e| {
            error!("insert failed: {}", e.0);
            e
        })?;

        info!(
            id = stored.id,
            amount = stored.record.amount,
            "record saved: {} → {}",
            stored.record.main_category,
            stored.record.sub_category
        );

        Ok(stored)
    }

    /// Liveness probe: provider configuration presence plus a trivial
    /// storage round-trip. Performs no real parse or insert.
    pub async fn health_check(&self) -> HealthStatus {
        HealthStatus {
            parser_available: self.parser.ready(),
            storage_available: self.store.ping().await.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LedgerError, ParseFailure, ProviderError};
    use crate::models::RecordType;
    use crate::provider::MockProvider;
    use crate::sink::InMemoryRecordStore;
    use serde_json::json;

    fn service_with_reply(reply: &str) -> (LedgerService, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let parser = RecordParser::new(Arc::new(MockProvider::replying(reply)));
        (
            LedgerService::new(parser, Arc::clone(&store) as Arc<dyn RecordStore>),
            store,
        )
    }

    #[tokio::test]
    async fn test_parse_and_store_success() {
        let reply = json!({
            "return_code": 0,
            "return_msg": "success",
            "account": "Wallet",
            "currency": "CNY",
            "record_type": "支出",
            "main_category": "Dining",
            "sub_category": "Snacks/Drinks",
            "amount": -15,
            "name": "bubble tea",
            "merchant": "",
            "date": "2025/08/24",
            "time": "19:34",
            "project": "",
            "description": ""
        });
        let (service, store) = service_with_reply(&reply.to_string());

        let stored = service
            .parse_and_store("today bought a bubble tea, 15")
            .await
            .unwrap();

        assert_eq!(stored.id, 1);
        assert_eq!(stored.record.record_type, RecordType::Expense);
        assert_eq!(stored.record.amount, -15.0);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_parse_failure_stores_nothing() {
        let reply = json!({
            "return_code": -1,
            "return_msg": "unable to identify a main and sub category, please provide a more specific description"
        });
        let (service, store) = service_with_reply(&reply.to_string());

        let err = service
            .parse_and_store("today bought a rocket")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Parse(ParseFailure::ModelDeclared(_))
        ));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_health_check_reports_both_probes() {
        let store = Arc::new(InMemoryRecordStore::new());
        let parser = RecordParser::new(Arc::new(MockProvider::new([Err(ProviderError(
            "unused".to_string(),
        ))])));
        let service = LedgerService::new(parser, store);

        let status = service.health_check().await;
        assert!(status.parser_available);
        assert!(status.storage_available);
    }
}
