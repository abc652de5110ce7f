//! Parser/Validator
//!
//! Turns free-text spending/income descriptions into validated
//! `CandidateRecord`s via one LLM completion call. The prompt constrains the
//! model probabilistically; `validate_reply` then enforces the contract
//! deterministically — required fields, taxonomy membership, amount
//! coercion, sign normalization. A non-conforming reply never reaches the
//! record store.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ParseFailure;
use crate::models::{CandidateRecord, RecordType};
use crate::provider::CompletionProvider;
use crate::taxonomy;

/// Classification task, not open generation: near-deterministic sampling
/// and a tight output cap.
const TEMPERATURE: f32 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 500;

const SYSTEM_PROMPT: &str =
    "You are a professional bookkeeping assistant. You strictly output JSON in the required shape.";

/// Fields that must be present on a successful model reply.
const REQUIRED_FIELDS: &[&str] = &[
    "account",
    "currency",
    "record_type",
    "main_category",
    "sub_category",
    "amount",
    "name",
    "date",
    "time",
];

pub type ParseOutcome = std::result::Result<CandidateRecord, ParseFailure>;

pub struct RecordParser {
    provider: Arc<dyn CompletionProvider>,
}

impl RecordParser {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Whether the underlying provider is usably configured.
    pub fn ready(&self) -> bool {
        self.provider.ready()
    }

    /// Parse one message. `reference_time` grounds relative expressions
    /// ("today", "yesterday") and fills date/time defaults.
    ///
    /// Every failure mode comes back as a typed `ParseFailure`; nothing
    /// panics or escapes this boundary.
    pub async fn parse(&self, raw_text: &str, reference_time: DateTime<Utc>) -> ParseOutcome {
        let prompt = build_prompt(raw_text, reference_time);

        let reply = self
            .provider
            .complete(SYSTEM_PROMPT, &prompt, TEMPERATURE, MAX_OUTPUT_TOKENS)
            .await?;

        let outcome = validate_reply(&reply);
        match &outcome {
            Ok(record) => info!(
                main = %record.main_category,
                sub = %record.sub_category,
                amount = record.amount,
                "parsed record"
            ),
            Err(failure) => warn!("parse failed: {}", failure),
        }
        outcome
    }
}

/// Render the fixed instruction template: taxonomy verbatim, default rules,
/// sign rule, date/time formats, JSON-only demand, reference time and input.
fn build_prompt(raw_text: &str, reference_time: DateTime<Utc>) -> String {
    format!(
        r#"You are a bookkeeping assistant.
Rules:
1. From the input, identify: amount, currency (default CNY), main category, sub category, record type (支出 for expense, 收入 for income), name, merchant (default empty), date (default to the current time if absent), time (default to the current time if absent), description (default empty), project (default empty), account (default Wallet).
2. [EXTREMELY IMPORTANT] The main category and sub category MUST be chosen from the table below, exactly as written. Never invent categories. Each line is a numbered main category followed by its sub categories; drop the number when naming the category:
{taxonomy}
3. [VERY IMPORTANT] Output JSON only. On success:
{{
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
}}
If the input only carries an item name and a price, infer the categories from the item name and fill in the remaining fields with defaults.
4. [VERY IMPORTANT] If the input cannot be classified into any main and sub category, output the failure reason and a correction suggestion:
{{
    "return_code": -1,
    "return_msg": "unable to identify a main and sub category, please provide a more specific description"
}}
5. [IMPORTANT] The amount must be a number; expenses are negative, income is positive.
6. [IMPORTANT] The date format must be YYYY/MM/DD and the time format HH:MM.
7. [VERY IMPORTANT] Output nothing besides the JSON object.

Current time: {now}
Parse the following text: {input}"#,
        taxonomy = taxonomy::prompt_block(),
        now = reference_time.format("%Y/%m/%d %H:%M"),
        input = raw_text,
    )
}

/// Validate the provider's reply against the output contract.
///
/// This is a second, independent pass over the model output: a parse
/// failure is `MalformedResponse` with no partial extraction, a
/// model-declared failure (`return_code != 0`) passes the model's message
/// through untouched, and structural violations name the violated rule.
/// The amount sign is corrected silently — the record type is authoritative.
pub fn validate_reply(reply: &str) -> ParseOutcome {
    let cleaned = strip_code_fences(reply);

    let value: Value =
        serde_json::from_str(cleaned).map_err(|_| ParseFailure::MalformedResponse)?;
    let reply = value.as_object().ok_or(ParseFailure::MalformedResponse)?;

    let return_code = reply
        .get("return_code")
        .and_then(Value::as_i64)
        .ok_or(ParseFailure::MalformedResponse)?;

    if return_code != 0 {
        let msg = reply
            .get("return_msg")
            .and_then(Value::as_str)
            .unwrap_or("unable to classify the input, please provide a more specific description");
        return Err(ParseFailure::ModelDeclared(msg.to_string()));
    }

    for field in REQUIRED_FIELDS {
        if !reply.contains_key(*field) {
            return Err(ParseFailure::MissingField(field));
        }
    }

    let main_category = required_str(reply, "main_category")?;
    let sub_category = required_str(reply, "sub_category")?;

    if !taxonomy::contains_main(main_category) {
        return Err(ParseFailure::InvalidMainCategory(main_category.to_string()));
    }
    if !taxonomy::is_valid_pair(main_category, sub_category) {
        return Err(ParseFailure::InvalidSubCategory {
            main: main_category.to_string(),
            sub: sub_category.to_string(),
        });
    }

    let record_type_raw = required_str(reply, "record_type")?;
    let record_type = RecordType::from_wire(record_type_raw)
        .ok_or_else(|| ParseFailure::InvalidRecordType(record_type_raw.to_string()))?;

    let amount = normalize_amount(coerce_amount(reply.get("amount"))?, record_type);

    Ok(CandidateRecord {
        account: optional_str(reply, "account", "Wallet"),
        currency: optional_str(reply, "currency", "CNY"),
        record_type,
        main_category: main_category.to_string(),
        sub_category: sub_category.to_string(),
        amount,
        name: required_str(reply, "name")?.to_string(),
        merchant: optional_str(reply, "merchant", ""),
        date: required_str(reply, "date")?.to_string(),
        time: required_str(reply, "time")?.to_string(),
        project: optional_str(reply, "project", ""),
        description: optional_str(reply, "description", ""),
    })
}

/// Models like to wrap JSON in markdown fences even when told not to.
fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn required_str<'a>(
    reply: &'a Map<String, Value>,
    field: &'static str,
) -> std::result::Result<&'a str, ParseFailure> {
    match reply.get(field) {
        Some(value) => value.as_str().ok_or(ParseFailure::MalformedResponse),
        None => Err(ParseFailure::MissingField(field)),
    }
}

fn optional_str(reply: &Map<String, Value>, field: &str, default: &str) -> String {
    reply
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Accept a JSON number or a numeric string; anything else is
/// `InvalidAmount`.
fn coerce_amount(value: Option<&Value>) -> std::result::Result<f64, ParseFailure> {
    match value {
        Some(Value::Number(n)) => n.as_f64().ok_or(ParseFailure::InvalidAmount),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| ParseFailure::InvalidAmount),
        _ => Err(ParseFailure::InvalidAmount),
    }
}

/// Sign normalization: the record type is authoritative over whatever sign
/// the model emitted. Expenses end up negative, income positive; a
/// mismatched sign is corrected, never rejected.
fn normalize_amount(amount: f64, record_type: RecordType) -> f64 {
    match record_type {
        RecordType::Expense if amount > 0.0 => -amount,
        RecordType::Income if amount < 0.0 => amount.abs(),
        _ => amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::MockProvider;
    use chrono::TimeZone;
    use serde_json::json;

    fn success_reply() -> Value {
        json!({
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
        })
    }

    #[test]
    fn test_prompt_embeds_contract() {
        let reference = Utc.with_ymd_and_hms(2025, 8, 24, 19, 34, 0).unwrap();
        let prompt = build_prompt("today bought a bubble tea, 15", reference);

        assert!(prompt.contains("Current time: 2025/08/24 19:34"));
        assert!(prompt.contains("today bought a bubble tea, 15"));
        // Full taxonomy must appear verbatim so the model cannot invent categories.
        for (main, subs) in taxonomy::CATEGORIES {
            assert!(prompt.contains(main));
            for sub in *subs {
                assert!(prompt.contains(sub), "prompt missing {}", sub);
            }
        }
        assert!(prompt.contains("YYYY/MM/DD"));
        assert!(prompt.contains("expenses are negative, income is positive"));
    }

    #[tokio::test]
    async fn test_parse_expense_scenario() {
        // "today bought a bubble tea, 15" with the model echoing the contract.
        let provider = Arc::new(MockProvider::replying(&success_reply().to_string()));
        let parser = RecordParser::new(provider);
        let reference = Utc.with_ymd_and_hms(2025, 8, 24, 19, 34, 0).unwrap();

        let record = parser
            .parse("today bought a bubble tea, 15", reference)
            .await
            .unwrap();

        assert_eq!(record.record_type, RecordType::Expense);
        assert_eq!(record.amount, -15.0);
        assert_eq!(record.currency, "CNY");
        assert_eq!(record.account, "Wallet");
        assert_eq!(record.main_category, "Dining");
        assert_eq!(record.sub_category, "Snacks/Drinks");
        assert_eq!(record.date, "2025/08/24");
        assert_eq!(record.time, "19:34");
    }

    #[tokio::test]
    async fn test_parse_income_scenario() {
        let mut reply = success_reply();
        reply["record_type"] = json!("收入");
        reply["main_category"] = json!("Income");
        reply["sub_category"] = json!("Salary");
        reply["amount"] = json!(8000);
        reply["name"] = json!("salary");

        let provider = Arc::new(MockProvider::replying(&reply.to_string()));
        let parser = RecordParser::new(provider);

        let record = parser
            .parse("this month's salary arrived, 8000", Utc::now())
            .await
            .unwrap();

        assert_eq!(record.record_type, RecordType::Income);
        assert_eq!(record.amount, 8000.0);
        assert_eq!(record.main_category, "Income");
        assert_eq!(record.sub_category, "Salary");
    }

    #[tokio::test]
    async fn test_provider_error_becomes_typed_failure() {
        let provider = Arc::new(MockProvider::new([Err(ProviderError(
            "connection refused".to_string(),
        ))]));
        let parser = RecordParser::new(provider);

        let failure = parser.parse("bubble tea, 15", Utc::now()).await.unwrap_err();
        assert!(matches!(failure, ParseFailure::Provider(_)));
        assert_eq!(
            failure.to_string(),
            "service temporarily unavailable, please retry later"
        );
    }

    #[test]
    fn test_garbled_reply_is_malformed() {
        for garbled in [
            "I'd be happy to help with that!",
            "{not json",
            "",
            "[1, 2, 3]",
            "{\"return_msg\": \"no code\"}",
        ] {
            assert_eq!(
                validate_reply(garbled).unwrap_err(),
                ParseFailure::MalformedResponse,
                "input: {:?}",
                garbled
            );
        }
    }

    #[test]
    fn test_code_fenced_reply_is_accepted() {
        let fenced = format!("```json\n{}\n```", success_reply());
        assert!(validate_reply(&fenced).is_ok());
    }

    #[test]
    fn test_model_declared_failure_passes_message_through() {
        let reply = json!({
            "return_code": -1,
            "return_msg": "unable to identify a main and sub category, please provide a more specific description"
        });

        let failure = validate_reply(&reply.to_string()).unwrap_err();
        assert_eq!(
            failure,
            ParseFailure::ModelDeclared(
                "unable to identify a main and sub category, please provide a more specific description"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_missing_required_fields_named_individually() {
        for field in REQUIRED_FIELDS {
            let mut reply = success_reply();
            reply.as_object_mut().unwrap().remove(*field);

            assert_eq!(
                validate_reply(&reply.to_string()).unwrap_err(),
                ParseFailure::MissingField(field),
                "field: {}",
                field
            );
        }
    }

    #[test]
    fn test_full_taxonomy_accepted() {
        for (main, subs) in taxonomy::CATEGORIES {
            for sub in *subs {
                let mut reply = success_reply();
                reply["main_category"] = json!(main);
                reply["sub_category"] = json!(sub);

                let record = validate_reply(&reply.to_string()).unwrap();
                assert_eq!(record.main_category, *main);
                assert_eq!(record.sub_category, *sub);
            }
        }
    }

    #[test]
    fn test_unknown_main_category_rejected() {
        let mut reply = success_reply();
        reply["main_category"] = json!("Gadgets");

        assert_eq!(
            validate_reply(&reply.to_string()).unwrap_err(),
            ParseFailure::InvalidMainCategory("Gadgets".to_string())
        );
    }

    #[test]
    fn test_mismatched_sub_category_rejected_not_coerced() {
        let mut reply = success_reply();
        reply["sub_category"] = json!("Salary"); // valid sub, wrong main

        assert_eq!(
            validate_reply(&reply.to_string()).unwrap_err(),
            ParseFailure::InvalidSubCategory {
                main: "Dining".to_string(),
                sub: "Salary".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_record_type_rejected() {
        let mut reply = success_reply();
        reply["record_type"] = json!("transfer");

        assert_eq!(
            validate_reply(&reply.to_string()).unwrap_err(),
            ParseFailure::InvalidRecordType("transfer".to_string())
        );
    }

    #[test]
    fn test_amount_coercion() {
        let mut reply = success_reply();
        reply["amount"] = json!("15.5"); // numeric string is fine
        assert_eq!(validate_reply(&reply.to_string()).unwrap().amount, -15.5);

        reply["amount"] = json!("fifteen");
        assert_eq!(
            validate_reply(&reply.to_string()).unwrap_err(),
            ParseFailure::InvalidAmount
        );

        reply["amount"] = json!(null);
        assert_eq!(
            validate_reply(&reply.to_string()).unwrap_err(),
            ParseFailure::InvalidAmount
        );
    }

    #[test]
    fn test_sign_normalization_law() {
        // Expense with a positive amount is flipped, not rejected.
        let mut reply = success_reply();
        reply["amount"] = json!(15);
        assert_eq!(validate_reply(&reply.to_string()).unwrap().amount, -15.0);

        // Income with a negative amount is flipped.
        reply["record_type"] = json!("收入");
        reply["main_category"] = json!("Income");
        reply["sub_category"] = json!("Salary");
        reply["amount"] = json!(-8000);
        assert_eq!(validate_reply(&reply.to_string()).unwrap().amount, 8000.0);

        // Already-correct signs pass through untouched.
        reply["amount"] = json!(8000);
        assert_eq!(validate_reply(&reply.to_string()).unwrap().amount, 8000.0);
    }

    #[test]
    fn test_optional_fields_default() {
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
            "date": "2025/08/24",
            "time": "19:34"
        });

        let record = validate_reply(&reply.to_string()).unwrap();
        assert_eq!(record.merchant, "");
        assert_eq!(record.project, "");
        assert_eq!(record.description, "");
    }
}
