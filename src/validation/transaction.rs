use rust_decimal::Decimal;
use serde_json::Value;
use time::Date;

use super::rules::{self, Parsed, CREATE_TRANSACTION, TRANSACTION_FILTER, UPDATE_TRANSACTION};
use super::{ValidationErrors, ValidationResult};
use crate::transactions::repo_types::{
    NewTransaction, PageRequest, TransactionFilter, TransactionPatch, TransactionType,
};

const MAX_PAGE_LIMIT: i64 = 100;

/// Validated create payload, not yet bound to an owner.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub kind: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: Date,
}

impl TransactionDraft {
    pub fn owned_by(self, user_id: i64) -> NewTransaction {
        NewTransaction {
            user_id,
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            date: self.date,
        }
    }
}

pub fn validate_create_transaction(input: &Value) -> ValidationResult<TransactionDraft> {
    let parsed = rules::apply(CREATE_TRANSACTION, input)?;
    match (parsed.kind("type"), parsed.amount("amount"), parsed.date("date")) {
        (Some(kind), Some(amount), Some(date)) => Ok(TransactionDraft {
            kind,
            amount,
            description: parsed.text("description").flatten(),
            date,
        }),
        // apply() only succeeds when every required field parsed.
        _ => Err(ValidationErrors::single("input", "Invalid transaction data")),
    }
}

pub fn validate_update_transaction(input: &Value) -> ValidationResult<TransactionPatch> {
    let parsed = rules::apply(UPDATE_TRANSACTION, input)?;
    if parsed.is_empty() {
        return Err(ValidationErrors::single(
            "input",
            "At least one field must be provided for update",
        ));
    }
    Ok(patch_from(&parsed))
}

fn patch_from(parsed: &Parsed) -> TransactionPatch {
    TransactionPatch {
        kind: parsed.kind("type"),
        amount: parsed.amount("amount"),
        description: parsed.text("description"),
        date: parsed.date("date"),
    }
}

pub fn validate_transaction_filter(input: &Value) -> ValidationResult<TransactionFilter> {
    let parsed = rules::apply(TRANSACTION_FILTER, input)?;
    let filter = TransactionFilter {
        kind: parsed.kind("type"),
        start_date: parsed.date("startDate"),
        end_date: parsed.date("endDate"),
    };
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(ValidationErrors::single(
                "startDate",
                "Start date cannot be after end date",
            ));
        }
    }
    Ok(filter)
}

/// Filter plus pagination from one raw query object.
pub fn validate_transaction_query(
    input: &Value,
) -> ValidationResult<(TransactionFilter, PageRequest)> {
    let mut errors = ValidationErrors::new();
    let filter = validate_transaction_filter(input)
        .map_err(|e| errors.extend(e))
        .ok();

    let page = positive_integer(input.get("page"), 1, "Page must be a positive integer")
        .map_err(|m| errors.push("page", m))
        .ok();
    let limit = positive_integer(input.get("limit"), 10, "Limit must be a positive integer")
        .and_then(|limit| {
            if limit > MAX_PAGE_LIMIT {
                Err("Limit cannot exceed 100")
            } else {
                Ok(limit)
            }
        })
        .map_err(|m| errors.push("limit", m))
        .ok();

    match (filter, page, limit) {
        (Some(filter), Some(page), Some(limit)) => {
            // The row offset must fit in a BIGINT.
            if (page - 1).checked_mul(limit).is_none() {
                errors.push("page", "Page is out of range");
                return Err(errors);
            }
            Ok((filter, PageRequest { page, limit }))
        }
        _ => Err(errors),
    }
}

/// Query-string values arrive as strings, so numeric strings are accepted.
fn positive_integer(
    raw: Option<&Value>,
    default: i64,
    message: &'static str,
) -> Result<i64, &'static str> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(default),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    value.filter(|v| *v > 0).ok_or(message)
}

pub fn validate_transaction_id(raw: &Value) -> ValidationResult<i64> {
    validate_id(raw, "id", "Transaction ID")
}

pub fn validate_user_id(raw: &Value) -> ValidationResult<i64> {
    validate_id(raw, "userId", "User ID")
}

/// Number, then integer, then positive; each predicate has its own message.
fn validate_id(raw: &Value, field: &str, label: &str) -> ValidationResult<i64> {
    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite());

    let Some(number) = number else {
        return Err(ValidationErrors::single(field, format!("{label} must be a number")));
    };
    if number.fract() != 0.0 || number.abs() > i64::MAX as f64 {
        return Err(ValidationErrors::single(
            field,
            format!("{label} must be an integer"),
        ));
    }
    if number <= 0.0 {
        return Err(ValidationErrors::single(
            field,
            format!("{label} must be positive"),
        ));
    }
    // Exact for integers; avoids f64 rounding on large ids.
    Ok(raw
        .as_i64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .unwrap_or(number as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    #[test]
    fn create_normalizes_input() {
        let draft = validate_create_transaction(&json!({
            "type": "EXPENSE",
            "amount": 25.50,
            "description": "  coffee  ",
            "date": "2024-01-15"
        }))
        .unwrap();
        assert_eq!(draft.kind, TransactionType::Expense);
        assert_eq!(draft.amount, Decimal::new(255, 1));
        assert_eq!(draft.description.as_deref(), Some("coffee"));
        assert_eq!(draft.date, date!(2024 - 01 - 15));
    }

    #[test]
    fn create_accepts_local_date_time() {
        let draft = validate_create_transaction(&json!({
            "type": "INCOME",
            "amount": 10,
            "date": "2024-01-15T10:00:00"
        }))
        .unwrap();
        assert_eq!(draft.date, date!(2024 - 01 - 15));
    }

    #[test]
    fn create_treats_blank_description_as_absent() {
        let draft = validate_create_transaction(&json!({
            "type": "INCOME",
            "amount": 10,
            "description": "   ",
            "date": "2024-01-15"
        }))
        .unwrap();
        assert_eq!(draft.description, None);
    }

    #[test]
    fn create_rejects_long_description() {
        let errors = validate_create_transaction(&json!({
            "type": "INCOME",
            "amount": 10,
            "description": "x".repeat(501),
            "date": "2024-01-15"
        }))
        .unwrap_err();
        assert_eq!(
            errors.first_message(),
            "Description cannot exceed 500 characters"
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let input = json!({ "type": "INCOME", "amount": 100.123, "date": "nope" });
        assert_eq!(
            validate_create_transaction(&input),
            validate_create_transaction(&input)
        );
    }

    #[test]
    fn empty_update_is_rejected() {
        let errors = validate_update_transaction(&json!({})).unwrap_err();
        assert_eq!(
            errors.first_message(),
            "At least one field must be provided for update"
        );
        let errors = validate_update_transaction(&json!({ "color": "red" })).unwrap_err();
        assert_eq!(
            errors.first_message(),
            "At least one field must be provided for update"
        );
    }

    #[test]
    fn update_is_sparse() {
        let patch = validate_update_transaction(&json!({ "amount": 30 })).unwrap();
        assert_eq!(
            patch,
            TransactionPatch {
                amount: Some(Decimal::from(30)),
                ..TransactionPatch::default()
            }
        );

        let patch = validate_update_transaction(&json!({ "description": null })).unwrap();
        assert_eq!(patch.description, Some(None));
    }

    #[test]
    fn update_checks_each_present_field() {
        let errors = validate_update_transaction(&json!({ "type": "GIFT", "amount": -5 }))
            .unwrap_err();
        assert_eq!(
            errors.messages(),
            vec![
                "type: Transaction type must be either INCOME or EXPENSE".to_string(),
                "amount: Amount must be a positive number".to_string(),
            ]
        );
    }

    #[test]
    fn filter_date_order() {
        let errors = validate_transaction_filter(&json!({
            "startDate": "2024-02-01",
            "endDate": "2024-01-01"
        }))
        .unwrap_err();
        assert_eq!(errors.first_message(), "Start date cannot be after end date");

        let filter = validate_transaction_filter(&json!({
            "type": "INCOME",
            "startDate": "2024-01-01",
            "endDate": ""
        }))
        .unwrap();
        assert_eq!(filter.kind, Some(TransactionType::Income));
        assert_eq!(filter.start_date, Some(date!(2024 - 01 - 01)));
        assert_eq!(filter.end_date, None);
    }

    #[test]
    fn filter_accepts_far_future_bounds() {
        assert!(validate_transaction_filter(&json!({ "endDate": "2999-01-01" })).is_ok());
        let errors = validate_transaction_filter(&json!({ "startDate": "soon" })).unwrap_err();
        assert!(errors.messages()[0].starts_with("startDate: "));
    }

    #[test]
    fn pagination_defaults_and_limits() {
        let (_, page) = validate_transaction_query(&json!({})).unwrap();
        assert_eq!(page, PageRequest { page: 1, limit: 10 });

        let (_, page) = validate_transaction_query(&json!({ "page": "3", "limit": "25" })).unwrap();
        assert_eq!(page, PageRequest { page: 3, limit: 25 });

        let errors = validate_transaction_query(&json!({ "limit": 101 })).unwrap_err();
        assert_eq!(errors.first_message(), "Limit cannot exceed 100");

        let errors = validate_transaction_query(&json!({
            "page": i64::MAX.to_string(),
            "limit": "10"
        }))
        .unwrap_err();
        assert_eq!(errors.first_message(), "Page is out of range");

        let last = i64::MAX / 100 + 1;
        let (_, page) =
            validate_transaction_query(&json!({ "page": last, "limit": 100 })).unwrap();
        assert_eq!(page.offset(), (last - 1) * 100);

        let errors = validate_transaction_query(&json!({ "page": 0, "limit": "x" })).unwrap_err();
        assert_eq!(
            errors.messages(),
            vec![
                "page: Page must be a positive integer".to_string(),
                "limit: Limit must be a positive integer".to_string(),
            ]
        );
    }

    #[test]
    fn id_predicates_have_distinct_messages() {
        assert_eq!(validate_transaction_id(&json!(7)), Ok(7));
        assert_eq!(validate_transaction_id(&json!("42")), Ok(42));
        assert_eq!(
            validate_transaction_id(&json!("abc")).unwrap_err().first_message(),
            "Transaction ID must be a number"
        );
        assert_eq!(
            validate_transaction_id(&json!(1.5)).unwrap_err().first_message(),
            "Transaction ID must be an integer"
        );
        assert_eq!(
            validate_user_id(&json!(0)).unwrap_err().first_message(),
            "User ID must be positive"
        );
        assert_eq!(
            validate_user_id(&json!(null)).unwrap_err().first_message(),
            "User ID must be a number"
        );
    }
}
