//! Validates transaction payloads against the domain rules.
//!
//! [validate] is a pure function: it performs no I/O, does not consult the
//! clock, and the same payload always yields the same result. Every violated
//! rule is collected rather than short-circuiting on the first, so the caller
//! can report all problems at once.
//!
//! Cross-field constraints run as a composable rule list after the per-field
//! pass, so new constraints slot in without restructuring the validator.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};

use crate::models::{AccountId, CategoryId, DatabaseID, RecurringInterval, TransactionType};

/// A validation failure attached to a single payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The wire name of the offending field, e.g. `"recurringInterval"`.
    pub field: &'static str,
    /// A human readable message, shown verbatim next to the form field.
    pub message: String,
}

impl FieldError {
    /// Create a field error for `field` with `message`.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A candidate transaction as submitted over the wire.
///
/// Values are kept raw so that coercion failures (a non-numeric amount, an
/// unparsable date) are expressible as field errors rather than
/// deserialization failures. Both manual form input and the untrusted receipt
/// scanner submit this shape; neither gets a shortcut around [validate].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionPayload {
    /// `"INCOME"` or `"EXPENSE"`.
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// The amount of money, expected to coerce to a number greater than zero.
    pub amount: Option<String>,
    /// Free text describing the transaction.
    pub description: Option<String>,
    /// The date the transaction occurred, in `YYYY-MM-DD` form.
    pub date: Option<String>,
    /// The ID of the account the transaction belongs to.
    pub account_id: Option<String>,
    /// The ID of the category for the transaction.
    pub category: Option<String>,
    /// Whether the transaction repeats. Defaults to false when absent.
    pub is_recurring: Option<bool>,
    /// One of `"DAILY"`, `"WEEKLY"`, `"MONTHLY"`, `"YEARLY"`. Only meaningful
    /// when `is_recurring` is true; silently dropped otherwise.
    pub recurring_interval: Option<String>,
}

/// A payload that passed every validation rule, with fields coerced to the
/// domain types.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTransaction {
    /// Whether this is money in or money out.
    pub transaction_type: TransactionType,
    /// The amount of money, strictly greater than zero.
    pub amount: f64,
    /// When the transaction occurred.
    pub date: Date,
    /// Free text describing the transaction.
    pub description: Option<String>,
    /// The account the transaction belongs to.
    pub account_id: AccountId,
    /// The category for the transaction.
    pub category_id: CategoryId,
    /// `Some` if and only if the payload asked for a recurring schedule.
    pub recurring_interval: Option<RecurringInterval>,
}

/// A rule that inspects the whole payload after the per-field pass.
type CrossFieldRule = fn(&TransactionPayload) -> Option<FieldError>;

const CROSS_FIELD_RULES: &[CrossFieldRule] =
    &[recurring_interval_required, recurring_interval_well_formed];

/// Check `payload` against the domain rules, collecting every violation.
///
/// # Errors
/// Returns the full list of [FieldError]s when any rule is violated. Field
/// names in the errors use the wire spelling (e.g. `"accountId"`) so they map
/// one-to-one onto form fields.
pub fn validate(payload: &TransactionPayload) -> Result<ValidTransaction, Vec<FieldError>> {
    let mut errors = Vec::new();

    let transaction_type = match payload.transaction_type.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<TransactionType>() {
            Ok(transaction_type) => Some(transaction_type),
            Err(_) => {
                errors.push(FieldError::new(
                    "type",
                    "Type must be either INCOME or EXPENSE",
                ));
                None
            }
        },
        _ => {
            errors.push(FieldError::new(
                "type",
                "Type must be either INCOME or EXPENSE",
            ));
            None
        }
    };

    let amount = match payload.amount.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<f64>() {
            Ok(amount) if amount > 0.0 && amount.is_finite() => Some(amount),
            _ => {
                errors.push(FieldError::new("amount", "Amount must be greater than 0"));
                None
            }
        },
        _ => {
            errors.push(FieldError::new("amount", "Amount must be greater than 0"));
            None
        }
    };

    let date = match payload.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match parse_date(raw) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(FieldError::new(
                    "date",
                    format!("{raw:?} is not a valid calendar date"),
                ));
                None
            }
        },
        _ => {
            errors.push(FieldError::new("date", "Date is required"));
            None
        }
    };

    let account_id = parse_id(
        payload.account_id.as_deref(),
        "accountId",
        "Account is required",
        &mut errors,
    );
    let category_id = parse_id(
        payload.category.as_deref(),
        "category",
        "Category is required",
        &mut errors,
    );

    for rule in CROSS_FIELD_RULES {
        if let Some(error) = rule(payload) {
            errors.push(error);
        }
    }

    // An interval on a non-recurring payload is stale UI state, not an error;
    // it is simply never persisted.
    let recurring_interval = if payload.is_recurring.unwrap_or(false) {
        payload
            .recurring_interval
            .as_deref()
            .map(str::trim)
            .and_then(|raw| raw.parse::<RecurringInterval>().ok())
    } else {
        None
    };

    match (transaction_type, amount, date, account_id, category_id) {
        (Some(transaction_type), Some(amount), Some(date), Some(account_id), Some(category_id))
            if errors.is_empty() =>
        {
            Ok(ValidTransaction {
                transaction_type,
                amount,
                date,
                description: payload
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|description| !description.is_empty())
                    .map(str::to_owned),
                account_id,
                category_id,
                recurring_interval,
            })
        }
        _ => Err(errors),
    }
}

fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
}

fn parse_id(
    raw: Option<&str>,
    field: &'static str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<DatabaseID> {
    match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<DatabaseID>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(FieldError::new(field, message));
                None
            }
        },
        _ => {
            errors.push(FieldError::new(field, message));
            None
        }
    }
}

fn recurring_interval_required(payload: &TransactionPayload) -> Option<FieldError> {
    let recurring = payload.is_recurring.unwrap_or(false);
    let missing = payload
        .recurring_interval
        .as_deref()
        .is_none_or(|raw| raw.trim().is_empty());

    (recurring && missing).then(|| {
        FieldError::new(
            "recurringInterval",
            "Recurring interval is required for recurring transactions",
        )
    })
}

fn recurring_interval_well_formed(payload: &TransactionPayload) -> Option<FieldError> {
    if !payload.is_recurring.unwrap_or(false) {
        return None;
    }

    match payload.recurring_interval.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() && raw.parse::<RecurringInterval>().is_err() => {
            Some(FieldError::new(
                "recurringInterval",
                "Recurring interval must be one of DAILY, WEEKLY, MONTHLY or YEARLY",
            ))
        }
        _ => None,
    }
}
