use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::money::{line_total, number_or_zero};

/// A service or material row: free-text name, unit price, quantity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
}

impl LineItem {
    pub fn new(name: impl Into<String>, price: f64, quantity: f64) -> Self {
        LineItem { name: name.into(), price, quantity }
    }

    pub fn total(&self) -> f64 {
        line_total(self.price, self.quantity)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_code: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub site_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub site_post_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_option: String,
    #[serde(default)]
    pub services: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub discount: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub paid_amount: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub remaining_amount: f64,
    #[serde(default, deserialize_with = "lenient_opt_timestamp")]
    pub paid_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub reference_number: Option<String>,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(invoice_number: impl Into<String>, client_name: impl Into<String>) -> Self {
        Invoice {
            id: None,
            invoice_number: invoice_number.into(),
            client_name: client_name.into(),
            client_phone: String::new(),
            client_address: String::new(),
            post_code: String::new(),
            site_address: None,
            site_post_code: None,
            category: String::new(),
            payment_option: String::new(),
            services: Vec::new(),
            discount: 0.0,
            total_price: 0.0,
            paid_amount: 0.0,
            remaining_amount: 0.0,
            paid_date: None,
            reference_number: None,
            created_at: Utc::now(),
        }
    }

    /// Nothing left to pay.
    pub fn is_settled(&self) -> bool {
        self.remaining_amount == 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub quote_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default)]
    pub services: Vec<LineItem>,
    #[serde(default)]
    pub materials: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub discount: f64,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_opt_date")]
    pub valid_until: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub notes: Option<String>,
}

impl Quote {
    pub fn new(quote_number: impl Into<String>, client_name: impl Into<String>) -> Self {
        Quote {
            id: None,
            quote_number: quote_number.into(),
            client_name: client_name.into(),
            client_phone: String::new(),
            client_address: String::new(),
            post_code: String::new(),
            category: String::new(),
            services: Vec::new(),
            materials: Vec::new(),
            discount: 0.0,
            created_at: Utc::now(),
            valid_until: None,
            notes: None,
        }
    }
}

/// The signed-in account as reported by `/api/auth/me`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// A client record returned by the autocomplete search.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSuggestion {
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_phone: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub post_code: String,
}

/// What the list, filter and store layers need from an invoice or a quote.
pub trait Record {
    const KIND: &'static str;

    /// The human-facing invoice or quote number.
    fn business_key(&self) -> &str;
    fn client_name(&self) -> &str;
    fn category(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    /// `None` for records that carry no payment state.
    fn remaining_amount(&self) -> Option<f64>;
}

impl Record for Invoice {
    const KIND: &'static str = "invoice";

    fn business_key(&self) -> &str {
        &self.invoice_number
    }
    fn client_name(&self) -> &str {
        &self.client_name
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn remaining_amount(&self) -> Option<f64> {
        Some(self.remaining_amount)
    }
}

impl Record for Quote {
    const KIND: &'static str = "quote";

    fn business_key(&self) -> &str {
        &self.quote_number
    }
    fn client_name(&self) -> &str {
        &self.client_name
    }
    fn category(&self) -> &str {
        &self.category
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn remaining_amount(&self) -> Option<f64> {
        None
    }
}

// ==========================================
// Wire helpers
// ==========================================

/// RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (read as UTC) or a bare date
/// (UTC midnight).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(text).map(|ts| ts.date_naive()))
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| number_or_zero(&v)).unwrap_or(0.0))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_string).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_string).filter(|s| !s.trim().is_empty()))
}

fn lenient_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_string).and_then(|s| parse_timestamp(&s)))
}

fn lenient_opt_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_string).and_then(|s| parse_day(&s)))
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", text)))
}
