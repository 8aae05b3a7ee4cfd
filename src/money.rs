//! Currency and quantity arithmetic.
//!
//! Raw figures reach us from form fields and from the backend as numbers,
//! numeric strings, or not at all. Everything here coerces instead of
//! failing: a value that is not a finite number counts as zero. Figures keep
//! full `f64` precision until [`format_amount`] rounds them for display.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{Invoice, LineItem, Quote};

/// Share of a quote's total asked for up front.
pub const DEPOSIT_RATE: f64 = 0.25;

/// Anything that may carry a number.
pub trait Numeric {
    /// The finite number this value stands for, if any.
    fn numeric(&self) -> Option<f64>;
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Parses user or wire text. Blank text is zero, like an empty form field.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().and_then(finite)
}

impl Numeric for f64 {
    fn numeric(&self) -> Option<f64> {
        finite(*self)
    }
}

impl Numeric for f32 {
    fn numeric(&self) -> Option<f64> {
        finite(f64::from(*self))
    }
}

macro_rules! integer_numeric {
    ($($t:ty),*) => {
        $(impl Numeric for $t {
            fn numeric(&self) -> Option<f64> {
                Some(*self as f64)
            }
        })*
    };
}

integer_numeric!(i32, i64, u32, u64, usize);

impl Numeric for str {
    fn numeric(&self) -> Option<f64> {
        parse_number(self)
    }
}

impl Numeric for String {
    fn numeric(&self) -> Option<f64> {
        parse_number(self)
    }
}

impl Numeric for serde_json::Value {
    fn numeric(&self) -> Option<f64> {
        match self {
            serde_json::Value::Null => Some(0.0),
            serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => n.as_f64().and_then(finite),
            serde_json::Value::String(s) => parse_number(s),
            _ => None,
        }
    }
}

impl<T: Numeric> Numeric for Option<T> {
    fn numeric(&self) -> Option<f64> {
        self.as_ref().and_then(Numeric::numeric)
    }
}

impl<T: Numeric + ?Sized> Numeric for &T {
    fn numeric(&self) -> Option<f64> {
        (**self).numeric()
    }
}

/// `value` as a number, or zero.
pub fn number_or_zero<N: Numeric>(value: N) -> f64 {
    value.numeric().unwrap_or(0.0)
}

pub fn line_total<P: Numeric, Q: Numeric>(price: P, quantity: Q) -> f64 {
    number_or_zero(price) * number_or_zero(quantity)
}

pub fn sum_lines(lines: &[LineItem]) -> f64 {
    lines.iter().map(LineItem::total).sum()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn deposit(total: f64) -> f64 {
    round2(total * DEPOSIT_RATE)
}

/// Two decimal places, no currency symbol.
pub fn format_amount(value: f64) -> String {
    let rounded = round2(value);
    // keep "-0.00" off the page
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.2}", rounded)
}

/// The sign goes in front of the symbol: `-£5.00`.
pub fn format_money(symbol: &str, value: f64) -> String {
    let amount = format_amount(value);
    match amount.strip_prefix('-') {
        Some(magnitude) => format!("-{}{}", symbol, magnitude),
        None => format!("{}{}", symbol, amount),
    }
}

/// Pre-discount total recovered from a stored, already discounted total.
///
/// A discount at or above 100% (or not above zero) leaves `total` as is
/// instead of dividing by zero or a negative factor.
pub fn total_before_discount(total: f64, discount_percent: f64) -> f64 {
    if discount_percent <= 0.0 || discount_percent >= 100.0 {
        return total;
    }
    total / (1.0 - discount_percent / 100.0)
}

pub fn apply_flat_discount(subtotal: f64, flat: f64) -> f64 {
    (subtotal - flat.max(0.0)).max(0.0)
}

/// How the `discount` field of a record is read. One policy is active for a
/// whole run; the two are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountPolicy {
    /// `discount` is an amount of money taken off the subtotal.
    #[default]
    Flat,
    /// `discount` is a percentage of the pre-discount subtotal.
    Percentage,
}

impl DiscountPolicy {
    /// Total after taking `discount` off `subtotal`.
    pub fn apply(self, subtotal: f64, discount: f64) -> f64 {
        match self {
            DiscountPolicy::Flat => apply_flat_discount(subtotal, discount),
            DiscountPolicy::Percentage => {
                let percent = discount.clamp(0.0, 100.0);
                subtotal * (1.0 - percent / 100.0)
            }
        }
    }

    /// Subtotal recovered from a total that already had `discount` applied.
    pub fn subtotal_from_total(self, total: f64, discount: f64) -> f64 {
        match self {
            DiscountPolicy::Flat => total + discount.max(0.0),
            DiscountPolicy::Percentage => total_before_discount(total, discount),
        }
    }

    pub fn label(self, discount: f64) -> String {
        match self {
            DiscountPolicy::Flat => "Discount".to_string(),
            DiscountPolicy::Percentage => format!("Discount ({}%)", format_amount(discount)),
        }
    }
}

impl fmt::Display for DiscountPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountPolicy::Flat => write!(f, "flat"),
            DiscountPolicy::Percentage => write!(f, "percentage"),
        }
    }
}

impl FromStr for DiscountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(DiscountPolicy::Flat),
            "percentage" | "percent" => Ok(DiscountPolicy::Percentage),
            other => Err(format!("unknown discount policy '{}'", other)),
        }
    }
}

/// Figures shown in an invoice's totals block.
///
/// `total`, `paid` and `due` are the backend's stored values; only the
/// subtotal and discount amount are derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub paid: f64,
    pub due: f64,
}

impl InvoiceTotals {
    pub fn of(invoice: &Invoice, policy: DiscountPolicy) -> Self {
        let total = invoice.total_price;
        let subtotal = policy.subtotal_from_total(total, invoice.discount);
        let discount = match policy {
            DiscountPolicy::Flat => invoice.discount.max(0.0),
            DiscountPolicy::Percentage => (subtotal - total).max(0.0),
        };
        InvoiceTotals {
            subtotal,
            discount,
            total,
            paid: invoice.paid_amount,
            due: invoice.remaining_amount,
        }
    }
}

/// Figures shown in a quote's totals block, all derived from its lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteTotals {
    pub services: f64,
    pub materials: f64,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub deposit: f64,
}

impl QuoteTotals {
    pub fn of(quote: &Quote, policy: DiscountPolicy) -> Self {
        let services = sum_lines(&quote.services);
        let materials = sum_lines(&quote.materials);
        let subtotal = services + materials;
        let total = policy.apply(subtotal, quote.discount);
        QuoteTotals {
            services,
            materials,
            subtotal,
            discount: subtotal - total,
            total,
            deposit: deposit(total),
        }
    }
}
