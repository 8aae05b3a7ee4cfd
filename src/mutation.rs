//! Form state to request payloads.
//!
//! Forms hold what the user typed, as text. Each `prepare` either rejects
//! the form with [`DeskError::Validation`] (nothing is sent) or returns the
//! exact payload the backend expects.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{DeskError, Result};
use crate::model::{Invoice, LineItem, Quote};
use crate::money::{number_or_zero, parse_number};

/// A service or material row as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRow {
    pub name: String,
    pub price: String,
    pub quantity: String,
}

impl Default for LineRow {
    fn default() -> Self {
        LineRow { name: String::new(), price: String::new(), quantity: "1".to_string() }
    }
}

impl LineRow {
    pub fn new(name: impl Into<String>, price: impl Into<String>, quantity: impl Into<String>) -> Self {
        LineRow { name: name.into(), price: price.into(), quantity: quantity.into() }
    }

    fn from_item(item: &LineItem) -> Self {
        LineRow {
            name: item.name.clone(),
            price: item.price.to_string(),
            quantity: item.quantity.to_string(),
        }
    }

    /// Lenient: anything that is not a number becomes 0.
    pub fn coerce(&self) -> LineItem {
        LineItem::new(self.name.clone(), number_or_zero(&self.price), number_or_zero(&self.quantity))
    }

    /// Strict: non-blank name, price >= 0, whole quantity >= 1.
    pub fn validate(&self, kind: &str, position: usize) -> Result<LineItem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DeskError::validation(format!("{} #{}: name is required.", kind, position)));
        }
        let price = match parse_number(&self.price) {
            Some(p) if p >= 0.0 => p,
            _ => {
                return Err(DeskError::validation(format!("{} #{}: price must be ≥ 0.", kind, position)));
            }
        };
        let quantity = match parse_number(&self.quantity) {
            Some(q) if q >= 1.0 && q.fract() == 0.0 => q,
            _ => {
                return Err(DeskError::validation(format!(
                    "{} #{}: quantity must be an integer ≥ 1.",
                    kind, position
                )));
            }
        };
        Ok(LineItem::new(name, price, quantity))
    }
}

fn validate_rows(kind: &str, rows: &[LineRow]) -> Result<Vec<LineItem>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| row.validate(kind, i + 1))
        .collect()
}

fn required(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DeskError::validation(format!("{} is required.", what)));
    }
    Ok(trimmed.to_string())
}

// ==========================================
// Payment update
// ==========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentForm {
    pub paid_amount: String,
    pub reference_number: String,
    pub paid_date: Option<NaiveDate>,
}

/// Body of `PUT /api/invoices/{invoiceNumber}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub paid_amount: f64,
    pub reference_number: Option<String>,
    pub paid_date: Option<NaiveDate>,
}

impl PaymentForm {
    /// `remaining` is the invoice's amount due before this payment. A payment
    /// that clears it must carry a reference and a date; a part payment
    /// sends neither.
    pub fn prepare(&self, remaining: f64) -> Result<PaymentUpdate> {
        let paid = match parse_number(&self.paid_amount) {
            Some(p) if p > 0.0 => p,
            _ => {
                tracing::warn!(input = %self.paid_amount, "rejected payment amount");
                return Err(DeskError::validation("Invalid amount entered"));
            }
        };

        if paid < remaining {
            return Ok(PaymentUpdate { paid_amount: paid, reference_number: None, paid_date: None });
        }

        let reference = self.reference_number.trim();
        if reference.is_empty() {
            return Err(DeskError::validation(
                "A reference number is required when the invoice is paid in full.",
            ));
        }
        let Some(paid_date) = self.paid_date else {
            return Err(DeskError::validation("A paid date is required when the invoice is paid in full."));
        };
        Ok(PaymentUpdate {
            paid_amount: paid,
            reference_number: Some(reference.to_string()),
            paid_date: Some(paid_date),
        })
    }
}

// ==========================================
// Edit
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub invoice_number: String,
    pub client_name: String,
    pub client_phone: String,
    pub client_address: String,
    pub post_code: String,
    pub site_address: String,
    pub site_post_code: String,
    pub payment_option: String,
    pub category: String,
    pub services: Vec<LineRow>,
    pub paid_amount: String,
}

/// Body of `PUT /api/invoices/number/{invoiceNumber}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceEdit {
    pub client_name: String,
    pub client_phone: String,
    pub client_address: String,
    pub site_address: String,
    pub site_post_code: String,
    pub post_code: String,
    pub payment_option: String,
    pub category: String,
    pub services: Vec<LineItem>,
    pub paid_amount: f64,
}

impl EditForm {
    /// Pre-fills the form from a freshly fetched invoice. An invoice without
    /// services opens with one blank row.
    pub fn from_invoice(invoice: &Invoice) -> Self {
        let mut services: Vec<LineRow> = invoice.services.iter().map(LineRow::from_item).collect();
        if services.is_empty() {
            services.push(LineRow::default());
        }
        EditForm {
            invoice_number: invoice.invoice_number.clone(),
            client_name: invoice.client_name.clone(),
            client_phone: invoice.client_phone.clone(),
            client_address: invoice.client_address.clone(),
            post_code: invoice.post_code.clone(),
            site_address: invoice.site_address.clone().unwrap_or_default(),
            site_post_code: invoice.site_post_code.clone().unwrap_or_default(),
            payment_option: invoice.payment_option.clone(),
            category: invoice.category.clone(),
            services,
            paid_amount: invoice.paid_amount.to_string(),
        }
    }

    pub fn add_service(&mut self) {
        self.services.push(LineRow::default());
    }

    /// Removes exactly the row at `index`; other rows keep their order.
    pub fn remove_service(&mut self, index: usize) -> Option<LineRow> {
        (index < self.services.len()).then(|| self.services.remove(index))
    }

    pub fn prepare(&self) -> InvoiceEdit {
        InvoiceEdit {
            client_name: self.client_name.clone(),
            client_phone: self.client_phone.clone(),
            client_address: self.client_address.clone(),
            site_address: self.site_address.trim().to_string(),
            site_post_code: self.site_post_code.trim().to_string(),
            post_code: self.post_code.clone(),
            payment_option: self.payment_option.clone(),
            category: self.category.clone(),
            services: self.services.iter().map(LineRow::coerce).collect(),
            paid_amount: number_or_zero(&self.paid_amount),
        }
    }
}

// ==========================================
// Delete
// ==========================================

/// Proof that the user said yes to deleting `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    key: String,
}

impl DeleteConfirmation {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// `answer` is the user's reply to "Delete this record? This cannot be undone."
pub fn confirm_delete(key: &str, answer: bool) -> Result<DeleteConfirmation> {
    if !answer {
        return Err(DeskError::Cancelled);
    }
    Ok(DeleteConfirmation { key: key.to_string() })
}

// ==========================================
// Creation
// ==========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientFields {
    pub client_name: String,
    pub client_phone: String,
    pub client_address: String,
    pub post_code: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceForm {
    pub client: ClientFields,
    pub site_address: String,
    pub site_post_code: String,
    pub payment_option: String,
    pub services: Vec<LineRow>,
    pub paid_amount: String,
    pub date: NaiveDate,
}

/// Body of `POST /api/invoices/create`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub client_name: String,
    pub client_phone: String,
    pub client_address: String,
    pub post_code: String,
    pub site_address: String,
    pub site_post_code: String,
    pub payment_option: String,
    pub category: String,
    pub services: Vec<LineItem>,
    pub paid_amount: f64,
    pub date: NaiveDate,
}

impl InvoiceForm {
    pub fn new(date: NaiveDate) -> Self {
        InvoiceForm {
            client: ClientFields::default(),
            site_address: String::new(),
            site_post_code: String::new(),
            payment_option: String::new(),
            services: vec![LineRow::default()],
            paid_amount: String::new(),
            date,
        }
    }

    pub fn prepare(&self) -> Result<InvoiceDraft> {
        let client_name = required(&self.client.client_name, "Client name")?;
        let client_address = required(&self.client.client_address, "Client address")?;
        let post_code = required(&self.client.post_code, "Post code")?;
        if self.services.is_empty() {
            return Err(DeskError::validation("Please add at least one service."));
        }
        let services = validate_rows("Service", &self.services)?;
        let paid_amount = match parse_number(&self.paid_amount) {
            Some(p) if p >= 0.0 => p,
            _ => return Err(DeskError::validation("Paid amount must be greater than or equal to 0.")),
        };
        Ok(InvoiceDraft {
            client_name,
            client_phone: self.client.client_phone.trim().to_string(),
            client_address,
            post_code,
            site_address: self.site_address.trim().to_string(),
            site_post_code: self.site_post_code.trim().to_string(),
            payment_option: self.payment_option.trim().to_string(),
            category: self.client.category.clone(),
            services,
            paid_amount,
            date: self.date,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteForm {
    pub client: ClientFields,
    pub services: Vec<LineRow>,
    pub materials: Vec<LineRow>,
    pub discount: String,
    pub date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub notes: String,
}

/// Body of `POST /api/quotes/create`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDraft {
    pub client_name: String,
    pub client_phone: String,
    pub client_address: String,
    pub post_code: String,
    pub category: String,
    pub services: Vec<LineItem>,
    pub materials: Vec<LineItem>,
    pub discount: f64,
    pub date: NaiveDate,
    pub valid_until: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl QuoteForm {
    pub fn new(date: NaiveDate) -> Self {
        QuoteForm {
            client: ClientFields::default(),
            services: vec![LineRow::default()],
            materials: Vec::new(),
            discount: String::new(),
            date,
            valid_until: None,
            notes: String::new(),
        }
    }

    pub fn prepare(&self) -> Result<QuoteDraft> {
        if self.services.is_empty() {
            return Err(DeskError::validation("Please add at least one service."));
        }
        let services = validate_rows("Service", &self.services)?;
        let materials = validate_rows("Material", &self.materials)?;
        let Some(valid_until) = self.valid_until else {
            return Err(DeskError::validation("Please select a 'Valid Until' date."));
        };
        let notes = self.notes.trim();
        Ok(QuoteDraft {
            client_name: self.client.client_name.trim().to_string(),
            client_phone: self.client.client_phone.trim().to_string(),
            client_address: self.client.client_address.trim().to_string(),
            post_code: self.client.post_code.trim().to_string(),
            category: self.client.category.clone(),
            services,
            materials,
            // never negative
            discount: number_or_zero(&self.discount).max(0.0),
            date: self.date,
            valid_until,
            notes: (!notes.is_empty()).then(|| notes.to_string()),
        })
    }
}

// ==========================================
// Quote to invoice
// ==========================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionForm {
    pub paid_amount: String,
    pub payment_option: String,
}

impl ConversionForm {
    /// Services then materials become the invoice's services.
    pub fn prepare(&self, quote: &Quote, today: NaiveDate) -> Result<InvoiceDraft> {
        let paid_amount = match parse_number(&self.paid_amount) {
            Some(p) if p >= 0.0 => p,
            _ => return Err(DeskError::validation("Paid amount must be greater than or equal to 0.")),
        };
        let payment_option = required(&self.payment_option, "Payment option")?;
        let services: Vec<LineItem> = quote
            .services
            .iter()
            .chain(quote.materials.iter())
            .cloned()
            .collect();
        if services.is_empty() {
            return Err(DeskError::validation("No services or materials to convert."));
        }
        Ok(InvoiceDraft {
            client_name: quote.client_name.clone(),
            client_phone: quote.client_phone.clone(),
            client_address: quote.client_address.clone(),
            post_code: quote.post_code.clone(),
            site_address: String::new(),
            site_post_code: String::new(),
            payment_option,
            category: quote.category.clone(),
            services,
            paid_amount,
            date: today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn payment_rejects_non_positive_amounts() {
        for input in ["", "0", "-5", "abc", "inf"] {
            let form = PaymentForm { paid_amount: input.into(), ..Default::default() };
            assert!(
                matches!(form.prepare(100.0), Err(DeskError::Validation(_))),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn part_payment_sends_nulls() {
        let form = PaymentForm {
            paid_amount: "40".into(),
            reference_number: "REF".into(),
            paid_date: Some(day(2025, 5, 1)),
        };
        let update = form.prepare(100.0).unwrap();
        assert_eq!(update, PaymentUpdate { paid_amount: 40.0, reference_number: None, paid_date: None });
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "paidAmount": 40.0, "referenceNumber": null, "paidDate": null })
        );
    }

    #[test]
    fn full_payment_needs_reference_and_date() {
        let mut form = PaymentForm { paid_amount: "100".into(), ..Default::default() };
        assert!(form.prepare(100.0).is_err());
        form.reference_number = "  BACS-77 ".into();
        assert!(form.prepare(100.0).is_err());
        form.paid_date = Some(day(2025, 5, 1));
        let update = form.prepare(100.0).unwrap();
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "paidAmount": 100.0, "referenceNumber": "BACS-77", "paidDate": "2025-05-01" })
        );
    }

    #[test]
    fn overpayment_counts_as_full() {
        let form = PaymentForm { paid_amount: "150".into(), ..Default::default() };
        assert!(form.prepare(100.0).is_err());
    }

    fn edit_form() -> EditForm {
        let mut invoice = Invoice::new("1042", "John Smith");
        invoice.services = vec![LineItem::new("A", 10.0, 1.0), LineItem::new("B", 20.0, 2.0)];
        invoice.paid_amount = 15.0;
        EditForm::from_invoice(&invoice)
    }

    #[test]
    fn edit_coerces_numbers() {
        let mut form = edit_form();
        form.services[0].price = "abc".into();
        form.services[1].quantity = "3".into();
        form.site_address = "  Unit 4  ".into();
        let edit = form.prepare();
        assert_eq!(edit.services[0].price, 0.0);
        assert_eq!(edit.services[1].quantity, 3.0);
        assert_eq!(edit.site_address, "Unit 4");
        assert_eq!(edit.site_post_code, "");
        assert_eq!(edit.paid_amount, 15.0);
        let body = serde_json::to_value(&edit).unwrap();
        assert_eq!(body["services"][1], json!({ "name": "B", "price": 20.0, "quantity": 3.0 }));
        assert!(body.get("invoiceNumber").is_none());
    }

    #[test]
    fn edit_rows_add_and_remove_in_order() {
        let mut form = edit_form();
        form.add_service();
        assert_eq!(form.services.len(), 3);
        assert_eq!(form.services[2], LineRow::default());

        let removed = form.remove_service(0).unwrap();
        assert_eq!(removed.name, "A");
        assert_eq!(form.services.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), ["B", ""]);
        assert!(form.remove_service(5).is_none());
        assert_eq!(form.services.len(), 2);
    }

    #[test]
    fn empty_invoice_opens_with_a_blank_row() {
        let form = EditForm::from_invoice(&Invoice::new("1", "X"));
        assert_eq!(form.services, vec![LineRow::default()]);
    }

    #[test]
    fn delete_needs_a_yes() {
        assert!(matches!(confirm_delete("1042", false), Err(DeskError::Cancelled)));
        assert_eq!(confirm_delete("1042", true).unwrap().key(), "1042");
    }

    #[test]
    fn quote_validation_guards() {
        let mut form = QuoteForm::new(day(2025, 5, 1));
        form.services = vec![LineRow::new("Rewire", "800", "1")];
        assert!(form.prepare().is_err(), "valid until is required");

        form.valid_until = Some(day(2025, 6, 1));
        form.materials = vec![LineRow::new("Cable", "1.5", "2.5")];
        let err = form.prepare().unwrap_err().to_string();
        assert!(err.contains("Material #1: quantity"), "{}", err);

        form.materials = vec![LineRow::new(" Cable ", "1.5", "100")];
        form.discount = "-20".into();
        form.notes = "   ".into();
        let draft = form.prepare().unwrap();
        assert_eq!(draft.materials[0].name, "Cable");
        assert_eq!(draft.discount, 0.0);
        assert_eq!(draft.notes, None);
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["validUntil"], "2025-06-01");
        assert!(body.get("notes").is_none());
    }

    #[test]
    fn quote_needs_services() {
        let mut form = QuoteForm::new(day(2025, 5, 1));
        form.services.clear();
        form.valid_until = Some(day(2025, 6, 1));
        assert!(form.prepare().is_err());
        form.services = vec![LineRow::new("", "10", "1")];
        assert!(form.prepare().unwrap_err().to_string().contains("Service #1: name"));
        form.services = vec![LineRow::new("Visit", "-1", "1")];
        assert!(form.prepare().unwrap_err().to_string().contains("price"));
    }

    #[test]
    fn invoice_creation_requires_client_details() {
        let mut form = InvoiceForm::new(day(2025, 5, 1));
        form.services = vec![LineRow::new("Visit", "60", "1")];
        assert!(form.prepare().is_err());
        form.client = ClientFields {
            client_name: "John Smith".into(),
            client_address: "1 High Street".into(),
            post_code: "UB8 1QE".into(),
            ..Default::default()
        };
        let draft = form.prepare().unwrap();
        assert_eq!(draft.paid_amount, 0.0);
        assert_eq!(serde_json::to_value(&draft).unwrap()["date"], "2025-05-01");
    }

    #[test]
    fn conversion_concatenates_lines() {
        let mut quote = Quote::new("Q-1", "Jane Doe");
        quote.services = vec![LineItem::new("Rewire", 800.0, 1.0)];
        quote.materials = vec![LineItem::new("Cable", 1.5, 100.0)];
        let form = ConversionForm { paid_amount: "0".into(), payment_option: "Cash".into() };
        let draft = form.prepare(&quote, day(2025, 5, 2)).unwrap();
        assert_eq!(draft.services.len(), 2);
        assert_eq!(draft.services[1].name, "Cable");
        assert_eq!(draft.date, day(2025, 5, 2));

        let no_option = ConversionForm { paid_amount: "0".into(), payment_option: " ".into() };
        assert!(no_option.prepare(&quote, day(2025, 5, 2)).is_err());
        let negative = ConversionForm { paid_amount: "-1".into(), payment_option: "Cash".into() };
        assert!(negative.prepare(&quote, day(2025, 5, 2)).is_err());
        let empty = Quote::new("Q-2", "Nobody");
        assert!(form.prepare(&empty, day(2025, 5, 2)).is_err());
    }
}
