//! Printable invoices and quotes.
//!
//! A record is first turned into a [`Document`]: plain typed sections with
//! every figure already computed and formatted. The [`Renderer`] then feeds
//! that model to a Tera template. Building is pure and deterministic; writing
//! the result anywhere is the caller's business.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::Serialize;
use slug::slugify;
use tera::{Context, Tera};

use crate::config::{BankDetails, CompanyProfile};
use crate::error::Result;
use crate::model::{Invoice, LineItem, Quote};
use crate::money::{format_amount, format_money, DiscountPolicy, InvoiceTotals, QuoteTotals};

const DOCUMENT_TEMPLATE: &str = include_str!("../templates/document.html.tera");
// The .html suffix turns on Tera's autoescaping.
const TEMPLATE_NAME: &str = "document.html";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Letterhead {
    pub name: String,
    pub tagline: String,
    pub website: String,
    pub address: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

impl Field {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Field { label: label.to_string(), value: value.into() }
    }

    fn bare(value: impl Into<String>) -> Self {
        Field { label: String::new(), value: value.into() }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemRow {
    pub index: usize,
    pub description: String,
    pub unit_price: String,
    pub quantity: String,
    pub line_total: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemTable {
    pub caption: String,
    pub rows: Vec<ItemRow>,
    pub empty_text: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TotalKey {
    Services,
    Materials,
    Subtotal,
    Vat,
    Discount,
    Total,
    Paid,
    Due,
    Deposit,
}

impl TotalKey {
    pub fn as_str(self) -> &'static str {
        match self {
            TotalKey::Services => "services",
            TotalKey::Materials => "materials",
            TotalKey::Subtotal => "subtotal",
            TotalKey::Vat => "vat",
            TotalKey::Discount => "discount",
            TotalKey::Total => "total",
            TotalKey::Paid => "paid",
            TotalKey::Due => "due",
            TotalKey::Deposit => "deposit",
        }
    }
}

impl fmt::Display for TotalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a totals block; shared by the printed page and the terminal.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TotalLine {
    pub key: TotalKey,
    pub label: String,
    pub amount: f64,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Document {
    pub title: String,
    pub number: String,
    pub letterhead: Letterhead,
    pub bank: BankDetails,
    pub client: Vec<Field>,
    pub details: Vec<Field>,
    /// Paid date and reference; only on fully paid invoices.
    pub settlement: Option<Vec<Field>>,
    pub tables: Vec<ItemTable>,
    pub totals: Vec<TotalLine>,
    pub notes: Option<String>,
    pub footer: Vec<String>,
}

impl Document {
    pub fn total(&self, key: TotalKey) -> Option<&TotalLine> {
        self.totals.iter().find(|line| line.key == key)
    }

    /// `invoice-1042-john-smith.html`
    pub fn file_name(&self) -> String {
        let client = self
            .client
            .first()
            .map(|f| f.value.as_str())
            .unwrap_or_default();
        format!("{}.html", slugify(format!("{} {} {}", self.title, self.number, client)))
    }
}

/// Company, currency and discount reading shared by every document of a run.
#[derive(Debug, Clone, Copy)]
pub struct DocumentOptions<'a> {
    pub company: &'a CompanyProfile,
    pub policy: DiscountPolicy,
    pub currency: &'a str,
}

pub fn format_day(when: DateTime<Utc>) -> String {
    when.with_timezone(&Local).format("%d %b %Y").to_string()
}

/// Whole quantities print without decimals.
pub fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 && quantity.abs() < 1e15 {
        format!("{}", quantity as i64)
    } else {
        quantity.to_string()
    }
}

fn letterhead(company: &CompanyProfile, created_at: DateTime<Utc>) -> Letterhead {
    Letterhead {
        name: company.name.clone(),
        tagline: company.tagline.clone(),
        website: company.website.clone(),
        address: company.address_on(created_at).to_string(),
        phone: company.phone.clone(),
    }
}

fn item_table(caption: &str, lines: &[LineItem], currency: &str, empty_text: &str) -> ItemTable {
    let rows = lines
        .iter()
        .enumerate()
        .map(|(i, line)| ItemRow {
            index: i + 1,
            description: line.name.clone(),
            unit_price: format_money(currency, line.price),
            quantity: format_quantity(line.quantity),
            line_total: format_money(currency, line.total()),
        })
        .collect();
    ItemTable { caption: caption.to_string(), rows, empty_text: empty_text.to_string() }
}

impl TotalLine {
    /// The amount with the sign it is printed with; discounts are taken off.
    pub fn signed_amount(&self) -> f64 {
        match self.key {
            TotalKey::Discount => -self.amount,
            _ => self.amount,
        }
    }
}

fn line(key: TotalKey, label: impl Into<String>, amount: f64, currency: &str) -> TotalLine {
    let mut total_line = TotalLine { key, label: label.into(), amount, display: String::new() };
    total_line.display = format_money(currency, total_line.signed_amount());
    total_line
}

/// Sub total, VAT, discount (only when there is one), total, paid and due.
pub fn invoice_total_lines(invoice: &Invoice, policy: DiscountPolicy, currency: &str) -> Vec<TotalLine> {
    let totals = InvoiceTotals::of(invoice, policy);
    let mut lines = vec![
        line(TotalKey::Subtotal, "Sub Total", totals.subtotal, currency),
        line(TotalKey::Vat, "VAT", 0.0, currency),
    ];
    if totals.discount > 0.0 {
        lines.push(line(TotalKey::Discount, policy.label(invoice.discount), totals.discount, currency));
    }
    lines.push(line(TotalKey::Total, "Total", totals.total, currency));
    lines.push(line(TotalKey::Paid, "Amount Paid", totals.paid, currency));
    lines.push(line(TotalKey::Due, "Amount Due", totals.due, currency));
    lines
}

pub fn quote_total_lines(quote: &Quote, policy: DiscountPolicy, currency: &str) -> Vec<TotalLine> {
    let totals = QuoteTotals::of(quote, policy);
    let mut lines = vec![line(TotalKey::Services, "Services Subtotal", totals.services, currency)];
    if !quote.materials.is_empty() {
        lines.push(line(TotalKey::Materials, "Materials Subtotal", totals.materials, currency));
    }
    lines.push(line(TotalKey::Subtotal, "Subtotal", totals.subtotal, currency));
    if totals.discount > 0.0 {
        let label = match policy {
            DiscountPolicy::Flat => "Discount (flat)".to_string(),
            DiscountPolicy::Percentage => policy.label(quote.discount),
        };
        lines.push(line(TotalKey::Discount, label, totals.discount, currency));
    }
    lines.push(line(TotalKey::Total, "Total", totals.total, currency));
    lines.push(line(TotalKey::Deposit, "Deposit to Start (25%)", totals.deposit, currency));
    lines
}

fn client_block(name: &str, address: &str, post_code: &str) -> Vec<Field> {
    let address = if address.trim().is_empty() { "Address not provided" } else { address };
    vec![
        Field::new("Name", name),
        Field::new("Address", address),
        Field::bare(post_code),
    ]
}

pub fn invoice_document(invoice: &Invoice, options: DocumentOptions<'_>) -> Document {
    let mut client = client_block(&invoice.client_name, &invoice.client_address, &invoice.post_code);
    if let Some(site) = &invoice.site_address {
        client.push(Field::new("Site Address", site.as_str()));
    }
    if let Some(site_post_code) = &invoice.site_post_code {
        client.push(Field::bare(site_post_code.as_str()));
    }
    if !invoice.client_phone.is_empty() {
        client.push(Field::new("Phone No/Email", invoice.client_phone.as_str()));
    }

    let settlement = invoice.is_settled().then(|| {
        let paid_on = invoice.paid_date.unwrap_or(invoice.created_at);
        let mut fields = vec![Field::new("Paid Date", format_day(paid_on))];
        if let Some(reference) = &invoice.reference_number {
            fields.push(Field::new("Reference Number", reference.as_str()));
        }
        fields
    });

    Document {
        title: "Invoice".to_string(),
        number: invoice.invoice_number.clone(),
        letterhead: letterhead(options.company, invoice.created_at),
        bank: options.company.bank.clone(),
        client,
        details: vec![
            Field::new("Invoice Number", invoice.invoice_number.as_str()),
            Field::new("Issued Date", format_day(invoice.created_at)),
            Field::new("Payment Mode", invoice.payment_option.as_str()),
        ],
        settlement,
        tables: vec![item_table("Services", &invoice.services, options.currency, "No services")],
        totals: invoice_total_lines(invoice, options.policy, options.currency),
        notes: None,
        footer: options.company.footer.clone(),
    }
}

pub fn quote_document(quote: &Quote, options: DocumentOptions<'_>) -> Document {
    let mut client = client_block(&quote.client_name, &quote.client_address, &quote.post_code);
    if !quote.client_phone.is_empty() {
        client.push(Field::new("Phone No/Email", quote.client_phone.as_str()));
    }

    let valid_until = quote
        .valid_until
        .map(|d| d.format("%d %b %Y").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut tables = vec![item_table("Services", &quote.services, options.currency, "No services")];
    if !quote.materials.is_empty() {
        tables.push(item_table("Materials", &quote.materials, options.currency, "No materials"));
    }

    let mut footer = vec!["Thank you for your business!".to_string()];
    if !options.company.quote_footer.is_empty() {
        footer.push(options.company.quote_footer.clone());
    }

    Document {
        title: "Quotation".to_string(),
        number: quote.quote_number.clone(),
        letterhead: letterhead(options.company, quote.created_at),
        bank: options.company.bank.clone(),
        client,
        details: vec![
            Field::new("Quote Number", quote.quote_number.as_str()),
            Field::new("Issued Date", format_day(quote.created_at)),
            Field::new("Valid Until", valid_until),
        ],
        settlement: None,
        tables,
        totals: quote_total_lines(quote, options.policy, options.currency),
        notes: quote.notes.clone(),
        footer,
    }
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, DOCUMENT_TEMPLATE)?;
        Ok(Renderer { tera })
    }

    pub fn render(&self, document: &Document) -> Result<String> {
        let mut context = Context::new();
        context.insert("doc", document);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

pub fn render_invoice(invoice: &Invoice, options: DocumentOptions<'_>) -> Result<String> {
    Renderer::new()?.render(&invoice_document(invoice, options))
}

pub fn render_quote(quote: &Quote, options: DocumentOptions<'_>) -> Result<String> {
    Renderer::new()?.render(&quote_document(quote, options))
}

static TOTAL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<tr class="total-line" data-key="([a-z_]+)"><td class="label">[^<]*</td><td class="value">(-?)[^<\d-]*(\d+\.\d{2})</td></tr>"#,
    )
    .expect("totals pattern")
});

/// Reads the totals block back out of rendered markup: key to the amount as
/// printed (sign and two decimals, no symbol).
pub fn parse_totals(html: &str) -> BTreeMap<String, String> {
    TOTAL_LINE_RE
        .captures_iter(html)
        .map(|caps| (caps[1].to_string(), format!("{}{}", &caps[2], &caps[3])))
        .collect()
}

/// The amounts a rendered document must show, in the same shape as
/// [`parse_totals`].
pub fn expected_totals(lines: &[TotalLine]) -> BTreeMap<String, String> {
    lines
        .iter()
        .map(|l| (l.key.to_string(), format_amount(l.signed_amount())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn company() -> CompanyProfile {
        CompanyProfile::default()
    }

    fn options(company: &CompanyProfile) -> DocumentOptions<'_> {
        DocumentOptions { company, policy: DiscountPolicy::Flat, currency: "£" }
    }

    fn invoice() -> Invoice {
        let mut inv = Invoice::new("1042", "John Smith");
        inv.client_address = "1 High Street".into();
        inv.post_code = "UB8 1QE".into();
        inv.payment_option = "Bank Transfer".into();
        inv.services = vec![LineItem::new("Consumer unit\nupgrade", 350.0, 1.0), LineItem::new("Socket", 25.0, 2.0)];
        inv.discount = 20.0;
        inv.total_price = 380.0;
        inv.paid_amount = 100.0;
        inv.remaining_amount = 280.0;
        inv.created_at = Utc.with_ymd_and_hms(2025, 8, 4, 12, 0, 0).unwrap();
        inv
    }

    #[test]
    fn invoice_rows_and_totals() {
        let company = company();
        let doc = invoice_document(&invoice(), options(&company));
        let rows = &doc.tables[0].rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index, 2);
        assert_eq!(rows[1].unit_price, "£25.00");
        assert_eq!(rows[1].quantity, "2");
        assert_eq!(rows[1].line_total, "£50.00");
        assert_eq!(doc.total(TotalKey::Subtotal).unwrap().display, "£400.00");
        assert_eq!(doc.total(TotalKey::Discount).unwrap().display, "-£20.00");
        assert_eq!(doc.total(TotalKey::Due).unwrap().amount, 280.0);
        assert!(doc.settlement.is_none());
    }

    #[test]
    fn no_discount_row_without_discount() {
        let company = company();
        let mut inv = invoice();
        inv.discount = 0.0;
        let doc = invoice_document(&inv, options(&company));
        assert!(doc.total(TotalKey::Discount).is_none());
    }

    #[test]
    fn settled_invoice_shows_payment_block() {
        let company = company();
        let mut inv = invoice();
        inv.paid_amount = 380.0;
        inv.remaining_amount = 0.0;
        inv.reference_number = Some("REF-9".into());
        let doc = invoice_document(&inv, options(&company));
        let settlement = doc.settlement.unwrap();
        assert_eq!(settlement[0].label, "Paid Date");
        // falls back to the issue date when no paid date was recorded
        assert_eq!(settlement[0].value, format_day(inv.created_at));
        assert_eq!(settlement[1].value, "REF-9");
    }

    #[test]
    fn letterhead_address_depends_on_issue_date() {
        let company = company();
        let mut inv = invoice();
        inv.created_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let old = invoice_document(&inv, options(&company));
        assert_eq!(old.letterhead.address, "9a Oak Road Romford RM3 0PH");
        let new = invoice_document(&invoice(), options(&company));
        assert_eq!(new.letterhead.address, company.address);
    }

    #[test]
    fn rendered_totals_read_back() {
        let company = company();
        let inv = invoice();
        let html = render_invoice(&inv, options(&company)).unwrap();
        let parsed = parse_totals(&html);
        assert_eq!(parsed.get("subtotal").map(String::as_str), Some("400.00"));
        assert_eq!(parsed.get("discount").map(String::as_str), Some("-20.00"));
        assert_eq!(parsed.get("total").map(String::as_str), Some("380.00"));
        assert_eq!(parsed.get("paid").map(String::as_str), Some("100.00"));
        assert_eq!(parsed.get("due").map(String::as_str), Some("280.00"));
    }

    #[test]
    fn overpaid_invoice_reads_back_with_sign() {
        let company = company();
        let mut inv = invoice();
        inv.discount = 0.0;
        inv.total_price = 100.0;
        inv.paid_amount = 105.0;
        inv.remaining_amount = -5.0;
        let doc = invoice_document(&inv, options(&company));
        assert_eq!(doc.total(TotalKey::Due).unwrap().display, "-£5.00");

        let html = Renderer::new().unwrap().render(&doc).unwrap();
        let parsed = parse_totals(&html);
        assert_eq!(parsed.get("due").map(String::as_str), Some("-5.00"));
        assert_eq!(parsed, expected_totals(&doc.totals));
    }

    #[test]
    fn full_percentage_discount_prints_no_discount_row() {
        let company = company();
        let mut inv = invoice();
        inv.discount = 150.0;
        let options = DocumentOptions { policy: DiscountPolicy::Percentage, ..options(&company) };
        let doc = invoice_document(&inv, options);
        assert!(doc.total(TotalKey::Discount).is_none());
        assert_eq!(doc.total(TotalKey::Subtotal).unwrap().amount, inv.total_price);
    }

    #[test]
    fn markup_is_escaped() {
        let company = company();
        let mut inv = invoice();
        inv.client_name = "<b>Smith & Co</b>".into();
        let html = render_invoice(&inv, options(&company)).unwrap();
        assert!(html.contains("&lt;b&gt;Smith &amp; Co&lt;"));
        assert!(!html.contains("<b>Smith"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let company = company();
        let inv = invoice();
        assert_eq!(
            render_invoice(&inv, options(&company)).unwrap(),
            render_invoice(&inv, options(&company)).unwrap()
        );
    }

    #[test]
    fn quote_document_adds_materials_and_deposit() {
        let company = company();
        let mut quote = Quote::new("Q-12", "Jane Doe");
        quote.services = vec![LineItem::new("Rewire", 800.0, 1.0)];
        quote.materials = vec![LineItem::new("Cable 2.5mm", 1.5, 100.0)];
        quote.discount = 50.0;
        quote.notes = Some("Access via side gate".into());
        let doc = quote_document(&quote, options(&company));
        assert_eq!(doc.tables.len(), 2);
        assert_eq!(doc.total(TotalKey::Materials).unwrap().display, "£150.00");
        assert_eq!(doc.total(TotalKey::Total).unwrap().display, "£900.00");
        assert_eq!(doc.total(TotalKey::Deposit).unwrap().display, "£225.00");
        assert_eq!(doc.details[2].value, "-");

        let html = Renderer::new().unwrap().render(&doc).unwrap();
        assert_eq!(parse_totals(&html), expected_totals(&doc.totals));
        assert!(html.contains("Access via side gate"));
    }

    #[test]
    fn quote_without_materials_has_one_table() {
        let company = company();
        let quote = Quote::new("Q-13", "Jane Doe");
        let doc = quote_document(&quote, options(&company));
        assert_eq!(doc.tables.len(), 1);
        assert!(doc.total(TotalKey::Materials).is_none());
        let html = Renderer::new().unwrap().render(&doc).unwrap();
        assert!(html.contains("No services"));
    }

    #[test]
    fn file_names_are_slugs() {
        let company = company();
        let doc = invoice_document(&invoice(), options(&company));
        assert_eq!(doc.file_name(), "invoice-1042-john-smith.html");
    }

    #[test]
    fn quantities() {
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(2.5), "2.5");
    }
}
