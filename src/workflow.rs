//! Validate, call the backend, merge into the local snapshot.
//!
//! Every mutating flow runs in that order and touches the stores only after
//! the backend has answered successfully, so a failed step leaves the local
//! lists exactly as they were.

use chrono::NaiveDate;

use crate::api::InvoiceApi;
use crate::document::{invoice_document, quote_document, Document, DocumentOptions};
use crate::error::{DeskError, Result};
use crate::model::{ClientSuggestion, Invoice, Quote};
use crate::mutation::{
    ConversionForm, DeleteConfirmation, EditForm, InvoiceForm, PaymentForm, QuoteForm,
};
use crate::store::RecordStore;

pub struct Desk<A> {
    api: A,
    invoices: RecordStore<Invoice>,
    quotes: RecordStore<Quote>,
}

impl<A: InvoiceApi> Desk<A> {
    pub fn new(api: A) -> Self {
        Desk { api, invoices: RecordStore::new(), quotes: RecordStore::new() }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn invoices(&self) -> &RecordStore<Invoice> {
        &self.invoices
    }

    pub fn quotes(&self) -> &RecordStore<Quote> {
        &self.quotes
    }

    pub fn refresh_invoices(&mut self) -> Result<usize> {
        let fetched = self.api.list_invoices()?;
        self.invoices.replace_all(fetched);
        tracing::debug!(count = self.invoices.len(), "invoices loaded");
        Ok(self.invoices.len())
    }

    pub fn refresh_quotes(&mut self) -> Result<usize> {
        let fetched = self.api.list_quotes()?;
        self.quotes.replace_all(fetched);
        tracing::debug!(count = self.quotes.len(), "quotes loaded");
        Ok(self.quotes.len())
    }

    /// From the snapshot when loaded, otherwise straight from the backend.
    pub fn invoice(&self, invoice_number: &str) -> Result<Invoice> {
        match self.invoices.get(invoice_number) {
            Some(invoice) => Ok(invoice.clone()),
            None => self.api.get_invoice(invoice_number),
        }
    }

    pub fn quote(&self, quote_number: &str) -> Result<Quote> {
        self.quotes
            .get(quote_number)
            .cloned()
            .ok_or_else(|| DeskError::quote_not_found(quote_number))
    }

    pub fn update_payment(&mut self, invoice_number: &str, form: &PaymentForm) -> Result<Invoice> {
        let current = self.invoice(invoice_number)?;
        let update = form.prepare(current.remaining_amount)?;
        let updated = self.api.update_payment(invoice_number, &update)?;
        tracing::info!(invoice = invoice_number, paid = update.paid_amount, "payment recorded");
        self.invoices.upsert(updated.clone());
        Ok(updated)
    }

    /// Edit forms always start from a fresh fetch.
    pub fn open_edit(&self, invoice_number: &str) -> Result<EditForm> {
        let invoice = self.api.get_invoice(invoice_number)?;
        Ok(EditForm::from_invoice(&invoice))
    }

    pub fn save_edit(&mut self, form: &EditForm) -> Result<Invoice> {
        let edit = form.prepare();
        let updated = self.api.update_invoice(&form.invoice_number, &edit)?;
        tracing::info!(invoice = %form.invoice_number, "invoice updated");
        self.invoices.upsert(updated.clone());
        Ok(updated)
    }

    pub fn delete_invoice(&mut self, confirmation: DeleteConfirmation) -> Result<()> {
        self.api.delete_invoice(confirmation.key())?;
        self.invoices.remove(confirmation.key());
        tracing::info!(invoice = confirmation.key(), "invoice deleted");
        Ok(())
    }

    pub fn delete_quote(&mut self, confirmation: DeleteConfirmation) -> Result<()> {
        self.api.delete_quote(confirmation.key())?;
        self.quotes.remove(confirmation.key());
        tracing::info!(quote = confirmation.key(), "quote deleted");
        Ok(())
    }

    pub fn print_invoice(&self, invoice_number: &str, options: DocumentOptions<'_>) -> Result<Document> {
        let invoice = self.invoice(invoice_number)?;
        Ok(invoice_document(&invoice, options))
    }

    /// Quotes have no fetch-one endpoint; load them first.
    pub fn print_quote(&self, quote_number: &str, options: DocumentOptions<'_>) -> Result<Document> {
        let quote = self.quote(quote_number)?;
        Ok(quote_document(&quote, options))
    }

    pub fn create_invoice(&self, form: &InvoiceForm) -> Result<String> {
        let draft = form.prepare()?;
        let message = self.api.create_invoice(&draft)?;
        tracing::info!(client = %draft.client_name, "invoice created");
        Ok(message)
    }

    pub fn create_quote(&self, form: &QuoteForm) -> Result<String> {
        let draft = form.prepare()?;
        let message = self.api.create_quote(&draft)?;
        tracing::info!(client = %draft.client_name, "quote created");
        Ok(message)
    }

    pub fn convert_quote(&self, quote_number: &str, form: &ConversionForm, today: NaiveDate) -> Result<String> {
        let quote = self.quote(quote_number)?;
        let draft = form.prepare(&quote, today)?;
        let message = self.api.create_invoice(&draft)?;
        tracing::info!(quote = quote_number, "quote converted to invoice");
        Ok(message)
    }

    /// Blank queries never reach the backend.
    pub fn search_clients(&self, name: &str) -> Result<Vec<ClientSuggestion>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }
        self.api.search_clients(name)
    }
}
