//! The REST backend.
//!
//! [`InvoiceApi`] is the seam the workflows talk to; [`HttpApi`] is the real
//! thing over blocking `reqwest` with a cookie jar for the session.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{DeskError, Result};
use crate::model::{ClientSuggestion, Invoice, Quote, User};
use crate::mutation::{InvoiceDraft, InvoiceEdit, PaymentUpdate, QuoteDraft};

pub trait InvoiceApi {
    fn list_invoices(&self) -> Result<Vec<Invoice>>;
    fn get_invoice(&self, invoice_number: &str) -> Result<Invoice>;
    fn update_payment(&self, invoice_number: &str, update: &PaymentUpdate) -> Result<Invoice>;
    fn update_invoice(&self, invoice_number: &str, edit: &InvoiceEdit) -> Result<Invoice>;
    fn delete_invoice(&self, invoice_number: &str) -> Result<()>;
    /// Returns the server's confirmation message.
    fn create_invoice(&self, draft: &InvoiceDraft) -> Result<String>;

    fn list_quotes(&self) -> Result<Vec<Quote>>;
    fn create_quote(&self, draft: &QuoteDraft) -> Result<String>;
    fn delete_quote(&self, quote_number: &str) -> Result<()>;

    fn search_clients(&self, name: &str) -> Result<Vec<ClientSuggestion>>;

    fn login(&self, username: &str, password: &str) -> Result<User>;
    fn logout(&self) -> Result<()>;
    /// `None` when there is no valid session.
    fn me(&self) -> Result<Option<User>>;
}

pub struct HttpApi {
    client: Client,
    base: Url,
    jar: Arc<Jar>,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| DeskError::Config(format!("invalid api_base_url '{}': {}", base_url, e)))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(HttpApi { client, base, jar })
    }

    /// Restores a session saved by [`HttpApi::session_cookie`].
    pub fn with_session(self, cookie_header: &str) -> Self {
        for pair in cookie_header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(pair, &self.base);
        }
        self
    }

    /// The `Cookie` header the jar would send, for saving between runs.
    pub fn session_cookie(&self) -> Option<String> {
        self.jar
            .cookies(&self.base)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| DeskError::Config(format!("bad request path '{}': {}", path, e)))
    }

    /// `prefix` followed by `key` as a single escaped path segment; business
    /// numbers are free text.
    fn keyed_url(&self, prefix: &str, key: &str) -> Result<Url> {
        let mut url = self.url(prefix)?;
        url.path_segments_mut()
            .map_err(|_| DeskError::Config(format!("api_base_url '{}' cannot carry a path", self.base)))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, path = url.path(), "api request");
        self.client.request(method, url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        check(request.send()?)
    }

    fn get_value(&self, url: Url) -> Result<Value> {
        read_body(self.send(self.request(Method::GET, url))?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        decode(self.get_value(url)?)
    }

    fn send_json<B: Serialize + ?Sized>(&self, method: Method, url: Url, body: &B) -> Result<Value> {
        let response = self.send(self.request(method, url).json(body))?;
        read_body(response)
    }
}

fn read_body(response: Response) -> Result<Value> {
    let text = response.text()?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn server_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = read_body(response).unwrap_or(Value::Null);
    let err = map_status(status, &body);
    tracing::warn!(status = status.as_u16(), path = %url, error = %err, "api call failed");
    Err(err)
}

/// Error for a non-success response. 401 and 403 both mean the session is gone.
pub fn map_status(status: StatusCode, body: &Value) -> DeskError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeskError::Unauthorized,
        _ => {
            let message = server_message(body)
                .or_else(|| body.as_str().filter(|t| !t.trim().is_empty()).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            DeskError::Api { status: status.as_u16(), message }
        }
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| DeskError::Api {
        status: 200,
        message: format!("unexpected response: {}", e),
    })
}

/// Decodes a list endpoint row by row. A row that does not decode is logged
/// and left out; a body that is not an array is an error.
pub fn decode_list<T: DeserializeOwned>(body: Value, kind: &str) -> Result<Vec<T>> {
    let Value::Array(rows) = body else {
        return Err(DeskError::Api {
            status: 200,
            message: format!("unexpected response: expected a list of {}s", kind),
        });
    };
    let total = rows.len();
    let records: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let key = row
                .get(format!("{}Number", kind).as_str())
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string();
            match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(kind, index, key = %key, error = %e, "skipping unreadable record");
                    None
                }
            }
        })
        .collect();
    if records.len() < total {
        tracing::warn!(kind, skipped = total - records.len(), total, "some records were skipped");
    }
    Ok(records)
}

/// Update endpoints answer with the record itself or wrap it as
/// `{ message, <field>: record }`.
pub fn extract_record<T: DeserializeOwned>(body: Value, field: &str) -> Result<T> {
    let record = match body {
        Value::Object(mut map) if map.get(field).is_some_and(Value::is_object) => {
            map.remove(field).unwrap_or(Value::Null)
        }
        other => other,
    };
    decode(record)
}

fn message_or(body: &Value, fallback: &str) -> String {
    server_message(body).unwrap_or_else(|| fallback.to_string())
}

fn not_found_as(err: DeskError, replacement: DeskError) -> DeskError {
    match err {
        DeskError::Api { status: 404, .. } => replacement,
        other => other,
    }
}

impl InvoiceApi for HttpApi {
    fn list_invoices(&self) -> Result<Vec<Invoice>> {
        decode_list(self.get_value(self.url("/api/invoices")?)?, "invoice")
    }

    fn get_invoice(&self, invoice_number: &str) -> Result<Invoice> {
        self.get_json(self.keyed_url("/api/invoices/number", invoice_number)?)
            .map_err(|e| not_found_as(e, DeskError::invoice_not_found(invoice_number)))
    }

    fn update_payment(&self, invoice_number: &str, update: &PaymentUpdate) -> Result<Invoice> {
        let url = self.keyed_url("/api/invoices", invoice_number)?;
        let body = self.send_json(Method::PUT, url, update)?;
        extract_record(body, "invoice")
    }

    fn update_invoice(&self, invoice_number: &str, edit: &InvoiceEdit) -> Result<Invoice> {
        let url = self.keyed_url("/api/invoices/number", invoice_number)?;
        let body = self.send_json(Method::PUT, url, edit)?;
        extract_record(body, "invoice")
    }

    fn delete_invoice(&self, invoice_number: &str) -> Result<()> {
        let url = self.keyed_url("/api/invoices", invoice_number)?;
        self.send(self.request(Method::DELETE, url))
            .map_err(|e| not_found_as(e, DeskError::invoice_not_found(invoice_number)))?;
        Ok(())
    }

    fn create_invoice(&self, draft: &InvoiceDraft) -> Result<String> {
        let body = self.send_json(Method::POST, self.url("/api/invoices/create")?, draft)?;
        Ok(message_or(&body, "Invoice created successfully"))
    }

    fn list_quotes(&self) -> Result<Vec<Quote>> {
        decode_list(self.get_value(self.url("/api/quotes")?)?, "quote")
    }

    fn create_quote(&self, draft: &QuoteDraft) -> Result<String> {
        let body = self.send_json(Method::POST, self.url("/api/quotes/create")?, draft)?;
        Ok(message_or(&body, "Quotation created"))
    }

    fn delete_quote(&self, quote_number: &str) -> Result<()> {
        let url = self.keyed_url("/api/quotes", quote_number)?;
        self.send(self.request(Method::DELETE, url))
            .map_err(|e| not_found_as(e, DeskError::quote_not_found(quote_number)))?;
        Ok(())
    }

    fn search_clients(&self, name: &str) -> Result<Vec<ClientSuggestion>> {
        let request = self
            .request(Method::GET, self.url("/api/clients/search")?)
            .query(&[("name", name)]);
        decode(read_body(self.send(request)?)?)
    }

    fn login(&self, username: &str, password: &str) -> Result<User> {
        let body = self.send_json(
            Method::POST,
            self.url("/api/auth/login")?,
            &json!({ "username": username, "password": password }),
        )?;
        extract_record(body, "user")
    }

    fn logout(&self) -> Result<()> {
        self.send(self.request(Method::POST, self.url("/api/auth/logout")?))?;
        Ok(())
    }

    fn me(&self) -> Result<Option<User>> {
        match self.get_value(self.url("/api/auth/me")?) {
            Ok(body) => match body.get("user") {
                Some(Value::Null) | None => Ok(None),
                Some(_) => extract_record(body, "user").map(Some),
            },
            Err(DeskError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_keys_stay_in_one_segment() {
        let api = HttpApi::new("http://localhost:4000").unwrap();
        let path = |prefix: &str, key: &str| api.keyed_url(prefix, key).unwrap().path().to_string();
        assert_eq!(path("/api/invoices", "INV-1042"), "/api/invoices/INV-1042");
        assert_eq!(path("/api/quotes", "Q 7/2"), "/api/quotes/Q%207%2F2");
        assert_eq!(path("/api/invoices/number", "£1"), "/api/invoices/number/%C2%A31");
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let body = json!([
            { "invoiceNumber": "1", "createdAt": "2025-03-01T00:00:00Z" },
            { "invoiceNumber": "2", "createdAt": null },
            { "invoiceNumber": "3" }
        ]);
        let invoices: Vec<Invoice> = decode_list(body, "invoice").unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_number, "1");
    }

    #[test]
    fn list_body_must_be_an_array() {
        let result: Result<Vec<Quote>> = decode_list(json!({ "message": "oops" }), "quote");
        assert!(matches!(result, Err(DeskError::Api { status: 200, .. })));

        let result: Result<Vec<Quote>> = decode_list(Value::String("<html>".into()), "quote");
        assert!(matches!(result, Err(DeskError::Api { .. })));
    }

    #[test]
    fn session_statuses_are_unauthorized() {
        let body = json!({ "message": "Not authorized" });
        assert!(matches!(map_status(StatusCode::UNAUTHORIZED, &body), DeskError::Unauthorized));
        assert!(matches!(map_status(StatusCode::FORBIDDEN, &Value::Null), DeskError::Unauthorized));
    }

    #[test]
    fn other_statuses_carry_the_server_message() {
        match map_status(StatusCode::INTERNAL_SERVER_ERROR, &json!({ "message": "Boom" })) {
            DeskError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Boom");
            }
            other => panic!("unexpected {:?}", other),
        }
        match map_status(StatusCode::BAD_REQUEST, &Value::String("plain text".into())) {
            DeskError::Api { message, .. } => assert_eq!(message, "plain text"),
            other => panic!("unexpected {:?}", other),
        }
        match map_status(StatusCode::BAD_GATEWAY, &Value::Null) {
            DeskError::Api { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_record_becomes_not_found() {
        let err = map_status(StatusCode::NOT_FOUND, &json!({ "message": "Invoice not found" }));
        let err = not_found_as(err, DeskError::invoice_not_found("INV-9"));
        assert!(matches!(err, DeskError::NotFound { kind: "invoice", ref key } if key == "INV-9"));

        let err = not_found_as(
            map_status(StatusCode::CONFLICT, &Value::Null),
            DeskError::quote_not_found("Q-1"),
        );
        assert!(matches!(err, DeskError::Api { status: 409, .. }));
    }

    #[test]
    fn record_may_be_wrapped() {
        let wrapped = json!({
            "message": "Payment updated successfully",
            "invoice": { "invoiceNumber": "7", "createdAt": "2025-01-01T00:00:00Z", "paidAmount": 10 }
        });
        let invoice: Invoice = extract_record(wrapped, "invoice").unwrap();
        assert_eq!(invoice.paid_amount, 10.0);

        let bare = json!({ "invoiceNumber": "8", "createdAt": "2025-01-01T00:00:00Z" });
        let invoice: Invoice = extract_record(bare, "invoice").unwrap();
        assert_eq!(invoice.invoice_number, "8");
    }

    #[test]
    fn unexpected_body_is_an_api_error() {
        let result: Result<Invoice> = extract_record(json!({ "message": "ok" }), "invoice");
        assert!(matches!(result, Err(DeskError::Api { .. })));
    }

    #[test]
    fn messages_prefer_server_text() {
        assert_eq!(message_or(&json!({ "message": "Created" }), "x"), "Created");
        assert_eq!(message_or(&json!({ "error": "Nope" }), "x"), "Nope");
        assert_eq!(message_or(&Value::Null, "fallback"), "fallback");
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(HttpApi::new("not a url"), Err(DeskError::Config(_))));
    }

    #[test]
    fn session_cookie_survives_a_restart() {
        let api = HttpApi::new("http://localhost:4000").unwrap().with_session("sid=abc123");
        assert_eq!(api.session_cookie().as_deref(), Some("sid=abc123"));
    }
}
