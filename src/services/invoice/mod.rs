//! Invoice rendering.
//!
//! The invoice is rendered to HTML once, then handed to each configured
//! [`PdfBackend`] in turn until one produces a document. When every backend
//! fails (or none is configured) the built-in [`minimal`] writer is used, so
//! rendering a PDF never fails. Only writing the file to disk can.

pub mod backends;
pub mod minimal;

use std::path::PathBuf;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{BackendKind, InvoiceConfig};
use crate::domain::aggregates::{Customer, Order};

pub use backends::{CommandBackend, CommandFlavor, GotenbergBackend};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to write invoice: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PdfBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, BackendError>;
}

#[derive(Clone, Debug)]
pub struct Invoice {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceTemplate<'a> {
    shop_name: &'a str,
    currency: &'a str,
    order: &'a Order,
    customer: &'a Customer,
    state_label: &'a str,
    delivery_lines: Vec<&'a str>,
    date: String,
    ordered_on: String,
    note: &'a str,
}

const PRINT_STYLESHEET: &str = "\
@page { margin: 0.5cm; }
body { font-family: Arial, sans-serif; margin: 0; padding: 20px; }
.invoice-header { text-align: center; margin-bottom: 30px; border-bottom: 1px solid #ddd; padding-bottom: 20px; }
.invoice-title { font-size: 24px; color: #3498db; margin: 10px 0; }
table { width: 100%; border-collapse: collapse; margin: 20px 0; }
th { background-color: #f8f9fa; text-align: left; padding: 10px; border-bottom: 2px solid #ddd; }
td { padding: 10px; border-bottom: 1px solid #eee; }
.text-right { text-align: right; }
.total-row { font-weight: bold; background-color: #f8f9fa; }";

fn print_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{title}</title>\n<style>\n{PRINT_STYLESHEET}\n</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub struct InvoiceRenderer {
    output_dir: PathBuf,
    backends: Vec<Box<dyn PdfBackend>>,
    shop_name: String,
    currency: String,
}

impl InvoiceRenderer {
    pub fn new(output_dir: PathBuf, backends: Vec<Box<dyn PdfBackend>>, shop_name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self { output_dir, backends, shop_name: shop_name.into(), currency: currency.into() }
    }

    /// Build the backend chain from configuration, in configured order.
    pub fn from_config(config: &InvoiceConfig, client: reqwest::Client, shop_name: &str, currency: &str) -> Self {
        let mut backends: Vec<Box<dyn PdfBackend>> = Vec::new();
        for kind in &config.backends {
            match kind {
                BackendKind::Gotenberg => match &config.gotenberg_url {
                    Some(url) => backends.push(Box::new(GotenbergBackend::new(client.clone(), url.clone(), config.timeout))),
                    None => tracing::warn!("gotenberg backend listed but GOTENBERG_URL is not set, skipping"),
                },
                BackendKind::Chromium => backends.push(Box::new(
                    CommandBackend::new(CommandFlavor::Chromium, config.chromium_bin.clone(), config.timeout),
                )),
                BackendKind::Wkhtmltopdf => backends.push(Box::new(
                    CommandBackend::new(CommandFlavor::Wkhtmltopdf, config.wkhtmltopdf_bin.clone(), config.timeout),
                )),
            }
        }
        tracing::info!(backends = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(), "Invoice backends configured");
        Self::new(config.output_dir.clone(), backends, shop_name, currency)
    }

    pub fn backend_names(&self) -> Vec<&'static str> { self.backends.iter().map(|b| b.name()).collect() }

    /// Full HTML document for `order`.
    pub fn render_html(&self, order: &Order, customer: &Customer, state_label: &str, note: &str) -> Result<String, RenderError> {
        let body = InvoiceTemplate {
            shop_name: &self.shop_name,
            currency: &self.currency,
            order,
            customer,
            state_label,
            delivery_lines: order.delivery().lines().collect(),
            date: Utc::now().format("%d/%m/%Y").to_string(),
            ordered_on: order.created_at().format("%d/%m/%Y").to_string(),
            note,
        }
        .render()?;
        Ok(print_document(&format!("Invoice {}", order.reference()), &body))
    }

    /// Convert HTML through the backend chain. Never fails.
    pub async fn render_pdf(&self, html: &str) -> Vec<u8> {
        for backend in &self.backends {
            match backend.html_to_pdf(html).await {
                Ok(bytes) => {
                    tracing::debug!(backend = backend.name(), size = bytes.len(), "PDF rendered");
                    return bytes;
                }
                Err(e) => tracing::warn!(backend = backend.name(), error = %e, "PDF backend failed, trying next"),
            }
        }
        tracing::info!("Using built-in PDF writer");
        minimal::render(html)
    }

    pub async fn render(&self, order: &Order, customer: &Customer, state_label: &str) -> Result<Invoice, RenderError> {
        self.render_with_note(order, customer, state_label, "").await
    }

    /// Render and store the invoice. Every call writes a new file.
    pub async fn render_with_note(&self, order: &Order, customer: &Customer, state_label: &str, note: &str) -> Result<Invoice, RenderError> {
        let html = self.render_html(order, customer, state_label, note)?;
        let bytes = self.render_pdf(&html).await;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let unique: String = Uuid::new_v4().simple().to_string().chars().take(13).collect();
        let filename = format!("invoice_{}_{}.pdf", order.reference(), unique);
        let path = self.output_dir.join(&filename);
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(order = %order.reference(), file = %filename, "Invoice written");
        Ok(Invoice { filename, path, bytes })
    }
}
