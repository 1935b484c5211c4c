//! Transactional email.
//!
//! [`Notifier`] is the only way the rest of the crate sends mail. Delivery is
//! best-effort: transport failures are retried a bounded number of times,
//! logged, then dropped. No caller ever sees a mail error.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MimeAttachment, Mailbox as LettreMailbox, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::{AppConfig, SmtpConfig};
use crate::domain::aggregates::{Customer, LineItem, Order, Product, StateChange};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mailbox {
    pub name: String,
    pub address: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self { name: name.into(), address: address.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn pdf(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), content_type: "application/pdf".to_string(), bytes }
    }
}

#[derive(Clone, Debug)]
pub struct OutgoingEmail {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// SMTP delivery through lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.expose_secret().to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(config.timeout))
            .build();
        Ok(Self { mailer })
    }
}

fn lettre_mailbox(mailbox: &Mailbox) -> Result<LettreMailbox, MailError> {
    let address = mailbox.address.parse().map_err(|_| MailError::InvalidAddress(mailbox.address.clone()))?;
    let name = Some(mailbox.name.clone()).filter(|n| !n.is_empty());
    Ok(LettreMailbox::new(name, address))
}

fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut body = match &email.html {
        Some(html) => MultiPart::mixed().multipart(MultiPart::alternative_plain_html(email.text.clone(), html.clone())),
        None => MultiPart::mixed().singlepart(SinglePart::plain(email.text.clone())),
    };
    for attachment in &email.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|_| MailError::InvalidContentType(attachment.content_type.clone()))?;
        body = body.singlepart(MimeAttachment::new(attachment.filename.clone()).body(attachment.bytes.clone(), content_type));
    }
    Ok(Message::builder()
        .from(lettre_mailbox(&email.from)?)
        .to(lettre_mailbox(&email.to)?)
        .subject(email.subject.clone())
        .multipart(body)?)
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(email)?;
        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Writes mail to the log instead of sending it. Used when SMTP is not configured.
pub struct LogMailer;

#[async_trait]
impl MailTransport for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        build_message(email)?;
        tracing::info!(
            to = %email.to.address,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "SMTP not configured, email logged only"
        );
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    first_name: &'a str,
    order: &'a Order,
    delivery_lines: Vec<&'a str>,
    currency: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    first_name: &'a str,
    order: &'a Order,
    currency: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_state_changed.html")]
struct OrderStateChangedHtml<'a> {
    first_name: &'a str,
    order: &'a Order,
    items: &'a [LineItem],
    transition: String,
    state_label: &'a str,
    currency: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_state_changed.txt")]
struct OrderStateChangedText<'a> {
    first_name: &'a str,
    order: &'a Order,
    items: &'a [LineItem],
    transition: String,
    state_label: &'a str,
    currency: &'a str,
}

#[derive(Template)]
#[template(path = "email/low_stock_alert.html")]
struct LowStockAlertHtml<'a> {
    product: &'a Product,
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/low_stock_alert.txt")]
struct LowStockAlertText<'a> {
    product: &'a Product,
    admin_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    first_name: &'a str,
    shop_name: &'a str,
}

/// Settings for [`Notifier`], usually taken from [`crate::config::MailConfig`].
#[derive(Clone, Debug)]
pub struct NotifierSettings {
    pub sender: Mailbox,
    pub admin: Mailbox,
    pub shop_name: String,
    pub admin_url: String,
    pub currency: String,
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl NotifierSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sender: Mailbox::new(config.mail.from_name.clone(), config.mail.from_address.clone()),
            admin: Mailbox::new(format!("{} admin", config.shop_name), config.mail.admin_email.clone()),
            shop_name: config.shop_name.clone(),
            admin_url: config.mail.admin_url.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            retries: config.mail.retries,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    settings: Arc<NotifierSettings>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, settings: NotifierSettings) -> Self {
        Self { transport, settings: Arc::new(settings) }
    }

    pub fn settings(&self) -> &NotifierSettings { &self.settings }

    pub async fn send(&self, to_address: &str, to_name: &str, subject: &str, text: &str, html: Option<&str>) {
        self.deliver(self.compose(to_address, to_name, subject, text, html, vec![])).await;
    }

    pub async fn send_with_attachment(&self, to_address: &str, to_name: &str, subject: &str, text: &str, html: Option<&str>, attachment: Attachment) {
        self.deliver(self.compose(to_address, to_name, subject, text, html, vec![attachment])).await;
    }

    fn compose(&self, to_address: &str, to_name: &str, subject: &str, text: &str, html: Option<&str>, attachments: Vec<Attachment>) -> OutgoingEmail {
        OutgoingEmail {
            from: self.settings.sender.clone(),
            to: Mailbox::new(to_name, to_address),
            subject: subject.to_string(),
            text: text.to_string(),
            html: html.map(str::to_string),
            attachments,
        }
    }

    /// Try the transport up to `1 + retries` times. Returns whether it went out.
    async fn deliver(&self, email: OutgoingEmail) -> bool {
        let attempts = self.settings.retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.transport.send(&email).await {
                Ok(()) => {
                    tracing::info!(to = %email.to.address, subject = %email.subject, attempt, "Email sent");
                    return true;
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(to = %email.to.address, subject = %email.subject, attempt, error = %e, "Email delivery failed, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(to = %email.to.address, subject = %email.subject, attempts, error = %e, "Email delivery failed, giving up");
                }
            }
        }
        false
    }

    pub async fn order_confirmation(&self, order: &Order, customer: &Customer) {
        let first_name = customer.first_name();
        let currency = self.settings.currency.as_str();
        let rendered = OrderConfirmationHtml { first_name, order, delivery_lines: order.delivery().lines().collect(), currency }
            .render()
            .and_then(|html| OrderConfirmationText { first_name, order, currency }.render().map(|text| (text, html)));
        match rendered {
            Ok((text, html)) => {
                let subject = format!("Your order {} is confirmed", order.reference());
                self.send(customer.email(), customer.full_name(), &subject, &text, Some(&html)).await;
            }
            Err(e) => tracing::error!(order = %order.reference(), error = %e, "Failed to render order confirmation"),
        }
    }

    pub async fn order_state_changed(&self, order: &Order, customer: &Customer, change: StateChange, invoice: Option<Attachment>) {
        let first_name = customer.first_name();
        let currency = self.settings.currency.as_str();
        let state_label = change.to.label();
        let html = OrderStateChangedHtml { first_name, order, items: order.items(), transition: change.describe(), state_label, currency }.render();
        let text = OrderStateChangedText { first_name, order, items: order.items(), transition: change.describe(), state_label, currency }.render();
        let (text, html) = match (text, html) {
            (Ok(text), Ok(html)) => (text, html),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(order = %order.reference(), error = %e, "Failed to render state change email");
                return;
            }
        };
        let subject = format!("Update on your order {} - {}", order.reference(), state_label);
        match invoice {
            Some(attachment) => self.send_with_attachment(customer.email(), customer.full_name(), &subject, &text, Some(&html), attachment).await,
            None => self.send(customer.email(), customer.full_name(), &subject, &text, Some(&html)).await,
        }
    }

    pub async fn low_stock_alert(&self, product: &Product) {
        let admin_url = self.settings.admin_url.as_str();
        let rendered = LowStockAlertHtml { product, admin_url }.render()
            .and_then(|html| LowStockAlertText { product, admin_url }.render().map(|text| (text, html)));
        match rendered {
            Ok((text, html)) => {
                let subject = format!("Stock alert: {} is out of stock", product.name());
                let admin = &self.settings.admin;
                self.send(&admin.address, &admin.name, &subject, &text, Some(&html)).await;
            }
            Err(e) => tracing::error!(product_id = %product.id(), error = %e, "Failed to render stock alert"),
        }
    }

    pub async fn welcome(&self, customer: &Customer) {
        match (WelcomeText { first_name: customer.first_name(), shop_name: &self.settings.shop_name }).render() {
            Ok(text) => {
                let subject = format!("Welcome to {}", self.settings.shop_name);
                self.send(customer.email(), customer.full_name(), &subject, &text, None).await;
            }
            Err(e) => tracing::error!(customer_id = %customer.id(), error = %e, "Failed to render welcome email"),
        }
    }

    /// Plain test message for checking the mail setup.
    pub async fn send_test_email(&self, to: &str) -> bool {
        let email = self.compose(to, "", "Test email", "This is a test.", None, vec![]);
        self.deliver(email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Carrier, DeliveryAddress};
    use crate::domain::value_objects::{Money, OrderState};
    use crate::services::testing::{notifier, RecordingMailer};
    use chrono::Utc;
    use uuid::Uuid;

    fn order() -> Order {
        let product = Product::create("Leather belt", Money::from_minor(3500), 4).unwrap();
        let address = DeliveryAddress { first_name: "Ada".into(), last_name: "Lovelace".into(), city: "Paris".into(), ..Default::default() };
        let carrier = Carrier { id: Uuid::new_v4(), name: "Colissimo".into(), price: Money::from_minor(490) };
        Order::place(Uuid::new_v4(), &address, &carrier, vec![LineItem::snapshot(&product, 2)], Utc::now())
    }

    fn customer() -> Customer { Customer::register("ada@example.com", "Ada Lovelace", None) }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mailer = Arc::new(RecordingMailer::failing(usize::MAX));
        let n = notifier(mailer.clone(), 2);
        n.send("ada@example.com", "Ada", "Hi", "Hello", None).await;
        assert_eq!(mailer.attempts(), 3);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let mailer = Arc::new(RecordingMailer::failing(1));
        let n = notifier(mailer.clone(), 2);
        assert!(n.send_test_email("ops@example.com").await);
        assert_eq!(mailer.attempts(), 2);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_state_change_email_cites_transition() {
        let mailer = Arc::new(RecordingMailer::default());
        let n = notifier(mailer.clone(), 0);
        let order = order();
        let change = StateChange { from: OrderState::Unpaid, to: OrderState::Paid };
        n.order_state_changed(&order, &customer(), change, Some(Attachment::pdf("invoice.pdf", b"%PDF-1.4".to_vec()))).await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        let email = &sent[0];
        assert_eq!(email.to.address, "ada@example.com");
        assert!(email.subject.contains(order.reference().as_str()));
        assert!(email.subject.ends_with("Paid"));
        assert!(email.text.contains("Unpaid → Paid"));
        assert!(email.text.contains("Leather belt x 2"));
        assert!(email.text.contains(&order.total().to_string()));
        assert!(email.html.as_deref().unwrap().contains("Unpaid → Paid"));
        assert_eq!(email.attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_low_stock_alert_goes_to_admin() {
        let mailer = Arc::new(RecordingMailer::default());
        let n = notifier(mailer.clone(), 0);
        let product = Product::create("Wool hat", Money::from_minor(1900), 0).unwrap();
        n.low_stock_alert(&product).await;
        let sent = mailer.sent();
        assert_eq!(sent[0].to.address, "admin@example.com");
        assert_eq!(sent[0].subject, "Stock alert: Wool hat is out of stock");
        assert!(sent[0].text.contains(&product.id().to_string()));
    }

    #[tokio::test]
    async fn test_order_confirmation_lists_delivery() {
        let mailer = Arc::new(RecordingMailer::default());
        let n = notifier(mailer.clone(), 0);
        let order = order();
        n.order_confirmation(&order, &customer()).await;
        let email = &mailer.sent()[0];
        assert!(email.html.as_deref().unwrap().contains("Ada Lovelace<br>"));
        assert!(email.text.contains("Hello Ada"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let email = OutgoingEmail {
            from: Mailbox::new("Shop", "shop@example.com"),
            to: Mailbox::new("Nobody", "not an address"),
            subject: "x".into(), text: "x".into(), html: None, attachments: vec![],
        };
        assert!(matches!(build_message(&email), Err(MailError::InvalidAddress(_))));
    }

    #[test]
    fn test_build_message_with_attachment() {
        let email = OutgoingEmail {
            from: Mailbox::new("Shop", "shop@example.com"),
            to: Mailbox::new("Ada", "ada@example.com"),
            subject: "Invoice".into(), text: "see attached".into(), html: Some("<p>see attached</p>".into()),
            attachments: vec![Attachment::pdf("invoice.pdf", b"%PDF-1.4".to_vec())],
        };
        let formatted = String::from_utf8(build_message(&email).unwrap().formatted()).unwrap();
        assert!(formatted.contains("invoice.pdf"));
        assert!(formatted.contains("application/pdf"));
    }
}
