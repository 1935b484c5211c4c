//! Test doubles for the outbound transports.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::invoice::{BackendError, InvoiceRenderer, PdfBackend};
use super::mail::{MailError, MailTransport, Mailbox, Notifier, NotifierSettings, OutgoingEmail};
use super::sms::{SmsError, SmsTransport};

/// Records every delivered email. Fails the first `failures` attempts.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    attempts: AtomicUsize,
    failures: usize,
}

impl RecordingMailer {
    pub fn failing(failures: usize) -> Self {
        Self { failures, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> { self.sent.lock().unwrap().clone() }
    pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(MailError::InvalidAddress("relay unavailable".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn notifier(mailer: Arc<RecordingMailer>, retries: u32) -> Notifier {
    Notifier::new(mailer, NotifierSettings {
        sender: Mailbox::new("Boutique", "shop@example.com"),
        admin: Mailbox::new("Admin", "admin@example.com"),
        shop_name: "Boutique".into(),
        admin_url: "http://localhost/admin".into(),
        currency: "EUR".into(),
        retries,
        retry_backoff: Duration::ZERO,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub from: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingSms {
    sent: Mutex<Vec<SentSms>>,
    fail: bool,
}

impl RecordingSms {
    pub fn failing() -> Self { Self { fail: true, ..Self::default() } }
    pub fn sent(&self) -> Vec<SentSms> { self.sent.lock().unwrap().clone() }
}

#[async_trait]
impl SmsTransport for RecordingSms {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), SmsError> {
        if self.fail {
            return Err(SmsError::Rejected { status: 400, body: "invalid number".into() });
        }
        self.sent.lock().unwrap().push(SentSms { to: to.into(), from: from.into(), body: body.into() });
        Ok(())
    }
}

/// Backend that always fails, counting how often it was asked.
#[derive(Default)]
pub struct BrokenBackend {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PdfBackend for BrokenBackend {
    fn name(&self) -> &'static str { "broken" }

    async fn html_to_pdf(&self, _html: &str) -> Result<Vec<u8>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Failed("converter crashed".into()))
    }
}

/// Backend that returns fixed bytes.
pub struct FixedBackend(pub &'static [u8]);

#[async_trait]
impl PdfBackend for FixedBackend {
    fn name(&self) -> &'static str { "fixed" }

    async fn html_to_pdf(&self, _html: &str) -> Result<Vec<u8>, BackendError> { Ok(self.0.to_vec()) }
}

pub fn renderer(dir: &Path, backends: Vec<Box<dyn PdfBackend>>) -> InvoiceRenderer {
    InvoiceRenderer::new(dir.to_path_buf(), backends, "Boutique", "EUR")
}
