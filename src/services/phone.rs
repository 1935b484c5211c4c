//! Phone number verification by one-time code.

use std::sync::Arc;

use askama::Template;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Customer, OtpError, OTP_TTL_MINUTES};
use crate::domain::value_objects::OtpCode;
use crate::services::sms::SmsTransport;
use crate::store::{CustomerStore, Store, StoreError};

#[derive(Debug, Error)]
pub enum PhoneError {
    #[error("customer {0} not found")]
    CustomerNotFound(Uuid),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a code was stored but not delivered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DeliveryFailure {
    #[error("no phone number on file")]
    NoPhoneNumber,

    #[error("SMS delivery is not configured")]
    SmsNotConfigured,

    #[error("SMS provider error: {0}")]
    Provider(String),
}

/// Outcome of issuing a code. The code is stored either way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OtpDelivery {
    pub delivered: bool,
    pub error: Option<DeliveryFailure>,
}

impl OtpDelivery {
    fn delivered() -> Self { Self { delivered: true, error: None } }
    fn failed(error: DeliveryFailure) -> Self { Self { delivered: false, error: Some(error) } }
}

#[derive(Template)]
#[template(path = "sms/verification_code.txt")]
struct VerificationSms<'a> {
    shop_name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

/// Sender number plus transport.
#[derive(Clone)]
pub struct SmsSender {
    pub transport: Arc<dyn SmsTransport>,
    pub from_number: String,
}

#[derive(Clone)]
pub struct PhoneVerifier {
    store: Arc<dyn Store>,
    sms: Option<SmsSender>,
    shop_name: String,
}

impl PhoneVerifier {
    pub fn new(store: Arc<dyn Store>, sms: Option<SmsSender>, shop_name: impl Into<String>) -> Self {
        Self { store, sms, shop_name: shop_name.into() }
    }

    async fn load(&self, customer_id: Uuid) -> Result<Customer, PhoneError> {
        self.store.customer(customer_id).await?.ok_or(PhoneError::CustomerNotFound(customer_id))
    }

    pub async fn update_phone_number(&self, customer_id: Uuid, number: &str) -> Result<Customer, PhoneError> {
        let mut customer = self.load(customer_id).await?;
        customer.set_phone_number(number.trim());
        self.store.save_phone_verification(&customer).await?;
        Ok(customer)
    }

    /// Generate and store a fresh code, then try to text it.
    pub async fn issue(&self, customer_id: Uuid) -> Result<OtpDelivery, PhoneError> {
        let mut customer = self.load(customer_id).await?;
        let code = customer.issue_otp(OtpCode::generate(), Utc::now()).code.clone();
        self.store.save_phone_verification(&customer).await?;

        let Some(number) = customer.phone_number() else {
            tracing::warn!(customer_id = %customer_id, "OTP issued but customer has no phone number");
            return Ok(OtpDelivery::failed(DeliveryFailure::NoPhoneNumber));
        };
        let Some(sms) = &self.sms else {
            tracing::warn!(customer_id = %customer_id, "OTP issued but SMS is not configured");
            return Ok(OtpDelivery::failed(DeliveryFailure::SmsNotConfigured));
        };

        let to: String = number.chars().filter(|c| !c.is_whitespace()).collect();
        let body = match (VerificationSms { shop_name: &self.shop_name, code: code.as_str(), ttl_minutes: OTP_TTL_MINUTES }).render() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(customer_id = %customer_id, error = %e, "Failed to render verification SMS");
                return Ok(OtpDelivery::failed(DeliveryFailure::Provider(e.to_string())));
            }
        };

        match sms.transport.send(&to, &sms.from_number, &body).await {
            Ok(()) => {
                tracing::info!(customer_id = %customer_id, "Verification code sent");
                Ok(OtpDelivery::delivered())
            }
            Err(e) => {
                tracing::error!(customer_id = %customer_id, error = %e, "Failed to send verification code");
                Ok(OtpDelivery::failed(DeliveryFailure::Provider(e.to_string())))
            }
        }
    }

    pub async fn verify(&self, customer_id: Uuid, code: &str) -> Result<Customer, PhoneError> {
        let mut customer = self.load(customer_id).await?;
        if let Err(e) = customer.verify_otp(code.trim(), Utc::now()) {
            tracing::info!(customer_id = %customer_id, "Phone verification rejected");
            return Err(e.into());
        }
        self.store.save_phone_verification(&customer).await?;
        tracing::info!(customer_id = %customer_id, "Phone number verified");
        Ok(customer)
    }

    /// Mark the phone verified without a code.
    pub async fn bypass(&self, customer_id: Uuid) -> Result<Customer, PhoneError> {
        let mut customer = self.load(customer_id).await?;
        customer.bypass_phone_verification();
        self.store.save_phone_verification(&customer).await?;
        tracing::warn!(customer_id = %customer_id, "Phone verification bypassed");
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OtpChallenge;
    use crate::services::testing::RecordingSms;
    use crate::store::MemoryStore;

    async fn setup(phone: Option<&str>, sms: Option<Arc<RecordingSms>>) -> (PhoneVerifier, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let customer = Customer::register("ada@example.com", "Ada Lovelace", phone.map(String::from));
        store.insert_customer(&customer).await.unwrap();
        let sender = sms.map(|t| SmsSender { transport: t as Arc<dyn SmsTransport>, from_number: "+15550001111".into() });
        (PhoneVerifier::new(store.clone(), sender, "Boutique"), store, customer.id())
    }

    async fn stored_otp(store: &MemoryStore, id: Uuid) -> Option<OtpChallenge> {
        store.customer(id).await.unwrap().unwrap().otp().cloned()
    }

    #[tokio::test]
    async fn test_issue_sends_code_to_stripped_number() {
        let sms = Arc::new(RecordingSms::default());
        let (verifier, store, id) = setup(Some("+33 6 12 34 56 78"), Some(sms.clone())).await;

        let delivery = verifier.issue(id).await.unwrap();

        assert_eq!(delivery, OtpDelivery { delivered: true, error: None });
        let challenge = stored_otp(&store, id).await.unwrap();
        let sent = sms.sent();
        assert_eq!(sent[0].to, "+33612345678");
        assert_eq!(sent[0].from, "+15550001111");
        assert!(sent[0].body.contains(challenge.code.as_str()));
        assert!(sent[0].body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn test_code_is_stored_even_when_not_delivered() {
        let (verifier, store, id) = setup(Some("+33612345678"), None).await;
        let delivery = verifier.issue(id).await.unwrap();
        assert_eq!(delivery, OtpDelivery { delivered: false, error: Some(DeliveryFailure::SmsNotConfigured) });
        assert!(stored_otp(&store, id).await.is_some());

        let (verifier, store, id) = setup(None, Some(Arc::new(RecordingSms::default()))).await;
        let delivery = verifier.issue(id).await.unwrap();
        assert_eq!(delivery.error, Some(DeliveryFailure::NoPhoneNumber));
        assert!(stored_otp(&store, id).await.is_some());

        let (verifier, store, id) = setup(Some("+33612345678"), Some(Arc::new(RecordingSms::failing()))).await;
        let delivery = verifier.issue(id).await.unwrap();
        assert!(matches!(delivery.error, Some(DeliveryFailure::Provider(_))));
        assert!(stored_otp(&store, id).await.is_some());
    }

    #[tokio::test]
    async fn test_verify_round_trip() {
        let (verifier, store, id) = setup(Some("+33612345678"), None).await;
        verifier.issue(id).await.unwrap();
        let code = stored_otp(&store, id).await.unwrap().code;

        let err = verifier.verify(id, "not-it").await.unwrap_err();
        assert!(matches!(err, PhoneError::Otp(OtpError::InvalidOrExpired)));
        assert!(stored_otp(&store, id).await.is_some());

        let customer = verifier.verify(id, &format!(" {} ", code.as_str())).await.unwrap();
        assert!(customer.is_phone_verified());
        assert!(stored_otp(&store, id).await.is_none());
        assert!(verifier.verify(id, code.as_str()).await.is_err());
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_code() {
        let (verifier, store, id) = setup(Some("+33612345678"), None).await;
        verifier.issue(id).await.unwrap();
        let first = stored_otp(&store, id).await.unwrap();
        verifier.issue(id).await.unwrap();
        let second = stored_otp(&store, id).await.unwrap();
        assert!(second.expires_at >= first.expires_at);
    }

    #[tokio::test]
    async fn test_bypass_and_number_change() {
        let (verifier, store, id) = setup(None, None).await;
        verifier.update_phone_number(id, " +33612345678 ").await.unwrap();
        assert!(verifier.bypass(id).await.unwrap().is_phone_verified());

        let customer = verifier.update_phone_number(id, "+33700000000").await.unwrap();
        assert!(!customer.is_phone_verified());
        assert_eq!(store.customer(id).await.unwrap().unwrap().phone_number(), Some("+33700000000"));
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let (verifier, _, _) = setup(None, None).await;
        assert!(matches!(verifier.issue(Uuid::new_v4()).await, Err(PhoneError::CustomerNotFound(_))));
    }
}
