//! Customer Aggregate
//!
//! Only the slice of the account the order and phone verification flows need.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::OtpCode;

/// How long an issued code stays valid.
pub const OTP_TTL_MINUTES: i64 = 15;

#[derive(Clone, Debug, Serialize)]
pub struct Customer {
    id: Uuid,
    email: String,
    full_name: String,
    phone_number: Option<String>,
    phone_verified: bool,
    #[serde(skip)]
    otp: Option<OtpChallenge>,
    created_at: DateTime<Utc>,
}

/// Code and expiry travel together, so one can never be set without the other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: OtpCode,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}

impl Customer {
    pub fn register(email: impl Into<String>, full_name: impl Into<String>, phone_number: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(), email: email.into(), full_name: full_name.into(),
            phone_number, phone_verified: false, otp: None, created_at: Utc::now(),
        }
    }

    pub fn restore(
        id: Uuid, email: String, full_name: String, phone_number: Option<String>, phone_verified: bool,
        otp: Option<OtpChallenge>, created_at: DateTime<Utc>,
    ) -> Self {
        Self { id, email, full_name, phone_number, phone_verified, otp, created_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn email(&self) -> &str { &self.email }
    pub fn full_name(&self) -> &str { &self.full_name }
    pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }
    pub fn is_phone_verified(&self) -> bool { self.phone_verified }
    pub fn otp(&self) -> Option<&OtpChallenge> { self.otp.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// First word of the full name, for greetings.
    pub fn first_name(&self) -> &str { self.full_name.split_whitespace().next().unwrap_or(&self.full_name) }

    /// Changing the number invalidates any earlier verification.
    pub fn set_phone_number(&mut self, number: impl Into<String>) {
        let number = number.into();
        if self.phone_number.as_deref() != Some(number.as_str()) {
            self.phone_verified = false;
        }
        self.phone_number = Some(number);
    }

    /// Replace any outstanding code with a fresh one.
    pub fn issue_otp(&mut self, code: OtpCode, now: DateTime<Utc>) -> &OtpChallenge {
        self.otp.insert(OtpChallenge { code, expires_at: now + Duration::minutes(OTP_TTL_MINUTES) })
    }

    /// Consume the outstanding code. On failure nothing changes.
    pub fn verify_otp(&mut self, supplied: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        match &self.otp {
            Some(challenge) if challenge.code.as_str() == supplied && challenge.is_valid_at(now) => {
                self.phone_verified = true;
                self.otp = None;
                Ok(())
            }
            _ => Err(OtpError::InvalidOrExpired),
        }
    }

    /// Mark the phone verified without a code.
    pub fn bypass_phone_verification(&mut self) {
        self.phone_verified = true;
        self.otp = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("invalid or expired verification code")]
    InvalidOrExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Customer { Customer::register("ada@example.com", "Ada Lovelace", Some("+33 6 12 34 56 78".into())) }

    #[test]
    fn test_issue_then_verify() {
        let mut c = customer();
        let now = Utc::now();
        let code = c.issue_otp(OtpCode::from_stored("042042"), now).code.clone();
        assert_eq!(c.otp().unwrap().expires_at, now + Duration::minutes(15));
        c.verify_otp(code.as_str(), now + Duration::minutes(1)).unwrap();
        assert!(c.is_phone_verified());
        assert!(c.otp().is_none());
    }

    #[test]
    fn test_code_cannot_be_replayed() {
        let mut c = customer();
        let now = Utc::now();
        c.issue_otp(OtpCode::from_stored("111111"), now);
        c.verify_otp("111111", now).unwrap();
        assert_eq!(c.verify_otp("111111", now), Err(OtpError::InvalidOrExpired));
    }

    #[test]
    fn test_wrong_code_leaves_state_unchanged() {
        let mut c = customer();
        let now = Utc::now();
        c.issue_otp(OtpCode::from_stored("123456"), now);
        assert_eq!(c.verify_otp("654321", now), Err(OtpError::InvalidOrExpired));
        assert!(!c.is_phone_verified());
        assert!(c.otp().is_some());
    }

    #[test]
    fn test_expired_code_is_rejected() {
        let mut c = customer();
        let now = Utc::now();
        c.issue_otp(OtpCode::from_stored("123456"), now);
        let at_expiry = now + Duration::minutes(OTP_TTL_MINUTES);
        assert_eq!(c.verify_otp("123456", at_expiry), Err(OtpError::InvalidOrExpired));
        assert!(!c.is_phone_verified());
    }

    #[test]
    fn test_verify_without_code() {
        let mut c = customer();
        assert_eq!(c.verify_otp("000000", Utc::now()), Err(OtpError::InvalidOrExpired));
    }

    #[test]
    fn test_new_number_resets_verification() {
        let mut c = customer();
        c.bypass_phone_verification();
        c.set_phone_number("+33 6 12 34 56 78");
        assert!(c.is_phone_verified());
        c.set_phone_number("+44 7700 900123");
        assert!(!c.is_phone_verified());
    }

    #[test]
    fn test_first_name() {
        assert_eq!(customer().first_name(), "Ada");
        assert_eq!(Customer::register("x@y.z", "", None).first_name(), "");
    }
}
