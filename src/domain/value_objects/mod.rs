//! Value Objects for the storefront

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use thiserror::Error;
use uuid::Uuid;

/// Money in minor currency units (cents). Never a float.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    pub fn from_minor(amount: i64) -> Self { Self(amount) }
    pub fn minor(&self) -> i64 { self.0 }
    /// Saturates at the `i64` bounds.
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(i64::from(qty))) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn checked_add(&self, other: u32) -> Option<Self> { self.0.checked_add(other).map(Self) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Order lifecycle state, stored as its numeric code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum OrderState {
    #[default]
    Unpaid,
    Paid,
    Preparing,
    Shipped,
}

impl OrderState {
    pub fn code(self) -> i16 {
        match self { Self::Unpaid => 0, Self::Paid => 1, Self::Preparing => 2, Self::Shipped => 3 }
    }
    pub fn label(self) -> &'static str { state_label(self.code()) }
}

/// Label lookup over raw state codes; anything outside the table is "Unknown".
pub fn state_label(code: i16) -> &'static str {
    match code {
        0 => "Unpaid",
        1 => "Paid",
        2 => "Preparing",
        3 => "Shipped",
        _ => "Unknown",
    }
}

impl From<OrderState> for i16 {
    fn from(state: OrderState) -> i16 { state.code() }
}

impl TryFrom<i16> for OrderState {
    type Error = InvalidOrderState;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unpaid),
            1 => Ok(Self::Paid),
            2 => Ok(Self::Preparing),
            3 => Ok(Self::Shipped),
            other => Err(InvalidOrderState(other)),
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid order state code {0}")]
pub struct InvalidOrderState(pub i16);

/// Human-facing order reference: `<YYYYmmddHHMMSS>-<13 hex chars>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(String);

impl OrderReference {
    const SUFFIX_LEN: usize = 13;

    pub fn generate(created_at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", created_at.format("%Y%m%d%H%M%S"), &suffix[..Self::SUFFIX_LEN]))
    }
    pub fn from_stored(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Six digit one-time code, zero padded.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn generate() -> Self {
        let value: u32 = rand::rng().random_range(0..1_000_000);
        Self(format!("{value:06}"))
    }
    pub fn from_stored(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

// Codes are secrets; keep them out of logs.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("OtpCode(******)") }
}
