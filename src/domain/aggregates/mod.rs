//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod customer;

pub use product::{Product, ProductError, MAX_PRICE, MAX_STOCK};
pub use order::{Carrier, DeliveryAddress, LineItem, Order, StateChange};
pub use cart::{Cart, CartDetails, CartItem, CartLine};
pub use customer::{Customer, OtpChallenge, OtpError, OTP_TTL_MINUTES};
