//! Print shop core - Shared types library.
//!
//! This crate provides common types used across all print shop components:
//! - `storefront` - Order/payment API and catalog read side
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types, arithmetic and in-memory state - no I/O,
//! no database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere, including a client-side cart.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses
//! - [`checkout`] - Checkout line items and order total arithmetic
//! - [`cart`] - Observable in-memory cart service

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod types;

pub use cart::{Cart, CartEvent, CartLine, CartProduct, SubscriptionId};
pub use checkout::{CheckoutItem, TotalError, order_total};
pub use types::*;
