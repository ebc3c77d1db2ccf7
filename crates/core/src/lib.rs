//! Storefront Sync Core - Shared domain types.
//!
//! This crate provides the types and pure computations used across all
//! Storefront Sync components:
//! - `client` - HTTP wrapper, guest persistence, providers
//! - `cli` - Terminal front end driving the providers
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no timers. Everything here is deterministic and can be tested
//! without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices and emails
//! - [`cart`] - Cart items, coupons and the cart summary computation
//! - [`wishlist`] - Wishlist items and alert preferences
//! - [`notification`] - Notifications and the bounded FIFO queue
//! - [`user`] - Users, addresses and auth payloads
//! - [`theme`] - Theme settings and CSS variable generation
//! - [`api`] - REST envelope and collection payloads

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod notification;
pub mod theme;
pub mod types;
pub mod user;
pub mod wishlist;

pub use types::*;
