//! Storefront Sync client library.
//!
//! Client-side state for the storefront: the HTTP wrapper, guest-local
//! persistence, the debounced synchronized collection, and the cart,
//! wishlist, notification and auth providers built on them.
//!
//! # Layers
//!
//! - [`api`] - REST calls and envelope decoding
//! - [`storage`] and [`crypto`] - Guest-local persistence
//! - [`sync`] - Generic collection with guest fallback, debounced push and
//!   guest-to-account merge
//! - [`cart`], [`wishlist`], [`notifications`], [`auth`], [`theme`] -
//!   Providers
//! - [`state`] - The [`Storefront`] composition root

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod config;
pub mod crypto;
pub mod error;
pub mod notifications;
pub mod state;
pub mod storage;
pub mod sync;
pub mod theme;
pub mod wishlist;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use state::Storefront;
