//! CLI command implementations.

pub mod auth;
pub mod cart;
pub mod notifications;
pub mod theme;
pub mod wishlist;

use std::io::Write;

use rust_decimal::Decimal;
use storefront_sync_core::CurrencyCode;
use storefront_sync_core::cart::ProductRef;
use storefront_sync_core::types::{Price, ProductId};

use crate::CliError;

/// Product flags shared by `cart add` and `wishlist add`.
#[derive(Debug, clap::Args)]
pub struct ProductArgs {
    /// Product ID
    #[arg(long)]
    pub product_id: String,

    /// Product name
    #[arg(long)]
    pub name: String,

    /// URL slug of the product page
    #[arg(long)]
    pub slug: String,

    /// Current unit price
    #[arg(long)]
    pub price: Decimal,

    /// Price before discount, if discounted
    #[arg(long)]
    pub original_price: Option<Decimal>,

    /// Primary image URL
    #[arg(long)]
    pub image: Option<String>,
}

impl ProductArgs {
    pub fn product_ref(&self) -> ProductRef {
        ProductRef {
            id: ProductId::new(self.product_id.as_str()),
            name: self.name.clone(),
            slug: self.slug.clone(),
            image: self.image.clone(),
        }
    }
}

/// Parse an optional JSON flag value.
pub fn parse_json(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<serde_json::Value>, CliError> {
    raw.map(serde_json::from_str)
        .transpose()
        .map_err(|source| CliError::InvalidJson { field, source })
}

pub fn money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).to_string()
}

/// Write one line of command output to stdout.
pub fn say(line: impl std::fmt::Display) -> Result<(), CliError> {
    writeln!(std::io::stdout().lock(), "{line}")?;
    Ok(())
}
