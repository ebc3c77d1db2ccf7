//! `sfs cart` - Show and edit the shopping cart.

use clap::Subcommand;

use storefront_sync_client::Storefront;
use storefront_sync_core::CartItemId;
use storefront_sync_core::cart::AddToCart;

use super::{ProductArgs, money, parse_json, say};
use crate::CliError;

#[derive(Subcommand)]
pub enum CartAction {
    /// List items and totals
    Show,
    /// Add a product
    Add {
        #[command(flatten)]
        product: ProductArgs,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Variant selection as JSON, e.g. '{"size":"M"}'
        #[arg(long)]
        variant: Option<String>,

        /// Customization as JSON
        #[arg(long)]
        customization: Option<String>,
    },
    /// Set the quantity of a line (0 removes it)
    Update { item_id: String, quantity: u32 },
    /// Remove a line
    Remove { item_id: String },
    /// Remove every line
    Clear,
    /// Apply or drop a coupon
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
}

#[derive(Subcommand)]
pub enum CouponAction {
    /// Apply a coupon code
    Apply { code: String },
    /// Drop the applied coupon
    Remove,
}

pub async fn run(storefront: &Storefront, action: CartAction) -> Result<(), CliError> {
    let cart = storefront.cart();
    match action {
        CartAction::Show => return show(storefront).await,
        CartAction::Add {
            product,
            quantity,
            variant,
            customization,
        } => {
            let request = AddToCart {
                product: product.product_ref(),
                quantity,
                unit_price: product.price,
                original_price: product.original_price,
                variant: parse_json("variant", variant.as_deref())?,
                customization: parse_json("customization", customization.as_deref())?,
                max_quantity: None,
            };
            cart.add(request).await?;
        }
        CartAction::Update { item_id, quantity } => {
            cart.update_quantity(&CartItemId::from(item_id), quantity)
                .await?;
        }
        CartAction::Remove { item_id } => cart.remove(&CartItemId::from(item_id)).await?,
        CartAction::Clear => cart.clear().await?,
        CartAction::Coupon { action } => match action {
            CouponAction::Apply { code } => {
                cart.apply_coupon(&code).await?;
            }
            CouponAction::Remove => cart.remove_coupon().await?,
        },
    }
    show(storefront).await
}

async fn show(storefront: &Storefront) -> Result<(), CliError> {
    let cart = storefront.cart();
    let items = cart.items().await;
    let summary = cart.summary().await;
    let currency = summary.currency;

    if items.is_empty() {
        return say("Cart is empty");
    }

    for item in &items {
        say(format!(
            "{}  {} x{}  {}{}",
            item.id,
            item.product.name,
            item.quantity,
            money(item.line_total(), currency),
            if item.in_stock { "" } else { "  (out of stock)" },
        ))?;
    }

    say("")?;
    say(format!("Subtotal  {}", money(summary.subtotal, currency)))?;
    if let Some(coupon) = cart.coupon() {
        say(format!(
            "Discount  -{} ({})",
            money(summary.discount, currency),
            coupon.code
        ))?;
    }
    say(format!("Tax       {}", money(summary.tax, currency)))?;
    say(format!("Shipping  {}", money(summary.shipping, currency)))?;
    say(format!("Total     {}", money(summary.total, currency)))?;
    if let Some(remaining) = summary.remaining_for_free_shipping(cart.pricing()) {
        say(format!(
            "Add {} more for free shipping",
            money(remaining, currency)
        ))?;
    }
    Ok(())
}
