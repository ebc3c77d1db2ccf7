//! `sfs wishlist` - Saved products.

use clap::Subcommand;
use rust_decimal::Decimal;

use storefront_sync_client::Storefront;
use storefront_sync_core::WishlistItemId;
use storefront_sync_core::wishlist::{AlertPreferences, ProductSnapshot, WishlistAlert};

use super::{ProductArgs, money, say};
use crate::CliError;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// List saved products (signed in: refreshes prices and reports alerts)
    Show,
    /// Save a product
    Add {
        #[command(flatten)]
        product: ProductArgs,

        /// Whether the product is currently in stock
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        in_stock: bool,

        /// Alert when the price reaches this amount
        #[arg(long)]
        target_price: Option<Decimal>,

        /// Alert when the product is back in stock
        #[arg(long)]
        restock_alert: bool,
    },
    /// Remove a saved product
    Remove { item_id: String },
    /// Remove every saved product
    Clear,
    /// Move a saved product into the cart
    MoveToCart {
        item_id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
}

pub async fn run(storefront: &Storefront, action: WishlistAction) -> Result<(), CliError> {
    let wishlist = storefront.wishlist();
    match action {
        WishlistAction::Show => {
            if storefront.auth().is_authenticated() {
                for alert in wishlist.refresh().await? {
                    say(describe(&alert, storefront))?;
                }
            }
        }
        WishlistAction::Add {
            product,
            in_stock,
            target_price,
            restock_alert,
        } => {
            let snapshot = ProductSnapshot {
                product: product.product_ref(),
                price: product.price,
                original_price: product.original_price,
                in_stock,
            };
            let alerts = AlertPreferences {
                target_price,
                restock_alert,
            };
            wishlist.add(snapshot, alerts).await?;
        }
        WishlistAction::Remove { item_id } => {
            wishlist.remove(&WishlistItemId::from(item_id)).await?;
        }
        WishlistAction::Clear => wishlist.clear().await?,
        WishlistAction::MoveToCart { item_id, quantity } => {
            wishlist
                .move_to_cart(&WishlistItemId::from(item_id), quantity, storefront.cart())
                .await?;
        }
    }
    show(storefront).await
}

fn describe(alert: &WishlistAlert, storefront: &Storefront) -> String {
    let currency = storefront.cart().pricing().currency;
    match alert {
        WishlistAlert::PriceDrop {
            product,
            price,
            target,
        } => format!(
            "Price drop: {product} is now {} (target {})",
            money(*price, currency),
            money(*target, currency)
        ),
        WishlistAlert::BackInStock { product } => format!("Back in stock: {product}"),
    }
}

async fn show(storefront: &Storefront) -> Result<(), CliError> {
    let items = storefront.wishlist().items().await;
    if items.is_empty() {
        return say("Wishlist is empty");
    }
    let currency = storefront.cart().pricing().currency;
    for item in &items {
        let snapshot = &item.snapshot;
        say(format!(
            "{}  {}  {}{}",
            item.id,
            snapshot.product.name,
            money(snapshot.price, currency),
            if snapshot.in_stock { "" } else { "  (out of stock)" },
        ))?;
    }
    Ok(())
}
