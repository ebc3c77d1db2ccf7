//! `sfs theme` - Saved theme settings.

use clap::Subcommand;

use storefront_sync_client::Storefront;

use super::say;
use crate::CliError;

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Print the saved theme as a `:root` CSS block
    Css,
}

pub fn run(storefront: &Storefront, action: ThemeAction) -> Result<(), CliError> {
    match action {
        ThemeAction::Css => say(storefront.theme().css()?),
    }
}
