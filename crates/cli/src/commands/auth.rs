//! `sfs auth` - Sign in and out.

use clap::Subcommand;

use storefront_sync_client::Storefront;

use super::say;
use crate::CliError;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in; the guest cart and wishlist move into the account
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// 10-digit mobile number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Sign out and return to guest mode
    Logout,
    /// Show the signed-in account
    Whoami,
}

pub async fn run(storefront: &Storefront, action: AuthAction) -> Result<(), CliError> {
    let auth = storefront.auth();
    match action {
        AuthAction::Login { email, password } => {
            let user = auth.login(&email, &password).await?;
            say(format!("Signed in as {} <{}>", user.name, user.email))
        }
        AuthAction::Register {
            name,
            email,
            password,
            phone,
        } => {
            let user = auth
                .register(&name, &email, &password, phone.as_deref())
                .await?;
            say(format!("Welcome, {}", user.name))
        }
        AuthAction::Logout => {
            auth.logout().await;
            say("Signed out")
        }
        AuthAction::Whoami => {
            if !auth.is_authenticated() {
                return say("Browsing as guest");
            }
            let user = auth.me().await?;
            say(format!("{} <{}>", user.name, user.email))?;
            if let Some(address) = user.default_address() {
                say(format!(
                    "Ships to {}, {} {}",
                    address.fields.city, address.fields.state, address.fields.postal_code
                ))?;
            }
            Ok(())
        }
    }
}
