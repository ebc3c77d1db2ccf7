//! `sfs notifications` - Server inbox.

use clap::Subcommand;

use storefront_sync_client::Storefront;
use storefront_sync_core::NotificationId;

use super::say;
use crate::CliError;

#[derive(Subcommand)]
pub enum NotificationAction {
    /// List notifications, newest first
    List,
    /// Mark one notification as read
    Read { id: String },
    /// Mark every notification as read
    ReadAll,
}

pub async fn run(storefront: &Storefront, action: NotificationAction) -> Result<(), CliError> {
    let center = storefront.notifications();
    if storefront.auth().is_authenticated() {
        center.fetch_inbox().await?;
    }

    match action {
        NotificationAction::List => {
            let list = center.list();
            if list.is_empty() {
                return say("No notifications");
            }
            say(format!("{} unread", center.unread_count()))?;
            for n in &list {
                say(format!(
                    "{} {}  {}{}",
                    if n.read { " " } else { "*" },
                    n.id,
                    n.title.as_deref().map(|t| format!("{t}: ")).unwrap_or_default(),
                    n.message
                ))?;
            }
            Ok(())
        }
        NotificationAction::Read { id } => {
            center.mark_read(&NotificationId::from(id)).await?;
            Ok(())
        }
        NotificationAction::ReadAll => {
            center.mark_all_read().await?;
            Ok(())
        }
    }
}
