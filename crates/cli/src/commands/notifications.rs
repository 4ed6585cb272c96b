//! Notification log commands.

use std::io::Write;

use tokio::io::AsyncBufRead;

use super::{CommandError, NotificationAction};
use crate::render;
use crate::shell::Shell;

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub(super) fn notifications(&mut self, action: NotificationAction) -> Result<(), CommandError> {
        let notifications = self.storefront.notifications().clone();

        match action {
            NotificationAction::List => {
                let list = notifications.list();
                if list.is_empty() {
                    return self.say("No notifications.");
                }
                for notification in &list {
                    self.say(render::notification_row(notification))?;
                }
                self.say(format!("{} unread", notifications.unread_count()))
            }
            NotificationAction::Read { id } => {
                if notifications.mark_read(&id) {
                    Ok(())
                } else {
                    Err(CommandError::Usage(format!("No notification {id}.")))
                }
            }
            NotificationAction::ReadAll => {
                notifications.mark_all_read();
                self.say("All caught up.")
            }
            NotificationAction::Remove { id } => {
                notifications.remove(&id);
                Ok(())
            }
            NotificationAction::Clear => {
                notifications.clear_all();
                self.say("Notifications cleared.")
            }
        }
    }
}
