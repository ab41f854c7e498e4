//! Notifier used when notifications are turned off

use async_trait::async_trait;

use crate::application::ports::{NotificationError, NotificationIcon, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(
        &self,
        _title: &str,
        _message: &str,
        _icon: NotificationIcon,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}
