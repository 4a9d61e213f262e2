//! Log-based notification adapter.
//!
//! Implements [`NotificationPort`] by writing every notification to the
//! process log.  A push-message adapter for the operator's phone would
//! implement the same trait.

use log::{info, warn};

use crate::app::events::{Notification, NotificationKind, RequestId};
use crate::app::ports::{DeliveryError, NotificationPort};

/// Adapter that logs every [`Notification`] and never fails.
#[derive(Debug, Default)]
pub struct LogNotifier {
    delivered: u64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl NotificationPort for LogNotifier {
    fn send(&mut self, notification: &Notification) -> Result<(), DeliveryError> {
        self.delivered += 1;
        let request = notification
            .request
            .map(|id| format!(" request={}", id))
            .unwrap_or_default();
        match notification.kind {
            NotificationKind::Test => {
                info!("NOTIFY | TEST{} | {}", request, notification.payload);
            }
            NotificationKind::Info => {
                info!("NOTIFY | INFO | {}", notification.payload);
            }
            NotificationKind::Message => {
                info!("NOTIFY | MESSAGE | {}", notification.payload);
            }
            NotificationKind::Alarm => {
                warn!("NOTIFY | ALARM | {}", notification.payload);
            }
        }
        Ok(())
    }

    fn cancel(&mut self, request: RequestId) {
        info!("NOTIFY | prompt {} withdrawn", request);
    }
}
