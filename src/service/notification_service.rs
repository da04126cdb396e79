// service/notification_service.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{models::supportmodel::SupportSettings, service::error::SupportError};

const NOTICE_BUFFER: usize = 64;
const RECENT_NOTICES: usize = 50;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoticeKind {
    WriteFailed { operation: String },
    SettingsReverted { restored: SupportSettings },
    OpeningMessageQueued { ticket_id: Uuid },
}

/// Non-fatal notice for the presentation layer. Commands that absorb a
/// `DataUnavailable` publish one of these instead of returning an error.
#[derive(Debug, Clone, Serialize)]
pub struct SupportNotice {
    #[serde(flatten)]
    pub kind: NoticeKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    sender: broadcast::Sender<SupportNotice>,
    recent: Arc<Mutex<VecDeque<SupportNotice>>>,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_BUFFER);
        Self {
            sender,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_NOTICES))),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupportNotice> {
        self.sender.subscribe()
    }

    /// The latest notices, oldest first, for clients that poll.
    pub fn recent(&self) -> Vec<SupportNotice> {
        self.recent
            .lock()
            .map(|recent| recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn notify_write_failed(&self, operation: &str, error: &SupportError) {
        tracing::warn!("{} did not apply: {}", operation, error);

        self.publish(
            NoticeKind::WriteFailed {
                operation: operation.to_string(),
            },
            format!("{} could not be saved, please try again", operation),
        );
    }

    pub fn notify_settings_reverted(&self, restored: SupportSettings, error: &SupportError) {
        tracing::warn!("Settings toggle reverted to {:?}: {}", restored, error);

        self.publish(
            NoticeKind::SettingsReverted { restored },
            "Support settings could not be saved and were restored".to_string(),
        );
    }

    pub fn notify_opening_message_queued(&self, ticket_id: Uuid, error: &SupportError) {
        tracing::warn!(
            "Ticket {} created without its opening message, queued for reconciliation: {}",
            ticket_id,
            error
        );

        self.publish(
            NoticeKind::OpeningMessageQueued { ticket_id },
            "Your ticket was created, its first message will be attached shortly".to_string(),
        );
    }

    fn publish(&self, kind: NoticeKind, message: String) {
        let notice = SupportNotice {
            kind,
            message,
            created_at: Utc::now(),
        };

        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() == RECENT_NOTICES {
                recent.pop_front();
            }
            recent.push_back(notice.clone());
        }

        // Nobody listening is not an error.
        let _ = self.sender.send(notice);
    }
}
