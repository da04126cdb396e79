// service/state_machine.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::supportmodel::*,
    service::error::SupportError,
};

pub const LIVE_CHAT_SUBJECT: &str = "Live chat";

/// Lifecycle rules for support tickets.
///
/// Open -> InProgress -> Resolved -> Closed is the expected path, but any of
/// the four statuses may be set directly. New messages are accepted in every
/// status, `Closed` included.
pub struct TicketStateMachine;

impl TicketStateMachine {
    /// Patch for a status change. Entering `Resolved` stamps `resolved_at`;
    /// leaving it keeps the stamp.
    pub fn status_change(new_status: TicketStatus, now: DateTime<Utc>) -> TicketPatch {
        TicketPatch {
            status: Some(new_status),
            resolved_at: (new_status == TicketStatus::Resolved).then_some(now),
            updated_at: Some(now),
            ..TicketPatch::default()
        }
    }

    /// Patch for an assignment. Assigning an agent moves the ticket to
    /// `InProgress`; unassigning moves it back to `Open`.
    pub fn assignment(agent_id: Option<Uuid>, now: DateTime<Utc>) -> TicketPatch {
        let status = match agent_id {
            Some(_) => TicketStatus::InProgress,
            None => TicketStatus::Open,
        };

        TicketPatch {
            status: Some(status),
            assigned_to: Some(agent_id),
            updated_at: Some(now),
            ..TicketPatch::default()
        }
    }

    /// Patch applied to the parent ticket after a message lands.
    pub fn message_appended(now: DateTime<Utc>) -> TicketPatch {
        TicketPatch::touch(now)
    }

    pub fn validate_opening(subject: &str, first_message: &str) -> Result<(), SupportError> {
        if subject.trim().is_empty() {
            return Err(SupportError::Validation("Subject is required".to_string()));
        }
        Self::validate_content(first_message)
    }

    pub fn validate_content(content: &str) -> Result<(), SupportError> {
        if content.trim().is_empty() {
            return Err(SupportError::Validation("Message content is required".to_string()));
        }
        Ok(())
    }

    /// Priority a new ticket starts with when the caller gives none.
    pub fn default_priority(is_live_chat: bool) -> TicketPriority {
        if is_live_chat {
            TicketPriority::High
        } else {
            TicketPriority::Medium
        }
    }
}

/// Messages from the other side that the viewer has not read yet.
pub fn unread_count(messages: &[Message], viewer: ViewerRole) -> usize {
    let from_support = viewer == ViewerRole::Customer;
    messages
        .iter()
        .filter(|m| m.is_from_support == from_support && m.is_unread())
        .count()
}

/// Latest message by `created_at`; on equal timestamps the later arrival wins.
pub fn last_message(messages: &[Message]) -> Option<&Message> {
    messages
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)))
        .map(|(_, m)| m)
}

pub fn ticket_view(ticket: Ticket, messages: &[Message], viewer: ViewerRole) -> TicketView {
    TicketView {
        last_message: last_message(messages).cloned(),
        unread_count: unread_count(messages, viewer),
        ticket,
    }
}
