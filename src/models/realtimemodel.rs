// src/models/realtimemodel.rs
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::supportmodel::{Message, Ticket};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeTable {
    #[serde(rename = "support_tickets")]
    Tickets,
    #[serde(rename = "support_messages")]
    Messages,
    #[serde(rename = "support_settings")]
    Settings,
}

impl ChangeTable {
    pub const ALL: [ChangeTable; 3] = [ChangeTable::Tickets, ChangeTable::Messages, ChangeTable::Settings];

    pub fn to_str(&self) -> &'static str {
        match self {
            ChangeTable::Tickets => "support_tickets",
            ChangeTable::Messages => "support_messages",
            ChangeTable::Settings => "support_settings",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level notification from the change feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(table: ChangeTable, kind: ChangeKind, record: Option<serde_json::Value>) -> Self {
        Self { table, kind, record }
    }

    pub fn for_ticket(kind: ChangeKind, ticket: &Ticket) -> Self {
        Self::new(ChangeTable::Tickets, kind, serde_json::to_value(ticket).ok())
    }

    pub fn for_message(kind: ChangeKind, message: &Message) -> Self {
        Self::new(ChangeTable::Messages, kind, serde_json::to_value(message).ok())
    }

    /// Message event carrying keys and flags only, the shape the database
    /// triggers publish. Receivers load the row itself.
    pub fn message_keys(kind: ChangeKind, message: &Message) -> Self {
        Self::new(
            ChangeTable::Messages,
            kind,
            Some(json!({
                "id": message.id,
                "ticket_id": message.ticket_id,
                "is_from_support": message.is_from_support,
                "read_at": message.read_at,
            })),
        )
    }

    pub fn settings_updated() -> Self {
        Self::new(ChangeTable::Settings, ChangeKind::Update, None)
    }

    /// Decodes the payload as a message row. Returns `None` for other tables
    /// or payloads that do not carry a full row.
    pub fn message(&self) -> Option<Message> {
        if self.table != ChangeTable::Messages {
            return None;
        }
        let record = self.record.clone()?;
        serde_json::from_value(record).ok()
    }

    /// Parent ticket named by a message payload, full row or keys only.
    pub fn ticket_id(&self) -> Option<Uuid> {
        if self.table != ChangeTable::Messages {
            return None;
        }
        let value = self.record.as_ref()?.get("ticket_id")?;
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn decodes_postgres_notify_payload() {
        let ticket_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "table": "support_messages",
            "type": "insert",
            "record": {
                "id": Uuid::new_v4(),
                "ticket_id": ticket_id,
                "sender_id": Uuid::new_v4(),
                "content": "Hello",
                "is_from_support": true,
                "read_at": null,
                "created_at": "2024-05-01T10:15:30.123456+00:00"
            }
        });

        let event: ChangeEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(event.table, ChangeTable::Messages);
        assert_eq!(event.kind, ChangeKind::Insert);

        let message = event.message().unwrap();
        assert_eq!(message.ticket_id, ticket_id);
        assert!(message.is_from_support);
        assert!(message.is_unread());
    }

    #[test]
    fn message_is_none_for_other_tables() {
        let event = ChangeEvent::settings_updated();
        assert!(event.message().is_none());

        let message = Message {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "hi".to_string(),
            is_from_support: false,
            read_at: None,
            created_at: Utc::now(),
        };
        let event = ChangeEvent::for_message(ChangeKind::Insert, &message);
        assert_eq!(event.message(), Some(message));
    }

    #[test]
    fn key_only_payload_stays_small_and_names_its_ticket() {
        let message = Message {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "x".repeat(9000),
            is_from_support: true,
            read_at: None,
            created_at: Utc::now(),
        };

        let event = ChangeEvent::message_keys(ChangeKind::Insert, &message);
        assert!(event.message().is_none());
        assert_eq!(event.ticket_id(), Some(message.ticket_id));
        assert!(serde_json::to_string(&event).unwrap().len() < 8000);
    }
}
