// src/models/supportmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "ticket_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Support,
    Improvement,
    Bug,
    Question,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub is_live_chat: bool,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_from_support: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
pub struct SupportSettings {
    pub support_enabled: bool,
    pub support_online: bool,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            support_enabled: true,
            support_online: false,
        }
    }
}

/// What a viewer is offered on the support screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    Unavailable,
    LiveChat,
    TicketOnly,
}

impl SupportSettings {
    pub fn affordance(&self, role: ViewerRole) -> Affordance {
        match role {
            ViewerRole::Support => Affordance::LiveChat,
            ViewerRole::Customer if !self.support_enabled => Affordance::Unavailable,
            ViewerRole::Customer if self.support_online => Affordance::LiveChat,
            ViewerRole::Customer => Affordance::TicketOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Support,
    Customer,
}

impl ViewerRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "support" | "agent" => Some(ViewerRole::Support),
            "customer" | "clinic" => Some(ViewerRole::Customer),
            _ => None,
        }
    }
}

/// The session the engine serves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub role: ViewerRole,
}

impl Viewer {
    pub fn support(user_id: Uuid) -> Self {
        Self {
            user_id,
            clinic_id: None,
            role: ViewerRole::Support,
        }
    }

    pub fn customer(user_id: Uuid, clinic_id: Uuid) -> Self {
        Self {
            user_id,
            clinic_id: Some(clinic_id),
            role: ViewerRole::Customer,
        }
    }

    pub fn is_support(&self) -> bool {
        self.role == ViewerRole::Support
    }

    pub fn scope(&self) -> TicketScope {
        match (self.role, self.clinic_id) {
            (ViewerRole::Customer, Some(clinic_id)) => TicketScope::Clinic(clinic_id),
            _ => TicketScope::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    Clinic(Uuid),
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub clinic_id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub is_live_chat: bool,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_from_support: bool,
}

/// Column updates for a ticket row. `None` leaves the column untouched;
/// `assigned_to: Some(None)` clears the assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<Option<Uuid>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TicketPatch {
    pub fn touch(at: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(at),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(assigned_to) = self.assigned_to {
            ticket.assigned_to = assigned_to;
        }
        if let Some(resolved_at) = self.resolved_at {
            ticket.resolved_at = Some(resolved_at);
        }
        if let Some(updated_at) = self.updated_at {
            ticket.updated_at = updated_at;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub support_enabled: Option<bool>,
    pub support_online: Option<bool>,
}

/// A ticket as the list view shows it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub last_message: Option<Message>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportSnapshot {
    pub tickets: Vec<TicketView>,
    pub messages: Vec<Message>,
    pub selected_ticket: Option<TicketView>,
    pub loading: bool,
    pub support_settings: SupportSettings,
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTicketDto {
    #[validate(length(min = 1, max = 200), custom = "not_blank")]
    pub subject: String,
    #[validate(length(min = 1, max = 5000), custom = "not_blank")]
    pub message: String,
    pub category: TicketCategory,
    pub priority: Option<TicketPriority>,
    #[serde(default)]
    pub is_live_chat: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartLiveChatDto {
    #[validate(length(min = 1, max = 5000), custom = "not_blank")]
    pub message: String,
    pub category: Option<TicketCategory>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMessageDto {
    #[validate(length(min = 1, max = 5000), custom = "not_blank")]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTicketStatusDto {
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignTicketDto {
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectTicketDto {
    pub ticket_id: Option<Uuid>,
}
