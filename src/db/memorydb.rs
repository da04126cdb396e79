// src/db/memorydb.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    changefeed::{ChangeFeed, ChangeStream},
    supportdb::SupportExt,
};
use crate::{
    models::{realtimemodel::*, supportmodel::*},
    service::error::SupportError,
};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Default)]
struct MemoryTables {
    tickets: Vec<Ticket>,
    messages: Vec<Message>,
    settings: SupportSettings,
}

/// In-process data service. Publishes the same change events the Postgres
/// triggers do, so the realtime engine can run against it unchanged.
#[derive(Debug, Clone)]
pub struct MemoryDB {
    tables: Arc<Mutex<MemoryTables>>,
    events: broadcast::Sender<ChangeEvent>,
    offline: Arc<AtomicBool>,
    reject_messages: Arc<AtomicBool>,
}

impl Default for MemoryDB {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDB {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tables: Arc::new(Mutex::new(MemoryTables::default())),
            events,
            offline: Arc::new(AtomicBool::new(false)),
            reject_messages: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_settings(settings: SupportSettings) -> Self {
        let db = Self::new();
        if let Ok(mut tables) = db.tables.lock() {
            tables.settings = settings;
        }
        db
    }

    /// Makes every call fail with `DataUnavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes `create_message` fail while other calls keep working.
    pub fn reject_message_writes(&self, reject: bool) {
        self.reject_messages.store(reject, Ordering::SeqCst);
    }

    /// Publishes an event as if the data service had sent it.
    pub fn emit(&self, event: ChangeEvent) {
        // No receivers is fine: nobody is mounted yet.
        let _ = self.events.send(event);
    }

    pub fn message_count(&self, ticket_id: Uuid) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.messages.iter().filter(|m| m.ticket_id == ticket_id).count())
            .unwrap_or(0)
    }

    fn tables(&self) -> Result<MutexGuard<'_, MemoryTables>, SupportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SupportError::DataUnavailable("data service offline".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| SupportError::DataUnavailable("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl SupportExt for MemoryDB {
    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, SupportError> {
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            clinic_id: ticket.clinic_id,
            user_id: ticket.user_id,
            subject: ticket.subject,
            status: TicketStatus::Open,
            priority: ticket.priority,
            category: ticket.category,
            is_live_chat: ticket.is_live_chat,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };

        self.tables()?.tickets.push(ticket.clone());
        self.emit(ChangeEvent::for_ticket(ChangeKind::Insert, &ticket));
        Ok(ticket)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, SupportError> {
        if self.reject_messages.load(Ordering::SeqCst) {
            return Err(SupportError::DataUnavailable("message write rejected".to_string()));
        }

        let message = {
            let mut tables = self.tables()?;
            if !tables.tickets.iter().any(|t| t.id == message.ticket_id) {
                return Err(SupportError::NotFound(format!("Ticket {}", message.ticket_id)));
            }
            let message = Message {
                id: Uuid::new_v4(),
                ticket_id: message.ticket_id,
                sender_id: message.sender_id,
                content: message.content,
                is_from_support: message.is_from_support,
                read_at: None,
                created_at: Utc::now(),
            };
            tables.messages.push(message.clone());
            message
        };

        self.emit(ChangeEvent::message_keys(ChangeKind::Insert, &message));
        Ok(message)
    }

    async fn update_ticket(&self, ticket_id: Uuid, patch: TicketPatch) -> Result<(), SupportError> {
        let ticket = {
            let mut tables = self.tables()?;
            let ticket = tables
                .tickets
                .iter_mut()
                .find(|t| t.id == ticket_id)
                .ok_or_else(|| SupportError::NotFound(format!("Ticket {}", ticket_id)))?;
            patch.apply_to(ticket);
            ticket.clone()
        };

        self.emit(ChangeEvent::for_ticket(ChangeKind::Update, &ticket));
        Ok(())
    }

    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, SupportError> {
        let tables = self.tables()?;
        let mut tickets: Vec<Ticket> = tables
            .tickets
            .iter()
            .filter(|t| match scope {
                TicketScope::All => true,
                TicketScope::Clinic(clinic_id) => t.clinic_id == clinic_id,
            })
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(tickets)
    }

    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>, SupportError> {
        let tables = self.tables()?;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn mark_messages_read(
        &self,
        ticket_id: Uuid,
        from_support: bool,
        at: DateTime<Utc>,
    ) -> Result<u64, SupportError> {
        let touched: Vec<Message> = {
            let mut tables = self.tables()?;
            tables
                .messages
                .iter_mut()
                .filter(|m| m.ticket_id == ticket_id && m.is_from_support == from_support && m.is_unread())
                .map(|m| {
                    m.read_at = Some(at);
                    m.clone()
                })
                .collect()
        };

        for message in &touched {
            self.emit(ChangeEvent::message_keys(ChangeKind::Update, message));
        }
        Ok(touched.len() as u64)
    }

    async fn get_settings(&self) -> Result<SupportSettings, SupportError> {
        Ok(self.tables()?.settings)
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<(), SupportError> {
        {
            let mut tables = self.tables()?;
            if let Some(enabled) = patch.support_enabled {
                tables.settings.support_enabled = enabled;
            }
            if let Some(online) = patch.support_online {
                tables.settings.support_online = online;
            }
        }

        self.emit(ChangeEvent::settings_updated());
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryDB {
    async fn subscribe(&self, table: ChangeTable) -> Result<ChangeStream, SupportError> {
        let receiver = self.events.subscribe();

        let stream = futures::stream::unfold(receiver, move |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.table == table => return Some((event, receiver)),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Change feed for {} lagged by {} events", table.to_str(), skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}
