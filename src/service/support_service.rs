// service/support_service.rs
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    db::supportdb::SupportExt,
    models::supportmodel::*,
    service::{
        error::SupportError,
        notification_service::NotificationService,
        settings_service::SettingsService,
        state_machine::{self, TicketStateMachine, LIVE_CHAT_SUBJECT},
    },
    store::{message_store::MessageStore, ticket_store::TicketStore},
};

/// Opening message whose write failed after its ticket was created.
#[derive(Debug, Clone)]
struct PendingOpening {
    ticket_id: Uuid,
    sender_id: Uuid,
    content: String,
}

/// Decrements the in-flight counter on every exit path.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Ticket and message state for one support screen session.
///
/// Commands persist through the gateway first and then refresh the caches.
/// A `DataUnavailable` inside a command is absorbed: the caches keep their
/// last known good state, a notice is published and the command returns
/// `Ok(None)` (or the unchanged value). Validation and lookup failures are
/// returned to the caller before anything is written.
pub struct SupportService {
    db_client: Arc<dyn SupportExt>,
    notification_service: Arc<NotificationService>,
    settings_service: Arc<SettingsService>,
    viewer: Viewer,
    tickets: RwLock<TicketStore>,
    messages: RwLock<MessageStore>,
    in_flight: AtomicUsize,
    fetch_generation: AtomicU64,
    orphans: Mutex<Vec<PendingOpening>>,
    realtime_mounted: AtomicBool,
}

impl std::fmt::Debug for SupportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupportService")
            .field("viewer", &self.viewer)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

impl SupportService {
    pub fn new(
        db_client: Arc<dyn SupportExt>,
        notification_service: Arc<NotificationService>,
        settings_service: Arc<SettingsService>,
        viewer: Viewer,
    ) -> Self {
        Self {
            db_client,
            notification_service,
            settings_service,
            viewer,
            tickets: RwLock::new(TicketStore::new()),
            messages: RwLock::new(MessageStore::new()),
            in_flight: AtomicUsize::new(0),
            fetch_generation: AtomicU64::new(0),
            orphans: Mutex::new(Vec::new()),
            realtime_mounted: AtomicBool::new(false),
        }
    }

    pub fn viewer(&self) -> Viewer {
        self.viewer
    }

    pub fn settings(&self) -> &Arc<SettingsService> {
        &self.settings_service
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn tickets(&self) -> Vec<TicketView> {
        self.tickets.read().await.list().to_vec()
    }

    pub async fn ticket(&self, ticket_id: Uuid) -> Option<TicketView> {
        self.tickets.read().await.get(ticket_id).cloned()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.list().to_vec()
    }

    pub async fn selected_ticket_id(&self) -> Option<Uuid> {
        self.messages.read().await.ticket_id()
    }

    pub async fn selected_ticket(&self) -> Option<TicketView> {
        let selected = self.selected_ticket_id().await?;
        self.ticket(selected).await
    }

    pub async fn snapshot(&self) -> SupportSnapshot {
        let tickets = self.tickets().await;
        let (messages, selected) = {
            let store = self.messages.read().await;
            (store.list().to_vec(), store.ticket_id())
        };
        let selected_ticket = selected.and_then(|id| tickets.iter().find(|v| v.ticket.id == id).cloned());

        SupportSnapshot {
            tickets,
            messages,
            selected_ticket,
            loading: self.is_loading(),
            support_settings: self.settings_service.get(),
        }
    }

    /// Reloads the ticket list and recomputes every aggregate from fresh
    /// message lists. Returns the cache, refreshed or not.
    pub async fn fetch_tickets(&self) -> Vec<TicketView> {
        let _loading = LoadingGuard::new(&self.in_flight);
        let generation = self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.load_ticket_views().await {
            Ok(views) => {
                let count = views.len();
                if self.tickets.write().await.commit(generation, views) {
                    tracing::debug!("Ticket list refreshed ({} tickets)", count);
                } else {
                    tracing::debug!("Dropped superseded ticket fetch #{}", generation);
                }
            }
            Err(e) => tracing::warn!("Keeping cached tickets, fetch failed: {}", e),
        }

        self.tickets().await
    }

    async fn load_ticket_views(&self) -> Result<Vec<TicketView>, SupportError> {
        let tickets = self.db_client.list_tickets(self.viewer.scope()).await?;
        let message_lists = try_join_all(
            tickets
                .iter()
                .map(|ticket| self.db_client.list_messages(ticket.id)),
        )
        .await?;

        Ok(tickets
            .into_iter()
            .zip(message_lists)
            .map(|(ticket, messages)| state_machine::ticket_view(ticket, &messages, self.viewer.role))
            .collect())
    }

    /// Loads a ticket's messages. The result is committed to the message
    /// store only if that ticket is still the selected one when the
    /// response arrives.
    pub async fn fetch_messages(&self, ticket_id: Uuid) -> Vec<Message> {
        match self.db_client.list_messages(ticket_id).await {
            Ok(mut messages) => {
                let mut store = self.messages.write().await;
                if store.commit_fetch(ticket_id, messages.clone()) {
                    return store.list().to_vec();
                }
                tracing::debug!("Messages for ticket {} arrived after selection changed", ticket_id);
                messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                messages
            }
            Err(e) => {
                tracing::warn!("Keeping cached messages for ticket {}: {}", ticket_id, e);
                let store = self.messages.read().await;
                if store.ticket_id() == Some(ticket_id) {
                    store.list().to_vec()
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Switches the open conversation. The previous ticket's messages are
    /// dropped and the new one's are fetched.
    pub async fn set_selected_ticket(&self, ticket_id: Option<Uuid>) -> Option<TicketView> {
        self.messages.write().await.select(ticket_id);

        let ticket_id = ticket_id?;
        self.fetch_messages(ticket_id).await;
        self.ticket(ticket_id).await
    }

    pub async fn create_ticket(
        &self,
        subject: &str,
        first_message: &str,
        category: TicketCategory,
        is_live_chat: bool,
        priority: Option<TicketPriority>,
    ) -> Result<Option<Ticket>, SupportError> {
        TicketStateMachine::validate_opening(subject, first_message)?;
        let clinic_id = self
            .viewer
            .clinic_id
            .ok_or_else(|| SupportError::Validation("A clinic is required to open a ticket".to_string()))?;

        let new_ticket = NewTicket {
            clinic_id,
            user_id: self.viewer.user_id,
            subject: subject.trim().to_string(),
            category,
            priority: priority.unwrap_or_else(|| TicketStateMachine::default_priority(is_live_chat)),
            is_live_chat,
        };

        let ticket = match self.db_client.create_ticket(new_ticket).await {
            Ok(ticket) => ticket,
            Err(e) => return self.absorb("create_ticket", e),
        };
        tracing::info!("Ticket {} opened by {} (live chat: {})", ticket.id, ticket.user_id, is_live_chat);

        let opening = PendingOpening {
            ticket_id: ticket.id,
            sender_id: self.viewer.user_id,
            content: first_message.to_string(),
        };
        if let Err(e) = self.write_opening(&opening).await {
            self.notification_service.notify_opening_message_queued(ticket.id, &e);
            self.orphans.lock().await.push(opening);
        }

        self.fetch_tickets().await;
        Ok(Some(ticket))
    }

    /// Opens a live chat: a ticket flagged `is_live_chat` with the default
    /// subject and its first message.
    pub async fn start_live_chat(
        &self,
        first_message: &str,
        category: Option<TicketCategory>,
    ) -> Result<Option<Ticket>, SupportError> {
        self.create_ticket(
            LIVE_CHAT_SUBJECT,
            first_message,
            category.unwrap_or(TicketCategory::Support),
            true,
            None,
        )
        .await
    }

    async fn write_opening(&self, opening: &PendingOpening) -> Result<Message, SupportError> {
        self.db_client
            .create_message(NewMessage {
                ticket_id: opening.ticket_id,
                sender_id: opening.sender_id,
                content: opening.content.clone(),
                is_from_support: false,
            })
            .await
    }

    /// Retries opening messages whose write failed. Returns how many were
    /// attached.
    pub async fn reconcile_orphans(&self) -> usize {
        let pending: Vec<PendingOpening> = std::mem::take(&mut *self.orphans.lock().await);
        if pending.is_empty() {
            return 0;
        }

        let mut attached = 0;
        let mut still_pending = Vec::new();
        for opening in pending {
            match self.write_opening(&opening).await {
                Ok(message) => {
                    attached += 1;
                    tracing::info!("Attached opening message {} to ticket {}", message.id, opening.ticket_id);
                    let created_at = message.created_at;
                    self.messages.write().await.append_if_absent(message);
                    if let Err(e) = self
                        .db_client
                        .update_ticket(opening.ticket_id, TicketStateMachine::message_appended(created_at))
                        .await
                    {
                        tracing::warn!("Opening message attached but ticket {} was not touched: {}", opening.ticket_id, e);
                    }
                }
                Err(SupportError::NotFound(_)) => {
                    tracing::warn!("Dropping opening message for missing ticket {}", opening.ticket_id);
                }
                Err(e) => {
                    tracing::debug!("Opening for ticket {} still pending: {}", opening.ticket_id, e);
                    still_pending.push(opening);
                }
            }
        }
        self.orphans.lock().await.extend(still_pending);

        if attached > 0 {
            self.fetch_tickets().await;
        }
        attached
    }

    pub async fn pending_orphans(&self) -> usize {
        self.orphans.lock().await.len()
    }

    /// Appends a message and then stamps the parent's `updated_at`. The two
    /// writes are not atomic; a lost stamp is corrected by the next message.
    pub async fn send_message(
        &self,
        ticket_id: Uuid,
        content: &str,
        is_from_support: bool,
    ) -> Result<Option<Message>, SupportError> {
        TicketStateMachine::validate_content(content)?;

        let message = match self
            .db_client
            .create_message(NewMessage {
                ticket_id,
                sender_id: self.viewer.user_id,
                content: content.to_string(),
                is_from_support,
            })
            .await
        {
            Ok(message) => message,
            Err(e) => return self.absorb("send_message", e),
        };

        self.messages.write().await.append_if_absent(message.clone());

        if let Err(e) = self
            .db_client
            .update_ticket(ticket_id, TicketStateMachine::message_appended(message.created_at))
            .await
        {
            tracing::warn!("Message {} saved but ticket {} was not touched: {}", message.id, ticket_id, e);
        }

        self.fetch_tickets().await;
        Ok(Some(message))
    }

    pub async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Option<TicketView>, SupportError> {
        let patch = TicketStateMachine::status_change(status, Utc::now());
        self.apply_patch("update_ticket_status", ticket_id, patch).await
    }

    pub async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        agent_id: Option<Uuid>,
    ) -> Result<Option<TicketView>, SupportError> {
        let patch = TicketStateMachine::assignment(agent_id, Utc::now());
        self.apply_patch("assign_ticket", ticket_id, patch).await
    }

    async fn apply_patch(
        &self,
        operation: &str,
        ticket_id: Uuid,
        patch: TicketPatch,
    ) -> Result<Option<TicketView>, SupportError> {
        if let Err(e) = self.db_client.update_ticket(ticket_id, patch.clone()).await {
            return self.absorb(operation, e);
        }
        tracing::info!("Ticket {} updated by {}: {:?}", ticket_id, operation, patch);

        self.fetch_tickets().await;
        Ok(self.ticket(ticket_id).await)
    }

    /// Marks the other side's unread messages as read. Returns the number of
    /// messages that changed, or `None` when the write did not apply;
    /// calling it again with nothing unread is a no-op.
    pub async fn mark_messages_as_read(
        &self,
        ticket_id: Uuid,
        viewer_is_support: bool,
    ) -> Result<Option<u64>, SupportError> {
        let touched = match self
            .db_client
            .mark_messages_read(ticket_id, !viewer_is_support, Utc::now())
            .await
        {
            Ok(touched) => touched,
            Err(e) => return self.absorb("mark_messages_as_read", e),
        };

        if touched > 0 {
            if self.selected_ticket_id().await == Some(ticket_id) {
                self.fetch_messages(ticket_id).await;
            }
            self.fetch_tickets().await;
        }
        Ok(Some(touched))
    }

    pub async fn toggle_support_online(&self) -> SupportSettings {
        self.settings_service.toggle_online().await
    }

    pub async fn toggle_support_enabled(&self) -> SupportSettings {
        self.settings_service.toggle_enabled().await
    }

    /// Realtime arrival of a message row. Returns `true` if it was added to
    /// the open conversation.
    pub async fn apply_incoming_message(&self, message: Message) -> bool {
        self.messages.write().await.append_if_absent(message)
    }

    /// Realtime update of a message row (read receipts).
    pub async fn apply_message_update(&self, message: Message) -> bool {
        let mut store = self.messages.write().await;
        if store.ticket_id() != Some(message.ticket_id) {
            return false;
        }
        store.replace(message.clone()) || store.append_if_absent(message)
    }

    /// Claims the session's single realtime subscription slot.
    pub(crate) fn claim_realtime(&self) -> bool {
        self.realtime_mounted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release_realtime(&self) {
        self.realtime_mounted.store(false, Ordering::SeqCst);
    }

    fn absorb<T>(&self, operation: &str, error: SupportError) -> Result<Option<T>, SupportError> {
        if error.is_unavailable() {
            self.notification_service.notify_write_failed(operation, &error);
            return Ok(None);
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memorydb::MemoryDB, service::notification_service::NoticeKind};

    struct Fixture {
        db: MemoryDB,
        customer: SupportService,
        agent: SupportService,
        notifications: Arc<NotificationService>,
    }

    fn fixture() -> Fixture {
        let db = MemoryDB::new();
        let notifications = Arc::new(NotificationService::new());
        let gateway: Arc<dyn SupportExt> = Arc::new(db.clone());
        let settings = Arc::new(SettingsService::new(gateway.clone(), notifications.clone()));

        let customer = SupportService::new(
            gateway.clone(),
            notifications.clone(),
            settings.clone(),
            Viewer::customer(Uuid::new_v4(), Uuid::new_v4()),
        );
        let agent = SupportService::new(gateway, notifications.clone(), settings, Viewer::support(Uuid::new_v4()));

        Fixture {
            db,
            customer,
            agent,
            notifications,
        }
    }

    async fn open_login_ticket(f: &Fixture) -> Ticket {
        f.customer
            .create_ticket("Login issue", "Can't log in", TicketCategory::Support, false, None)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn create_ticket_opens_with_single_customer_message() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;

        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.assigned_to, None);
        assert_eq!(ticket.resolved_at, None);
        assert_eq!(ticket.priority, TicketPriority::Medium);

        let messages = f.customer.fetch_messages(ticket.id).await;
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_from_support);
        assert_eq!(messages[0].content, "Can't log in");

        let views = f.customer.tickets().await;
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].last_message.as_ref().map(|m| m.id), Some(messages[0].id));
    }

    #[tokio::test]
    async fn create_ticket_rejects_blank_fields_without_writing() {
        let f = fixture();
        let err = f
            .customer
            .create_ticket("  ", "Can't log in", TicketCategory::Bug, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SupportError::Validation(_)));

        let err = f
            .customer
            .create_ticket("Login issue", "", TicketCategory::Bug, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SupportError::Validation(_)));

        assert!(f.db.list_tickets(TicketScope::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_chat_uses_default_subject_and_priority() {
        let f = fixture();
        let ticket = f.customer.start_live_chat("Are you there?", None).await.unwrap().unwrap();

        assert!(ticket.is_live_chat);
        assert_eq!(ticket.subject, LIVE_CHAT_SUBJECT);
        assert_eq!(ticket.priority, TicketPriority::High);
        assert_eq!(f.db.message_count(ticket.id), 1);
    }

    #[tokio::test]
    async fn reply_and_read_flow_keeps_sides_independent() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;

        f.agent.fetch_tickets().await;
        assert_eq!(f.agent.ticket(ticket.id).await.unwrap().unread_count, 1);

        f.agent
            .send_message(ticket.id, "Try resetting your password", true)
            .await
            .unwrap()
            .unwrap();

        f.customer.fetch_tickets().await;
        assert_eq!(f.customer.ticket(ticket.id).await.unwrap().unread_count, 1);
        assert_eq!(f.agent.ticket(ticket.id).await.unwrap().unread_count, 1);

        let touched = f.customer.mark_messages_as_read(ticket.id, false).await.unwrap();
        assert_eq!(touched, Some(1));
        assert_eq!(f.customer.ticket(ticket.id).await.unwrap().unread_count, 0);

        f.agent.fetch_tickets().await;
        assert_eq!(f.agent.ticket(ticket.id).await.unwrap().unread_count, 1);
    }

    #[tokio::test]
    async fn mark_messages_as_read_is_idempotent() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        f.agent.send_message(ticket.id, "Hello", true).await.unwrap();

        f.customer.mark_messages_as_read(ticket.id, false).await.unwrap();
        let first = f.customer.ticket(ticket.id).await.unwrap().unread_count;
        let touched = f.customer.mark_messages_as_read(ticket.id, false).await.unwrap();
        f.customer.fetch_tickets().await;
        let second = f.customer.ticket(ticket.id).await.unwrap().unread_count;

        assert_eq!(touched, Some(0));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn send_message_touches_parent_and_appends_once() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        f.customer.set_selected_ticket(Some(ticket.id)).await;

        let message = f
            .customer
            .send_message(ticket.id, "Still broken", false)
            .await
            .unwrap()
            .unwrap();
        f.customer.apply_incoming_message(message.clone()).await;

        let messages = f.customer.fetch_messages(ticket.id).await;
        assert_eq!(messages.iter().filter(|m| m.id == message.id).count(), 1);

        let view = f.customer.ticket(ticket.id).await.unwrap();
        assert!(view.ticket.updated_at >= message.created_at);
        assert_eq!(view.last_message.map(|m| m.id), Some(message.id));
    }

    #[tokio::test]
    async fn closed_tickets_still_accept_messages() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        f.agent.update_ticket_status(ticket.id, TicketStatus::Closed).await.unwrap();

        let message = f.customer.send_message(ticket.id, "One more thing", false).await.unwrap();
        assert!(message.is_some());
    }

    #[tokio::test]
    async fn send_message_rejects_blank_content() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        let err = f.customer.send_message(ticket.id, " \n", false).await.unwrap_err();
        assert!(matches!(err, SupportError::Validation(_)));
        assert_eq!(f.db.message_count(ticket.id), 1);
    }

    #[tokio::test]
    async fn assignment_drives_status() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        let agent_id = f.agent.viewer().user_id;

        let view = f.agent.assign_ticket(ticket.id, Some(agent_id)).await.unwrap().unwrap();
        assert_eq!(view.ticket.status, TicketStatus::InProgress);
        assert_eq!(view.ticket.assigned_to, Some(agent_id));

        let view = f.agent.assign_ticket(ticket.id, None).await.unwrap().unwrap();
        assert_eq!(view.ticket.status, TicketStatus::Open);
        assert_eq!(view.ticket.assigned_to, None);
    }

    #[tokio::test]
    async fn resolving_stamps_resolved_at_and_keeps_it() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;

        let view = f
            .agent
            .update_ticket_status(ticket.id, TicketStatus::Resolved)
            .await
            .unwrap()
            .unwrap();
        let resolved_at = view.ticket.resolved_at;
        assert!(resolved_at.is_some());

        let view = f
            .agent
            .update_ticket_status(ticket.id, TicketStatus::Closed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.ticket.resolved_at, resolved_at);
    }

    #[tokio::test]
    async fn status_update_of_unknown_ticket_is_not_found() {
        let f = fixture();
        let err = f
            .agent
            .update_ticket_status(Uuid::new_v4(), TicketStatus::Resolved)
            .await
            .unwrap_err();
        assert!(matches!(err, SupportError::NotFound(_)));
    }

    #[tokio::test]
    async fn unavailable_gateway_keeps_cache_and_publishes_notice() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        let mut notices = f.notifications.subscribe();

        f.db.set_offline(true);
        let result = f.customer.send_message(ticket.id, "Hello?", false).await.unwrap();
        assert!(result.is_none());

        let cached = f.customer.fetch_tickets().await;
        assert_eq!(cached.len(), 1);
        assert!(!f.customer.is_loading());

        let notice = notices.recv().await.unwrap();
        assert_eq!(
            notice.kind,
            NoticeKind::WriteFailed {
                operation: "send_message".to_string()
            }
        );
    }

    #[tokio::test]
    async fn failed_opening_message_is_reconciled_later() {
        let f = fixture();
        f.db.reject_message_writes(true);

        let ticket = open_login_ticket(&f).await;
        assert_eq!(f.db.message_count(ticket.id), 0);
        assert_eq!(f.customer.pending_orphans().await, 1);

        assert_eq!(f.customer.reconcile_orphans().await, 0);
        assert_eq!(f.customer.pending_orphans().await, 1);

        f.db.reject_message_writes(false);
        assert_eq!(f.customer.reconcile_orphans().await, 1);
        assert_eq!(f.db.message_count(ticket.id), 1);
        assert_eq!(f.customer.pending_orphans().await, 0);

        let opening = &f.db.list_messages(ticket.id).await.unwrap()[0];
        let stamped = &f.db.list_tickets(TicketScope::All).await.unwrap()[0];
        assert_eq!(stamped.updated_at, opening.created_at);
    }

    #[tokio::test]
    async fn absorbed_mark_read_is_not_applied() {
        let f = fixture();
        let ticket = open_login_ticket(&f).await;
        f.agent.send_message(ticket.id, "Hello", true).await.unwrap();

        f.db.set_offline(true);
        let touched = f.customer.mark_messages_as_read(ticket.id, false).await.unwrap();
        assert_eq!(touched, None);

        f.db.set_offline(false);
        let touched = f.customer.mark_messages_as_read(ticket.id, false).await.unwrap();
        assert_eq!(touched, Some(1));
    }

    #[tokio::test]
    async fn viewer_without_clinic_cannot_open_tickets() {
        let db = MemoryDB::new();
        let notifications = Arc::new(NotificationService::new());
        let gateway: Arc<dyn SupportExt> = Arc::new(db);
        let settings = Arc::new(SettingsService::new(gateway.clone(), notifications.clone()));
        let service = SupportService::new(gateway, notifications, settings, Viewer::support(Uuid::new_v4()));

        let err = service
            .create_ticket("Login issue", "Can't log in", TicketCategory::Support, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SupportError::Validation(_)));
    }

    #[tokio::test]
    async fn selecting_another_ticket_drops_previous_messages() {
        let f = fixture();
        let first = open_login_ticket(&f).await;
        let second = f
            .customer
            .create_ticket("Billing", "Wrong invoice", TicketCategory::Question, false, None)
            .await
            .unwrap()
            .unwrap();

        f.customer.set_selected_ticket(Some(first.id)).await;
        assert_eq!(f.customer.messages().await[0].ticket_id, first.id);

        let selected = f.customer.set_selected_ticket(Some(second.id)).await;
        assert_eq!(selected.map(|v| v.ticket.id), Some(second.id));
        let messages = f.customer.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].ticket_id, second.id);

        f.customer.set_selected_ticket(None).await;
        assert!(f.customer.messages().await.is_empty());
    }

    #[tokio::test]
    async fn customers_only_see_their_clinic() {
        let f = fixture();
        open_login_ticket(&f).await;

        let db: Arc<dyn SupportExt> = Arc::new(f.db.clone());
        let notifications = Arc::new(NotificationService::new());
        let settings = Arc::new(SettingsService::new(db.clone(), notifications.clone()));
        let other_clinic = SupportService::new(
            db,
            notifications,
            settings,
            Viewer::customer(Uuid::new_v4(), Uuid::new_v4()),
        );

        assert!(other_clinic.fetch_tickets().await.is_empty());
        assert_eq!(f.agent.fetch_tickets().await.len(), 1);
    }
}
