// src/db/supportdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::db::DBClient;
use crate::{models::supportmodel::*, service::error::SupportError};

/// Typed query/mutation boundary to the data service.
#[async_trait]
pub trait SupportExt: Send + Sync {
    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, SupportError>;

    async fn create_message(&self, message: NewMessage) -> Result<Message, SupportError>;

    async fn update_ticket(&self, ticket_id: Uuid, patch: TicketPatch) -> Result<(), SupportError>;

    /// Tickets in scope, most recently active first.
    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, SupportError>;

    /// Messages of one ticket, oldest first.
    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>, SupportError>;

    /// Stamps `read_at` on the unread messages sent by one side. Returns the
    /// number of rows touched.
    async fn mark_messages_read(
        &self,
        ticket_id: Uuid,
        from_support: bool,
        at: DateTime<Utc>,
    ) -> Result<u64, SupportError>;

    async fn get_settings(&self) -> Result<SupportSettings, SupportError>;

    async fn update_settings(&self, patch: SettingsPatch) -> Result<(), SupportError>;
}

#[async_trait]
impl SupportExt for DBClient {
    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, SupportError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO support_tickets
                (clinic_id, user_id, subject, status, priority, category, is_live_chat)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(ticket.clinic_id)
        .bind(ticket.user_id)
        .bind(ticket.subject)
        .bind(TicketStatus::Open)
        .bind(ticket.priority)
        .bind(ticket.category)
        .bind(ticket.is_live_chat)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, SupportError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO support_messages (ticket_id, sender_id, content, is_from_support)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(message.ticket_id)
        .bind(message.sender_id)
        .bind(message.content)
        .bind(message.is_from_support)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn update_ticket(&self, ticket_id: Uuid, patch: TicketPatch) -> Result<(), SupportError> {
        let (set_assignee, assigned_to) = match patch.assigned_to {
            Some(assigned_to) => (true, assigned_to),
            None => (false, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE support_tickets
            SET status = COALESCE($2, status),
                assigned_to = CASE WHEN $3 THEN $4 ELSE assigned_to END,
                resolved_at = COALESCE($5, resolved_at),
                updated_at = COALESCE($6, updated_at)
            WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .bind(patch.status)
        .bind(set_assignee)
        .bind(assigned_to)
        .bind(patch.resolved_at)
        .bind(patch.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SupportError::NotFound(format!("Ticket {}", ticket_id)));
        }
        Ok(())
    }

    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, SupportError> {
        let query = match scope {
            TicketScope::All => sqlx::query_as::<_, Ticket>(
                r#"
                SELECT * FROM support_tickets
                ORDER BY updated_at DESC
                "#,
            ),
            TicketScope::Clinic(clinic_id) => sqlx::query_as::<_, Ticket>(
                r#"
                SELECT * FROM support_tickets
                WHERE clinic_id = $1
                ORDER BY updated_at DESC
                "#,
            )
            .bind(clinic_id),
        };

        let tickets = query.fetch_all(&self.pool).await?;
        Ok(tickets)
    }

    async fn list_messages(&self, ticket_id: Uuid) -> Result<Vec<Message>, SupportError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM support_messages
            WHERE ticket_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_messages_read(
        &self,
        ticket_id: Uuid,
        from_support: bool,
        at: DateTime<Utc>,
    ) -> Result<u64, SupportError> {
        let result = sqlx::query(
            r#"
            UPDATE support_messages
            SET read_at = $3
            WHERE ticket_id = $1
              AND is_from_support = $2
              AND read_at IS NULL
            "#,
        )
        .bind(ticket_id)
        .bind(from_support)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_settings(&self) -> Result<SupportSettings, SupportError> {
        let settings = sqlx::query_as::<_, SupportSettings>(
            r#"
            SELECT support_enabled, support_online
            FROM support_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_default())
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<(), SupportError> {
        sqlx::query(
            r#"
            INSERT INTO support_settings (id, support_enabled, support_online)
            VALUES (1, COALESCE($1, TRUE), COALESCE($2, FALSE))
            ON CONFLICT (id) DO UPDATE
            SET support_enabled = COALESCE($1, support_settings.support_enabled),
                support_online = COALESCE($2, support_settings.support_online),
                updated_at = NOW()
            "#,
        )
        .bind(patch.support_enabled)
        .bind(patch.support_online)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
