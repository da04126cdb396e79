// src/store/message_store.rs
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::supportmodel::Message;

/// Messages of the selected ticket only. Selecting another ticket drops the
/// previous conversation.
#[derive(Debug, Default)]
pub struct MessageStore {
    ticket_id: Option<Uuid>,
    messages: Vec<Message>,
    ids: HashSet<Uuid>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket_id(&self) -> Option<Uuid> {
        self.ticket_id
    }

    pub fn select(&mut self, ticket_id: Option<Uuid>) {
        if self.ticket_id != ticket_id {
            self.ticket_id = ticket_id;
            self.messages.clear();
            self.ids.clear();
        }
    }

    /// Commits a fetched list if it still belongs to the selected ticket.
    /// Returns `false` when the fetch was superseded.
    pub fn commit_fetch(&mut self, ticket_id: Uuid, mut messages: Vec<Message>) -> bool {
        if self.ticket_id != Some(ticket_id) {
            return false;
        }

        // Arrivals can interleave with the fetch; keep both, once.
        let mut seen = HashSet::with_capacity(messages.len());
        messages.retain(|m| m.ticket_id == ticket_id && seen.insert(m.id));
        let cached = std::mem::take(&mut self.messages);
        {
            let known: HashMap<Uuid, &Message> = cached.iter().map(|m| (m.id, m)).collect();
            for message in messages.iter_mut() {
                if let Some(known) = known.get(&message.id) {
                    keep_read_receipt(message, known);
                }
            }
        }
        for pending in cached {
            if seen.insert(pending.id) {
                messages.push(pending);
            }
        }

        self.ids = seen;
        self.messages = messages;
        self.sort();
        true
    }

    /// Adds a message unless its id is already present or it belongs to
    /// another ticket.
    pub fn append_if_absent(&mut self, message: Message) -> bool {
        if self.ticket_id != Some(message.ticket_id) || self.ids.contains(&message.id) {
            return false;
        }
        self.ids.insert(message.id);
        self.messages.push(message);
        self.sort();
        true
    }

    /// Replaces a known message with a newer version of the same row.
    pub fn replace(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                let mut message = message;
                keep_read_receipt(&mut message, existing);
                *existing = message;
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // Stable: equal timestamps keep arrival order.
    fn sort(&mut self) {
        self.messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }
}

/// `read_at` only moves from unset to set, so an older copy of the row never
/// clears it.
fn keep_read_receipt(incoming: &mut Message, known: &Message) {
    if incoming.read_at.is_none() {
        incoming.read_at = known.read_at;
    }
}
