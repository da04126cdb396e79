// src/store/ticket_store.rs
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::supportmodel::TicketView;

/// Cached ticket list with per-ticket aggregates. The whole list is replaced
/// on every refetch; entries are never patched in place.
#[derive(Debug, Default)]
pub struct TicketStore {
    tickets: Vec<TicketView>,
    index: HashMap<Uuid, usize>,
    generation: u64,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache, ordered by `updated_at` descending.
    pub fn replace_all(&mut self, mut tickets: Vec<TicketView>) {
        tickets.sort_by(|a, b| b.ticket.updated_at.cmp(&a.ticket.updated_at));
        self.index = tickets
            .iter()
            .enumerate()
            .map(|(position, view)| (view.ticket.id, position))
            .collect();
        self.tickets = tickets;
    }

    /// Replaces the cache with the result of fetch number `generation`.
    /// A fetch that started before the one already committed is dropped.
    pub fn commit(&mut self, generation: u64, tickets: Vec<TicketView>) -> bool {
        if generation < self.generation {
            return false;
        }
        self.generation = generation;
        self.replace_all(tickets);
        true
    }

    pub fn get(&self, ticket_id: Uuid) -> Option<&TicketView> {
        self.index.get(&ticket_id).and_then(|&position| self.tickets.get(position))
    }

    pub fn contains(&self, ticket_id: Uuid) -> bool {
        self.index.contains_key(&ticket_id)
    }

    pub fn list(&self) -> &[TicketView] {
        &self.tickets
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}
