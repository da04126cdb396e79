// service/realtime_sync.rs
use std::sync::Arc;

use futures::StreamExt;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    db::changefeed::{ChangeFeed, ChangeStream},
    models::realtimemodel::*,
    service::{error::SupportError, support_service::SupportService},
};

/// Merges the data service's change feed into a session's stores.
pub struct RealtimeSync;

impl RealtimeSync {
    /// Subscribes to the tickets, messages and settings streams as one unit
    /// and loads the initial state. Either all three subscriptions are
    /// established or none is.
    pub async fn mount(service: Arc<SupportService>, feed: Arc<dyn ChangeFeed>) -> Result<SyncGuard, SupportError> {
        if !service.claim_realtime() {
            return Err(SupportError::SubscriptionActive);
        }

        let mut streams = Vec::with_capacity(ChangeTable::ALL.len());
        for table in ChangeTable::ALL {
            match feed.subscribe(table).await {
                Ok(stream) => streams.push((table, stream)),
                Err(e) => {
                    service.release_realtime();
                    tracing::warn!("Realtime mount aborted, {} subscription failed: {}", table.to_str(), e);
                    return Err(e);
                }
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = streams
            .into_iter()
            .map(|(table, stream)| tokio::spawn(run_stream(service.clone(), table, stream, shutdown_rx.clone())))
            .collect();

        tracing::info!("Realtime sync mounted for {:?} viewer {}", service.viewer().role, service.viewer().user_id);

        let _ = service.settings().refetch().await;
        service.fetch_tickets().await;

        Ok(SyncGuard {
            service,
            shutdown_tx,
            tasks,
        })
    }
}

/// The mounted subscription set. `shutdown` stops the three stream tasks and
/// waits for them; dropping the guard without it aborts them.
pub struct SyncGuard {
    service: Arc<SupportService>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncGuard {
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("Realtime task ended abnormally: {}", e);
            }
        }
        tracing::info!("Realtime sync unmounted");
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.service.release_realtime();
    }
}

async fn run_stream(
    service: Arc<SupportService>,
    table: ChangeTable,
    mut stream: ChangeStream,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            event = stream.next() => match event {
                Some(event) => dispatch(&service, event).await,
                None => {
                    // Reconnection belongs to the transport.
                    tracing::warn!("Change feed for {} closed", table.to_str());
                    break;
                }
            },
        }
    }
}

/// Applies one change notification to the session.
pub async fn dispatch(service: &SupportService, event: ChangeEvent) {
    tracing::debug!("Change event: {} {:?}", event.table.to_str(), event.kind);

    match event.table {
        ChangeTable::Tickets => {
            service.fetch_tickets().await;
        }
        ChangeTable::Messages => {
            match (event.kind, event.message()) {
                (ChangeKind::Delete, _) => {}
                (ChangeKind::Insert, Some(message)) => {
                    if service.apply_incoming_message(message.clone()).await {
                        tracing::debug!("Appended realtime message {}", message.id);
                    }
                }
                (ChangeKind::Update, Some(message)) => {
                    service.apply_message_update(message).await;
                }
                // Keys only: load the conversation if it is the open one.
                (_, None) => match event.ticket_id() {
                    Some(ticket_id) if service.selected_ticket_id().await == Some(ticket_id) => {
                        service.fetch_messages(ticket_id).await;
                    }
                    Some(_) => {}
                    None => tracing::warn!("Message event without a ticket id"),
                },
            }
            service.fetch_tickets().await;
        }
        ChangeTable::Settings => {
            service.settings().on_external_change().await;
        }
    }
}
