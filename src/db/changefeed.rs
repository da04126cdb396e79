// src/db/changefeed.rs
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use sqlx::postgres::PgListener;

use super::db::DBClient;
use crate::{
    models::realtimemodel::{ChangeEvent, ChangeTable},
    service::error::SupportError,
};

/// Channel the triggers in `migrations/0001_support.sql` publish on.
pub const SUPPORT_CHANGES_CHANNEL: &str = "support_changes";

pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Row-level change notifications, one stream per table. Delivery is
/// at-least-once and unordered across tables; the stream ends when the
/// underlying transport disconnects.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: ChangeTable) -> Result<ChangeStream, SupportError>;
}

#[async_trait]
impl ChangeFeed for DBClient {
    async fn subscribe(&self, table: ChangeTable) -> Result<ChangeStream, SupportError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(SUPPORT_CHANGES_CHANNEL).await?;

        tracing::info!("Listening on {} for {}", SUPPORT_CHANGES_CHANNEL, table.to_str());

        let stream = listener
            .into_stream()
            .take_while(|notification| {
                let alive = notification.is_ok();
                if let Err(e) = notification {
                    tracing::warn!("Change feed disconnected: {}", e);
                }
                futures::future::ready(alive)
            })
            .filter_map(move |notification| {
                let event = notification.ok().and_then(|n| {
                    match serde_json::from_str::<ChangeEvent>(n.payload()) {
                        Ok(event) => Some(event),
                        Err(e) => {
                            tracing::warn!("Dropping malformed change payload: {}", e);
                            None
                        }
                    }
                });
                futures::future::ready(event.filter(|event| event.table == table))
            });

        Ok(stream.boxed())
    }
}
