// service/settings_service.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::{
    db::supportdb::SupportExt,
    models::supportmodel::*,
    service::{error::SupportError, notification_service::NotificationService},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsFlag {
    Enabled,
    Online,
}

impl SettingsFlag {
    fn get(self, settings: &SupportSettings) -> bool {
        match self {
            SettingsFlag::Enabled => settings.support_enabled,
            SettingsFlag::Online => settings.support_online,
        }
    }

    fn set(self, settings: &mut SupportSettings, value: bool) {
        match self {
            SettingsFlag::Enabled => settings.support_enabled = value,
            SettingsFlag::Online => settings.support_online = value,
        }
    }

    fn patch(self, value: bool) -> SettingsPatch {
        match self {
            SettingsFlag::Enabled => SettingsPatch {
                support_enabled: Some(value),
                ..SettingsPatch::default()
            },
            SettingsFlag::Online => SettingsPatch {
                support_online: Some(value),
                ..SettingsPatch::default()
            },
        }
    }
}

/// Process-wide support flags. Shared through an `Arc`; observers get a
/// `watch` receiver and see every local or remote change.
pub struct SettingsService {
    db_client: Arc<dyn SupportExt>,
    notification_service: Arc<NotificationService>,
    current: watch::Sender<SupportSettings>,
    loaded: AtomicBool,
    toggle_lock: Mutex<()>,
}

impl std::fmt::Debug for SettingsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsService")
            .field("current", &*self.current.borrow())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl SettingsService {
    pub fn new(db_client: Arc<dyn SupportExt>, notification_service: Arc<NotificationService>) -> Self {
        let (current, _) = watch::channel(SupportSettings::default());
        Self {
            db_client,
            notification_service,
            current,
            loaded: AtomicBool::new(false),
            toggle_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> SupportSettings {
        *self.current.borrow()
    }

    /// Whether the stored row has been read at least once.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<SupportSettings> {
        self.current.subscribe()
    }

    pub fn affordance(&self, role: ViewerRole) -> Affordance {
        self.get().affordance(role)
    }

    /// Re-reads the settings row. On failure the last known value stays.
    pub async fn refetch(&self) -> Result<SupportSettings, SupportError> {
        match self.db_client.get_settings().await {
            Ok(settings) => {
                self.current.send_if_modified(|current| {
                    let changed = *current != settings;
                    *current = settings;
                    changed
                });
                self.loaded.store(true, Ordering::SeqCst);
                tracing::debug!("Support settings refreshed: {:?}", settings);
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!("Failed to refetch support settings: {}", e);
                Err(e)
            }
        }
    }

    /// Remote update of the settings row.
    pub async fn on_external_change(&self) {
        let _ = self.refetch().await;
    }

    pub async fn toggle_enabled(&self) -> SupportSettings {
        self.toggle(SettingsFlag::Enabled).await
    }

    pub async fn toggle_online(&self) -> SupportSettings {
        self.toggle(SettingsFlag::Online).await
    }

    /// Flips locally and publishes before persisting. The stored row is read
    /// first if it never was. A failed write restores only the flipped flag
    /// and emits a notice.
    async fn toggle(&self, flag: SettingsFlag) -> SupportSettings {
        let _guard = self.toggle_lock.lock().await;

        if !self.is_loaded() {
            if let Err(e) = self.refetch().await {
                let current = self.get();
                self.notification_service.notify_settings_reverted(current, &e);
                return current;
            }
        }

        let previous = flag.get(&self.get());
        self.current.send_modify(|settings| flag.set(settings, !previous));
        let next = self.get();

        match self.db_client.update_settings(flag.patch(!previous)).await {
            Ok(()) => {
                tracing::info!("Support settings updated: {:?}", next);
                self.refetch().await.unwrap_or(next)
            }
            Err(e) => {
                self.current.send_modify(|settings| flag.set(settings, previous));
                let restored = self.get();
                self.notification_service.notify_settings_reverted(restored, &e);
                restored
            }
        }
    }
}
