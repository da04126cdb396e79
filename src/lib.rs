pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use config::Config;
use db::supportdb::SupportExt;
use models::supportmodel::Viewer;
use service::{
    notification_service::NotificationService, settings_service::SettingsService,
    support_service::SupportService,
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn SupportExt>,
    pub notification_service: Arc<NotificationService>,
    pub settings_service: Arc<SettingsService>,
    pub support_service: Arc<SupportService>,
}

impl AppState {
    pub fn new(db_client: Arc<dyn SupportExt>, env: Config, viewer: Viewer) -> Self {
        let notification_service = Arc::new(NotificationService::new());
        let settings_service = Arc::new(SettingsService::new(db_client.clone(), notification_service.clone()));
        let support_service = Arc::new(SupportService::new(
            db_client.clone(),
            notification_service.clone(),
            settings_service.clone(),
            viewer,
        ));

        AppState {
            env,
            db_client,
            notification_service,
            settings_service,
            support_service,
        }
    }
}
