pub mod error;
pub mod notification_service;
pub mod realtime_sync;
pub mod settings_service;
pub mod state_machine;
pub mod support_service;
