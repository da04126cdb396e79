// config.rs
use anyhow::{anyhow, Context};
use uuid::Uuid;

use crate::models::supportmodel::{Viewer, ViewerRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub backend: Backend,
    pub port: u16,
    pub max_connections: u32,
    // Identity of the session this process serves
    pub viewer_id: Uuid,
    pub viewer_role: ViewerRole,
    pub clinic_id: Option<Uuid>,
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn init() -> anyhow::Result<Config> {
        let backend = match std::env::var("SUPPORT_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => Backend::Postgres,
            "memory" => Backend::Memory,
            other => return Err(anyhow!("SUPPORT_BACKEND must be postgres or memory, got {}", other)),
        };

        let database_url = std::env::var("DATABASE_URL").ok();
        if backend == Backend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set"));
        }

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a number")?;
        let reconcile_interval_secs = std::env::var("RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("RECONCILE_INTERVAL_SECS must be a number")?;

        let viewer_id = std::env::var("SUPPORT_VIEWER_ID")
            .context("SUPPORT_VIEWER_ID must be set")?
            .parse::<Uuid>()
            .context("SUPPORT_VIEWER_ID must be a uuid")?;
        let role = std::env::var("SUPPORT_VIEWER_ROLE").unwrap_or_else(|_| "customer".to_string());
        let viewer_role = ViewerRole::parse(&role)
            .ok_or_else(|| anyhow!("SUPPORT_VIEWER_ROLE must be customer or support, got {}", role))?;
        let clinic_id = match std::env::var("SUPPORT_CLINIC_ID") {
            Ok(value) => Some(value.parse::<Uuid>().context("SUPPORT_CLINIC_ID must be a uuid")?),
            Err(_) => None,
        };

        Ok(Config {
            database_url,
            backend,
            port,
            max_connections,
            viewer_id,
            viewer_role,
            clinic_id,
            reconcile_interval_secs,
        })
    }

    /// In-memory configuration for a fixed viewer.
    pub fn for_viewer(viewer: Viewer) -> Config {
        Config {
            database_url: None,
            backend: Backend::Memory,
            port: 8000,
            max_connections: 10,
            viewer_id: viewer.user_id,
            viewer_role: viewer.role,
            clinic_id: viewer.clinic_id,
            reconcile_interval_secs: 30,
        }
    }

    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.viewer_id,
            role: self.viewer_role,
            clinic_id: self.clinic_id,
        }
    }
}
