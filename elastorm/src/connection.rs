//! Connection handle: settings plus the transport they resolve to

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::safety::{guard, Target};
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// One handle per backend configuration, shared by reference between
/// queries and mutations.
#[derive(Clone)]
pub struct Connection {
    settings: Settings,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("index", &self.settings.database.name)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connect over HTTP. The database index is created on the way in; a
    /// failure there (usually "already exists") is ignored.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let db = &settings.database;
        let port = db.port_number()?;
        let base_url = Url::parse(&format!("http://{}:{}/", db.host, port))
            .map_err(|e| Error::Config(format!("invalid host '{}': {e}", db.host)))?;

        let transport = guard(
            "connect",
            Target::index(&db.name),
            HttpTransport::new(base_url, db.addressing, Duration::from_secs(db.timeout_secs)),
        )?;
        info!("connected to {}:{} (index '{}')", db.host, port, db.name);

        let conn = Self::with_transport(settings, Arc::new(transport));
        if let Err(e) = conn.transport.create_index(conn.index()).await {
            debug!("index '{}' not created: {}", conn.index(), e);
        }
        Ok(conn)
    }

    /// Wrap an existing transport, e.g. [`crate::transport::MemoryTransport`].
    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Same transport, pointed at another database index.
    pub fn with_index(&self, name: impl Into<String>) -> Self {
        let mut settings = self.settings.clone();
        settings.database.name = name.into();
        Self {
            settings,
            transport: Arc::clone(&self.transport),
        }
    }

    pub fn index(&self) -> &str {
        &self.settings.database.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}
