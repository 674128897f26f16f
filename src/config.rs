//! Configuration management.
//!
//! Settings come from `<data-dir>/lectern.toml`, with environment overrides
//! for the values that differ per deployment. The settings object is also
//! the composition root: it builds the database context, broker, and
//! session cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::broker::{AmqpBroker, Broker, MemoryBroker};
use crate::repository::DbContext;
use crate::services::NotesLlmConfig;
use crate::session::{MemorySessionCache, SessionCache, SessionError};

/// Config file name inside the data directory.
const CONFIG_FILE: &str = "lectern.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// In-process broker; fine for tests and single-node setups.
    Memory,
    /// RabbitMQ via AMQP.
    Amqp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub kind: BrokerKind,
    #[serde(default = "default_amqp_url")]
    pub amqp_url: String,
}

fn default_amqp_url() -> String {
    "amqp://localhost:5672".to_string()
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            kind: BrokerKind::Memory,
            amqp_url: default_amqp_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8460
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub database_url: Option<String>,
    pub broker: BrokerSettings,
    pub redis_url: Option<String>,
    pub llm: NotesLlmConfig,
    pub server: ServerSettings,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database_url: String,
    pub broker: BrokerSettings,
    pub redis_url: Option<String>,
    pub llm: NotesLlmConfig,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings for a data directory, applying env overrides.
    pub fn load(data_dir: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_data_dir(),
        };

        let file: SettingsFile = {
            let path = data_dir.join(CONFIG_FILE);
            if path.exists() {
                toml::from_str(&fs::read_to_string(&path)?)?
            } else {
                SettingsFile::default()
            }
        };

        let database_url = std::env::var("LECTERN_DATABASE_URL")
            .ok()
            .or(file.database_url)
            .unwrap_or_else(|| data_dir.join("lectern.db").display().to_string());

        let mut broker = file.broker;
        if let Ok(url) = std::env::var("LECTERN_AMQP_URL") {
            broker.kind = BrokerKind::Amqp;
            broker.amqp_url = url;
        }

        let redis_url = std::env::var("LECTERN_REDIS_URL").ok().or(file.redis_url);

        Ok(Self {
            data_dir,
            database_url,
            broker,
            redis_url,
            llm: file.llm,
            server: file.server,
        })
    }

    /// Create the data directory and write a default config file if absent.
    pub fn init_data_dir(&self) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(CONFIG_FILE);
        if !path.exists() {
            let defaults = SettingsFile {
                database_url: Some(self.database_url.clone()),
                broker: self.broker.clone(),
                redis_url: self.redis_url.clone(),
                llm: self.llm.clone(),
                server: self.server.clone(),
            };
            fs::write(&path, toml::to_string_pretty(&defaults)?)?;
        }
        Ok(path)
    }

    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url)
    }

    pub fn create_broker(&self) -> Arc<dyn Broker> {
        match self.broker.kind {
            BrokerKind::Memory => Arc::new(MemoryBroker::new()),
            BrokerKind::Amqp => Arc::new(AmqpBroker::new(&self.broker.amqp_url)),
        }
    }

    pub async fn create_session_cache(&self) -> Result<Arc<dyn SessionCache>, SessionError> {
        #[cfg(feature = "redis-backend")]
        if let Some(url) = &self.redis_url {
            let cache = crate::session::RedisSessionCache::new(url).await?;
            return Ok(Arc::new(cache));
        }
        #[cfg(not(feature = "redis-backend"))]
        if self.redis_url.is_some() {
            return Err(SessionError::Backend(
                "Redis support not compiled. Use --features redis-backend".to_string(),
            ));
        }
        Ok(Arc::new(MemorySessionCache::new()))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lectern")
}
