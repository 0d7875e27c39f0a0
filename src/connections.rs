// src/connections.rs
//! Lazily created, per-run connection handles: database, mail transport and
//! an optional remote shell.
//!
//! Each accessor connects on first use and caches the handle. Later calls
//! run a liveness probe first and reconnect once, transparently, when the
//! probe fails. Accessors take `&mut self`, so a reconnect can never be
//! re-entered for the same kind while it is in progress.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, Tokio1Executor};
use openssh::{KnownHosts, Session, SessionBuilder};
use std::time::Duration;

use crate::config::{AppConfig, DatabaseConfig, MailConfig, RemoteShellConfig};
use crate::error::{ConfigError, ConnectionError, ConnectionKind};
use crate::store::DbHandle;

pub type Mailer = AsyncSmtpTransport<Tokio1Executor>;

/// Whether the database handle should have the configured schema selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    Selected,
    /// Used only by schema provisioning, before the schema is known to exist.
    Unselected,
}

pub struct ConnectionManager {
    database_cfg: Option<DatabaseConfig>,
    mail_cfg: Option<MailConfig>,
    shell_cfg: Option<RemoteShellConfig>,
    db: Option<DbHandle>,
    mail: Option<Mailer>,
    shell: Option<Session>,
}

impl ConnectionManager {
    pub fn new(
        database: Option<DatabaseConfig>,
        mail: Option<MailConfig>,
        remote_shell: Option<RemoteShellConfig>,
    ) -> Self {
        Self {
            database_cfg: database,
            mail_cfg: mail,
            shell_cfg: remote_shell,
            db: None,
            mail: None,
            shell: None,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.database.clone(),
            cfg.mail.clone(),
            cfg.remote_shell.clone(),
        )
    }

    pub fn database_config(&self) -> Result<&DatabaseConfig, ConfigError> {
        self.database_cfg
            .as_ref()
            .ok_or(ConfigError::Missing { section: "database" })
    }

    pub fn is_cached(&self, kind: ConnectionKind) -> bool {
        match kind {
            ConnectionKind::Database => self.db.is_some(),
            ConnectionKind::Mail => self.mail.is_some(),
            ConnectionKind::RemoteShell => self.shell.is_some(),
        }
    }

    // ---- database ----

    pub fn database(&mut self, mode: SchemaMode) -> Result<&mut DbHandle, ConnectionError> {
        let cfg = self.database_config()?.clone();

        let db = match self.db.take() {
            Some(db) => match db.ping() {
                Ok(()) => self.db.insert(db),
                Err(e) => {
                    tracing::warn!(
                        target: "connections",
                        kind = %ConnectionKind::Database,
                        error = %e,
                        "existing connection lost, reconnecting"
                    );
                    let reselect = db.active_schema().is_some();
                    drop(db);
                    let mode = if reselect { SchemaMode::Selected } else { mode };
                    self.db.insert(Self::connect_database(&cfg, mode)?)
                }
            },
            None => self.db.insert(Self::connect_database(&cfg, mode)?),
        };

        if mode == SchemaMode::Selected && db.active_schema().is_none() {
            if let Some(schema) = cfg.schema.as_deref() {
                db.select_schema(schema)?;
            }
        }
        Ok(db)
    }

    fn connect_database(
        cfg: &DatabaseConfig,
        mode: SchemaMode,
    ) -> Result<DbHandle, ConnectionError> {
        std::fs::create_dir_all(&cfg.data_dir).map_err(|source| ConnectionError::DataDir {
            path: cfg.data_dir.clone(),
            source,
        })?;

        let schema = match mode {
            SchemaMode::Selected => cfg.schema.as_deref(),
            SchemaMode::Unselected => None,
        };
        let opened = match schema {
            Some(s) => DbHandle::open_with_schema(&cfg.data_dir, s),
            None => DbHandle::open(&cfg.data_dir),
        };
        match opened {
            Ok(db) => {
                tracing::info!(
                    target: "connections",
                    kind = %ConnectionKind::Database,
                    data_dir = %cfg.data_dir.display(),
                    schema = schema.unwrap_or("-"),
                    "connected"
                );
                Ok(db)
            }
            Err(e) => {
                tracing::error!(
                    target: "connections",
                    kind = %ConnectionKind::Database,
                    data_dir = %cfg.data_dir.display(),
                    error = %e,
                    "connection failed"
                );
                Err(e.into())
            }
        }
    }

    pub fn close_database(&mut self) {
        if let Some(db) = self.db.take() {
            match db.close() {
                Ok(()) => tracing::info!(target: "connections", kind = %ConnectionKind::Database, "closed"),
                Err(e) => tracing::warn!(target: "connections", kind = %ConnectionKind::Database, error = %e, "error while closing"),
            }
        }
    }

    // ---- mail ----

    pub async fn mail(&mut self) -> Result<&Mailer, ConnectionError> {
        let cfg = self
            .mail_cfg
            .clone()
            .ok_or(ConfigError::Missing { section: "mail" })?;

        if let Some(mailer) = self.mail.take() {
            match mailer.test_connection().await {
                Ok(true) => return Ok(&*self.mail.insert(mailer)),
                Ok(false) => tracing::warn!(target: "connections", kind = %ConnectionKind::Mail, "probe rejected, reconnecting"),
                Err(e) => tracing::warn!(target: "connections", kind = %ConnectionKind::Mail, error = %e, "existing connection lost, reconnecting"),
            }
        }

        let mailer = Self::connect_mail(&cfg).await?;
        Ok(&*self.mail.insert(mailer))
    }

    async fn connect_mail(cfg: &MailConfig) -> Result<Mailer, ConnectionError> {
        let creds = Credentials::new(cfg.sender_email.clone(), cfg.resolved_password()?);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_server)?
            .port(cfg.smtp_port)
            .credentials(creds)
            .timeout(Some(cfg.timeout()))
            .build();

        match mailer.test_connection().await {
            Ok(true) => {
                tracing::info!(
                    target: "connections",
                    kind = %ConnectionKind::Mail,
                    sender = %cfg.sender_email,
                    "connected"
                );
                Ok(mailer)
            }
            Ok(false) => {
                tracing::error!(target: "connections", kind = %ConnectionKind::Mail, server = %cfg.smtp_server, "connection probe rejected");
                Err(ConnectionError::MailRejected)
            }
            Err(e) => {
                tracing::error!(target: "connections", kind = %ConnectionKind::Mail, server = %cfg.smtp_server, error = %e, "connection failed");
                Err(e.into())
            }
        }
    }

    pub fn close_mail(&mut self) {
        if self.mail.take().is_some() {
            tracing::info!(target: "connections", kind = %ConnectionKind::Mail, "closed");
        }
    }

    // ---- remote shell ----

    pub async fn remote_shell(&mut self) -> Result<&Session, ConnectionError> {
        let cfg = self.shell_cfg.clone().ok_or(ConfigError::Missing {
            section: "remote-shell",
        })?;

        if let Some(session) = self.shell.take() {
            match session.check().await {
                Ok(()) => return Ok(&*self.shell.insert(session)),
                Err(e) => {
                    tracing::warn!(target: "connections", kind = %ConnectionKind::RemoteShell, error = %e, "existing connection lost, reconnecting");
                    let _ = session.close().await;
                }
            }
        }

        let session = Self::connect_remote_shell(&cfg).await?;
        Ok(&*self.shell.insert(session))
    }

    async fn connect_remote_shell(cfg: &RemoteShellConfig) -> Result<Session, ConnectionError> {
        let mut builder = SessionBuilder::default();
        builder
            .user(cfg.username.clone())
            .port(cfg.port)
            .connect_timeout(Duration::from_secs(cfg.timeout_secs))
            .known_hosts_check(KnownHosts::Add);
        if let Some(key) = &cfg.key_path {
            builder.keyfile(key);
        }

        match builder.connect(&cfg.host).await {
            Ok(session) => {
                tracing::info!(target: "connections", kind = %ConnectionKind::RemoteShell, host = %cfg.host, port = cfg.port, "connected");
                Ok(session)
            }
            Err(e) => {
                tracing::error!(target: "connections", kind = %ConnectionKind::RemoteShell, host = %cfg.host, port = cfg.port, error = %e, "connection failed");
                Err(e.into())
            }
        }
    }

    pub async fn close_remote_shell(&mut self) {
        if let Some(session) = self.shell.take() {
            match session.close().await {
                Ok(()) => tracing::info!(target: "connections", kind = %ConnectionKind::RemoteShell, "closed"),
                Err(e) => tracing::warn!(target: "connections", kind = %ConnectionKind::RemoteShell, error = %e, "error while closing"),
            }
        }
    }

    /// Close every cached handle. A no-op for kinds that were never opened.
    pub async fn close_all(&mut self) {
        self.close_database();
        self.close_mail();
        self.close_remote_shell().await;
    }
}
