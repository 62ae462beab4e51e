use crate::api;
use crate::app::SocialApp;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::SocialConfig;
use crate::database::Database;
use anyhow::Result;

/// Bootstraps the backend once and hands out the wired application to
/// whichever entrypoint needs it.
pub struct SocialNode {
    config: SocialConfig,
    bootstrap: BootstrapResources,
    app: SocialApp,
}

impl SocialNode {
    /// Prepares directories, migrates the database, and wires the services.
    pub fn start(config: SocialConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;
        let app = SocialApp::from_database(bootstrap.database.clone(), &config);

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            approval_policy = ?config.posts.approval_policy,
            "social node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            app,
        })
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        api::serve_http(self.config.clone(), self.app.clone()).await
    }

    pub fn app(&self) -> &SocialApp {
        &self.app
    }

    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }
}
