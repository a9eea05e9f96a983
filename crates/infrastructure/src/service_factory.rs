//! Wires configured adapters into an [`EmailService`]

use std::sync::Arc;

use application::{
    EmailService,
    error::ApplicationError,
    ports::{MailAnalysisPort, NoOpMailAnalysis},
};
use tracing::info;

use crate::{
    adapters::{AesGcmCredentialCipher, NetworkMailConnector, WebhookMailAnalysisAdapter},
    config::AppConfig,
    persistence::{AsyncAccountStore, AsyncDatabase, AsyncDatabaseConfig, AsyncMessageStore},
};

/// Open the database named in `config`, migrating it when configured to
pub async fn open_database(config: &AppConfig) -> Result<AsyncDatabase, ApplicationError> {
    let db = AsyncDatabase::new(&AsyncDatabaseConfig::from(&config.database))
        .await
        .map_err(|e| ApplicationError::Configuration(e.to_string()))?;
    if config.database.run_migrations {
        db.migrate()
            .await
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;
    }
    Ok(db)
}

/// Build the service over `db` using the adapters selected by `config`
pub fn build_email_service(
    config: &AppConfig,
    db: &AsyncDatabase,
) -> Result<EmailService, ApplicationError> {
    config.validate()?;

    let cipher = AesGcmCredentialCipher::new(
        &config.security.encryption_key,
        &config.security.encryption_salt,
    )?;
    let connector =
        NetworkMailConnector::new(config.mail.tls.to_tls_config(), config.mail.timeouts());

    let analysis: Arc<dyn MailAnalysisPort> = match config.analysis.webhook_url() {
        Some(url) => {
            info!(url, "Post-sync analysis webhook enabled");
            Arc::new(WebhookMailAnalysisAdapter::new(url, config.analysis.timeout())?)
        },
        None => Arc::new(NoOpMailAnalysis),
    };

    Ok(EmailService::new(
        Arc::new(AsyncAccountStore::new(db.pool().clone())),
        Arc::new(AsyncMessageStore::new(db.pool().clone())),
        Arc::new(cipher),
        Arc::new(connector),
    )
    .with_analysis(analysis)
    .with_folder_selector(config.mail.folder_selector()?)
    .with_limits(config.mail.sync_limits()))
}

#[cfg(test)]
mod tests {
    use domain::UserId;

    use super::*;
    use crate::config::{DatabaseConfig, Environment};

    fn memory_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                path: ":memory:".to_string(),
                ..DatabaseConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn builds_service_over_migrated_database() {
        let config = memory_config();
        let db = open_database(&config).await.unwrap();
        let service = build_email_service(&config, &db).unwrap();

        assert!(service.get_accounts(&UserId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn production_with_dev_key_is_refused() {
        let mut config = memory_config();
        config.environment = Environment::Production;
        let db = open_database(&config).await.unwrap();

        assert!(matches!(
            build_email_service(&config, &db),
            Err(ApplicationError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn webhook_url_enables_analysis_adapter() {
        let mut config = memory_config();
        config.analysis.webhook_url = Some("http://127.0.0.1:9/analyze".to_string());
        let db = open_database(&config).await.unwrap();

        assert!(build_email_service(&config, &db).is_ok());
    }
}
