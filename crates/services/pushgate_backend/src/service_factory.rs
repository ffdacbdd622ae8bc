//! Service factory for the backend.
//!
//! Builds the token registry selected by configuration, the Firebase-backed
//! dispatch engine when credentials are present, and the HTTP router on top.

use axum::Router;
use pushgate_common::{config_error, PushgateError};
use pushgate_config::AppConfig;
use pushgate_db::{
    DbClient, DeviceRegistrationRepository, DeviceRegistrationRepositoryFactory,
    InMemoryDeviceRegistrationRepository, RepositoryFactory, SqlDeviceRegistrationRepository,
};
use pushgate_firebase::{routes, FirebaseState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Owns the long-lived services of one backend instance
pub struct PushgateServiceFactory {
    config: Arc<AppConfig>,
    registry: Arc<dyn DeviceRegistrationRepository>,
    firebase_state: Arc<FirebaseState>,
}

impl PushgateServiceFactory {
    /// Initialize every service the configuration asks for
    ///
    /// # Errors
    ///
    /// Fails when the database cannot be reached or its schema cannot be
    /// created. Missing Firebase credentials are not an error.
    pub async fn new(config: Arc<AppConfig>) -> Result<Self, PushgateError> {
        let registry = Self::create_registry(&config).await?;
        registry.init_schema().await?;

        let firebase_state = Arc::new(FirebaseState::from_config(&config, registry.clone()));

        Ok(Self {
            config,
            registry,
            firebase_state,
        })
    }

    async fn create_registry(
        config: &Arc<AppConfig>,
    ) -> Result<Arc<dyn DeviceRegistrationRepository>, PushgateError> {
        let factory = DeviceRegistrationRepositoryFactory::new();

        if config.use_database {
            if config.database.is_none() {
                return Err(config_error(
                    "use_database is set but the [database] section is missing",
                ));
            }
            info!("Initializing SQL token registry...");
            let db_client = DbClient::new(config).await?;
            info!("Connected to database: {}", db_client);
            let repo: SqlDeviceRegistrationRepository = factory.create_repository(db_client);
            Ok(Arc::new(repo))
        } else {
            info!("Using in-memory token registry; registrations are lost on restart");
            let repo: InMemoryDeviceRegistrationRepository = factory.create_repository(());
            Ok(Arc::new(repo))
        }
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn registry(&self) -> Arc<dyn DeviceRegistrationRepository> {
        self.registry.clone()
    }

    pub fn firebase_state(&self) -> Arc<FirebaseState> {
        self.firebase_state.clone()
    }

    /// The API router, nested under `/api`, with request tracing
    pub fn router(&self) -> Router {
        #[allow(unused_mut)] // mutated only with the openapi feature
        let mut app = Router::new().nest("/api", routes(self.firebase_state()));

        #[cfg(feature = "openapi")]
        {
            use pushgate_firebase::openapi::FirebaseApiDoc;
            use utoipa::OpenApi;
            use utoipa_swagger_ui::SwaggerUi;

            #[derive(OpenApi)]
            #[openapi(
                info(
                    title = "Pushgate API",
                    version = "0.1.0",
                    description = "Device registration and push notification dispatch",
                    license(name = "MIT", url = "https://opensource.org/licenses/MIT")
                ),
                servers((url = "/api", description = "Main API Prefix")),
            )]
            struct ApiDoc;

            let mut openapi_doc = ApiDoc::openapi();
            openapi_doc.merge(FirebaseApiDoc::openapi());
            info!("Adding Swagger UI at /api/docs");

            app = app.merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc));
        }

        app.layer(TraceLayer::new_for_http())
    }
}

/// Build the complete application router from configuration
pub async fn build_app(config: Arc<AppConfig>) -> Result<Router, PushgateError> {
    Ok(PushgateServiceFactory::new(config).await?.router())
}
