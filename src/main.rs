use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use ucms_auth::auth::SystemClock;
use ucms_auth::configuration::get_configuration;
use ucms_auth::startup::run;
use ucms_auth::state::AuthContext;
use ucms_auth::store::PgCredentialStore;
use ucms_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    tracing::info!(
        environment = ?configuration.application.environment,
        "Configuration loaded successfully"
    );

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(configuration.database.lookup_timeout())
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let context = AuthContext::from_settings(&configuration, Arc::new(SystemClock));
    let store = Arc::new(PgCredentialStore::new(pool));

    let server = run(listener, store, context)?;
    server.await
}
