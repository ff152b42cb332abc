use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use jetway_api::{app, AppState, AuthConfig};
use jetway_booking::{LogSink, NotificationDispatcher};
use jetway_core::notify::NotificationSink;
use jetway_core::repository::BookingStore;
use jetway_store::{Config, DbClient, EventProducer, KafkaNotificationSink, PgBookingStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jetway_api=debug,jetway_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Jetway API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let store: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(db.pool.clone()));

    let sink: Arc<dyn NotificationSink> = match &config.kafka {
        Some(kafka) => {
            let producer = EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
            Arc::new(KafkaNotificationSink::new(producer, kafka.notification_topic.clone()))
        }
        None => {
            tracing::info!("No Kafka configured, notifications go to the log");
            Arc::new(LogSink)
        }
    };
    let (notifier, _worker) = NotificationDispatcher::spawn(
        store.clone(),
        sink,
        config.business_rules.notification_queue_capacity,
    );

    let redis = match &config.redis {
        Some(redis) => match RedisClient::new(&redis.url).await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
                None
            }
        },
        None => None,
    };

    let app_state = AppState::new(
        store,
        notifier,
        &config.business_rules,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        redis,
    )
    .context("Failed to register metrics")?;

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
