use std::net::SocketAddr;
use std::sync::Arc;

use ridepool_api::{
    app,
    state::{AppState, AuthConfig},
};
use ridepool_domain::repository::ChatRepository;
use ridepool_hub::CoordinationHub;
use ridepool_store::{
    DbClient, EventProducer, PgBookingRepository, PgChatRepository, PgRideRepository,
    PgUserRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ridepool_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ridepool_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting RidePool API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let redis = Arc::new(
        RedisClient::new(&config.redis.url)
            .await
            .expect("Failed to connect to Redis"),
    );

    let kafka = Arc::new(
        EventProducer::new(&config.kafka.brokers).expect("Failed to create Kafka producer"),
    );

    let chat: Arc<dyn ChatRepository> = Arc::new(PgChatRepository::new(db.pool.clone()));
    let hub = CoordinationHub::new(Arc::clone(&chat));

    let app_state = AppState {
        rides: Arc::new(PgRideRepository::new(db.pool.clone())),
        bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
        chat,
        users: Arc::new(PgUserRepository::new(db.pool.clone())),
        attempts: redis.clone(),
        redis,
        kafka,
        hub,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}
