use actix_web::{web, App, HttpServer};
use chat_relay_service::{
    config, db, error, logging,
    redis_client::RedisClient,
    routes,
    services::{notification_producer::NotificationProducer, presence_service::PresenceTracker},
    state::AppState,
    websocket::streams::{start_streams_listener, StreamsConfig},
    websocket::typing::TypingTracker,
};
use redis_utils::{RedisPool, SentinelConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    // Initialize DB pool
    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    let sentinel_cfg = cfg.redis_sentinel.as_ref().map(|cfg| {
        SentinelConfig::new(
            cfg.endpoints.clone(),
            cfg.master_name.clone(),
            Duration::from_millis(cfg.poll_interval_ms),
        )
    });

    let redis_pool = RedisPool::connect(&cfg.redis_url, sentinel_cfg)
        .await
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;
    let redis = RedisClient::new(redis_pool.manager());
    let registry = chat_relay_service::websocket::ConnectionRegistry::new();

    let presence = Arc::new(PresenceTracker::new(
        db.clone(),
        redis.clone(),
        registry.clone(),
        Duration::from_millis(cfg.presence_grace_ms),
    ));
    let typing = TypingTracker::new(Duration::from_millis(cfg.typing_ttl_ms));

    // Kafka producer for notification events (optional)
    let notifications = match &cfg.kafka {
        Some(kafka) => {
            match NotificationProducer::new(&kafka.brokers, &kafka.notification_topic) {
                Ok(producer) => Some(Arc::new(producer)),
                Err(e) => {
                    tracing::warn!(error = %e, "Kafka producer unavailable, notifications disabled");
                    None
                }
            }
        }
        None => {
            tracing::info!("KAFKA_BROKERS not set, notification events disabled");
            None
        }
    };

    let state = AppState {
        db: db.clone(),
        registry: registry.clone(),
        redis: redis.clone(),
        config: cfg.clone(),
        presence,
        typing,
        notifications,
    };

    // Start Redis Streams listener for cross-instance fanout
    let redis_stream = redis.clone();
    let _streams_listener: JoinHandle<()> = tokio::spawn(async move {
        let config = StreamsConfig::default();
        if let Err(e) = start_streams_listener(redis_stream, registry, config).await {
            tracing::error!(error=%e, "redis streams listener failed");
        }
    });

    // Hourly fanout stream maintenance
    let redis_trim = redis.clone();
    tokio::spawn(async move {
        let config = StreamsConfig::default();
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = chat_relay_service::websocket::streams::trim_old_messages(
                &redis_trim,
                &config,
            )
            .await
            {
                tracing::warn!(error=%e, "fanout stream trim failed");
            }
        }
    });

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-relay-service");

    let rest_state = state.clone();
    let jwt_secret = cfg.jwt_secret.clone();

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Wrapping order: RequestId outermost so Logging and handlers see
        // the id; JwtAuth innermost so auth failures still get logged.
        App::new()
            .wrap(actix_middleware::JwtAuth::new(jwt_secret.clone()))
            .wrap(cors)
            .wrap(actix_middleware::Logging)
            .wrap(actix_middleware::RequestId::new())
            .app_data(web::Data::new(rest_state.clone()))
            .service(routes::rooms::create_direct_room)
            .service(routes::rooms::create_group_room)
            .service(routes::rooms::list_rooms)
            .service(routes::rooms::get_room)
            .service(routes::rooms::add_member)
            .service(routes::rooms::remove_member)
            .service(routes::rooms::mark_read)
            .service(routes::messages::send_message)
            .service(routes::messages::get_messages)
            .service(routes::messages::edit_message)
            .service(routes::messages::delete_message)
            .service(routes::presence::get_presence)
            .service(routes::presence::set_presence)
            .service(routes::wsroute::ws_handler)
            .service(routes::metrics::metrics)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
