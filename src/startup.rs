//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::infrastructure::cache::{self, MessageCacheService, RedisCache};
use crate::infrastructure::database;
use crate::infrastructure::relay::RelayBus;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{Hub, HubHandle};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub cache: Arc<MessageCacheService<RedisCache>>,
    pub hub: HubHandle,
    pub relay: Arc<RelayBus>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database connection pool created");

        let redis = cache::create_redis_client(&settings.redis).await?;

        let redis_cache = match settings.redis.key_prefix.as_deref() {
            Some(prefix) => RedisCache::with_prefix(redis.clone(), prefix),
            None => RedisCache::new(redis.clone()),
        };
        let message_cache = Arc::new(MessageCacheService::new(
            Arc::new(redis_cache),
            settings.cache.message_ttl_secs,
        ));

        // The relay subscriber needs its own client; a pub/sub
        // connection cannot issue regular commands
        let relay_client = redis::Client::open(settings.redis.url.as_str())?;
        let relay = Arc::new(RelayBus::new(relay_client, redis.clone(), &settings.relay));

        let hub = Hub::spawn();

        // Messages from other instances feed straight into local fanout
        let hub_for_relay = hub.clone();
        tokio::spawn(relay.clone().run_subscriber(move |message| {
            hub_for_relay.dispatch(message);
        }));

        crate::presentation::http::handlers::health::init_server_start();

        let state = AppState {
            db,
            redis,
            cache: message_cache,
            hub,
            relay,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to the configured address
        let addr = settings.server_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
