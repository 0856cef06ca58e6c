use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::access::{AccessChain, ConnectionProvider, QueryCache, RetryPolicy};
use crate::config::Config;
use crate::db::Store;
use crate::domain::{MessagingEvent, ObserverList};
use crate::gate::{AccessWindow, RateLimiter, RequestLog};
use crate::services::{
    AccessChainUserService, MessagingService, SeaOrmMessagingService, UserService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    /// Connection, retry and cache wrappers used by the user operations.
    pub chain: AccessChain,

    pub query_cache: Arc<QueryCache>,

    pub messaging: Arc<dyn MessagingService>,

    pub users: Arc<dyn UserService>,

    pub rate_limiter: Arc<RateLimiter>,

    /// `None` when the time-window gate is disabled.
    pub access_window: Option<AccessWindow>,

    pub request_log: Arc<RequestLog>,

    pub event_bus: broadcast::Sender<MessagingEvent>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);
        Self::init_with_event_bus(config, event_bus).await
    }

    async fn init_with_event_bus(
        config: Config,
        event_bus: broadcast::Sender<MessagingEvent>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let query_cache = Arc::new(QueryCache::new());
        let chain = build_access_chain(&config, query_cache.clone());

        let messaging = Arc::new(SeaOrmMessagingService::new(
            Arc::new(store.clone()),
            ObserverList::with_defaults(),
            event_bus.clone(),
        )) as Arc<dyn MessagingService>;

        let users = Arc::new(AccessChainUserService::new(chain.clone()))
            as Arc<dyn UserService>;

        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

        let access_window = if config.access_window.enabled {
            Some(AccessWindow::parse(
                &config.access_window.start,
                &config.access_window.end,
            )?)
        } else {
            None
        };

        let request_log = Arc::new(RequestLog::open(&config.observability.request_log_path).await?);

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            chain,
            query_cache,
            messaging,
            users,
            rate_limiter,
            access_window,
            request_log,
            event_bus,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}

/// Connection provider wrapped with the configured retry policy and `cache`.
#[must_use]
pub fn build_access_chain(config: &Config, cache: Arc<QueryCache>) -> AccessChain {
    AccessChain::new(ConnectionProvider::from_config(config))
        .with_retry(RetryPolicy::from(&config.access))
        .with_cache(cache)
}
