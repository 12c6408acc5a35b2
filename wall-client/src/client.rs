//! Application-level wiring of session, gate, data access and cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use wall_cache::QueryCache;
use wall_core::{Profile, WallResult};

use crate::config::ClientConfig;
use crate::data::DataAccess;
use crate::gate::AccessGate;
use crate::identity::{IdentityOptions, IdentityProvider};
use crate::queries::QueryPolicies;
use crate::service::ServiceConnector;
use crate::session::{LoginOutcome, Session, SessionManager};
use crate::telemetry;

/// A running Student Wall client.
///
/// Created by [`WallClient::start`] and torn down by
/// [`WallClient::shutdown`].
#[derive(Debug)]
pub struct WallClient {
    session: Arc<SessionManager>,
    gate: AccessGate,
    data: DataAccess,
    cache: QueryCache,
    collector: Option<JoinHandle<()>>,
}

impl WallClient {
    /// Build the client without initializing the session.
    pub fn new(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        connector: Arc<dyn ServiceConnector>,
    ) -> Self {
        let options = IdentityOptions {
            provider_url: config.identity_provider_url(),
            disable_idle_logout: config.disable_idle_logout,
        };
        let cache = QueryCache::new();
        let stale = cache.clone();
        let session = Arc::new(
            SessionManager::new(identity, connector, options)
                .on_identity_change(move || stale.clear()),
        );
        let data = DataAccess::new(
            Arc::clone(&session),
            cache.clone(),
            QueryPolicies::from_config(&config.cache),
        );
        Self {
            gate: AccessGate::new(Arc::clone(&session)),
            session,
            data,
            cache,
            collector: None,
        }
    }

    /// Install logging, initialize the session and start cache collection.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        connector: Arc<dyn ServiceConnector>,
    ) -> Self {
        telemetry::init_tracing(config.log_filter.as_deref(), config.log_json);
        let mut client = Self::new(config, identity, connector);
        client.session.initialize().await;
        client.collector = Some(spawn_collector(
            client.cache.clone(),
            Duration::from_millis(config.gc_interval_ms),
        ));
        tracing::info!(network = ?config.network, "wall client started");
        client
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Current session state.
    pub fn snapshot(&self) -> Session {
        self.session.snapshot()
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn data(&self) -> &DataAccess {
        &self.data
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Log in. A completed login drops every cached read of the previous
    /// caller before the new session becomes visible.
    pub async fn login(&self) -> WallResult<LoginOutcome> {
        self.session.login().await
    }

    /// Log out, dropping every cached read of the previous caller.
    pub async fn logout(&self) {
        self.session.logout().await
    }

    pub async fn refresh_profile(&self) -> WallResult<Option<Profile>> {
        self.session.refresh_profile().await
    }

    pub fn is_collecting(&self) -> bool {
        self.collector
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop background collection and drop cached reads.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.collector.take() {
            handle.abort();
        }
        self.cache.clear();
        tracing::info!("wall client shut down");
    }
}

impl Drop for WallClient {
    fn drop(&mut self) {
        if let Some(handle) = self.collector.take() {
            handle.abort();
        }
    }
}

fn spawn_collector(cache: QueryCache, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.collect_garbage();
            if removed > 0 {
                tracing::debug!(removed, "collected idle cache entries");
            }
        }
    })
}
