use crate::config::AppConfig;
use crate::core::dispatcher::RequestDispatcher;
use crate::domain::model::ServiceMap;
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything a run needs, built once from the validated configuration.
pub struct AppContext {
    pub config: AppConfig,
    pub dispatcher: RequestDispatcher,
    services: watch::Sender<Arc<ServiceMap>>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let dispatcher = RequestDispatcher::new(config.request_timeout())?;
        Ok(Self::with_dispatcher(config, dispatcher))
    }

    pub fn with_dispatcher(config: AppConfig, dispatcher: RequestDispatcher) -> Self {
        let (services, _) = watch::channel(Arc::new(config.services.clone()));
        Self {
            config,
            dispatcher,
            services,
        }
    }

    /// Current service snapshot.
    pub fn services_snapshot(&self) -> Arc<ServiceMap> {
        Arc::clone(&self.services.borrow())
    }

    pub fn subscribe_services(&self) -> watch::Receiver<Arc<ServiceMap>> {
        self.services.subscribe()
    }

    /// Handle used to publish a reloaded service snapshot.
    pub fn services_sender(&self) -> watch::Sender<Arc<ServiceMap>> {
        self.services.clone()
    }
}
