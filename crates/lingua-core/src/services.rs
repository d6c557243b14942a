//! Dependencies shared by every learning operation.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::LinguaConfig;
use crate::error::{CoreError, Result};
use crate::lock::KeyedLocks;
use crate::model::{Lesson, LessonId, Module, ModuleId, UserId, UserSettings};
use crate::traits::{Clock, LearningObserver, NoopObserver, Store, SystemClock};

/// Store, clock, observer, configuration and locks, injected at construction.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub observer: Arc<dyn LearningObserver>,
    pub config: Arc<LinguaConfig>,
    pub locks: KeyedLocks,
}

impl Services {
    /// Default configuration, wall-clock time and no observer.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
            config: Arc::new(LinguaConfig::default()),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_config(mut self, config: LinguaConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LearningObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn lesson(&self, id: LessonId) -> Result<Lesson> {
        self.store
            .lesson(id)
            .await?
            .ok_or_else(|| CoreError::not_found("lesson", id))
    }

    pub async fn module(&self, id: ModuleId) -> Result<Module> {
        self.store
            .module(id)
            .await?
            .ok_or_else(|| CoreError::not_found("module", id))
    }

    /// The user's SRS limits, falling back to the configured defaults.
    pub async fn user_settings(&self, user: UserId) -> Result<UserSettings> {
        Ok(self
            .store
            .user_settings(user)
            .await?
            .unwrap_or_else(|| self.config.srs.default_user_settings()))
    }
}

/// Run `op`, running it once more if the first run hit a write conflict.
pub async fn retry_on_conflict<T, F, Fut>(operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(err) if err.is_retryable() => {
            tracing::warn!(operation, error = %err, "write conflict, retrying once");
            op().await
        }
        other => other,
    }
}
