//! Subcommand implementations.

pub mod access;
pub mod due;
pub mod enter;
pub mod grade;
pub mod import;
pub mod plan;
pub mod review;
pub mod stats;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use lingua_core::config::load_config_from;
use lingua_core::memory::MemoryStore;
use lingua_core::model::{LessonProgress, UserCardDirection, UserId, UserXp};
use lingua_core::services::Services;
use lingua_core::traits::{Clock, LearningObserver, ManualClock, SystemClock};

use crate::GlobalOpts;

/// Services bound to a state file for the duration of one command.
pub struct Session {
    pub services: Services,
    store: Arc<MemoryStore>,
    path: PathBuf,
}

impl Session {
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let config = load_config_from(global.config.as_deref())?;
        let store = Arc::new(MemoryStore::load(&global.state)?);
        let clock: Arc<dyn Clock> = match global.now {
            Some(at) => Arc::new(ManualClock::new(at)),
            None => Arc::new(SystemClock),
        };
        let services = Services::new(store.clone())
            .with_config(config)
            .with_clock(clock)
            .with_observer(Arc::new(LogObserver));
        Ok(Self {
            services,
            store,
            path: global.state.clone(),
        })
    }

    /// Write the store back to the state file.
    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.path).await
    }
}

/// Reports learning events through `tracing`.
struct LogObserver;

impl LearningObserver for LogObserver {
    fn on_lesson_completed(&self, progress: &LessonProgress) {
        info!(
            user = progress.user_id,
            lesson = progress.lesson_id,
            score = progress.score,
            "lesson completed"
        );
    }

    fn on_xp_awarded(&self, user: UserId, amount: u64, total: &UserXp) {
        info!(user, amount, total = total.total_xp, level = total.level(), "xp awarded");
    }

    fn on_card_reviewed(&self, card: &UserCardDirection, quality: u8) {
        tracing::debug!(card = card.id, quality, interval = card.interval, "card reviewed");
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
