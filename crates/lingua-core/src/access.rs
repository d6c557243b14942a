//! Lesson and module gating.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::model::{Lesson, LessonId, LessonProgress, Module, ModuleId, UserId};
use crate::services::Services;
use crate::traits::{Sequence, Transaction};

/// Tolerance when comparing completion ratios against the unlock ratio.
const RATIO_EPSILON: f64 = 1e-9;

/// Why a module is or is not open to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAccess {
    pub module_id: ModuleId,
    pub accessible: bool,
    /// Completed share of the previous module's lessons, when one exists.
    pub completion_ratio: Option<f64>,
    pub locked_reasons: Vec<String>,
}

#[derive(Clone)]
pub struct AccessGatekeeper {
    services: Services,
}

impl AccessGatekeeper {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// True if the user already works in the lesson's module, or the lesson
    /// opens the first module of its level.
    pub async fn lesson_accessible(&self, user: UserId, lesson_id: LessonId) -> Result<bool> {
        let lesson = self.services.lesson(lesson_id).await?;
        self.lesson_open(user, &lesson).await
    }

    pub async fn module_accessible(&self, user: UserId, module_id: ModuleId) -> Result<bool> {
        Ok(self.module_access(user, module_id).await?.accessible)
    }

    pub async fn module_access(&self, user: UserId, module_id: ModuleId) -> Result<ModuleAccess> {
        let module = self.services.module(module_id).await?;
        let store = &self.services.store;

        if !store.progress_in_module(user, module.id).await?.is_empty() {
            return Ok(ModuleAccess {
                module_id,
                accessible: true,
                completion_ratio: None,
                locked_reasons: Vec::new(),
            });
        }

        let mut reasons = Vec::new();
        let siblings = store.modules_in_level(&module.level).await?;
        let previous = siblings
            .iter()
            .filter(|m| m.number < module.number)
            .max_by_key(|m| m.number);

        let completion_ratio = match previous {
            Some(prev) => {
                let ratio = self.completion_ratio(user, prev).await?;
                let required = self.services.config.access.module_unlock_ratio;
                if ratio + RATIO_EPSILON < required {
                    reasons.push(format!(
                        "complete at least {:.0}% of Module {} ({})",
                        required * 100.0,
                        prev.number,
                        prev.title
                    ));
                }
                Some(ratio)
            }
            None => None,
        };

        for prerequisite in &module.prerequisites {
            let Some(prior) = store.module(prerequisite.module_id).await? else {
                warn!(
                    module = module.id,
                    prerequisite = prerequisite.module_id,
                    "prerequisite module does not exist, ignoring"
                );
                continue;
            };
            if !self
                .prerequisite_met(user, &prior, prerequisite.min_score)
                .await?
            {
                reasons.push(format!(
                    "requires score ≥ {} in every lesson of Module {} ({})",
                    prerequisite.min_score, prior.number, prior.title
                ));
            }
        }

        debug!(user, module = module.id, locked = reasons.len(), "module access evaluated");
        Ok(ModuleAccess {
            module_id,
            accessible: reasons.is_empty(),
            completion_ratio,
            locked_reasons: reasons,
        })
    }

    /// Return the user's progress on a lesson, creating the `in_progress`
    /// record on first entry. Entry is refused with `AccessDenied` unless the
    /// lesson is accessible or opens an accessible module.
    pub async fn enter_lesson(&self, user: UserId, lesson_id: LessonId) -> Result<LessonProgress> {
        let lesson = self.services.lesson(lesson_id).await?;
        let _guard = self.services.locks.lock(user, lesson_id).await;
        let store = &self.services.store;

        if let Some(existing) = store.progress(user, lesson_id).await? {
            return Ok(existing);
        }
        self.check_entry(user, &lesson).await?;

        let id = store.next_id(Sequence::Progress).await?;
        let mut progress = LessonProgress::start(id, user, lesson.id, lesson.kind, self.services.now());
        let mut tx = Transaction::new();
        tx.put_progress(progress.clone());
        match store.commit(tx).await {
            Ok(()) => {
                progress.version += 1;
                info!(user, lesson = lesson.id, "lesson started");
                Ok(progress)
            }
            // Someone else created it first; theirs is the record.
            Err(err) if err.is_retryable() => store
                .progress(user, lesson_id)
                .await?
                .ok_or(err),
            Err(err) => Err(err),
        }
    }

    /// Refuse entry to `lesson` with the reasons it is locked.
    pub async fn check_entry(&self, user: UserId, lesson: &Lesson) -> Result<()> {
        if self.lesson_open(user, lesson).await? {
            return Ok(());
        }
        let lessons = self.services.store.lessons_in_module(lesson.module_id).await?;
        let opens_module = lessons.first().is_some_and(|first| first.id == lesson.id);
        if !opens_module {
            return Err(CoreError::access_denied(format!(
                "lesson {} is locked: start the module from its first lesson",
                lesson.id
            )));
        }
        let access = self.module_access(user, lesson.module_id).await?;
        if access.accessible {
            Ok(())
        } else {
            Err(CoreError::access_denied(access.locked_reasons.join("; ")))
        }
    }

    async fn lesson_open(&self, user: UserId, lesson: &Lesson) -> Result<bool> {
        let store = &self.services.store;
        if !store
            .progress_in_module(user, lesson.module_id)
            .await?
            .is_empty()
        {
            return Ok(true);
        }
        let module = self.services.module(lesson.module_id).await?;
        let modules = store.modules_in_level(&module.level).await?;
        if modules.first().map(|m| m.id) != Some(module.id) {
            return Ok(false);
        }
        let lessons = store.lessons_in_module(module.id).await?;
        Ok(lessons.first().map(|l| l.id) == Some(lesson.id))
    }

    /// Completed share of a module's lessons. A module without lessons counts
    /// as fully completed.
    pub async fn completion_ratio(&self, user: UserId, module: &Module) -> Result<f64> {
        let store = &self.services.store;
        let lessons = store.lessons_in_module(module.id).await?;
        if lessons.is_empty() {
            return Ok(1.0);
        }
        let completed = store
            .progress_in_module(user, module.id)
            .await?
            .iter()
            .filter(|p| p.is_completed())
            .count();
        Ok(completed as f64 / lessons.len() as f64)
    }

    async fn prerequisite_met(&self, user: UserId, prior: &Module, min_score: f64) -> Result<bool> {
        let store = &self.services.store;
        let lessons = store.lessons_in_module(prior.id).await?;
        let progress = store.progress_in_module(user, prior.id).await?;
        Ok(lessons.iter().all(|lesson| {
            progress.iter().any(|p| {
                p.lesson_id == lesson.id && p.is_completed() && p.score + RATIO_EPSILON >= min_score
            })
        }))
    }
}
