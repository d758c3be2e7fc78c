//! Hierarchical concurrency throttle for provider API requests.
//!
//! Three counting-semaphore levels: global over everything, per provider,
//! per model. Acquisition order is fixed (global, then provider, then model)
//! so concurrent callers cannot deadlock in a circular wait; the guard
//! releases in reverse order on every exit path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Concurrency limits per throttle level. All limits must be positive;
/// zeroes are lifted to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleProfile {
    pub global_limit: usize,
    pub provider_limit: usize,
    pub model_limit: usize,
}

impl Default for ThrottleProfile {
    fn default() -> Self {
        Self {
            global_limit: 50,
            provider_limit: 10,
            model_limit: 3,
        }
    }
}

impl ThrottleProfile {
    fn normalized(self) -> Self {
        Self {
            global_limit: self.global_limit.max(1),
            provider_limit: self.provider_limit.max(1),
            model_limit: self.model_limit.max(1),
        }
    }
}

/// Availability snapshot for one semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStats {
    pub limit: usize,
    pub available: usize,
}

/// Current throttle availability, for observability.
#[derive(Debug, Clone)]
pub struct ThrottleStats {
    pub global: LevelStats,
    pub providers: HashMap<String, LevelStats>,
    pub models: HashMap<String, LevelStats>,
}

/// Scoped acquisition across all three levels.
///
/// Field order matters: permits drop model-first, provider, then global.
pub struct ThrottleGuard {
    _model: OwnedSemaphorePermit,
    _provider: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Manages concurrency limits for provider API requests.
pub struct ThrottleManager {
    profile: ThrottleProfile,
    global: RwLock<Arc<Semaphore>>,
    providers: Mutex<HashMap<String, Arc<Semaphore>>>,
    models: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ThrottleManager {
    fn default() -> Self {
        Self::new(ThrottleProfile::default())
    }
}

impl ThrottleManager {
    pub fn new(profile: ThrottleProfile) -> Self {
        let profile = profile.normalized();
        Self {
            profile,
            global: RwLock::new(Arc::new(Semaphore::new(profile.global_limit))),
            providers: Mutex::new(HashMap::new()),
            models: Mutex::new(HashMap::new()),
        }
    }

    pub fn profile(&self) -> ThrottleProfile {
        self.profile
    }

    /// Semaphore for a provider key, created on first use. The map lock is
    /// short and never held across an await.
    fn provider_semaphore(&self, provider_key: &str) -> Arc<Semaphore> {
        let mut providers = self.providers.lock();
        providers
            .entry(provider_key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.profile.provider_limit)))
            .clone()
    }

    fn model_semaphore(&self, model_key: &str) -> Arc<Semaphore> {
        let mut models = self.models.lock();
        models
            .entry(model_key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.profile.model_limit)))
            .clone()
    }

    /// Acquire all three permits for one request, global -> provider -> model.
    ///
    /// The returned guard releases them in reverse order when dropped,
    /// including on failure or cancellation of the holder.
    pub async fn acquire(
        &self,
        provider_key: &str,
        model_key: &str,
    ) -> Result<ThrottleGuard, AcquireError> {
        let global_sem = self.global.read().clone();
        let provider_sem = self.provider_semaphore(provider_key);
        let model_sem = self.model_semaphore(model_key);

        let global = global_sem.acquire_owned().await?;
        let provider = provider_sem.acquire_owned().await?;
        let model = model_sem.acquire_owned().await?;

        Ok(ThrottleGuard {
            _model: model,
            _provider: provider,
            _global: global,
        })
    }

    /// Current availability per level.
    pub fn stats(&self) -> ThrottleStats {
        let global = self.global.read();
        ThrottleStats {
            global: LevelStats {
                limit: self.profile.global_limit,
                available: global.available_permits(),
            },
            providers: self
                .providers
                .lock()
                .iter()
                .map(|(key, sem)| {
                    (
                        key.clone(),
                        LevelStats {
                            limit: self.profile.provider_limit,
                            available: sem.available_permits(),
                        },
                    )
                })
                .collect(),
            models: self
                .models
                .lock()
                .iter()
                .map(|(key, sem)| {
                    (
                        key.clone(),
                        LevelStats {
                            limit: self.profile.model_limit,
                            available: sem.available_permits(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Replace every semaphore with a fresh one.
    ///
    /// Only safe while no acquisition is outstanding: existing guards keep
    /// their permits on the old semaphores.
    pub fn reset(&self) {
        *self.global.write() = Arc::new(Semaphore::new(self.profile.global_limit));
        self.providers.lock().clear();
        self.models.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_model_limit_caps_concurrency() {
        let manager = Arc::new(ThrottleManager::new(ThrottleProfile {
            global_limit: 2,
            provider_limit: 1,
            model_limit: 1,
        }));

        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let manager = manager.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = manager.acquire("openai", "gpt-4").await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        // All three completed, but never more than one at a time
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(inside.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let manager = ThrottleManager::new(ThrottleProfile {
            global_limit: 5,
            provider_limit: 2,
            model_limit: 1,
        });

        {
            let _guard = manager.acquire("openai", "gpt-4").await.unwrap();
            let stats = manager.stats();
            assert_eq!(stats.global.available, 4);
            assert_eq!(stats.providers["openai"].available, 1);
            assert_eq!(stats.models["gpt-4"].available, 0);
        }

        let stats = manager.stats();
        assert_eq!(stats.global.available, 5);
        assert_eq!(stats.providers["openai"].available, 2);
        assert_eq!(stats.models["gpt-4"].available, 1);
    }

    #[tokio::test]
    async fn test_independent_models_share_provider_bucket() {
        let manager = ThrottleManager::new(ThrottleProfile {
            global_limit: 10,
            provider_limit: 2,
            model_limit: 1,
        });

        let _a = manager.acquire("openai", "gpt-4").await.unwrap();
        let _b = manager.acquire("openai", "gpt-4o").await.unwrap();

        let stats = manager.stats();
        assert_eq!(stats.providers["openai"].available, 0);
        assert_eq!(stats.models.len(), 2);
    }

    #[tokio::test]
    async fn test_buckets_created_lazily() {
        let manager = ThrottleManager::default();
        assert!(manager.stats().providers.is_empty());

        let _guard = manager.acquire("anthropic", "claude").await.unwrap();
        let stats = manager.stats();
        assert_eq!(stats.providers.len(), 1);
        assert_eq!(stats.models.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_replaces_semaphores() {
        let manager = ThrottleManager::default();
        {
            let _guard = manager.acquire("openai", "gpt-4").await.unwrap();
        }
        manager.reset();

        let stats = manager.stats();
        assert!(stats.providers.is_empty());
        assert!(stats.models.is_empty());
        assert_eq!(stats.global.available, 50);
    }

    #[test]
    fn test_zero_limits_are_lifted() {
        let manager = ThrottleManager::new(ThrottleProfile {
            global_limit: 0,
            provider_limit: 0,
            model_limit: 0,
        });
        assert_eq!(manager.profile().global_limit, 1);
        assert_eq!(manager.profile().model_limit, 1);
    }
}
