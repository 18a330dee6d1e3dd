use std::sync::{Arc, RwLock, RwLockReadGuard};

use rand::Rng;

use crate::{
    pool, Clock, FsImageStore, GuaError, GuaSettings, ImagePool, ImageStore, QuotaPolicy, Reply,
    Segment, SystemClock, Verdict,
};

/// Who issued the command, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl Requester {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    fn mention(&self) -> Segment {
        Segment::Mention {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Read-only view of a user's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    /// `None` when draws are unlimited
    pub daily_limit: Option<u32>,
    pub remaining: Option<u32>,
}

/// Process-wide state for the coin oracle command: the image pool, the quota
/// store and the collaborators used to render a draw.
///
/// Built by [`GuaPlugin::initialize`], shared behind an `Arc` while serving,
/// and emptied by [`GuaPlugin::terminate`].
pub struct GuaPlugin {
    settings: GuaSettings,
    pool: RwLock<ImagePool>,
    quota: QuotaPolicy,
    images: Arc<dyn ImageStore>,
    clock: Arc<dyn Clock>,
}

impl GuaPlugin {
    /// Load the image pool from disk and start with an empty quota store.
    pub fn initialize(settings: GuaSettings) -> Self {
        let pool = pool::load(
            &settings.image_dir,
            &settings.file_prefix,
            &settings.file_extension,
            settings.expected_total,
        );
        let images = Arc::new(FsImageStore::new(&settings.image_dir));
        let clock = Arc::new(SystemClock {
            timezone: settings.timezone,
        });
        Self::with_parts(settings, pool, images, clock)
    }

    pub fn with_parts(
        settings: GuaSettings,
        pool: ImagePool,
        images: Arc<dyn ImageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quota = QuotaPolicy::from_limit(settings.daily_limit);
        Self {
            settings,
            pool: RwLock::new(pool),
            quota,
            images,
            clock,
        }
    }

    pub fn settings(&self) -> &GuaSettings {
        &self.settings
    }

    pub fn pool_size(&self) -> usize {
        self.read_pool().len()
    }

    pub fn handle_command(&self, requester: &Requester) -> Reply {
        self.handle_command_with(requester, &mut rand::thread_rng())
    }

    /// Handle one draw request. Never fails: every error becomes a fixed reply.
    ///
    /// No quota is consumed when the pool is empty. A consumed use is not
    /// refunded when rendering fails afterwards.
    pub fn handle_command_with<R: Rng + ?Sized>(
        &self,
        requester: &Requester,
        rng: &mut R,
    ) -> Reply {
        let pool = self.read_pool();
        if pool.is_empty() {
            tracing::warn!(
                user = %requester.user_id,
                "Draw requested but no hexagram images are loaded"
            );
            return Reply::pool_unavailable();
        }

        let quota = match &self.quota {
            QuotaPolicy::Unlimited => None,
            QuotaPolicy::Daily(store) => {
                match store.check_and_consume(&requester.user_id, self.clock.today()) {
                    Verdict::Allowed { remaining } => {
                        Some((remaining, store.draw_number(remaining)))
                    }
                    Verdict::Denied => {
                        tracing::info!(user = %requester.user_id, "Daily draw limit reached");
                        return Reply::quota_exhausted(requester.mention(), store.daily_limit());
                    }
                }
            }
        };

        let Some(id) = pool.draw(rng) else {
            return Reply::pool_unavailable();
        };

        match self.images.resolve(id) {
            Ok(image) => {
                tracing::info!(
                    user = %requester.user_id,
                    image = %id,
                    "User {} drew hexagram {}",
                    requester.user_id,
                    id
                );
                Reply::drawn(image, quota)
            }
            Err(GuaError::ImageNotFound(missing)) => {
                tracing::error!(
                    user = %requester.user_id,
                    "Hexagram image {} does not exist",
                    missing
                );
                Reply::render_failed()
            }
            Err(e) => {
                tracing::error!(user = %requester.user_id, image = %id, "Unexpected error: {}", e);
                Reply::failed()
            }
        }
    }

    pub fn quota_status(&self, user_id: &str) -> QuotaStatus {
        match &self.quota {
            QuotaPolicy::Unlimited => QuotaStatus {
                daily_limit: None,
                remaining: None,
            },
            QuotaPolicy::Daily(store) => QuotaStatus {
                daily_limit: Some(store.daily_limit()),
                remaining: Some(store.remaining(user_id, self.clock.today())),
            },
        }
    }

    /// Release the pool and all quota records.
    pub fn terminate(&self) {
        self.pool
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        if let QuotaPolicy::Daily(store) = &self.quota {
            store.clear();
        }
        tracing::info!("Coin oracle plugin unloaded");
    }

    fn read_pool(&self) -> RwLockReadGuard<'_, ImagePool> {
        self.pool
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
