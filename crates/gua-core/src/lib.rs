//! Core of the coin oracle (金钱卦) bot: the hexagram image pool, the per-user
//! daily quota and the command handler that ties them together.
//!
//! ## Modules
//!
//! - [`settings`] – `~/.gua/settings.json` and environment overrides
//! - [`clock`] – timezone-aware "today" used for quota resets
//! - [`pool`] – image pool loading and uniform draws
//! - [`quota`] – per-user daily quota store
//! - [`images`] – resolving pool identifiers to image bytes
//! - [`reply`] – message segments returned to the host
//! - [`plugin`] – `GuaPlugin`, the command handler and its lifecycle

pub mod clock;
mod error;
pub mod images;
pub mod plugin;
pub mod pool;
pub mod quota;
pub mod reply;
pub mod settings;

pub use clock::{Clock, SystemClock, Timezone};
pub use error::GuaError;
pub use images::{FsImageStore, ImageData, ImageStore};
pub use plugin::{GuaPlugin, QuotaStatus, Requester};
pub use pool::ImagePool;
pub use quota::{QuotaPolicy, QuotaRecord, QuotaStore, Verdict};
pub use reply::{Outcome, Reply, Segment};
pub use settings::{read_settings, read_settings_from, write_settings, GuaSettings};
