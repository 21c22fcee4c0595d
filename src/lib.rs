//! Skin and cape resolution for the Kaizen launcher.
//!
//! A [`skins::SkinSource`] describes where a player's textures come from;
//! [`skins::SkinResolver`] turns it into decoded textures on a bounded
//! [`task::TaskExecutor`], downloading through [`fetch::Fetcher`] with
//! mirror fallback, retries and ETag revalidation.

pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod skins;
pub mod state;
pub mod task;
pub mod utils;

pub use config::{LoaderConfig, LoggingConfig};
pub use error::{AppError, AppResult};
pub use fetch::{CachePolicy, CacheRepository, FetchRequest, Fetcher};
pub use skins::{LoadedSkin, SkinResolver, SkinSource, SkinSourceKind, TextureModel};
pub use state::AppState;
pub use task::{all_of, CancelToken, Task, TaskExecutor};
