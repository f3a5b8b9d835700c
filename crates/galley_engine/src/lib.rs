pub mod api;
pub mod compose;
pub mod config;
pub mod state;
pub mod styles;
pub mod watcher;

pub use api::{PreviewService, SseMessage, SseRegistry};
pub use compose::{STYLES_KEY, render_document};
pub use config::{CONFIG_FILE, Config, SourceFiles, load_config};
pub use state::RenderStateHandle;
pub use styles::{StyleMap, extract_styles};
pub use watcher::{FileWatcher, FileWatcherConfig, render_and_publish};
