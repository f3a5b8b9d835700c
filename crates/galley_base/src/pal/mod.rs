//! Platform Abstraction Layer (PAL).
//!
//! Code depends on the [`Pal`] trait rather than on std::fs, notify or
//! tiny_http directly. `RealPal` talks to the real platform, `MockPal` keeps
//! everything in memory so the render and watch pipelines can be unit tested.

mod file_path;
pub mod http;
pub mod mock;
pub mod real;
mod traits;

pub use file_path::FilePath;
pub use mock::MockPal;
pub use real::RealPal;
pub use traits::{FileChangeCallback, FileChangeEvent, FileChangeKind, Pal, PalHandle};
