pub mod error;
pub mod pal;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, GalleyError, GalleyResult, ResultExt};
pub use pal::{FilePath, PalHandle, RealPal};
