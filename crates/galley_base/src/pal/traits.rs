use std::sync::Arc;

use crate::GalleyResult;

use super::file_path::FilePath;
use super::http::{HttpServerConfig, HttpServerHandle, HttpService};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    /// An existing file's contents were modified.
    Changed,
    /// A file appeared at a watched path (created or moved into place).
    Added,
}

/// File change event delivered to watch callbacks.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub kind: FileChangeKind,
    /// Watched file paths affected by this event.
    pub files: Vec<FilePath>,
}

/// Callback invoked when watched files change.
pub type FileChangeCallback = Box<dyn Fn(FileChangeEvent) + Send + Sync>;

/// Platform Abstraction Layer (PAL) trait providing filesystem and server operations.
///
/// Implement this trait to provide custom platform behavior. Two implementations
/// are provided:
/// - `RealPal`: Uses the real filesystem via `std::fs` and real sockets
/// - `MockPal`: In-memory implementation for testing
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Check if a file exists at the given path.
    fn file_exists(&self, path: &FilePath) -> GalleyResult<bool>;

    /// Read entire file contents as bytes.
    fn read_file(&self, path: &FilePath) -> GalleyResult<Vec<u8>>;

    /// Read entire file contents as a UTF-8 string.
    ///
    /// This is a convenience method with a default implementation. It reads the file,
    /// validates UTF-8, and returns the string or an error.
    fn read_file_to_string(&self, path: &FilePath) -> GalleyResult<String> {
        let contents = self.read_file(path)?;
        String::from_utf8(contents).map_err(|_e| crate::err!("File is not valid UTF-8: {}", path))
    }

    /// Write the given bytes to a file, replacing any previous contents.
    fn write_file(&self, path: &FilePath, contents: &[u8]) -> GalleyResult<()>;

    /// Watch a set of files for changes.
    ///
    /// # Arguments
    /// * `files` - Exact file paths to watch
    /// * `callback` - Function called when any of the files change
    ///
    /// Returns immediately; the callback will be invoked asynchronously when changes occur.
    /// Events for paths outside `files` are never delivered.
    fn watch_files(&self, files: &[FilePath], callback: FileChangeCallback) -> GalleyResult<()>;

    /// Start an HTTP server with the given service.
    ///
    /// # Arguments
    /// * `service` - The HTTP service that will handle incoming requests
    /// * `config` - Server configuration (host, port, etc.)
    ///
    /// Returns a handle to the running server. The server will start immediately
    /// and listen for connections. When the handle is dropped (or shutdown() is called),
    /// the server will stop accepting new connections and shut down gracefully.
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> GalleyResult<HttpServerHandle>;
}

/// Handle to a PAL implementation, enabling shared ownership.
///
/// Internally wraps `Arc<dyn Pal>` for cheap cloning and thread-safe sharing.
/// Can be cloned and passed around freely without lifetime concerns.
///
/// # Examples
///
/// ```no_run
/// use galley_base::pal::{PalHandle, RealPal};
///
/// let pal = PalHandle::new(RealPal::new(".".into()));
/// let pal_clone = pal.clone(); // Cheap clone, shares the same implementation
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    /// Create a new PalHandle from a Pal implementation.
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
