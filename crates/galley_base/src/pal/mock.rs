use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::GalleyError;
use crate::GalleyResult;
use crate::error::ErrorKind;

use super::FilePath;
use super::http::{HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService};
use super::traits::{FileChangeCallback, FileChangeEvent, FileChangeKind, Pal};

/// In-memory PAL implementation for testing.
///
/// Stores file contents in a HashMap and supports all Pal operations without
/// touching the real filesystem. File change events are delivered on demand
/// via [`MockPal::trigger_change`] and [`MockPal::trigger_add`], so tests can
/// drive the watch pipeline deterministically.
///
/// # Examples
///
/// ```
/// use galley_base::pal::{FilePath, MockPal, Pal};
///
/// let mock = MockPal::new();
/// mock.add_file(FilePath::from("data.yml"), b"title: Hello".to_vec());
/// let content = mock.read_file_to_string(&FilePath::from("data.yml")).unwrap();
/// assert_eq!(content, "title: Hello");
/// ```
#[derive(Clone)]
pub struct MockPal {
    files: Arc<Mutex<HashMap<FilePath, Vec<u8>>>>,
    watches: Arc<Mutex<Vec<WatchRegistration>>>,
    http_servers: Arc<Mutex<HashMap<u16, HttpServerInfo>>>,
    next_port: Arc<AtomicU16>,
}

/// A registered watch: the watched paths and the callback to invoke.
struct WatchRegistration {
    files: HashSet<FilePath>,
    callback: Arc<FileChangeCallback>,
}

/// Information about a registered HTTP server.
#[derive(Debug)]
struct HttpServerInfo {
    service: Box<dyn HttpService>,
    _config: HttpServerConfig,
}

impl MockPal {
    /// Create a new empty MockPal.
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            watches: Arc::new(Mutex::new(Vec::new())),
            http_servers: Arc::new(Mutex::new(HashMap::new())),
            next_port: Arc::new(AtomicU16::new(10000)),
        }
    }

    /// Add a file to the mock storage.
    pub fn add_file(&self, path: FilePath, content: Vec<u8>) {
        self.files.lock().unwrap().insert(path, content);
    }

    /// Deliver a change event to every watch registered for the given path.
    pub fn trigger_change(&self, path: &FilePath) {
        self.trigger(path, FileChangeKind::Changed);
    }

    /// Deliver an add event to every watch registered for the given path.
    pub fn trigger_add(&self, path: &FilePath) {
        self.trigger(path, FileChangeKind::Added);
    }

    fn trigger(&self, path: &FilePath, kind: FileChangeKind) {
        let callbacks: Vec<Arc<FileChangeCallback>> = {
            let watches = self.watches.lock().unwrap();
            watches
                .iter()
                .filter(|w| w.files.contains(path))
                .map(|w| w.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback(FileChangeEvent {
                kind,
                files: vec![path.clone()],
            });
        }
    }

    /// Get the number of registered watches.
    pub fn watch_count(&self) -> usize {
        self.watches.lock().unwrap().len()
    }

    /// Simulate an HTTP request to a running server.
    ///
    /// This method is used for testing HTTP services without making real network calls.
    /// It looks up the registered service for the given port and invokes it.
    ///
    /// # Arguments
    /// * `port` - The port the server is (mock) listening on
    /// * `request` - The HTTP request to simulate
    ///
    /// # Returns
    /// The HTTP response from the service, or an error if no server is registered.
    pub fn simulate_request(&self, port: u16, request: HttpRequest) -> GalleyResult<HttpResponse> {
        let servers = self.http_servers.lock().unwrap();
        let server_info = servers.get(&port).ok_or_else(|| {
            Box::new(GalleyError::message(format!(
                "No HTTP server registered on port {}",
                port
            )))
        })?;

        server_info.service.handle_request(request)
    }

    /// Get the number of registered HTTP servers.
    pub fn http_server_count(&self) -> usize {
        self.http_servers.lock().unwrap().len()
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockPal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPal")
            .field("files", &self.files.lock().unwrap().len())
            .field("watches", &self.watches.lock().unwrap().len())
            .field("http_servers", &self.http_servers.lock().unwrap().len())
            .finish()
    }
}

impl Pal for MockPal {
    fn file_exists(&self, path: &FilePath) -> GalleyResult<bool> {
        let files = self.files.lock().unwrap();
        Ok(files.contains_key(path))
    }

    fn read_file(&self, path: &FilePath) -> GalleyResult<Vec<u8>> {
        let files = self.files.lock().unwrap();
        let content = files
            .get(path)
            .ok_or_else(|| {
                Box::new(GalleyError::new(ErrorKind::FileError {
                    path: path.as_path().to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("File not found: {}", path),
                    ),
                }))
            })?
            .clone();
        Ok(content)
    }

    fn write_file(&self, path: &FilePath, contents: &[u8]) -> GalleyResult<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), contents.to_vec());
        Ok(())
    }

    fn watch_files(&self, files: &[FilePath], callback: FileChangeCallback) -> GalleyResult<()> {
        if files.is_empty() {
            return Err(Box::new(GalleyError::message(
                "watch_files requires at least one file",
            )));
        }
        self.watches.lock().unwrap().push(WatchRegistration {
            files: files.iter().cloned().collect(),
            callback: Arc::new(callback),
        });
        Ok(())
    }

    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> GalleyResult<HttpServerHandle> {
        // Assign a port - use config port if provided, otherwise auto-assign
        let port = match config.port {
            Some(p) => p,
            None => self.next_port.fetch_add(1, Ordering::SeqCst),
        };

        // Store the server info
        let server_info = HttpServerInfo {
            service,
            _config: config,
        };
        {
            let mut servers = self.http_servers.lock().unwrap();
            servers.insert(port, server_info);
        }

        // Create and return the handle
        Ok(HttpServerHandle::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_exists_true() {
        let pal = MockPal::new();
        pal.add_file(FilePath::from("data.yml"), b"title: test".to_vec());

        assert!(pal.file_exists(&FilePath::from("data.yml")).unwrap());
    }

    #[test]
    fn test_file_exists_false() {
        let pal = MockPal::new();

        assert!(!pal.file_exists(&FilePath::from("data.yml")).unwrap());
    }

    #[test]
    fn test_read_file() {
        let pal = MockPal::new();
        let content = b"h1 { color: red; }".to_vec();
        pal.add_file(FilePath::from("style.css"), content.clone());

        let result = pal.read_file_to_string(&FilePath::from("style.css")).unwrap();
        assert_eq!(result, String::from_utf8(content).unwrap());
    }

    #[test]
    fn test_read_file_not_found() {
        let pal = MockPal::new();

        let result = pal.read_file(&FilePath::from("nonexistent.yml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_write_file() {
        let pal = MockPal::new();

        pal.write_file(&FilePath::from("dist.html"), b"<h1>Hi</h1>")
            .unwrap();

        let content = pal.read_file_to_string(&FilePath::from("dist.html")).unwrap();
        assert_eq!(content, "<h1>Hi</h1>");
    }

    #[test]
    fn test_write_file_replaces_previous_contents() {
        let pal = MockPal::new();

        pal.write_file(&FilePath::from("dist.html"), b"first")
            .unwrap();
        pal.write_file(&FilePath::from("dist.html"), b"second")
            .unwrap();

        let content = pal.read_file_to_string(&FilePath::from("dist.html")).unwrap();
        assert_eq!(content, "second");
    }

    #[test]
    fn test_watch_files_registers() {
        let pal = MockPal::new();
        let callback: FileChangeCallback = Box::new(|_event| {});

        pal.watch_files(&[FilePath::from("data.yml")], callback)
            .unwrap();
        assert_eq!(pal.watch_count(), 1);
    }

    #[test]
    fn test_watch_files_rejects_empty_list() {
        let pal = MockPal::new();
        let callback: FileChangeCallback = Box::new(|_event| {});

        let result = pal.watch_files(&[], callback);
        assert!(result.is_err());
    }

    #[test]
    fn test_trigger_change_invokes_callback() {
        let pal = MockPal::new();
        let events: Arc<Mutex<Vec<FileChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let callback: FileChangeCallback = Box::new(move |event| {
            events_clone.lock().unwrap().push(event);
        });

        pal.watch_files(
            &[FilePath::from("data.yml"), FilePath::from("style.css")],
            callback,
        )
        .unwrap();

        pal.trigger_change(&FilePath::from("style.css"));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FileChangeKind::Changed);
        assert_eq!(events[0].files, vec![FilePath::from("style.css")]);
    }

    #[test]
    fn test_trigger_change_ignores_unwatched_path() {
        let pal = MockPal::new();
        let events: Arc<Mutex<Vec<FileChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let callback: FileChangeCallback = Box::new(move |event| {
            events_clone.lock().unwrap().push(event);
        });

        pal.watch_files(&[FilePath::from("data.yml")], callback)
            .unwrap();

        pal.trigger_change(&FilePath::from("unrelated.txt"));

        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_trigger_add_reports_added_kind() {
        let pal = MockPal::new();
        let events: Arc<Mutex<Vec<FileChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let callback: FileChangeCallback = Box::new(move |event| {
            events_clone.lock().unwrap().push(event);
        });

        pal.watch_files(&[FilePath::from("template.liquid")], callback)
            .unwrap();

        pal.trigger_add(&FilePath::from("template.liquid"));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FileChangeKind::Added);
    }

    #[test]
    fn test_multiple_files() {
        let pal = MockPal::new();
        for i in 0..5 {
            pal.add_file(
                FilePath::from(format!("file{}.txt", i)),
                format!("content {}", i).into_bytes(),
            );
        }

        for i in 0..5 {
            let path = FilePath::from(format!("file{}.txt", i));
            let content = pal.read_file_to_string(&path).unwrap();
            assert_eq!(content, format!("content {}", i));
        }
    }

    // HTTP Server Tests
    use super::super::http::HttpMethod;

    #[derive(Debug)]
    struct TestHttpService;

    impl HttpService for TestHttpService {
        fn handle_request(&self, request: HttpRequest) -> crate::GalleyResult<HttpResponse> {
            match request.path() {
                "/" => Ok(HttpResponse::html("<h1>doc</h1>")),
                _ => Ok(HttpResponse::not_found()),
            }
        }
    }

    #[test]
    fn test_start_http_server() {
        let pal = MockPal::new();
        let service = Box::new(TestHttpService);
        let config = HttpServerConfig::new("127.0.0.1");

        let handle = pal.start_http_server(service, config).unwrap();
        assert!(handle.port() >= 10000); // Auto-assigned port
        assert_eq!(pal.http_server_count(), 1);
    }

    #[test]
    fn test_start_http_server_with_specific_port() {
        let pal = MockPal::new();
        let service = Box::new(TestHttpService);
        let config = HttpServerConfig::new("127.0.0.1").with_port(3000);

        let handle = pal.start_http_server(service, config).unwrap();
        assert_eq!(handle.port(), 3000);
        assert_eq!(pal.http_server_count(), 1);
    }

    #[test]
    fn test_simulate_request_success() {
        let pal = MockPal::new();
        let service = Box::new(TestHttpService);
        let config = HttpServerConfig::new("127.0.0.1").with_port(3000);

        pal.start_http_server(service, config).unwrap();

        let request = HttpRequest::new(HttpMethod::Get, "/");
        let response = pal.simulate_request(3000, request).unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert!(response.body().as_string().unwrap().contains("doc"));
    }

    #[test]
    fn test_simulate_request_not_found() {
        let pal = MockPal::new();
        let service = Box::new(TestHttpService);
        let config = HttpServerConfig::new("127.0.0.1").with_port(3000);

        pal.start_http_server(service, config).unwrap();

        let request = HttpRequest::new(HttpMethod::Get, "/unknown");
        let response = pal.simulate_request(3000, request).unwrap();

        assert_eq!(response.status().as_u16(), 404);
    }

    #[test]
    fn test_simulate_request_invalid_port() {
        let pal = MockPal::new();
        let request = HttpRequest::new(HttpMethod::Get, "/");

        let result = pal.simulate_request(9999, request);
        assert!(result.is_err());
    }
}
