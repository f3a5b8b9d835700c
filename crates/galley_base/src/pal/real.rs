use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, instrument, warn};

use crate::{GalleyError, GalleyResult, error::ErrorKind};

use super::FilePath;
use super::http::{
    HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle,
    HttpService, HttpStatusCode,
};
use super::traits::{FileChangeCallback, FileChangeEvent, FileChangeKind, Pal};

/// Concrete PAL implementation using the real filesystem via std::fs,
/// notify for file watching and tiny_http for serving.
///
/// All file paths are resolved relative to a configured base directory,
/// ensuring operations stay within intended boundaries.
pub struct RealPal {
    base_dir: PathBuf,
    // Dropping a notify watcher stops it, so they are kept alive here.
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl RealPal {
    /// Create a new RealPal with the given base directory.
    ///
    /// # Arguments
    /// * `base_dir` - All paths will be resolved relative to this directory
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Resolve a FilePath to an absolute filesystem path.
    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        self.base_dir.join(path.as_path())
    }
}

impl std::fmt::Debug for RealPal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealPal")
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path))]
    fn file_exists(&self, path: &FilePath) -> GalleyResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved.exists();
        debug!(exists, resolved = %resolved.display(), "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_file(&self, path: &FilePath) -> GalleyResult<Vec<u8>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "reading file");
        let contents = fs::read(&resolved).map_err(|e| {
            debug!(error = %e, "failed to read file");
            Box::new(GalleyError::new(ErrorKind::FileError {
                path: resolved,
                source: e,
            }))
        })?;
        debug!(bytes = contents.len(), "file read successfully");
        Ok(contents)
    }

    #[instrument(skip(self, contents), fields(path = %path))]
    fn write_file(&self, path: &FilePath, contents: &[u8]) -> GalleyResult<()> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), bytes = contents.len(), "writing file");
        fs::write(&resolved, contents).map_err(|e| {
            debug!(error = %e, "failed to write file");
            Box::new(GalleyError::new(ErrorKind::FileError {
                path: resolved,
                source: e,
            }))
        })?;
        debug!("file written successfully");
        Ok(())
    }

    #[instrument(skip(self, callback), fields(files = ?files))]
    fn watch_files(&self, files: &[FilePath], callback: FileChangeCallback) -> GalleyResult<()> {
        // Editors replace files on save, so watch the parent directories
        // and filter events down to the exact paths requested.
        let mut by_directory: HashMap<PathBuf, Vec<(PathBuf, FilePath)>> = HashMap::new();
        for file in files {
            let resolved = self.resolve_path(file);
            let parent = resolved
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| self.base_dir.clone());
            by_directory
                .entry(parent)
                .or_default()
                .push((resolved, file.clone()));
        }

        let callback: Arc<FileChangeCallback> = Arc::new(callback);
        let mut watchers = self.watchers.lock().unwrap();

        for (directory, entries) in by_directory {
            // Canonicalize so event paths can be matched by equality.
            let canonical_dir = fs::canonicalize(&directory).map_err(|e| {
                debug!(directory = %directory.display(), error = %e, "watch directory not accessible");
                Box::new(GalleyError::new(ErrorKind::FileError {
                    path: directory.clone(),
                    source: e,
                }))
            })?;

            let mut watched: HashMap<PathBuf, FilePath> = HashMap::new();
            for (resolved, file) in entries {
                let file_name = resolved
                    .file_name()
                    .ok_or_else(|| crate::err!("Invalid watch path: {}", file))?;
                watched.insert(canonical_dir.join(file_name), file);
            }

            debug!(directory = %canonical_dir.display(), count = watched.len(), "watching files");

            let cb = callback.clone();
            let mut watcher = notify::recommended_watcher(
                move |result: Result<Event, notify::Error>| {
                    let event = match result {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "File watcher error");
                            return;
                        }
                    };
                    let kind = match event.kind {
                        EventKind::Create(_) => FileChangeKind::Added,
                        EventKind::Modify(_) => FileChangeKind::Changed,
                        _ => return,
                    };
                    let files: Vec<FilePath> = event
                        .paths
                        .iter()
                        .filter_map(|p| watched.get(p).cloned())
                        .collect();
                    if files.is_empty() {
                        return;
                    }
                    cb(FileChangeEvent { kind, files });
                },
            )
            .map_err(|e| crate::err!("Failed to create file watcher: {}", e))?;

            watcher
                .watch(&canonical_dir, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    crate::err!("Failed to watch {}: {}", canonical_dir.display(), e)
                })?;

            watchers.push(watcher);
        }

        Ok(())
    }

    #[instrument(skip(self, service))]
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> GalleyResult<HttpServerHandle> {
        let address = config.address();
        debug!(address = %address, "starting HTTP server");
        let server = tiny_http::Server::http(&address)
            .map_err(|e| crate::err!("Failed to bind HTTP server on {}: {}", address, e))?;

        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(0);
        let handle = HttpServerHandle::new(port);
        let shutdown = handle.shutdown_flag().clone();
        let service: Arc<dyn HttpService> = Arc::from(service);

        std::thread::spawn(move || {
            loop {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                // Short timeout so the shutdown flag is polled regularly.
                match server.recv_timeout(Duration::from_millis(100)) {
                    Ok(Some(request)) => {
                        let service = service.clone();
                        std::thread::spawn(move || handle_connection(service, request));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "HTTP accept error");
                    }
                }
            }
            debug!("HTTP server stopped");
        });

        debug!(port, "HTTP server started");
        Ok(handle)
    }
}

/// Convert a tiny_http request, run it through the service and send the response.
///
/// Streaming bodies are sent without a known length, which makes tiny_http
/// use chunked transfer encoding and keep the connection open until the
/// body reader reports end of stream.
fn handle_connection(service: Arc<dyn HttpService>, request: tiny_http::Request) {
    let method = match HttpMethod::parse(request.method().as_str()) {
        Some(method) => method,
        None => {
            debug!(method = %request.method(), "Unsupported HTTP method");
            respond(request, HttpResponse::not_found());
            return;
        }
    };

    let mut http_request = HttpRequest::new(method, request.url());
    for header in request.headers() {
        http_request =
            http_request.with_header(header.field.as_str().as_str(), header.value.as_str());
    }

    let response = match service.handle_request(http_request) {
        Ok(response) => response,
        Err(error) => {
            warn!(error = %error, "Request handler failed");
            HttpResponse::text(format!("Error: {}", error))
                .with_status(HttpStatusCode::NetworkConnectTimeoutError)
        }
    };

    respond(request, response);
}

fn respond(request: tiny_http::Request, response: HttpResponse) {
    let connection = request
        .remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let status = tiny_http::StatusCode(response.status().as_u16());
    let mut headers = Vec::new();
    for (key, value) in response.headers().all() {
        if let Ok(header) = tiny_http::Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            headers.push(header);
        }
    }
    let data_length = match response.body() {
        HttpBody::Bytes(bytes) => Some(bytes.len()),
        HttpBody::Stream(_) => None,
    };
    let reader = response.into_body().into_reader();
    let tiny_response = tiny_http::Response::new(status, headers, reader, data_length, None);

    if let Err(e) = request.respond(tiny_response) {
        // Viewers come and go, a failed send only affects this connection.
        let error = GalleyError::new(ErrorKind::DeliveryError {
            connection,
            message: e.to_string(),
        });
        debug!(error = %error, "Failed to deliver response");
    }
}
