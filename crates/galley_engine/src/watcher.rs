use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use galley_base::pal::{FileChangeEvent, FileChangeKind, PalHandle};
use galley_base::{FilePath, GalleyResult};

use crate::api::sse::{SseMessage, SseRegistry};
use crate::compose::render_document;
use crate::config::SourceFiles;
use crate::state::RenderStateHandle;

/// Configuration for the file watcher.
#[derive(Clone)]
pub struct FileWatcherConfig {
    pal: PalHandle,
    state: RenderStateHandle,
    registry: Arc<SseRegistry>,
    sources: SourceFiles,
    debounce_duration: Duration,
}

impl FileWatcherConfig {
    /// Create a new file watcher configuration.
    pub fn new(
        pal: PalHandle,
        state: RenderStateHandle,
        registry: Arc<SseRegistry>,
        sources: SourceFiles,
        debounce_duration: Duration,
    ) -> Self {
        Self {
            pal,
            state,
            registry,
            sources,
            debounce_duration,
        }
    }
}

/// Handle to a running file watcher.
///
/// The watcher monitors the data, template and style files and re-renders the
/// preview whenever one of them changes. The actual filesystem monitoring is
/// handled by the PAL.
pub struct FileWatcher;

impl FileWatcher {
    /// Start the file watcher with the given configuration.
    ///
    /// This registers a watch callback with the PAL for the source files.
    /// A change re-renders the document, stores it and broadcasts it to
    /// connected viewers. A failed render only logs, viewers keep seeing
    /// the last good document.
    pub fn start(config: FileWatcherConfig) -> GalleyResult<Self> {
        let debouncer = Arc::new(Mutex::new(Debouncer::new(config.debounce_duration)));

        let pal = config.pal.clone();
        let state = config.state.clone();
        let registry = config.registry.clone();
        let sources = config.sources.clone();

        let callback = Box::new(move |event: FileChangeEvent| match event.kind {
            FileChangeKind::Added => {
                // A source file appearing is worth noting, but content only
                // matters once it changes or the next render picks it up.
                for file in &event.files {
                    info!(file = %file, "Watched file appeared");
                }
            }
            FileChangeKind::Changed => {
                let mut should_render = false;
                {
                    let mut debouncer = debouncer.lock().unwrap();
                    for file in &event.files {
                        if debouncer.should_process(file) {
                            debug!(file = %file, "File changed");
                            should_render = true;
                        }
                    }
                }
                if should_render {
                    render_and_publish(&pal, &sources, &state, &registry);
                }
            }
        });

        config.pal.watch_files(&config.sources.watched(), callback)?;

        Ok(Self)
    }
}

/// Render the document and push the result to viewers.
///
/// On success the render state is updated and every connected viewer receives
/// the new document. On failure the error is logged and the previous document
/// stays in place, nothing is broadcast.
pub fn render_and_publish(
    pal: &PalHandle,
    sources: &SourceFiles,
    state: &RenderStateHandle,
    registry: &SseRegistry,
) {
    match render_document(pal, sources) {
        Ok(html) => {
            state.set(html.clone());
            registry.broadcast(SseMessage::Document { html });
            info!(output = %sources.output, "Preview updated");
        }
        Err(e) => {
            warn!(error = %e, "Render failed, keeping previous document");
        }
    }
}

/// Debouncer to handle rapid file change events.
///
/// Editors often save files multiple times in quick succession. The debouncer
/// filters out duplicate events within a time window.
struct Debouncer {
    last_events: HashMap<FilePath, Instant>,
    debounce_duration: Duration,
}

impl Debouncer {
    fn new(debounce_duration: Duration) -> Self {
        Self {
            last_events: HashMap::new(),
            debounce_duration,
        }
    }

    /// Check if an event should be processed, updating the last event time.
    ///
    /// Returns true if enough time has passed since the last event for this file.
    fn should_process(&mut self, file_path: &FilePath) -> bool {
        let now = Instant::now();

        if let Some(last_time) = self.last_events.get(file_path)
            && now.duration_since(*last_time) < self.debounce_duration
        {
            debug!(file = %file_path, "Debouncing file change event");
            return false;
        }

        self.last_events.insert(file_path.clone(), now);
        true
    }
}
