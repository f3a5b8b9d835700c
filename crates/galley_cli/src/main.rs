use std::env;
use std::process;
use std::thread;
use std::time::Duration;

use galley_base::pal::http::HttpServerConfig;
use galley_base::tracing::init_tracing;
use galley_base::{FilePath, PalHandle, RealPal};
use galley_engine::{
    CONFIG_FILE, FileWatcher, FileWatcherConfig, PreviewService, RenderStateHandle, SseRegistry,
    load_config, render_and_publish,
};

fn main() {
    init_tracing().unwrap();

    let current_dir = env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error: Failed to get current directory: {}", e);
        process::exit(1);
    });

    let pal = PalHandle::new(RealPal::new(current_dir));

    let config_path = FilePath::from(CONFIG_FILE);
    let config = match load_config(&pal, &config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config from {}: {}", CONFIG_FILE, e);
            process::exit(1);
        }
    };

    println!("Previewing: {}", config.title);

    let sources = config.source_files();
    let state = RenderStateHandle::new();
    let registry = SseRegistry::new();
    registry.clone().start_keepalive_thread();

    let service = PreviewService::new(pal.clone(), state.clone(), registry.clone(), &config);
    let server_config = HttpServerConfig::new("127.0.0.1").with_port(config.port);
    let server = match pal.start_http_server(Box::new(service), server_config) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: Failed to start server on port {}: {}", config.port, e);
            process::exit(1);
        }
    };
    println!("Preview running at http://localhost:{}/", server.port());
    println!("Press Ctrl+C to stop");

    let watcher_config = FileWatcherConfig::new(
        pal.clone(),
        state.clone(),
        registry.clone(),
        sources.clone(),
        Duration::from_millis(config.debounce_ms),
    );
    if let Err(e) = FileWatcher::start(watcher_config) {
        eprintln!("Error: Failed to watch source files: {}", e);
        process::exit(1);
    }
    tracing::info!(
        data = %sources.data,
        template = %sources.template,
        style = %sources.style,
        "Watching source files"
    );

    // First render, the page stays empty until a source file changes if this fails
    render_and_publish(&pal, &sources, &state, &registry);

    loop {
        thread::park();
    }
}
