use std::sync::Arc;

use galley_base::GalleyResult;
use galley_base::pal::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpService};
use galley_base::pal::{FilePath, PalHandle};
use tracing::debug;

use crate::api::sse::{SseMessage, SseRegistry, SseStream};
use crate::config::Config;
use crate::state::RenderStateHandle;

/// Page shell delivered on `GET /`.
///
/// The current document is embedded so the first paint needs no round trip,
/// after that the inline script swaps the article contents on every SSE
/// update without reloading the page.
const PAGE_SHELL: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/vendor/github-markdown.min.css">
<style>
.markdown-body {
    box-sizing: border-box;
    min-width: 200px;
    max-width: 980px;
    margin: 0 auto;
    padding: 45px;
}
@media (max-width: 767px) {
    .markdown-body {
        padding: 15px;
    }
}
</style>
</head>
<body>
<article class="markdown-body" id="content">{document}</article>
<script>
const source = new EventSource("/updates");
source.onmessage = (event) => {
    const data = JSON.parse(event.data);
    document.getElementById("content").innerHTML = data.html;
};
</script>
</body>
</html>
"#;

/// HTTP service for the live preview.
///
/// Routes:
/// - `GET /` - Page shell with the current document embedded
/// - `GET /updates` - SSE stream pushing document updates
/// - `GET /vendor/{file}` - Static assets from the configured vendor directory
/// - Everything else - HTTP 404
#[derive(Clone)]
pub struct PreviewService {
    pal: PalHandle,
    state: RenderStateHandle,
    registry: Arc<SseRegistry>,
    title: String,
    vendor_dir: String,
}

impl PreviewService {
    /// Create a new PreviewService serving the given render state.
    pub fn new(
        pal: PalHandle,
        state: RenderStateHandle,
        registry: Arc<SseRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            pal,
            state,
            registry,
            title: config.title.clone(),
            vendor_dir: config.vendor_dir.clone(),
        }
    }

    /// Handle `GET /`.
    fn handle_page_request(&self) -> HttpResponse {
        let document = self.state.get();
        let page = PAGE_SHELL
            .replace("{title}", &self.title)
            .replace("{document}", &document);
        HttpResponse::html(page)
    }

    /// Handle `GET /updates`.
    ///
    /// Registers the viewer and hands the message stream to the server as a
    /// chunked response body. The current document is always the first frame,
    /// so a browser that reconnects immediately shows the latest state.
    fn handle_updates_request(&self) -> HttpResponse {
        let initial = SseMessage::Document {
            html: self.state.get(),
        };
        let (client_id, receiver) = self.registry.register(initial);
        debug!(client_id = %client_id, "Viewer connected to update stream");

        HttpResponse::ok()
            .with_content_type("text/event-stream")
            .with_header("Cache-Control", "no-cache")
            .with_body(HttpBody::from_reader(SseStream::new(receiver)))
    }

    /// Handle `GET /vendor/{file}`.
    fn handle_vendor_request(&self, file: &str) -> GalleyResult<HttpResponse> {
        if !is_safe_asset_path(file) {
            debug!(file = file, "Rejected vendor asset path");
            return Ok(HttpResponse::not_found());
        }

        let path = FilePath::from(format!("{}/{}", self.vendor_dir, file));
        if !self.pal.file_exists(&path)? {
            debug!(path = %path, "Vendor asset not found");
            return Ok(HttpResponse::not_found());
        }

        let content = self.pal.read_file(&path)?;
        Ok(HttpResponse::ok()
            .with_content_type(guess_content_type(file))
            .with_body(HttpBody::from_bytes(content)))
    }
}

impl std::fmt::Debug for PreviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewService")
            .field("title", &self.title)
            .field("vendor_dir", &self.vendor_dir)
            .finish()
    }
}

impl HttpService for PreviewService {
    fn handle_request(&self, request: HttpRequest) -> GalleyResult<HttpResponse> {
        if request.method() != &HttpMethod::Get {
            return Ok(HttpResponse::not_found());
        }

        // Remove query parameters from path
        let path = request.path().split('?').next().unwrap_or(request.path());

        if path == "/" {
            Ok(self.handle_page_request())
        } else if path == "/updates" {
            Ok(self.handle_updates_request())
        } else if let Some(file) = path.strip_prefix("/vendor/") {
            self.handle_vendor_request(file)
        } else {
            debug!(path = path, "No route matched");
            Ok(HttpResponse::not_found())
        }
    }
}

/// Reject anything that could escape the vendor directory.
fn is_safe_asset_path(file: &str) -> bool {
    !file.is_empty()
        && !file.starts_with('/')
        && !file.contains('\\')
        && file
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

/// Guess the MIME type based on file extension.
fn guess_content_type(path: &str) -> &'static str {
    let path_lower = path.to_lowercase();
    if path_lower.ends_with(".html") {
        "text/html"
    } else if path_lower.ends_with(".css") {
        "text/css"
    } else if path_lower.ends_with(".js") {
        "application/javascript"
    } else if path_lower.ends_with(".json") {
        "application/json"
    } else if path_lower.ends_with(".png") {
        "image/png"
    } else if path_lower.ends_with(".jpg") || path_lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if path_lower.ends_with(".gif") {
        "image/gif"
    } else if path_lower.ends_with(".svg") {
        "image/svg+xml"
    } else if path_lower.ends_with(".ico") {
        "image/x-icon"
    } else if path_lower.ends_with(".woff") {
        "font/woff"
    } else if path_lower.ends_with(".woff2") {
        "font/woff2"
    } else if path_lower.ends_with(".ttf") {
        "font/ttf"
    } else {
        "application/octet-stream"
    }
}
