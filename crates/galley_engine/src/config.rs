use galley_base::pal::{FilePath, PalHandle};
use galley_base::{GalleyError, GalleyResult};
use serde::Deserialize;
use tracing::debug;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "galley.toml";

/// Configuration for a galley preview session.
///
/// Every field has a default, so running without a `galley.toml` works out
/// of the box with the conventional file names.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Title shown in the preview page.
    #[serde(default = "default_title")]
    pub title: String,
    /// Port the preview server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// YAML file providing the template data.
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Liquid template producing the document.
    #[serde(default = "default_template_file")]
    pub template_file: String,
    /// Stylesheet merged into the template data.
    #[serde(default = "default_style_file")]
    pub style_file: String,
    /// File the rendered document is written to.
    #[serde(default = "default_output_file")]
    pub output_file: String,
    /// Directory with static assets served under /vendor/.
    #[serde(default = "default_vendor_dir")]
    pub vendor_dir: String,
    /// Quiet period for coalescing rapid file change events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_title() -> String {
    "Preview".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_file() -> String {
    "data.yml".to_string()
}

fn default_template_file() -> String {
    "template.liquid".to_string()
}

fn default_style_file() -> String {
    "style.css".to_string()
}

fn default_output_file() -> String {
    "dist.html".to_string()
}

fn default_vendor_dir() -> String {
    "vendor".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: default_title(),
            port: default_port(),
            data_file: default_data_file(),
            template_file: default_template_file(),
            style_file: default_style_file(),
            output_file: default_output_file(),
            vendor_dir: default_vendor_dir(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// The files a render reads from and writes to.
    pub fn source_files(&self) -> SourceFiles {
        SourceFiles {
            data: FilePath::from(self.data_file.clone()),
            template: FilePath::from(self.template_file.clone()),
            style: FilePath::from(self.style_file.clone()),
            output: FilePath::from(self.output_file.clone()),
        }
    }
}

/// The fixed set of files that drive a preview.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    /// YAML data file.
    pub data: FilePath,
    /// Liquid template file.
    pub template: FilePath,
    /// CSS stylesheet file.
    pub style: FilePath,
    /// Rendered document output file.
    pub output: FilePath,
}

impl SourceFiles {
    /// The input files the watcher observes. The output file is not watched.
    pub fn watched(&self) -> Vec<FilePath> {
        vec![self.data.clone(), self.template.clone(), self.style.clone()]
    }
}

/// Load the configuration from the given path.
///
/// A missing file is not an error: the defaults describe a complete setup.
/// A file that exists but does not parse is an error, since silently falling
/// back to defaults would hide typos in the configuration.
pub fn load_config(pal: &PalHandle, path: &FilePath) -> GalleyResult<Config> {
    if !pal.file_exists(path)? {
        debug!(path = %path, "No configuration file found, using defaults");
        return Ok(Config::default());
    }

    let text = pal.read_file_to_string(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| {
        Box::new(GalleyError::message(format!(
            "Invalid configuration in {}: {}",
            path, e
        )))
    })?;
    debug!(path = %path, "Configuration loaded");
    Ok(config)
}
