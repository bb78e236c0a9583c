//! Runtime settings.
//!
//! Settings start from built-in defaults, are optionally replaced by a JSON
//! config file and finally overridden by command-line flags.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scaler::{DisplayLimits, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};

pub const DEFAULT_ANNOTATED_DIR: &str = "annotated_images2";
pub const DEFAULT_BOXES_DIR: &str = "bounding_boxes";
pub const DEFAULT_XML_DIR: &str = "annotations_xml";
pub const DEFAULT_LABEL: &str = "license_plate";
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter string understood by `env_logger`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// ── Command line ────────────────────────────────────────────────────────────

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Folder with the .jpg/.png images to annotate
    #[arg(short, long, global = true)]
    pub input: Option<PathBuf>,

    /// JSON settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Where annotated images are written
    #[arg(long, global = true)]
    pub annotated_dir: Option<PathBuf>,

    /// Where coordinate files are written and read
    #[arg(long, global = true)]
    pub boxes_dir: Option<PathBuf>,

    /// Where XML annotation records are written
    #[arg(long, global = true)]
    pub xml_dir: Option<PathBuf>,

    /// Maximum preview width
    #[arg(long, global = true)]
    pub max_width: Option<u32>,

    /// Maximum preview height
    #[arg(long, global = true)]
    pub max_height: Option<u32>,

    /// Object name written into every XML <object>
    #[arg(long, global = true)]
    pub label: Option<String>,

    /// Extension used to find annotated images during export
    #[arg(long, global = true)]
    pub image_extension: Option<String>,

    /// Store boxes in full-resolution coordinates instead of preview coordinates
    #[arg(long, global = true, overrides_with = "no_rescale_to_original")]
    pub rescale_to_original: bool,

    /// Store boxes in preview coordinates, overriding the config file
    #[arg(long, global = true, overrides_with = "rescale_to_original")]
    pub no_rescale_to_original: bool,

    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Draw boxes on every image of the input folder
    Annotate,
    /// Convert coordinate files into XML records
    Export,
    /// Annotate, then export
    #[default]
    Run,
}

impl Command {
    pub fn annotates(&self) -> bool {
        matches!(self, Command::Annotate | Command::Run)
    }

    pub fn exports(&self) -> bool {
        matches!(self, Command::Export | Command::Run)
    }
}

// ── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_folder: Option<PathBuf>,
    pub annotated_dir: PathBuf,
    pub boxes_dir: PathBuf,
    pub xml_dir: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
    pub label: String,
    pub image_extension: String,
    pub rescale_to_original: bool,
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_folder: None,
            annotated_dir: PathBuf::from(DEFAULT_ANNOTATED_DIR),
            boxes_dir: PathBuf::from(DEFAULT_BOXES_DIR),
            xml_dir: PathBuf::from(DEFAULT_XML_DIR),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            label: DEFAULT_LABEL.to_string(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            rescale_to_original: false,
            log_level: LogLevel::Info,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the config file if any, then command-line overrides.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut settings = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_args(args);
        Ok(settings)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(ref v) = args.input {
            self.input_folder = Some(v.clone());
        }
        if let Some(ref v) = args.annotated_dir {
            self.annotated_dir = v.clone();
        }
        if let Some(ref v) = args.boxes_dir {
            self.boxes_dir = v.clone();
        }
        if let Some(ref v) = args.xml_dir {
            self.xml_dir = v.clone();
        }
        if let Some(v) = args.max_width {
            self.max_width = v;
        }
        if let Some(v) = args.max_height {
            self.max_height = v;
        }
        if let Some(ref v) = args.label {
            self.label = v.clone();
        }
        if let Some(ref v) = args.image_extension {
            self.image_extension = v.trim_start_matches('.').to_string();
        }
        if args.rescale_to_original {
            self.rescale_to_original = true;
        }
        if args.no_rescale_to_original {
            self.rescale_to_original = false;
        }
        if let Some(v) = args.log_level {
            self.log_level = v;
        }
    }

    pub fn display_limits(&self) -> DisplayLimits {
        DisplayLimits {
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }

    /// Create the three output directories if absent.
    pub fn create_output_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.annotated_dir, &self.boxes_dir, &self.xml_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
