//! Error types for the annotation and export stages.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or parsing a coordinate file.
#[derive(Error, Debug)]
pub enum BoxFileError {
    /// I/O error while reading or writing the file
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line that is not four comma-separated integers
    #[error("line {line}: cannot parse {content:?} as x1,y1,x2,y2 ({reason})")]
    Parse {
        /// 1-based line number
        line: usize,
        content: String,
        reason: String,
    },
}

/// Errors raised by the interactive rectangle selector.
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("selection window failed: {0}")]
    Window(String),
}

/// Errors that abort the annotation of a single image.
#[derive(Error, Debug)]
pub enum AnnotateError {
    /// The source image could not be opened or decoded
    #[error("cannot read image {path:?}, it may be corrupt or in an unsupported format: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The annotated image could not be written
    #[error("cannot save annotated image {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    BoxFile(#[from] BoxFileError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a whole annotation batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("input folder {0:?} does not exist")]
    MissingFolder(PathBuf),

    #[error("no .jpg or .png image found in {0:?}")]
    NoImages(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the XML export stage.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    BoxFile(#[from] BoxFileError),

    #[error("invalid UTF-8 in generated XML")]
    Utf8,
}

/// Errors resolving the runtime settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
