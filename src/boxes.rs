use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::BoxFileError;

/// Suffix of every coordinate file, `<image-base>_boxes.txt`.
pub const BOXES_SUFFIX: &str = "_boxes.txt";

// ── Selection rectangle ─────────────────────────────────────────────────────

/// A rectangle returned by the selector, `(x, y, width, height)` in preview
/// pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// Terminate signal of the selection loop.
    pub const ZERO: Roi = Roi {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Build from two corners in any order, clamped to `bounds` and rounded
    /// to whole pixels.
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32, bounds: (u32, u32)) -> Self {
        let clamp_x = |v: f32| v.round().clamp(0.0, bounds.0 as f32) as u32;
        let clamp_y = |v: f32| v.round().clamp(0.0, bounds.1 as f32) as u32;
        let (min_x, max_x) = (clamp_x(x0.min(x1)), clamp_x(x0.max(x1)));
        let (min_y, max_y) = (clamp_y(y0.min(y1)), clamp_y(y0.max(y1)));
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Map from one pixel grid to another by per-axis factors.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        let x = (self.x as f64 * sx).round() as u32;
        let y = (self.y as f64 * sy).round() as u32;
        let x2 = ((self.x + self.width) as f64 * sx).round() as u32;
        let y2 = ((self.y + self.height) as f64 * sy).round() as u32;
        Self::new(x, y, x2.saturating_sub(x), y2.saturating_sub(y))
    }
}

// ── Bounding box ────────────────────────────────────────────────────────────

/// Axis-aligned box `(x1, y1, x2, y2)` as stored in coordinate files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

impl From<Roi> for BoundingBox {
    fn from(roi: Roi) -> Self {
        let x = roi.x as i32;
        let y = roi.y as i32;
        Self::new(x, y, x + roi.width as i32, y + roi.height as i32)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();
        if fields.len() != 4 {
            return Err(format!("expected 4 fields, found {}", fields.len()));
        }
        let mut values = [0i32; 4];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .trim()
                .parse()
                .map_err(|e| format!("{:?}: {}", field.trim(), e))?;
        }
        let [xmin, ymin, xmax, ymax] = values;
        Ok(Self::new(xmin, ymin, xmax, ymax))
    }
}

// ── Coordinate files ────────────────────────────────────────────────────────

/// `<stem>_boxes.txt` for an image path.
pub fn boxes_file_name(image_path: &Path) -> String {
    format!(
        "{}{}",
        image_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy(),
        BOXES_SUFFIX
    )
}

/// Image base name encoded in a coordinate file name, if it is one.
pub fn base_name(boxes_file_name: &str) -> Option<&str> {
    boxes_file_name.strip_suffix(BOXES_SUFFIX)
}

/// Rewrite `path` with one `x1,y1,x2,y2` line per box.
pub fn write_boxes(path: &Path, boxes: &[BoundingBox]) -> Result<(), BoxFileError> {
    let mut data = String::new();
    for b in boxes {
        data.push_str(&b.to_string());
        data.push('\n');
    }
    std::fs::write(path, data).map_err(|source| BoxFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_boxes(path: &Path) -> Result<Vec<BoundingBox>, BoxFileError> {
    let data = std::fs::read_to_string(path).map_err(|source| BoxFileError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    parse_boxes(&data)
}

/// Parse a whole coordinate file. Any bad line fails the file.
pub fn parse_boxes(data: &str) -> Result<Vec<BoundingBox>, BoxFileError> {
    data.lines()
        .enumerate()
        .map(|(i, line)| {
            line.parse::<BoundingBox>()
                .map_err(|reason| BoxFileError::Parse {
                    line: i + 1,
                    content: line.to_string(),
                    reason,
                })
        })
        .collect()
}
