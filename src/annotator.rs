use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::boxes::{self, BoundingBox};
use crate::config::Settings;
use crate::draw::{draw_box, OUTLINE_COLOR, OUTLINE_THICKNESS};
use crate::error::{AnnotateError, BatchError};
use crate::scaler::resize_for_display;
use crate::selector::RectangleSelector;

/// Extensions picked up by the batch driver, matched case-sensitively.
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".png"];

/// Outcome of one batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub images_seen: usize,
    pub images_annotated: usize,
    pub images_without_boxes: usize,
    pub images_failed: usize,
    pub boxes_saved: usize,
}

/// Annotate one image interactively.
///
/// Returns the number of boxes saved. Nothing is written unless at least one
/// box was drawn; then the annotated full-resolution image goes to
/// `output_image_path` and the coordinates to `<stem>_boxes.txt` in the
/// boxes directory, both fully overwritten.
pub fn annotate_image<S: RectangleSelector + ?Sized>(
    selector: &mut S,
    image_path: &Path,
    output_image_path: &Path,
    settings: &Settings,
) -> Result<usize, AnnotateError> {
    let mut working: RgbImage = image::open(image_path)
        .map_err(|source| AnnotateError::Open {
            path: image_path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    let limits = settings.display_limits();
    let mut preview = resize_for_display(&working, limits);
    let sx = working.width() as f64 / preview.width() as f64;
    let sy = working.height() as f64 / preview.height() as f64;

    let mut boxes: Vec<BoundingBox> = Vec::new();
    while let Some(roi) = selector.select_rectangle(&preview)? {
        if roi.is_sentinel() {
            break;
        }
        let roi = if settings.rescale_to_original {
            roi.scaled(sx, sy)
        } else {
            roi
        };

        let bbox = BoundingBox::from(roi);
        draw_box(&mut working, &bbox, OUTLINE_COLOR, OUTLINE_THICKNESS);
        boxes.push(bbox);
        preview = resize_for_display(&working, limits);

        log::info!(
            "Box {} recorded ({}). Draw another one, or finish with an empty selection or by closing the window.",
            boxes.len(),
            bbox
        );
    }

    if boxes.is_empty() {
        log::info!("No annotation for {}", image_path.display());
        return Ok(0);
    }

    if let Some(parent) = output_image_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    working
        .save(output_image_path)
        .map_err(|source| AnnotateError::Save {
            path: output_image_path.to_path_buf(),
            source,
        })?;

    std::fs::create_dir_all(&settings.boxes_dir)?;
    let boxes_path = settings.boxes_dir.join(boxes::boxes_file_name(image_path));
    boxes::write_boxes(&boxes_path, &boxes)?;

    log::info!(
        "{} annotation(s) saved for {}",
        boxes.len(),
        image_path.display()
    );
    Ok(boxes.len())
}

/// Sorted `.jpg`/`.png` files directly inside `folder`.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !folder.is_dir() {
        return Err(BatchError::MissingFolder(folder.to_path_buf()));
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        // follows symlinks
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| IMAGE_EXTENSIONS.iter().any(|ext| n.ends_with(ext)))
        })
        .collect();
    images.sort();

    if images.is_empty() {
        return Err(BatchError::NoImages(folder.to_path_buf()));
    }
    Ok(images)
}

/// Annotate every image of `input_folder`, one after the other.
///
/// A failure on one image is logged and the batch moves on to the next.
pub fn process_images<S: RectangleSelector + ?Sized>(
    selector: &mut S,
    input_folder: &Path,
    settings: &Settings,
) -> Result<BatchReport, BatchError> {
    let images = list_images(input_folder)?;
    let mut report = BatchReport::default();

    for image_path in images {
        report.images_seen += 1;
        log::info!("Processing image {}...", image_path.display());

        let Some(file_name) = image_path.file_name() else {
            continue;
        };
        let output_image_path = settings.annotated_dir.join(file_name);

        match annotate_image(&mut *selector, &image_path, &output_image_path, settings) {
            Ok(0) => report.images_without_boxes += 1,
            Ok(n) => {
                report.images_annotated += 1;
                report.boxes_saved += n;
            }
            Err(e) => {
                log::error!("{}", e);
                report.images_failed += 1;
            }
        }
    }

    log::info!(
        "Batch done: {} image(s), {} annotated, {} without boxes, {} failed, {} box(es)",
        report.images_seen,
        report.images_annotated,
        report.images_without_boxes,
        report.images_failed,
        report.boxes_saved
    );
    Ok(report)
}
