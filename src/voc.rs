//! Pascal VOC style XML export.
//!
//! Every `<base>_boxes.txt` coordinate file becomes one `<base>.xml` record:
//!
//! ```xml
//! <annotation>
//!   <filename>car01.jpg</filename>
//!   <size>
//!     <width>640</width>
//!     <height>480</height>
//!     <depth>3</depth>
//!   </size>
//!   <object>
//!     <name>license_plate</name>
//!     <bndbox>
//!       <xmin>100</xmin>
//!       <ymin>100</ymin>
//!       <xmax>200</xmax>
//!       <ymax>140</ymax>
//!     </bndbox>
//!   </object>
//! </annotation>
//! ```
//!
//! Image dimensions are read from the annotated image. When that image is
//! missing or cannot be decoded the record gets a 0x0 size instead of
//! failing.

use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::boxes::{self, BoundingBox};
use crate::config::Settings;
use crate::error::ExportError;

/// Channel depth written into every record.
pub const DEPTH: u32 = 3;

/// One XML document worth of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub label: String,
    pub boxes: Vec<BoundingBox>,
}

/// Result of exporting one coordinate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExport {
    pub xml_path: PathBuf,
    pub boxes: usize,
    pub dimensions_found: bool,
}

/// Outcome of a whole export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub files_written: Vec<PathBuf>,
    pub boxes_exported: usize,
    /// Records written with a 0x0 size
    pub missing_dimensions: usize,
    pub failed: Vec<(PathBuf, ExportError)>,
}

/// Export every `*_boxes.txt` file of `boxes_folder`, in name order.
///
/// A file that fails to parse is skipped (its XML is not written) and
/// recorded in the report; the others are still exported.
pub fn generate_xml_from_boxes(
    boxes_folder: &Path,
    settings: &Settings,
) -> Result<ExportReport, ExportError> {
    log::info!("Exporting XML annotations from {:?}", boxes_folder);

    let mut files: Vec<PathBuf> = std::fs::read_dir(boxes_folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        // follows symlinks
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| boxes::base_name(n).is_some())
        })
        .collect();
    files.sort();

    std::fs::create_dir_all(&settings.xml_dir)?;

    let mut report = ExportReport::default();
    for path in files {
        match export_boxes_file(&path, settings) {
            Ok(export) => {
                report.boxes_exported += export.boxes;
                if !export.dimensions_found {
                    report.missing_dimensions += 1;
                }
                report.files_written.push(export.xml_path);
            }
            Err(e) => {
                log::error!("Failed to export {:?}: {}", path, e);
                report.failed.push((path, e));
            }
        }
    }

    log::info!(
        "Exported {} file(s) with {} box(es) ({} without dimensions, {} failed)",
        report.files_written.len(),
        report.boxes_exported,
        report.missing_dimensions,
        report.failed.len()
    );
    Ok(report)
}

/// Convert one coordinate file into `<xml_dir>/<base>.xml`.
pub fn export_boxes_file(boxes_path: &Path, settings: &Settings) -> Result<FileExport, ExportError> {
    let file_name = boxes_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let base = boxes::base_name(file_name).unwrap_or(file_name);
    let image_filename = format!("{}.{}", base, settings.image_extension);

    // parse first so a bad file leaves no output behind
    let bboxes = boxes::read_boxes(boxes_path)?;

    let image_path = settings.annotated_dir.join(&image_filename);
    let dimensions = lookup_dimensions(&image_path);
    let (width, height) = dimensions.unwrap_or((0, 0));

    let record = AnnotationRecord {
        filename: image_filename,
        width,
        height,
        depth: DEPTH,
        label: settings.label.clone(),
        boxes: bboxes,
    };

    let xml_path = settings.xml_dir.join(format!("{}.xml", base));
    std::fs::write(&xml_path, build_xml(&record)?)?;
    log::debug!("Wrote {:?} ({} boxes)", xml_path, record.boxes.len());

    Ok(FileExport {
        xml_path,
        boxes: record.boxes.len(),
        dimensions_found: dimensions.is_some(),
    })
}

/// Width and height of the image at `path`, `None` if it cannot be fully
/// decoded.
pub fn lookup_dimensions(path: &Path) -> Option<(u32, u32)> {
    match image::open(path) {
        Ok(img) => Some((img.width(), img.height())),
        Err(e) => {
            log::warn!("Image {:?} unavailable ({}), using 0x0", path, e);
            None
        }
    }
}

/// Serialize a record to an indented UTF-8 XML document.
pub fn build_xml(record: &AnnotationRecord) -> Result<String, ExportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| ExportError::Xml(e.into()))?;

    start(&mut writer, "annotation")?;
    write_text_element(&mut writer, "filename", &record.filename)?;

    start(&mut writer, "size")?;
    write_text_element(&mut writer, "width", &record.width.to_string())?;
    write_text_element(&mut writer, "height", &record.height.to_string())?;
    write_text_element(&mut writer, "depth", &record.depth.to_string())?;
    end(&mut writer, "size")?;

    for b in &record.boxes {
        start(&mut writer, "object")?;
        write_text_element(&mut writer, "name", &record.label)?;
        start(&mut writer, "bndbox")?;
        write_text_element(&mut writer, "xmin", &b.xmin.to_string())?;
        write_text_element(&mut writer, "ymin", &b.ymin.to_string())?;
        write_text_element(&mut writer, "xmax", &b.xmax.to_string())?;
        write_text_element(&mut writer, "ymax", &b.ymax.to_string())?;
        end(&mut writer, "bndbox")?;
        end(&mut writer, "object")?;
    }

    end(&mut writer, "annotation")?;

    String::from_utf8(writer.into_inner()).map_err(|_| ExportError::Utf8)
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| ExportError::Xml(e.into()))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| ExportError::Xml(e.into()))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), ExportError> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| ExportError::Xml(e.into()))?;
    end(writer, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use quick_xml::Reader;
    use tempfile::TempDir;

    fn test_settings(dir: &TempDir) -> Settings {
        let settings = Settings {
            annotated_dir: dir.path().join("annotated_images2"),
            boxes_dir: dir.path().join("bounding_boxes"),
            xml_dir: dir.path().join("annotations_xml"),
            ..Settings::default()
        };
        settings.create_output_dirs().unwrap();
        settings
    }

    /// Unescaped text of every `<tag>` element, in document order.
    fn element_texts(xml: &str, tag: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut texts = Vec::new();
        let mut inside = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => inside = e.name().as_ref() == tag.as_bytes(),
                Event::Text(t) if inside => texts.push(t.unescape().unwrap().into_owned()),
                Event::End(_) => inside = false,
                Event::Eof => break,
                _ => {}
            }
        }
        texts
    }

    /// Number of `<tag>` elements in the document.
    fn count_elements(xml: &str, tag: &str) -> usize {
        let mut reader = Reader::from_str(xml);
        let mut count = 0;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == tag.as_bytes() => count += 1,
                Event::Eof => break,
                _ => {}
            }
        }
        count
    }

    #[test]
    fn test_export_with_known_image() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        RgbImage::new(100, 50)
            .save(settings.annotated_dir.join("car.jpg"))
            .unwrap();
        std::fs::write(
            settings.boxes_dir.join("car_boxes.txt"),
            "10,20,30,40\n5,5,15,15\n",
        )
        .unwrap();

        let report = generate_xml_from_boxes(&settings.boxes_dir, &settings).unwrap();
        assert_eq!(report.files_written, vec![settings.xml_dir.join("car.xml")]);
        assert_eq!(report.boxes_exported, 2);
        assert_eq!(report.missing_dimensions, 0);
        assert!(report.failed.is_empty());

        let xml = std::fs::read_to_string(settings.xml_dir.join("car.xml")).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(element_texts(&xml, "filename"), vec!["car.jpg"]);
        assert_eq!(element_texts(&xml, "width"), vec!["100"]);
        assert_eq!(element_texts(&xml, "height"), vec!["50"]);
        assert_eq!(element_texts(&xml, "depth"), vec!["3"]);
        assert_eq!(count_elements(&xml, "object"), 2);
        assert_eq!(
            element_texts(&xml, "name"),
            vec!["license_plate", "license_plate"]
        );
        assert_eq!(element_texts(&xml, "xmin"), vec!["10", "5"]);
        assert_eq!(element_texts(&xml, "ymin"), vec!["20", "5"]);
        assert_eq!(element_texts(&xml, "xmax"), vec!["30", "15"]);
        assert_eq!(element_texts(&xml, "ymax"), vec!["40", "15"]);
    }

    #[test]
    fn test_missing_image_falls_back_to_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        std::fs::write(settings.boxes_dir.join("ghost_boxes.txt"), "1,2,3,4\n").unwrap();

        let report = generate_xml_from_boxes(&settings.boxes_dir, &settings).unwrap();
        assert_eq!(report.files_written.len(), 1);
        assert_eq!(report.missing_dimensions, 1);

        let xml = std::fs::read_to_string(settings.xml_dir.join("ghost.xml")).unwrap();
        assert_eq!(element_texts(&xml, "width"), vec!["0"]);
        assert_eq!(element_texts(&xml, "height"), vec!["0"]);
        assert_eq!(element_texts(&xml, "depth"), vec!["3"]);
        assert_eq!(element_texts(&xml, "filename"), vec!["ghost.jpg"]);
    }

    #[test]
    fn test_png_source_is_looked_up_as_jpg() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        RgbImage::new(10, 10)
            .save(settings.annotated_dir.join("shot.png"))
            .unwrap();
        std::fs::write(settings.boxes_dir.join("shot_boxes.txt"), "1,1,2,2\n").unwrap();

        let export = export_boxes_file(&settings.boxes_dir.join("shot_boxes.txt"), &settings).unwrap();
        assert!(!export.dimensions_found);

        let settings = Settings {
            image_extension: "png".to_string(),
            ..settings
        };
        let export = export_boxes_file(&settings.boxes_dir.join("shot_boxes.txt"), &settings).unwrap();
        assert!(export.dimensions_found);
        let xml = std::fs::read_to_string(&export.xml_path).unwrap();
        assert_eq!(element_texts(&xml, "width"), vec!["10"]);
    }

    #[test]
    fn test_malformed_file_is_skipped_others_exported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        std::fs::write(settings.boxes_dir.join("a_boxes.txt"), "1,2,3,4\n").unwrap();
        std::fs::write(settings.boxes_dir.join("b_boxes.txt"), "1,2,3,4\noops\n").unwrap();
        std::fs::write(settings.boxes_dir.join("notes.txt"), "not a box file").unwrap();

        let report = generate_xml_from_boxes(&settings.boxes_dir, &settings).unwrap();
        assert_eq!(report.files_written, vec![settings.xml_dir.join("a.xml")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, settings.boxes_dir.join("b_boxes.txt"));
        assert!(matches!(report.failed[0].1, ExportError::BoxFile(_)));
        assert!(!settings.xml_dir.join("b.xml").exists());
        assert!(!settings.xml_dir.join("notes.xml").exists());
    }

    #[test]
    fn test_rerun_overwrites_xml() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let boxes_path = settings.boxes_dir.join("car_boxes.txt");

        std::fs::write(&boxes_path, "1,1,2,2\n3,3,4,4\n").unwrap();
        export_boxes_file(&boxes_path, &settings).unwrap();
        std::fs::write(&boxes_path, "7,7,8,8\n").unwrap();
        export_boxes_file(&boxes_path, &settings).unwrap();

        let xml = std::fs::read_to_string(settings.xml_dir.join("car.xml")).unwrap();
        assert_eq!(count_elements(&xml, "object"), 1);
        assert_eq!(element_texts(&xml, "xmin"), vec!["7"]);
    }

    #[test]
    fn test_custom_label_and_escaping() {
        let record = AnnotationRecord {
            filename: "a&b.jpg".to_string(),
            width: 1,
            height: 2,
            depth: DEPTH,
            label: "plate<eu>".to_string(),
            boxes: vec![BoundingBox::new(0, 0, 1, 1)],
        };
        let xml = build_xml(&record).unwrap();
        assert!(xml.contains("<filename>a&amp;b.jpg</filename>"));
        assert_eq!(element_texts(&xml, "filename"), vec!["a&b.jpg"]);
        assert_eq!(element_texts(&xml, "name"), vec!["plate<eu>"]);
    }

    #[test]
    fn test_empty_box_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        std::fs::write(settings.boxes_dir.join("empty_boxes.txt"), "").unwrap();

        let report = generate_xml_from_boxes(&settings.boxes_dir, &settings).unwrap();
        assert_eq!(report.files_written.len(), 1);
        let xml = std::fs::read_to_string(settings.xml_dir.join("empty.xml")).unwrap();
        assert_eq!(count_elements(&xml, "object"), 0);
        assert_eq!(count_elements(&xml, "annotation"), 1);
    }

    #[test]
    fn test_truncated_image_falls_back_to_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            image_extension: "png".to_string(),
            ..test_settings(&dir)
        };
        let image_path = settings.annotated_dir.join("cut.png");
        RgbImage::from_fn(100, 50, |x, y| image::Rgb([x as u8, y as u8, (x * y) as u8]))
            .save(&image_path)
            .unwrap();
        // header stays readable, pixel data is cut short
        let bytes = std::fs::read(&image_path).unwrap();
        std::fs::write(&image_path, &bytes[..bytes.len() / 2]).unwrap();
        assert_eq!(image::image_dimensions(&image_path).unwrap(), (100, 50));

        std::fs::write(settings.boxes_dir.join("cut_boxes.txt"), "1,1,2,2\n").unwrap();
        let export = export_boxes_file(&settings.boxes_dir.join("cut_boxes.txt"), &settings).unwrap();

        assert!(!export.dimensions_found);
        let xml = std::fs::read_to_string(&export.xml_path).unwrap();
        assert_eq!(element_texts(&xml, "width"), vec!["0"]);
        assert_eq!(element_texts(&xml, "height"), vec!["0"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_box_file_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir);
        let real = dir.path().join("car_boxes.txt");
        std::fs::write(&real, "10,20,30,40\n").unwrap();
        std::os::unix::fs::symlink(&real, settings.boxes_dir.join("car_boxes.txt")).unwrap();

        let report = generate_xml_from_boxes(&settings.boxes_dir, &settings).unwrap();
        assert_eq!(report.files_written, vec![settings.xml_dir.join("car.xml")]);
        let xml = std::fs::read_to_string(settings.xml_dir.join("car.xml")).unwrap();
        assert_eq!(element_texts(&xml, "xmin"), vec!["10"]);
    }
}
