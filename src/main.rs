mod annotator;
mod boxes;
mod config;
mod draw;
mod error;
mod scaler;
mod selector;
mod voc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::config::{Args, Settings};
use crate::selector::EguiSelector;

const WINDOW_TITLE: &str = "plate-annotate";

fn pick_input_folder(settings: &Settings) -> Option<PathBuf> {
    settings.input_folder.clone().or_else(|| {
        log::info!("No input folder configured, opening folder picker");
        rfd::FileDialog::new()
            .set_title("Select the folder of images to annotate")
            .pick_folder()
    })
}

fn run_annotate(settings: &Settings) {
    let Some(input_folder) = pick_input_folder(settings) else {
        log::error!("No input folder selected, skipping annotation");
        return;
    };

    let mut selector = EguiSelector::new(WINDOW_TITLE);
    if let Err(e) = annotator::process_images(&mut selector, &input_folder, settings) {
        log::error!("{}", e);
    }
}

/// Returns false when any coordinate file could not be exported.
fn run_export(settings: &Settings) -> bool {
    match voc::generate_xml_from_boxes(&settings.boxes_dir, settings) {
        Ok(report) => report.failed.is_empty(),
        Err(e) => {
            log::error!("XML export failed: {}", e);
            false
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let settings = match Settings::resolve(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_filter()),
    )
    .init();

    if let Err(e) = settings.create_output_dirs() {
        log::error!("Cannot create output directories: {}", e);
        return ExitCode::FAILURE;
    }

    let command = args.command.unwrap_or_default();
    if command.annotates() {
        run_annotate(&settings);
    }
    if command.exports() && !run_export(&settings) {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
