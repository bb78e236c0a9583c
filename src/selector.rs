use std::cell::RefCell;
use std::rc::Rc;

use eframe::egui;
use image::RgbImage;

use crate::boxes::Roi;
use crate::error::SelectorError;

/// Blocking, one-at-a-time rectangle selection on a preview image.
pub trait RectangleSelector {
    /// Wait for the user to pick a rectangle in preview pixels.
    ///
    /// `Some(Roi::ZERO)` is the finish signal, `None` means the window was
    /// closed.
    fn select_rectangle(&mut self, preview: &RgbImage) -> Result<Option<Roi>, SelectorError>;
}

const TOOLBAR_HEIGHT: f32 = 28.0;
const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 255, 0);

// ── Native window ───────────────────────────────────────────────────────────

/// Opens a native window per selection and blocks until it closes.
pub struct EguiSelector {
    title: String,
}

impl EguiSelector {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl RectangleSelector for EguiSelector {
    fn select_rectangle(&mut self, preview: &RgbImage) -> Result<Option<Roi>, SelectorError> {
        let outcome = Rc::new(RefCell::new(None));
        let app = SelectionApp::new(preview.clone(), Rc::clone(&outcome));

        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([
                    preview.width() as f32,
                    preview.height() as f32 + TOOLBAR_HEIGHT,
                ])
                .with_title(&self.title),
            ..Default::default()
        };

        eframe::run_native(&self.title, options, Box::new(move |_cc| Ok(Box::new(app))))
            .map_err(|e| SelectorError::Window(e.to_string()))?;

        let result = outcome.take();
        Ok(result)
    }
}

/// Rectangle reported when the user confirms `selection` (corners in preview
/// pixels). No selection, or one without area, finishes the image.
fn confirmed_roi(selection: Option<(egui::Pos2, egui::Pos2)>, bounds: (u32, u32)) -> Roi {
    let Some((a, b)) = selection else {
        return Roi::ZERO;
    };
    let roi = Roi::from_corners(a.x, a.y, b.x, b.y, bounds);
    if roi.is_empty() {
        Roi::ZERO
    } else {
        roi
    }
}

struct SelectionApp {
    preview: RgbImage,
    texture: Option<egui::TextureHandle>,
    drag_start: Option<egui::Pos2>,
    // both corners in preview pixels
    selection: Option<(egui::Pos2, egui::Pos2)>,
    outcome: Rc<RefCell<Option<Roi>>>,
}

impl SelectionApp {
    fn new(preview: RgbImage, outcome: Rc<RefCell<Option<Roi>>>) -> Self {
        Self {
            preview,
            texture: None,
            drag_start: None,
            selection: None,
            outcome,
        }
    }

    fn image_size(&self) -> egui::Vec2 {
        egui::vec2(self.preview.width() as f32, self.preview.height() as f32)
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        let size = [self.preview.width() as usize, self.preview.height() as usize];
        let color_image = egui::ColorImage::from_rgb(size, self.preview.as_raw());
        self.texture = Some(ctx.load_texture("preview", color_image, egui::TextureOptions::LINEAR));
    }

    /// Screen rect of the preview, scaled to fit and centered in the canvas.
    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let size = self.image_size();
        let scale = (canvas_rect.width() / size.x).min(canvas_rect.height() / size.y);
        egui::Rect::from_center_size(canvas_rect.center(), size * scale)
    }

    fn screen_to_image(&self, image_rect: egui::Rect, screen_pos: egui::Pos2) -> egui::Pos2 {
        let scale = image_rect.width() / self.image_size().x;
        let rel = (screen_pos - image_rect.min) / scale;
        let size = self.image_size();
        egui::pos2(rel.x.clamp(0.0, size.x), rel.y.clamp(0.0, size.y))
    }

    fn image_to_screen(&self, image_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let scale = image_rect.width() / self.image_size().x;
        image_rect.min + img_pos.to_vec2() * scale
    }

    fn finish(&mut self, ctx: &egui::Context, roi: Roi) {
        *self.outcome.borrow_mut() = Some(roi);
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn draw_selection(&self, painter: &egui::Painter, image_rect: egui::Rect) {
        let Some((a, b)) = self.selection else {
            return;
        };
        let rect = egui::Rect::from_two_pos(
            self.image_to_screen(image_rect, a),
            self.image_to_screen(image_rect, b),
        );
        let stroke = egui::Stroke::new(1.5, SELECTION_COLOR);
        painter.rect_stroke(rect, 0.0, stroke, egui::StrokeKind::Middle);

        // crosshair
        let c = rect.center();
        painter.line_segment([egui::pos2(rect.left(), c.y), egui::pos2(rect.right(), c.y)], stroke);
        painter.line_segment([egui::pos2(c.x, rect.top()), egui::pos2(c.x, rect.bottom())], stroke);
    }
}

impl eframe::App for SelectionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        let (confirm, cancel) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Enter) || i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::C) || i.key_pressed(egui::Key::Escape),
            )
        });
        if confirm {
            let roi = confirmed_roi(self.selection, self.preview.dimensions());
            self.finish(ctx, roi);
        } else if cancel {
            self.finish(ctx, Roi::ZERO);
        }

        egui::TopBottomPanel::top("help").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Drag to draw a box.");
                ui.separator();
                ui.label("Enter/Space: confirm");
                ui.separator();
                ui.label("C/Esc: done with this image");
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;
            let image_rect = self.image_rect_on_screen(canvas_rect);

            painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));
            if let Some(ref tex) = self.texture {
                painter.image(
                    tex.id(),
                    image_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }

            if response.drag_started_by(egui::PointerButton::Primary) {
                if let Some(pos) = response.interact_pointer_pos() {
                    let start = self.screen_to_image(image_rect, pos);
                    self.drag_start = Some(start);
                    self.selection = Some((start, start));
                }
            }

            if response.dragged_by(egui::PointerButton::Primary) {
                if let (Some(start), Some(pos)) =
                    (self.drag_start, response.interact_pointer_pos())
                {
                    self.selection = Some((start, self.screen_to_image(image_rect, pos)));
                }
            }

            if response.drag_stopped_by(egui::PointerButton::Primary) {
                self.drag_start = None;
            }

            self.draw_selection(&painter, image_rect);
        });
    }
}

// ── Scripted selector for tests ─────────────────────────────────────────────

/// Replays a fixed sequence of answers, then reports a closed window.
#[cfg(test)]
pub struct ScriptedSelector {
    answers: std::collections::VecDeque<Option<Roi>>,
    pub previews: Vec<(u32, u32)>,
}

#[cfg(test)]
impl ScriptedSelector {
    pub fn new(answers: impl IntoIterator<Item = Option<Roi>>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            previews: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

#[cfg(test)]
impl RectangleSelector for ScriptedSelector {
    fn select_rectangle(&mut self, preview: &RgbImage) -> Result<Option<Roi>, SelectorError> {
        self.previews.push(preview.dimensions());
        Ok(self.answers.pop_front().flatten())
    }
}
