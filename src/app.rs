//! eframe shell around the [`Editor`]: toolbar, canvas and pointer plumbing.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Instant;

use eframe::egui;
use egui::{Color32, Pos2, Rect as UiRect, Sense};
use image::{Rgba, RgbaImage};
use log::{error, info, warn};
use xcap::Monitor;

use crate::config::Config;
use crate::editor::{Editor, InputEvent, Outcome, Status};
use crate::error::ExportError;
use crate::export::{self, ClipboardSink, DownloadSink, ExportSink, FileSink};
use crate::geometry::{Point, Rect};
use crate::handoff::{CAPTURE_KEY, CaptureHandoff, FileStore, KeyValueStore};
use crate::tool::{Mode, Tool};

pub struct SnapRedactApp {
    editor: Editor,
    texture: Option<egui::TextureHandle>,
    store: FileStore,
    download: DownloadSink,
    color: Color32,
    canvas_rect: Option<UiRect>,
    status_line: Option<String>,
    /// Download running on a worker thread.
    pending_save: Option<Receiver<Result<String, ExportError>>>,
}

impl SnapRedactApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &Config) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let settings = config.editor_settings();
        let [r, g, b, a] = settings.redaction_color.0;
        let mut app = Self {
            editor: Editor::new(settings),
            texture: None,
            store: FileStore::new(&config.handoff_dir),
            download: config.download_sink(),
            color: Color32::from_rgba_unmultiplied(r, g, b, a),
            canvas_rect: None,
            status_line: None,
            pending_save: None,
        };

        if let Some(path) = &config.input {
            match std::fs::read(path) {
                Ok(png) => app.hand_over(png, config.crop_only),
                Err(e) => {
                    error!("cannot read {}: {e}", path.display());
                    app.status_line = Some(format!("Cannot read {}: {e}", path.display()));
                }
            }
        } else if matches!(app.store.get(CAPTURE_KEY), Ok(Some(_))) {
            app.load_pending_capture();
        }
        app
    }

    /// Publishes a capture into the handoff store and opens it, the same way
    /// an external capture process would.
    fn hand_over(&mut self, png: Vec<u8>, crop_only: bool) {
        if let Err(e) = CaptureHandoff::new(png, crop_only).publish(&mut self.store, CAPTURE_KEY) {
            error!("handoff store unavailable: {e}");
            self.status_line = Some(format!("Capture handoff failed: {e}"));
            return;
        }
        self.load_pending_capture();
    }

    fn load_pending_capture(&mut self) {
        match self.editor.load_from_store(&mut self.store, CAPTURE_KEY) {
            Ok(()) => self.status_line = None,
            Err(err) => self.status_line = Some(err.user_message()),
        }
    }

    fn capture_fullscreen(&mut self, ctx: &egui::Context, crop_only: bool) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
        std::thread::sleep(std::time::Duration::from_millis(350));
        let captured = Monitor::all()
            .ok()
            .and_then(|monitors| monitors.into_iter().next())
            .and_then(|monitor| monitor.capture_image().ok());
        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));

        let Some(captured) = captured else {
            warn!("screen capture failed");
            self.status_line = Some("Screen capture failed".to_string());
            return;
        };
        let (w, h) = (captured.width(), captured.height());
        let Some(image) = RgbaImage::from_raw(w, h, captured.into_raw()) else {
            self.status_line = Some("Screen capture returned an invalid buffer".to_string());
            return;
        };
        match export::encode_png(&image) {
            Ok(png) => self.hand_over(png, crop_only),
            Err(e) => self.status_line = Some(e.to_string()),
        }
    }

    fn dispatch(&mut self, event: InputEvent) {
        match self.editor.dispatch(event, Instant::now()) {
            Outcome::Failed(err) => self.status_line = Some(err.user_message()),
            Outcome::Cropped(outcome) => {
                self.status_line = Some(format!("Cropped to {}x{}", outcome.width, outcome.height));
            }
            Outcome::ElementAdded(_) => self.status_line = None,
            Outcome::Ignored | Outcome::Updated | Outcome::Cancelled => {}
        }
    }

    fn export(&mut self, sink: &mut dyn ExportSink, verb: &str) {
        match self.editor.export_to(sink) {
            Ok(destination) => {
                info!("exported to {destination}");
                self.status_line = Some(format!("{verb} to {destination}"));
            }
            Err(err) => self.status_line = Some(err.user_message()),
        }
    }

    fn save_download(&mut self, ctx: &egui::Context) {
        if self.pending_save.is_some() {
            return;
        }
        match self.editor.flatten() {
            Ok(image) => {
                let ctx = ctx.clone();
                self.pending_save = Some(export::deliver_in_background(
                    self.download.clone(),
                    image,
                    move || ctx.request_repaint(),
                ));
                self.status_line = Some("Saving…".to_string());
            }
            Err(err) => self.status_line = Some(err.user_message()),
        }
    }

    fn poll_pending_save(&mut self) {
        let Some(rx) = &self.pending_save else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(destination)) => {
                info!("exported to {destination}");
                self.status_line = Some(format!("Saved to {destination}"));
            }
            Ok(Err(err)) => {
                warn!("export failed: {err}");
                self.status_line = Some(err.to_string());
            }
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                self.status_line = Some("Save was interrupted".to_string());
            }
        }
        self.pending_save = None;
    }

    fn save_as(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name("screenshot.png")
            .save_file()
        {
            self.export(&mut FileSink { path }, "Saved");
        }
    }

    fn sync_texture(&mut self, ctx: &egui::Context) {
        if !self.editor.take_dirty() && self.texture.is_some() {
            return;
        }
        let surface = self.editor.surface();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(
            [surface.width() as usize, surface.height() as usize],
            surface.as_raw(),
        );
        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("canvas", color_image, egui::TextureOptions::NEAREST));
            }
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.menu_button("📸 Capture", |ui| {
                if ui.button("🖥 Fullscreen").clicked() {
                    self.capture_fullscreen(ctx, false);
                    ui.close_kind(egui::UiKind::Menu);
                }
                if ui.button("✂ Select Area").clicked() {
                    self.capture_fullscreen(ctx, true);
                    ui.close_kind(egui::UiKind::Menu);
                }
            });

            let ready = self.editor.document().is_some();
            ui.separator();
            ui.add_enabled_ui(ready, |ui| {
                let mode = self.editor.mode();
                if ui.selectable_label(mode == Mode::Crop, "✂ Crop").clicked() {
                    self.dispatch(InputEvent::ToggleTool(Tool::Crop));
                }
                if ui.selectable_label(mode == Mode::Annotate, "⬛ Redact").clicked() {
                    self.dispatch(InputEvent::ToggleTool(Tool::Annotate));
                }
                ui.separator();
                if ui.color_edit_button_srgba(&mut self.color).changed() {
                    self.dispatch(InputEvent::SetColor(Rgba(self.color.to_srgba_unmultiplied())));
                }
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.add_enabled_ui(ready, |ui| {
                    if ui.button("💾 Save As").clicked() {
                        self.save_as();
                    }
                    if ui.button("💾 Save").clicked() {
                        self.save_download(ctx);
                    }
                    if ui.button("📋 Copy").clicked() {
                        self.export(&mut ClipboardSink, "Copied");
                    }
                    if ui.button("🗑 Clear").clicked() {
                        self.editor.clear_elements();
                    }
                });
            });
        });
    }

    fn canvas(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Some(texture) = &self.texture else {
            return;
        };
        let tex_size = texture.size_vec2();
        let available = ui.available_size();
        let scale = (available.x / tex_size.x)
            .min(available.y / tex_size.y)
            .min(1.0);
        let (rect, response) = ui.allocate_exact_size(tex_size * scale, Sense::drag());

        let mut mesh = egui::Mesh::with_texture(texture.id());
        mesh.add_rect_with_uv(
            rect,
            UiRect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
        ui.painter().add(egui::Shape::mesh(mesh));

        if let Status::Failed(message) = self.editor.status() {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                message,
                egui::FontId::proportional(16.0),
                Color32::LIGHT_RED,
            );
            return;
        }

        if self.canvas_rect != Some(rect) {
            self.canvas_rect = Some(rect);
            self.dispatch(InputEvent::Resize(Rect::new(
                f64::from(rect.min.x),
                f64::from(rect.min.y),
                f64::from(rect.width()),
                f64::from(rect.height()),
            )));
        }

        if self.editor.mode() != Mode::None && response.hovered() {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.dispatch(InputEvent::PointerDown(to_point(pos)));
            }
        }
        if response.dragged() && self.editor.is_dragging() {
            match ctx.pointer_latest_pos() {
                Some(pos) if rect.contains(pos) => {
                    self.dispatch(InputEvent::PointerMove(to_point(pos)));
                }
                _ => self.dispatch(InputEvent::PointerLeave),
            }
        }
        if response.drag_stopped() && self.editor.is_dragging() {
            let pos = response
                .interact_pointer_pos()
                .or_else(|| ctx.pointer_latest_pos())
                .unwrap_or(rect.max);
            self.dispatch(InputEvent::PointerUp(to_point(pos)));
        }
    }
}

fn to_point(pos: Pos2) -> Point {
    Point::new(f64::from(pos.x), f64::from(pos.y))
}

impl eframe::App for SnapRedactApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.dispatch(InputEvent::Tick);
        self.poll_pending_save();
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.dispatch(InputEvent::DeactivateTools);
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            self.toolbar(ctx, ui);
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            let text = self.status_line.clone().unwrap_or_else(|| match self.editor.mode() {
                Mode::Crop => "Drag to select the area to keep".to_string(),
                Mode::Annotate => "Drag to black out a region".to_string(),
                Mode::None => String::new(),
            });
            ui.label(text);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if matches!(self.editor.status(), Status::Empty) {
                ui.centered_and_justified(|ui| {
                    ui.vertical(|ui| {
                        ui.heading("SnapRedact");
                        ui.label("Capture the screen to begin");
                        ui.add_space(10.0);
                        ui.horizontal(|ui| {
                            if ui.button("🖥 Fullscreen").clicked() {
                                self.capture_fullscreen(ctx, false);
                            }
                            if ui.button("✂ Area").clicked() {
                                self.capture_fullscreen(ctx, true);
                            }
                        });
                    });
                });
                return;
            }
            self.sync_texture(ctx);
            self.canvas(ctx, ui);
        });

        if self.editor.is_dragging() {
            ctx.request_repaint();
        }
    }
}
