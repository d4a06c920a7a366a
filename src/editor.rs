//! The editor aggregate: document, tool state and render surface, driven by
//! one input dispatcher.

use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use log::{debug, error, info, warn};

use crate::crop::{CropEngine, CropOutcome};
use crate::document::{Document, ElementId};
use crate::error::{CropError, EditorError, ExportError, LoadError, Result};
use crate::export::ExportSink;
use crate::geometry::{CoordinateMapper, Point, Rect};
use crate::handoff::{CaptureHandoff, KeyValueStore};
use crate::render::{self, RenderPipeline};
use crate::throttle::{DEFAULT_PREVIEW_INTERVAL, Throttle};
use crate::tool::{Action, InteractionStateMachine, Mode, Selection, Tool};

pub const DEFAULT_REDACTION_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Core-facing settings, independent of how they were configured.
#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub redaction_color: Rgba<u8>,
    pub preview_interval: Duration,
    pub max_working_size: Option<u32>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            redaction_color: DEFAULT_REDACTION_COLOR,
            preview_interval: DEFAULT_PREVIEW_INTERVAL,
            max_working_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Empty,
    Ready,
    /// Load failed; tools and export are disabled until the next load.
    Failed(String),
}

/// Everything the shell can feed into the editor. Pointer positions are in
/// display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp(Point),
    PointerLeave,
    ActivateTool(Tool),
    ToggleTool(Tool),
    DeactivateTools,
    /// The on-screen canvas moved or changed size.
    Resize(Rect),
    SetColor(Rgba<u8>),
    /// Frame tick; releases throttled preview redraws.
    Tick,
}

/// What a dispatched event resulted in.
#[derive(Debug)]
pub enum Outcome {
    Ignored,
    Updated,
    ElementAdded(ElementId),
    Cropped(CropOutcome),
    Cancelled,
    Failed(EditorError),
}

#[derive(Debug)]
pub struct Editor {
    document: Option<Document>,
    status: Status,
    mapper: CoordinateMapper,
    /// Last canvas rectangle reported by the shell.
    display: Option<Rect>,
    pipeline: RenderPipeline,
    crop: CropEngine,
    interaction: InteractionStateMachine,
    throttle: Throttle,
    color: Rgba<u8>,
    settings: EditorSettings,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl Editor {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            document: None,
            status: Status::Empty,
            mapper: CoordinateMapper::new(1, 1),
            display: None,
            pipeline: RenderPipeline::new(),
            crop: CropEngine::new(),
            interaction: InteractionStateMachine::new(),
            throttle: Throttle::new(settings.preview_interval),
            color: settings.redaction_color,
            settings,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.interaction.mode()
    }

    pub fn is_dragging(&self) -> bool {
        self.interaction.is_dragging()
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    /// The buffer to show on screen, sized to the working bitmap.
    pub fn surface(&self) -> &RgbaImage {
        self.pipeline.surface()
    }

    /// Whether the surface changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        self.pipeline.take_dirty()
    }

    /// Starts a fresh session on `image`, discarding any previous document.
    pub fn load_image(&mut self, image: RgbaImage) {
        let document = Document::new(image, self.settings.max_working_size);
        let bitmap = document.bitmap();
        info!("loaded {}x{} screenshot", bitmap.width(), bitmap.height());
        self.mapper.set_bitmap_size(bitmap.width(), bitmap.height());
        // Until the shell reports a canvas, pointer input maps 1:1.
        self.mapper.set_display_rect(self.display.unwrap_or_else(|| {
            Rect::new(0.0, 0.0, f64::from(bitmap.width()), f64::from(bitmap.height()))
        }));
        self.pipeline.redraw(&document);
        self.document = Some(document);
        self.status = Status::Ready;
        self.interaction = InteractionStateMachine::new();
        self.throttle.reset();
        self.sync_guides();
    }

    pub fn load_png(&mut self, png: &[u8], crop_only: bool) -> Result<()> {
        let handoff = CaptureHandoff::new(png.to_vec(), crop_only);
        self.load_handoff(&handoff)
    }

    /// Consumes the capture entry under `key` and loads it.
    pub fn load_from_store(&mut self, store: &mut dyn KeyValueStore, key: &str) -> Result<()> {
        match CaptureHandoff::take(store, key) {
            Ok(handoff) => self.load_handoff(&handoff),
            Err(err) => Err(self.fail_load(err)),
        }
    }

    fn load_handoff(&mut self, handoff: &CaptureHandoff) -> Result<()> {
        match handoff.decode() {
            Ok(image) => {
                self.load_image(image);
                if handoff.crop_only {
                    self.interaction.activate(Tool::Crop);
                }
                Ok(())
            }
            Err(err) => Err(self.fail_load(err)),
        }
    }

    fn fail_load(&mut self, err: LoadError) -> EditorError {
        let err = EditorError::from(err);
        error!("{err}");
        self.document = None;
        self.status = Status::Failed(err.user_message());
        self.interaction = InteractionStateMachine::new();
        self.throttle.reset();
        self.pipeline.show_placeholder();
        self.mapper.set_bitmap_size(1, 1);
        err
    }

    /// Single entry point for pointer, tool and viewport input.
    pub fn dispatch(&mut self, event: InputEvent, now: Instant) -> Outcome {
        match event {
            InputEvent::Resize(rect) => {
                self.display = Some(rect);
                self.mapper.set_display_rect(rect);
                self.sync_guides();
                Outcome::Updated
            }
            InputEvent::SetColor(color) => {
                self.color = color;
                Outcome::Updated
            }
            InputEvent::Tick => self.tick(now),
            _ if self.document.is_none() => Outcome::Ignored,
            InputEvent::ActivateTool(tool) => {
                let action = self.interaction.activate(tool);
                self.perform_tool_change(action, now)
            }
            InputEvent::ToggleTool(tool) => {
                let action = self.interaction.toggle(tool);
                self.perform_tool_change(action, now)
            }
            InputEvent::DeactivateTools => {
                let action = self.interaction.deactivate();
                self.perform_tool_change(action, now)
            }
            InputEvent::PointerDown(p) => {
                let p = self.mapper.to_bitmap_space(p);
                let action = self.interaction.pointer_down(p);
                self.perform(action, now)
            }
            InputEvent::PointerMove(p) => {
                let p = self.mapper.to_bitmap_space(p);
                let action = self.interaction.pointer_move(p);
                self.perform(action, now)
            }
            InputEvent::PointerUp(p) => {
                let p = self.mapper.to_bitmap_space(p);
                let action = self.interaction.pointer_up(p);
                self.perform(action, now)
            }
            InputEvent::PointerLeave => {
                let action = self.interaction.pointer_leave();
                self.perform(action, now)
            }
        }
    }

    /// A tool change always updates the toolbar, even without a cancelled drag.
    fn perform_tool_change(&mut self, action: Action, now: Instant) -> Outcome {
        match self.perform(action, now) {
            Outcome::Ignored => Outcome::Updated,
            outcome => outcome,
        }
    }

    fn perform(&mut self, action: Action, now: Instant) -> Outcome {
        let Some(document) = self.document.as_mut() else {
            return Outcome::Ignored;
        };
        match action {
            Action::None => Outcome::Ignored,
            Action::BeginCrop(selection) => {
                self.throttle.reset();
                self.throttle.hit(now);
                self.crop.preview(&mut self.pipeline, document, selection);
                Outcome::Updated
            }
            Action::UpdateCrop(selection) => {
                if self.throttle.hit(now) {
                    self.crop.preview(&mut self.pipeline, document, selection);
                }
                Outcome::Updated
            }
            Action::CommitCrop(selection) => {
                self.throttle.reset();
                match self.crop.commit(&mut self.pipeline, document, selection) {
                    Ok(outcome) => {
                        self.interaction.finish_crop();
                        self.mapper.set_bitmap_size(outcome.width, outcome.height);
                        self.sync_guides();
                        Outcome::Cropped(outcome)
                    }
                    Err(err) => Outcome::Failed(err.into()),
                }
            }
            Action::CancelCrop => {
                self.throttle.reset();
                debug!("crop selection cancelled");
                self.crop.cancel(&mut self.pipeline, document);
                Outcome::Cancelled
            }
            Action::BeginAnnotate(selection) => {
                self.throttle.reset();
                self.throttle.hit(now);
                self.pipeline.begin_annotate_preview();
                self.pipeline.update_annotate_preview(selection.rect(), self.color);
                Outcome::Updated
            }
            Action::UpdateAnnotate(selection) => {
                if self.throttle.hit(now) {
                    self.pipeline.update_annotate_preview(selection.rect(), self.color);
                }
                Outcome::Updated
            }
            Action::CommitAnnotate(selection) => {
                self.throttle.reset();
                match document.add_element(selection.rect(), self.color) {
                    Some(id) => {
                        debug!("added redaction {id} at {:?}", selection.rect());
                        self.pipeline.redraw(document);
                        Outcome::ElementAdded(id)
                    }
                    None => {
                        debug!("annotation below minimum size discarded");
                        self.pipeline.cancel_annotate_preview();
                        Outcome::Cancelled
                    }
                }
            }
            Action::CancelAnnotate => {
                self.throttle.reset();
                self.pipeline.cancel_annotate_preview();
                Outcome::Cancelled
            }
        }
    }

    /// Draws the trailing preview of a throttled burst once it is due.
    fn tick(&mut self, now: Instant) -> Outcome {
        if !self.throttle.poll(now) {
            return Outcome::Ignored;
        }
        let (Some(document), Some(selection)) = (self.document.as_ref(), self.interaction.selection())
        else {
            return Outcome::Ignored;
        };
        match self.interaction.mode() {
            Mode::Crop => self.crop.preview(&mut self.pipeline, document, selection),
            Mode::Annotate => self
                .pipeline
                .update_annotate_preview(selection.rect(), self.color),
            Mode::None => return Outcome::Ignored,
        }
        Outcome::Updated
    }

    fn sync_guides(&mut self) {
        let (scale_x, scale_y) = self.mapper.scale();
        self.crop.set_display_scale(scale_x.max(scale_y));
    }

    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let Some(document) = self.document.as_mut() else {
            return false;
        };
        if self.interaction.is_dragging() || !document.remove_element(id) {
            return false;
        }
        self.pipeline.redraw(document);
        true
    }

    pub fn clear_elements(&mut self) {
        if self.interaction.is_dragging() {
            return;
        }
        if let Some(document) = self.document.as_mut() {
            document.clear_elements();
            self.pipeline.redraw(document);
        }
    }

    /// Flattens the document for export. An in-progress drag blocks export;
    /// an idle crop mode is left first.
    pub fn flatten(&mut self) -> Result<RgbaImage> {
        let Some(document) = self.document.as_ref() else {
            return Err(ExportError::NoDocument.into());
        };
        if self.interaction.is_dragging() {
            return Err(ExportError::GestureInProgress.into());
        }
        if self.interaction.mode() == Mode::Crop {
            self.interaction.deactivate();
            self.pipeline.redraw(document);
        }
        Ok(render::render_export(document))
    }

    /// Flattens and hands the result to `sink`. Failures leave the editor as
    /// it was.
    pub fn export_to(&mut self, sink: &mut dyn ExportSink) -> Result<String> {
        let image = self.flatten()?;
        sink.deliver(&image).map_err(|err| {
            warn!("export failed: {err}");
            EditorError::from(err)
        })
    }

    /// Crops to a rectangle given directly in bitmap space.
    pub fn crop_to(&mut self, rect: Rect) -> Result<CropOutcome> {
        let Some(document) = self.document.as_mut() else {
            return Err(CropError::NoDocument.into());
        };
        if self.interaction.is_dragging() {
            return Err(CropError::GestureInProgress.into());
        }
        let selection = Selection {
            start: Point::new(rect.x, rect.y),
            end: Point::new(rect.right(), rect.bottom()),
        };
        let outcome = self.crop.commit(&mut self.pipeline, document, selection)?;
        self.interaction.finish_crop();
        self.mapper.set_bitmap_size(outcome.width, outcome.height);
        self.sync_guides();
        Ok(outcome)
    }
}
