//! Tool selection and pointer gesture state.
//!
//! The state machine never touches the document. Each input produces an
//! [`Action`] the editor carries out, which keeps every transition testable
//! on its own.

use crate::geometry::{Point, Rect};

/// A drawing tool the user can activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Crop,
    Annotate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    None,
    Crop,
    Annotate,
}

impl From<Tool> for Mode {
    fn from(tool: Tool) -> Self {
        match tool {
            Tool::Crop => Self::Crop,
            Tool::Annotate => Self::Annotate,
        }
    }
}

/// Anchor and current pointer of an in-progress drag, in bitmap space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub start: Point,
    pub end: Point,
}

impl Selection {
    pub fn at(point: Point) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Dragging(Selection),
}

/// Work the editor has to perform in response to an input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    None,
    BeginCrop(Selection),
    UpdateCrop(Selection),
    CommitCrop(Selection),
    CancelCrop,
    BeginAnnotate(Selection),
    UpdateAnnotate(Selection),
    CommitAnnotate(Selection),
    CancelAnnotate,
}

#[derive(Debug, Clone, Default)]
pub struct InteractionStateMachine {
    mode: Mode,
    gesture: Gesture,
}

impl InteractionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.gesture, Gesture::Dragging(_))
    }

    pub fn selection(&self) -> Option<Selection> {
        match self.gesture {
            Gesture::Dragging(selection) => Some(selection),
            Gesture::Idle => None,
        }
    }

    /// Makes `tool` the only active tool. A drag of the previously active tool
    /// is cancelled first.
    pub fn activate(&mut self, tool: Tool) -> Action {
        let cancelled = if self.mode != Mode::from(tool) {
            self.cancel_gesture()
        } else {
            Action::None
        };
        self.mode = tool.into();
        cancelled
    }

    /// Activates `tool`, or returns to [`Mode::None`] when it is already active.
    pub fn toggle(&mut self, tool: Tool) -> Action {
        if self.mode == Mode::from(tool) {
            self.deactivate()
        } else {
            self.activate(tool)
        }
    }

    pub fn deactivate(&mut self) -> Action {
        let cancelled = self.cancel_gesture();
        self.mode = Mode::None;
        cancelled
    }

    pub fn pointer_down(&mut self, point: Point) -> Action {
        if self.is_dragging() {
            return Action::None;
        }
        let selection = Selection::at(point);
        match self.mode {
            Mode::None => Action::None,
            Mode::Crop => {
                self.gesture = Gesture::Dragging(selection);
                Action::BeginCrop(selection)
            }
            Mode::Annotate => {
                self.gesture = Gesture::Dragging(selection);
                Action::BeginAnnotate(selection)
            }
        }
    }

    pub fn pointer_move(&mut self, point: Point) -> Action {
        let Gesture::Dragging(ref mut selection) = self.gesture else {
            return Action::None;
        };
        selection.end = point;
        let selection = *selection;
        match self.mode {
            Mode::Crop => Action::UpdateCrop(selection),
            Mode::Annotate => Action::UpdateAnnotate(selection),
            Mode::None => Action::None,
        }
    }

    pub fn pointer_up(&mut self, point: Point) -> Action {
        let Gesture::Dragging(mut selection) = self.gesture else {
            return Action::None;
        };
        selection.end = point;
        self.gesture = Gesture::Idle;
        match self.mode {
            Mode::Crop => Action::CommitCrop(selection),
            Mode::Annotate => Action::CommitAnnotate(selection),
            Mode::None => Action::None,
        }
    }

    /// Leaving the canvas cancels the drag but keeps the mode.
    pub fn pointer_leave(&mut self) -> Action {
        self.cancel_gesture()
    }

    /// Ends a committed crop: crop mode is left once the crop succeeded.
    pub fn finish_crop(&mut self) {
        if self.mode == Mode::Crop {
            self.gesture = Gesture::Idle;
            self.mode = Mode::None;
        }
    }

    fn cancel_gesture(&mut self) -> Action {
        if !self.is_dragging() {
            return Action::None;
        }
        self.gesture = Gesture::Idle;
        match self.mode {
            Mode::Crop => Action::CancelCrop,
            Mode::Annotate => Action::CancelAnnotate,
            Mode::None => Action::None,
        }
    }
}
