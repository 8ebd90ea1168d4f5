//! Input source: drag-and-drop and explicit-pick events.
//!
//! The platform's file picker and drop target are outside this crate; they
//! report what happened as [`InputEvent`]s. [`DropZone`] folds those events
//! into the one piece of state the presentation layer cares about (is a drag
//! hovering?) and yields at most one file per event.

use crate::request::SourceFile;
use tracing::debug;

/// A raw event from the file picker or drop target.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// A drag entered (or moved over) the drop target.
    DragEnter,
    /// The drag left without dropping.
    DragLeave,
    /// Files were dropped. Only the first is used.
    Drop(Vec<SourceFile>),
    /// The picker closed, with or without a selection.
    Pick(Option<SourceFile>),
}

/// Drag-over tracking plus single-file extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropZone {
    drag_over: bool,
}

impl DropZone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drag_over(&self) -> bool {
        self.drag_over
    }

    /// Apply an event and return the file it carries, if any.
    pub fn apply(&mut self, event: InputEvent) -> Option<SourceFile> {
        match event {
            InputEvent::DragEnter => {
                self.drag_over = true;
                None
            }
            InputEvent::DragLeave => {
                self.drag_over = false;
                None
            }
            InputEvent::Drop(files) => {
                self.drag_over = false;
                if files.len() > 1 {
                    debug!("Multi-file drop: ignoring {} extra file(s)", files.len() - 1);
                }
                files.into_iter().next()
            }
            InputEvent::Pick(file) => file,
        }
    }
}
