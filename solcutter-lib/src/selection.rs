//! Drag-to-select crop overlay, independent of any rendering toolkit
//!
//! The overlay covers the video preview. While crop mode is enabled, a
//! primary-button drag draws a rectangle; releasing commits it unless it is
//! smaller than [`MIN_SELECTION_PX`] in either dimension, in which case it is
//! discarded as an accidental click.

use crate::types::CropRect;

/// Selections narrower or shorter than this many display pixels are noise
pub const MIN_SELECTION_PX: f64 = 10.0;

/// A point in overlay (display) coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in overlay coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewRect {
    /// The normalized rectangle spanned by two corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    fn clamped(self, view_width: f64, view_height: f64) -> Self {
        let x = self.x.clamp(0.0, view_width);
        let y = self.y.clamp(0.0, view_height);
        Self {
            x,
            y,
            width: (self.x + self.width).clamp(0.0, view_width) - x,
            height: (self.y + self.height).clamp(0.0, view_height) - y,
        }
    }
}

/// Pointer buttons the overlay distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Other,
}

/// Pointer input fed to the selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Button, Point),
    Move(Point),
    Up(Button, Point),
}

/// Selection state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    Idle,
    Dragging { origin: Point, current: ViewRect },
    Committed(ViewRect),
}

/// Crop overlay state machine: `Idle -> Dragging -> Committed`
#[derive(Debug, Clone)]
pub struct CropSelector {
    enabled: bool,
    state: SelectionState,
    view_width: f64,
    view_height: f64,
}

impl CropSelector {
    pub fn new(view_width: f64, view_height: f64) -> Self {
        Self {
            enabled: false,
            state: SelectionState::Idle,
            view_width,
            view_height,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Turn crop mode on or off.
    ///
    /// Enabling seeds a hint rectangle in the middle of the view (30% offset,
    /// 40% size) so the user sees where the selection goes; disabling drops
    /// any selection.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.state = if enabled && self.view_width > 0.0 && self.view_height > 0.0 {
            SelectionState::Committed(ViewRect {
                x: (self.view_width * 0.3).trunc(),
                y: (self.view_height * 0.3).trunc(),
                width: (self.view_width * 0.4).trunc(),
                height: (self.view_height * 0.4).trunc(),
            })
        } else {
            SelectionState::Idle
        };
    }

    /// Feed one pointer event. Ignored while crop mode is off.
    pub fn handle(&mut self, event: PointerEvent) {
        if !self.enabled {
            return;
        }
        match (self.state, event) {
            (_, PointerEvent::Down(Button::Primary, p)) => {
                self.state = SelectionState::Dragging {
                    origin: p,
                    current: ViewRect::from_corners(p, p),
                };
            }
            (SelectionState::Dragging { origin, .. }, PointerEvent::Move(p)) => {
                self.state = SelectionState::Dragging {
                    origin,
                    current: ViewRect::from_corners(origin, p),
                };
            }
            (SelectionState::Dragging { origin, .. }, PointerEvent::Up(Button::Primary, p)) => {
                let rect = ViewRect::from_corners(origin, p);
                self.state = if rect.width < MIN_SELECTION_PX || rect.height < MIN_SELECTION_PX {
                    tracing::debug!(?rect, "selection too small, discarded");
                    SelectionState::Idle
                } else {
                    SelectionState::Committed(rect)
                };
            }
            _ => {}
        }
    }

    /// The rectangle to draw, if any.
    pub fn visible_rect(&self) -> Option<ViewRect> {
        if !self.enabled {
            return None;
        }
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Dragging { current, .. } => Some(current),
            SelectionState::Committed(rect) => Some(rect),
        }
    }

    /// The committed selection normalized to the view size.
    pub fn normalized_rect(&self) -> Option<CropRect> {
        if !self.enabled || self.view_width <= 0.0 || self.view_height <= 0.0 {
            return None;
        }
        let SelectionState::Committed(rect) = self.state else {
            return None;
        };
        let r = rect.clamped(self.view_width, self.view_height);
        Some(CropRect::new(
            r.x / self.view_width,
            r.y / self.view_height,
            r.width / self.view_width,
            r.height / self.view_height,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(sel: &mut CropSelector, from: (f64, f64), to: (f64, f64)) {
        sel.handle(PointerEvent::Down(Button::Primary, Point::new(from.0, from.1)));
        sel.handle(PointerEvent::Move(Point::new(to.0, to.1)));
        sel.handle(PointerEvent::Up(Button::Primary, Point::new(to.0, to.1)));
    }

    #[test]
    fn test_disabled_selector_ignores_input() {
        let mut sel = CropSelector::new(800.0, 600.0);
        drag(&mut sel, (10.0, 10.0), (200.0, 200.0));
        assert_eq!(sel.state(), SelectionState::Idle);
        assert_eq!(sel.normalized_rect(), None);
    }

    #[test]
    fn test_enable_seeds_hint_rect() {
        let mut sel = CropSelector::new(800.0, 600.0);
        sel.set_enabled(true);
        let rect = sel.normalized_rect().unwrap();
        assert!((rect.x - 0.3).abs() < 1e-9);
        assert!((rect.y - 0.3).abs() < 1e-9);
        assert!((rect.width - 0.4).abs() < 1e-9);
        assert!((rect.height - 0.4).abs() < 1e-9);

        sel.set_enabled(false);
        assert_eq!(sel.state(), SelectionState::Idle);
        assert_eq!(sel.visible_rect(), None);
    }

    #[test]
    fn test_drag_commits_normalized_rect() {
        let mut sel = CropSelector::new(800.0, 400.0);
        sel.set_enabled(true);
        drag(&mut sel, (600.0, 300.0), (200.0, 100.0));
        assert_eq!(
            sel.normalized_rect(),
            Some(CropRect::new(0.25, 0.25, 0.5, 0.5))
        );
    }

    #[test]
    fn test_move_updates_dragging_rect() {
        let mut sel = CropSelector::new(800.0, 400.0);
        sel.set_enabled(true);
        sel.handle(PointerEvent::Down(Button::Primary, Point::new(100.0, 100.0)));
        sel.handle(PointerEvent::Move(Point::new(150.0, 180.0)));
        match sel.state() {
            SelectionState::Dragging { current, .. } => {
                assert_eq!(current, ViewRect { x: 100.0, y: 100.0, width: 50.0, height: 80.0 });
            }
            other => panic!("expected dragging, got {:?}", other),
        }
        // Not committed until release.
        assert_eq!(sel.normalized_rect(), None);
    }

    #[test]
    fn test_small_selection_discarded() {
        let mut sel = CropSelector::new(800.0, 600.0);
        sel.set_enabled(true);
        drag(&mut sel, (100.0, 100.0), (105.0, 300.0));
        assert_eq!(sel.state(), SelectionState::Idle);
        assert_eq!(sel.normalized_rect(), None);
    }

    #[test]
    fn test_other_button_ignored() {
        let mut sel = CropSelector::new(800.0, 600.0);
        sel.set_enabled(true);
        let before = sel.state();
        sel.handle(PointerEvent::Down(Button::Other, Point::new(1.0, 1.0)));
        assert_eq!(sel.state(), before);
    }

    #[test]
    fn test_drag_outside_view_is_clamped() {
        let mut sel = CropSelector::new(100.0, 100.0);
        sel.set_enabled(true);
        drag(&mut sel, (50.0, 50.0), (150.0, 120.0));
        let rect = sel.normalized_rect().unwrap();
        assert_eq!(rect, CropRect::new(0.5, 0.5, 0.5, 0.5));
    }
}
