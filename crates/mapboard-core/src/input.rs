//! Gesture routing for pointer, touch and wheel input.
//!
//! The router only tracks pointers and decides what an event means; the
//! canvas applies the resulting [`GestureAction`] to the viewport or the
//! tool engine.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Map a DOM-style button index (0 primary, 1 middle, 2 secondary).
    pub fn from_index(index: i16) -> Self {
        match index {
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Left,
        }
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
}

/// One pointer sample in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub pointer_id: i64,
    pub position: Point,
    pub button: MouseButton,
    pub modifiers: Modifiers,
}

impl PointerInput {
    pub fn new(pointer_id: i64, position: Point) -> Self {
        Self {
            pointer_id,
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Ctrl/meta or the middle button turn a press into a pan.
    pub fn wants_pan(&self) -> bool {
        self.modifiers.ctrl || self.modifiers.meta || self.button == MouseButton::Middle
    }
}

/// Pointer event type for unified mouse/touch handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down(PointerInput),
    Move(PointerInput),
    Up(PointerInput),
    /// Treated exactly like `Up`.
    Cancel(PointerInput),
}

/// Wheel input at a cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelInput {
    pub delta_y: f64,
    pub position: Point,
}

/// What the current pointers are doing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureMode {
    #[default]
    Idle,
    Panning { pointer_id: i64, last: Point },
    Drawing { pointer_id: i64 },
    /// Two-finger zoom. `initial_distance` is `None` until a usable
    /// baseline has been measured.
    Pinching {
        initial_distance: Option<f64>,
        initial_scale: f64,
    },
}

/// Outcome of routing one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureAction {
    None,
    /// Add a screen-space delta to the viewport offset.
    Pan(Vec2),
    /// Set an absolute zoom factor anchored at a screen point.
    ZoomTo { scale: f64, anchor: Point },
    /// Multiply the zoom factor, anchored at a screen point.
    ZoomBy { factor: f64, anchor: Point },
    DrawBegin(Point),
    DrawMove(Point),
    DrawEnd,
    /// A second pointer arrived while drawing.
    DrawInterrupt,
}

/// Tracks active pointers and turns raw input into gestures.
#[derive(Debug, Clone)]
pub struct GestureRouter {
    /// Active pointers in press order.
    pointers: Vec<(i64, Point)>,
    mode: GestureMode,
    wheel_zoom_factor: f64,
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(1.12)
    }
}

impl GestureRouter {
    pub fn new(wheel_zoom_factor: f64) -> Self {
        Self {
            pointers: Vec::new(),
            mode: GestureMode::Idle,
            wheel_zoom_factor,
        }
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    /// Route a pointer event. `current_scale` seeds a pinch baseline.
    pub fn handle_pointer(&mut self, event: PointerEvent, current_scale: f64) -> GestureAction {
        match event {
            PointerEvent::Down(input) => self.pointer_down(input, current_scale),
            PointerEvent::Move(input) => self.pointer_move(input, current_scale),
            PointerEvent::Up(input) | PointerEvent::Cancel(input) => self.pointer_up(input),
        }
    }

    /// Route a wheel notch into a cursor-anchored zoom step.
    pub fn handle_wheel(&self, wheel: WheelInput) -> GestureAction {
        if !wheel.delta_y.is_finite() {
            return GestureAction::None;
        }
        let factor = if wheel.delta_y > 0.0 {
            1.0 / self.wheel_zoom_factor
        } else {
            self.wheel_zoom_factor
        };
        GestureAction::ZoomBy {
            factor,
            anchor: wheel.position,
        }
    }

    fn pointer_down(&mut self, input: PointerInput, current_scale: f64) -> GestureAction {
        if !is_finite(input.position) {
            return GestureAction::None;
        }
        match self.pointers.iter_mut().find(|(id, _)| *id == input.pointer_id) {
            Some(entry) => entry.1 = input.position,
            None => self.pointers.push((input.pointer_id, input.position)),
        }

        match self.pointers.len() {
            1 => {
                if input.wants_pan() {
                    self.mode = GestureMode::Panning {
                        pointer_id: input.pointer_id,
                        last: input.position,
                    };
                    GestureAction::None
                } else {
                    self.mode = GestureMode::Drawing {
                        pointer_id: input.pointer_id,
                    };
                    GestureAction::DrawBegin(input.position)
                }
            }
            2 => {
                let was_drawing = matches!(self.mode, GestureMode::Drawing { .. });
                self.mode = GestureMode::Pinching {
                    initial_distance: self.pinch_distance(),
                    initial_scale: current_scale,
                };
                if was_drawing {
                    GestureAction::DrawInterrupt
                } else {
                    GestureAction::None
                }
            }
            _ => GestureAction::None,
        }
    }

    fn pointer_move(&mut self, input: PointerInput, current_scale: f64) -> GestureAction {
        if !is_finite(input.position) {
            return GestureAction::None;
        }
        let Some(entry) = self.pointers.iter_mut().find(|(id, _)| *id == input.pointer_id) else {
            return GestureAction::None;
        };
        entry.1 = input.position;

        match &mut self.mode {
            GestureMode::Idle => GestureAction::None,
            GestureMode::Panning { pointer_id, last } => {
                if *pointer_id != input.pointer_id {
                    return GestureAction::None;
                }
                let delta = input.position - *last;
                *last = input.position;
                GestureAction::Pan(delta)
            }
            GestureMode::Drawing { pointer_id } => {
                if *pointer_id != input.pointer_id {
                    return GestureAction::None;
                }
                GestureAction::DrawMove(input.position)
            }
            GestureMode::Pinching { .. } if self.pointers.len() != 2 => GestureAction::None,
            GestureMode::Pinching {
                initial_distance,
                initial_scale,
            } => {
                let (Some(distance), Some(midpoint)) = (pinch_distance(&self.pointers), pinch_midpoint(&self.pointers))
                else {
                    return GestureAction::None;
                };
                match *initial_distance {
                    Some(initial) => GestureAction::ZoomTo {
                        scale: *initial_scale * distance / initial,
                        anchor: midpoint,
                    },
                    None => {
                        *initial_distance = Some(distance);
                        *initial_scale = current_scale;
                        GestureAction::None
                    }
                }
            }
        }
    }

    fn pointer_up(&mut self, input: PointerInput) -> GestureAction {
        let Some(index) = self.pointers.iter().position(|(id, _)| *id == input.pointer_id) else {
            return GestureAction::None;
        };
        self.pointers.remove(index);

        match self.mode {
            GestureMode::Drawing { pointer_id } if pointer_id == input.pointer_id => {
                self.mode = GestureMode::Idle;
                GestureAction::DrawEnd
            }
            GestureMode::Panning { pointer_id, .. } if pointer_id == input.pointer_id => {
                self.mode = GestureMode::Idle;
                GestureAction::None
            }
            GestureMode::Pinching { initial_scale, .. } => {
                if self.pointers.len() < 2 {
                    self.mode = GestureMode::Idle;
                } else {
                    // The pinch pair changed; measure a fresh baseline on the next move.
                    self.mode = GestureMode::Pinching {
                        initial_distance: None,
                        initial_scale,
                    };
                }
                GestureAction::None
            }
            _ => GestureAction::None,
        }
    }

    fn pinch_distance(&self) -> Option<f64> {
        pinch_distance(&self.pointers)
    }
}

/// Distance between the first two pointers, if it is usable as a baseline.
fn pinch_distance(pointers: &[(i64, Point)]) -> Option<f64> {
    match pointers {
        [(_, a), (_, b), ..] => Some(a.distance(*b)).filter(|d| *d > f64::EPSILON),
        _ => None,
    }
}

fn pinch_midpoint(pointers: &[(i64, Point)]) -> Option<Point> {
    match pointers {
        [(_, a), (_, b), ..] => Some(a.midpoint(*b)),
        _ => None,
    }
}

fn is_finite(point: Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(id: i64, x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down(PointerInput::new(id, Point::new(x, y)))
    }

    fn mv(id: i64, x: f64, y: f64) -> PointerEvent {
        PointerEvent::Move(PointerInput::new(id, Point::new(x, y)))
    }

    fn up(id: i64) -> PointerEvent {
        PointerEvent::Up(PointerInput::new(id, Point::ZERO))
    }

    #[test]
    fn test_single_pointer_draws() {
        let mut router = GestureRouter::default();
        assert_eq!(router.handle_pointer(down(1, 10.0, 10.0), 1.0), GestureAction::DrawBegin(Point::new(10.0, 10.0)));
        assert_eq!(router.handle_pointer(mv(1, 20.0, 15.0), 1.0), GestureAction::DrawMove(Point::new(20.0, 15.0)));
        assert_eq!(router.handle_pointer(up(1), 1.0), GestureAction::DrawEnd);
        assert_eq!(router.mode(), GestureMode::Idle);
    }

    #[test]
    fn test_cancel_behaves_like_up() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 0.0, 0.0), 1.0);
        let cancel = PointerEvent::Cancel(PointerInput::new(1, Point::ZERO));
        assert_eq!(router.handle_pointer(cancel, 1.0), GestureAction::DrawEnd);
    }

    #[test]
    fn test_modifier_and_middle_button_pan() {
        let mut router = GestureRouter::default();
        let ctrl = PointerInput::new(1, Point::new(5.0, 5.0)).with_modifiers(Modifiers { ctrl: true, meta: false });
        assert_eq!(router.handle_pointer(PointerEvent::Down(ctrl), 1.0), GestureAction::None);
        assert_eq!(router.handle_pointer(mv(1, 8.0, 1.0), 1.0), GestureAction::Pan(Vec2::new(3.0, -4.0)));
        assert_eq!(router.handle_pointer(mv(1, 9.0, 1.0), 1.0), GestureAction::Pan(Vec2::new(1.0, 0.0)));
        assert_eq!(router.handle_pointer(up(1), 1.0), GestureAction::None);

        let middle = PointerInput::new(2, Point::ZERO).with_button(MouseButton::from_index(1));
        router.handle_pointer(PointerEvent::Down(middle), 1.0);
        assert!(matches!(router.mode(), GestureMode::Panning { pointer_id: 2, .. }));
    }

    #[test]
    fn test_pinch_from_100_to_200_doubles_scale() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 0.0, 0.0), 1.0);
        assert_eq!(router.handle_pointer(down(2, 100.0, 0.0), 1.0), GestureAction::DrawInterrupt);

        let action = router.handle_pointer(mv(2, 200.0, 0.0), 1.0);
        let GestureAction::ZoomTo { scale, anchor } = action else {
            panic!("expected zoom, got {action:?}");
        };
        assert!((scale - 2.0).abs() < 1e-12);
        assert_eq!(anchor, Point::new(100.0, 0.0));
    }

    #[test]
    fn test_pinch_uses_initial_scale() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 0.0, 0.0), 1.5);
        router.handle_pointer(down(2, 0.0, 100.0), 1.5);
        let action = router.handle_pointer(mv(1, 0.0, 50.0), 1.5);
        assert_eq!(
            action,
            GestureAction::ZoomTo {
                scale: 0.75,
                anchor: Point::new(0.0, 75.0)
            }
        );
    }

    #[test]
    fn test_coincident_pinch_waits_for_baseline() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 10.0, 10.0), 1.0);
        router.handle_pointer(down(2, 10.0, 10.0), 1.0);
        assert_eq!(router.handle_pointer(mv(2, 60.0, 10.0), 1.0), GestureAction::None);
        let action = router.handle_pointer(mv(2, 110.0, 10.0), 1.0);
        assert!(matches!(action, GestureAction::ZoomTo { scale, .. } if (scale - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_lifting_one_pinch_finger_does_not_draw() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 0.0, 0.0), 1.0);
        router.handle_pointer(down(2, 50.0, 0.0), 1.0);
        assert_eq!(router.handle_pointer(up(2), 1.0), GestureAction::None);
        assert_eq!(router.mode(), GestureMode::Idle);
        assert_eq!(router.handle_pointer(mv(1, 5.0, 5.0), 1.0), GestureAction::None);
        assert_eq!(router.handle_pointer(up(1), 1.0), GestureAction::None);
        assert_eq!(router.pointer_count(), 0);
    }

    #[test]
    fn test_third_pointer_is_only_tracked() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 0.0, 0.0), 1.0);
        router.handle_pointer(down(2, 100.0, 0.0), 1.0);
        assert_eq!(router.handle_pointer(down(3, 300.0, 300.0), 1.0), GestureAction::None);
        assert_eq!(router.pointer_count(), 3);
        assert_eq!(router.handle_pointer(mv(3, 400.0, 400.0), 1.0), GestureAction::None);
        assert!(matches!(router.mode(), GestureMode::Pinching { .. }));
    }

    #[test]
    fn test_pinch_pair_change_keeps_current_scale() {
        let mut router = GestureRouter::default();
        router.handle_pointer(down(1, 0.0, 0.0), 1.0);
        router.handle_pointer(down(2, 100.0, 0.0), 1.0);
        let action = router.handle_pointer(mv(2, 200.0, 0.0), 1.0);
        assert!(matches!(action, GestureAction::ZoomTo { scale, .. } if (scale - 2.0).abs() < 1e-12));

        router.handle_pointer(down(3, 200.0, 100.0), 2.0);
        router.handle_pointer(up(1), 2.0);
        // Fresh baseline between pointers 2 and 3, seeded from the live scale.
        assert_eq!(router.handle_pointer(mv(3, 200.0, 101.0), 2.0), GestureAction::None);
        let action = router.handle_pointer(mv(3, 200.0, 102.0), 2.0);
        let GestureAction::ZoomTo { scale, .. } = action else {
            panic!("expected zoom, got {action:?}");
        };
        assert!((scale - 2.0 * 102.0 / 101.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_pointer_is_ignored() {
        let mut router = GestureRouter::default();
        assert_eq!(router.handle_pointer(mv(9, 1.0, 1.0), 1.0), GestureAction::None);
        assert_eq!(router.handle_pointer(up(9), 1.0), GestureAction::None);
    }

    #[test]
    fn test_wheel_direction() {
        let router = GestureRouter::default();
        let at = Point::new(40.0, 30.0);
        let out = router.handle_wheel(WheelInput { delta_y: 120.0, position: at });
        assert!(matches!(out, GestureAction::ZoomBy { factor, anchor } if (factor - 1.0 / 1.12).abs() < 1e-12 && anchor == at));
        let zoom_in = router.handle_wheel(WheelInput { delta_y: -3.0, position: at });
        assert!(matches!(zoom_in, GestureAction::ZoomBy { factor, .. } if (factor - 1.12).abs() < 1e-12));
        let flat = router.handle_wheel(WheelInput { delta_y: 0.0, position: at });
        assert!(matches!(flat, GestureAction::ZoomBy { factor, .. } if (factor - 1.12).abs() < 1e-12));
        assert_eq!(router.handle_wheel(WheelInput { delta_y: f64::NAN, position: at }), GestureAction::None);
    }
}
