//! Pointer-driven orbit camera.
//!
//! Window events are reduced to [`PointerEvent`]s first so the state machine
//! can be driven without a window.

use crate::camera::CameraPose;
use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Pointer input, already stripped of winit details.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Pressed { button: DragButton, at: Vec2 },
    Moved(Vec2),
    Released,
    /// Scroll in lines; positive zooms in.
    Wheel(f32),
}

/// Which gesture a press starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragButton {
    Orbit,
    Pan,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { button: DragButton, last: Vec2 },
}

#[derive(Debug)]
pub struct OrbitController {
    state: DragState,
    cursor: Option<Vec2>,
    rotation_sensitivity: f32,
    pan_sensitivity: f32,
    zoom_sensitivity: f32,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
            cursor: None,
            rotation_sensitivity: 0.005,
            pan_sensitivity: 0.0025,
            zoom_sensitivity: 0.1,
        }
    }
}

impl OrbitController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Translate a window event, tracking the cursor for later presses.
    pub fn pointer_event(&mut self, event: &WindowEvent) -> Option<PointerEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let at = Vec2::new(position.x as f32, position.y as f32);
                self.cursor = Some(at);
                Some(PointerEvent::Moved(at))
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => DragButton::Orbit,
                    MouseButton::Middle | MouseButton::Right => DragButton::Pan,
                    _ => return None,
                };
                match state {
                    ElementState::Pressed => Some(PointerEvent::Pressed {
                        button,
                        at: self.cursor?,
                    }),
                    ElementState::Released => Some(PointerEvent::Released),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => Some(PointerEvent::Wheel(match delta {
                MouseScrollDelta::LineDelta(_, y) => *y,
                MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
            })),
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                Some(PointerEvent::Released)
            }
            _ => None,
        }
    }

    /// Advance the state machine. Returns whether the pose changed.
    pub fn handle(&mut self, event: PointerEvent, pose: &mut CameraPose) -> bool {
        match (self.state, event) {
            (DragState::Idle, PointerEvent::Pressed { button, at }) => {
                self.state = DragState::Dragging { button, last: at };
                false
            }
            (DragState::Dragging { button, last }, PointerEvent::Moved(at)) => {
                let delta = at - last;
                self.state = DragState::Dragging { button, last: at };
                match button {
                    DragButton::Orbit => pose.orbit_around_center(delta, self.rotation_sensitivity),
                    DragButton::Pan => pose.pan(delta, self.pan_sensitivity),
                }
                delta != Vec2::ZERO
            }
            (DragState::Dragging { .. }, PointerEvent::Released) => {
                self.state = DragState::Idle;
                false
            }
            (_, PointerEvent::Wheel(lines)) => {
                pose.zoom(-lines * self.zoom_sensitivity * pose.distance());
                lines != 0.0
            }
            _ => false,
        }
    }

    /// Feed a window event straight through. Returns whether it was consumed.
    pub fn process_event(&mut self, event: &WindowEvent, pose: &mut CameraPose) -> bool {
        match self.pointer_event(event) {
            Some(pointer) => {
                self.handle(pointer, pose);
                true
            }
            None => false,
        }
    }

    /// Forget any drag in progress, e.g. after the camera is reframed.
    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn pose() -> CameraPose {
        CameraPose::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO)
    }

    #[test]
    fn test_moves_while_idle_do_nothing() {
        let mut controller = OrbitController::new();
        let mut p = pose();
        let before = p;
        assert!(!controller.handle(PointerEvent::Moved(Vec2::new(50.0, 50.0)), &mut p));
        assert_eq!(p, before);
        assert_eq!(controller.state(), DragState::Idle);
    }

    #[test]
    fn test_drag_changes_yaw_and_pitch() {
        let mut controller = OrbitController::new();
        let mut p = pose();
        controller.handle(
            PointerEvent::Pressed {
                button: DragButton::Orbit,
                at: Vec2::new(100.0, 100.0),
            },
            &mut p,
        );
        assert!(matches!(controller.state(), DragState::Dragging { .. }));

        let before = p;
        assert!(controller.handle(PointerEvent::Moved(Vec2::new(140.0, 90.0)), &mut p));
        assert!(p.yaw < before.yaw);
        assert!(p.pitch > before.pitch);

        controller.handle(PointerEvent::Released, &mut p);
        assert_eq!(controller.state(), DragState::Idle);
        let after_release = p;
        controller.handle(PointerEvent::Moved(Vec2::new(400.0, 400.0)), &mut p);
        assert_eq!(p, after_release);
    }

    #[test]
    fn test_pitch_stays_clamped() {
        let mut controller = OrbitController::new();
        let mut p = pose();
        controller.handle(
            PointerEvent::Pressed {
                button: DragButton::Orbit,
                at: Vec2::ZERO,
            },
            &mut p,
        );
        controller.handle(PointerEvent::Moved(Vec2::new(0.0, -100_000.0)), &mut p);
        assert!(p.pitch < std::f32::consts::FRAC_PI_2);
        controller.handle(PointerEvent::Moved(Vec2::new(0.0, 100_000.0)), &mut p);
        assert!(p.pitch > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_pan_moves_center_not_angles() {
        let mut controller = OrbitController::new();
        let mut p = pose();
        controller.handle(
            PointerEvent::Pressed {
                button: DragButton::Pan,
                at: Vec2::ZERO,
            },
            &mut p,
        );
        let before = p;
        controller.handle(PointerEvent::Moved(Vec2::new(20.0, 0.0)), &mut p);
        assert_eq!((p.yaw, p.pitch), (before.yaw, before.pitch));
        assert!(p.center.x < 0.0);
    }

    #[test]
    fn test_wheel_zooms_in() {
        let mut controller = OrbitController::new();
        let mut p = pose();
        assert!(controller.handle(PointerEvent::Wheel(1.0), &mut p));
        assert!(p.distance() < 10.0);
        assert_eq!(controller.state(), DragState::Idle);
    }
}
