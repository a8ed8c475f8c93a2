use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec2, Vec3};
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

/// Vertical field of view in degrees.
pub const FOV_Y_DEGREES: f32 = 95.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;
/// Eye position at startup, looking at the galaxy center.
pub const INITIAL_EYE: Vec3 = Vec3::new(3.0, 6.0, 2.0);

const MIN_PITCH: f32 = -FRAC_PI_2 + 0.01;
const MAX_PITCH: f32 = FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 90.0;
/// Distance multiplier applied per scroll step; steps inward shrink it.
const ZOOM_STEP: f32 = 0.95;
/// Exponential approach rate toward the drag targets, per second.
const DAMPING_RATE: f32 = 5.0;
const ROTATE_SENSITIVITY: f32 = 0.005;

/// Damped orbit camera around the world origin.
///
/// Dragging with the left button and scrolling move target angles and a
/// target distance; [`OrbitCamera::update`] eases the actual state toward
/// those targets every frame, which gives the motion its glide.
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub target_yaw: f32,
    pub target_pitch: f32,
    pub target_distance: f32,
    aspect: f32,
    dragging: bool,
    last_mouse_pos: Option<PhysicalPosition<f64>>,
    accumulated_drag: Vec2,
    accumulated_scroll: f32,
}

impl OrbitCamera {
    /// Creates a camera whose current and target state both match `eye`,
    /// looking at the origin.
    pub fn looking_from(eye: Vec3, aspect: f32) -> Self {
        let distance = eye.length().clamp(MIN_DISTANCE, MAX_DISTANCE);
        let pitch = if distance > 0.0 {
            (eye.y / distance).clamp(-1.0, 1.0).asin()
        } else {
            0.0
        };
        let yaw = eye.z.atan2(eye.x);
        Self {
            yaw,
            pitch,
            distance,
            target_yaw: yaw,
            target_pitch: pitch,
            target_distance: distance,
            aspect,
            dragging: false,
            last_mouse_pos: None,
            accumulated_drag: Vec2::ZERO,
            accumulated_scroll: 0.0,
        }
    }

    /// Current eye position in world space.
    pub fn eye(&self) -> Vec3 {
        Vec3::new(
            self.pitch.cos() * self.yaw.cos(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.sin(),
        ) * self.distance
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            FOV_Y_DEGREES.to_radians(),
            self.aspect.max(0.01),
            NEAR_PLANE,
            FAR_PLANE,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Left button starts and stops the orbit drag.
    pub fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Left {
            self.dragging = state == ElementState::Pressed;
            if !self.dragging {
                self.last_mouse_pos = None;
            }
        }
    }

    pub fn handle_mouse_move(&mut self, position: PhysicalPosition<f64>) {
        if self.dragging {
            if let Some(last) = self.last_mouse_pos {
                self.accumulated_drag.x += (position.x - last.x) as f32;
                self.accumulated_drag.y += (position.y - last.y) as f32;
            }
            self.last_mouse_pos = Some(position);
        }
    }

    pub fn handle_scroll(&mut self, delta: MouseScrollDelta) {
        self.accumulated_scroll += match delta {
            MouseScrollDelta::LineDelta(_x, y) => y,
            MouseScrollDelta::PixelDelta(pos) => (pos.y / 100.0) as f32,
        };
    }

    /// Consumes accumulated input and eases the camera toward its targets.
    pub fn update(&mut self, dt: f32) {
        if self.accumulated_drag != Vec2::ZERO {
            self.target_yaw += self.accumulated_drag.x * ROTATE_SENSITIVITY;
            self.target_pitch = (self.target_pitch + self.accumulated_drag.y * ROTATE_SENSITIVITY)
                .clamp(MIN_PITCH, MAX_PITCH);
            self.accumulated_drag = Vec2::ZERO;
        }
        if self.accumulated_scroll != 0.0 {
            self.target_distance = (self.target_distance
                * ZOOM_STEP.powf(self.accumulated_scroll))
            .clamp(MIN_DISTANCE, MAX_DISTANCE);
            self.accumulated_scroll = 0.0;
        }

        let blend = 1.0 - (-DAMPING_RATE * dt.max(0.0)).exp();
        self.yaw += (self.target_yaw - self.yaw) * blend;
        self.pitch += (self.target_pitch - self.pitch) * blend;
        self.distance += (self.target_distance - self.distance) * blend;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::looking_from(INITIAL_EYE, 16.0 / 9.0)
    }

    #[test]
    fn looking_from_reproduces_the_eye_position() {
        let cam = camera();
        assert!((cam.distance - 7.0).abs() < 1e-4);
        assert!((cam.eye() - INITIAL_EYE).length() < 1e-4);
    }

    #[test]
    fn drag_moves_targets_and_damping_converges() {
        let mut cam = camera();
        cam.handle_mouse_button(MouseButton::Left, ElementState::Pressed);
        cam.handle_mouse_move(PhysicalPosition::new(100.0, 100.0));
        cam.handle_mouse_move(PhysicalPosition::new(300.0, 100.0));
        cam.handle_mouse_button(MouseButton::Left, ElementState::Released);

        let yaw_before = cam.yaw;
        cam.update(1.0 / 60.0);
        let target = cam.target_yaw;
        assert!((target - yaw_before - 200.0 * ROTATE_SENSITIVITY).abs() < 1e-5);
        assert!(cam.yaw > yaw_before && cam.yaw < target);

        let mut previous_gap = (target - cam.yaw).abs();
        for _ in 0..240 {
            cam.update(1.0 / 60.0);
            let gap = (target - cam.yaw).abs();
            assert!(gap <= previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-3);
    }

    #[test]
    fn drag_without_button_does_nothing() {
        let mut cam = camera();
        cam.handle_mouse_move(PhysicalPosition::new(50.0, 50.0));
        cam.handle_mouse_move(PhysicalPosition::new(500.0, 500.0));
        cam.update(0.1);
        assert_eq!(cam.target_yaw, cam.yaw);
        assert!((cam.yaw - camera().yaw).abs() < 1e-6);
    }

    #[test]
    fn pitch_stays_clamped_under_extreme_drag() {
        let mut cam = camera();
        cam.handle_mouse_button(MouseButton::Left, ElementState::Pressed);
        cam.handle_mouse_move(PhysicalPosition::new(0.0, 0.0));
        cam.handle_mouse_move(PhysicalPosition::new(0.0, 100_000.0));
        cam.update(0.016);
        assert!(cam.target_pitch <= MAX_PITCH);
        cam.handle_mouse_move(PhysicalPosition::new(0.0, -300_000.0));
        cam.update(0.016);
        assert!(cam.target_pitch >= MIN_PITCH);
    }

    #[test]
    fn scroll_scales_distance_multiplicatively() {
        let mut cam = camera();
        cam.handle_scroll(MouseScrollDelta::LineDelta(0.0, 1.0));
        cam.update(0.016);
        assert!((cam.target_distance - 7.0 * ZOOM_STEP).abs() < 1e-4);

        cam.handle_scroll(MouseScrollDelta::LineDelta(0.0, -1.0));
        cam.update(0.016);
        assert!((cam.target_distance - 7.0).abs() < 1e-4);
    }

    #[test]
    fn zoom_respects_distance_limits() {
        let mut cam = camera();
        cam.handle_scroll(MouseScrollDelta::LineDelta(0.0, 500.0));
        cam.update(0.016);
        assert!(cam.target_distance >= MIN_DISTANCE);
        cam.handle_scroll(MouseScrollDelta::LineDelta(0.0, -500.0));
        cam.update(0.016);
        assert!(cam.target_distance <= MAX_DISTANCE);
    }

    #[test]
    fn aspect_feeds_the_projection() {
        let mut cam = camera();
        cam.set_aspect(2.0);
        let proj = cam.projection_matrix();
        // Horizontal scale is the vertical one divided by the aspect ratio.
        assert!((proj.col(0).x - proj.col(1).y / 2.0).abs() < 1e-5);
    }
}
