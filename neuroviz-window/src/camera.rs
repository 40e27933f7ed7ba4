use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use neuroviz_gpu::SceneBounds;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_3};

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.1;
const MAX_DISTANCE: f32 = 1000.0;

/// Camera pose representing position and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Center/focus point that the camera orbits around.
    pub center: Vec3,
    /// Camera position in world space.
    pub position: Vec3,
    /// Yaw angle in radians (rotation around Y axis).
    pub yaw: f32,
    /// Pitch angle in radians (rotation around X axis).
    pub pitch: f32,
}

impl CameraPose {
    /// Create a pose at `position` looking at `center`.
    pub fn new(position: Vec3, center: Vec3) -> Self {
        let forward = (center - position).normalize_or_zero();
        let yaw = (-forward.x).atan2(-forward.z);
        let pitch = forward.y.clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        Self {
            center,
            position,
            yaw,
            pitch,
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.center).length()
    }

    /// Unit vector from the camera towards the center.
    pub fn forward(&self) -> Vec3 {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0) * -Vec3::Z
    }

    /// Orbit around the center point by a pointer delta in pixels.
    pub fn orbit_around_center(&mut self, delta: Vec2, sensitivity: f32) {
        self.yaw -= delta.x * sensitivity;
        self.pitch = (self.pitch - delta.y * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let distance = self.distance();
        self.position = self.center - self.forward() * distance;
    }

    /// Pan the camera and center together.
    pub fn pan(&mut self, delta: Vec2, sensitivity: f32) {
        let right = Quat::from_rotation_y(self.yaw) * Vec3::X;
        let distance = self.distance();
        let pan = (-delta.x * sensitivity * distance) * right
            + (delta.y * sensitivity * distance) * Vec3::Y;
        self.center += pan;
        self.position += pan;
    }

    /// Move towards (negative) or away from (positive) the center.
    pub fn zoom(&mut self, amount: f32) {
        let direction = (self.position - self.center).normalize_or_zero();
        let distance = (self.distance() + amount).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.position = self.center + direction * distance;
    }
}

/// Camera that manages position and view matrix.
pub struct Camera {
    pose: CameraPose,
}

impl Camera {
    /// Creates a camera at the given position looking at the center.
    pub fn new(position: Vec3, center: Vec3) -> Self {
        Self {
            pose: CameraPose::new(position, center),
        }
    }

    /// Head-on view of `bounds` from +Z, far enough to fit the whole network.
    pub fn framing(bounds: &SceneBounds) -> Self {
        let position = bounds.center + Vec3::new(0.0, 0.0, bounds.radius * 2.5);
        Self::new(position, bounds.center)
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn pose_mut(&mut self) -> &mut CameraPose {
        &mut self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        let forward = (self.pose.center - self.pose.position).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        Mat4::look_to_rh(self.pose.position, forward, up)
    }
}

/// Projection matrix configuration.
pub struct Projection {
    width: u32,
    height: u32,
    fov: f32,
    near: f32,
    far: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fov: f32, near: f32, far: f32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fov,
            near,
            far,
        }
    }

    /// Projection whose far plane comfortably contains `bounds`.
    pub fn for_bounds(width: u32, height: u32, bounds: &SceneBounds) -> Self {
        Self::new(width, height, FRAC_PI_3, 0.01, bounds.radius * 10.0)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov,
            self.width as f32 / self.height as f32,
            self.near,
            self.far,
        )
    }

    pub fn update_size(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn set_far(&mut self, far: f32) {
        self.far = far;
    }

    pub fn far(&self) -> f32 {
        self.far
    }
}

/// Map a world point to window coordinates, origin top-left, y down.
///
/// Returns `None` for points behind the camera or past the far plane.
pub fn project_to_screen(view_proj: Mat4, point: Vec3, viewport: Vec2) -> Option<Vec2> {
    let clip = view_proj * point.extend(1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if !(0.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some(Vec2::new(
        (ndc.x * 0.5 + 0.5) * viewport.x,
        (0.5 - ndc.y * 0.5) * viewport.y,
    ))
}
