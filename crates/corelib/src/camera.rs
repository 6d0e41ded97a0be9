use crate::{Mat4, Quat, Vec3, vec3};

/// Distance moved per frame while forward/back is held.
pub const MOVE_STEP: f32 = 0.03;
/// Yaw applied per frame while left/right is held.
pub const TURN_STEP_DEG: f32 = 2.0;

/// Which movement keys are held this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraControls {
    pub forward: bool,
    pub back: bool,
    pub turn_left: bool,
    pub turn_right: bool,
}

/// First-person camera that walks along its view direction and turns about +Y.
/// Right-handed, fixed-step per frame.
#[derive(Clone, Copy, Debug)]
pub struct WalkCamera {
    pub position: Vec3,
    /// Unit view direction.
    pub direction: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl WalkCamera {
    /// Starting pose inside the house.
    pub fn links_house(aspect: f32) -> Self {
        Self {
            position: vec3(0.5, 0.4, 0.5),
            direction: vec3(0.0, 0.0, -1.0),
            up: Vec3::Y,
            fov_y_rad: 45f32.to_radians(),
            z_near: 0.001,
            z_far: 1000.0,
            aspect,
        }
    }

    /// Apply one frame of held controls. Both moves then both turns, like
    /// polling each key independently.
    pub fn update(&mut self, controls: CameraControls) {
        if controls.forward {
            self.position += MOVE_STEP * self.direction;
        }
        if controls.back {
            self.position -= MOVE_STEP * self.direction;
        }
        if controls.turn_left {
            self.yaw(TURN_STEP_DEG.to_radians());
        }
        if controls.turn_right {
            self.yaw(-TURN_STEP_DEG.to_radians());
        }
    }

    /// Rotate the view direction about +Y (positive = counter-clockwise from above).
    pub fn yaw(&mut self, angle_rad: f32) {
        self.direction = (Quat::from_rotation_y(angle_rad) * self.direction).normalize();
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.direction, self.up)
    }

    /// Depth range [0,1], as wgpu expects.
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    #[inline]
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }
}
