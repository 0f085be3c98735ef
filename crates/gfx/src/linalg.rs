use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt::Display;

use bytemuck::{Pod, Zeroable};
use nalgebra_glm as glm;

use crate::InputState;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig
{
    pub speed:          f32,
    pub sensitivity:    f32,
    pub fov_y_radians:  f32,
    pub near:           f32,
    pub far:            f32,
    pub start_position: [f32; 3]
}

impl Default for CameraConfig
{
    fn default() -> Self
    {
        CameraConfig {
            speed:          16.0,
            sensitivity:    2e-3,
            fov_y_radians:  PI * 0.25,
            near:           0.1,
            far:            512.0,
            start_position: [64.0, 64.0, 96.0]
        }
    }
}

/// Camera matrices in the layout the render stages read them.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraMatrices
{
    pub projection:     glm::Mat4,
    pub inv_projection: glm::Mat4,
    pub view:           glm::Mat4,
    pub transform:      glm::Mat4
}

/// Free-flying z-up camera. Looks down its local -z axis; `pitch` 0 faces
/// straight down and `pitch` pi faces straight up.
#[derive(Debug, Clone)]
pub struct Camera
{
    position: glm::Vec3,
    yaw:      f32,
    pitch:    f32,
    config:   CameraConfig
}

impl Display for Camera
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(
            f,
            "Position {{ {}, {}, {} }} | Pitch: {} | Yaw: {}",
            self.position.x, self.position.y, self.position.z, self.pitch, self.yaw
        )
    }
}

impl Camera
{
    pub fn new(config: CameraConfig) -> Camera
    {
        let [x, y, z] = config.start_position;

        let mut this = Camera {
            position: glm::vec3(x, y, z),
            yaw: 0.0,
            pitch: FRAC_PI_2,
            config
        };

        this.enforce_invariants();

        this
    }

    pub fn get_position(&self) -> glm::Vec3
    {
        self.position
    }

    pub fn get_config(&self) -> &CameraConfig
    {
        &self.config
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32)
    {
        self.yaw = yaw;
        self.pitch = pitch;

        self.enforce_invariants();
    }

    /// Mouse look is applied every frame, movement only while the cursor is
    /// locked to the window.
    pub fn update(&mut self, input: &InputState, delta_time: f32)
    {
        self.yaw -= self.config.sensitivity * input.mouse_delta[0];
        self.pitch -= self.config.sensitivity * input.mouse_delta[1];

        self.enforce_invariants();

        if !input.cursor_locked
        {
            return;
        }

        let [right, forward, up] = input.get_movement_axes();

        let swivel = glm::rotate_z_vec3(&glm::vec3(right, forward, 0.0), self.yaw);

        let mut movement = if glm::length(&swivel) != 0.0
        {
            glm::normalize(&swivel)
        }
        else
        {
            swivel
        };

        movement.z = up;

        self.position += movement * self.config.speed * delta_time;
    }

    pub fn get_transform(&self) -> glm::Mat4
    {
        let translated = glm::translate(&glm::Mat4::identity(), &self.position);
        let yawed = glm::rotate(&translated, self.yaw, &glm::vec3(0.0, 0.0, 1.0));

        glm::rotate(&yawed, self.pitch, &glm::vec3(1.0, 0.0, 0.0))
    }

    pub fn get_forward_vector(&self) -> glm::Vec3
    {
        (self.get_transform() * glm::vec4(0.0, 0.0, -1.0, 0.0)).xyz()
    }

    pub fn get_matrices(&self, width: u32, height: u32) -> CameraMatrices
    {
        let aspect = width.max(1) as f32 / height.max(1) as f32;

        let projection = glm::perspective_rh_zo(
            aspect,
            self.config.fov_y_radians,
            self.config.near,
            self.config.far
        );
        let transform = self.get_transform();

        CameraMatrices {
            projection,
            inv_projection: glm::inverse(&projection),
            view: glm::inverse(&transform),
            transform
        }
    }

    fn enforce_invariants(&mut self)
    {
        self.pitch = self.pitch.clamp(0.0, PI);
        self.yaw %= TAU;
    }
}
