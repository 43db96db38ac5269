// src/camera.rs
//! Camera description handed to the frame context and to on-demand compiles.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::host::CameraId;

/// Orthographic frustum bounds: left, right, top, bottom, near, far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthoBounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrthoBounds {
    /// Unit clip-space box `[-1, 1, 1, -1, 0, 1]`.
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            near: 0.0,
            far: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fovy: f32,
        aspect: f32,
        znear: f32,
        zfar: f32,
    },
    Orthographic(OrthoBounds),
}

/// Camera as seen by the plugin core: an id and a projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub id: CameraId,
    pub projection: Projection,
}

impl Camera {
    pub fn perspective(id: CameraId, fovy_radians: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self {
            id,
            projection: Projection::Perspective {
                fovy: fovy_radians,
                aspect,
                znear,
                zfar,
            },
        }
    }

    pub fn orthographic(id: CameraId, bounds: OrthoBounds) -> Self {
        Self {
            id,
            projection: Projection::Orthographic(bounds),
        }
    }

    /// Camera used to compile programs outside of any real camera's frustum.
    pub fn neutral() -> Self {
        Self::neutral_with(OrthoBounds::default())
    }

    pub fn neutral_with(bounds: OrthoBounds) -> Self {
        Self::orthographic(CameraId::NEUTRAL, bounds)
    }

    pub fn is_neutral(&self) -> bool {
        self.id == CameraId::NEUTRAL
    }

    pub fn proj_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fovy, aspect, znear, zfar } => Mat4::perspective_rh(fovy, aspect, znear, zfar),
            Projection::Orthographic(b) => Mat4::orthographic_rh(b.left, b.right, b.bottom, b.top, b.near, b.far),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_neutral_camera_is_unit_ortho() {
        let cam = Camera::neutral();
        assert!(cam.is_neutral());
        assert_eq!(cam.projection, Projection::Orthographic(OrthoBounds::default()));
        // The unit box maps x to itself.
        let p = cam.proj_matrix().project_point3(Vec3::new(0.5, -0.25, 0.0));
        assert!((p.x - 0.5).abs() < 1e-6);
        assert!((p.y + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_bounds_are_configurable() {
        let bounds = OrthoBounds {
            left: -2.0,
            right: 2.0,
            top: 2.0,
            bottom: -2.0,
            near: 0.0,
            far: 10.0,
        };
        let cam = Camera::neutral_with(bounds);
        assert!(cam.is_neutral());
        let p = cam.proj_matrix().project_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p.x - 0.5).abs() < 1e-6);

        let perspective = Camera::perspective(CameraId(3), 1.0, 1.0, 0.1, 100.0);
        assert!(!perspective.is_neutral());
    }
}
