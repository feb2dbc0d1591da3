//! Camera pose → clip-space transform.
//!
//! Poses come from the endpoint: position in scene units, Euler rotation in
//! degrees (yaw about +Y, then pitch about +X, then roll about +Z), and a
//! physical lens (focal length and sensor size in millimetres, lens shift as a
//! fraction of the sensor). Matrices target wgpu clip space (right-handed view
//! space looking down -Z, depth mapped to 0..1).

use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};

use relay_wire::CameraPose;

const FALLBACK_FOV_Y: f32 = std::f32::consts::FRAC_PI_3;
const FALLBACK_NEAR: f32 = 0.1;
const FALLBACK_DEPTH_RANGE: f32 = 1000.0;

/// Radians per second the placeholder mesh turns about +Y.
const SPIN_RATE: f32 = 0.5;

/// View matrix (world → camera) for `pose`.
pub fn view(pose: &CameraPose) -> Matrix4<f32> {
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), pose.ry.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pose.rx.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), pose.rz.to_radians());

    let camera = Isometry3::from_parts(Translation3::new(pose.x, pose.y, pose.z), rotation);
    camera.inverse().to_homogeneous()
}

/// Projection matrix for `pose` rendering into a `width × height` target.
///
/// Missing lens data falls back to a 60° vertical field of view; a sensor
/// height of zero is derived from the sensor width and the target aspect.
pub fn projection(pose: &CameraPose, width: u32, height: u32) -> Matrix4<f32> {
    let aspect = width.max(1) as f32 / height.max(1) as f32;

    let near = if pose.near_z > 0.0 { pose.near_z } else { FALLBACK_NEAR };
    let far = if pose.far_z > near {
        pose.far_z
    } else {
        near + FALLBACK_DEPTH_RANGE
    };

    if pose.ortho_width > 0.0 {
        let half_w = pose.ortho_width * 0.5;
        let half_h = half_w / aspect;
        let (sx, sy) = (pose.cx * 2.0 * half_w, pose.cy * 2.0 * half_h);
        return orthographic(-half_w + sx, half_w + sx, -half_h + sy, half_h + sy, near, far);
    }

    let (half_w, half_h) = if pose.focal_length > 0.0 && pose.sensor_x > 0.0 {
        let sensor_y = if pose.sensor_y > 0.0 {
            pose.sensor_y
        } else {
            pose.sensor_x / aspect
        };
        (
            near * pose.sensor_x / (2.0 * pose.focal_length),
            near * sensor_y / (2.0 * pose.focal_length),
        )
    } else {
        let half_h = near * (FALLBACK_FOV_Y * 0.5).tan();
        (half_h * aspect, half_h)
    };

    let (sx, sy) = (pose.cx * 2.0 * half_w, pose.cy * 2.0 * half_h);
    frustum(-half_w + sx, half_w + sx, -half_h + sy, half_h + sy, near, far)
}

/// Model matrix of the placeholder mesh at tracked time `t` (seconds).
pub fn model_spin(t: f64) -> Matrix4<f32> {
    let angle = (t * f64::from(SPIN_RATE)).rem_euclid(std::f64::consts::TAU) as f32;
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous()
}

/// Full transform handed to the mesh renderer: `projection * view * model`.
pub fn frame_transform(pose: &CameraPose, t_tracked: f64, width: u32, height: u32) -> Matrix4<f32> {
    projection(pose, width, height) * view(pose) * model_spin(t_tracked)
}

/// Off-centre perspective frustum, right-handed, depth 0..1.
fn frustum(l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Matrix4<f32> {
    Matrix4::new(
        2.0 * n / (r - l), 0.0, (r + l) / (r - l), 0.0,
        0.0, 2.0 * n / (t - b), (t + b) / (t - b), 0.0,
        0.0, 0.0, f / (n - f), n * f / (n - f),
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Off-centre orthographic box, right-handed, depth 0..1.
fn orthographic(l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Matrix4<f32> {
    Matrix4::new(
        2.0 / (r - l), 0.0, 0.0, -(r + l) / (r - l),
        0.0, 2.0 / (t - b), 0.0, -(t + b) / (t - b),
        0.0, 0.0, 1.0 / (n - f), n / (n - f),
        0.0, 0.0, 0.0, 1.0,
    )
}
