//! Core types: math re-exports and the walkthrough camera.

pub use glam::{Mat4, Quat, Vec3, vec3};

pub mod camera;
