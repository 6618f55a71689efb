//! proctor-hw — webcam capture for the proctoring pipeline.
//!
//! V4L2-based camera access with YUYV negotiation; captured frames carry
//! both an RGB plane for annotation and a grayscale plane for detection.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameStream};
pub use frame::Frame;
