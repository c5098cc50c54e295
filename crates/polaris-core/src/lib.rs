//! # polaris-core
//!
//! Core types and primitives for the Polaris presentation bridge.
//! This crate contains foundational types shared across all Polaris crates:
//! frame buffers, colors and pixel conversion, viewport math, configuration,
//! and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod math;

pub use config::*;

pub use color::Color;
pub use error::{contract_violation, PolarisError, PolarisResult};
pub use frame::{FrameBuffer, PixelFormat};
pub use math::{Point2D, Quad, Rect, Viewport};
