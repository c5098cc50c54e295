//! # polaris-hal
//!
//! The boundary between an engine core and the Polaris presentation layer.
//! The core calls the [`Platform`] trait; the presentation layer drives the
//! core through [`EngineCore`]. [`Host`] implements `Platform` over one
//! owned render pipeline, audio bridge and storage area.

pub mod engine;
pub mod host;
pub mod locale;
pub mod log;
pub mod platform;
pub mod storage;
pub mod timer;

pub use engine::{EngineCore, InputEvent, Key, MouseButton};
pub use host::{FrameStatus, Host};
pub use log::ErrorRing;
pub use platform::{Capabilities, Platform};
pub use storage::{make_valid_path, JsonSaveStore, MemorySaveStore, SaveStore, Storage};
pub use timer::{Clock, LapTimer, ManualClock, MonotonicClock};
