//! # polaris-audio
//!
//! The audio half of the bridge. The engine core assigns wave sources to a
//! fixed set of channels; a real-time callback pulls PCM from whatever each
//! channel currently references. The bridge never owns wave data, only a weak
//! reference to it.
//!
//! The real-time side ([`ChannelReader`], [`Mixer`]) does not allocate, log or
//! wait on a lock after construction.

pub mod bridge;
pub mod mixer;
#[cfg(feature = "rodio-output")]
pub mod output;
pub mod wave;

pub use bridge::{AudioBridge, ChannelLayout, ChannelReader, PullOutcome, SoundChannel};
pub use mixer::Mixer;
#[cfg(feature = "rodio-output")]
pub use output::RodioOutput;
pub use wave::{LoopMode, PcmWave, WaveSource};
