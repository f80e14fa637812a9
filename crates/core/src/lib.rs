//! Core library for the light control debug harness.
//!
//! The heart of the crate is [`PeriodicRamp`], a cancellable fade loop that
//! pushes colors to a set of lights through an injected [`TargetSink`], and
//! [`ShutdownSignal`], the flag every long-running loop polls. The remaining
//! modules model the collaborators the harness drives: the entertainment
//! bridge and its mixer, and a network video source.

pub mod bridge;
pub mod color;
pub mod config;
pub mod effect;
pub mod error;
pub mod lighting;
pub mod ramp;
pub mod shutdown;
pub mod video;

pub use bridge::{connect_bridge, Bridge, BridgeStatus, RetryPrompt, SimulatedBridge};
pub use color::Color;
pub use config::{AppConfig, BridgeConfig, FadeConfig, VideoConfig};
pub use effect::FadeEffect;
pub use error::{LightControlError, Result};
pub use lighting::{
    ColorWriter, EntertainmentGroup, LightingBackend, Mixer, RecordingSink, Target, TargetId,
    TargetSink,
};
pub use ramp::{intensity, Pacer, PeriodicRamp, RampConfig, RampPhase, RampReport, ThreadPacer};
pub use shutdown::ShutdownSignal;
pub use video::{
    average_bgr, open_source, AverageColor, CapturedFrame, SourceChooser, SourceInfo,
    SyntheticSource, VideoDebugSession, VideoFrame, VideoSource, VideoStats,
};
