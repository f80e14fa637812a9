//! Contract towards the lighting backend.
//!
//! The ramp only ever sees a [`TargetSink`]: something that can be locked for
//! the duration of one batch of color writes. The lock is scoped: the
//! [`ColorWriter`] handed out by [`TargetSink::lock`] releases it when dropped,
//! whichever way the batch ends.

mod mixer;
mod recording;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Color, Result};

pub use mixer::{EffectStage, Mixer, MixerWriter};
pub use recording::{AppliedColor, RecordingSink, RecordingWriter};

/// Identifier of one addressable light or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u16);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addressable output together with the color it shows at full intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub base_color: Color,
}

impl Target {
    pub fn new(id: TargetId, base_color: Color) -> Self {
        Self { id, base_color }
    }
}

/// Named set of lights that stream together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentGroup {
    pub id: String,
    pub name: String,
    pub lights: Vec<TargetId>,
}

/// Exclusive, scoped access to a sink. Dropping the writer releases the lock.
pub trait ColorWriter {
    /// Stages `color` for the target with the given id.
    fn set_color(&mut self, id: TargetId, color: Color) -> Result<()>;
}

/// Anything the ramp can push colors through.
pub trait TargetSink {
    type Writer<'a>: ColorWriter
    where
        Self: 'a;

    /// Acquires the sink for one batch of writes.
    fn lock(&self) -> Result<Self::Writer<'_>>;
}

/// Full lighting collaborator: target acquisition, the color sink, and the
/// lifecycle of the effect that owns the colors.
///
/// Every lifecycle call acquires the sink lock for its own duration.
pub trait LightingBackend: TargetSink {
    /// Returns the lights of the entertainment group at `group`, each paired
    /// with `base_color`, in the group's stable order.
    fn targets(&self, group: usize, base_color: Color) -> Result<Vec<Target>>;

    /// Registers a new manual effect under `name`. Replaces any finished one.
    fn add_effect(&self, name: &str) -> Result<()>;

    fn enable_effect(&self) -> Result<()>;

    fn disable_effect(&self) -> Result<()>;

    /// Retires the effect; its colors no longer reach the lights.
    fn finish_effect(&self) -> Result<()>;
}
