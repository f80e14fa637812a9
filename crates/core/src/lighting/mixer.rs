use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use crate::{Color, LightControlError, Result};

use super::{ColorWriter, EntertainmentGroup, LightingBackend, Target, TargetId, TargetSink};

/// Lifecycle of the manual effect installed on the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStage {
    Added,
    Enabled,
    Disabled,
    Finished,
}

#[derive(Debug)]
struct ManualEffect {
    name: String,
    stage: EffectStage,
    colors: BTreeMap<TargetId, Color>,
}

#[derive(Debug, Default)]
struct MixerState {
    effect: Option<ManualEffect>,
    writes: u64,
}

/// In-process stand-in for the streaming library's effect mixer.
///
/// Holds one manual effect at a time. Lights show the effect's staged color
/// while it is enabled and stay dark otherwise.
#[derive(Debug)]
pub struct Mixer {
    groups: Vec<EntertainmentGroup>,
    state: Mutex<MixerState>,
}

impl Mixer {
    pub fn new(groups: Vec<EntertainmentGroup>) -> Self {
        Self {
            groups,
            state: Mutex::new(MixerState::default()),
        }
    }

    pub fn groups(&self) -> &[EntertainmentGroup] {
        &self.groups
    }

    /// Color currently sent to the light, black when no enabled effect
    /// drives it.
    pub fn output(&self, id: TargetId) -> Result<Color> {
        let state = self.lock_state()?;
        let color = state
            .effect
            .as_ref()
            .filter(|effect| effect.stage == EffectStage::Enabled)
            .and_then(|effect| effect.colors.get(&id).copied())
            .unwrap_or(Color::BLACK);
        Ok(color)
    }

    /// Stage of the installed effect, if any.
    pub fn effect_stage(&self) -> Result<Option<EffectStage>> {
        let state = self.lock_state()?;
        Ok(state.effect.as_ref().map(|effect| effect.stage))
    }

    pub fn effect_name(&self) -> Result<Option<String>> {
        let state = self.lock_state()?;
        Ok(state.effect.as_ref().map(|effect| effect.name.clone()))
    }

    /// Total number of color writes accepted so far.
    pub fn writes(&self) -> Result<u64> {
        Ok(self.lock_state()?.writes)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, MixerState>> {
        self.state
            .lock()
            .map_err(|_| LightControlError::sink("mixer has been poisoned"))
    }

    fn transition(&self, from: &[EffectStage], to: EffectStage) -> Result<()> {
        let mut state = self.lock_state()?;
        let effect = state
            .effect
            .as_mut()
            .ok_or_else(|| LightControlError::sink("no effect installed on the mixer"))?;
        if !from.contains(&effect.stage) {
            return Err(LightControlError::sink(format!(
                "effect `{}` cannot move from {:?} to {:?}",
                effect.name, effect.stage, to
            )));
        }
        tracing::debug!(effect = %effect.name, from = ?effect.stage, ?to, "effect stage change");
        effect.stage = to;
        Ok(())
    }
}

impl TargetSink for Mixer {
    type Writer<'a> = MixerWriter<'a>;

    fn lock(&self) -> Result<MixerWriter<'_>> {
        Ok(MixerWriter {
            state: self.lock_state()?,
        })
    }
}

/// Locked view of the mixer; the lock is released on drop.
#[derive(Debug)]
pub struct MixerWriter<'a> {
    state: MutexGuard<'a, MixerState>,
}

impl ColorWriter for MixerWriter<'_> {
    fn set_color(&mut self, id: TargetId, color: Color) -> Result<()> {
        let state = &mut *self.state;
        match state.effect.as_mut() {
            Some(effect) if effect.stage != EffectStage::Finished => {
                effect.colors.insert(id, color.clamped());
                state.writes += 1;
                tracing::trace!(light = %id, r = color.r, g = color.g, b = color.b, "staged color");
                Ok(())
            }
            Some(effect) => Err(LightControlError::sink(format!(
                "effect `{}` has already finished",
                effect.name
            ))),
            None => Err(LightControlError::sink("no effect installed on the mixer")),
        }
    }
}

impl LightingBackend for Mixer {
    fn targets(&self, group: usize, base_color: Color) -> Result<Vec<Target>> {
        let group = self.groups.get(group).ok_or_else(|| {
            LightControlError::Bridge(format!(
                "entertainment group {group} does not exist ({} configured)",
                self.groups.len()
            ))
        })?;
        Ok(group
            .lights
            .iter()
            .map(|id| Target::new(*id, base_color))
            .collect())
    }

    fn add_effect(&self, name: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        if let Some(effect) = &state.effect {
            if effect.stage != EffectStage::Finished {
                return Err(LightControlError::sink(format!(
                    "effect `{}` is still active",
                    effect.name
                )));
            }
        }
        state.effect = Some(ManualEffect {
            name: name.to_string(),
            stage: EffectStage::Added,
            colors: BTreeMap::new(),
        });
        tracing::debug!(effect = name, "effect added to mixer");
        Ok(())
    }

    fn enable_effect(&self) -> Result<()> {
        self.transition(&[EffectStage::Added, EffectStage::Disabled], EffectStage::Enabled)
    }

    fn disable_effect(&self) -> Result<()> {
        self.transition(&[EffectStage::Added, EffectStage::Enabled], EffectStage::Disabled)
    }

    fn finish_effect(&self) -> Result<()> {
        self.transition(
            &[EffectStage::Added, EffectStage::Enabled, EffectStage::Disabled],
            EffectStage::Finished,
        )?;
        let mut state = self.lock_state()?;
        if let Some(effect) = state.effect.as_mut() {
            effect.colors.clear();
        }
        Ok(())
    }
}
