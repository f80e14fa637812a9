use crate::{
    bridge::Bridge,
    config::FadeConfig,
    lighting::LightingBackend,
    ramp::{Pacer, PeriodicRamp, RampReport},
    LightControlError, Result,
};

/// Fade in/out effect played on one entertainment group.
///
/// Owns the effect it installs on the backend and always retires it again,
/// whether the ramp was cancelled, failed, or the effect is simply dropped.
#[derive(Debug)]
pub struct FadeEffect<'b, B: LightingBackend> {
    backend: &'b B,
    settings: FadeConfig,
    installed: bool,
}

impl<'b, B: LightingBackend> FadeEffect<'b, B> {
    pub fn new(backend: &'b B, settings: FadeConfig) -> Self {
        Self {
            backend,
            settings,
            installed: false,
        }
    }

    /// Fades the group `bridge` streams to. `settings.group` only applies
    /// while the bridge has no group selected.
    pub fn for_bridge<Br>(bridge: &'b Br, mut settings: FadeConfig) -> Self
    where
        Br: Bridge<Backend = B>,
    {
        if let Some(group) = bridge.selected_group() {
            settings.group = group;
        }
        Self::new(bridge.backend(), settings)
    }

    pub fn group(&self) -> usize {
        self.settings.group
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Installs the effect, runs `ramp` over the configured group until it
    /// stops, then tears the effect down.
    ///
    /// With `max_cycles` the ramp also stops after that many full cycles.
    pub fn play<P: Pacer>(
        &mut self,
        ramp: &mut PeriodicRamp<P>,
        max_cycles: Option<u64>,
    ) -> Result<RampReport> {
        let steps = self.settings.ramp.steps()?;
        let targets = self
            .backend
            .targets(self.settings.group, self.settings.base_color)?;
        if targets.is_empty() {
            return Err(LightControlError::config(format!(
                "entertainment group {} has no lights",
                self.settings.group
            )));
        }

        tracing::info!(
            effect = %self.settings.effect_name,
            lights = targets.len(),
            steps,
            cycle = ?self.settings.ramp.cycle_duration,
            "starting fade effect"
        );

        self.install()?;
        let outcome = match max_cycles {
            Some(cycles) => ramp.run_cycles(&self.settings.ramp, &targets, self.backend, cycles),
            None => ramp.run(&self.settings.ramp, &targets, self.backend),
        };

        tracing::info!(effect = %self.settings.effect_name, "stopping fade effect");
        let teardown = self.stop();
        let report = outcome?;
        teardown?;

        tracing::info!(
            cycles = report.cycles_completed,
            steps = report.steps_applied,
            "fade effect stopped"
        );
        Ok(report)
    }

    /// Disables and finishes the installed effect. No-op when nothing is
    /// installed.
    pub fn stop(&mut self) -> Result<()> {
        if !self.installed {
            return Ok(());
        }
        self.installed = false;
        let disabled = self.backend.disable_effect();
        self.backend.finish_effect()?;
        disabled
    }

    fn install(&mut self) -> Result<()> {
        self.backend.add_effect(&self.settings.effect_name)?;
        self.installed = true;
        self.backend.enable_effect()
    }
}

impl<B: LightingBackend> Drop for FadeEffect<'_, B> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "failed to retire fade effect");
        }
    }
}
