//! Entertainment bridge connection.
//!
//! [`connect_bridge`] keeps working on the bridge until it can stream: it
//! selects the first entertainment group when none is selected and otherwise
//! waits for the operator to fix the setup before reconnecting.

use std::{collections::VecDeque, fmt};

use crate::{
    config::BridgeConfig,
    lighting::{EntertainmentGroup, LightingBackend, Mixer},
    LightControlError, Result, ShutdownSignal,
};

/// Connection state reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Ready,
    Streaming,
    InvalidGroupSelected,
    NoBridgeFound,
    NotAuthorized,
    Busy,
}

impl BridgeStatus {
    pub fn is_streamable(self) -> bool {
        matches!(self, Self::Ready | Self::Streaming)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Ready => "BRIDGE_READY",
            Self::Streaming => "BRIDGE_STREAMING",
            Self::InvalidGroupSelected => "BRIDGE_INVALID_GROUP_SELECTED",
            Self::NoBridgeFound => "BRIDGE_NOT_FOUND",
            Self::NotAuthorized => "BRIDGE_NOT_AUTHORIZED",
            Self::Busy => "BRIDGE_BUSY",
        }
    }
}

impl fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Lighting bridge collaborator.
pub trait Bridge {
    type Backend: LightingBackend;

    /// Starts (or restarts) connecting to the bridge.
    fn connect(&mut self) -> Result<()>;

    fn status(&self) -> BridgeStatus;

    fn groups(&self) -> &[EntertainmentGroup];

    /// Index of the group the bridge streams to, once one is selected.
    fn selected_group(&self) -> Option<usize>;

    fn select_group(&mut self, index: usize) -> Result<()>;

    fn ip_address(&self) -> &str;

    /// Lighting backend streaming to the selected group.
    fn backend(&self) -> &Self::Backend;

    fn shut_down(&mut self) -> Result<()>;

    fn is_streamable(&self) -> bool {
        self.status().is_streamable()
    }
}

/// Asks the operator to fix the bridge setup before the next attempt.
pub trait RetryPrompt {
    fn wait_for_retry(&mut self, status: BridgeStatus) -> Result<()>;
}

/// Drives `bridge` until it is streamable or shutdown is requested.
///
/// Returns whether the bridge ended up streamable.
pub fn connect_bridge<B, P>(bridge: &mut B, prompt: &mut P, signal: &ShutdownSignal) -> Result<bool>
where
    B: Bridge + ?Sized,
    P: RetryPrompt + ?Sized,
{
    tracing::info!(ip = bridge.ip_address(), "connecting to bridge");
    bridge.connect()?;

    while !bridge.is_streamable() && !signal.is_shutdown_requested() {
        let status = bridge.status();
        tracing::info!(%status, "bridge status");

        if status == BridgeStatus::InvalidGroupSelected {
            if bridge.groups().is_empty() {
                return Err(LightControlError::Bridge(
                    "bridge has no entertainment groups".to_string(),
                ));
            }
            tracing::info!(group = %bridge.groups()[0].name, "selecting first entertainment group");
            bridge.select_group(0)?;
        } else {
            tracing::warn!(%status, "no streamable bridge configured");
            prompt.wait_for_retry(status)?;
            if signal.is_shutdown_requested() {
                break;
            }
            bridge.connect()?;
        }
    }

    let streamable = bridge.is_streamable();
    if streamable {
        tracing::info!(ip = bridge.ip_address(), "bridge connection completed");
    }
    Ok(streamable)
}

/// Bridge simulated in-process on top of a [`Mixer`].
///
/// Reports [`BridgeStatus::InvalidGroupSelected`] until a group is selected
/// and [`BridgeStatus::NoBridgeFound`] when it has no groups at all. A connect
/// script overrides the status of the next connection attempts.
#[derive(Debug)]
pub struct SimulatedBridge {
    ip_address: String,
    mixer: Mixer,
    selected: Option<usize>,
    status: BridgeStatus,
    script: VecDeque<BridgeStatus>,
    connects: u32,
    shut_down: bool,
}

impl SimulatedBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            ip_address: config.ip_address.clone(),
            mixer: Mixer::new(config.groups.clone()),
            selected: config.selected_group,
            status: BridgeStatus::NoBridgeFound,
            script: VecDeque::new(),
            connects: 0,
            shut_down: false,
        }
    }

    /// Statuses reported by the next connection attempts, in order.
    pub fn with_connect_script(mut self, statuses: impl IntoIterator<Item = BridgeStatus>) -> Self {
        self.script = statuses.into_iter().collect();
        self
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Bridge for SimulatedBridge {
    type Backend = Mixer;

    fn connect(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(LightControlError::Bridge("bridge has been shut down".to_string()));
        }
        self.connects += 1;
        self.status = self.script.pop_front().unwrap_or_else(|| {
            if self.mixer.groups().is_empty() {
                BridgeStatus::NoBridgeFound
            } else if self.selected.is_none() {
                BridgeStatus::InvalidGroupSelected
            } else {
                BridgeStatus::Ready
            }
        });
        tracing::debug!(attempt = self.connects, status = %self.status, "simulated bridge connect");
        Ok(())
    }

    fn status(&self) -> BridgeStatus {
        self.status
    }

    fn groups(&self) -> &[EntertainmentGroup] {
        self.mixer.groups()
    }

    fn selected_group(&self) -> Option<usize> {
        self.selected
    }

    fn select_group(&mut self, index: usize) -> Result<()> {
        if index >= self.mixer.groups().len() {
            return Err(LightControlError::Bridge(format!(
                "entertainment group {index} does not exist"
            )));
        }
        self.selected = Some(index);
        self.status = BridgeStatus::Ready;
        Ok(())
    }

    fn ip_address(&self) -> &str {
        &self.ip_address
    }

    fn backend(&self) -> &Mixer {
        &self.mixer
    }

    fn shut_down(&mut self) -> Result<()> {
        if !self.shut_down {
            tracing::info!(ip = %self.ip_address, "shutting down bridge");
            self.shut_down = true;
            self.status = BridgeStatus::NoBridgeFound;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::TargetId;

    #[derive(Default)]
    struct CountingPrompt {
        prompts: Vec<BridgeStatus>,
        shutdown_after: Option<(usize, ShutdownSignal)>,
    }

    impl RetryPrompt for CountingPrompt {
        fn wait_for_retry(&mut self, status: BridgeStatus) -> Result<()> {
            self.prompts.push(status);
            if let Some((count, signal)) = &self.shutdown_after {
                if self.prompts.len() >= *count {
                    signal.request_shutdown();
                }
            }
            Ok(())
        }
    }

    fn config(groups: usize) -> BridgeConfig {
        BridgeConfig {
            ip_address: "10.0.0.5".to_string(),
            groups: (0..groups)
                .map(|index| EntertainmentGroup {
                    id: index.to_string(),
                    name: format!("Group {index}"),
                    lights: vec![TargetId(1)],
                })
                .collect(),
            selected_group: None,
        }
    }

    #[test]
    fn selects_first_group_when_none_selected() {
        let mut bridge = SimulatedBridge::new(&config(2));
        let mut prompt = CountingPrompt::default();

        let streamable = connect_bridge(&mut bridge, &mut prompt, &ShutdownSignal::new()).unwrap();

        assert!(streamable);
        assert_eq!(bridge.selected_group(), Some(0));
        assert!(prompt.prompts.is_empty());
        assert_eq!(bridge.connects(), 1);
    }

    #[test]
    fn preselected_group_is_ready_immediately() {
        let mut config = config(2);
        config.selected_group = Some(1);
        let mut bridge = SimulatedBridge::new(&config);

        let streamable =
            connect_bridge(&mut bridge, &mut CountingPrompt::default(), &ShutdownSignal::new()).unwrap();

        assert!(streamable);
        assert_eq!(bridge.selected_group(), Some(1));
    }

    #[test]
    fn prompts_and_reconnects_until_ready() {
        let mut bridge = SimulatedBridge::new(&config(1)).with_connect_script([
            BridgeStatus::NotAuthorized,
            BridgeStatus::Busy,
            BridgeStatus::InvalidGroupSelected,
        ]);
        let mut prompt = CountingPrompt::default();

        let streamable = connect_bridge(&mut bridge, &mut prompt, &ShutdownSignal::new()).unwrap();

        assert!(streamable);
        assert_eq!(prompt.prompts, vec![BridgeStatus::NotAuthorized, BridgeStatus::Busy]);
        assert_eq!(bridge.connects(), 3);
    }

    #[test]
    fn shutdown_stops_retrying() {
        let signal = ShutdownSignal::new();
        let mut bridge = SimulatedBridge::new(&config(0));
        let mut prompt = CountingPrompt {
            shutdown_after: Some((2, signal.clone())),
            ..CountingPrompt::default()
        };

        let streamable = connect_bridge(&mut bridge, &mut prompt, &signal).unwrap();

        assert!(!streamable);
        assert_eq!(prompt.prompts, vec![BridgeStatus::NoBridgeFound; 2]);
        assert_eq!(bridge.connects(), 2);
    }

    #[test]
    fn invalid_group_without_groups_is_an_error() {
        let mut bridge =
            SimulatedBridge::new(&config(0)).with_connect_script([BridgeStatus::InvalidGroupSelected]);

        let err = connect_bridge(&mut bridge, &mut CountingPrompt::default(), &ShutdownSignal::new())
            .unwrap_err();

        assert!(matches!(err, LightControlError::Bridge(_)));
    }

    #[test]
    fn shut_down_bridge_refuses_connections() {
        let mut bridge = SimulatedBridge::new(&config(1));
        bridge.shut_down().unwrap();
        assert!(bridge.is_shut_down());
        assert!(bridge.connect().is_err());
    }

    #[test]
    fn backend_exposes_group_lights() {
        let bridge = SimulatedBridge::new(&config(1));
        let targets = bridge.backend().targets(0, crate::Color::WHITE).unwrap();
        assert_eq!(targets.len(), 1);
    }
}
