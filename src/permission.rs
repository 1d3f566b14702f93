use btleplug::api::CentralState;
use log::{info, warn};

/// Outcome of asking the platform whether beacon scanning may proceed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

impl Permission {
    pub fn from_adapter_state(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => Permission::Granted,
            _ => Permission::Denied,
        }
    }

    /// Records the outcome. A denial never stops the caller from scanning.
    pub fn log(self) {
        match self {
            Permission::Granted => info!("Permission granted"),
            Permission::Denied => warn!("Permission denied, attempting to scan anyway"),
        }
    }
}
