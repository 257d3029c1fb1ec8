//! Connectivity state.
//!
//! The platform's connectivity listener pushes partial updates into a
//! [`NetworkMonitor`]; the sync queue reads it to decide whether to drain.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Physical connection kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Wi-Fi
    #[default]
    Wifi,
    /// Mobile data
    Cellular,
    /// No connection
    None,
}

/// Effective connection quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectiveType {
    /// 4G or better
    #[default]
    #[serde(rename = "4g")]
    FourG,
    /// 3G
    #[serde(rename = "3g")]
    ThreeG,
    /// 2G
    #[serde(rename = "2g")]
    TwoG,
    /// Slower than 2G
    #[serde(rename = "slow-2g")]
    Slow2G,
    /// Not reported
    #[serde(rename = "unknown")]
    Unknown,
}

/// Snapshot of the client's connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Whether remote calls can be attempted
    pub online: bool,
    /// Physical connection kind
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    /// Quality bucket
    pub effective_type: EffectiveType,
    /// Estimated bandwidth in Mbit/s
    pub downlink: f64,
    /// Estimated round-trip time in milliseconds
    pub rtt: u32,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            online: true,
            connection_type: ConnectionType::Wifi,
            effective_type: EffectiveType::FourG,
            downlink: 10.0,
            rtt: 50,
        }
    }
}

impl NetworkStatus {
    /// Status of a device with no connection at all.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            online: false,
            connection_type: ConnectionType::None,
            effective_type: EffectiveType::Unknown,
            downlink: 0.0,
            rtt: 0,
        }
    }

    /// Apply a partial update, leaving unspecified fields unchanged.
    #[must_use]
    pub fn merged(mut self, update: &NetworkUpdate) -> Self {
        if let Some(online) = update.online {
            self.online = online;
        }
        if let Some(connection_type) = update.connection_type {
            self.connection_type = connection_type;
        }
        if let Some(effective_type) = update.effective_type {
            self.effective_type = effective_type;
        }
        if let Some(downlink) = update.downlink {
            self.downlink = downlink;
        }
        if let Some(rtt) = update.rtt {
            self.rtt = rtt;
        }
        self
    }
}

/// Partial connectivity update from the platform listener.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkUpdate {
    /// New online flag
    pub online: Option<bool>,
    /// New connection kind
    #[serde(rename = "type")]
    pub connection_type: Option<ConnectionType>,
    /// New quality bucket
    pub effective_type: Option<EffectiveType>,
    /// New bandwidth estimate
    pub downlink: Option<f64>,
    /// New round-trip estimate
    pub rtt: Option<u32>,
}

impl NetworkUpdate {
    /// Update that only flips the online flag.
    #[must_use]
    pub fn online(online: bool) -> Self {
        Self {
            online: Some(online),
            ..Self::default()
        }
    }
}

/// Result of merging an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkTransition {
    /// Status before the update
    pub previous: NetworkStatus,
    /// Status after the update
    pub current: NetworkStatus,
}

impl NetworkTransition {
    /// Offline before, online now.
    #[must_use]
    pub const fn came_online(&self) -> bool {
        !self.previous.online && self.current.online
    }

    /// Online before, offline now.
    #[must_use]
    pub const fn went_offline(&self) -> bool {
        self.previous.online && !self.current.online
    }
}

/// Shared holder of the current [`NetworkStatus`].
#[derive(Debug, Default)]
pub struct NetworkMonitor {
    status: Mutex<NetworkStatus>,
}

impl NetworkMonitor {
    /// Create a monitor starting from `initial`.
    #[must_use]
    pub const fn new(initial: NetworkStatus) -> Self {
        Self {
            status: Mutex::new(initial),
        }
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> NetworkStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the device is currently online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status().online
    }

    /// Merge a partial update.
    pub fn update(&self, update: &NetworkUpdate) -> NetworkTransition {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *status;
        *status = previous.merged(update);
        let transition = NetworkTransition {
            previous,
            current: *status,
        };
        drop(status);

        if transition.came_online() {
            info!(connection = ?transition.current.connection_type, "network online");
        } else if transition.went_offline() {
            info!("network offline");
        }
        transition
    }
}
