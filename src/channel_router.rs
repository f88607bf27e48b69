//! ChannelRouter - Notification Target Decision
//!
//! Pure decision table mapping (device config, transition) to a target chat
//! and message text, or to suppression. Initial observations and errors
//! always escalate and cannot be suppressed; live changes go to the primary
//! chat gated by the per-direction notify flags.

use crate::device_config::DeviceConfig;
use crate::device_monitor::{DeviceState, Transition};

/// Routing decision for a committed transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Target chat
    pub chat_id: i64,
    /// Message text, without the device label prefix
    pub text: String,
    /// Whether the escalation chat was chosen
    pub escalated: bool,
}

/// Display text for a committed state
pub fn state_label(config: &DeviceConfig, state: DeviceState) -> String {
    match state {
        DeviceState::Uninitialized => "initializing".to_string(),
        DeviceState::Error => "link down".to_string(),
        DeviceState::High => config.label_high.clone(),
        DeviceState::Low => config.label_low.clone(),
    }
}

/// Decide where (and whether) to notify for a transition
///
/// Returns `None` when the transition commits internally but no message is
/// sent (and therefore no snapshot pipeline runs).
pub fn route(config: &DeviceConfig, transition: &Transition) -> Option<Route> {
    if transition.new == DeviceState::Error {
        return Some(Route {
            chat_id: config.escalation_chat_id,
            text: state_label(config, DeviceState::Error),
            escalated: true,
        });
    }

    if transition.is_initial() {
        // Startup report, not a live change; marked so and escalated.
        return Some(Route {
            chat_id: config.escalation_chat_id,
            text: format!("{} (initializing)", state_label(config, transition.new)),
            escalated: true,
        });
    }

    let notify = match transition.new {
        DeviceState::High => config.notify_on_high,
        DeviceState::Low => config.notify_on_low,
        DeviceState::Uninitialized | DeviceState::Error => true,
    };

    if !notify {
        return None;
    }

    Some(Route {
        chat_id: config.chat_id,
        text: state_label(config, transition.new),
        escalated: false,
    })
}
