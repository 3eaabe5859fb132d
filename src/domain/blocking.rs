use crate::domain::models::{ManualOverride, SordinoSettings};
use crate::domain::schedule::{get_active_schedule, time_remaining_in_schedule};
use chrono::{DateTime, Local};

/// Outcome of resolving the current block state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVerdict {
    pub should_block: bool,
    pub reason: Option<String>,
    pub time_remaining: Option<String>,
}

impl BlockVerdict {
    fn allow() -> Self {
        Self {
            should_block: false,
            reason: None,
            time_remaining: None,
        }
    }
}

/// Resolve whether blocking is in effect at `now`.
///
/// Precedence, highest first: an unexpired pause suppresses everything,
/// then the manual override (on forces blocking, off forces allowing),
/// then the first active schedule. With nothing in effect the answer is
/// allow.
pub fn should_block(settings: &SordinoSettings, now: DateTime<Local>) -> BlockVerdict {
    let block_state = &settings.block_state;

    if let Some(paused_until) = block_state.paused_until {
        if now.timestamp_millis() < paused_until {
            return BlockVerdict::allow();
        }
    }

    match block_state.manual_override {
        ManualOverride::On => {
            return BlockVerdict {
                should_block: true,
                reason: Some("Manual block active".to_string()),
                time_remaining: None,
            };
        }
        ManualOverride::Off => return BlockVerdict::allow(),
        ManualOverride::Unset => {}
    }

    let wall = now.naive_local();
    if let Some(active) = get_active_schedule(&settings.schedules, wall) {
        return BlockVerdict {
            should_block: true,
            reason: Some(active.name.clone()),
            time_remaining: Some(time_remaining_in_schedule(active, wall)),
        };
    }

    BlockVerdict::allow()
}
