//! Per-tier counters kept by the dispatcher.

use crate::task::Tier;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounters {
    pub assigned: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Process-lifetime dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub pool: TierCounters,
    pub fast: TierCounters,
    pub last_resort: TierCounters,
    /// Tasks parked as pending approval.
    pub escalated: u64,
    /// Tasks pushed onto the retry queue after a bridge failure.
    pub requeued: u64,
    /// Tier-1 attempts replaced by an injected fault.
    pub synthetic_faults: u64,
}

impl DispatchStats {
    pub fn tier(&self, tier: Tier) -> &TierCounters {
        match tier {
            Tier::Pool => &self.pool,
            Tier::Fast => &self.fast,
            Tier::LastResort => &self.last_resort,
        }
    }

    pub fn tier_mut(&mut self, tier: Tier) -> &mut TierCounters {
        match tier {
            Tier::Pool => &mut self.pool,
            Tier::Fast => &mut self.fast,
            Tier::LastResort => &mut self.last_resort,
        }
    }
}
