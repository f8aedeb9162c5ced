use healthwatch_core::probe::CheckStatus;
use proptest::prelude::*;

/// Strategy for generating check statuses
pub fn check_status_strategy() -> impl Strategy<Value = CheckStatus> {
    prop_oneof![
        Just(CheckStatus::Healthy),
        Just(CheckStatus::Degraded),
        Just(CheckStatus::Error),
    ]
}

/// Strategy for generating `(critical, status)` pairs for a whole pass
pub fn check_outcomes_strategy() -> impl Strategy<Value = Vec<(bool, CheckStatus)>> {
    prop::collection::vec((any::<bool>(), check_status_strategy()), 0..24)
}

