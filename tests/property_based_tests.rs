mod common;

use common::strategies::*;
use healthwatch_core::cluster::{quorum_met, quorum_size};
use healthwatch_core::orchestration::{aggregate_status, OverallStatus, Summary};
use healthwatch_core::probe::{CheckResult, CheckStatus};
use proptest::prelude::*;

proptest! {
    /// Property: a pass is Unhealthy exactly when some critical check errored
    #[test]
    fn unhealthy_iff_critical_error(outcomes in check_outcomes_strategy()) {
        let critical_error = outcomes
            .iter()
            .any(|(critical, status)| *critical && *status == CheckStatus::Error);
        let overall = aggregate_status(outcomes.iter().copied());
        prop_assert_eq!(overall == OverallStatus::Unhealthy, critical_error);
    }

    /// Property: Healthy only when every check is Healthy
    #[test]
    fn healthy_iff_all_healthy(outcomes in check_outcomes_strategy()) {
        let all_healthy = outcomes.iter().all(|(_, s)| *s == CheckStatus::Healthy);
        let overall = aggregate_status(outcomes.iter().copied());
        prop_assert_eq!(overall == OverallStatus::Healthy, all_healthy);
    }

    /// Property: summary buckets partition the results
    #[test]
    fn summary_buckets_partition(outcomes in check_outcomes_strategy()) {
        let results: Vec<CheckResult> = outcomes
            .iter()
            .map(|(_, status)| CheckResult::new(*status, "generated"))
            .collect();
        let summary = Summary::from_results(results.iter());

        prop_assert_eq!(summary.total, results.len());
        prop_assert_eq!(summary.healthy + summary.degraded + summary.errors, summary.total);
        prop_assert!(summary.healthy_percentage >= 0.0 && summary.healthy_percentage <= 100.0);
    }

    /// Property: quorum is a strict majority and never undercut by configuration
    #[test]
    fn quorum_is_majority(total in 1usize..16, reachable in 0usize..16, configured in prop::option::of(1usize..16)) {
        let reachable = reachable.min(total);
        let size = quorum_size(total, configured);
        prop_assert!(size > total / 2);
        prop_assert_eq!(quorum_met(reachable, total, configured), reachable >= size);
    }

    /// Property: healthy percentage matches the healthy count to two decimals
    #[test]
    fn healthy_percentage_tracks_counts(outcomes in check_outcomes_strategy()) {
        let results: Vec<CheckResult> = outcomes
            .iter()
            .map(|(_, status)| CheckResult::new(*status, "generated"))
            .collect();
        let summary = Summary::from_results(results.iter());

        if summary.total == 0 {
            prop_assert_eq!(summary.healthy_percentage, 0.0);
        } else {
            let expected = summary.healthy as f64 * 100.0 / summary.total as f64;
            prop_assert!((summary.healthy_percentage - expected).abs() <= 0.005 + 1e-9);
        }
        prop_assert_eq!(
            summary.healthy_percentage == 100.0,
            summary.total > 0 && summary.healthy == summary.total
        );
    }
}
