//! Commit Policy Tests

#[cfg(test)]
mod tests {
    use crate::commit::policy::{CommitMode, CommitPolicy};
    use crate::config::{CommitConfig, CommitModeName};
    use std::time::Duration;

    #[test]
    fn test_never_and_explicit_final_do_not_commit_mid_run() {
        for policy in [CommitPolicy::never(), CommitPolicy::explicit_final()] {
            for index in 0..50 {
                assert!(!policy.should_commit_now(index, Duration::from_secs(3600)));
            }
        }
    }

    #[test]
    fn test_only_explicit_final_commits_after_run() {
        assert!(CommitPolicy::explicit_final().commit_after_run());
        assert!(!CommitPolicy::never().commit_after_run());
        assert!(!CommitPolicy::periodic(2, Duration::from_secs(1)).commit_after_run());
    }

    #[test]
    fn test_periodic_fires_every_nth_batch() {
        let policy = CommitPolicy::periodic(3, Duration::ZERO);

        let fired: Vec<usize> = (0..9)
            .filter(|&index| policy.should_commit_now(index, Duration::ZERO))
            .collect();

        // The 3rd, 6th and 9th completed batches
        assert_eq!(fired, vec![2, 5, 8]);
    }

    #[test]
    fn test_periodic_fires_on_elapsed_time_first() {
        let policy = CommitPolicy::periodic(100, Duration::from_millis(500));

        assert!(!policy.should_commit_now(0, Duration::from_millis(499)));
        assert!(policy.should_commit_now(0, Duration::from_millis(500)));
    }

    #[test]
    fn test_from_config_maps_modes() {
        let config = CommitConfig {
            mode: CommitModeName::Periodic,
            every_batches: 4,
            every_ms: 250,
            hard: false,
        };

        let policy = CommitPolicy::from_config(&config);

        assert_eq!(
            policy.mode(),
            CommitMode::Periodic {
                every_batches: 4,
                every: Duration::from_millis(250)
            }
        );
        assert!(!policy.hard());
        assert_eq!(
            CommitPolicy::from_config(&CommitConfig::default()),
            CommitPolicy::explicit_final()
        );
    }
}
