use crate::config::{CommitConfig, CommitModeName};

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Never,
    Periodic { every_batches: usize, every: Duration },
    ExplicitFinal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    mode: CommitMode,
    hard: bool,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self::explicit_final()
    }
}

impl CommitPolicy {
    pub fn new(mode: CommitMode, hard: bool) -> Self {
        Self { mode, hard }
    }

    pub fn never() -> Self {
        Self::new(CommitMode::Never, false)
    }

    pub fn explicit_final() -> Self {
        Self::new(CommitMode::ExplicitFinal, true)
    }

    /// A zero count or a zero interval disables that trigger.
    pub fn periodic(every_batches: usize, every: Duration) -> Self {
        Self::new(
            CommitMode::Periodic {
                every_batches,
                every,
            },
            true,
        )
    }

    pub fn from_config(config: &CommitConfig) -> Self {
        let mode = match config.mode {
            CommitModeName::Never => CommitMode::Never,
            CommitModeName::Periodic => CommitMode::Periodic {
                every_batches: config.every_batches,
                every: Duration::from_millis(config.every_ms),
            },
            CommitModeName::ExplicitFinal => CommitMode::ExplicitFinal,
        };
        Self::new(mode, config.hard)
    }

    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    pub fn hard(&self) -> bool {
        self.hard
    }

    /// `batch_index` is the 0-based count of batches completed so far, so the
    /// Nth completed batch has index N - 1.
    pub fn should_commit_now(&self, batch_index: usize, elapsed_since_last_commit: Duration) -> bool {
        match self.mode {
            CommitMode::Periodic {
                every_batches,
                every,
            } => {
                let by_count = every_batches > 0 && (batch_index + 1) % every_batches == 0;
                let by_time = !every.is_zero() && elapsed_since_last_commit >= every;
                by_count || by_time
            }
            CommitMode::Never | CommitMode::ExplicitFinal => false,
        }
    }

    pub fn commit_after_run(&self) -> bool {
        self.mode == CommitMode::ExplicitFinal
    }
}
