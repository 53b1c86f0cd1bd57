use std::fmt::{Display, Formatter};

/// Point-in-time snapshot of an [`Executor`](crate::Executor)'s counters.
///
/// A snapshot is returned by [`Executor::stats`](crate::Executor::stats) and
/// is also what every subscriber receives after a task finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Maximum number of tasks allowed to run at the same time.
    pub capacity: usize,
    /// Tasks currently holding a slot.
    pub running: usize,
    /// Callers still waiting for a slot.
    pub queued: usize,
    /// Tasks that have started since the executor was created.
    pub executed: u64,
    /// Tasks that have finished, whether they succeeded, failed or panicked.
    pub completed: u64,
}

impl Stats {
    /// Every slot is occupied, the next submission will have to wait.
    pub fn is_saturated(&self) -> bool {
        self.running >= self.capacity
    }

    /// Nothing is running and nobody is waiting.
    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.queued == 0
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} running, {} queued, {} executed, {} completed",
            self.running, self.capacity, self.queued, self.executed, self.completed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturation() {
        let stats = Stats {
            capacity: 2,
            running: 2,
            queued: 1,
            ..Default::default()
        };

        assert!(stats.is_saturated());
        assert!(!stats.is_idle());
    }

    #[test]
    fn test_display() {
        let stats = Stats {
            capacity: 4,
            running: 1,
            queued: 0,
            executed: 7,
            completed: 6,
        };

        assert_eq!(
            stats.to_string(),
            "1/4 running, 0 queued, 7 executed, 6 completed"
        );
    }
}
