//! Progress reporting for synchronization cycles

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Stage of a synchronization cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncPhase {
    Idle = 0,
    LoadingCache = 1,
    QueryingHost = 2,
    WaitingForRegistry = 3,
    FetchingVersions = 4,
    Finalizing = 5,
    Done = 6,
}

impl SyncPhase {
    const ALL: [SyncPhase; 7] = [
        SyncPhase::Idle,
        SyncPhase::LoadingCache,
        SyncPhase::QueryingHost,
        SyncPhase::WaitingForRegistry,
        SyncPhase::FetchingVersions,
        SyncPhase::Finalizing,
        SyncPhase::Done,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "Idle",
            SyncPhase::LoadingCache => "Loading From Cache...",
            SyncPhase::QueryingHost => "Querying Installed Packages...",
            SyncPhase::WaitingForRegistry => "Waiting For Server...",
            SyncPhase::FetchingVersions => "Fetching New Versions...",
            SyncPhase::Finalizing => "Finalizing...",
            SyncPhase::Done => "Done",
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .unwrap_or(SyncPhase::Idle)
    }
}

/// Progress of the current cycle, readable from any thread at any time.
///
/// The fraction is `completed / total` of the current stage's units of work.
#[derive(Debug, Default)]
pub struct SyncProgress {
    phase: AtomicU8,
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch phase without touching the counters
    pub fn enter(&self, phase: SyncPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Switch phase and restart counting towards `total` units
    pub fn begin(&self, phase: SyncPhase, total: usize) {
        self.completed.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
        self.enter(phase);
    }

    /// Record one finished unit of work
    pub fn advance(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn finish(&self) {
        self.enter(SyncPhase::Done);
    }

    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn label(&self) -> &'static str {
        self.phase().label()
    }

    /// Fraction of the current stage in `[0, 1]`
    pub fn fraction(&self) -> f32 {
        if self.phase() == SyncPhase::Done {
            return 1.0;
        }

        let total = self.total.load(Ordering::Acquire);
        if total == 0 {
            return 0.0;
        }

        let completed = self.completed.load(Ordering::Acquire);
        (completed as f32 / total as f32).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_tracks_completed_units() {
        let progress = SyncProgress::new();
        progress.begin(SyncPhase::FetchingVersions, 4);
        progress.advance();

        assert_eq!(progress.phase(), SyncPhase::FetchingVersions);
        assert_eq!(progress.label(), "Fetching New Versions...");
        assert_eq!(progress.fraction(), 0.25);
    }

    #[test]
    fn begin_resets_counters() {
        let progress = SyncProgress::new();
        progress.begin(SyncPhase::LoadingCache, 1);
        progress.advance();
        assert_eq!(progress.fraction(), 1.0);

        progress.begin(SyncPhase::FetchingVersions, 2);
        assert_eq!(progress.fraction(), 0.0);
    }

    #[test]
    fn enter_keeps_counters() {
        let progress = SyncProgress::new();
        progress.begin(SyncPhase::LoadingCache, 2);
        progress.advance();
        progress.enter(SyncPhase::QueryingHost);
        assert_eq!(progress.fraction(), 0.5);
    }

    #[test]
    fn finished_progress_is_complete() {
        let progress = SyncProgress::new();
        assert_eq!(progress.phase(), SyncPhase::Idle);
        assert_eq!(progress.fraction(), 0.0);

        progress.finish();
        assert_eq!(progress.fraction(), 1.0);
        assert_eq!(progress.label(), "Done");
    }
}
