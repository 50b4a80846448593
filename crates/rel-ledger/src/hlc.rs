use std::sync::Mutex;

use rel_types::TemporalAnchor;

/// Hybrid logical clock stamping units of work.
///
/// Each call to [`now`](Self::now) returns an anchor strictly greater than
/// the last one, whether the wall clock advanced, stalled, or stepped back.
/// After a reopen the ledger feeds the newest recorded history anchor through
/// [`observe`](Self::observe) so new history IDs sort after the replayed ones.
pub struct HybridLogicalClock {
    node_id: u16,
    wall: fn() -> u64,
    /// `(physical_ms, logical)` of the last anchor handed out.
    last: Mutex<(u64, u32)>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self::with_wall_clock(node_id, TemporalAnchor::wall_clock_ms)
    }

    /// A clock reading physical time from `wall` instead of the system clock.
    pub fn with_wall_clock(node_id: u16, wall: fn() -> u64) -> Self {
        Self {
            node_id,
            wall,
            last: Mutex::new((0, 0)),
        }
    }

    pub fn now(&self) -> TemporalAnchor {
        let mut last = self.last.lock().expect("clock mutex poisoned");
        self.tick(&mut last)
    }

    /// Move past `seen` and return the next local anchor.
    pub fn observe(&self, seen: &TemporalAnchor) -> TemporalAnchor {
        let mut last = self.last.lock().expect("clock mutex poisoned");
        if (seen.physical_ms, seen.logical) > *last {
            *last = (seen.physical_ms, seen.logical);
        }
        self.tick(&mut last)
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn tick(&self, last: &mut (u64, u32)) -> TemporalAnchor {
        let wall = (self.wall)();
        *last = if wall > last.0 {
            (wall, 0)
        } else {
            (last.0, last.1 + 1)
        };
        TemporalAnchor::new(last.0, last.1, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAR_FUTURE: u64 = 9_999_999_999_999;

    #[test]
    fn strictly_increasing() {
        let clock = HybridLogicalClock::new(1);
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev, "{prev} then {next}");
            prev = next;
        }
    }

    #[test]
    fn stalled_wall_clock_bumps_logical() {
        let clock = HybridLogicalClock::new(1);
        *clock.last.lock().unwrap() = (FAR_FUTURE, 0);
        let a = clock.now();
        let b = clock.now();
        assert_eq!((a.physical_ms, a.logical), (FAR_FUTURE, 1));
        assert_eq!((b.physical_ms, b.logical), (FAR_FUTURE, 2));
        assert!(a.sort_key() < b.sort_key());
    }

    #[test]
    fn observe_moves_past_replayed_anchor() {
        let clock = HybridLogicalClock::new(1);
        let replayed = TemporalAnchor::new(FAR_FUTURE, 10, 2);
        let next = clock.observe(&replayed);
        assert_eq!((next.physical_ms, next.logical), (FAR_FUTURE, 11));
        assert!(clock.now() > next);
    }

    #[test]
    fn pinned_wall_clock_counts_logically() {
        let clock = HybridLogicalClock::with_wall_clock(2, || FAR_FUTURE);
        let first = clock.now();
        assert_eq!((first.physical_ms, first.logical), (FAR_FUTURE, 0));
        assert_eq!(clock.now().logical, 1);
    }

    #[test]
    fn observe_ignores_older_anchor() {
        let clock = HybridLogicalClock::new(4);
        *clock.last.lock().unwrap() = (FAR_FUTURE, 5);
        let next = clock.observe(&TemporalAnchor::new(1_000, 99, 2));
        assert_eq!((next.physical_ms, next.logical), (FAR_FUTURE, 6));
        assert_eq!(next.node_id, 4);
    }

    #[test]
    fn unique_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(HybridLogicalClock::new(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..100).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
