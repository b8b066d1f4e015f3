//! In-memory `MAC → {session_id set}` accounting (§3, §5).
//!
//! A single mutex guards all increments/decrements, matching the design's
//! explicit "strictly serializable" requirement for reservation. Grounded
//! in the teacher's `session_tracker.rs`, simplified to per-MAC counting
//! rather than per-relay client bookkeeping since the dispatcher here
//! tracks one FFmpeg process per session, not a shared buffer's clients.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

#[derive(Debug, Default)]
struct MacSessions {
    session_ids: Vec<Uuid>,
}

/// Tracks live session counts per MAC address across an entire process.
#[derive(Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<String, MacSessions>>,
}

/// A reservation held for the lifetime of one stream session. Dropping or
/// calling [`SessionTable::release`] frees the slot.
#[derive(Debug, Clone, Copy)]
pub struct SessionId(pub Uuid);

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserves a slot for `mac` if current live count is below
    /// `playback_limit` (0 treated as 1, per §4.H). Returns `None` if the
    /// MAC is already at capacity.
    pub fn try_reserve(&self, mac: &str, playback_limit: i64) -> Option<SessionId> {
        let limit = if playback_limit <= 0 { 1 } else { playback_limit } as usize;
        let mut guard = self.inner.lock().expect("session table mutex poisoned");
        let entry = guard.entry(mac.to_string()).or_default();
        if entry.session_ids.len() >= limit {
            return None;
        }
        let id = Uuid::new_v4();
        entry.session_ids.push(id);
        Some(SessionId(id))
    }

    pub fn release(&self, mac: &str) {
        let mut guard = self.inner.lock().expect("session table mutex poisoned");
        if let Some(entry) = guard.get_mut(mac) {
            // Release is best-effort FIFO; callers track their own SessionId
            // for exact removal when they need it (`release_session`).
            entry.session_ids.pop();
            if entry.session_ids.is_empty() {
                guard.remove(mac);
            }
        }
    }

    pub fn release_session(&self, mac: &str, session: SessionId) {
        let mut guard = self.inner.lock().expect("session table mutex poisoned");
        if let Some(entry) = guard.get_mut(mac) {
            entry.session_ids.retain(|id| *id != session.0);
            if entry.session_ids.is_empty() {
                guard.remove(mac);
            }
        }
    }

    pub fn live_count(&self, mac: &str) -> i64 {
        let guard = self.inner.lock().expect("session table mutex poisoned");
        guard.get(mac).map(|e| e.session_ids.len() as i64).unwrap_or(0)
    }

    pub fn total_live_count(&self) -> i64 {
        let guard = self.inner.lock().expect("session table mutex poisoned");
        guard.values().map(|e| e.session_ids.len() as i64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reserve_respects_playback_limit() {
        let table = SessionTable::new();
        assert!(table.try_reserve("A", 2).is_some());
        assert!(table.try_reserve("A", 2).is_some());
        assert!(table.try_reserve("A", 2).is_none());
        assert_eq!(table.live_count("A"), 2);
    }

    #[test]
    fn zero_limit_treated_as_one() {
        let table = SessionTable::new();
        assert!(table.try_reserve("A", 0).is_some());
        assert!(table.try_reserve("A", 0).is_none());
    }

    #[test]
    fn release_session_frees_exact_slot() {
        let table = SessionTable::new();
        let s1 = table.try_reserve("A", 2).unwrap();
        let _s2 = table.try_reserve("A", 2).unwrap();
        table.release_session("A", s1);
        assert_eq!(table.live_count("A"), 1);
    }

    /// Property 5: concurrent reservations never exceed `playback_limit`.
    #[test]
    fn concurrent_reservations_never_exceed_limit() {
        let table = Arc::new(SessionTable::new());
        let limit = 3i64;
        let attempts = 50;
        let mut handles = Vec::new();
        for _ in 0..attempts {
            let table = table.clone();
            handles.push(thread::spawn(move || table.try_reserve("A", limit).is_some()));
        }
        let granted: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert!(granted as i64 <= limit);
        assert_eq!(table.live_count("A"), granted as i64);
    }

    proptest! {
        /// Property 5, generalized: for any limit/attempt-count pair, no
        /// number of concurrent `try_reserve` callers can ever push the
        /// live count past `playback_limit` (0 treated as 1).
        #[test]
        fn no_overselection_for_any_limit_and_attempts(limit in 1i64..8, attempts in 1usize..40) {
            let table = Arc::new(SessionTable::new());
            let mut handles = Vec::new();
            for _ in 0..attempts {
                let table = table.clone();
                handles.push(thread::spawn(move || table.try_reserve("A", limit).is_some()));
            }
            let granted: usize = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|granted| *granted)
                .count();
            prop_assert!(granted as i64 <= limit);
            prop_assert_eq!(table.live_count("A"), granted as i64);
        }
    }
}
