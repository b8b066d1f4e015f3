//! MAC Scheduler (§4.H).
//!
//! A pure scoring/selection function over the MAC rows of one portal plus
//! the Stream Dispatcher's live session counts. Never touches the database
//! or the network itself — callers gather the inputs and get back an
//! ordered slice to try, same separation of concerns the teacher keeps
//! between its scoring utilities and its I/O-bound services.

use chrono::NaiveDate;

use crate::config::SchedulerWeights;
use crate::entities::mac;

/// One candidate MAC, carrying just what selection needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MacCandidate {
    pub mac_address: String,
    pub watchdog_timeout_seconds: i64,
    pub playback_limit: i64,
    pub expires_at: Option<NaiveDate>,
    pub live_sessions: i64,
}

impl MacCandidate {
    pub fn from_model(model: &mac::Model, live_sessions: i64) -> Self {
        Self {
            mac_address: model.mac_address.clone(),
            watchdog_timeout_seconds: model.watchdog_timeout_seconds,
            playback_limit: model.playback_limit,
            expires_at: model.expires_at,
            live_sessions,
        }
    }

    /// As [`Self::from_model`], but caps `playback_limit` at the portal's
    /// configured `streams per mac` when both are known (§9 Open Question:
    /// the source treats the lesser of the two as the hard cap). A zero
    /// `streams_per_mac` means "no portal-level cap configured" and the
    /// portal-reported `playback_limit` is used as-is.
    pub fn from_model_capped(model: &mac::Model, live_sessions: i64, streams_per_mac: i64) -> Self {
        let mut candidate = Self::from_model(model, live_sessions);
        if streams_per_mac > 0 {
            candidate.playback_limit = match candidate.playback_limit {
                0 => streams_per_mac,
                limit => limit.min(streams_per_mac),
            };
        }
        candidate
    }

    /// `playback_limit=0` means "unknown", treated as a limit of 1 (§4.H).
    fn effective_limit(&self) -> i64 {
        if self.playback_limit <= 0 {
            1
        } else {
            self.playback_limit
        }
    }

    fn free_slots(&self) -> i64 {
        (self.effective_limit() - self.live_sessions).max(0)
    }

    fn is_busy(&self) -> bool {
        self.live_sessions >= self.effective_limit()
    }

    fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry < today)
    }
}

/// Piecewise idleness curve: longer watchdog timeout means the MAC has been
/// idle longer and is preferred for a new stream.
fn f_idle(watchdog_timeout_seconds: i64) -> f64 {
    match watchdog_timeout_seconds {
        t if t < 60 => 0.0,
        t if t < 300 => 0.3,
        t if t < 1800 => 0.7,
        _ => 1.0,
    }
}

fn score(candidate: &MacCandidate, weights: &SchedulerWeights, today: NaiveDate) -> f64 {
    let closeness_to_expiry = match candidate.expires_at {
        Some(expiry) => {
            let days = (expiry - today).num_days().max(0) as f64;
            // Closer to expiry => closer to 1.0; far out or unknown => 0.0.
            1.0 / (1.0 + days / 30.0)
        }
        None => 0.0,
    };
    let free_slots_ratio = candidate.free_slots() as f64 / candidate.effective_limit().max(1) as f64;

    weights.w_idle * f_idle(candidate.watchdog_timeout_seconds) + weights.w_slots * free_slots_ratio
        - weights.w_expiry * closeness_to_expiry
}

/// Produces an ordered list of MACs to try for a channel request, per §4.H.
///
/// `candidates` should already be restricted to `available_macs ∩
/// portal.macs` for the requested channel; this function additionally
/// filters expired and busy MACs, scores the rest, and orders them
/// highest-score-first with the tie-break chain (more free slots, later
/// expiry, lexicographic MAC).
pub fn select(
    candidates: Vec<MacCandidate>,
    weights: &SchedulerWeights,
    today: NaiveDate,
) -> Vec<MacCandidate> {
    let mut eligible: Vec<MacCandidate> = candidates
        .into_iter()
        .filter(|c| !c.is_expired(today) && !c.is_busy())
        .collect();

    eligible.sort_by(|a, b| {
        let score_a = score(a, weights, today);
        let score_b = score(b, weights, today);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.free_slots().cmp(&a.free_slots()))
            .then_with(|| {
                // Later expiry first; no expiry sorts as "latest".
                match (a.expires_at, b.expires_at) {
                    (Some(ea), Some(eb)) => eb.cmp(&ea),
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            })
            .then_with(|| a.mac_address.cmp(&b.mac_address))
    });

    eligible
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> SchedulerWeights {
        SchedulerWeights {
            w_idle: 1.0,
            w_slots: 0.6,
            w_expiry: 0.4,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn candidate(mac: &str, watchdog: i64, limit: i64, live: i64) -> MacCandidate {
        MacCandidate {
            mac_address: mac.to_string(),
            watchdog_timeout_seconds: watchdog,
            playback_limit: limit,
            expires_at: None,
            live_sessions: live,
        }
    }

    #[test]
    fn s1_idle_mac_preferred_over_busy_watchdog() {
        let a = candidate("A", 10, 2, 0);
        let b = candidate("B", 900, 2, 0);
        let result = select(vec![a, b], &weights(), today());
        assert_eq!(
            result.iter().map(|c| c.mac_address.clone()).collect::<Vec<_>>(),
            vec!["B".to_string(), "A".to_string()]
        );
    }

    #[test]
    fn s2_busy_mac_filtered_out() {
        let a = candidate("A", 900, 2, 2);
        let b = candidate("B", 10, 2, 0);
        let result = select(vec![a, b], &weights(), today());
        assert_eq!(
            result.iter().map(|c| c.mac_address.clone()).collect::<Vec<_>>(),
            vec!["B".to_string()]
        );
    }

    #[test]
    fn zero_playback_limit_treated_as_one() {
        let a = candidate("A", 900, 0, 1);
        assert!(a.is_busy());
        let b = candidate("B", 900, 0, 0);
        assert!(!b.is_busy());
    }

    #[test]
    fn from_model_capped_takes_the_lesser_of_streams_per_mac_and_playback_limit() {
        let model = crate::entities::mac::Model {
            portal_id: "p1".to_string(),
            mac_address: "AA:BB:CC:DD:EE:01".to_string(),
            expires_at: None,
            watchdog_timeout_seconds: 900,
            playback_limit: 4,
            last_profile_fetch_at: None,
        };

        // Portal caps lower than the portal-reported limit.
        let capped = MacCandidate::from_model_capped(&model, 0, 2);
        assert_eq!(capped.playback_limit, 2);

        // Portal cap higher than the portal-reported limit: limit wins.
        let capped = MacCandidate::from_model_capped(&model, 0, 10);
        assert_eq!(capped.playback_limit, 4);

        // No portal cap configured: portal-reported limit is used as-is.
        let capped = MacCandidate::from_model_capped(&model, 0, 0);
        assert_eq!(capped.playback_limit, 4);

        // Unknown portal-reported limit, but a portal cap is configured.
        let mut unknown = model.clone();
        unknown.playback_limit = 0;
        let capped = MacCandidate::from_model_capped(&unknown, 0, 3);
        assert_eq!(capped.playback_limit, 3);
    }

    #[test]
    fn expired_macs_are_excluded() {
        let mut a = candidate("A", 900, 2, 0);
        a.expires_at = Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let result = select(vec![a], &weights(), today());
        assert!(result.is_empty());
    }

    #[test]
    fn deterministic_ordering_is_stable_across_calls() {
        let candidates = vec![
            candidate("C", 900, 2, 0),
            candidate("A", 900, 2, 0),
            candidate("B", 900, 2, 0),
        ];
        let first = select(candidates.clone(), &weights(), today());
        let second = select(candidates, &weights(), today());
        assert_eq!(first, second);
        // Equal scores tie-break lexicographically by MAC.
        assert_eq!(
            first.iter().map(|c| c.mac_address.clone()).collect::<Vec<_>>(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
    }
}
