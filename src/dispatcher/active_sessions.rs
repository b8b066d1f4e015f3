//! Per-session metadata registry backing the `/streaming` endpoint.
//!
//! [`SessionTable`] only counts live sessions per MAC for scheduling and
//! admission control; it deliberately carries no identity. `GET
//! /streaming` (§6) needs the richer `{portal_id: [{portal_name,
//! channel_name, mac, client, start_time}]}` shape, so this is a second,
//! independent registry keyed by the same [`super::session_table::SessionId`],
//! mirroring the teacher's split between a counting structure and a
//! metrics/metadata one (`relay_manager` vs. `session_tracker`).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::session_table::SessionId;

/// One entry of the `/streaming` response body.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub portal_name: String,
    pub channel_name: String,
    pub mac: String,
    pub client: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Default)]
pub struct ActiveSessions {
    inner: Mutex<HashMap<Uuid, (String, SessionInfo)>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        session: SessionId,
        portal_id: &str,
        portal_name: &str,
        channel_name: &str,
        mac: &str,
        client: &str,
    ) {
        let info = SessionInfo {
            portal_name: portal_name.to_string(),
            channel_name: channel_name.to_string(),
            mac: mac.to_string(),
            client: client.to_string(),
            start_time: Utc::now(),
        };
        self.inner
            .lock()
            .expect("active sessions mutex poisoned")
            .insert(session.0, (portal_id.to_string(), info));
    }

    pub fn deregister(&self, session: SessionId) {
        self.inner
            .lock()
            .expect("active sessions mutex poisoned")
            .remove(&session.0);
    }

    /// `{portal_id: [SessionInfo, ...]}`, the exact shape `/streaming` returns.
    pub fn snapshot(&self) -> HashMap<String, Vec<SessionInfo>> {
        let guard = self.inner.lock().expect("active sessions mutex poisoned");
        let mut out: HashMap<String, Vec<SessionInfo>> = HashMap::new();
        for (portal_id, info) in guard.values() {
            out.entry(portal_id.clone()).or_default().push(info.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_groups_by_portal() {
        let sessions = ActiveSessions::new();
        let s1 = SessionId(Uuid::new_v4());
        let s2 = SessionId(Uuid::new_v4());
        sessions.register(s1, "p1", "Portal One", "CNN", "00:1A:2B:3C:4D:5E", "1.2.3.4");
        sessions.register(s2, "p1", "Portal One", "BBC", "00:1A:2B:3C:4D:5F", "1.2.3.5");

        let snapshot = sessions.snapshot();
        assert_eq!(snapshot["p1"].len(), 2);

        sessions.deregister(s1);
        assert_eq!(sessions.snapshot()["p1"].len(), 1);
    }
}
