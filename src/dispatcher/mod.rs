//! Stream Dispatcher (§4.I).
//!
//! Drives one playback request through ACCEPTED → PIPING → FAILOVER →
//! ERRORED/CLOSED. FFmpeg process management (spawn, piped stdout, stderr
//! logged, `kill_on_drop`) is grounded in the teacher's `FfmpegWrapper`;
//! this dispatcher is deliberately simpler — one child process piped
//! directly to one HTTP response, no cyclic buffer or multi-client relay,
//! since §4.I specifies exactly that shape.

pub mod active_sessions;
pub mod session_table;
pub mod state;

use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

use crate::config::defaults::{DEFAULT_STREAM_KILL_GRACE_SECS, DEFAULT_STREAM_STARTUP_GRACE_SECS};
use crate::errors::{PortalError, WebError};
use crate::portal::client::PortalClient;
use crate::scheduler::MacCandidate;
use session_table::{SessionId, SessionTable};
pub use state::SessionState;

/// A successfully dispatched stream: the MAC it landed on, the reservation
/// held against it, the piping FFmpeg child, and the single byte the
/// startup-grace probe already consumed from its stdout (must be replayed
/// before any further reads, or the client's first output byte is lost).
pub struct DispatchedStream {
    pub mac: String,
    pub session_id: SessionId,
    pub child: Child,
    pub probed_byte: Bytes,
}

/// Tries MACs in `candidates` order until one yields a piping FFmpeg child.
///
/// Mirrors the `try_mac` contract from the design notes: each attempt
/// returns `Success | RetryWithNext | Fatal`, modeled here as
/// `Ok(Child)` / `Ok via continue` / early `Err`.
pub async fn dispatch(
    portal_base_url: &str,
    proxy: Option<&str>,
    candidates: Vec<MacCandidate>,
    channel_id: &str,
    ffmpeg_path: &str,
    sessions: &SessionTable,
) -> Result<DispatchedStream, WebError> {
    if candidates.is_empty() {
        return Err(WebError::StreamUnavailable {
            portal_id: portal_base_url.to_string(),
            channel_id: channel_id.to_string(),
        });
    }

    for candidate in candidates {
        let mac = candidate.mac_address.clone();
        let Some(reservation) = sessions.try_reserve(&mac, candidate.playback_limit) else {
            // Lost the race against another request for this MAC; move on.
            continue;
        };

        match try_mac(portal_base_url, proxy, &mac, channel_id, ffmpeg_path).await {
            Ok((child, probed_byte)) => {
                return Ok(DispatchedStream {
                    mac,
                    session_id: reservation,
                    child,
                    probed_byte,
                })
            }
            Err(TryMacOutcome::RetryWithNext(reason)) => {
                warn!(mac = %mac, channel_id, %reason, "mac failed over, trying next");
                sessions.release_session(&mac, reservation);
                continue;
            }
            Err(TryMacOutcome::Fatal(reason)) => {
                sessions.release_session(&mac, reservation);
                error!(mac = %mac, channel_id, %reason, "dispatch failed fatally");
                return Err(WebError::Upstream(reason));
            }
        }
    }

    Err(WebError::StreamUnavailable {
        portal_id: portal_base_url.to_string(),
        channel_id: channel_id.to_string(),
    })
}

enum TryMacOutcome {
    RetryWithNext(String),
    Fatal(String),
}

async fn try_mac(
    portal_base_url: &str,
    proxy: Option<&str>,
    mac: &str,
    channel_id: &str,
    ffmpeg_path: &str,
) -> Result<(Child, Bytes), TryMacOutcome> {
    let mut client = PortalClient::new(portal_base_url, mac, proxy)
        .map_err(|e| TryMacOutcome::RetryWithNext(e.to_string()))?;

    client
        .get_token()
        .await
        .map_err(retry_unless_auth)?;

    // Profile fetch is best-effort: a failure here does not block playback.
    let _ = client.get_profile().await;

    let link = client.get_link(channel_id).await.map_err(|err| match err {
        PortalError::NoLink { .. } => TryMacOutcome::RetryWithNext(err.to_string()),
        other if other.is_retryable() => TryMacOutcome::RetryWithNext(other.to_string()),
        other => TryMacOutcome::Fatal(other.to_string()),
    })?;

    spawn_ffmpeg(ffmpeg_path, &link).await
}

fn retry_unless_auth(err: PortalError) -> TryMacOutcome {
    match err {
        PortalError::AuthFailed(_) => TryMacOutcome::RetryWithNext(err.to_string()),
        other => TryMacOutcome::RetryWithNext(other.to_string()),
    }
}

async fn spawn_ffmpeg(ffmpeg_path: &str, input_url: &str) -> Result<(Child, Bytes), TryMacOutcome> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(["-i", input_url, "-c", "copy", "-f", "mpegts", "pipe:1"]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| TryMacOutcome::RetryWithNext(format!("spawning ffmpeg: {e}")))?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(log_ffmpeg_stderr(stderr));
    }

    // Startup grace: if ffmpeg exits (or produces nothing) within the grace
    // window, this MAC/link is treated as a failed attempt, not a fatal one.
    // The probed byte is real stream output, not a throwaway ping, so the
    // caller must replay it ahead of the first `pipe_stdout_to` read.
    let mut probed_byte = Bytes::new();
    if let Some(stdout) = child.stdout.as_mut() {
        let mut probe = [0u8; 1];
        let read = tokio::time::timeout(
            Duration::from_secs(DEFAULT_STREAM_STARTUP_GRACE_SECS),
            stdout.read(&mut probe),
        )
        .await;
        match read {
            Ok(Ok(0)) => {
                let _ = child.kill().await;
                return Err(TryMacOutcome::RetryWithNext(
                    "ffmpeg produced no bytes before eof".to_string(),
                ));
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(TryMacOutcome::RetryWithNext(format!(
                    "ffmpeg stdout read error: {e}"
                )));
            }
            Err(_timed_out) => {
                let _ = child.kill().await;
                return Err(TryMacOutcome::RetryWithNext(
                    "ffmpeg did not produce bytes within startup grace".to_string(),
                ));
            }
            Ok(Ok(n)) => probed_byte = Bytes::copy_from_slice(&probe[..n]),
        }
    }

    Ok((child, probed_byte))
}

async fn log_ffmpeg_stderr(stderr: tokio::process::ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "ffmpeg", "{line}");
    }
}

/// Sends SIGTERM, waits up to `DEFAULT_STREAM_KILL_GRACE_SECS`, then SIGKILL.
/// Invoked on client disconnect or explicit session teardown (§5 cancellation).
pub async fn terminate_with_grace(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: `pid` is this child's own pid, obtained from `Child::id`,
        // and `kill` is a plain syscall wrapper with no invariants beyond a
        // valid signal number.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }

    let graced = tokio::time::timeout(
        Duration::from_secs(DEFAULT_STREAM_KILL_GRACE_SECS),
        child.wait(),
    )
    .await;

    if graced.is_err() {
        let _ = child.kill().await;
    }
}

/// Reads FFmpeg stdout and forwards chunks to `tx` until EOF or the
/// receiver is dropped (client disconnected); the bounded channel's backlog
/// provides backpressure, matching §5's "never buffer for a slow client"
/// rule. Always tears the child down with [`terminate_with_grace`] on the
/// way out, whichever side ended the stream.
///
/// `probed_byte` is the byte (if any) [`spawn_ffmpeg`]'s startup-grace probe
/// already consumed from this same stdout; it is sent ahead of the read
/// loop so the client sees the full, unbroken MPEG-TS output.
pub async fn pipe_stdout_to(mut child: Child, probed_byte: Bytes, tx: tokio::sync::mpsc::Sender<Bytes>) {
    let Some(mut stdout) = child.stdout.take() else {
        return;
    };
    if !probed_byte.is_empty() && tx.send(probed_byte).await.is_err() {
        terminate_with_grace(&mut child).await;
        return;
    }
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "ffmpeg stdout read error, ending stream");
                break;
            }
        }
    }
    terminate_with_grace(&mut child).await;
}
