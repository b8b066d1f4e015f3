//! EPG Source Manager (§4.E).
//!
//! Owns the `epg_sources`/`epg_channels` rows (via
//! [`crate::database::repositories::EpgSourceRepository`]) and one
//! [`store::ProgrammeStore`] per source. Per-source refreshes are
//! coalesced through a `tokio::sync::Mutex` keyed by `source_id`, and a
//! semaphore bounds how many sources refresh concurrently — the same
//! per-key-mutex-plus-global-cap shape the teacher uses for portal
//! refreshes, just scoped to EPG sources here.

pub mod programme;
pub mod store;
pub mod xmltv;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::config::defaults::{
    DEFAULT_EPG_DOWNLOAD_TIMEOUT_SECS, DEFAULT_EPG_GLOBAL_REFRESH_CONCURRENCY, DEFAULT_EPG_RETENTION_DAYS,
};
use crate::database::repositories::EpgSourceRepository;
use crate::entities::epg_source;
use crate::errors::EpgError;
use store::ProgrammeStore;
use xmltv::parse_xmltv;

pub struct EpgSourceManager {
    repo: EpgSourceRepository,
    sources_dir: PathBuf,
    stores: Mutex<HashMap<String, Arc<ProgrammeStore>>>,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    refreshing: Mutex<HashSet<String>>,
    concurrency: Arc<Semaphore>,
    http: reqwest::Client,
}

/// Outcome of one source's refresh, for the HTTP surface's `/api/epg/status`.
#[derive(Debug, Clone)]
pub struct RefreshStats {
    pub source_id: String,
    pub channels_committed: usize,
    pub programmes_committed: usize,
    pub programmes_expired: u64,
    pub parse_errors: usize,
}

impl EpgSourceManager {
    pub fn new(repo: EpgSourceRepository, sources_dir: PathBuf) -> Self {
        Self {
            repo,
            sources_dir,
            stores: Mutex::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            refreshing: Mutex::new(HashSet::new()),
            concurrency: Arc::new(Semaphore::new(DEFAULT_EPG_GLOBAL_REFRESH_CONCURRENCY)),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(DEFAULT_EPG_DOWNLOAD_TIMEOUT_SECS))
                .build()
                .expect("building epg http client"),
        }
    }

    async fn store_for(&self, source_id: &str) -> Result<Arc<ProgrammeStore>, EpgError> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(source_id) {
            return Ok(store.clone());
        }
        let path = self.sources_dir.join(format!("{source_id}.db"));
        let store = Arc::new(ProgrammeStore::open(path).await?);
        stores.insert(source_id.to_string(), store.clone());
        Ok(store)
    }

    async fn lock_for(&self, source_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Refreshes every enabled source whose `interval_hours` has elapsed
    /// since `last_fetch` (the catalog-loop caller is expected to have
    /// already filtered by interval; `force` bypasses that check but not
    /// the per-source mutex, per §4.J).
    pub async fn refresh(&self, source_id: &str, force: bool) -> Result<RefreshStats, EpgError> {
        let _permit = self.concurrency.acquire().await.expect("semaphore not closed");
        let lock = self.lock_for(source_id).await;
        let _guard = lock.lock().await;

        let Some(source) = self.repo.get(source_id).await.map_err(to_epg_error)? else {
            return Err(EpgError::FetchFailed {
                source_id: source_id.to_string(),
                message: "unknown epg source".to_string(),
            });
        };
        if !source.enabled && !force {
            return Err(EpgError::FetchFailed {
                source_id: source_id.to_string(),
                message: "source disabled".to_string(),
            });
        }

        self.refreshing.lock().await.insert(source_id.to_string());
        let result = self.refresh_source(&source).await;
        self.refreshing.lock().await.remove(source_id);
        result
    }

    /// Whether `source_id` is currently mid-refresh.
    pub async fn is_refreshing(&self, source_id: &str) -> bool {
        self.refreshing.lock().await.contains(source_id)
    }

    /// Whether any source is currently mid-refresh, for the top-level
    /// `is_refreshing` flag on `/api/epg/status`.
    pub async fn any_refreshing(&self) -> bool {
        !self.refreshing.lock().await.is_empty()
    }

    async fn refresh_source(&self, source: &epg_source::Model) -> Result<RefreshStats, EpgError> {
        let body = fetch_document(&self.http, &source.url).await?;
        let store = self.store_for(&source.source_id).await?;

        let mut channels = Vec::new();
        let mut programmes = Vec::new();
        let mut parse_errors = 0usize;

        parse_xmltv(
            &source.source_id,
            &body,
            |channel| channels.push(channel),
            |programme| programmes.push(programme),
            |_err| parse_errors += 1,
        )?;

        // Upserted inline rather than spawned: parsing already ran
        // sequentially above, so there's no concurrency to gain, and
        // `channels_committed`/`mark_fetched` below must observe every
        // write having actually landed.
        let mut channels_committed = 0usize;
        for channel in &channels {
            let aliases = &channel.display_names;
            let display_name = channel.display_names.first().map(String::as_str);
            match self
                .repo
                .upsert_channel(
                    &source.source_id,
                    &channel.channel_id,
                    display_name,
                    channel.icon.as_deref(),
                    channel.lcn.as_deref(),
                    aliases,
                )
                .await
            {
                Ok(()) => channels_committed += 1,
                Err(err) => warn!(
                    source_id = %source.source_id,
                    channel_id = %channel.channel_id,
                    %err,
                    "failed to upsert epg channel"
                ),
            }
        }

        let programmes_committed = store.insert_batched(&programmes).await?;
        let programmes_expired = store.delete_expired(DEFAULT_EPG_RETENTION_DAYS, Utc::now()).await?;

        let committed_anything = channels_committed > 0 || programmes_committed > 0;
        self.repo
            .mark_fetched(&source.source_id, committed_anything)
            .await
            .map_err(to_epg_error)?;

        info!(
            source_id = %source.source_id,
            channels_committed,
            programmes_committed,
            programmes_expired,
            parse_errors,
            "epg source refreshed"
        );

        Ok(RefreshStats {
            source_id: source.source_id.clone(),
            channels_committed,
            programmes_committed,
            programmes_expired,
            parse_errors,
        })
    }

    pub fn store_path(&self, source_id: &str) -> PathBuf {
        self.sources_dir.join(format!("{source_id}.db"))
    }

    pub async fn store_handle(&self, source_id: &str) -> Result<Arc<ProgrammeStore>, EpgError> {
        self.store_for(source_id).await
    }

    pub fn repository(&self) -> &EpgSourceRepository {
        &self.repo
    }
}

fn to_epg_error(err: crate::errors::AppError) -> EpgError {
    EpgError::FetchFailed {
        source_id: "unknown".to_string(),
        message: err.to_string(),
    }
}

/// Fetches `url`, following redirects (reqwest's default client behavior),
/// and transparently gunzips the body when either `Content-Encoding: gzip`
/// or the gzip magic bytes (`1f 8b`) are present — some portals serve a
/// gzip body without the matching header.
async fn fetch_document(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, EpgError> {
    let response = client.get(url).send().await.map_err(|e| EpgError::FetchFailed {
        source_id: url.to_string(),
        message: e.to_string(),
    })?;
    if !response.status().is_success() {
        return Err(EpgError::FetchFailed {
            source_id: url.to_string(),
            message: format!("http status {}", response.status()),
        });
    }
    let is_gzip_header = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);

    let bytes = response.bytes().await.map_err(|e| EpgError::FetchFailed {
        source_id: url.to_string(),
        message: e.to_string(),
    })?;

    let is_gzip_magic = bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b;

    if is_gzip_header || is_gzip_magic {
        decode_gzip(&bytes, url)
    } else {
        Ok(bytes.to_vec())
    }
}

#[cfg(feature = "compression-gzip")]
fn decode_gzip(bytes: &[u8], url: &str) -> Result<Vec<u8>, EpgError> {
    use std::io::Read;
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| EpgError::FetchFailed {
        source_id: url.to_string(),
        message: format!("gzip decode failed: {e}"),
    })?;
    Ok(out)
}

#[cfg(not(feature = "compression-gzip"))]
fn decode_gzip(_bytes: &[u8], url: &str) -> Result<Vec<u8>, EpgError> {
    Err(EpgError::FetchFailed {
        source_id: url.to_string(),
        message: "document is gzip-compressed but this build has no gzip support".to_string(),
    })
}
