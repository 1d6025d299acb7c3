//! Content-addressed result cache
//!
//! Maps a fingerprint of the raw input bytes to a previously computed
//! result so byte-identical inputs (a resubmitted video frame, a
//! retried upload) are served from the store instead of recomputed.
//!
//! Keys are namespaced `{kind}:{model_version}:{digest}`. Embedding the
//! model version means an upgraded model never serves results computed
//! by its predecessor; the old namespace simply goes cold and expires.
//!
//! Every operation is best-effort: a store failure downgrades to a miss
//! (or a dropped write) and a log line, never an error to the caller.

use crate::store::KvStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tress_inference::AnalysisReport;

/// Deterministic, collision-resistant digest of raw input bytes.
///
/// SHA-256, hex-encoded. Identical bytes always produce identical keys;
/// a single flipped bit produces an unrelated key.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The result kinds this cache stores, each with its own namespace and TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Full analysis reports
    Analysis,
    /// Ranked style recommendation lists
    Recommendations,
    /// Per-caller session state
    Session,
}

impl CacheKind {
    fn namespace(self) -> &'static str {
        match self {
            CacheKind::Analysis => "analysis",
            CacheKind::Recommendations => "recs",
            CacheKind::Session => "session",
        }
    }
}

/// Per-kind TTLs, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub analysis_ttl_secs: u64,
    pub recommendations_ttl_secs: u64,
    pub session_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            analysis_ttl_secs: 3600,
            recommendations_ttl_secs: 1800,
            session_ttl_secs: 900,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, kind: CacheKind) -> Duration {
        let secs = match kind {
            CacheKind::Analysis => self.analysis_ttl_secs,
            CacheKind::Recommendations => self.recommendations_ttl_secs,
            CacheKind::Session => self.session_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

/// One ranked style suggestion, as cached alongside analysis results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRecommendation {
    pub style_id: String,
    pub name: String,
    /// Relevance in [0, 1]
    pub score: f32,
}

/// Best-effort, TTL-expiring result cache over a [`KvStore`]
pub struct ResultCache {
    store: Arc<dyn KvStore>,
    model_version: String,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>, model_version: impl Into<String>, config: CacheConfig) -> Self {
        Self {
            store,
            model_version: model_version.into(),
            config,
        }
    }

    fn key(&self, kind: CacheKind, digest: &str) -> String {
        format!("{}:{}:{}", kind.namespace(), self.model_version, digest)
    }

    /// Fetch and deserialize, or `None` on miss, decode failure, or
    /// store failure. A cache problem only forgoes the speedup.
    pub async fn get_json<T: DeserializeOwned>(&self, kind: CacheKind, digest: &str) -> Option<T> {
        let key = self.key(kind, digest);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(%key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(%key, error = %e, "cache entry failed to decode, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Serialize and store with the kind's TTL. Returns false (and logs)
    /// on failure instead of raising.
    pub async fn put_json<T: Serialize>(&self, kind: CacheKind, digest: &str, value: &T) -> bool {
        let key = self.key(kind, digest);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%key, error = %e, "cache value failed to serialize, skipping write");
                return false;
            }
        };

        match self.store.put(&key, raw, self.config.ttl(kind)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%key, error = %e, "cache write failed");
                false
            }
        }
    }

    /// Explicitly drop an entry; returns whether one existed
    pub async fn invalidate(&self, kind: CacheKind, digest: &str) -> bool {
        let key = self.key(kind, digest);
        match self.store.delete(&key).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(%key, error = %e, "cache invalidation failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Domain views
    // ------------------------------------------------------------------

    pub async fn get_report(&self, digest: &str) -> Option<AnalysisReport> {
        self.get_json(CacheKind::Analysis, digest).await
    }

    pub async fn put_report(&self, digest: &str, report: &AnalysisReport) -> bool {
        self.put_json(CacheKind::Analysis, digest, report).await
    }

    pub async fn get_recommendations(&self, digest: &str) -> Option<Vec<StyleRecommendation>> {
        self.get_json(CacheKind::Recommendations, digest).await
    }

    pub async fn put_recommendations(
        &self,
        digest: &str,
        recommendations: &[StyleRecommendation],
    ) -> bool {
        self.put_json(CacheKind::Recommendations, digest, &recommendations)
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Option<serde_json::Value> {
        self.get_json(CacheKind::Session, session_id).await
    }

    pub async fn put_session(&self, session_id: &str, state: &serde_json::Value) -> bool {
        self.put_json(CacheKind::Session, session_id, state).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tress_inference::Device;

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            primary_label: "curly".into(),
            confidence: 0.88,
            findings: vec![],
            device_used: Device::Cpu,
            duration_ms: 41,
        }
    }

    fn cache_with(config: CacheConfig) -> (ResultCache, Arc<MemoryStore>) {
        let store = MemoryStore::shared();
        let cache = ResultCache::new(store.clone(), "v3", config);
        (cache, store)
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(b"frame bytes");
        let b = fingerprint(b"frame bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_bit_flip_changes_key() {
        let a = fingerprint(&[0b0000_0000]);
        let b = fingerprint(&[0b0000_0001]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_report_roundtrip() {
        let (cache, _) = cache_with(CacheConfig::default());
        let digest = fingerprint(b"frame");

        assert!(cache.get_report(&digest).await.is_none());
        assert!(cache.put_report(&digest, &sample_report()).await);

        let hit = cache.get_report(&digest).await.unwrap();
        assert_eq!(hit, sample_report());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let (cache, _) = cache_with(CacheConfig {
            analysis_ttl_secs: 0, // expires immediately
            ..Default::default()
        });
        let digest = fingerprint(b"frame");

        cache.put_report(&digest, &sample_report()).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(cache.get_report(&digest).await.is_none());
    }

    #[tokio::test]
    async fn test_kinds_do_not_collide() {
        let (cache, _) = cache_with(CacheConfig::default());
        let digest = fingerprint(b"frame");

        cache.put_report(&digest, &sample_report()).await;
        assert!(cache.get_recommendations(&digest).await.is_none());
    }

    #[tokio::test]
    async fn test_model_version_namespaces_keys() {
        let store = MemoryStore::shared();
        let old = ResultCache::new(store.clone(), "v2", CacheConfig::default());
        let new = ResultCache::new(store.clone(), "v3", CacheConfig::default());
        let digest = fingerprint(b"frame");

        old.put_report(&digest, &sample_report()).await;
        // The upgraded model must not see results from its predecessor
        assert!(new.get_report(&digest).await.is_none());
        assert!(old.get_report(&digest).await.is_some());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_miss() {
        let (cache, store) = cache_with(CacheConfig::default());
        let digest = fingerprint(b"frame");
        cache.put_report(&digest, &sample_report()).await;

        store.set_connected(false);
        assert!(cache.get_report(&digest).await.is_none());
        assert!(!cache.put_report(&digest, &sample_report()).await);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (cache, store) = cache_with(CacheConfig::default());
        let digest = fingerprint(b"frame");
        store
            .put(
                &format!("analysis:v3:{digest}"),
                "not json".into(),
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert!(cache.get_report(&digest).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (cache, _) = cache_with(CacheConfig::default());
        let digest = fingerprint(b"frame");

        cache.put_report(&digest, &sample_report()).await;
        assert!(cache.invalidate(CacheKind::Analysis, &digest).await);
        assert!(cache.get_report(&digest).await.is_none());
        assert!(!cache.invalidate(CacheKind::Analysis, &digest).await);
    }

    #[tokio::test]
    async fn test_recommendations_roundtrip() {
        let (cache, _) = cache_with(CacheConfig::default());
        let recs = vec![StyleRecommendation {
            style_id: "s-104".into(),
            name: "textured bob".into(),
            score: 0.83,
        }];

        cache.put_recommendations("caller-1", &recs).await;
        assert_eq!(cache.get_recommendations("caller-1").await.unwrap(), recs);
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (cache, _) = cache_with(CacheConfig::default());
        let state = serde_json::json!({"step": 2, "style_id": "s-104"});

        cache.put_session("sess-9", &state).await;
        assert_eq!(cache.get_session("sess-9").await.unwrap(), state);
    }
}
