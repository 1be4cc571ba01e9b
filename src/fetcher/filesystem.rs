use std::hash::{BuildHasher, Hasher};
use std::io::Result;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::metadata::Playlist;
use crate::PlaylistId;

use super::PlaylistFetcher;

#[derive(Debug, Serialize, Deserialize)]
struct CacheItem<T> {
    created: u64,
    value: T,
}

#[derive(Debug)]
pub struct FsCache {
    directory: PathBuf,
}

impl FsCache {
    const BUCKETS: u64 = 256;
    const RANDOM_STATE: ahash::RandomState = ahash::RandomState::with_seeds(0, 0, 0, 0);

    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Remove a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn remove_logged(&self, key: &str) {
        if let Err(err) = self.remove(key).await {
            tracing::warn!("failed to remove {} from cache: {}", key, err);
        }
    }

    /// Remove every cached entry.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.directory).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn store<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Send + Sync,
    {
        let path = self.key_path(key);
        let cache_item = CacheItem {
            created: Self::now(),
            value,
        };
        let contents = serde_json::to_string_pretty(&cache_item)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &contents).await?;
        tracing::trace!("stored {} to cache", key);
        Ok(())
    }

    async fn load<T>(&self, key: &str, ttl: Duration) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let path = self.key_path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let cache_item: CacheItem<T> = match serde_json::from_str(&contents) {
            Ok(cache_item) => cache_item,
            Err(err) => {
                self.remove_logged(key).await;
                return Err(err.into());
            }
        };
        if Self::now().saturating_sub(cache_item.created) >= ttl.as_secs() {
            tracing::trace!("{} expired", key);
            self.remove_logged(key).await;
            return Ok(None);
        }
        tracing::trace!("loaded {} from cache", key);
        Ok(Some(cache_item.value))
    }

    fn key_bucket(key: &str) -> u64 {
        let mut hasher = Self::RANDOM_STATE.build_hasher();
        hasher.write(key.as_bytes());
        hasher.finish() % Self::BUCKETS
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let bucket = Self::key_bucket(key);
        self.directory.join(bucket.to_string()).join(key)
    }

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct FsCachePlaylistFetcherParams {
    pub playlist_ttl: Duration,
}

impl Default for FsCachePlaylistFetcherParams {
    fn default() -> Self {
        Self {
            playlist_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Playlist fetcher that keeps listings on disk for `playlist_ttl`.
#[derive(Debug)]
pub struct FsCachePlaylistFetcher<F>
where
    F: PlaylistFetcher,
{
    fetcher: F,
    cache: FsCache,
    params: FsCachePlaylistFetcherParams,
}

impl<F> FsCachePlaylistFetcher<F>
where
    F: PlaylistFetcher,
{
    pub fn new(fetcher: F, directory: impl Into<PathBuf>) -> Self {
        Self::with(fetcher, directory, Default::default())
    }

    pub fn with(
        fetcher: F,
        directory: impl Into<PathBuf>,
        params: FsCachePlaylistFetcherParams,
    ) -> Self {
        Self {
            fetcher,
            cache: FsCache::new(directory),
            params,
        }
    }

    pub fn cache(&self) -> &FsCache {
        &self.cache
    }

    fn key(id: &PlaylistId) -> String {
        format!("playlist-{}", id)
    }
}

#[async_trait::async_trait]
impl<F> PlaylistFetcher for FsCachePlaylistFetcher<F>
where
    F: PlaylistFetcher,
{
    async fn get_playlist(&self, id: &PlaylistId) -> Result<Playlist> {
        let key = Self::key(id);
        match self.cache.load(&key, self.params.playlist_ttl).await {
            Ok(Some(playlist)) => return Ok(playlist),
            Ok(None) => {}
            Err(err) => tracing::warn!("failed to load {} from cache: {}", key, err),
        }
        let playlist = self.fetcher.get_playlist(id).await?;
        if let Err(err) = self.cache.store(&key, &playlist).await {
            tracing::warn!("failed to store {} in cache: {}", key, err);
        }
        Ok(playlist)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{fetcher::NullPlaylistFetcher, metadata::PlaylistTrack};

    #[derive(Debug, Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PlaylistFetcher for CountingFetcher {
        async fn get_playlist(&self, id: &PlaylistId) -> Result<Playlist> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Playlist {
                id: id.clone(),
                title: "Mix".to_string(),
                tracks: vec![PlaylistTrack {
                    title: "Song".to_string(),
                    artists: vec!["Artist".to_string()],
                    duration: "3:00".to_string(),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsCachePlaylistFetcher::new(CountingFetcher::default(), dir.path());
        let id = PlaylistId::new("PLcached").unwrap();

        let first = fetcher.get_playlist(&id).await.unwrap();
        let second = fetcher.get_playlist(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.fetcher.calls.load(Ordering::SeqCst), 1);

        let key = FsCachePlaylistFetcher::<CountingFetcher>::key(&id);
        fetcher.cache().remove(&key).await.unwrap();
        fetcher.get_playlist(&id).await.unwrap();
        assert_eq!(fetcher.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_expired() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsCachePlaylistFetcher::with(
            CountingFetcher::default(),
            dir.path(),
            FsCachePlaylistFetcherParams {
                playlist_ttl: Duration::ZERO,
            },
        );
        let id = PlaylistId::new("PLexpired").unwrap();

        fetcher.get_playlist(&id).await.unwrap();
        fetcher.get_playlist(&id).await.unwrap();
        assert_eq!(fetcher.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsCachePlaylistFetcher::new(NullPlaylistFetcher, dir.path());
        let id = PlaylistId::new("PLmissing").unwrap();

        assert!(fetcher.get_playlist(&id).await.is_err());
        let key = FsCachePlaylistFetcher::<NullPlaylistFetcher>::key(&id);
        let cached: Option<Playlist> = fetcher.cache().load(&key, Duration::MAX).await.unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsCachePlaylistFetcher::new(CountingFetcher::default(), dir.path());
        let id = PlaylistId::new("PLcorrupt").unwrap();
        let key = FsCachePlaylistFetcher::<CountingFetcher>::key(&id);

        fetcher.get_playlist(&id).await.unwrap();
        tokio::fs::write(fetcher.cache().key_path(&key), b"{broken")
            .await
            .unwrap();

        fetcher.get_playlist(&id).await.unwrap();
        assert_eq!(fetcher.fetcher.calls.load(Ordering::SeqCst), 2);
        let cached: Option<Playlist> = fetcher.cache().load(&key, Duration::MAX).await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FsCachePlaylistFetcher::new(CountingFetcher::default(), dir.path());
        let id = PlaylistId::new("PLclear").unwrap();

        fetcher.get_playlist(&id).await.unwrap();
        fetcher.cache().clear().await.unwrap();
        fetcher.get_playlist(&id).await.unwrap();
        assert_eq!(fetcher.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsCache::new(dir.path().join("missing"));
        cache.clear().await.unwrap();
    }
}
