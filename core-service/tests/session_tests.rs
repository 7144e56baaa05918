//! End-to-end session tests over the desktop file system and settings store,
//! with the network and audio engine mocked.

#![cfg(feature = "desktop-shims")]

use async_trait::async_trait;
use bridge_desktop::{SqliteSettingsStore, TokioFileSystem};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{DownloadStream, HttpClient};
use bridge_traits::playback::{
    AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSession, PlaybackSessionId,
};
use core_playback::cache::paths::{cached_file_path, namespace_dir};
use core_playback::cache::CacheConfig;
use core_playback::player::PlayerState;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CacheEvent, CoreEvent, PlaybackEvent};
use core_service::MediaSession;
use mockall::mock;
use mockall::predicate::eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const U1: &str = "https://cdn.example.com/music/g1.mp3";

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn download_stream(&self, url: String) -> BridgeResult<DownloadStream>;
    }
}

mock! {
    pub Engine {}

    #[async_trait]
    impl PlaybackAdapter for Engine {
        async fn load(&self, source: AudioSource, options: PlaybackOptions) -> BridgeResult<PlaybackSession>;
        async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()>;
        async fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()>;
        async fn seek(&self, session: PlaybackSessionId, position: Duration) -> BridgeResult<()>;
        async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> BridgeResult<()>;
        async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()>;
    }
}

fn open_session(_source: AudioSource, _options: PlaybackOptions) -> BridgeResult<PlaybackSession> {
    let (_tx, status) = tokio::sync::mpsc::unbounded_channel();
    Ok(PlaybackSession {
        id: PlaybackSessionId::new(),
        status,
    })
}

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "floor-music-session-{}-{}",
        std::process::id(),
        name
    ))
}

async fn build_session(cache_dir: &PathBuf, http: MockHttp, engine: MockEngine) -> MediaSession {
    let settings = SqliteSettingsStore::in_memory().await.unwrap();
    let config = CoreConfig::builder()
        .cache_dir(cache_dir.clone())
        .file_system(Arc::new(TokioFileSystem::with_cache_directory(cache_dir.clone())))
        .http_client(Arc::new(http))
        .settings_store(Arc::new(settings))
        .playback_adapter(Arc::new(engine))
        .build()
        .unwrap();
    MediaSession::from_config(config).unwrap()
}

#[tokio::test]
async fn test_uncached_owner_streams_remote_url() {
    let dir = scratch_dir("remote");

    let mut engine = MockEngine::new();
    engine
        .expect_load()
        .withf(|source, _| {
            *source
                == AudioSource::RemoteStream {
                    url: U1.to_string(),
                }
        })
        .times(1)
        .returning(open_session);
    engine.expect_play().times(1).returning(|_| Ok(()));

    let session = build_session(&dir, MockHttp::new(), engine).await;
    session.open_hub("hub-1").await.unwrap();

    assert_eq!(session.playable_uri("g1", U1), U1);
    session.play_owner("g1", U1, "Floor Routine", "floor.mp3").await;
    assert_eq!(session.player().state(), PlayerState::Playing);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_cached_owner_plays_local_file() {
    let dir = scratch_dir("local");
    let hub_dir = namespace_dir(&dir, &CacheConfig::default().cache_directory, "hub-1");
    let expected = cached_file_path(&hub_dir, "g1", "Floor Routine", U1);

    let mut http = MockHttp::new();
    http.expect_download_stream()
        .with(eq(U1.to_string()))
        .times(1)
        .returning(|_| Ok(DownloadStream::from_bytes(b"ID3 floor music".to_vec())));

    let mut engine = MockEngine::new();
    let local = expected.clone();
    engine
        .expect_load()
        .withf(move |source, _| *source == AudioSource::LocalFile { path: local.clone() })
        .times(1)
        .returning(open_session);
    engine.expect_play().times(1).returning(|_| Ok(()));
    engine.expect_unload().times(1).returning(|_| Ok(()));

    let session = build_session(&dir, http, engine).await;
    let mut events = session.subscribe_events();
    session.open_hub("hub-1").await.unwrap();

    assert!(session.cache().download_one("g1", U1, "Floor Routine").await);
    assert_eq!(tokio::fs::read(&expected).await.unwrap(), b"ID3 floor music");
    assert!(session.playable_uri("g1", U1).starts_with("file://"));

    session.play_owner("g1", U1, "Floor Routine", "floor.mp3").await;
    assert_eq!(session.player().state(), PlayerState::Playing);

    session.shutdown().await;
    assert_eq!(session.player().state(), PlayerState::Idle);

    let mut saw_completed = false;
    let mut saw_started = false;
    while let Some(Ok(event)) = events.try_recv() {
        match event {
            CoreEvent::Cache(CacheEvent::DownloadCompleted { .. }) => saw_completed = true,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => saw_started = true,
            _ => {}
        }
    }
    assert!(saw_completed);
    assert!(saw_started);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_stale_cached_copy_falls_back_to_remote() {
    let dir = scratch_dir("stale");
    let replaced = "https://cdn.example.com/music/g1-v2.mp3";

    let mut http = MockHttp::new();
    http.expect_download_stream()
        .times(1)
        .returning(|_| Ok(DownloadStream::from_bytes(b"v1".to_vec())));

    let session = build_session(&dir, http, MockEngine::new()).await;
    session.open_hub("hub-1").await.unwrap();
    assert!(session.cache().download_one("g1", U1, "Floor").await);

    assert_eq!(session.playable_uri("g1", replaced), replaced);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
