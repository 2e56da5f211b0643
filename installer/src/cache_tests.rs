//! Unit tests for the artifact cache.

use super::*;
use crate::fetch::{FetchResponse, MockContentFetcher};
use crate::test_utils::ScriptedFetcher;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::TempDir;

const SETUP_URL: &str = "https://downloads.example.test/tools/setup.exe";

#[fixture]
fn cache_dir() -> TempDir {
    TempDir::new().expect("temp dir")
}

fn quiet_cache(dir: &TempDir) -> ArtifactCache {
    ArtifactCache::new(dir.path()).with_progress(ProgressMode::Hidden)
}

#[rstest]
#[case::check_value("123456789", "CBF43926")]
#[case::empty("", "0")]
#[case::no_leading_zeros("a", "E8B7BE43")]
fn cache_key_is_upper_hex_crc32(#[case] url: &str, #[case] expected: &str) {
    assert_eq!(cache_key(url), expected);
}

#[test]
fn cache_key_is_deterministic() {
    assert_eq!(cache_key(SETUP_URL), cache_key(SETUP_URL));
    assert_ne!(cache_key(SETUP_URL), cache_key("https://downloads.example.test/x.msi"));
}

#[rstest]
#[case::exe("https://host/dl/setup.exe", "exe")]
#[case::last_dot_wins("https://host/dl/tool.tar.gz", "gz")]
#[case::query_ignored("https://host/dl/setup.msi?token=a.b", "msi")]
#[case::fragment_ignored("https://host/dl/setup.zip#part.2", "zip")]
#[case::no_dot("https://host/dl/download", "")]
#[case::trailing_slash("https://host/dl/", "")]
#[case::root("https://host", "")]
fn url_extension_uses_last_segment(#[case] url: &str, #[case] expected: &str) {
    assert_eq!(url_extension(url).expect("parse url"), expected);
}

#[test]
fn url_extension_rejects_unparseable_urls() {
    let err = url_extension("not a url").expect_err("invalid url");
    assert!(matches!(err, CacheError::InvalidUrl { ref url, .. } if url == "not a url"));
}

#[rstest]
fn cache_path_combines_key_and_extension(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let key = cache_key(SETUP_URL);
    assert_eq!(
        cache.cache_path(SETUP_URL, None).expect("path"),
        cache_dir.path().join(format!("{key}.exe"))
    );
    assert_eq!(
        cache.cache_path(SETUP_URL, Some("msi")).expect("path"),
        cache_dir.path().join(format!("{key}.msi"))
    );
    assert_eq!(
        cache.cache_path(SETUP_URL, Some(".zip")).expect("path"),
        cache_dir.path().join(format!("{key}.zip"))
    );
    assert_eq!(
        cache
            .cache_path("https://host/download", None)
            .expect("path"),
        cache_dir.path().join(cache_key("https://host/download"))
    );
}

#[rstest]
fn empty_extension_override_falls_back_to_url(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    assert_eq!(
        cache.cache_path(SETUP_URL, Some("")).expect("path"),
        cache.cache_path(SETUP_URL, None).expect("path")
    );
}

#[rstest]
fn explicit_extension_skips_url_parsing(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let path = cache.cache_path("not a url", Some("exe")).expect("path");
    assert_eq!(path, cache_dir.path().join(format!("{}.exe", cache_key("not a url"))));
}

#[test]
fn temp_path_appends_suffix() {
    assert_eq!(
        temp_path_for(Path::new("/cache/CBF43926.exe")),
        Path::new("/cache/CBF43926.exe.tmp")
    );
}

#[rstest]
fn miss_downloads_then_hit_skips_network(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let fetcher = ScriptedFetcher::serving("installer bytes");

    let first = cache.ensure(&fetcher, SETUP_URL, None, false).expect("first ensure");
    assert!(!first.cache_hit);
    assert_eq!(first.bytes_transferred, 15);
    assert_eq!(fs::read(&first.path).expect("read entry"), b"installer bytes");
    assert!(!temp_path_for(&first.path).exists());

    let second = cache.ensure(&fetcher, SETUP_URL, None, false).expect("second ensure");
    assert!(second.cache_hit);
    assert_eq!(second.path, first.path);
    assert_eq!(fetcher.calls(), 1);
}

#[rstest]
fn existing_entry_is_used_without_fetching(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let path = cache.cache_path(SETUP_URL, None).expect("path");
    fs::write(&path, b"already here").expect("seed entry");

    let mut fetcher = MockContentFetcher::new();
    fetcher.expect_fetch().times(0);

    let artifact = cache.ensure(&fetcher, SETUP_URL, None, false).expect("ensure");
    assert!(artifact.cache_hit);
    assert_eq!(artifact.bytes_transferred, 0);
    assert_eq!(fs::read(&path).expect("read"), b"already here");
}

#[rstest]
fn force_refetches_and_replaces_entry(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let path = cache.cache_path(SETUP_URL, None).expect("path");
    fs::write(&path, b"stale").expect("seed entry");
    let fetcher = ScriptedFetcher::serving("fresh");

    let artifact = cache.ensure(&fetcher, SETUP_URL, None, true).expect("ensure");
    assert!(!artifact.cache_hit);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(fs::read(&path).expect("read"), b"fresh");
}

#[rstest]
fn mocked_fetcher_receives_configured_timeout(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir).with_timeout(Some(Duration::from_secs(7)));
    let mut fetcher = MockContentFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|url, timeout| url == SETUP_URL && *timeout == Some(Duration::from_secs(7)))
        .times(1)
        .returning(|_, _| {
            Ok(FetchResponse {
                status: 200,
                content_length: None,
                body: Box::new(io::Cursor::new(b"ok".to_vec())),
            })
        });

    cache.ensure(&fetcher, SETUP_URL, None, false).expect("ensure");
}

#[rstest]
fn non_200_status_leaves_no_entry(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let fetcher = ScriptedFetcher::serving("not found").with_status(404);

    let err = cache.ensure(&fetcher, SETUP_URL, None, false).expect_err("404");
    assert!(matches!(
        err,
        CacheError::Fetch(FetchError::UnexpectedStatus { status: 404, .. })
    ));
    let path = cache.cache_path(SETUP_URL, None).expect("path");
    assert!(!path.exists());
    assert!(!temp_path_for(&path).exists());
}

#[rstest]
fn interrupted_transfer_removes_partial_file(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let fetcher = ScriptedFetcher::serving(vec![7_u8; 4096]).interrupted_after(1000);

    let err = cache.ensure(&fetcher, SETUP_URL, None, false).expect_err("interrupted");
    assert!(matches!(err, CacheError::Transfer { .. }));
    let path = cache.cache_path(SETUP_URL, None).expect("path");
    assert!(!path.exists());
    assert!(!temp_path_for(&path).exists());
}

#[rstest]
fn fetch_failure_is_propagated(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let mut fetcher = MockContentFetcher::new();
    fetcher.expect_fetch().returning(|url, _| {
        Err(FetchError::Network {
            url: url.to_owned(),
            reason: "connection refused".to_owned(),
        })
    });

    let err = cache.ensure(&fetcher, SETUP_URL, None, false).expect_err("network");
    assert!(matches!(err, CacheError::Fetch(FetchError::Network { .. })));
}

#[test]
fn cache_root_is_created_on_demand() {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path().join("nested").join("cache");
    let cache = ArtifactCache::new(&root).with_progress(ProgressMode::Hidden);
    let fetcher = ScriptedFetcher::serving("x");

    let artifact = cache.ensure(&fetcher, SETUP_URL, None, false).expect("ensure");
    assert!(artifact.path.starts_with(&root));
    assert!(artifact.path.is_file());
}

struct SlowCountingFetcher {
    count: Arc<AtomicUsize>,
}

impl ContentFetcher for SlowCountingFetcher {
    fn fetch(&self, _url: &str, _timeout: Option<Duration>) -> std::result::Result<FetchResponse, FetchError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        Ok(FetchResponse {
            status: 200,
            content_length: Some(7),
            body: Box::new(io::Cursor::new(b"payload".to_vec())),
        })
    }
}

#[rstest]
fn concurrent_requests_share_one_download(cache_dir: TempDir) {
    let cache = quiet_cache(&cache_dir);
    let count = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let count = Arc::clone(&count);
            thread::spawn(move || {
                let fetcher = SlowCountingFetcher { count };
                cache.ensure(&fetcher, SETUP_URL, None, false)
            })
        })
        .collect();

    for handle in handles {
        let artifact = handle.join().expect("join").expect("ensure");
        assert_eq!(fs::read(&artifact.path).expect("read"), b"payload");
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
