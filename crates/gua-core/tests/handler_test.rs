use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use gua_core::{
    pool, Clock, FsImageStore, GuaError, GuaPlugin, GuaSettings, ImageData, ImagePool, ImageStore,
    Outcome, Requester, Segment,
};

/// Clock whose date the test can move forward.
struct ManualClock(Mutex<NaiveDate>);

impl ManualClock {
    fn new(y: i32, m: u32, d: u32) -> Arc<Self> {
        Arc::new(Self(Mutex::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())))
    }

    fn advance(&self, days: u64) {
        let mut date = self.0.lock().unwrap();
        *date = *date + chrono::Days::new(days);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}

/// Image store that knows no images at all.
struct EmptyStore;

impl ImageStore for EmptyStore {
    fn resolve(&self, id: &str) -> Result<ImageData, GuaError> {
        Err(GuaError::ImageNotFound(id.to_string()))
    }
}

struct BrokenStore;

impl ImageStore for BrokenStore {
    fn resolve(&self, _id: &str) -> Result<ImageData, GuaError> {
        Err(GuaError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "/secret/path/64gua_01.jpg",
        )))
    }
}

fn write_images(dir: &Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), format!("bytes of {name}")).unwrap();
    }
}

fn settings_for(dir: &Path, limit: Option<u32>) -> GuaSettings {
    GuaSettings {
        image_dir: dir.to_path_buf(),
        daily_limit: limit,
        ..GuaSettings::default()
    }
}

fn remaining(outcome: &Outcome) -> Option<u32> {
    match outcome {
        Outcome::Drawn { remaining, .. } => *remaining,
        _ => None,
    }
}

#[test]
fn test_four_requests_same_day() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["A.jpg", "B.jpg"]);
    let clock = ManualClock::new(2024, 5, 1);
    let pool = ImagePool::new(dir.path(), vec!["A.jpg".into(), "B.jpg".into()]);
    let plugin = GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        pool,
        Arc::new(FsImageStore::new(dir.path())),
        clock,
    );
    let user = Requester::new("u1");

    let outcomes: Vec<Outcome> = (0..4).map(|_| plugin.handle_command(&user).outcome).collect();

    assert_eq!(remaining(&outcomes[0]), Some(2));
    assert_eq!(remaining(&outcomes[1]), Some(1));
    assert_eq!(remaining(&outcomes[2]), Some(0));
    assert_eq!(outcomes[3], Outcome::QuotaExhausted);

    let draws: Vec<Option<u32>> = outcomes[..3]
        .iter()
        .map(|o| match o {
            Outcome::Drawn { draw, .. } => *draw,
            _ => None,
        })
        .collect();
    assert_eq!(draws, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn test_drawn_reply_layout() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["64gua_07.jpg"]);
    let plugin = GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        ImagePool::new(dir.path(), vec!["64gua_07.jpg".into()]),
        Arc::new(FsImageStore::new(dir.path())),
        ManualClock::new(2024, 5, 1),
    );

    let reply = plugin.handle_command(&Requester::new("u1"));

    assert!(!reply.outcome.is_error());
    assert!(matches!(&reply.segments[0], Segment::Plain(t) if t == gua_core::reply::HEADER));
    let image = reply.image().unwrap();
    assert_eq!(image.name, "64gua_07.jpg");
    assert_eq!(image.mime_type, "image/jpeg");
    assert_eq!(image.bytes, b"bytes of 64gua_07.jpg");
    assert!(matches!(&reply.segments[2], Segment::Plain(t) if t == gua_core::reply::FOOTER));
    assert!(reply.text().contains("今日第 1 卦，剩余 2 次"));
}

#[test]
fn test_exhausted_yesterday_resets_today() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(2024, 12, 31);
    let plugin = GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        ImagePool::new(dir.path(), vec!["A.jpg".into()]),
        Arc::new(FsImageStore::new(dir.path())),
        clock.clone(),
    );
    write_images(dir.path(), &["A.jpg"]);
    let user = Requester::new("u1");

    for _ in 0..3 {
        plugin.handle_command(&user);
    }
    assert_eq!(plugin.handle_command(&user).outcome, Outcome::QuotaExhausted);
    assert_eq!(plugin.quota_status("u1").remaining, Some(0));

    clock.advance(1);

    assert_eq!(plugin.quota_status("u1").remaining, Some(3));
    assert_eq!(remaining(&plugin.handle_command(&user).outcome), Some(2));
}

#[test]
fn test_empty_pool_never_consumes_quota() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = GuaPlugin::initialize(settings_for(&dir.path().join("missing"), Some(3)));
    assert_eq!(plugin.pool_size(), 0);

    for _ in 0..5 {
        let reply = plugin.handle_command(&Requester::new("u1"));
        assert_eq!(reply.outcome, Outcome::PoolUnavailable);
        assert_eq!(reply.text(), gua_core::reply::POOL_UNAVAILABLE);
    }
    assert_eq!(plugin.quota_status("u1").remaining, Some(3));
}

#[test]
fn test_missing_image_is_not_refunded() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        ImagePool::new(dir.path(), vec!["gone.jpg".into()]),
        Arc::new(EmptyStore),
        ManualClock::new(2024, 5, 1),
    );
    let user = Requester::new("u1");

    let reply = plugin.handle_command(&user);
    assert_eq!(reply.outcome, Outcome::RenderFailed);
    assert_eq!(reply.text(), gua_core::reply::RENDER_FAILED);
    assert_eq!(plugin.quota_status("u1").remaining, Some(2));

    plugin.handle_command(&user);
    assert_eq!(plugin.quota_status("u1").remaining, Some(1));
}

#[test]
fn test_unexpected_error_hides_details() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        ImagePool::new(dir.path(), vec!["64gua_01.jpg".into()]),
        Arc::new(BrokenStore),
        ManualClock::new(2024, 5, 1),
    );

    let reply = plugin.handle_command(&Requester::new("u1"));
    assert_eq!(reply.outcome, Outcome::Failed);
    assert_eq!(reply.text(), gua_core::reply::FAILED);
    assert!(!reply.text().contains("secret"));
    assert_eq!(plugin.quota_status("u1").remaining, Some(2));
}

#[test]
fn test_image_deleted_after_startup() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["64gua_01.jpg"]);
    let plugin = GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        pool::load(dir.path(), "64gua_", "jpg", 64),
        Arc::new(FsImageStore::new(dir.path())),
        ManualClock::new(2024, 5, 1),
    );
    assert_eq!(plugin.pool_size(), 1);

    fs::remove_file(dir.path().join("64gua_01.jpg")).unwrap();

    let reply = plugin.handle_command(&Requester::new("u1"));
    assert_eq!(reply.outcome, Outcome::RenderFailed);
    assert_eq!(plugin.quota_status("u1").remaining, Some(2));
}

#[test]
fn test_reduced_pool_still_serves() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (1..=10).map(|i| format!("64gua_{i:02}.jpg")).collect();
    for name in &names {
        fs::write(dir.path().join(name), name.as_bytes()).unwrap();
    }
    fs::write(dir.path().join("readme.txt"), b"not an image").unwrap();

    let plugin = GuaPlugin::initialize(settings_for(dir.path(), None));
    assert_eq!(plugin.pool_size(), 10);

    let served: HashSet<String> = (0..500)
        .map(|_| match plugin.handle_command(&Requester::new("u1")).outcome {
            Outcome::Drawn { image, .. } => image,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    assert_eq!(served, names.into_iter().collect::<HashSet<String>>());
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

#[test]
fn test_short_pool_logs_warning() {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=10 {
        fs::write(dir.path().join(format!("64gua_{i:02}.jpg")), b"x").unwrap();
    }

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let loaded = tracing::subscriber::with_default(subscriber, || {
        pool::load(dir.path(), "64gua_", "jpg", 64)
    });

    assert_eq!(loaded.len(), 10);
    let logs = captured.contents();
    assert!(logs.contains("WARN"), "logs: {logs}");
    assert!(logs.contains("expected 64, found 10"), "logs: {logs}");
}

#[test]
fn test_missing_directory_logs_error() {
    let dir = tempfile::tempdir().unwrap();
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let loaded = tracing::subscriber::with_default(subscriber, || {
        pool::load(&dir.path().join("64gua"), "64gua_", "jpg", 64)
    });

    assert!(loaded.is_empty());
    let logs = captured.contents();
    assert!(logs.contains("ERROR"), "logs: {logs}");
    assert!(logs.contains("does not exist"), "logs: {logs}");
}

#[test]
fn test_concurrent_draws_respect_limit() {
    let dir = tempfile::tempdir().unwrap();
    write_images(dir.path(), &["A.jpg"]);
    let clock = ManualClock::new(2024, 5, 1);
    let plugin = Arc::new(GuaPlugin::with_parts(
        settings_for(dir.path(), Some(3)),
        ImagePool::new(dir.path(), vec!["A.jpg".into()]),
        Arc::new(FsImageStore::new(dir.path())),
        clock.clone(),
    ));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let plugin = Arc::clone(&plugin);
            std::thread::spawn(move || plugin.handle_command(&Requester::new("u1")).outcome)
        })
        .collect();
    let outcomes: Vec<Outcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let drawn = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Drawn { .. }))
        .count();
    let denied = outcomes
        .iter()
        .filter(|o| **o == Outcome::QuotaExhausted)
        .count();
    assert_eq!((drawn, denied), (3, 13));

    clock.advance(1);
    assert_eq!(
        remaining(&plugin.handle_command(&Requester::new("u1")).outcome),
        Some(2)
    );
}
