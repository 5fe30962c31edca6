//! Cache behaviour against a scripted calendar port.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use renovasjon_core::{
    Address, CacheSettings, CalendarCache, CalendarError, CalendarPort, Clock, DateFormat,
    FormattedDate, FractionId, RefreshOutcome, StalenessPolicy,
};

const FRACTIONS: &str = r#"[
    {"Id": 1, "Navn": "Paper", "Ikon": "p.png"},
    {"Id": 3, "Navn": "Food waste", "Ikon": "f.png"}
]"#;

/// Hands out one scripted schedule payload per fetch cycle, repeating the last one.
struct ScriptedPort {
    schedules: Mutex<VecDeque<Option<String>>>,
    fetches: AtomicUsize,
}

impl ScriptedPort {
    fn new(schedules: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self {
            schedules: Mutex::new(schedules.iter().map(|item| item.map(str::to_owned)).collect()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarPort for ScriptedPort {
    async fn schedule(&self, _address: &Address) -> Option<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut schedules = self.schedules.lock().expect("script lock");
        if schedules.len() > 1 {
            schedules.pop_front().flatten()
        } else {
            schedules.front().cloned().flatten()
        }
    }

    async fn fractions(&self, _address: &Address) -> Option<String> {
        Some(FRACTIONS.to_owned())
    }
}

struct FixedClock(NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("valid date")
}

fn address() -> Address {
    Address::new("Storgata", "12345", "1", "3024").expect("valid address")
}

async fn load(port: &Arc<ScriptedPort>, settings: CacheSettings) -> CalendarCache {
    let port: Arc<dyn CalendarPort> = Arc::<ScriptedPort>::clone(port);
    CalendarCache::load(port, Arc::new(FixedClock(today())), address(), settings)
        .await
        .expect("calendar loads")
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log lock")).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const PAST: &str = r#"[{"FraksjonId": 1, "Tommedatoer": ["2024-01-10T00:00:00", "2024-02-10T00:00:00"]}]"#;
const FRESH: &str = r#"[
    {"FraksjonId": 1, "Tommedatoer": ["2024-03-04T00:00:00", "2024-04-01T00:00:00"]},
    {"FraksjonId": 2, "Tommedatoer": ["2024-03-05T00:00:00", "2024-03-19T00:00:00"]},
    {"FraksjonId": 3, "Tommedatoer": ["2024-03-06T00:00:00", "2024-03-13T00:00:00"]}
]"#;

#[tokio::test]
async fn load_fetches_once_when_data_is_fresh() {
    let port = ScriptedPort::new(&[Some(FRESH)]);
    let cache = load(&port, CacheSettings::default()).await;

    assert_eq!(port.fetches(), 1);
    assert_eq!(cache.entries().len(), 2, "fraction 2 has no metadata");

    let paper = cache.entry(&FractionId::Number(1)).expect("paper entry");
    assert_eq!(paper.name, "Paper");
    assert_eq!(paper.icon, "p.png");
    assert_eq!(paper.first_pickup, Some(midnight(2024, 3, 4)));
    assert_eq!(paper.next_pickup, Some(midnight(2024, 4, 1)));

    assert!(cache.entry(&FractionId::Number(2)).is_none());
    assert!(cache.entry(&FractionId::from("unknown")).is_none());
}

#[tokio::test]
async fn load_refetches_stale_data() {
    let port = ScriptedPort::new(&[Some(PAST), Some(FRESH)]);
    let cache = load(&port, CacheSettings::default()).await;

    assert_eq!(port.fetches(), 2);
    assert_eq!(
        cache.entry(&FractionId::Number(1)).and_then(|entry| entry.first_pickup),
        Some(midnight(2024, 3, 4))
    );
}

#[tokio::test]
async fn refetching_is_bounded() {
    let port = ScriptedPort::new(&[Some(PAST)]);
    let settings = CacheSettings {
        max_attempts: 4,
        ..CacheSettings::default()
    };
    let cache = load(&port, settings).await;

    assert_eq!(port.fetches(), 4);
    assert_eq!(cache.entries().len(), 1, "stale data is still served");

    let outcome = cache.refresh().await.expect("refresh succeeds");
    assert_eq!(outcome, RefreshOutcome::StillStale { attempts: 4 });
    assert_eq!(port.fetches(), 8);
}

#[tokio::test]
async fn refresh_warns_when_data_stays_stale() {
    let port = ScriptedPort::new(&[Some(PAST)]);
    let settings = CacheSettings {
        max_attempts: 2,
        ..CacheSettings::default()
    };
    let cache = load(&port, settings).await;

    let logs = Captured::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let outcome = cache.refresh().await.expect("refresh succeeds");
    assert_eq!(outcome, RefreshOutcome::StillStale { attempts: 2 });

    let output = logs.contents();
    let warning = output
        .lines()
        .find(|line| line.contains("calendar is still stale"))
        .unwrap_or_else(|| panic!("no stale warning in {output:?}"));
    assert!(warning.contains("WARN"), "unexpected level: {warning}");
    assert!(warning.contains("attempts=2"), "unexpected fields: {warning}");
}

#[tokio::test]
async fn refresh_leaves_fresh_cache_untouched() {
    let port = ScriptedPort::new(&[Some(FRESH), Some(PAST)]);
    let cache = load(&port, CacheSettings::default()).await;
    let before = cache.entries();

    let outcome = cache.refresh().await.expect("refresh succeeds");

    assert_eq!(outcome, RefreshOutcome::Fresh);
    assert_eq!(port.fetches(), 1);
    assert!(Arc::ptr_eq(&before, &cache.entries()), "snapshot must not be replaced");
}

#[tokio::test]
async fn refresh_replaces_stale_cache() {
    let port = ScriptedPort::new(&[Some(PAST), Some(PAST), Some(PAST), Some(FRESH)]);
    let cache = load(&port, CacheSettings::default()).await;
    assert_eq!(port.fetches(), 3);

    let outcome = cache.refresh().await.expect("refresh succeeds");

    assert_eq!(outcome, RefreshOutcome::Refreshed { attempts: 1 });
    assert_eq!(cache.entries().len(), 2);
}

#[tokio::test]
async fn missing_payload_caches_nothing() {
    let port = ScriptedPort::new(&[None, Some(FRESH)]);
    let cache = load(&port, CacheSettings::default()).await;

    assert_eq!(port.fetches(), 1);
    assert!(cache.entries().is_empty());

    // An empty calendar counts as fresh unless configured otherwise.
    let outcome = cache.refresh().await.expect("refresh succeeds");
    assert_eq!(outcome, RefreshOutcome::Fresh);
}

#[tokio::test]
async fn empty_calendar_can_be_treated_as_stale() {
    let port = ScriptedPort::new(&[None, Some(FRESH)]);
    let settings = CacheSettings {
        staleness: StalenessPolicy {
            empty_is_stale: true,
        },
        ..CacheSettings::default()
    };
    let cache = load(&port, settings).await;

    assert_eq!(port.fetches(), 2);
    assert_eq!(cache.entries().len(), 2);
}

#[tokio::test]
async fn malformed_payload_keeps_previous_snapshot() {
    let port = ScriptedPort::new(&[Some(PAST), Some(PAST), Some(PAST), Some("not json")]);
    let cache = load(&port, CacheSettings::default()).await;

    let err = cache.refresh().await.expect_err("malformed payload");

    assert!(matches!(err, CalendarError::Decode { .. }), "unexpected error: {err}");
    assert_eq!(cache.entries().len(), 1);
}

#[tokio::test]
async fn dates_are_formatted_with_the_configured_pattern() {
    let port = ScriptedPort::new(&[Some(FRESH)]);
    let pickup = midnight(2024, 3, 4);

    let cache = load(&port, CacheSettings::default()).await;
    assert_eq!(cache.format_date(pickup).to_string(), "04/03/2024");

    let settings = CacheSettings {
        date_format: DateFormat::parse("None").expect("sentinel"),
        ..CacheSettings::default()
    };
    let cache = load(&port, settings).await;
    assert_eq!(cache.format_date(pickup), FormattedDate::Raw(pickup));
}
