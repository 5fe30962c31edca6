//! Cached calendar facade shared by all consumers of one address.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::model::{Address, DateFormat, Entry, FormattedDate, FractionId};
use crate::parse;
use crate::ports::{CalendarError, CalendarPort, Clock};
use crate::staleness::{StalenessPolicy, is_stale};

/// Default number of fetch cycles spent on getting a fresh schedule.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Behaviour of a [`CalendarCache`].
pub struct CacheSettings {
    /// Format applied by [`CalendarCache::format_date`].
    pub date_format: DateFormat,
    /// Fetch cycles per rebuild before giving up on fresh data.
    pub max_attempts: usize,
    /// Rules for deciding when to rebuild.
    pub staleness: StalenessPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            date_format: DateFormat::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            staleness: StalenessPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a refresh did to the cached entries.
pub enum RefreshOutcome {
    /// Cached entries were still fresh, nothing was fetched.
    Fresh,
    /// Entries were replaced by fresh data.
    Refreshed {
        /// Fetch cycles it took.
        attempts: usize,
    },
    /// Every attempt returned stale data; the latest of it is cached anyway.
    StillStale {
        /// Fetch cycles spent.
        attempts: usize,
    },
}

/// Calendar for one address, fetched from the upstream API and kept until stale.
///
/// Readers get cheap snapshots; a refresh swaps the whole entry list at once.
pub struct CalendarCache {
    port: Arc<dyn CalendarPort>,
    clock: Arc<dyn Clock>,
    address: Address,
    settings: CacheSettings,
    entries: RwLock<Arc<[Entry]>>,
    refresh_lock: Mutex<()>,
}

impl CalendarCache {
    /// Fetch the calendar for `address` and build the cache around it.
    ///
    /// The first fetch always happens; stale data is refetched up to
    /// [`CacheSettings::max_attempts`] times.
    ///
    /// # Errors
    ///
    /// Returns a [`CalendarError`] when a payload cannot be parsed.
    pub async fn load(
        port: Arc<dyn CalendarPort>,
        clock: Arc<dyn Clock>,
        address: Address,
        settings: CacheSettings,
    ) -> Result<Self, CalendarError> {
        let cache = Self {
            port,
            clock,
            address,
            settings,
            entries: RwLock::new(Arc::from(Vec::<Entry>::new())),
            refresh_lock: Mutex::new(()),
        };

        cache.rebuild().await?;

        Ok(cache)
    }

    /// Refetch the calendar if the cached entries are stale.
    ///
    /// # Errors
    ///
    /// Returns a [`CalendarError`] when a payload cannot be parsed. The cached
    /// entries are left untouched in that case.
    pub async fn refresh(&self) -> Result<RefreshOutcome, CalendarError> {
        let _guard = self.refresh_lock.lock().await;

        if !self.is_stale(&self.entries()) {
            debug!("calendar is fresh, skipping refresh");
            return Ok(RefreshOutcome::Fresh);
        }

        info!("calendar needs refresh");
        self.rebuild().await
    }

    /// Cached entry for a fraction.
    #[must_use]
    pub fn entry(&self, fraction_id: &FractionId) -> Option<Entry> {
        self.entries()
            .iter()
            .find(|entry| &entry.fraction_id == fraction_id)
            .cloned()
    }

    /// Snapshot of all cached entries.
    #[must_use]
    pub fn entries(&self) -> Arc<[Entry]> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&entries)
    }

    /// Render a timestamp with the configured date format.
    #[must_use]
    pub fn format_date(&self, timestamp: NaiveDateTime) -> FormattedDate {
        self.settings.date_format.format(timestamp)
    }

    /// Address this calendar belongs to.
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    async fn rebuild(&self) -> Result<RefreshOutcome, CalendarError> {
        let max_attempts = self.settings.max_attempts.max(1);

        let mut attempts = 1;
        let mut latest = self.fetch_entries().await?;

        while self.is_stale(&latest) && attempts < max_attempts {
            attempts += 1;
            info!(attempt = attempts, "fetched calendar is stale, fetching again");
            latest = self.fetch_entries().await?;
        }

        let stale = self.is_stale(&latest);
        info!(entries = latest.len(), attempts, stale, "replacing cached calendar");
        self.replace(latest);

        if stale {
            warn!(attempts, "calendar is still stale, keeping it until the next refresh");
        }

        Ok(if stale {
            RefreshOutcome::StillStale { attempts }
        } else {
            RefreshOutcome::Refreshed { attempts }
        })
    }

    async fn fetch_entries(&self) -> Result<Vec<Entry>, CalendarError> {
        let schedule = self.port.schedule(&self.address).await;
        let fractions = self.port.fractions(&self.address).await;

        debug!(?schedule, "schedule payload");
        debug!(?fractions, "fractions payload");

        parse::join(schedule.as_deref(), fractions.as_deref())
    }

    fn is_stale(&self, entries: &[Entry]) -> bool {
        is_stale(entries, self.clock.today(), self.settings.staleness)
    }

    fn replace(&self, entries: Vec<Entry>) {
        let mut current = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::from(entries);
    }
}
