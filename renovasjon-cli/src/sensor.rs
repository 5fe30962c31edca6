//! Sensors exposing one fraction each of a shared calendar.

use std::sync::Arc;

use renovasjon_core::{CalendarCache, CalendarError, FractionId, RefreshOutcome};

/// Presents one fraction of the shared calendar.
pub(crate) struct FractionSensor {
    calendar: Arc<CalendarCache>,
    fraction_id: FractionId,
}

impl FractionSensor {
    pub(crate) fn new(calendar: Arc<CalendarCache>, fraction_id: FractionId) -> Self {
        Self {
            calendar,
            fraction_id,
        }
    }

    pub(crate) fn fraction_id(&self) -> &FractionId {
        &self.fraction_id
    }

    /// Fraction name, `None` while the calendar has no data for it.
    pub(crate) fn name(&self) -> Option<String> {
        self.calendar
            .entry(&self.fraction_id)
            .map(|entry| entry.name)
    }

    /// Next pickup rendered with the configured date format.
    pub(crate) fn state(&self) -> Option<String> {
        let pickup = self.calendar.entry(&self.fraction_id)?.first_pickup?;
        Some(self.calendar.format_date(pickup).to_string())
    }

    pub(crate) fn entity_picture(&self) -> Option<String> {
        self.calendar
            .entry(&self.fraction_id)
            .map(|entry| entry.icon)
    }
}

/// All sensors of one calendar, updated together.
pub(crate) struct SensorGroup {
    calendar: Arc<CalendarCache>,
    sensors: Vec<FractionSensor>,
}

impl SensorGroup {
    pub(crate) fn new(calendar: Arc<CalendarCache>, fraction_ids: Vec<FractionId>) -> Self {
        let sensors = fraction_ids
            .into_iter()
            .map(|fraction_id| FractionSensor::new(Arc::clone(&calendar), fraction_id))
            .collect();
        Self { calendar, sensors }
    }

    pub(crate) fn sensors(&self) -> &[FractionSensor] {
        &self.sensors
    }

    /// Refresh the shared calendar once for every sensor.
    pub(crate) async fn update(&self) -> Result<RefreshOutcome, CalendarError> {
        self.calendar.refresh().await
    }
}
