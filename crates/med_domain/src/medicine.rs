use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Stable identifier of a medicine. Its string form doubles as the
/// notification identifier handed to the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MedicineId(Uuid);

impl MedicineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MedicineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MedicineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for MedicineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Weekday indices (0 = Sunday .. 6 = Saturday) a medicine is taken on.
///
/// An empty set means "every day".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "BTreeSet<u8>", try_from = "BTreeSet<u8>")]
pub struct DoseDays(BTreeSet<u8>);

impl TryFrom<BTreeSet<u8>> for DoseDays {
    type Error = String;

    fn try_from(indices: BTreeSet<u8>) -> Result<Self, Self::Error> {
        match indices.iter().find(|index| **index > 6) {
            Some(index) => Err(format!("weekday index {index} is outside 0-6")),
            None => Ok(Self(indices)),
        }
    }
}

impl From<DoseDays> for BTreeSet<u8> {
    fn from(days: DoseDays) -> Self {
        days.0
    }
}

impl DoseDays {
    pub fn every_day() -> Self {
        Self::default()
    }

    /// Returns `None` when any index falls outside `0..=6`.
    pub fn from_indices(indices: impl IntoIterator<Item = u8>) -> Option<Self> {
        let mut days = BTreeSet::new();
        for index in indices {
            if index > 6 {
                return None;
            }
            days.insert(index);
        }
        Some(Self(days))
    }

    pub fn is_every_day(&self) -> bool {
        self.0.is_empty() || self.0.len() == WEEKDAY_LABELS.len()
    }

    pub fn includes(&self, weekday: Weekday) -> bool {
        self.is_every_day() || self.0.contains(&(weekday.num_days_from_sunday() as u8))
    }

    pub fn indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    pub fn label(&self) -> String {
        if self.is_every_day() {
            return "Every day".to_string();
        }
        self.0
            .iter()
            .filter_map(|index| WEEKDAY_LABELS.get(*index as usize).copied())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medicine {
    id: MedicineId,
    pub name: String,
    pub dosage: String,
    pub quantity: u32,
    pub expiration_date: NaiveDate,
    pub pills_per_dose: NonZeroU32,
    pub selected_days_of_week: DoseDays,
    #[serde(deserialize_with = "deserialize_dose_time")]
    time_per_dose: NaiveTime,
}

impl Medicine {
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        quantity: u32,
        expiration_date: NaiveDate,
    ) -> Self {
        Self {
            id: MedicineId::new(),
            name: name.into(),
            dosage: dosage.into(),
            quantity,
            expiration_date,
            pills_per_dose: NonZeroU32::MIN,
            selected_days_of_week: DoseDays::every_day(),
            time_per_dose: default_dose_time(),
        }
    }

    pub fn with_pills_per_dose(mut self, pills_per_dose: NonZeroU32) -> Self {
        self.pills_per_dose = pills_per_dose;
        self
    }

    pub fn with_time_per_dose(mut self, time: NaiveTime) -> Self {
        self.set_time_per_dose(time);
        self
    }

    pub fn with_days(mut self, days: DoseDays) -> Self {
        self.selected_days_of_week = days;
        self
    }

    pub fn id(&self) -> MedicineId {
        self.id
    }

    pub fn time_per_dose(&self) -> NaiveTime {
        self.time_per_dose
    }

    /// Triggers only carry hour and minute, so seconds are dropped here.
    pub fn set_time_per_dose(&mut self, time: NaiveTime) {
        self.time_per_dose = truncate_to_minute(time);
    }

    /// Consumes one dose, clamping the remaining quantity at zero.
    pub fn take_dose(&mut self) -> u32 {
        self.quantity = self.quantity.saturating_sub(self.pills_per_dose.get());
        self.quantity
    }

    pub fn list_label(&self) -> String {
        format!("{} - {}", self.name, self.dosage)
    }

    pub fn formatted_expiration(&self) -> String {
        self.expiration_date.format("%b %-d, %Y").to_string()
    }

    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiration_date < today
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

fn deserialize_dose_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    NaiveTime::deserialize(deserializer).map(truncate_to_minute)
}

/// Dose time used when none is chosen explicitly.
pub fn default_dose_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aspirin(quantity: u32, pills: u32) -> Medicine {
        Medicine::new(
            "Aspirin",
            "100mg",
            quantity,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
        .with_pills_per_dose(NonZeroU32::new(pills).unwrap())
    }

    #[test]
    fn take_dose_subtracts_pills_per_dose() {
        let mut medicine = aspirin(10, 2);
        assert_eq!(medicine.take_dose(), 8);
        assert_eq!(medicine.quantity, 8);
    }

    #[test]
    fn take_dose_clamps_at_zero() {
        let mut medicine = aspirin(3, 5);
        assert_eq!(medicine.take_dose(), 0);
        assert_eq!(medicine.take_dose(), 0);
    }

    #[test]
    fn dose_time_drops_seconds() {
        let medicine =
            aspirin(1, 1).with_time_per_dose(NaiveTime::from_hms_opt(8, 15, 42).unwrap());
        assert_eq!(
            medicine.time_per_dose(),
            NaiveTime::from_hms_opt(8, 15, 0).unwrap()
        );
    }

    #[test]
    fn dose_days_reject_out_of_range_indices() {
        assert!(DoseDays::from_indices([0, 6]).is_some());
        assert!(DoseDays::from_indices([7]).is_none());
    }

    #[test]
    fn dose_days_match_weekdays() {
        let days = DoseDays::from_indices([1, 3]).unwrap();
        assert!(days.includes(Weekday::Mon));
        assert!(days.includes(Weekday::Wed));
        assert!(!days.includes(Weekday::Sun));
        assert_eq!(days.label(), "Mon, Wed");
        assert!(DoseDays::every_day().includes(Weekday::Sat));
        assert_eq!(DoseDays::every_day().label(), "Every day");
    }

    #[test]
    fn display_helpers_match_detail_screen() {
        let medicine = aspirin(10, 2);
        assert_eq!(medicine.list_label(), "Aspirin - 100mg");
        assert_eq!(medicine.formatted_expiration(), "Mar 1, 2026");
        assert!(medicine.is_expired_on(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()));
        assert!(!medicine.is_expired_on(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
    }

    #[test]
    fn medicine_id_round_trips_through_its_string_form() {
        let medicine = aspirin(1, 1);
        let parsed: MedicineId = medicine.id().to_string().parse().unwrap();
        assert_eq!(parsed, medicine.id());
        assert!("not-a-uuid".parse::<MedicineId>().is_err());
    }

    #[test]
    fn dose_days_reject_out_of_range_indices_when_deserialized() {
        assert!(serde_json::from_str::<DoseDays>("[9]").is_err());
        let days: DoseDays = serde_json::from_str("[0, 6]").unwrap();
        assert_eq!(days.label(), "Sun, Sat");
        assert_eq!(serde_json::to_string(&days).unwrap(), "[0,6]");
    }

    #[test]
    fn deserialized_medicine_drops_dose_time_seconds() {
        let medicine = aspirin(10, 2);
        let mut json = serde_json::to_value(&medicine).unwrap();
        json["time_per_dose"] = serde_json::Value::from("07:30:45");
        let restored: Medicine = serde_json::from_value(json).unwrap();
        assert_eq!(
            restored.time_per_dose(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );

        let mut json = serde_json::to_value(&medicine).unwrap();
        json["selected_days_of_week"] = serde_json::json!([1, 9]);
        assert!(serde_json::from_value::<Medicine>(json).is_err());
    }
}
