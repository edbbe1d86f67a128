use std::num::NonZeroU32;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::medicine::{default_dose_time, DoseDays, Medicine};

/// Raw text-field values from the add-medicine form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicineDraft {
    pub name: String,
    pub dosage: String,
    pub quantity: String,
    pub pills_per_dose: String,
    pub expiration_date: String,
    pub time_per_dose: String,
    pub days: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("quantity `{0}` is not a whole number")]
    InvalidQuantity(String),
    #[error("pills per dose `{0}` is not a positive whole number")]
    InvalidPillsPerDose(String),
    #[error("expiration date `{0}` is not in YYYY-MM-DD form")]
    InvalidExpirationDate(String),
    #[error("dose time `{0}` is not in HH:MM form")]
    InvalidDoseTime(String),
    #[error("weekday list `{0}` must contain indices 0-6 (0 = Sunday)")]
    InvalidDays(String),
}

/// Fallbacks applied to fields the user left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormDefaults {
    pub pills_per_dose: NonZeroU32,
    pub time_per_dose: NaiveTime,
    pub expiration_date: NaiveDate,
}

impl FormDefaults {
    pub fn for_today(today: NaiveDate) -> Self {
        Self {
            pills_per_dose: NonZeroU32::MIN,
            time_per_dose: default_dose_time(),
            expiration_date: today,
        }
    }
}

impl MedicineDraft {
    /// Builds a new medicine with a fresh id. Nothing is created unless every
    /// field parses.
    pub fn parse(&self, defaults: &FormDefaults) -> Result<Medicine, FormError> {
        let quantity = self
            .quantity
            .trim()
            .parse::<u32>()
            .map_err(|_| FormError::InvalidQuantity(self.quantity.clone()))?;

        let pills_per_dose = match self.pills_per_dose.trim() {
            "" => defaults.pills_per_dose,
            raw => raw
                .parse::<NonZeroU32>()
                .map_err(|_| FormError::InvalidPillsPerDose(self.pills_per_dose.clone()))?,
        };

        let expiration_date = match self.expiration_date.trim() {
            "" => defaults.expiration_date,
            raw => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| FormError::InvalidExpirationDate(self.expiration_date.clone()))?,
        };

        let time_per_dose = match self.time_per_dose.trim() {
            "" => defaults.time_per_dose,
            raw => parse_dose_time(raw)
                .ok_or_else(|| FormError::InvalidDoseTime(self.time_per_dose.clone()))?,
        };

        let days =
            parse_days(&self.days).ok_or_else(|| FormError::InvalidDays(self.days.clone()))?;

        Ok(Medicine::new(
            self.name.trim(),
            self.dosage.trim(),
            quantity,
            expiration_date,
        )
        .with_pills_per_dose(pills_per_dose)
        .with_time_per_dose(time_per_dose)
        .with_days(days))
    }
}

pub fn parse_dose_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

fn parse_days(raw: &str) -> Option<DoseDays> {
    let mut indices = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        indices.push(token.parse::<u8>().ok()?);
    }
    DoseDays::from_indices(indices)
}
