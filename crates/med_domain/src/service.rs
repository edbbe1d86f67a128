use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    form::{FormDefaults, FormError, MedicineDraft},
    medicine::{Medicine, MedicineId},
    notifications::{NotificationSink, PresentationOptions},
    scheduler::NotificationScheduler,
    store::MedicineStore,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicineSnapshot {
    pub medicines: Vec<Medicine>,
}

/// Owns the medicine store and the notification scheduler.
///
/// Every mutation holds the store's write lock across both the list change
/// and the scheduler call it triggers, so UI calls and notification callbacks
/// from another thread cannot interleave.
pub struct MedicineService {
    store: RwLock<MedicineStore>,
    scheduler: NotificationScheduler,
}

pub struct MedicineServiceBuilder {
    medicines: Vec<Medicine>,
    notification_sink: Option<Box<dyn NotificationSink>>,
}

impl MedicineServiceBuilder {
    pub fn new() -> Self {
        Self {
            medicines: Vec::new(),
            notification_sink: None,
        }
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    /// Seeds the store; each seeded medicine is scheduled on build.
    pub fn add_medicine(mut self, medicine: Medicine) -> Self {
        self.medicines.push(medicine);
        self
    }

    pub fn build(self) -> Result<MedicineService> {
        let sink = self
            .notification_sink
            .ok_or_else(|| anyhow!("notification sink not configured"))?;
        let service = MedicineService {
            store: RwLock::new(MedicineStore::new()),
            scheduler: NotificationScheduler::new(sink),
        };
        for medicine in self.medicines {
            service.add(medicine);
        }
        Ok(service)
    }
}

impl Default for MedicineServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MedicineService {
    pub fn builder() -> MedicineServiceBuilder {
        MedicineServiceBuilder::new()
    }

    /// Appends the medicine and schedules its first reminder. A scheduling
    /// failure is logged and leaves the stored record in place.
    pub fn add(&self, medicine: Medicine) -> MedicineId {
        let id = medicine.id();
        let mut store = self.store.write();
        let _ = self.scheduler.schedule_notification(&medicine);
        store.add(medicine);
        tracing::info!(%id, count = store.len(), "medicine added");
        id
    }

    pub fn add_from_draft(
        &self,
        draft: &MedicineDraft,
        defaults: &FormDefaults,
    ) -> Result<MedicineId, FormError> {
        match draft.parse(defaults) {
            Ok(medicine) => Ok(self.add(medicine)),
            Err(err) => {
                tracing::debug!(%err, "medicine draft rejected");
                Err(err)
            }
        }
    }

    /// Removes the entries at `indices` and cancels their reminders. An id
    /// still held by a surviving entry keeps its reminder.
    pub fn remove(&self, indices: impl IntoIterator<Item = usize>) -> Vec<Medicine> {
        let mut store = self.store.write();
        let removed = store.remove(indices);
        for medicine in &removed {
            if store.get(medicine.id()).is_none() {
                self.scheduler.cancel(medicine.id());
            }
        }
        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), count = store.len(), "medicines removed");
        }
        removed
    }

    /// Consumes one dose and re-registers the reminder for the next cycle.
    /// Unknown ids are ignored.
    pub fn take_medicine(&self, id: MedicineId) -> Option<Medicine> {
        let mut store = self.store.write();
        self.take_locked(&mut store, id)
    }

    /// Entry point for the platform when the user taps a delivered reminder.
    /// The identifier must equal the string form of a stored medicine id.
    pub fn on_notification_response(&self, notification_id: &str) -> Option<Medicine> {
        let mut store = self.store.write();
        let Some(id) = store
            .find_by_notification_id(notification_id)
            .map(Medicine::id)
        else {
            tracing::debug!(%notification_id, "ignoring response for unknown notification");
            return None;
        };
        self.take_locked(&mut store, id)
    }

    fn take_locked(&self, store: &mut MedicineStore, id: MedicineId) -> Option<Medicine> {
        let Some(updated) = store.take_medicine(id) else {
            tracing::debug!(%id, "take requested for unknown medicine");
            return None;
        };
        tracing::info!(%id, quantity = updated.quantity, "dose taken");
        let _ = self.scheduler.schedule_notification(&updated);
        Some(updated)
    }

    pub fn on_delivered(&self, notification_id: &str) -> PresentationOptions {
        self.scheduler.on_delivered(notification_id)
    }

    pub fn medicines(&self) -> Vec<Medicine> {
        self.store.read().medicines().to_vec()
    }

    pub fn get(&self, id: MedicineId) -> Option<Medicine> {
        self.store.read().get(id).cloned()
    }

    pub fn at(&self, index: usize) -> Option<Medicine> {
        self.store.read().at(index).cloned()
    }

    pub fn find_by_notification_id(&self, notification_id: &str) -> Option<Medicine> {
        self.store
            .read()
            .find_by_notification_id(notification_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn snapshot(&self) -> MedicineSnapshot {
        MedicineSnapshot {
            medicines: self.medicines(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::LocalNotificationCenter;
    use chrono::NaiveDate;
    use std::num::NonZeroU32;
    use std::sync::Arc;

    fn medicine(quantity: u32, pills: u32) -> Medicine {
        Medicine::new(
            "Ibuprofen",
            "200mg",
            quantity,
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
        )
        .with_pills_per_dose(NonZeroU32::new(pills).unwrap())
    }

    #[test]
    fn build_requires_notification_sink() {
        assert!(MedicineService::builder().build().is_err());
    }

    #[test]
    fn seeded_medicines_are_scheduled_on_build() {
        let center = Arc::new(LocalNotificationCenter::new());
        let service = MedicineService::builder()
            .with_notification_sink(Box::new(center.clone()))
            .add_medicine(medicine(5, 1))
            .add_medicine(medicine(6, 1))
            .build()
            .unwrap();
        assert_eq!(service.len(), 2);
        assert_eq!(center.len(), 2);
    }

    #[test]
    fn malformed_response_id_is_ignored() {
        let service = MedicineService::builder()
            .with_notification_sink(Box::new(LocalNotificationCenter::new()))
            .add_medicine(medicine(5, 1))
            .build()
            .unwrap();
        assert!(service.on_notification_response("not-an-id").is_none());
        assert_eq!(service.medicines()[0].quantity, 5);
    }

    #[test]
    fn rejected_draft_adds_nothing() {
        let center = Arc::new(LocalNotificationCenter::new());
        let service = MedicineService::builder()
            .with_notification_sink(Box::new(center.clone()))
            .build()
            .unwrap();
        let draft = MedicineDraft {
            name: "Aspirin".into(),
            quantity: "lots".into(),
            ..MedicineDraft::default()
        };
        let defaults = FormDefaults::for_today(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert!(service.add_from_draft(&draft, &defaults).is_err());
        assert!(service.is_empty());
        assert!(center.is_empty());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let service = MedicineService::builder()
            .with_notification_sink(Box::new(LocalNotificationCenter::new()))
            .add_medicine(medicine(5, 1))
            .build()
            .unwrap();
        let json = serde_json::to_value(service.snapshot()).unwrap();
        assert_eq!(json["medicines"][0]["name"], "Ibuprofen");
        assert_eq!(json["medicines"][0]["quantity"], 5);
    }
}
