use crate::medicine::{Medicine, MedicineId};
use crate::notifications::{
    NotificationError, NotificationRequest, NotificationSink, PresentationOptions,
    RecurringTrigger,
};

/// Keeps the platform's registered triggers in step with each medicine's
/// dose time.
pub struct NotificationScheduler {
    sink: Box<dyn NotificationSink>,
}

impl NotificationScheduler {
    pub fn new(sink: Box<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn request_for(medicine: &Medicine) -> NotificationRequest {
        NotificationRequest {
            id: medicine.id().to_string(),
            title: format!("Time to take {}", medicine.name),
            body: format!("Dosage: {}", medicine.dosage),
            trigger: RecurringTrigger::for_medicine(medicine),
        }
    }

    /// Replaces any registration for this medicine with a fresh one.
    ///
    /// Failures are logged and handed back for inspection; nothing retries.
    pub fn schedule_notification(&self, medicine: &Medicine) -> Result<(), NotificationError> {
        let request = Self::request_for(medicine);
        let id = request.id.clone();
        self.sink.cancel(&id);
        match self.sink.register(request) {
            Ok(()) => {
                tracing::debug!(
                    %id,
                    name = %medicine.name,
                    time = %medicine.time_per_dose().format("%H:%M"),
                    days = %medicine.selected_days_of_week.label(),
                    "notification scheduled"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%id, %err, "failed to schedule notification");
                Err(err)
            }
        }
    }

    pub fn cancel(&self, id: MedicineId) {
        let id = id.to_string();
        self.sink.cancel(&id);
        tracing::debug!(%id, "notification cancelled");
    }

    pub fn on_delivered(&self, notification_id: &str) -> PresentationOptions {
        tracing::debug!(%notification_id, "notification delivered in foreground");
        PresentationOptions::alert_and_sound()
    }
}
