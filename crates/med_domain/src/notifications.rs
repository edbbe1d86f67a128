use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Timelike};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::medicine::{DoseDays, Medicine};

/// Calendar trigger that repeats whenever hour, minute and weekday match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringTrigger {
    pub hour: u32,
    pub minute: u32,
    pub days: DoseDays,
}

impl RecurringTrigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            days: DoseDays::every_day(),
        }
    }

    pub fn for_medicine(medicine: &Medicine) -> Self {
        let time = medicine.time_per_dose();
        Self {
            hour: time.hour(),
            minute: time.minute(),
            days: medicine.selected_days_of_week.clone(),
        }
    }

    pub fn is_daily(&self) -> bool {
        self.days.is_every_day()
    }

    pub fn fires_at(&self, at: NaiveDateTime) -> bool {
        at.hour() == self.hour && at.minute() == self.minute && self.days.includes(at.weekday())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRequest {
    pub id: String,
    pub title: String,
    pub body: String,
    pub trigger: RecurringTrigger,
}

/// How a notification delivered while the app is in the foreground is shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationOptions {
    pub alert: bool,
    pub sound: bool,
}

impl PresentationOptions {
    pub fn alert_and_sound() -> Self {
        Self {
            alert: true,
            sound: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification `{id}` rejected: {reason}")]
    Rejected { id: String, reason: String },
    #[error("pending notification limit of {limit} reached")]
    LimitReached { limit: usize },
    #[error("notification service unavailable: {0}")]
    Unavailable(String),
}

/// Platform-specific notification adapters will implement this trait.
///
/// Both calls are fire-and-forget from the caller's point of view: a failed
/// registration is only reported for diagnostics.
pub trait NotificationSink: Send + Sync {
    fn register(&self, request: NotificationRequest) -> Result<(), NotificationError>;
    fn cancel(&self, id: &str);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn register(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        (**self).register(request)
    }

    fn cancel(&self, id: &str) {
        (**self).cancel(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CenterEvent {
    Registered(NotificationRequest),
    Cancelled(String),
}

type Listener = Box<dyn Fn(&CenterEvent) + Send + Sync>;

/// In-process notification centre keeping at most one pending request per id.
pub struct LocalNotificationCenter {
    pending: RwLock<BTreeMap<String, NotificationRequest>>,
    limit: Option<usize>,
    listener: Option<Listener>,
}

impl LocalNotificationCenter {
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(BTreeMap::new()),
            limit: None,
            listener: None,
        }
    }

    /// Mirrors the cap mobile platforms put on pending local notifications.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The listener runs after the centre's own lock is released, but
    /// `MedicineService` calls the sink while holding its store lock: a
    /// listener must not call back into the service on the same thread.
    pub fn with_listener(
        mut self,
        listener: impl Fn(&CenterEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn pending(&self) -> Vec<NotificationRequest> {
        self.pending.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<NotificationRequest> {
        self.pending.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    /// Requests whose trigger matches the given local date and time.
    pub fn due_at(&self, at: NaiveDateTime) -> Vec<NotificationRequest> {
        self.pending
            .read()
            .values()
            .filter(|request| request.trigger.fires_at(at))
            .cloned()
            .collect()
    }

    fn emit(&self, event: CenterEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }
}

impl Default for LocalNotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for LocalNotificationCenter {
    fn register(&self, request: NotificationRequest) -> Result<(), NotificationError> {
        {
            let mut pending = self.pending.write();
            if let Some(limit) = self.limit {
                if !pending.contains_key(&request.id) && pending.len() >= limit {
                    return Err(NotificationError::LimitReached { limit });
                }
            }
            pending.insert(request.id.clone(), request.clone());
        }
        tracing::debug!(id = %request.id, "local notification registered");
        self.emit(CenterEvent::Registered(request));
        Ok(())
    }

    fn cancel(&self, id: &str) {
        if self.pending.write().remove(id).is_some() {
            tracing::debug!(%id, "local notification cancelled");
            self.emit(CenterEvent::Cancelled(id.to_string()));
        }
    }
}
