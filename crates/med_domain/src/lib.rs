pub mod form;
pub mod medicine;
pub mod notifications;
pub mod scheduler;
pub mod service;
pub mod store;

pub use crate::medicine::{Medicine, MedicineId};
pub use crate::service::{MedicineService, MedicineServiceBuilder};
