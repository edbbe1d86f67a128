use std::collections::BTreeSet;

use crate::medicine::{Medicine, MedicineId};

/// Ordered in-memory list of medicines.
///
/// The store has no side effects of its own; `MedicineService` wraps it in a
/// lock and pairs each mutation with the matching scheduler call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicineStore {
    medicines: Vec<Medicine>,
}

impl MedicineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, medicine: Medicine) {
        self.medicines.push(medicine);
    }

    /// Removes the entries at `indices`, skipping positions that are out of
    /// range or repeated. Returns the removed entries in index order.
    pub fn remove(&mut self, indices: impl IntoIterator<Item = usize>) -> Vec<Medicine> {
        let targets: BTreeSet<usize> = indices
            .into_iter()
            .filter(|index| *index < self.medicines.len())
            .collect();
        let mut removed: Vec<Medicine> = targets
            .into_iter()
            .rev()
            .map(|index| self.medicines.remove(index))
            .collect();
        removed.reverse();
        removed
    }

    /// Applies one dose to the medicine with `id` and returns the updated
    /// record, or `None` when no such medicine exists.
    pub fn take_medicine(&mut self, id: MedicineId) -> Option<Medicine> {
        let medicine = self.medicines.iter_mut().find(|m| m.id() == id)?;
        medicine.take_dose();
        Some(medicine.clone())
    }

    pub fn get(&self, id: MedicineId) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id() == id)
    }

    /// Matches the exact string form of the id; other UUID spellings miss.
    pub fn find_by_notification_id(&self, notification_id: &str) -> Option<&Medicine> {
        self.medicines
            .iter()
            .find(|m| m.id().to_string() == notification_id)
    }

    pub fn at(&self, index: usize) -> Option<&Medicine> {
        self.medicines.get(index)
    }

    pub fn medicines(&self) -> &[Medicine] {
        &self.medicines
    }

    pub fn len(&self) -> usize {
        self.medicines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medicines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::num::NonZeroU32;

    fn medicine(name: &str, quantity: u32, pills: u32) -> Medicine {
        Medicine::new(
            name,
            "10mg",
            quantity,
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
        )
        .with_pills_per_dose(NonZeroU32::new(pills).unwrap())
    }

    #[test]
    fn add_keeps_insertion_order() {
        let mut store = MedicineStore::new();
        store.add(medicine("A", 1, 1));
        store.add(medicine("B", 1, 1));
        let names: Vec<&str> = store.medicines().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn remove_skips_invalid_and_duplicate_indices() {
        let mut store = MedicineStore::new();
        for name in ["A", "B", "C", "D"] {
            store.add(medicine(name, 1, 1));
        }
        let removed = store.remove([3, 1, 1, 9]);
        let removed: Vec<&str> = removed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(removed, ["B", "D"]);
        let left: Vec<&str> = store.medicines().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(left, ["A", "C"]);
    }

    #[test]
    fn take_medicine_updates_record_in_place() {
        let mut store = MedicineStore::new();
        store.add(medicine("A", 5, 1));
        let target = medicine("B", 10, 4);
        let id = target.id();
        store.add(target);

        let updated = store.take_medicine(id).expect("medicine present");
        assert_eq!(updated.quantity, 6);
        assert_eq!(store.at(1).unwrap().quantity, 6);
        assert_eq!(store.at(0).unwrap().quantity, 5);
    }

    #[test]
    fn take_medicine_on_missing_id_is_a_no_op() {
        let mut store = MedicineStore::new();
        store.add(medicine("A", 5, 1));
        let before = store.clone();
        assert!(store.take_medicine(MedicineId::new()).is_none());
        assert_eq!(store, before);
    }

    #[test]
    fn find_by_notification_id_matches_exact_string_form() {
        let mut store = MedicineStore::new();
        let target = medicine("A", 5, 1);
        let id = target.id();
        store.add(target);
        assert_eq!(
            store.find_by_notification_id(&id.to_string()).map(|m| m.id()),
            Some(id)
        );
        assert!(store.find_by_notification_id("garbage").is_none());
        assert!(store
            .find_by_notification_id(&id.to_string().to_uppercase())
            .is_none());
        assert!(store
            .find_by_notification_id(&format!(" {id} "))
            .is_none());
    }
}
