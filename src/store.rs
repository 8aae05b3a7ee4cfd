use crate::model::Record;

/// In-memory snapshot of fetched records, keyed by business number.
///
/// Insertion order is the backend's list order; windowing relies on it.
/// Keys are unique: an upsert with a known key replaces that entry where it
/// stands.
#[derive(Debug, Clone)]
pub struct RecordStore<R> {
    records: Vec<R>,
}

impl<R> Default for RecordStore<R> {
    fn default() -> Self {
        RecordStore { records: Vec::new() }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<R>) -> Self {
        let mut store = Self::new();
        store.replace_all(records);
        store
    }

    /// Swaps in a fresh fetch. A repeated key keeps the first position and
    /// the last value.
    pub fn replace_all(&mut self, records: Vec<R>) {
        self.records.clear();
        for record in records {
            self.upsert(record);
        }
    }

    pub fn list(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| r.business_key() == key)
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.position(key).map(|i| &self.records[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Replaces the entry with the same business key, or appends.
    pub fn upsert(&mut self, record: R) {
        match self.position(record.business_key()) {
            Some(i) => {
                tracing::debug!(kind = R::KIND, key = record.business_key(), "replacing record");
                self.records[i] = record;
            }
            None => self.records.push(record),
        }
    }

    /// Drops the entry with `key`; everything else stays as it was.
    pub fn remove(&mut self, key: &str) -> Option<R> {
        self.position(key).map(|i| self.records.remove(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Invoice;

    fn store() -> RecordStore<Invoice> {
        RecordStore::from_records(vec![
            Invoice::new("A-1", "Ann"),
            Invoice::new("A-2", "Bob"),
            Invoice::new("A-3", "Cat"),
        ])
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut s = store();
        let mut changed = Invoice::new("A-2", "Bob");
        changed.paid_amount = 50.0;
        s.upsert(changed);
        assert_eq!(s.len(), 3);
        assert_eq!(s.list()[1].paid_amount, 50.0);

        s.upsert(Invoice::new("A-4", "Dan"));
        assert_eq!(s.list()[3].invoice_number, "A-4");
    }

    #[test]
    fn remove_by_key_only_touches_one() {
        let mut s = store();
        let before = s.list().to_vec();
        let removed = s.remove("A-2").unwrap();
        assert_eq!(removed.client_name, "Bob");
        assert_eq!(s.list(), &[before[0].clone(), before[2].clone()]);
        assert!(s.remove("A-2").is_none());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn duplicate_keys_collapse_on_load() {
        let mut second = Invoice::new("A-1", "Ann Updated");
        second.total_price = 9.0;
        let s = RecordStore::from_records(vec![Invoice::new("A-1", "Ann"), Invoice::new("B-1", "Bea"), second]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get("A-1").unwrap().client_name, "Ann Updated");
        assert_eq!(s.list()[0].invoice_number, "A-1");
    }
}
