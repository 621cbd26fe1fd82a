use crate::data::SeatAssignment;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("seat store unavailable: {0}")]
    Unavailable(String),
}

/// Keeps the seat records of each allocation.
///
/// Implementations must make `replace_allocation` all-or-nothing: a reader sees
/// either the previous record set or the new one, never a mix.
pub trait SeatStore: Send + Sync {
    fn replace_allocation(
        &self,
        allocation_id: &str,
        assignments: Vec<SeatAssignment>,
    ) -> Result<(), StoreError>;

    fn load_allocation(
        &self,
        allocation_id: &str,
    ) -> Result<Option<Vec<SeatAssignment>>, StoreError>;
}

#[derive(Default)]
pub struct InMemorySeatStore {
    allocations: RwLock<HashMap<String, Vec<SeatAssignment>>>,
}

impl InMemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeatStore for InMemorySeatStore {
    fn replace_allocation(
        &self,
        allocation_id: &str,
        assignments: Vec<SeatAssignment>,
    ) -> Result<(), StoreError> {
        // the old record set is dropped by the same write that installs the new one
        self.allocations
            .write()
            .insert(allocation_id.to_string(), assignments);
        Ok(())
    }

    fn load_allocation(
        &self,
        allocation_id: &str,
    ) -> Result<Option<Vec<SeatAssignment>>, StoreError> {
        Ok(self.allocations.read().get(allocation_id).cloned())
    }
}
