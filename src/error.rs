use thiserror::Error;

use crate::data::{RoomId, Year};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("invalid student `{roll}`: {reason}")]
    InvalidStudent { roll: String, reason: String },

    #[error("invalid room `{room}`: {reason}")]
    InvalidRoom { room: RoomId, reason: String },

    #[error("room `{room}`: no students available for remaining pairing (years {years:?})")]
    NoPairingAvailable { room: RoomId, years: Vec<Year> },

    #[error("room `{room}`: no group with remaining students for single-year allocation")]
    NoGroupAvailable { room: RoomId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AllocationError {
    /// True for errors caused by the request payload rather than by the engine or storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AllocationError::InvalidStudent { .. } | AllocationError::InvalidRoom { .. }
        )
    }
}
