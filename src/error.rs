//! Error types shared by the simulation core and its import/export layer.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Fatal simulation errors.
///
/// Every variant aborts the run. Recoverable conditions such as a vehicle
/// leaving below its target are not errors; they are collected as
/// [`UnmetTarget`](crate::sim::types::UnmetTarget) records instead.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed rates, capacities, or roster/schedule values.
    #[error("invalid input: {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// The schedule does not cover the requested horizon.
    #[error("schedule covers {available} timesteps but {requested} were requested")]
    ScheduleMismatch { requested: usize, available: usize },

    /// A charger already holds a different vehicle.
    #[error("charger {charger} is occupied by {occupant}, cannot connect {vehicle}")]
    AlreadyOccupied {
        charger: String,
        occupant: String,
        vehicle: String,
    },

    /// Power was delivered through a charger with no (or another) vehicle attached.
    #[error("charger {charger} has no connected vehicle {vehicle}")]
    NotConnected { charger: String, vehicle: String },

    /// A timestep was stepped out of sequence.
    #[error("timestep {got} stepped out of order, expected {expected}")]
    OutOfOrder { expected: usize, got: usize },

    /// The recorder already holds a record for this entity at or after the timestep.
    #[error("ledger already holds {entity} at or after timestep {timestep}")]
    LedgerConflict { entity: String, timestep: usize },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Shorthand for an [`SimError::InvalidInput`].
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}
