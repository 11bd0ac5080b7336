//! Physical site components: batteries, vehicles, chargers and non-EV load.

/// EV traction battery model.
pub mod battery;
/// Site charging point and its economics.
pub mod charger;
/// Synthetic non-EV site load profile.
pub mod site_load;
/// Vehicle sessions and their connection lifecycle.
pub mod vehicle;

pub use battery::Battery;
pub use charger::{Charger, ChargerSpec, ChargerType};
pub use site_load::SiteLoad;
pub use vehicle::{ConnectionState, Vehicle, VehicleSpec};
