pub mod pricing;
pub mod inventory;

pub use pricing::{FareEngine, FareConfig};
pub use inventory::SeatInventory;
