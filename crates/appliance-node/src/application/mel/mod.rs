//! MEL-AC air-conditioner driver.
//!
//! - **`link`**    – one request in flight, response or timeout.
//! - **`params`**  – the node's mirror of the unit's settings.
//! - **`climate`** – the climate entity: connect, poll, publish and control.

pub mod climate;
pub mod link;
pub mod params;

pub use climate::{ClimateSettings, MelAirConditioner, PollFlags};
