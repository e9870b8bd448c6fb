pub mod battery;
pub mod cadence;
pub mod clocks;
pub mod focus;
pub mod models;
