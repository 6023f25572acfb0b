//! Operator peripherals (indicator output, button input)

pub mod button;
pub mod led;

pub use button::SignalButton;
pub use led::{Indicator, SysfsLed};
