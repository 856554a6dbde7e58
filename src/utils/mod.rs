pub mod clock;
pub mod logging;

pub use clock::{format_clock, parse_clock};
