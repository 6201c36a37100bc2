pub mod geo;
pub mod mode;
pub mod time;

pub use geo::*;
pub use mode::*;
pub use time::*;
