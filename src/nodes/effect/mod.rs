mod channels;
mod eq;
mod fade;
mod limiter;
mod meter;
mod mixer;

pub use channels::*;
pub use eq::*;
pub use fade::*;
pub use limiter::*;
pub use meter::*;
pub use mixer::*;
