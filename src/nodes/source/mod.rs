mod player;
mod resampling_source;
mod sine;

pub use player::*;
pub use resampling_source::*;
pub use sine::*;
