mod map;
mod selection;
pub use map::*;
pub use selection::*;
