pub mod types;
pub mod reference;
pub mod detection;

pub use types::*;
pub use reference::*;
pub use detection::*;
