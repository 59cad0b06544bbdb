pub mod tokens;
pub mod parser;
pub mod consolidate;
pub mod confidence;

pub use tokens::*;
pub use parser::*;
pub use consolidate::*;
pub use confidence::*;
