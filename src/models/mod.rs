pub mod analysis;
pub mod diagnosis;
pub mod document;
pub mod medication;

pub use analysis::*;
pub use diagnosis::*;
pub use document::*;
pub use medication::*;
