mod finder;
mod loader;
pub mod op_path;

pub use finder::{OperationFinder, OperationRef, OperationTarget};
pub use loader::{LoadError, SourceLoader};
