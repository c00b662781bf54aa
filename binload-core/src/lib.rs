pub mod backend;
pub mod binary;
pub mod error;
pub mod loader;
pub mod sections;
pub mod symbols;

pub use backend::Backend;
pub use binary::*;
pub use error::{LoadError, Result};
pub use loader::{dispatch, load, route, Route};
pub use sections::{Section, SectionKind};
pub use symbols::{Symbol, SymbolKind};
