pub mod flatten;
pub mod frame;
pub mod summary;
pub mod value;

pub use frame::*;
pub use summary::{ColumnKind, TableSummary};
pub use value::*;
