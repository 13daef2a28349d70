pub mod conversion;
pub mod definition;
pub mod fingerprint;
pub mod wire;

pub use conversion::*;
pub use definition::*;
pub use wire::*;
