pub mod backend;
pub mod error;
pub mod local;
pub mod object_store;
pub mod range;
pub mod registry;
pub mod remote;
pub mod types;

pub use backend::*;
pub use error::*;
pub use local::*;
pub use object_store::*;
pub use range::*;
pub use registry::*;
pub use remote::*;
pub use types::*;
