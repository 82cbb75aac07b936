pub mod coordinator;
pub mod error;
pub mod gateway_client;
pub mod plan;
pub mod retry;
pub mod source;
pub mod transport;

pub use coordinator::*;
pub use error::*;
pub use gateway_client::*;
pub use plan::*;
pub use retry::*;
pub use source::*;
pub use transport::*;
