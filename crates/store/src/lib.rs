pub mod client;
pub mod error;
pub mod gateway;

pub use client::*;
pub use error::*;
pub use gateway::*;
