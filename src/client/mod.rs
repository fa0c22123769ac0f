//! Clients for the remote conversion service
//!
//! - [`JobService`] - async seam the controller talks through
//! - [`HttpJobService`] - reqwest implementation of the wire contract
//! - [`ScriptedService`] - in-process replay of canned replies

mod http;
mod scripted;
mod traits;

pub use http::{HttpConfig, HttpJobService};
pub use scripted::ScriptedService;
pub use traits::{JobService, Result, TransportError};
