//! Local stand-in for the conversion service
//!
//! Speaks the same wire contract as the real service and walks every job
//! through a fixed progress script instead of fetching or transcoding media.

pub mod error;
pub mod server;
pub mod services;
pub mod state;

pub use server::{router, run};
pub use state::{FAIL_MARKER, FAIL_MESSAGE, StubJob, StubScript, StubState};
