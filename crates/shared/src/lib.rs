//! Wire types shared between the BeMore server and its clients.

pub mod counseling;
pub mod error;
pub mod profile;
pub mod storage;

pub use counseling::*;
pub use error::{ErrorBody, ErrorCode, ErrorDetail};
pub use profile::*;
pub use storage::*;
