// Crate root library declaration and module exports.
pub mod client;
pub mod error;
pub mod model;
pub mod session;

pub use client::{CompassClient, Pagination};
pub use error::{AuthError, Error};
pub use session::{Session, SessionSnapshot};
