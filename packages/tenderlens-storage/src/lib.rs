pub mod analyses;
pub mod db;
pub mod models;
pub mod notifications;
pub mod qdrant;
pub mod queue;
pub mod results;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
