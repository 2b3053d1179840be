//! Forum service: topics and comments.

pub mod authz;
mod error;
mod service;

pub use authz::authorize_delete;
pub use error::ForumError;
pub use service::ForumService;
