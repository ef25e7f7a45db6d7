pub mod user;
pub mod comment;
pub mod pull_request;
pub mod diff;

pub use user::*;
pub use comment::*;
pub use pull_request::*;
pub use diff::*;
