pub mod client;
pub mod extract;
pub mod paginator;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::StashClient;
pub use paginator::{CommentPage, CommentPaginator};
pub use transport::{ApiRequest, ApiResponse, Connection, Connector, ReqwestConnector};
