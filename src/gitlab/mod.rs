//! GitLab v4 API access: wire types, pagination and the HTTP client.

pub mod api_types;
pub mod client;
pub mod paging;

#[cfg(test)]
pub mod fake;

pub use client::GitLabClient;
