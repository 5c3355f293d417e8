//! Webhook authentication and GitHub API access.

pub mod github_service;
pub mod installation_auth;
pub mod signature;
