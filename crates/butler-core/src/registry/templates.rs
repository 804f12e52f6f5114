//! Pre-configured capability server templates

use crate::types::{ServerCategory, ServerConfig};

/// Name of the reserved filesystem server
pub const FILESYSTEM_SERVER: &str = "filesystem";

const FILESYSTEM_PACKAGE: &str = "@modelcontextprotocol/server-filesystem";

/// The reserved filesystem server, rooted at `root`.
///
/// The root is always the last argument; `set_workspace_root` relies on it.
pub fn filesystem_server(root: &str) -> ServerConfig {
    ServerConfig::new(FILESYSTEM_SERVER, "npx", ServerCategory::Filesystem)
        .with_args(["-y", FILESYSTEM_PACKAGE, root])
        .with_description("Provides file system operations and navigation")
}

/// Templates offered by the "add server" UI
pub fn server_templates() -> Vec<ServerConfig> {
    vec![
        ServerConfig::new(FILESYSTEM_SERVER, "npx", ServerCategory::Filesystem)
            .with_args(["-y", FILESYSTEM_PACKAGE])
            .with_description("Provides file system operations and navigation"),
        ServerConfig::new("git", "npx", ServerCategory::Git)
            .with_args(["-y", "@modelcontextprotocol/server-git"])
            .with_description("Git repository management and operations"),
        ServerConfig::new("sqlite", "npx", ServerCategory::Database)
            .with_args(["-y", "@modelcontextprotocol/server-sqlite"])
            .with_description("SQLite database operations"),
        ServerConfig::new("postgres", "npx", ServerCategory::Database)
            .with_args(["-y", "@modelcontextprotocol/server-postgres"])
            .with_description("PostgreSQL database operations"),
        ServerConfig::new("brave-search", "npx", ServerCategory::Web)
            .with_args(["-y", "@modelcontextprotocol/server-brave-search"])
            .with_description("Web search using Brave Search API"),
    ]
}
