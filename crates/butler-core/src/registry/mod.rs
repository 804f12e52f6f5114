//! Capability server registry
//!
//! Owns configured servers and their lifecycle, and namespaces their
//! tools into a single catalog for the model:
//!
//! - `ServerRegistry`: add/remove/start/stop/restart, tool calls, resource reads
//! - `catalog`: `server_tool` qualified names and the catalog description
//! - `templates`: ready-made configs, including the reserved filesystem server

mod catalog;
mod error;
mod server_registry;
mod templates;

pub use catalog::{
    build_catalog, catalog_tools, describe_catalog, is_valid_server_name, qualify,
    split_qualified, CatalogError, CatalogTool, ServerResources, ServerTools, NO_TOOLS_NOTICE,
    QUALIFIED_NAME_SEPARATOR,
};
pub use error::{RegistryError, RegistryResult};
pub use server_registry::{
    RegistryOptions, ServerRegistry, WorkspaceRootAction, WorkspaceRootTask,
    DEFAULT_RESTART_DELAY,
};
pub use templates::{filesystem_server, server_templates, FILESYSTEM_SERVER};
