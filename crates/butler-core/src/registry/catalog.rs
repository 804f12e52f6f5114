//! Qualified tool names and the model-facing tool catalog
//!
//! Servers expose tools under bare names. The model sees one flat list, so
//! each tool is addressed as `server_tool`. Server names are forbidden from
//! containing the separator, which makes the split on the first `_` exact
//! even when tool names contain underscores.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{Resource, Tool};

/// Separator between server and tool in a qualified name
pub const QUALIFIED_NAME_SEPARATOR: char = '_';

/// Notice embedded in the system prompt when no tools are available
pub const NO_TOOLS_NOTICE: &str = "No MCP tools are currently available.";

/// Errors from parsing a qualified tool name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Tool name {0:?} is not qualified with a server name")]
    MissingSeparator(String),

    #[error("Tool name {0:?} has an empty server or tool part")]
    EmptySegment(String),
}

/// Tools of one running server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTools {
    pub server_name: String,
    pub tools: Vec<Tool>,
}

/// Resources of one running server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerResources {
    pub server_name: String,
    pub resources: Vec<Resource>,
}

/// One entry of the flattened, globally addressable tool catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTool {
    pub qualified_name: String,
    pub server_name: String,
    pub tool_name: String,
    /// Description prefixed with `[server]`
    pub description: String,
    pub input_schema: Value,
}

impl From<&CatalogTool> for Tool {
    fn from(entry: &CatalogTool) -> Self {
        Tool {
            name: entry.qualified_name.clone(),
            description: entry.description.clone(),
            input_schema: entry.input_schema.clone(),
        }
    }
}

/// Whether a server name can take part in qualified names
pub fn is_valid_server_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(QUALIFIED_NAME_SEPARATOR)
}

/// `server` + `_` + `tool`
pub fn qualify(server: &str, tool: &str) -> String {
    format!("{}{}{}", server, QUALIFIED_NAME_SEPARATOR, tool)
}

/// Recover `(server, tool)` from a qualified name, splitting on the first
/// separator.
pub fn split_qualified(name: &str) -> Result<(&str, &str), CatalogError> {
    let (server, tool) = name
        .split_once(QUALIFIED_NAME_SEPARATOR)
        .ok_or_else(|| CatalogError::MissingSeparator(name.to_string()))?;

    if server.is_empty() || tool.is_empty() {
        return Err(CatalogError::EmptySegment(name.to_string()));
    }
    Ok((server, tool))
}

/// Flatten per-server tool groups into the model catalog
pub fn build_catalog(groups: &[ServerTools]) -> Vec<CatalogTool> {
    groups
        .iter()
        .flat_map(|group| {
            group.tools.iter().map(move |tool| CatalogTool {
                qualified_name: qualify(&group.server_name, &tool.name),
                server_name: group.server_name.clone(),
                tool_name: tool.name.clone(),
                description: format!("[{}] {}", group.server_name, tool.description),
                input_schema: tool.input_schema.clone(),
            })
        })
        .collect()
}

/// Provider-facing tool definitions for a catalog
pub fn catalog_tools(catalog: &[CatalogTool]) -> Vec<Tool> {
    catalog.iter().map(Tool::from).collect()
}

/// Bullet list of the catalog for the system prompt
pub fn describe_catalog(catalog: &[CatalogTool]) -> String {
    if catalog.is_empty() {
        return NO_TOOLS_NOTICE.to_string();
    }

    catalog
        .iter()
        .map(|entry| format!("- {}: {}", entry.qualified_name, entry.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<ServerTools> {
        vec![
            ServerTools {
                server_name: "filesystem".into(),
                tools: vec![
                    Tool::new("read_file", "Read the contents of a file"),
                    Tool::new("list_directory", "List contents of a directory"),
                ],
            },
            ServerTools {
                server_name: "git".into(),
                tools: vec![Tool::new("git_status", "Get git repository status")],
            },
        ]
    }

    #[test]
    fn test_qualified_round_trip() {
        for (server, tool) in [
            ("filesystem", "read_file"),
            ("git", "git_log"),
            ("db", "execute"),
            ("web", "_private"),
            ("a", "b__c_"),
        ] {
            assert!(is_valid_server_name(server));
            let qualified = qualify(server, tool);
            assert_eq!(split_qualified(&qualified).unwrap(), (server, tool));
        }
    }

    #[test]
    fn test_split_errors() {
        assert_eq!(
            split_qualified("echo"),
            Err(CatalogError::MissingSeparator("echo".into()))
        );
        assert_eq!(
            split_qualified("_echo"),
            Err(CatalogError::EmptySegment("_echo".into()))
        );
        assert_eq!(
            split_qualified("server_"),
            Err(CatalogError::EmptySegment("server_".into()))
        );
    }

    #[test]
    fn test_server_name_validation() {
        assert!(is_valid_server_name("brave-search"));
        assert!(!is_valid_server_name("brave_search"));
        assert!(!is_valid_server_name(""));
    }

    #[test]
    fn test_build_catalog() {
        let catalog = build_catalog(&groups());
        assert_eq!(catalog.len(), 3);

        let names: Vec<_> = catalog.iter().map(|c| c.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["filesystem_read_file", "filesystem_list_directory", "git_git_status"]
        );
        assert_eq!(catalog[2].description, "[git] Get git repository status");
        assert_eq!(catalog[0].tool_name, "read_file");

        let tools = catalog_tools(&catalog);
        assert_eq!(tools[0].name, "filesystem_read_file");
        assert!(tools[0].description.starts_with("[filesystem] "));
    }

    #[test]
    fn test_describe_catalog() {
        assert_eq!(describe_catalog(&[]), NO_TOOLS_NOTICE);

        let text = describe_catalog(&build_catalog(&groups()));
        assert!(text.contains("- filesystem_read_file: [filesystem] Read the contents of a file"));
        assert_eq!(text.lines().count(), 3);
    }
}
