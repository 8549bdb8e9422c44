//! Tool registry: the closed set of tool names and their contract versions.
//!
//! A tool's version changes only when its input or output contract changes.

use std::fmt;

use serde::Serialize;

/// Every tool this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ServerInfo,
    GetSettings,
    ListInventory,
    AdjustInventory,
    TriggerEtl,
}

/// Whether a tool only reads or also mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Read,
    Write,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::ServerInfo,
        ToolName::GetSettings,
        ToolName::ListInventory,
        ToolName::AdjustInventory,
        ToolName::TriggerEtl,
    ];

    /// Wire name, identical to the MCP tool name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ServerInfo => "server_info",
            ToolName::GetSettings => "get_settings",
            ToolName::ListInventory => "list_inventory",
            ToolName::AdjustInventory => "adjust_inventory",
            ToolName::TriggerEtl => "trigger_etl",
        }
    }

    /// Contract version reported as `toolVersion`.
    pub fn version(&self) -> &'static str {
        match self {
            ToolName::ServerInfo => "v1",
            ToolName::GetSettings => "v1",
            ToolName::ListInventory => "v1",
            ToolName::AdjustInventory => "v1",
            ToolName::TriggerEtl => "v1",
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolName::AdjustInventory | ToolName::TriggerEtl => ToolKind::Write,
            ToolName::ServerInfo | ToolName::GetSettings | ToolName::ListInventory => {
                ToolKind::Read
            }
        }
    }

    pub fn is_write(&self) -> bool {
        self.kind() == ToolKind::Write
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serialization() {
        for tool in ToolName::ALL {
            assert_eq!(
                serde_json::to_value(tool).unwrap(),
                serde_json::json!(tool.as_str())
            );
        }
        let mut names: Vec<_> = ToolName::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ToolName::ALL.len());
    }

    #[test]
    fn versions_look_like_vn() {
        for tool in ToolName::ALL {
            let v = tool.version();
            assert!(v.starts_with('v'), "{tool}: {v}");
            assert!(v[1..].parse::<u32>().is_ok(), "{tool}: {v}");
        }
    }

    #[test]
    fn write_tools_are_flagged() {
        let writes: Vec<_> = ToolName::ALL.into_iter().filter(|t| t.is_write()).collect();
        assert_eq!(writes, vec![ToolName::AdjustInventory, ToolName::TriggerEtl]);
    }

    #[test]
    fn serializes_as_wire_name() {
        assert_eq!(
            serde_json::to_value(ToolName::ListInventory).unwrap(),
            serde_json::json!("list_inventory")
        );
    }
}
