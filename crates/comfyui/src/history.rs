//! Typed view of the `/history/{prompt_id}` response.
//!
//! Once a prompt finishes, ComfyUI reports its outputs per node:
//!
//! ```json
//! { "<prompt_id>": { "outputs": { "131": { "gifs": [
//!     { "filename": "talk_00001.mp4", "subfolder": "", "type": "output" }
//! ] } } } }
//! ```
//!
//! Each node maps result kinds (`images`, `gifs`, `audio`, `text`, ...)
//! to a list of items. File results are [`OutputDescriptor`]s; text
//! results are bare strings.

use indexmap::IndexMap;
use serde::Deserialize;

/// A file the engine wrote into its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage area reported by the engine (`output`, `temp`).
    #[serde(default, rename = "type")]
    pub folder_type: Option<String>,
}

/// A single result item taken from a node's output list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    File(OutputDescriptor),
    Text(String),
}

/// Which shape of result a job is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    File,
    Text,
}

/// One prompt's entry in the history response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Output nodes in the order the engine reported them.
    #[serde(default)]
    pub outputs: IndexMap<String, serde_json::Map<String, serde_json::Value>>,
}

/// Extract the entry for `prompt_id` from a raw history body.
///
/// Returns `Ok(None)` while the prompt is not in history yet, and
/// `Err` when the entry is present but malformed.
pub fn entry_for(
    history: &serde_json::Value,
    prompt_id: &str,
) -> Result<Option<HistoryEntry>, serde_json::Error> {
    match history.get(prompt_id) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(raw) => HistoryEntry::deserialize(raw).map(Some),
    }
}

/// Picks the result of interest out of a finished prompt's outputs.
///
/// The primary node is checked first, trying every key in order. When
/// it has nothing usable (or none is configured) and `scan_all` is set,
/// the remaining output nodes are scanned in the order history reports
/// them. Within a list, the first item wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSelector {
    pub primary_node: Option<String>,
    /// Result keys to try, in priority order. Some node types report
    /// under a generic key (`gifs` for an mp4, `caption` for text).
    pub keys: Vec<String>,
    pub scan_all: bool,
    pub kind: OutputKind,
}

impl OutputSelector {
    /// Select from one specific node only.
    pub fn node(node_id: impl Into<String>, keys: &[&str], kind: OutputKind) -> Self {
        Self {
            primary_node: Some(node_id.into()),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            scan_all: false,
            kind,
        }
    }

    /// Select from whichever output node first reports one of `keys`.
    pub fn any_node(keys: &[&str], kind: OutputKind) -> Self {
        Self {
            primary_node: None,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            scan_all: true,
            kind,
        }
    }

    /// Check `node_id` first when one is configured, then every other
    /// node. Without one this is [`any_node`](Self::any_node).
    pub fn preferring(node_id: Option<&str>, keys: &[&str], kind: OutputKind) -> Self {
        match node_id {
            Some(id) => Self::node(id, keys, kind).with_scan_all(),
            None => Self::any_node(keys, kind),
        }
    }

    /// Also scan every other node if the primary one has no result.
    pub fn with_scan_all(mut self) -> Self {
        self.scan_all = true;
        self
    }

    pub fn select(&self, entry: &HistoryEntry) -> Option<OutputItem> {
        if let Some(primary) = &self.primary_node {
            if let Some(item) = entry.outputs.get(primary).and_then(|o| self.first_item(o)) {
                return Some(item);
            }
            if !self.scan_all {
                return None;
            }
        }

        entry
            .outputs
            .iter()
            .filter(|(id, _)| self.primary_node.as_ref() != Some(*id))
            .find_map(|(_, output)| self.first_item(output))
    }

    fn first_item(&self, node_output: &serde_json::Map<String, serde_json::Value>) -> Option<OutputItem> {
        self.keys.iter().find_map(|key| {
            let first = node_output.get(key)?.as_array()?.first()?;
            parse_item(first, self.kind)
        })
    }
}

fn parse_item(value: &serde_json::Value, kind: OutputKind) -> Option<OutputItem> {
    match (kind, value) {
        (OutputKind::Text, serde_json::Value::String(s)) => Some(OutputItem::Text(s.clone())),
        (OutputKind::File, serde_json::Value::Object(_)) => {
            OutputDescriptor::deserialize(value).ok().map(OutputItem::File)
        }
        _ => None,
    }
}
