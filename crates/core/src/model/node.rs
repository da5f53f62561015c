use serde::{Deserialize, Serialize};
use wasmprof_protocol::ProfileNode;

/// One call-graph node of a sampling profile.
///
/// Ids are unique within one profiling session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNode {
    pub id: u64,
    /// May be empty for anonymous functions.
    pub function_name: String,
    pub url: Option<String>,
}

impl CallNode {
    pub fn new(id: u64, function_name: impl Into<String>) -> Self {
        Self {
            id,
            function_name: function_name.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Function name for display, `(anonymous)` when empty.
    pub fn display_name(&self) -> &str {
        if self.function_name.is_empty() {
            "(anonymous)"
        } else {
            &self.function_name
        }
    }

    /// Last path segment of the source URL, if there is a non-empty one.
    pub fn source_label(&self) -> Option<&str> {
        self.url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|last| !last.is_empty())
    }
}

impl From<ProfileNode> for CallNode {
    fn from(node: ProfileNode) -> Self {
        Self {
            id: node.id,
            function_name: node.call_frame.function_name,
            url: node.call_frame.url.filter(|url| !url.is_empty()),
        }
    }
}
