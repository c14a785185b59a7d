use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trade {
    Demolition,
    Plumbing,
    Carpentry,
    Tiling,
    Painting,
}

/// Static dependency metadata for one catalog task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskNode {
    pub key: &'static str,
    pub requires: &'static [&'static str],
    pub produces: &'static [&'static str],
    pub trade: Trade,
    /// Relative difficulty, `1.0` for a typical task.
    pub complexity_weight: f64,
}

#[cfg(test)]
mod tests {
    use super::TaskId;

    #[test]
    fn task_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&TaskId::from("tiling_floor")).expect("serialize");
        assert_eq!(json, "\"tiling_floor\"");
    }
}
