use serde::{Deserialize, Serialize};

/// A group that can receive votes, owned by the campaign administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    /// Code the voter types on the handset, e.g. "013".
    pub code: String,
    #[serde(rename = "active", alias = "is_active")]
    pub is_active: bool,
}

impl Candidate {
    pub fn new(id: u64, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            code: code.into(),
            is_active: true,
        }
    }
}
