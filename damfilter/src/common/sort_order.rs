use serde::{Deserialize, Serialize};

/// Direction of the result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Maps the `asc` flag of a filter call onto a direction.
    pub fn from_asc(asc: bool) -> SortOrder {
        if asc {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }

    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Ascending)
    }

    /// `1` or `-1`, as used by document-store sort stages.
    pub fn direction(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    /// `ASC` or `DESC`, as used by AQL `SORT`.
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}
