//! Common types used across the service

use serde::{Deserialize, Serialize};

/// Label clients send when no specific branch is selected
pub const ALL_BRANCHES: &str = "All Branches";

/// Branch dimension that partitions data visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum BranchScope {
    #[default]
    All,
    Branch(String),
}

impl BranchScope {
    /// Parse the raw branch selection a client sends.
    /// Empty strings, "all" and "All Branches" mean no specific branch.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("all")
            || trimmed.eq_ignore_ascii_case(ALL_BRANCHES)
        {
            BranchScope::All
        } else {
            BranchScope::Branch(trimmed.to_string())
        }
    }

    /// The branch code, if a specific branch is selected
    pub fn code(&self) -> Option<&str> {
        match self {
            BranchScope::All => None,
            BranchScope::Branch(code) => Some(code.as_str()),
        }
    }

    /// Whether a document owned by `branch` is visible in this scope
    pub fn includes(&self, branch: &str) -> bool {
        match self {
            BranchScope::All => true,
            BranchScope::Branch(code) => code == branch,
        }
    }
}

/// Request-scoped context: who is acting and for which branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequestScope {
    pub branch: BranchScope,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl RequestScope {
    pub fn for_branch(code: impl Into<String>) -> Self {
        Self {
            branch: BranchScope::Branch(code.into()),
            username: None,
            email: None,
        }
    }

    pub fn all_branches() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl Pagination {
    /// Number of items to skip
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }

    /// Slice an already-filtered list into one page
    pub fn paginate<T: Clone>(&self, items: &[T]) -> PaginatedResponse<T> {
        let total_items = items.len() as u64;
        let per_page = self.per_page.max(1);
        let total_pages = ((total_items + per_page as u64 - 1) / per_page as u64) as u32;
        let data = items
            .iter()
            .skip(self.offset())
            .take(per_page as usize)
            .cloned()
            .collect();

        PaginatedResponse {
            data,
            pagination: PaginationMeta {
                page: self.page.max(1),
                per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}
