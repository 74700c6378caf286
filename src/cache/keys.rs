//! Cache key definitions.

use std::fmt;

/// Who a page was rendered for. Pages differ per viewer (navigation links,
/// follow buttons), so the viewer is part of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerKey {
    Anonymous,
    User(i64),
}

impl ViewerKey {
    pub fn from_user_id(user_id: Option<i64>) -> Self {
        match user_id {
            Some(id) => Self::User(id),
            None => Self::Anonymous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query: String,
    pub viewer: ViewerKey,
}

impl ResponseKey {
    pub fn new(path: impl Into<String>, query: Option<&str>, viewer: ViewerKey) -> Self {
        Self {
            path: path.into(),
            query: query.unwrap_or_default().to_string(),
            viewer,
        }
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        match self.viewer {
            ViewerKey::Anonymous => f.write_str(" [anonymous]"),
            ViewerKey::User(id) => write!(f, " [user {id}]"),
        }
    }
}
