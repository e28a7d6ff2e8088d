use crate::error::ProxyError;

/// Exact-match allow-list for a single request path.
///
/// The comparison is literal: no normalization, no prefix matching, no case
/// folding, and percent-encoding is not decoded. `/api` and `/api/` differ.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    allowed: Option<String>,
}

impl PathFilter {
    pub fn new(allowed: Option<String>) -> Self {
        Self {
            allowed: allowed.filter(|path| !path.is_empty()),
        }
    }

    pub fn allowed(&self) -> Option<&str> {
        self.allowed.as_deref()
    }

    pub fn check(&self, path: &str) -> Result<(), ProxyError> {
        match &self.allowed {
            Some(allowed) if allowed != path => Err(ProxyError::Forbidden {
                path: path.to_string(),
                allowed: allowed.clone(),
            }),
            _ => Ok(()),
        }
    }
}
