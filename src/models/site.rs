use serde::{Deserialize, Serialize};

/// The public site the service runs under. Used to build absolute links in
/// outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub domain: String,
    pub name: String,
}

impl Site {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "http://{}/{}",
            self.domain.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
