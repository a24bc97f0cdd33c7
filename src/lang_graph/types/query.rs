use std::fmt;

use serde::{Deserialize, Serialize};

/// Category a customer question is classified into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Informational,
    Eligibility,
    Rate,
    Document,
    Unsupported,
    /// Anything else the classifier said; handled like `Unsupported`.
    Unrecognized(String),
}

impl Intent {
    /// Interprets classifier output after trimming and lower-casing it.
    pub fn parse(raw: &str) -> Self {
        let label = raw.trim().to_lowercase();
        match label.as_str() {
            "informational" => Intent::Informational,
            "eligibility" => Intent::Eligibility,
            "rate" => Intent::Rate,
            "document" => Intent::Document,
            "unsupported" => Intent::Unsupported,
            _ => Intent::Unrecognized(label),
        }
    }

    /// Whether questions of this kind are answered from policy documents.
    pub fn requires_retrieval(&self) -> bool {
        matches!(
            self,
            Intent::Informational | Intent::Eligibility | Intent::Rate | Intent::Document
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Intent::Informational => "informational",
            Intent::Eligibility => "eligibility",
            Intent::Rate => "rate",
            Intent::Document => "document",
            Intent::Unsupported => "unsupported",
            Intent::Unrecognized(label) => label,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
