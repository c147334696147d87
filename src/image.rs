//! Container image reference helpers.

use std::fmt;

/// An image reference split into repository and tag.  Digests are dropped
/// because a retagged image must resolve by tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
}

impl ImageRef {
    /// Split `registry[:port]/path[:tag][@digest]`.  A colon only counts as a
    /// tag separator when it comes after the last `/`, so registry ports are
    /// kept in the repository.
    pub fn parse(image: &str) -> Self {
        let without_digest = image.split('@').next().unwrap_or(image);
        let last_slash = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);
        match without_digest[last_slash..].rfind(':') {
            Some(colon) => {
                let split = last_slash + colon;
                Self {
                    repository: without_digest[..split].to_string(),
                    tag: Some(without_digest[split + 1..].to_string()),
                }
            }
            None => Self {
                repository: without_digest.to_string(),
                tag: None,
            },
        }
    }

    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            repository: self.repository.clone(),
            tag: Some(tag.to_string()),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{tag}", self.repository),
            None => f.write_str(&self.repository),
        }
    }
}

/// Retag an image reference: `apply_image_tag("repo/cns:v0", "v1") == "repo/cns:v1"`.
pub fn apply_image_tag(image: &str, version: &str) -> String {
    ImageRef::parse(image).with_tag(version).to_string()
}
