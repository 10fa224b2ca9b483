//! Image reference parsing
//!
//! Decomposes user input such as `nginx`, `library/nginx:1.25` or
//! `myhost:5000/ns/app@sha256:...` into the registry, repository, image,
//! tag and digest used to address the distribution API.

use crate::error::{PullerError, Result};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";
pub const DEFAULT_REPOSITORY: &str = "library";
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    /// Namespace path between the registry and the image name, possibly empty
    /// for single-segment names on an explicit registry
    pub repository: String,
    pub image: String,
    /// Always present; used for labeling even when a digest is fetched
    pub tag: String,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<Self> {
        let original = input;
        let input = input.trim();
        if input.is_empty() {
            return Err(PullerError::reference(original, "reference is empty"));
        }

        let (name, digest) = match input.split_once('@') {
            Some((_, "")) => {
                return Err(PullerError::reference(original, "digest is empty"));
            }
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (input, None),
        };

        // A colon only separates a tag when it follows the last slash;
        // earlier colons belong to a registry port.
        let last_slash = name.rfind('/');
        let (name, tag) = match name.rfind(':') {
            Some(pos) if last_slash.is_none_or(|slash| pos > slash) => {
                let tag = &name[pos + 1..];
                if tag.is_empty() {
                    return Err(PullerError::reference(original, "tag is empty"));
                }
                (&name[..pos], tag)
            }
            _ => (name, DEFAULT_TAG),
        };

        let segments: Vec<&str> = name.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(PullerError::reference(
                original,
                "name contains an empty path segment",
            ));
        }

        let Some((image, parents)) = segments.split_last() else {
            return Err(PullerError::reference(original, "image name is missing"));
        };

        let (registry, repository) = match parents {
            [] => (DEFAULT_REGISTRY.to_string(), DEFAULT_REPOSITORY.to_string()),
            [first, rest @ ..] if is_registry_host(first) => (first.to_string(), rest.join("/")),
            _ => (DEFAULT_REGISTRY.to_string(), parents.join("/")),
        };

        Ok(Self {
            registry,
            repository,
            image: image.to_string(),
            tag: tag.to_string(),
            digest,
        })
    }

    /// The manifest reference to fetch: the digest when pinned, else the tag
    pub fn reference(&self) -> &str {
        self.digest.as_deref().unwrap_or(&self.tag)
    }

    /// `<repository>/<image>`, the name component of distribution API paths
    pub fn repository_path(&self) -> String {
        if self.repository.is_empty() {
            self.image.clone()
        } else {
            format!("{}/{}", self.repository, self.image)
        }
    }

    /// Token scope for an anonymous pull of this image
    pub fn pull_scope(&self) -> String {
        format!("repository:{}:pull", self.repository_path())
    }

    /// Tag recorded in the legacy manifest's `RepoTags`
    pub fn repo_tag(&self) -> String {
        format!("{}:{}", self.repository_path(), self.tag)
    }

    /// Output archive name, `<repository-with-slashes-replaced>_<image>_<tag>.tar`
    pub fn archive_file_name(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.repository.is_empty() {
            parts.push(self.repository.replace('/', "_"));
        }
        parts.push(self.image.clone());
        parts.push(self.tag.clone());
        format!("{}.tar", parts.join("_"))
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':')
}

impl FromStr for ImageReference {
    type Err = PullerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository_path(), self.tag)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
