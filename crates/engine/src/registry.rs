use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Where the bytes for a logical video id live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VideoSource {
    Local { path: PathBuf },
    ObjectStore { bucket: String, key: String },
    Remote { url: String },
}

/// Immutable map from logical id to source descriptor, populated from
/// configuration at startup.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, VideoSource>,
}

impl SourceRegistry {
    pub fn new(sources: HashMap<String, VideoSource>) -> Self {
        Self { sources }
    }

    pub fn get(&self, id: &str) -> Option<&VideoSource> {
        self.sources.get(id)
    }

    /// Configured ids in lexical order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_deserialize_from_tagged_toml() {
        let raw = r#"
            [trailer]
            type = "local"
            path = "/media/trailer.mp4"

            [feature]
            type = "object-store"
            bucket = "videos"
            key = "feature.mp4"

            [mirror]
            type = "remote"
            url = "https://origin.example.com/mirror.mp4"
        "#;

        let sources: HashMap<String, VideoSource> = toml::from_str(raw).unwrap();
        let registry = SourceRegistry::new(sources);

        assert_eq!(
            registry.get("trailer"),
            Some(&VideoSource::Local {
                path: PathBuf::from("/media/trailer.mp4")
            })
        );
        assert_eq!(
            registry.get("feature"),
            Some(&VideoSource::ObjectStore {
                bucket: "videos".into(),
                key: "feature.mp4".into()
            })
        );
        assert_eq!(
            registry.get("mirror"),
            Some(&VideoSource::Remote {
                url: "https://origin.example.com/mirror.mp4".into()
            })
        );
        assert_eq!(registry.ids(), vec!["feature", "mirror", "trailer"]);
    }

    #[test]
    fn unknown_id_resolves_to_none() {
        let registry = SourceRegistry::default();
        assert!(registry.get("nope").is_none());
        assert!(registry.is_empty());
    }
}
