use std::path::{Path, PathBuf};

/// Configuration for a ChatFs instance.
#[derive(Debug, Clone)]
pub struct ChatFsConfig {
    /// Sandbox boundary: every virtual path resolves under this directory.
    pub mount_root: PathBuf,
    /// Where the attributes artifact is persisted.
    pub attrs_path: PathBuf,
    /// Where the content artifact is persisted.
    pub content_path: PathBuf,
    /// Attributes artifact for the custom mount.
    pub custom_attrs_path: PathBuf,
    /// Content artifact for the custom mount.
    pub custom_content_path: PathBuf,
    /// Name of the derived grouping index directory under the mount root.
    pub group_dest_name: String,
    /// Depth guard for recursive walks and tree rendering.
    pub max_walk_depth: usize,
}

impl ChatFsConfig {
    /// Create a config builder for the given mount root. Snapshot artifacts
    /// default to siblings of the root (`<root>.attrs.json` / `<root>.data.json`).
    pub fn builder(mount_root: impl AsRef<Path>) -> ChatFsConfigBuilder {
        let root = mount_root.as_ref().to_path_buf();
        let sibling = |suffix: &str| {
            let mut name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "mount".to_string());
            name.push_str(suffix);
            root.parent().unwrap_or(Path::new(".")).join(name)
        };
        ChatFsConfigBuilder {
            attrs_path: sibling(".attrs.json"),
            content_path: sibling(".data.json"),
            custom_attrs_path: sibling(".custom.attrs.json"),
            custom_content_path: sibling(".custom.data.json"),
            mount_root: root,
            group_dest_name: "grouped_mp3".to_string(),
            max_walk_depth: 64,
        }
    }
}

/// Builder for [`ChatFsConfig`].
#[derive(Debug, Clone)]
pub struct ChatFsConfigBuilder {
    mount_root: PathBuf,
    attrs_path: PathBuf,
    content_path: PathBuf,
    custom_attrs_path: PathBuf,
    custom_content_path: PathBuf,
    group_dest_name: String,
    max_walk_depth: usize,
}

impl ChatFsConfigBuilder {
    pub fn attrs_path(mut self, path: impl AsRef<Path>) -> Self {
        self.attrs_path = path.as_ref().to_path_buf();
        self
    }

    pub fn content_path(mut self, path: impl AsRef<Path>) -> Self {
        self.content_path = path.as_ref().to_path_buf();
        self
    }

    pub fn custom_attrs_path(mut self, path: impl AsRef<Path>) -> Self {
        self.custom_attrs_path = path.as_ref().to_path_buf();
        self
    }

    pub fn custom_content_path(mut self, path: impl AsRef<Path>) -> Self {
        self.custom_content_path = path.as_ref().to_path_buf();
        self
    }

    pub fn group_dest_name(mut self, name: impl Into<String>) -> Self {
        self.group_dest_name = name.into();
        self
    }

    pub fn max_walk_depth(mut self, depth: usize) -> Self {
        self.max_walk_depth = depth.max(1);
        self
    }

    pub fn build(self) -> ChatFsConfig {
        ChatFsConfig {
            mount_root: self.mount_root,
            attrs_path: self.attrs_path,
            content_path: self.content_path,
            custom_attrs_path: self.custom_attrs_path,
            custom_content_path: self.custom_content_path,
            group_dest_name: self.group_dest_name,
            max_walk_depth: self.max_walk_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = ChatFsConfig::builder("/srv/mnt").build();
        assert_eq!(cfg.mount_root, PathBuf::from("/srv/mnt"));
        assert_eq!(cfg.attrs_path, PathBuf::from("/srv/mnt.attrs.json"));
        assert_eq!(cfg.content_path, PathBuf::from("/srv/mnt.data.json"));
        assert_eq!(cfg.group_dest_name, "grouped_mp3");
        assert_eq!(cfg.max_walk_depth, 64);
    }

    #[test]
    fn overrides() {
        let cfg = ChatFsConfig::builder("/srv/mnt")
            .attrs_path("/var/lib/chatfs/attrs.json")
            .group_dest_name("by_tag")
            .max_walk_depth(0)
            .build();
        assert_eq!(cfg.attrs_path, PathBuf::from("/var/lib/chatfs/attrs.json"));
        assert_eq!(cfg.group_dest_name, "by_tag");
        // depth guard never drops below one level
        assert_eq!(cfg.max_walk_depth, 1);
    }
}
