//! Repository descriptor resolution.
//!
//! A descriptor is layered: built-in defaults, then the optional
//! `rosindex.yml` inside the checkout, then the site's remote registry.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use repodocs_shared::{
    DEFAULT_INDEX_PATTERNS, DEFAULT_SOURCES_DIR, DocsRepoEntry, IndexPatterns, RepoDocsError,
    RepositoryDescriptor, Result, SiteConfig,
};

/// Metadata file looked up at the checkout root.
pub const METADATA_FILE: &str = "rosindex.yml";

/// Contents of a repository's metadata file. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoMetadata {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub sources_dir: Option<String>,
    #[serde(default)]
    pub index_pattern: Option<PatternList>,
}

/// `index_pattern` accepts a single pattern or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl PatternList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(p) => vec![p],
            Self::Many(ps) => ps,
        }
    }
}

/// Read the metadata file of a checkout. A missing or empty file yields
/// empty metadata.
pub fn load_metadata(checkout: &Path) -> Result<RepoMetadata> {
    let path = checkout.join(METADATA_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no metadata file, using defaults");
            return Ok(RepoMetadata::default());
        }
        Err(e) => return Err(RepoDocsError::io(&path, e)),
    };

    if content.trim().is_empty() {
        return Ok(RepoMetadata::default());
    }

    let parsed: Option<RepoMetadata> = serde_yaml::from_str(&content)
        .map_err(|e| RepoDocsError::parse(format!("{}: {e}", path.display())))?;
    Ok(parsed.unwrap_or_default())
}

/// Resolve one configured repository into a validated descriptor.
#[instrument(skip_all, fields(repo = %entry.name))]
pub fn resolve_descriptor(config: &SiteConfig, entry: &DocsRepoEntry) -> Result<RepositoryDescriptor> {
    let remote = config.remote_repos.get(&entry.name).cloned().unwrap_or_default();

    let checkout = remote
        .path
        .clone()
        .unwrap_or_else(|| config.site.checkout_root.join(&entry.name));

    let metadata = load_metadata(&checkout)?;

    let url = remote.url.or(metadata.url).ok_or_else(|| {
        RepoDocsError::config(format!("repository '{}' has no url", entry.name))
    })?;
    let version = remote.version.or(metadata.version).ok_or_else(|| {
        RepoDocsError::config(format!("repository '{}' has no version", entry.name))
    })?;

    let patterns = metadata
        .index_pattern
        .map(PatternList::into_vec)
        .unwrap_or_else(|| DEFAULT_INDEX_PATTERNS.iter().map(|p| p.to_string()).collect());

    Ok(RepositoryDescriptor {
        name: entry.name.clone(),
        url,
        version,
        sources_dir: metadata
            .sources_dir
            .unwrap_or_else(|| DEFAULT_SOURCES_DIR.to_string()),
        index_patterns: IndexPatterns::new(patterns)?,
        description: entry.description.clone(),
        checkout,
    })
}

/// Resolve every configured repository, in configured order.
///
/// Fails on the first invalid descriptor so malformed patterns stop the
/// build before any repository is touched.
pub fn resolve_all(config: &SiteConfig) -> Result<Vec<RepositoryDescriptor>> {
    config
        .docs_repos
        .iter()
        .map(|entry| resolve_descriptor(config, entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodocs_shared::RemoteRepoEntry;

    fn config_for(checkout_root: &Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.site.checkout_root = checkout_root.to_path_buf();
        config.docs_repos.push(DocsRepoEntry {
            name: "widgets".into(),
            description: Some("Widget toolkit".into()),
        });
        config
    }

    #[test]
    fn missing_metadata_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let meta = load_metadata(tmp.path()).unwrap();
        assert!(meta.url.is_none());
        assert!(meta.index_pattern.is_none());
    }

    #[test]
    fn empty_metadata_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(METADATA_FILE), "").unwrap();
        let meta = load_metadata(tmp.path()).unwrap();
        assert!(meta.version.is_none());
    }

    #[test]
    fn metadata_supplies_defaults_registry_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let checkout = tmp.path().join("widgets");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(
            checkout.join(METADATA_FILE),
            "url: git@github.com:old/widgets.git\nversion: v1\nsources_dir: docs\nindex_pattern: ['api/*.rst', '*.rst']\nunrelated: 3\n",
        )
        .unwrap();

        let mut config = config_for(tmp.path());
        config.remote_repos.insert(
            "widgets".into(),
            RemoteRepoEntry {
                url: Some("https://github.com/acme/widgets.git".into()),
                version: None,
                path: None,
            },
        );

        let desc = resolve_descriptor(&config, &config.docs_repos[0]).unwrap();
        assert_eq!(desc.url, "https://github.com/acme/widgets.git");
        assert_eq!(desc.version, "v1");
        assert_eq!(desc.sources_dir, "docs");
        assert_eq!(desc.index_patterns.as_slice(), ["api/*.rst", "*.rst"]);
        assert_eq!(desc.sources_root(), checkout.join("docs"));
        assert_eq!(desc.description.as_deref(), Some("Widget toolkit"));
    }

    #[test]
    fn single_pattern_string_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let checkout = tmp.path().join("widgets");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(
            checkout.join(METADATA_FILE),
            "url: https://github.com/acme/widgets\nversion: main\nindex_pattern: 'guide/**'\n",
        )
        .unwrap();

        let config = config_for(tmp.path());
        let desc = resolve_descriptor(&config, &config.docs_repos[0]).unwrap();
        assert_eq!(desc.index_patterns.as_slice(), ["guide/**"]);
        assert_eq!(desc.sources_dir, DEFAULT_SOURCES_DIR);
    }

    #[test]
    fn defaults_without_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_for(tmp.path());
        config.remote_repos.insert(
            "widgets".into(),
            RemoteRepoEntry {
                url: Some("https://github.com/acme/widgets".into()),
                version: Some("main".into()),
                path: None,
            },
        );

        let all = resolve_all(&config).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].index_patterns.as_slice(), DEFAULT_INDEX_PATTERNS);
    }

    #[test]
    fn missing_url_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path());
        let err = resolve_all(&config).unwrap_err();
        assert!(err.to_string().contains("has no url"));
    }

    #[test]
    fn malformed_pattern_fails_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let checkout = tmp.path().join("widgets");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(
            checkout.join(METADATA_FILE),
            "url: https://github.com/acme/widgets\nversion: main\nindex_pattern: ['{unclosed']\n",
        )
        .unwrap();

        let config = config_for(tmp.path());
        let err = resolve_all(&config).unwrap_err();
        assert!(matches!(err, RepoDocsError::InvalidPattern { .. }));
    }
}
