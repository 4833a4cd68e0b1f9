//! "Edit this page" links for GitHub and Bitbucket hosted repositories.
//!
//! Pure string derivation: nothing here touches the network.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use repodocs_shared::{RepoDocsError, Result, UnsupportedProviderError};

/// Hosting services with a known edit URL layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Bitbucket,
}

impl Provider {
    /// Classify a host by substring.
    pub fn from_host(host: &str) -> std::result::Result<Self, UnsupportedProviderError> {
        if host.contains("github.com") {
            Ok(Self::GitHub)
        } else if host.contains("bitbucket.org") {
            Ok(Self::Bitbucket)
        } else {
            Err(UnsupportedProviderError {
                host: host.to_string(),
            })
        }
    }
}

/// Host and `org/repo` parsed out of a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub host: String,
    pub organization: String,
    pub repository: String,
}

impl RemoteLocation {
    /// Parse an HTTPS (`https://host/org/repo.git`) or SSH
    /// (`user@host:org/repo.git`) remote.
    pub fn parse(remote: &str) -> Result<Self> {
        let malformed = || RepoDocsError::MalformedRemote {
            url: remote.to_string(),
        };

        let (host, path) = if remote.contains("https") {
            let url = Url::parse(remote).map_err(|_| malformed())?;
            let host = url.host_str().ok_or_else(malformed)?.to_string();
            (host, url.path().to_string())
        } else {
            static SSH_RE: LazyLock<Regex> = LazyLock::new(|| {
                Regex::new(r"^(?:ssh://)?(?:[^@/]+@)?(?P<host>[^:/]+)[:/](?P<path>.+)$")
                    .expect("valid regex")
            });
            let caps = SSH_RE.captures(remote.trim()).ok_or_else(malformed)?;
            (caps["host"].to_string(), caps["path"].to_string())
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let organization = segments.next().ok_or_else(malformed)?.to_string();
        let repository = segments.next().ok_or_else(malformed)?;
        let repository = repository
            .strip_suffix(".git")
            .unwrap_or(repository)
            .to_string();

        if repository.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            host,
            organization,
            repository,
        })
    }
}

/// Derive the edit URL of `relative_path` at `version` in the repository
/// behind `remote`.
pub fn edit_url(remote: &str, version: &str, relative_path: &str) -> Result<String> {
    let location = RemoteLocation::parse(remote)?;
    let provider = Provider::from_host(&location.host)?;

    let RemoteLocation {
        host,
        organization: org,
        repository: repo,
    } = location;
    let path = relative_path.trim_start_matches('/');

    Ok(match provider {
        Provider::GitHub => format!("https://{host}/{org}/{repo}/edit/{version}/{path}"),
        Provider::Bitbucket => format!(
            "https://{host}/{org}/{repo}/src/{version}/{path}\
             ?mode=edit&spa=0&at={version}&fileviewer=file-view-default"
        ),
    })
}
