//! End-to-end build: config → per-repository collect/compile/assemble →
//! published pages → search index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use repodocs_search::{IndexBuilder, IndexManifest};
use repodocs_shared::{Page, RepoDocsError, RepositoryDescriptor, Result, SiteConfig};
use repodocs_sources::{collect_sources, remove_dir_if_exists, resolve_all};

use crate::assembler::{AssembleContext, assemble, publish_pages};
use crate::compiler::{CompileRequest, FragmentCompiler, check_output, read_fragments};

/// Options that narrow a build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Only build these repositories; empty means all.
    pub only: Vec<String>,
}

/// What happened to one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoStatus {
    /// Pages were assembled and published.
    Published { pages: usize, indexable: usize },
    /// No documentation sources matched; nothing was compiled.
    Skipped,
    /// Processing stopped with an error; other repositories are unaffected.
    Failed { error: String },
}

/// Outcome of one repository's build.
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    pub name: String,
    pub status: RepoStatus,
    pub elapsed: Duration,
}

/// Result of [`build_site`].
#[derive(Debug)]
pub struct BuildReport {
    /// One outcome per repository, in configured order.
    pub repos: Vec<RepoOutcome>,
    /// Search index manifest, unless indexing is disabled.
    pub search: Option<IndexManifest>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn failures(&self) -> impl Iterator<Item = &RepoOutcome> {
        self.repos
            .iter()
            .filter(|r| matches!(r.status, RepoStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a repository starts processing.
    fn repo_started(&self, name: &str);
    /// Called when a repository finishes, successfully or not.
    fn repo_finished(&self, outcome: &RepoOutcome);
    /// Called when the build completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn repo_started(&self, _name: &str) {}
    fn repo_finished(&self, _outcome: &RepoOutcome) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Run the full build.
///
/// 1. Resolve and validate every repository descriptor (fatal on error)
/// 2. Process repositories concurrently, bounded by `site.concurrency`
/// 3. Collect outcomes in configured order
/// 4. Build the search index over all indexable pages, in that same order
#[instrument(skip_all, fields(repos = config.docs_repos.len()))]
pub async fn build_site(
    config: &SiteConfig,
    compiler: Arc<dyn FragmentCompiler>,
    options: &BuildOptions,
    progress: Arc<dyn ProgressReporter>,
) -> Result<BuildReport> {
    let start = Instant::now();

    // --- Phase 1: Resolve descriptors ---
    progress.phase("Resolving repositories");
    config.validate()?;
    let descriptors = select(resolve_all(config)?, &options.only)?;

    info!(repos = descriptors.len(), "starting build");

    // --- Phase 2: Per-repository processing ---
    progress.phase("Building repositories");
    let semaphore = Arc::new(Semaphore::new(config.site.concurrency.max(1)));
    let config = Arc::new(config.clone());

    let handles: Vec<_> = descriptors
        .into_iter()
        .map(|descriptor| {
            let name = descriptor.name.clone();
            let job = RepoJob {
                descriptor,
                config: Arc::clone(&config),
                compiler: Arc::clone(&compiler),
            };
            let semaphore = Arc::clone(&semaphore);
            let progress = Arc::clone(&progress);

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                progress.repo_started(&job.descriptor.name);
                let started = Instant::now();
                let result = job.run().await;
                (result, started.elapsed())
            });
            (name, handle)
        })
        .collect();

    // --- Phase 3: Gather in configured order ---
    let mut outcomes = Vec::with_capacity(handles.len());
    let mut published: Vec<Vec<Page>> = Vec::new();

    for (name, handle) in handles {
        let (status, elapsed) = match handle.await {
            Ok((Ok(Some(pages)), elapsed)) => {
                let status = RepoStatus::Published {
                    pages: pages.len(),
                    indexable: pages.iter().filter(|p| p.indexed_page).count(),
                };
                published.push(pages);
                (status, elapsed)
            }
            Ok((Ok(None), elapsed)) => (RepoStatus::Skipped, elapsed),
            Ok((Err(e), elapsed)) => {
                warn!(repo = %name, error = %e, "repository failed");
                (RepoStatus::Failed { error: e.to_string() }, elapsed)
            }
            Err(e) => {
                warn!(repo = %name, error = %e, "repository task aborted");
                (
                    RepoStatus::Failed {
                        error: format!("task aborted: {e}"),
                    },
                    Duration::ZERO,
                )
            }
        };

        let outcome = RepoOutcome {
            name,
            status,
            elapsed,
        };
        progress.repo_finished(&outcome);
        outcomes.push(outcome);
    }

    // --- Phase 4: Search index ---
    let search = if config.site.skip_search_index {
        info!("search index disabled");
        None
    } else {
        progress.phase("Writing search index");
        let mut builder = IndexBuilder::new();
        for page in published.iter().flatten() {
            builder.add_page(page);
        }
        let manifest = repodocs_search::write_index(
            &config.search_dir(),
            builder.finish(),
            config.site.search_index_shards,
        )?;
        Some(manifest)
    };

    let report = BuildReport {
        repos: outcomes,
        search,
        elapsed: start.elapsed(),
    };

    progress.done(&report);

    info!(
        repos = report.repos.len(),
        failed = report.failures().count(),
        elapsed_ms = report.elapsed.as_millis(),
        "build complete"
    );

    Ok(report)
}

/// Keep only the named repositories, preserving configured order.
fn select(
    descriptors: Vec<RepositoryDescriptor>,
    only: &[String],
) -> Result<Vec<RepositoryDescriptor>> {
    if only.is_empty() {
        return Ok(descriptors);
    }

    if let Some(unknown) = only
        .iter()
        .find(|name| !descriptors.iter().any(|d| &d.name == *name))
    {
        return Err(RepoDocsError::config(format!(
            "repository '{unknown}' is not listed in docs_repos"
        )));
    }

    Ok(descriptors
        .into_iter()
        .filter(|d| only.contains(&d.name))
        .collect())
}

// ---------------------------------------------------------------------------
// Per-repository job
// ---------------------------------------------------------------------------

/// Everything one repository's processing needs, owned so it can move into
/// a spawned task.
struct RepoJob {
    descriptor: RepositoryDescriptor,
    config: Arc<SiteConfig>,
    compiler: Arc<dyn FragmentCompiler>,
}

impl RepoJob {
    fn staging_dir(&self) -> PathBuf {
        self.config
            .site
            .staging_root
            .join("repos")
            .join(&self.descriptor.name)
    }

    fn build_dir(&self) -> PathBuf {
        self.config.site.build_root.join(&self.descriptor.name)
    }

    fn publish_dir(&self) -> PathBuf {
        self.config.site.output_dir.join(&self.descriptor.name)
    }

    /// Collect → compile → assemble → publish. `None` when the repository
    /// has no documentation sources.
    #[instrument(skip_all, fields(repo = %self.descriptor.name))]
    async fn run(&self) -> Result<Option<Vec<Page>>> {
        let descriptor = &self.descriptor;
        let compiler_cfg = &self.config.compiler;

        if !descriptor.checkout.is_dir() {
            return Err(RepoDocsError::validation(format!(
                "checkout not found at {}",
                descriptor.checkout.display()
            )));
        }

        // Stale output from earlier builds must never leak into this one.
        let build_dir = self.build_dir();
        let publish_dir = self.publish_dir();
        remove_dir_if_exists(&build_dir)?;
        remove_dir_if_exists(&publish_dir)?;

        let staged = collect_sources(
            &descriptor.sources_root(),
            &self.staging_dir(),
            &compiler_cfg.source_extension,
        )?;

        if staged.is_empty() {
            info!("no documentation sources, skipping");
            return Ok(None);
        }

        let request = CompileRequest {
            repo: descriptor.name.clone(),
            staged_dir: self.staging_dir(),
            output_dir: build_dir.clone(),
        };
        self.compiler.compile(&request).await?;

        let fragments = read_fragments(&build_dir, &compiler_cfg.fragment_extension)?;
        check_output(
            &descriptor.name,
            &staged,
            &fragments,
            compiler_cfg.require_all_fragments,
        )?;

        let ctx = AssembleContext {
            descriptor,
            staged: &staged,
            base_url: &self.config.site.base_url,
        };
        let pages = assemble(&ctx, fragments)?;
        publish_pages(&publish_dir, &pages)?;

        Ok(Some(pages))
    }
}
