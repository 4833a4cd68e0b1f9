//! External fragment compiler.
//!
//! The compiler turns a staged source tree into one JSON fragment per source
//! file. [`SubprocessCompiler`] runs it as a child process; tests plug in
//! their own [`FragmentCompiler`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use repodocs_shared::{CompilerSection, PageFragment, RepoDocsError, Result};
use repodocs_sources::{StagedFileMap, has_extension, to_slash};

/// Lines of compiler stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// One repository's compilation job.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub repo: String,
    /// Root of the staged sources.
    pub staged_dir: PathBuf,
    /// Where fragments must be written.
    pub output_dir: PathBuf,
}

/// Turns a staged source tree into fragment files.
#[async_trait]
pub trait FragmentCompiler: Send + Sync {
    /// Compile `request.staged_dir` into `request.output_dir`. Must only
    /// return `Ok` once all output is on disk.
    async fn compile(&self, request: &CompileRequest) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Subprocess compiler
// ---------------------------------------------------------------------------

/// Runs `program [args...] <staged_dir> <output_dir>`.
#[derive(Debug, Clone)]
pub struct SubprocessCompiler {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SubprocessCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

impl From<&CompilerSection> for SubprocessCompiler {
    fn from(section: &CompilerSection) -> Self {
        Self::new(section.program.clone(), section.args.clone(), section.timeout())
    }
}

#[async_trait]
impl FragmentCompiler for SubprocessCompiler {
    #[instrument(skip_all, fields(repo = %request.repo, program = %self.program))]
    async fn compile(&self, request: &CompileRequest) -> Result<()> {
        std::fs::create_dir_all(&request.output_dir)
            .map_err(|e| RepoDocsError::io(&request.output_dir, e))?;

        info!(staged = %request.staged_dir.display(), "running fragment compiler");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&request.staged_dir)
            .arg(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(RepoDocsError::compilation(
                    &request.repo,
                    format!("`{}` timed out after {:?}", self.program, self.timeout),
                ));
            }
            Ok(Err(e)) => {
                return Err(RepoDocsError::compilation(
                    &request.repo,
                    format!("failed to spawn `{}`: {e}", self.program),
                ));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(RepoDocsError::compilation(
                &request.repo,
                format!("`{}` exited with {}: {tail}", self.program, output.status),
            ));
        }

        debug!("fragment compiler finished");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reading output
// ---------------------------------------------------------------------------

/// A fragment read from the compiler's output tree.
#[derive(Debug, Clone)]
pub struct FragmentFile {
    /// Path relative to the output directory.
    pub relative: PathBuf,
    pub fragment: PageFragment,
}

impl FragmentFile {
    /// Relative path with the extension removed, shared with the staged
    /// source it came from.
    pub fn stem(&self) -> PathBuf {
        stem_key(&self.relative)
    }
}

/// Relative path without its extension.
pub fn stem_key(relative: &Path) -> PathBuf {
    relative.with_extension("")
}

/// Read every fragment under `output_dir`, in path order.
pub fn read_fragments(output_dir: &Path, extension: &str) -> Result<Vec<FragmentFile>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut fragments = Vec::new();
    for entry in WalkDir::new(output_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(output_dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            RepoDocsError::io(path, source)
        })?;

        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }

        let content = std::fs::read_to_string(entry.path())
            .map_err(|e| RepoDocsError::io(entry.path(), e))?;
        let fragment: PageFragment = serde_json::from_str(&content).map_err(|e| {
            RepoDocsError::parse(format!("invalid fragment {}: {e}", entry.path().display()))
        })?;

        let relative = entry
            .path()
            .strip_prefix(output_dir)
            .map_err(|e| RepoDocsError::validation(format!("{}: {e}", entry.path().display())))?
            .to_path_buf();

        fragments.push(FragmentFile { relative, fragment });
    }

    Ok(fragments)
}

/// Reject empty output, and output missing a fragment for some staged
/// source when `require_all` is set.
pub fn check_output(
    repo: &str,
    staged: &StagedFileMap,
    fragments: &[FragmentFile],
    require_all: bool,
) -> Result<()> {
    if fragments.is_empty() {
        return Err(RepoDocsError::compilation(repo, "compiler produced no fragments"));
    }

    let produced: HashSet<PathBuf> = fragments.iter().map(FragmentFile::stem).collect();
    let missing: Vec<String> = staged
        .iter()
        .filter_map(|(_, staged_path)| staged_path.strip_prefix(staged.staging_root()).ok())
        .filter(|rel| !produced.contains(&stem_key(rel)))
        .map(to_slash)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    if require_all {
        return Err(RepoDocsError::compilation(
            repo,
            format!("no fragment for {}", missing.join(", ")),
        ));
    }

    warn!(repo, missing = missing.len(), "some sources produced no fragment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn request(root: &Path) -> CompileRequest {
        CompileRequest {
            repo: "widgets".into(),
            staged_dir: root.join("staged"),
            output_dir: root.join("out"),
        }
    }

    #[cfg(unix)]
    fn sh(script: &str, timeout: Duration) -> SubprocessCompiler {
        SubprocessCompiler::new(
            "sh",
            vec!["-c".into(), script.into(), "sh".into()],
            timeout,
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_writes_output() {
        let tmp = tempfile::tempdir().unwrap();
        let req = request(tmp.path());
        std::fs::create_dir_all(&req.staged_dir).unwrap();

        let compiler = sh(
            r#"printf '{"current_page_name":"index","title":"Home","body":""}' > "$2/index.fjson""#,
            Duration::from_secs(10),
        );
        compiler.compile(&req).await.unwrap();

        let fragments = read_fragments(&req.output_dir, "fjson").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].fragment.title.as_deref(), Some("Home"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_compilation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = sh("echo 'bad directive' >&2; exit 3", Duration::from_secs(10));

        let err = compiler.compile(&request(tmp.path())).await.unwrap_err();
        match err {
            RepoDocsError::CompilationFailure { repo, reason } => {
                assert_eq!(repo, "widgets");
                assert!(reason.contains("bad directive"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_compiler_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = sh("sleep 5", Duration::from_millis(200));

        let err = compiler.compile(&request(tmp.path())).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn missing_program_is_compilation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let compiler = SubprocessCompiler::new(
            "repodocs-no-such-compiler",
            vec![],
            Duration::from_secs(1),
        );
        let err = compiler.compile(&request(tmp.path())).await.unwrap_err();
        assert!(matches!(err, RepoDocsError::CompilationFailure { .. }));
    }

    #[test]
    fn read_fragments_skips_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        write(&out.join("index.fjson"), r#"{"current_page_name":"index","body":"<p>x</p>"}"#);
        write(&out.join("guide/intro.fjson"), r#"{"current_page_name":"guide/intro"}"#);
        write(&out.join("searchindex.json"), "{}");

        let fragments = read_fragments(out, "fjson").unwrap();
        let stems: Vec<String> = fragments.iter().map(|f| to_slash(&f.stem())).collect();
        assert_eq!(stems, ["guide/intro", "index"]);
    }

    #[test]
    fn invalid_fragment_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("index.fjson"), "not json");
        let err = read_fragments(tmp.path(), "fjson").unwrap_err();
        assert!(matches!(err, RepoDocsError::Parse { .. }));
    }

    #[test]
    fn fragment_without_page_name_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("guide/intro.fjson"),
            r#"{"title":"Intro","body":"<p>x</p>"}"#,
        );
        let err = read_fragments(tmp.path(), "fjson").unwrap_err();
        match err {
            RepoDocsError::Parse { message } => {
                assert!(message.contains("current_page_name"), "{message}");
                assert!(message.contains("intro.fjson"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn check_output_detects_missing_fragments() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("source");
        let stage = tmp.path().join("stage");
        write(&src.join("index.rst"), "x");
        write(&src.join("guide/intro.rst"), "y");
        let staged = repodocs_sources::collect_sources(&src, &stage, "rst").unwrap();

        let only_index = vec![FragmentFile {
            relative: PathBuf::from("index.fjson"),
            fragment: serde_json::from_str(r#"{"current_page_name":"index"}"#).unwrap(),
        }];

        let err = check_output("widgets", &staged, &only_index, true).unwrap_err();
        assert!(err.to_string().contains("guide/intro.rst"), "{err}");

        assert!(check_output("widgets", &staged, &only_index, false).is_ok());
        assert!(check_output("widgets", &staged, &[], false).is_err());
    }
}
