//! Build orchestration for repodocs.
//!
//! Ties source collection, the external fragment compiler, page assembly,
//! and search indexing into [`build_site`].

pub mod assembler;
pub mod compiler;
pub mod pipeline;
pub mod tree;

pub use assembler::{AssembleContext, assemble, page_url, publish_pages};
pub use compiler::{
    CompileRequest, FragmentCompiler, FragmentFile, SubprocessCompiler, check_output,
    read_fragments,
};
pub use pipeline::{
    BuildOptions, BuildReport, ProgressReporter, RepoOutcome, RepoStatus, SilentProgress,
    build_site,
};
pub use tree::PageTree;
