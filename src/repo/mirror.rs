//! Upstream mirror and worktree management.
//!
//! This module keeps a bare mirror of the compiler repository and one
//! worktree per measured branch, using the git2 library.

use crate::config::Config;
use crate::error::{Result, SpeedError};
use crate::models::Branch;
use git2::build::RepoBuilder;
use git2::{
    BranchType, FetchOptions, FetchPrune, Progress, RemoteCallbacks, Repository, ResetType,
    WorktreeAddOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Refspec mirroring every upstream branch.
const HEADS_REFSPEC: &str = "+refs/heads/*:refs/heads/*";

/// Bring the mirror and all branch worktrees up to date.
pub fn refresh(config: &Config, show_progress: bool) -> Result<()> {
    let mirror_dir = config.mirror_dir();

    let repo = if mirror_dir.exists() {
        let repo = Repository::open_bare(&mirror_dir)?;
        fetch_mirror(&repo, show_progress)?;
        repo
    } else {
        clone_mirror(&config.upstream.url, &mirror_dir, show_progress)?
    };

    for branch in Branch::DEVELOPMENT {
        let Some(name) = config.upstream.branch_ref(branch) else {
            continue;
        };
        sync_worktree(&repo, branch, name, &config.worktree_dir(branch))?;
    }

    Ok(())
}

/// Full commit id of a branch head in the mirror.
pub fn branch_head(config: &Config, branch: Branch) -> Result<String> {
    let name = config
        .upstream
        .branch_ref(branch)
        .ok_or(SpeedError::MissingBranchValue { branch })?;

    let repo = Repository::open_bare(config.mirror_dir())?;
    let commit = repo
        .find_branch(name, BranchType::Local)?
        .get()
        .peel_to_commit()?;

    Ok(commit.id().to_string())
}

fn progress_callbacks(show_progress: bool) -> (RemoteCallbacks<'static>, Option<ProgressBar>) {
    let progress_bar = if show_progress {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    } else {
        None
    };

    let pb_clone = progress_bar.clone();
    let mut callbacks = RemoteCallbacks::new();

    callbacks.transfer_progress(move |progress: Progress<'_>| {
        if let Some(ref pb) = pb_clone {
            pb.set_length(progress.total_objects() as u64);
            pb.set_position(progress.received_objects() as u64);
        }
        true
    });

    (callbacks, progress_bar)
}

fn clone_mirror(url: &str, path: &Path, show_progress: bool) -> Result<Repository> {
    info!("Cloning mirror of {} to {}", url, path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SpeedError::io(parent, e))?;
    }

    let (callbacks, progress_bar) = progress_callbacks(show_progress);
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(callbacks);

    let mut builder = RepoBuilder::new();
    builder.bare(true);
    builder.fetch_options(fetch_opts);
    builder.remote_create(|repo, name, url| repo.remote_with_fetch(name, url, HEADS_REFSPEC));

    let repo = builder
        .clone(url, path)
        .map_err(|e| SpeedError::tool(format!("git clone {}", url), e.message()))?;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Clone complete");
    }

    Ok(repo)
}

fn fetch_mirror(repo: &Repository, show_progress: bool) -> Result<()> {
    info!("Fetching upstream changes");

    let (callbacks, progress_bar) = progress_callbacks(show_progress);
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(callbacks);
    fetch_opts.prune(FetchPrune::On);

    let mut remote = repo.find_remote("origin")?;
    remote
        .fetch(&[HEADS_REFSPEC], Some(&mut fetch_opts), None)
        .map_err(|e| SpeedError::tool("git fetch -p", e.message()))?;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Fetch complete");
    }

    Ok(())
}

/// Create the worktree of a branch, or reset an existing one to its head.
fn sync_worktree(repo: &Repository, branch: Branch, name: &str, path: &Path) -> Result<()> {
    let refname = format!("refs/heads/{}", name);

    if !path.exists() {
        info!("Adding worktree for {} at {}", branch, path.display());
        let reference = repo.find_reference(&refname)?;
        let mut opts = WorktreeAddOptions::new();
        opts.reference(Some(&reference));
        repo.worktree(branch.dir_name(), path, Some(&opts))
            .map_err(|e| SpeedError::tool(format!("git worktree add {}", name), e.message()))?;
        return Ok(());
    }

    debug!("Resetting worktree {} to {}", path.display(), refname);
    let worktree = Repository::open(path)?;
    let target = worktree.revparse_single(&refname)?;
    worktree
        .reset(&target, ResetType::Hard, None)
        .map_err(|e| SpeedError::tool(format!("git reset --hard {}", name), e.message()))?;

    Ok(())
}
