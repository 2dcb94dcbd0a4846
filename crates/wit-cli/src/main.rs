//! The `wit` binary: a thin shell over the core library.
//!
//! Exit codes at this boundary: 0 success, 1 generic failure, 2 bad usage
//! (clap's default), 128 repository-state errors.

mod exit;

use std::path::PathBuf;

use bstr::BStr;
use clap::{Parser, Subcommand};
use wit_hash::HashAlgorithm;
use wit_ops::{bisect, merge, rebase, BisectStatus, MergeOptions, MergeOutcome, RebaseOutcome};
use wit_repository::{InitOptions, Repository};

#[derive(Parser)]
#[command(name = "wit", version, about = "A Git-compatible version control engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty repository
    Init {
        path: Option<PathBuf>,
        /// Use SHA-256 object ids
        #[arg(long)]
        sha256: bool,
        /// Initial branch name
        #[arg(long = "initial-branch")]
        initial_branch: Option<String>,
    },
    /// Clone a repository (Smart HTTP URL or local path)
    Clone {
        source: String,
        directory: Option<PathBuf>,
        /// Create a shallow clone of that depth
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Stage file contents
    Add {
        paths: Vec<PathBuf>,
        /// Stage all changes, including deletions
        #[arg(short = 'A', long)]
        all: bool,
    },
    /// Record the staged snapshot
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Show staged, modified, deleted, and untracked paths
    Status,
    /// Show unstaged (or staged) changes as unified hunks
    Diff {
        /// Compare HEAD to the index instead of the index to the work tree
        #[arg(long)]
        staged: bool,
    },
    /// Show commit history
    Log {
        refish: Option<String>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// List, create, or delete branches
    Branch {
        name: Option<String>,
        #[arg(short, long)]
        delete: bool,
    },
    /// Switch branches or restore a detached commit
    Checkout {
        refish: String,
        /// Create the branch first
        #[arg(short = 'b')]
        create: bool,
    },
    /// List or create tags
    Tag {
        name: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(short, long)]
        delete: bool,
    },
    /// Join another branch's history into the current one
    Merge {
        branch: Option<String>,
        #[arg(long = "no-ff")]
        no_ff: bool,
        #[arg(long = "abort", conflicts_with = "branch")]
        abort: bool,
        #[arg(long = "continue", conflicts_with = "branch")]
        cont: bool,
    },
    /// Replay the current branch onto another base
    Rebase {
        onto: Option<String>,
        #[arg(long = "abort", conflicts_with = "onto")]
        abort: bool,
        #[arg(long = "continue", conflicts_with = "onto")]
        cont: bool,
        #[arg(long = "skip", conflicts_with = "onto")]
        skip: bool,
    },
    /// Binary-search history for the first bad commit
    Bisect {
        #[command(subcommand)]
        action: BisectAction,
    },
    /// Move the current branch to another commit
    Reset {
        refish: String,
        /// Leave index and work tree alone
        #[arg(long, conflicts_with = "hard")]
        soft: bool,
        /// Also overwrite the work tree
        #[arg(long)]
        hard: bool,
    },
    /// Reverse recent journaled operations
    Undo {
        #[arg(short = 'n', long, default_value_t = 1)]
        steps: usize,
        #[arg(long)]
        dry_run: bool,
    },
    /// Fold loose refs into packed-refs
    PackRefs {
        /// Remove the loose files afterwards
        #[arg(long)]
        prune: bool,
    },
}

#[derive(Subcommand)]
enum BisectAction {
    Start,
    Good { rev: Option<String> },
    Bad { rev: Option<String> },
    Skip { rev: Option<String> },
    Reset,
    Status,
}

fn main() {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(exit::code_for(&err));
        }
    }
}

fn open_repo() -> anyhow::Result<Repository> {
    Ok(Repository::discover(std::env::current_dir()?)?)
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init {
            path,
            sha256,
            initial_branch,
        } => {
            let path = path.unwrap_or(std::env::current_dir()?);
            let opts = InitOptions {
                algorithm: if sha256 {
                    HashAlgorithm::Sha256
                } else {
                    HashAlgorithm::Sha1
                },
                default_branch: initial_branch,
            };
            let repo = Repository::init_opts(&path, &opts)?;
            println!(
                "Initialized empty wit repository in {}",
                repo.meta_dir().display()
            );
        }
        Command::Clone {
            source,
            directory,
            depth,
        } => {
            let is_http = source.starts_with("http://") || source.starts_with("https://");
            let directory = match directory {
                Some(dir) => dir,
                None if is_http => {
                    PathBuf::from(wit_transport::WitUrl::parse(&source)?.repo_name())
                }
                None => {
                    let name = PathBuf::from(&source);
                    let name = name
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "repository".to_string());
                    PathBuf::from(name)
                }
            };
            let repo = if is_http {
                let opts = wit_protocol::CloneOptions {
                    depth,
                    ..Default::default()
                };
                wit_protocol::http_clone(&source, &directory, &opts)?
            } else {
                wit_protocol::local_clone(source.as_ref(), &directory)?
            };
            println!("Cloned into {}", repo.work_dir().display());
        }
        Command::Add { paths, all } => {
            let repo = open_repo()?;
            if all {
                let count = repo.add_all()?;
                println!("staged {count} paths");
            } else if paths.is_empty() {
                anyhow::bail!("nothing specified; use -A to stage everything");
            } else {
                for path in paths {
                    repo.add(&path)?;
                }
            }
        }
        Command::Commit { message } => {
            let repo = open_repo()?;
            let id = repo.commit(&message, None)?;
            let branch = repo
                .refs()
                .current_branch()?
                .unwrap_or_else(|| "detached HEAD".to_string());
            println!("[{branch} {}] {message}", id.short_hex(8));
        }
        Command::Status => {
            let repo = open_repo()?;
            print_status(&repo)?;
        }
        Command::Diff { staged } => {
            let repo = open_repo()?;
            let diffs = if staged {
                repo.diff_staged()?
            } else {
                repo.diff_worktree()?
            };
            for diff in diffs {
                println!("--- a/{}", diff.path);
                println!("+++ b/{}", diff.path);
                if diff.binary {
                    println!("Binary files differ");
                    continue;
                }
                for hunk in diff.hunks {
                    println!(
                        "@@ -{},{} +{},{} @@",
                        hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
                    );
                    for line in hunk.lines {
                        let sigil = match line.kind {
                            wit_repository::DiffLineKind::Context => ' ',
                            wit_repository::DiffLineKind::Add => '+',
                            wit_repository::DiffLineKind::Remove => '-',
                        };
                        let content = line.content;
                        let text = content.strip_suffix(b"\n").unwrap_or(&content);
                        println!("{sigil}{}", BStr::new(text));
                    }
                }
            }
        }
        Command::Log { refish, limit } => {
            let repo = open_repo()?;
            let refish = refish.as_deref().unwrap_or("HEAD");
            for (id, commit) in repo.log(refish, limit)? {
                println!("commit {id}");
                println!("Author: {} <{}>", commit.author.name, commit.author.email);
                println!();
                println!("    {}", commit.summary());
                println!();
            }
        }
        Command::Branch { name, delete } => {
            let repo = open_repo()?;
            match (name, delete) {
                (Some(name), true) => {
                    repo.delete_branch(&name)?;
                    println!("Deleted branch {name}");
                }
                (Some(name), false) => {
                    repo.create_branch(&name)?;
                }
                (None, _) => {
                    for branch in repo.list_branches()? {
                        let marker = if branch.is_current { "*" } else { " " };
                        println!("{marker} {}", branch.name);
                    }
                }
            }
        }
        Command::Checkout { refish, create } => {
            let repo = open_repo()?;
            repo.checkout(&refish, create)?;
            match repo.refs().current_branch()? {
                Some(branch) => println!("Switched to branch '{branch}'"),
                None => println!("HEAD is now detached at {refish}"),
            }
        }
        Command::Tag {
            name,
            message,
            delete,
        } => {
            let repo = open_repo()?;
            match (name, delete) {
                (Some(name), true) => {
                    repo.delete_tag(&name)?;
                }
                (Some(name), false) => {
                    repo.create_tag(&name, message.as_deref())?;
                }
                (None, _) => {
                    for tag in repo.list_tags()? {
                        println!("{tag}");
                    }
                }
            }
        }
        Command::Merge {
            branch,
            no_ff,
            abort,
            cont,
        } => {
            let repo = open_repo()?;
            if abort {
                merge::abort(&repo)?;
                println!("Merge aborted");
            } else if cont {
                report_merge(merge::continue_merge(&repo)?);
            } else {
                let branch =
                    branch.ok_or_else(|| anyhow::anyhow!("merge needs a branch name"))?;
                let opts = MergeOptions {
                    no_fast_forward: no_ff,
                };
                report_merge(merge::merge(&repo, &branch, &opts)?);
            }
        }
        Command::Rebase {
            onto,
            abort,
            cont,
            skip,
        } => {
            let repo = open_repo()?;
            let outcome = if abort {
                rebase::abort(&repo)?;
                println!("Rebase aborted");
                return Ok(());
            } else if cont {
                rebase::continue_rebase(&repo)?
            } else if skip {
                rebase::skip(&repo)?
            } else {
                let onto = onto.ok_or_else(|| anyhow::anyhow!("rebase needs a target"))?;
                rebase::rebase(&repo, &onto)?
            };
            match outcome {
                RebaseOutcome::Completed { new_tip, applied } => {
                    println!("Rebased {applied} commit(s); now at {}", new_tip.short_hex(8));
                }
                RebaseOutcome::Paused { conflicts } => {
                    println!("Rebase paused; resolve these paths and run 'wit rebase --continue':");
                    for path in conflicts {
                        println!("  {path}");
                    }
                }
            }
        }
        Command::Bisect { action } => {
            let repo = open_repo()?;
            let status = match action {
                BisectAction::Start => {
                    bisect::start(&repo)?;
                    println!("Bisect started; mark a good and a bad commit");
                    return Ok(());
                }
                BisectAction::Good { rev } => bisect::mark_good(&repo, rev.as_deref())?,
                BisectAction::Bad { rev } => bisect::mark_bad(&repo, rev.as_deref())?,
                BisectAction::Skip { rev } => bisect::skip(&repo, rev.as_deref())?,
                BisectAction::Reset => {
                    bisect::reset(&repo)?;
                    println!("Bisect finished; original HEAD restored");
                    return Ok(());
                }
                BisectAction::Status => bisect::status(&repo)?,
            };
            match status {
                BisectStatus::WaitingForMarks => {
                    println!("Need at least one good and one bad commit")
                }
                BisectStatus::Bisecting {
                    current,
                    remaining,
                    steps,
                } => println!(
                    "Bisecting: {remaining} revisions left (~{steps} steps); now at {}",
                    current.short_hex(8)
                ),
                BisectStatus::FirstBad(id) => println!("{id} is the first bad commit"),
            }
        }
        Command::Reset { refish, soft, hard } => {
            let repo = open_repo()?;
            let mode = if soft {
                wit_repository::ResetMode::Soft
            } else if hard {
                wit_repository::ResetMode::Hard
            } else {
                wit_repository::ResetMode::Mixed
            };
            let target = repo.reset(&refish, mode)?;
            println!("HEAD is now at {}", target.short_hex(8));
        }
        Command::Undo { steps, dry_run } => {
            let repo = open_repo()?;
            let outcome = repo.undo(steps, dry_run)?;
            if dry_run {
                println!("Would undo:");
                for entry in &outcome.undone {
                    println!("  {}", entry.description);
                }
            } else {
                println!("{}", outcome.message);
            }
        }
        Command::PackRefs { prune } => {
            let repo = open_repo()?;
            let report = repo.refs().pack_refs(prune)?;
            println!("packed {} refs, pruned {} loose files", report.packed, report.pruned);
            for error in report.errors {
                eprintln!("warning: {error}");
            }
        }
    }
    Ok(())
}

fn report_merge(outcome: MergeOutcome) {
    match outcome {
        MergeOutcome::AlreadyUpToDate => println!("Already up to date"),
        MergeOutcome::FastForward(id) => {
            println!("Fast-forwarded to {}", id.short_hex(8))
        }
        MergeOutcome::Merged(id) => println!("Merge made; now at {}", id.short_hex(8)),
        MergeOutcome::Conflicted(conflicts) => {
            println!("Automatic merge failed; fix these paths, then 'wit merge --continue':");
            for conflict in conflicts {
                println!("  {}", conflict.path);
            }
        }
    }
}

fn print_status(repo: &Repository) -> anyhow::Result<()> {
    let status = repo.status()?;
    match repo.refs().current_branch()? {
        Some(branch) => println!("On branch {branch}"),
        None => println!("HEAD detached"),
    }
    if let Some(state) = merge::get_state(repo)? {
        println!(
            "Merging {} into {} ({} conflicts unresolved)",
            state.source_branch,
            state.target_branch,
            state.unresolved().len()
        );
    }
    for (label, paths) in [
        ("Changes to be committed", &status.staged),
        ("Unmerged paths", &status.conflicted),
        ("Changes not staged", &status.modified),
        ("Deleted", &status.deleted),
        ("Untracked files", &status.untracked),
    ] {
        if paths.is_empty() {
            continue;
        }
        println!("\n{label}:");
        for path in paths {
            println!("  {}", BStr::new(path));
        }
    }
    if status.is_clean() && status.untracked.is_empty() {
        println!("nothing to commit, working tree clean");
    }
    Ok(())
}
