//! GhostBuster command line.
//!
//! ```bash
//! ghostbuster init --workspace .
//! ghostbuster project create --name Capstone --leader u-1 --github octo
//! ghostbuster member join --project <id> --user u-2 --github sarahm
//! ghostbuster depend set --project <id> --member <member> --on <leader>
//! ghostbuster record --project <id> --member <member> --kind pr --external-id 42
//! ghostbuster ingest --workspace . --project <id> --repo ../team-repo --days 14
//! ghostbuster evaluate --workspace . --project <id>
//! ghostbuster history --workspace . --project <id>
//! ```

use clap::{Parser, Subcommand};
use ghostbuster_lib::commands::{activity, evaluate, git, project};
use ghostbuster_lib::models::evaluation::EvaluationCache;
use ghostbuster_lib::models::project::NewProject;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "ghostbuster")]
#[command(about = "Dependency-aware contribution tracking for project teams", long_about = None)]
struct Cli {
    /// Workspace directory holding .ghostbuster/
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or open a workspace and print its metadata
    Init,

    /// Create, show or delete projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Add or remove project members
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Declare who a member is waiting on
    Depend {
        #[command(subcommand)]
        action: DependAction,
    },

    /// Record one activity event for a member
    Record {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        member: String,

        /// commit, pr or pr_review
        #[arg(short, long)]
        kind: String,

        /// Unix seconds; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,

        /// Source id used to drop duplicates (sha, PR number)
        #[arg(long)]
        external_id: Option<String>,
    },

    /// Classify and score every member of a project
    Evaluate {
        #[arg(short, long)]
        project: String,

        /// Print the team summary instead of the full result
        #[arg(long)]
        summary: bool,
    },

    /// Import commits from a local repository as activity
    Ingest {
        #[arg(short, long)]
        project: String,

        /// Repository to read; defaults to the workspace itself
        #[arg(short, long)]
        repo: Option<PathBuf>,

        /// How far back to look (overrides gitHistoryDays)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Show recorded status snapshots
    History {
        #[arg(short, long)]
        project: String,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    Create {
        #[arg(short, long)]
        name: String,

        /// User id of the leader
        #[arg(short, long)]
        leader: String,

        /// Leader's GitHub username
        #[arg(long)]
        github: Option<String>,

        #[arg(long)]
        repo_url: Option<String>,

        #[arg(long)]
        start_date: Option<String>,

        #[arg(long)]
        end_date: Option<String>,
    },
    Show {
        #[arg(short, long)]
        project: String,
    },
    Delete {
        #[arg(short, long)]
        project: String,
    },
}

#[derive(Subcommand)]
enum MemberAction {
    Join {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        user: String,

        #[arg(long)]
        github: Option<String>,
    },
    Remove {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        member: String,
    },
}

#[derive(Subcommand)]
enum DependAction {
    Set {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        member: String,

        /// Member being waited on
        #[arg(long)]
        on: String,
    },
    Clear {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        member: String,
    },
}

#[tokio::main]
async fn main() {
    ghostbuster_lib::init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let workspace = cli.workspace.to_string_lossy().to_string();

    match cli.command {
        Commands::Init => print_json(&git::open_workspace(workspace).await?),
        Commands::Project { action } => match action {
            ProjectAction::Create {
                name,
                leader,
                github,
                repo_url,
                start_date,
                end_date,
            } => {
                let input = NewProject {
                    name,
                    leader_user_id: leader,
                    leader_github_username: github,
                    repo_url,
                    start_date,
                    end_date,
                };
                print_json(&project::create_project(workspace, input).await?)
            }
            ProjectAction::Show { project } => {
                print_json(&project::get_project(workspace, project).await?)
            }
            ProjectAction::Delete { project } => {
                project::delete_project(workspace, project.clone()).await?;
                print_json(&serde_json::json!({ "deleted": project }))
            }
        },
        Commands::Member { action } => match action {
            MemberAction::Join {
                project,
                user,
                github,
            } => print_json(&project::join_project(workspace, project, user, github).await?),
            MemberAction::Remove { project, member } => {
                let cleared = project::remove_member(workspace, project, member).await?;
                print_json(&serde_json::json!({ "cleared_dependents": cleared }))
            }
        },
        Commands::Depend { action } => match action {
            DependAction::Set {
                project,
                member,
                on,
            } => print_json(&project::set_dependency(workspace, project, member, on).await?),
            DependAction::Clear { project, member } => {
                print_json(&project::clear_dependency(workspace, project, member).await?)
            }
        },
        Commands::Record {
            project,
            member,
            kind,
            timestamp,
            external_id,
        } => {
            let inserted =
                activity::record_activity(workspace, project, member, kind, timestamp, external_id)
                    .await?;
            print_json(&serde_json::json!({ "inserted": inserted }))
        }
        Commands::Evaluate { project, summary } => {
            let cache = Arc::new(Mutex::new(EvaluationCache::default()));
            let result =
                evaluate::run_evaluation(workspace.clone(), project.clone(), cache.clone()).await?;
            if summary {
                print_json(&evaluate::get_team_summary(workspace, project, cache).await?)
            } else {
                print_json(&result)
            }
        }
        Commands::Ingest {
            project,
            repo,
            days,
        } => {
            let repo = repo
                .map(|r| r.to_string_lossy().to_string())
                .unwrap_or_else(|| workspace.clone());
            let inserted = git::ingest_git_history(workspace, project, repo, days).await?;
            print_json(&serde_json::json!({ "inserted": inserted }))
        }
        Commands::History { project } => {
            print_json(&activity::get_status_snapshots(workspace, project).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{raw}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_project_setup_commands() {
        let cli = Cli::try_parse_from([
            "ghostbuster",
            "--workspace",
            "/tmp/ws",
            "project",
            "create",
            "--name",
            "Capstone",
            "--leader",
            "u-1",
            "--github",
            "octo",
        ])
        .expect("parse");
        assert_eq!(cli.workspace, PathBuf::from("/tmp/ws"));
        match cli.command {
            Commands::Project {
                action: ProjectAction::Create { name, leader, github, .. },
            } => {
                assert_eq!(name, "Capstone");
                assert_eq!(leader, "u-1");
                assert_eq!(github.as_deref(), Some("octo"));
            }
            _ => panic!("expected project create"),
        }

        let cli = Cli::try_parse_from([
            "ghostbuster", "depend", "set", "-p", "p1", "-m", "m2", "--on", "m1",
        ])
        .expect("parse");
        assert_eq!(cli.workspace, PathBuf::from("."));
        assert!(matches!(
            cli.command,
            Commands::Depend { action: DependAction::Set { ref on, .. } } if on == "m1"
        ));
    }

    #[test]
    fn parses_record_and_member_commands() {
        let cli = Cli::try_parse_from([
            "ghostbuster", "record", "-p", "p1", "-m", "m2", "-k", "pr", "--external-id", "42",
        ])
        .expect("parse");
        match cli.command {
            Commands::Record { kind, external_id, timestamp, .. } => {
                assert_eq!(kind, "pr");
                assert_eq!(external_id.as_deref(), Some("42"));
                assert_eq!(timestamp, None);
            }
            _ => panic!("expected record"),
        }

        let cli = Cli::try_parse_from(["ghostbuster", "member", "remove", "-p", "p1", "-m", "m2"])
            .expect("parse");
        assert!(matches!(cli.command, Commands::Member { action: MemberAction::Remove { .. } }));

        assert!(Cli::try_parse_from(["ghostbuster", "record", "-p", "p1"]).is_err());
    }
}
