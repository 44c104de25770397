use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use casewarden::case_lifecycle::{CaseStore, PermissionLookup, StepInventory};
use casewarden::{
    init_telemetry, ActorId, CachedPermissionLookup, CaseDraft, CaseId, CaseType,
    CasewardenConfig, InMemoryWorkspace, ProjectId, StatusResponse, StatusTransitionAuthority,
    TracingNotifier, TransitionError, TransitionSettings, WorkspaceFile,
};

#[derive(Parser)]
#[command(name = "casewarden")]
#[command(about = "Status workflow for test cases: draft, refinement, approved")]
#[command(long_about = "casewarden validates and applies test case status changes against \
                       project grants and step presence. It works on a JSON workspace \
                       snapshot holding cases, step counts and project members.")]
struct Cli {
    /// Workspace snapshot file (defaults to store.state_file from the configuration)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move a case to draft, refinement or approved
    ChangeStatus {
        /// Case identifier
        #[arg(long)]
        case: u64,
        /// Acting user
        #[arg(long)]
        actor: String,
        /// Target status name (case-insensitive)
        #[arg(long)]
        status: Option<String>,
    },
    /// Print a case with its step count
    Show {
        #[arg(long)]
        case: u64,
    },
    /// Check the status submitted with a new-case form
    CheckCreate {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        project: Option<u64>,
        #[arg(long, value_parser = parse_case_type)]
        case_type: Option<CaseType>,
        #[arg(long)]
        status: Option<String>,
        /// Number of steps in the form
        #[arg(long, default_value = "0")]
        steps: usize,
    },
    /// Check the status submitted with an edit form for an existing case
    CheckUpdate {
        #[arg(long)]
        case: u64,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        project: Option<u64>,
        #[arg(long, value_parser = parse_case_type)]
        case_type: Option<CaseType>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "0")]
        steps: usize,
    },
    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(long, default_value = "casewarden.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_case_type(value: &str) -> Result<CaseType, String> {
    match value.to_lowercase().as_str() {
        "case" => Ok(CaseType::Case),
        "task" => Ok(CaseType::Task),
        other => Err(format!("unknown case type '{other}' (expected case or task)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = casewarden::config()?.clone();
    init_telemetry(&config.observability)?;
    casewarden::init_config()?;

    let state = cli
        .state
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.store.state_file));
    let file = WorkspaceFile::new(state);

    let code = match cli.command {
        Commands::ChangeStatus { case, actor, status } => {
            change_status(&file, &config, CaseId(case), ActorId::new(actor), status).await?
        }
        Commands::Show { case } => show(&file, CaseId(case)).await?,
        Commands::CheckCreate {
            actor,
            project,
            case_type,
            status,
            steps,
        } => {
            let draft = CaseDraft {
                project: project.map(ProjectId),
                case_type,
                status,
                steps,
            };
            check_form(&file, &config, ActorId::new(actor), None, draft).await?
        }
        Commands::CheckUpdate {
            case,
            actor,
            project,
            case_type,
            status,
            steps,
        } => {
            let draft = CaseDraft {
                project: project.map(ProjectId),
                case_type,
                status,
                steps,
            };
            check_form(&file, &config, ActorId::new(actor), Some(CaseId(case)), draft).await?
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config.save_to_file(&path)?;
            println!("Wrote {}", path.display());
            EXIT_OK
        }
    };

    if code != EXIT_OK {
        std::process::exit(code);
    }
    Ok(())
}

const EXIT_OK: i32 = 0;
const EXIT_REJECTED: i32 = 1;
const EXIT_FAULT: i32 = 2;

/// 1 when the request was refused, 2 when a backend failed
fn exit_code<T>(result: &Result<T, TransitionError>) -> i32 {
    match result {
        Ok(_) => EXIT_OK,
        Err(e) if e.is_client_error() => EXIT_REJECTED,
        Err(_) => EXIT_FAULT,
    }
}

fn build_authority(
    workspace: Arc<InMemoryWorkspace>,
    config: &CasewardenConfig,
) -> StatusTransitionAuthority {
    let mut permissions: Arc<dyn PermissionLookup> = workspace.clone();
    if config.permissions.cache_enabled {
        permissions = Arc::new(CachedPermissionLookup::from_config(
            permissions,
            &config.permissions,
        ));
    }
    StatusTransitionAuthority::new(
        permissions,
        workspace.clone(),
        workspace,
        Arc::new(TracingNotifier),
    )
    .with_settings(TransitionSettings::from(&config.workflow))
}

async fn change_status(
    file: &WorkspaceFile,
    config: &CasewardenConfig,
    case_id: CaseId,
    actor: ActorId,
    status: Option<String>,
) -> Result<i32> {
    let (response, code) = file
        .transact(|snapshot| async move {
            let workspace = Arc::new(InMemoryWorkspace::from_snapshot(snapshot));
            let authority = build_authority(workspace.clone(), config);
            let result = authority
                .change_status(&actor, case_id, status.as_deref())
                .await;
            let response = StatusResponse::from_result(&result, config.workflow.locale);
            Ok((workspace.snapshot(), (response, exit_code(&result))))
        })
        .await?;

    print_json(&response)?;
    Ok(code)
}

async fn show(file: &WorkspaceFile, case_id: CaseId) -> Result<i32> {
    let workspace = InMemoryWorkspace::from_snapshot(file.read()?);
    match workspace.load(&case_id).await {
        Ok(case) => {
            let steps = workspace.count_steps(&case_id).await?;
            print_json(&json!({ "case": case, "steps": steps }))?;
            Ok(EXIT_OK)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(EXIT_REJECTED)
        }
    }
}

async fn check_form(
    file: &WorkspaceFile,
    config: &CasewardenConfig,
    actor: ActorId,
    existing: Option<CaseId>,
    draft: CaseDraft,
) -> Result<i32> {
    let workspace = Arc::new(InMemoryWorkspace::from_snapshot(file.read()?));
    let authority = build_authority(workspace.clone(), config);

    let result = match existing {
        None => authority.validate_create(&actor, &draft).await,
        Some(case_id) => match workspace.case(case_id) {
            Some(case) => authority.validate_update(&actor, &case, &draft).await,
            None => Err(TransitionError::CaseNotFound(case_id)),
        },
    };

    let response = match &result {
        Ok(status) => StatusResponse {
            code: 200,
            body: json!({ "status": status }),
        },
        Err(e) => StatusResponse::from_error(e, config.workflow.locale),
    };
    print_json(&response)?;
    Ok(exit_code(&result))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
