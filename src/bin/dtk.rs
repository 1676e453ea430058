use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use delivery_toolkit::app::{App, ProgressSink, RunResult};
use delivery_toolkit::client::HttpApiClient;
use delivery_toolkit::config::{ConfigLoader, ConfigOverrides, CredentialKind, ResolvedConfig};
use delivery_toolkit::credentials::{
    CachedCredentials, EnvTokenSource, GcloudTokenSource, TokenSource,
};
use delivery_toolkit::domain::{Environment, WorkspaceRef};
use delivery_toolkit::error::DeliveryError;
use delivery_toolkit::output::{ConsoleOutput, JsonOutput, OutputMode};

type HttpApp = App<HttpApiClient<CachedCredentials<Box<dyn TokenSource>>>>;

#[derive(Parser)]
#[command(name = "dtk")]
#[command(about = "Batch delivery operations against workspace, data repository, storage and warehouse APIs")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long = "env", global = true)]
    environment: Option<Environment>,

    #[arg(long, global = true)]
    report_dir: Option<String>,

    #[arg(long, global = true)]
    max_retries: Option<u32>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create or update workspace entities from an entity:<type>_id table")]
    UpsertEntities(UpsertArgs),
    #[command(about = "Apply workspace ACL rows (workspace, email, access_level)")]
    ShareWorkspaces(ShareArgs),
    #[command(about = "Add members to snapshot policies (snapshot_id, email[, policy])")]
    GrantSnapshotAccess(InputArgs),
    #[command(about = "Check that gs:// objects exist (uri)")]
    CheckObjects(InputArgs),
    #[command(about = "Run warehouse queries (project, query[, label])")]
    RunQueries(InputArgs),
}

#[derive(Args)]
struct InputArgs {
    #[arg(long, short)]
    input: PathBuf,
}

#[derive(Args)]
struct UpsertArgs {
    #[arg(long, short)]
    workspace: String,

    #[arg(long, short)]
    input: PathBuf,

    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Args)]
struct ShareArgs {
    #[arg(long, short)]
    input: PathBuf,

    #[arg(long)]
    invite_users_not_found: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DeliveryError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DeliveryError) -> u8 {
    match error {
        DeliveryError::InvalidWorkspace(_)
        | DeliveryError::InvalidObjectUri(_)
        | DeliveryError::InvalidAccessLevel(_)
        | DeliveryError::InvalidEntityHeader(_)
        | DeliveryError::InvalidBool { .. }
        | DeliveryError::MissingColumn(_)
        | DeliveryError::MissingValue { .. }
        | DeliveryError::UnsupportedInput(_)
        | DeliveryError::TableRead { .. }
        | DeliveryError::ConfigRead(_)
        | DeliveryError::ConfigParse(_)
        | DeliveryError::InvalidConfig(_) => 2,
        DeliveryError::Credentials(_) | DeliveryError::Http(_) => 3,
        DeliveryError::RetriesExhausted { .. } | DeliveryError::UnexpectedStatus { .. } => 4,
        DeliveryError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let config = ConfigLoader::resolve_with(
        cli.config.as_deref(),
        ConfigOverrides {
            environment: cli.environment,
            report_dir: cli.report_dir,
            max_retries: cli.max_retries,
        },
    )?;
    tracing::debug!(environment = %config.environment, "configuration resolved");

    let app = build_app(config)?;
    let result = match output_mode {
        OutputMode::Json => run_command(&app, cli.command, &JsonOutput),
        OutputMode::Console => run_command(&app, cli.command, &ConsoleOutput),
    }?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_run(&result).into_diagnostic()?,
        OutputMode::Console => ConsoleOutput::print_run(&result),
    }
    Ok(())
}

fn build_app(
    config: ResolvedConfig,
) -> Result<HttpApp, DeliveryError> {
    let source: Box<dyn TokenSource> = match config.credentials {
        CredentialKind::Gcloud => Box::new(GcloudTokenSource::new()),
        CredentialKind::Env => Box::new(EnvTokenSource),
    };
    let client = HttpApiClient::new(CachedCredentials::new(source))?;
    Ok(App::new(config, client))
}

fn run_command(
    app: &HttpApp,
    command: Commands,
    sink: &dyn ProgressSink,
) -> Result<RunResult, DeliveryError> {
    match command {
        Commands::UpsertEntities(args) => {
            let workspace: WorkspaceRef = args.workspace.parse()?;
            app.upsert_entities(&workspace, &args.input, args.batch_size, sink)
        }
        Commands::ShareWorkspaces(args) => {
            app.share_workspaces(&args.input, args.invite_users_not_found, sink)
        }
        Commands::GrantSnapshotAccess(args) => app.grant_snapshot_access(&args.input, sink),
        Commands::CheckObjects(args) => app.check_objects(&args.input, sink),
        Commands::RunQueries(args) => app.run_queries(&args.input, sink),
    }
}
