use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ae_stats::ingest::Engine;
use ae_stats::report::{self, ReportKind};
use ae_stats::store::{registry, Db};
use ae_stats::util::env as app_env;

#[derive(Parser)]
#[command(name = "ae-stats", about = "A&E monthly statistics ingester and reporter")]
struct Cli {
    /// Store name; the file lands at <name>.db
    #[arg(long, default_value = "ae_stats")]
    db: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Catch up on published months, then open the report menu
    Run,
    /// Catch up on published months and exit
    Ingest,
    /// Render one report chart and exit
    Report {
        #[command(subcommand)]
        kind: ReportCommand,
    },
    /// Write the organisation registry snapshot and exit
    Export,
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Top 5 organisations by 12hr+ waits
    TwelvePlusTop5,
    /// Top 5 organisations by emergency admissions
    EmergencyTop5,
    /// 12hr+ waits for one organisation
    TwelvePlus { org_code: String },
    /// Emergency admissions for one organisation
    Emergency { org_code: String },
}

impl From<ReportCommand> for ReportKind {
    fn from(cmd: ReportCommand) -> Self {
        match cmd {
            ReportCommand::TwelvePlusTop5 => ReportKind::TwelvePlusTop5,
            ReportCommand::EmergencyTop5 => ReportKind::EmergencyTop5,
            ReportCommand::TwelvePlus { org_code } => ReportKind::TwelvePlusOrg(org_code),
            ReportCommand::Emergency { org_code } => ReportKind::EmergencyOrg(org_code),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    app_env::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = PathBuf::from(format!("{}.db", cli.db));
    let db = Db::connect(&db_path).await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            catch_up(&db).await?;
            menu_loop(&db).await?;
        }
        Commands::Ingest => {
            catch_up(&db).await?;
        }
        Commands::Report { kind } => {
            let path = report::run_report(&db, &app_env::out_dir(), kind.into()).await?;
            println!("Wrote {}", path.display());
        }
        Commands::Export => {
            let written = registry::export_registry(&db, &app_env::export_path()).await?;
            info!(organisations = written, "registry snapshot written");
        }
    }
    Ok(())
}

async fn catch_up(db: &Db) -> Result<()> {
    let engine = Engine::new(db.clone(), app_env::base_url(), app_env::export_path());
    engine.run().await
}

fn prompt(text: &str) -> Result<String> {
    print!("{text}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Interactive report menu. Unknown options and unknown organisation
/// codes re-prompt rather than exiting.
async fn menu_loop(db: &Db) -> Result<()> {
    loop {
        println!();
        println!("1: Top 5 organisations by 12hr+ waits");
        println!("2: Top 5 organisations by emergency admissions");
        println!("3: 12hr+ waits for one organisation");
        println!("4: Emergency admissions for one organisation");
        println!("0: Exit");

        let choice = prompt("Select an option: ")?;
        let kind = match choice.as_str() {
            "0" => {
                println!("Exiting...");
                return Ok(());
            }
            "1" => ReportKind::TwelvePlusTop5,
            "2" => ReportKind::EmergencyTop5,
            "3" => ReportKind::TwelvePlusOrg(prompt_org_code(db).await?),
            "4" => ReportKind::EmergencyOrg(prompt_org_code(db).await?),
            other => {
                println!("Unknown option: {other}");
                continue;
            }
        };

        let path = report::run_report(db, &app_env::out_dir(), kind).await?;
        println!("Wrote {}", path.display());
    }
}

async fn prompt_org_code(db: &Db) -> Result<String> {
    loop {
        let code = prompt("Organisation code: ")?;
        if code.is_empty() {
            continue;
        }
        if db.organisation_exists(&code).await? {
            return Ok(code);
        }
        println!("Unknown organisation code: {code}");
    }
}
