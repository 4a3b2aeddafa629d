use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use workshop_api::{
    auth::ActorContext,
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::UserRole,
    handlers::AppServices,
    services::{carry_over::CarryOverReport, users::CreateUserInput},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::EndOfDay(args) => handle_end_of_day(&context, args, cli.json).await?,
        Commands::Migrate => handle_migrate(&context).await?,
        Commands::CreateAdmin(args) => handle_create_admin(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "workshop", about = "Workshop operations from the command line", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll unfinished jobs to the next day
    EndOfDay(EndOfDayArgs),
    /// Apply pending database migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
}

#[derive(Args)]
struct EndOfDayArgs {
    #[arg(long, help = "Day being closed (YYYY-MM-DD); defaults to today")]
    date: Option<NaiveDate>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Report what would be carried without changing anything"
    )]
    dry_run: bool,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, help = "At least 8 characters")]
    password: String,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(&config.log_level, config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn services(&self) -> Result<AppServices> {
        AppServices::new(self.db.clone(), &self.config).context("failed to build services")
    }
}

async fn handle_end_of_day(context: &CliContext, args: EndOfDayArgs, json: bool) -> Result<()> {
    let services = context.services()?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let actor = ActorContext::system("workshop-cli");

    let report = if args.dry_run {
        services.carry_over.preview(date).await
    } else {
        services.carry_over.run(date, &actor).await
    }
    .context("end-of-day run failed")?;

    if json {
        print_json(&report)?;
    } else {
        render_report(&report);
    }
    Ok(())
}

async fn handle_migrate(context: &CliContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed running migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn handle_create_admin(context: &CliContext, args: CreateAdminArgs, json: bool) -> Result<()> {
    let services = context.services()?;
    let actor = ActorContext::system("workshop-cli");
    let input = CreateUserInput {
        name: args.name,
        email: args.email,
        password: args.password,
        role: UserRole::Administrator,
        level: None,
        break_start: None,
        break_end: None,
    };

    let user = services
        .users
        .create(input, &actor)
        .await
        .context("failed to create administrator")?;

    if json {
        print_json(&user)?;
    } else {
        println!("Administrator {} created (id {})", user.email, user.id);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_report(report: &CarryOverReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!(
        "Closing {} -> {}{}: {} carried, {} skipped, {} failed",
        report.closing_date,
        report.next_date,
        mode,
        report.carried.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for job in &report.carried {
        let note = if job.technician_released {
            " • technician released"
        } else {
            ""
        };
        println!("- {} • {}{}", job.job_number, job.status, note);
    }
    for job in &report.skipped {
        println!("- {} skipped: {}", job.job_number, job.reason);
    }
    for job in &report.failed {
        println!("- {} FAILED: {}", job.job_number, job.error);
    }
}
