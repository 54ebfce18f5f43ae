use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use outreach_access::config::load_env;
use outreach_access::events::{fetch_activity, verify_chain, ChainReport};
use outreach_access::jwt::JwtConfig;
use outreach_access::models::Role;
use outreach_access::store::{ProfileStore, SqliteStore};
use outreach_access::utils::utc_now;

#[derive(Parser, Debug)]
#[command(author, version, about = "outreach access operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Set a profile's role by email, bypassing the request workflow
    SetRole { email: String, role: Role },
    /// Sign a bearer token for local testing
    IssueToken { user_id: Uuid, email: String },
    /// Walk the activity log hash chain and report the first broken link
    VerifyAudit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::SetRole { email, role } => {
            let store = SqliteStore::new(get_pool().await?);
            let profile = store
                .find_profile_by_email(&email)
                .await?
                .with_context(|| format!("no profile with email {email}"))?;
            store.set_role(profile.id, role, utc_now()).await?;
            println!("{} ({}) is now {}", profile.email, profile.id, role);
        }
        Commands::IssueToken { user_id, email } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", jwt.encode(user_id, &email)?);
        }
        Commands::VerifyAudit => {
            let pool = get_pool().await?;
            let entries = fetch_activity(&pool).await?;
            match verify_chain(&entries) {
                ChainReport::Intact { entries } => println!("activity log intact ({entries} entries)"),
                ChainReport::Broken { seq, reason } => {
                    anyhow::bail!("activity log broken at seq {seq}: {reason}")
                }
            }
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate's own folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
