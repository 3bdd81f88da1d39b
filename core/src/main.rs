use anyhow::Result;
use clap::Parser;
use host_api::{Actor, Capability};
use rusqlite::Connection;
use tracing::info;

use sweepcore::cli::{Cli, Command};
use sweepcore::error::SweepError;
use sweepcore::{audit, db, maintenance, setup, store, Config, Sweeper};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    let level = if cfg.logging_enabled {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    std::fs::create_dir_all(&cfg.data_dir)?;

    let actor = Actor::privileged(cli.actor.unwrap_or(0));
    match cli.command {
        Command::Run => {
            let pool = db::open_pool(cfg.db_path())?;
            {
                let conn = pool.get()?;
                setup::activate(&conn)?;
                setup::version_check(&conn)?;
            }
            maintenance::spawn_daily(pool, cfg.retention_days);
            info!("maintenance scheduler running - press Ctrl+C to exit");
            tokio::signal::ctrl_c().await?;
        }
        command => {
            let conn = db::init_db(cfg.db_path())?;
            setup::version_check(&conn)?;
            run_command(command, &conn, &cfg, actor)?;
        }
    }
    Ok(())
}

fn run_command(command: Command, conn: &Connection, cfg: &Config, actor: Actor) -> Result<()> {
    match command {
        Command::Run => unreachable!("handled by the caller"),
        Command::Sweep { owner_id } => {
            store::get_owner(conn, owner_id)?.ok_or(SweepError::OwnerNotFound(owner_id))?;
            let sweeper = Sweeper::new(conn, cfg, actor);
            if let Some(summary) = sweeper.process_owner_deletion(owner_id)? {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::Bulk { owner_ids } => {
            let sweeper = Sweeper::new(conn, cfg, actor);
            let summary = sweeper.process_bulk_deletion(&owner_ids);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Count { owner_id } => {
            store::get_owner(conn, owner_id)?.ok_or(SweepError::OwnerNotFound(owner_id))?;
            let sweeper = Sweeper::new(conn, cfg, actor);
            println!("{}", sweeper.get_reference_count(owner_id)?);
        }
        Command::Logs { limit } => {
            anyhow::ensure!(
                actor.can(Capability::ViewAuditLog),
                "actor {} may not view the audit log",
                actor.id
            );
            for entry in audit::list(conn, limit)? {
                println!(
                    "{:<12} owner={:<8} actor={:<8} assets={:<4} {}",
                    entry.created_at, entry.owner_id, entry.actor_id, entry.asset_count, entry.details
                );
            }
        }
        Command::Retention => {
            let report = maintenance::run_retention_sweep(conn, cfg.retention_days)?;
            println!(
                "purged {} audit entries, {} orphaned field rows",
                report.purged_entries, report.orphaned_fields
            );
        }
        Command::Uninstall { keep_logs } => {
            setup::purge_all(conn, keep_logs || cfg.keep_audit_log_on_uninstall)?;
            println!("engine state removed");
        }
    }
    Ok(())
}
