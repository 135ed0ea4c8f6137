use anyhow::Context;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use taller_api::{config, db, migrator::Migrator};

#[derive(Parser, Debug)]
#[command(name = "migration", about = "Apply or roll back the taller-api schema", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Apply pending migrations
    Up {
        #[arg(short = 'n', long, help = "Apply at most this many migrations")]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(short = 'n', long, default_value_t = 1, help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Show which migrations are applied
    Status,
    /// Drop every table and apply all migrations again
    Fresh,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Up { .. } => "up",
            Command::Down { .. } => "down",
            Command::Status => "status",
            Command::Fresh => "fresh",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Up { steps: None });

    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("Starting database migration: {}", command.name());
    let pool = db::establish_connection_from_app_config(&cfg).await?;

    match command {
        Command::Up { steps } => Migrator::up(&pool, steps).await?,
        Command::Down { steps } => Migrator::down(&pool, Some(steps)).await?,
        Command::Status => Migrator::status(&pool).await?,
        Command::Fresh => Migrator::fresh(&pool).await?,
    }

    info!("Migration command '{}' completed successfully", command.name());
    db::close_pool(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("migration").chain(args.iter().copied()))
    }

    #[test]
    fn bare_invocation_means_up() {
        assert_eq!(parse(&[]).unwrap().command, None);
        assert_eq!(parse(&["up"]).unwrap().command, Some(Command::Up { steps: None }));
        assert_eq!(
            parse(&["up", "--steps", "2"]).unwrap().command,
            Some(Command::Up { steps: Some(2) })
        );
    }

    #[test]
    fn down_rolls_back_one_by_default() {
        assert_eq!(parse(&["down"]).unwrap().command, Some(Command::Down { steps: 1 }));
        assert_eq!(parse(&["down", "-n", "3"]).unwrap().command, Some(Command::Down { steps: 3 }));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["sideways"]).is_err());
        assert!(parse(&["down", "-n", "-1"]).is_err());
        assert!(parse(&["up", "--steps", "many"]).is_err());
    }
}
