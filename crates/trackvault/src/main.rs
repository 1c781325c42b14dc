use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trackvault::directory::CognitoDirectory;
use trackvault::storage::{DynamoDbRepository, SdkStore};
use trackvault::{Config, PrivilegeSynchronizer};
use trackvault_core::directory::SyncOutcome;
use trackvault_core::library::{Role, TransferStatus};
use trackvault_core::storage::{ListOptions, TransferRepository};

/// trackvault - operator commands for the library store
#[derive(Parser, Debug)]
#[command(name = "trackvault")]
#[command(version, about, long_about = None)]
struct Cli {
    /// DynamoDB table name
    #[arg(long, global = true, env = "TRACKVAULT_TABLE_NAME")]
    table: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Change an account's role in the store and the directory
    SetRole {
        /// Account performing the change
        #[arg(long, env = "TRACKVAULT_OPERATOR_ID")]
        caller: String,
        /// Account to change
        subject: String,
        /// New role (guest, member, creator, admin)
        role: Role,
    },
    /// Enable or disable an account in the store and the directory
    SetStatus {
        /// Account performing the change
        #[arg(long, env = "TRACKVAULT_OPERATOR_ID")]
        caller: String,
        /// Account to change
        subject: String,
        status: AccountStatus,
    },
    /// List transfer jobs in a status, oldest update first
    Transfers {
        /// Status to list (pending, processing, completed, failed)
        status: TransferStatus,
        /// Only jobs not updated for this many minutes
        #[arg(long)]
        stale_minutes: Option<i64>,
        /// Page size for each query
        #[arg(long, default_value = "50")]
        page_size: u32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AccountStatus {
    Enabled,
    Disabled,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackvault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(table) = cli.table {
        config.table_name = table;
    }

    let store = SdkStore::from_config(&config).await;
    let repo = Arc::new(DynamoDbRepository::new(store).with_page_limits(config.page_limits()));

    match cli.command {
        Command::SetRole {
            caller,
            subject,
            role,
        } => {
            let sync = synchronizer(&config, repo).await?;
            let outcome = sync.change_role(&caller, &subject, role).await?;
            report(&outcome);
        }
        Command::SetStatus {
            caller,
            subject,
            status,
        } => {
            let sync = synchronizer(&config, repo).await?;
            let disabled = matches!(status, AccountStatus::Disabled);
            let outcome = sync.set_disabled(&caller, &subject, disabled).await?;
            report(&outcome);
        }
        Command::Transfers {
            status,
            stale_minutes,
            page_size,
        } => {
            let cutoff = stale_minutes.map(|minutes| Utc::now() - Duration::minutes(minutes));
            let mut options = Some(ListOptions::new().with_limit(page_size));

            'pages: while let Some(current) = options.take() {
                let page = repo.list_transfers_by_status(status, &current).await?;
                for job in &page.items {
                    // Listed by last update, so everything after this is fresher.
                    if cutoff.is_some_and(|cutoff| job.updated_at > cutoff) {
                        break 'pages;
                    }
                    println!(
                        "{}\t{}\t{}\t{}",
                        job.id,
                        job.owner_id,
                        job.updated_at.to_rfc3339(),
                        job.file_name
                    );
                }
                options = current.next(&page);
            }
        }
    }

    Ok(())
}

async fn synchronizer(
    config: &Config,
    repo: Arc<DynamoDbRepository<SdkStore>>,
) -> Result<PrivilegeSynchronizer<DynamoDbRepository<SdkStore>, CognitoDirectory>> {
    let directory = CognitoDirectory::from_config(config)
        .await
        .context("COGNITO_USER_POOL_ID must be set to change privileged attributes")?;
    Ok(PrivilegeSynchronizer::new(repo, Arc::new(directory)))
}

fn report(outcome: &SyncOutcome) {
    let account = outcome.account();
    let state = if outcome.was_applied() {
        "updated"
    } else {
        "unchanged"
    };
    println!(
        "{} {state}: role={} disabled={}",
        account.id, account.role, account.disabled
    );
}
