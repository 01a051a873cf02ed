use std::{io::Write, process::ExitCode, sync::Arc};

use api_types::group_donation::ExceedsMaxDistributable;
use clap::{Args, Parser, Subcommand};
use engine::{
    DonationNew, Donor, Engine, EngineError, GroupCriterion, GroupDonationNew, GroupPreviewCmd,
    MoneyCents, NoopPreviewCache,
};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use error::AppError;

mod error;
mod settings;
mod views;

#[derive(Parser, Debug)]
#[command(name = "allotment")]
#[command(about = "Donations to recipients and groups of recipients, capped at their goals")]
struct Cli {
    /// Settings file, without extension.
    #[arg(long, default_value = "settings")]
    config: String,

    /// Database connection string (also read from `DATABASE_URL`). Overrides
    /// the settings file.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    Organization(Organization),
    Campaign(Campaign),
    Recipient(Recipient),
    /// Donate to a single recipient.
    Donate(DonateArgs),
    Donations(Donations),
    Group(Group),
}

#[derive(Args, Debug)]
struct Organization {
    #[command(subcommand)]
    command: OrganizationCommand,
}

#[derive(Subcommand, Debug)]
enum OrganizationCommand {
    Add {
        #[arg(long)]
        name: String,
    },
}

#[derive(Args, Debug)]
struct Campaign {
    #[command(subcommand)]
    command: CampaignCommand,
}

#[derive(Subcommand, Debug)]
enum CampaignCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Goal of every enrolled recipient, e.g. `1500.00`.
        #[arg(long)]
        goal: Option<MoneyCents>,
    },
}

#[derive(Args, Debug)]
struct Recipient {
    #[command(subcommand)]
    command: RecipientCommand,
}

#[derive(Subcommand, Debug)]
enum RecipientCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Organization name.
        #[arg(long)]
        organization: Option<String>,
        /// Campaign name.
        #[arg(long)]
        campaign: Option<String>,
    },
    Show {
        id: Uuid,
    },
    /// Recipients still raising first, by progress.
    List,
}

#[derive(Args, Debug)]
struct DonorArgs {
    #[arg(long)]
    donor_name: Option<String>,
    #[arg(long)]
    donor_email: Option<String>,
    #[arg(long)]
    donor_phone: Option<String>,
    #[arg(long)]
    note: Option<String>,
}

impl DonorArgs {
    fn donor(&self) -> Donor {
        Donor {
            name: self.donor_name.clone(),
            email: self.donor_email.clone(),
            phone: self.donor_phone.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct DonateArgs {
    #[arg(long)]
    recipient: Uuid,
    #[arg(long)]
    amount: MoneyCents,
    #[command(flatten)]
    donor: DonorArgs,
}

#[derive(Args, Debug)]
struct Donations {
    #[command(subcommand)]
    command: DonationsCommand,
}

#[derive(Subcommand, Debug)]
enum DonationsCommand {
    /// Newest first.
    List {
        #[arg(long)]
        recipient: Option<Uuid>,
    },
}

#[derive(Args, Debug)]
struct GroupArgs {
    /// `all`, `organization` or `campaign` (`university` and `trip` also work).
    #[arg(long, default_value = "all")]
    group_type: String,
    /// Exact organization or campaign name.
    #[arg(long)]
    group_value: Option<String>,
}

impl GroupArgs {
    fn criterion(&self) -> GroupCriterion {
        GroupCriterion::from_parts(&self.group_type, self.group_value.as_deref())
    }
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// Show how a group donation would be split.
    Preview {
        #[command(flatten)]
        group: GroupArgs,
        #[arg(long)]
        amount: MoneyCents,
        #[arg(long)]
        bias_factor: Option<Decimal>,
    },
    /// Split a donation among the group and record it.
    Commit {
        #[command(flatten)]
        group: GroupArgs,
        #[arg(long)]
        amount: MoneyCents,
        #[arg(long)]
        bias_factor: Option<Decimal>,
        #[command(flatten)]
        donor: DonorArgs,
    },
    /// Largest amount the group can absorb.
    Max {
        #[command(flatten)]
        group: GroupArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            if let AppError::Engine(EngineError::ExceedsMaxDistributable { requested, max }) = &err {
                let body = ExceedsMaxDistributable {
                    error: err.to_string(),
                    requested_minor: requested.cents(),
                    max_distributable_minor: max.cents(),
                };
                if let Err(write_err) = print_json(&body) {
                    eprintln!("{err} ({write_err})");
                }
            } else {
                eprintln!("{err}");
            }
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "allotment={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = sea_orm::Database::connect(url).await?;
    Migrator::up(&db, None).await?;

    let allocation = &settings.allocation;
    let engine = Engine::builder()
        .database(db)
        .epsilon(allocation.epsilon)
        // One command per process: a preview cache would never be hit.
        .preview_cache(Arc::new(NoopPreviewCache))
        .build()
        .await?;
    let default_bias = allocation.default_bias_factor;

    match cli.command {
        Command::Migrate => {
            tracing::info!("migrations applied");
        }
        Command::Organization(Organization {
            command: OrganizationCommand::Add { name },
        }) => {
            let id = engine.new_organization(&name).await?;
            print_json(&serde_json::json!({ "id": id, "name": name.trim() }))?;
        }
        Command::Campaign(Campaign {
            command: CampaignCommand::Add { name, goal },
        }) => {
            let id = engine.new_campaign(&name, goal).await?;
            print_json(&serde_json::json!({
                "id": id,
                "name": name.trim(),
                "goal_minor": goal.map(MoneyCents::cents),
            }))?;
        }
        Command::Recipient(Recipient { command }) => match command {
            RecipientCommand::Add {
                name,
                organization,
                campaign,
            } => {
                let organization_id = match organization {
                    Some(name) => Some(engine.organization_by_name(&name).await?.id),
                    None => None,
                };
                let campaign_id = match campaign {
                    Some(name) => Some(engine.campaign_by_name(&name).await?.id),
                    None => None,
                };
                let id = engine
                    .new_recipient(&name, organization_id, campaign_id)
                    .await?;
                print_json(&views::recipient(&engine.recipient(id).await?))?;
            }
            RecipientCommand::Show { id } => {
                print_json(&views::recipient(&engine.recipient(id).await?))?;
            }
            RecipientCommand::List => {
                let list: Vec<_> = engine
                    .list_recipients()
                    .await?
                    .iter()
                    .map(views::recipient)
                    .collect();
                print_json(&list)?;
            }
        },
        Command::Donate(args) => {
            let mut cmd = DonationNew::new(args.recipient, args.amount).donor(args.donor.donor());
            if let Some(note) = args.donor.note {
                cmd = cmd.note(note);
            }
            let donation = engine.donate(cmd).await?;
            print_json(&views::donation(&donation))?;
        }
        Command::Donations(Donations {
            command: DonationsCommand::List { recipient },
        }) => {
            let list: Vec<_> = engine
                .list_donations(recipient)
                .await?
                .iter()
                .map(views::donation)
                .collect();
            print_json(&list)?;
        }
        Command::Group(Group { command }) => match command {
            GroupCommand::Preview {
                group,
                amount,
                bias_factor,
            } => {
                let mut cmd = GroupPreviewCmd::new(group.criterion(), amount);
                if let Some(bias) = bias_factor.or(default_bias) {
                    cmd = cmd.bias_factor(bias);
                }
                let allocation = engine.preview_group_donation(cmd).await?;
                print_json(&views::preview(&allocation))?;
            }
            GroupCommand::Commit {
                group,
                amount,
                bias_factor,
                donor,
            } => {
                let mut cmd =
                    GroupDonationNew::new(group.criterion(), amount).donor(donor.donor());
                if let Some(bias) = bias_factor.or(default_bias) {
                    cmd = cmd.bias_factor(bias);
                }
                if let Some(note) = donor.note {
                    cmd = cmd.note(note);
                }
                let receipt = engine.group_donate(cmd).await?;
                print_json(&views::created(&receipt))?;
            }
            GroupCommand::Max { group } => {
                let max = engine.max_distributable(&group.criterion()).await?;
                print_json(&serde_json::json!({ "max_distributable_minor": max.cents() }))?;
            }
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
