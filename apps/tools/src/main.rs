use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{CommandName, Identity};
use storage::{CatalogStore, PanelRef, Storage};

#[derive(Parser, Debug)]
#[command(about = "Out-of-band maintenance for the command catalog")]
struct Cli {
    #[arg(long, env = "APP__DATABASE_URL", default_value = "sqlite://./data/catalog.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    AddAdmin {
        identity: i64,
    },
    RemoveAdmin {
        identity: i64,
    },
    ListAdmins,
    /// Without a response the entry is created as an empty panel.
    AddCommand {
        name: String,
        response: Option<String>,
    },
    Link {
        panel: String,
        child: String,
    },
    /// Removes the command and everything beneath it.
    Remove {
        name: String,
    },
    List,
}

fn command_name(raw: &str) -> Result<CommandName> {
    let bare = raw.strip_prefix('/').unwrap_or(raw);
    CommandName::new(bare).with_context(|| format!("invalid command name '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;

    match cli.command {
        Command::AddAdmin { identity } => {
            let added = storage.add_admin(Identity(identity)).await?;
            println!(
                "{} admin {identity}",
                if added { "added" } else { "already" }
            );
        }
        Command::RemoveAdmin { identity } => {
            let removed = storage.remove_admin(Identity(identity)).await?;
            println!(
                "{} admin {identity}",
                if removed { "removed" } else { "no such" }
            );
        }
        Command::ListAdmins => {
            for identity in storage.list_admins().await? {
                println!("{identity}");
            }
        }
        Command::AddCommand { name, response } => {
            let name = command_name(&name)?;
            let id = match response.as_deref() {
                Some(response) => storage.add_command(&name, response).await?,
                None => storage.add_panel(&name, None).await?,
            };
            println!("created {} id={id}", name.marked());
        }
        Command::Link { panel, child } => {
            let panel = command_name(&panel)?;
            let child = command_name(&child)?;
            storage.add_panel_link(PanelRef::Name(&panel), &child).await?;
            println!("linked {} under {}", child.marked(), panel.marked());
        }
        Command::Remove { name } => {
            let name = command_name(&name)?;
            for removed in storage.remove(&name).await? {
                println!("removed {}", removed.marked());
            }
        }
        Command::List => {
            for command in storage.list_all().await? {
                let children = storage.children_of(&command.name).await?;
                let response = command.response.as_deref().unwrap_or("-");
                if children.is_empty() {
                    println!("{}\t{response}", command.name.marked());
                } else {
                    let children: Vec<String> = children.iter().map(CommandName::marked).collect();
                    println!(
                        "{}\t{response}\t[{}]",
                        command.name.marked(),
                        children.join(" ")
                    );
                }
            }
        }
    }

    storage.close().await;
    Ok(())
}
