use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

mod app;
mod auth;
mod cli;
mod config;
mod eid;
mod items;
mod lock;
mod search;
mod semantic;
mod storage;
mod store;
#[cfg(test)]
mod tests;
mod web;

use app::{AppFactory, AppPaths};
use cli::Command;
use eid::Eid;
use items::{ItemCreate, ItemKind};
use lock::DataLock;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let paths = AppPaths::from_env()?;
    let config = AppFactory::create_config(&paths)?;

    match args.command {
        Command::Serve { listen } => {
            let _lock = DataLock::try_acquire(&paths.base_path)?;
            let addr: SocketAddr = listen
                .unwrap_or_else(|| config.listen_addr.clone())
                .parse()
                .context("invalid listen address")?;
            let library = AppFactory::create_library(&paths, config)?;
            let auth_token = std::env::var("SHELF_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty());

            web::start_daemon(library, addr, auth_token)
        }

        Command::Search {
            query,
            workspace,
            message,
        } => {
            let library = AppFactory::create_library(&paths, config)?;
            let outcome = runtime()?.block_on(library.search(&query, workspace.as_deref()))?;

            if message {
                println!("{}", outcome.message);
            } else {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            Ok(())
        }

        Command::Add {
            workspace,
            title,
            url,
            content,
            description,
            kind,
            category,
            tags,
        } => {
            let _lock = DataLock::try_acquire(&paths.base_path)?;
            let library = AppFactory::create_library(&paths, config)?;

            let kind = kind.map(|k| k.parse::<ItemKind>()).transpose()?;
            let mut create = ItemCreate {
                workspace_id: Eid::from(workspace),
                kind,
                category_id: category.map(Eid::from),
                title: title.unwrap_or_default(),
                content,
                url,
                tags: tags.as_deref().map(cli::parse_tags).unwrap_or_default(),
                ..Default::default()
            };
            create.site.description = description;

            let item = runtime()?.block_on(library.add_item(create))?;
            println!("{}", serde_json::to_string_pretty(&item)?);
            Ok(())
        }

        Command::Trash { id } => {
            let _lock = DataLock::try_acquire(&paths.base_path)?;
            let library = AppFactory::create_library(&paths, config)?;

            let item = library.trash_item(id)?;
            println!("{}", serde_json::to_string_pretty(&item)?);
            Ok(())
        }

        Command::Tags { workspace } => {
            let library = AppFactory::create_library(&paths, config)?;

            for tag in library.tags(&workspace)? {
                println!("{}\t{}", tag.count, tag.name);
            }
            Ok(())
        }
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
