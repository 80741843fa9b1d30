//! `quill`: a small command line front end over the messages data layer.
//!
//! ```text
//! quill add <text> <author> [--favorite]
//! quill list [--author NAME] [--favorites] [--sort COLUMN[:desc]]
//! quill favorite <id> [on|off]
//! quill edit <id> [--text TEXT] [--author NAME]
//! quill replace <id> <text> <author> [--favorite]
//! quill delete <id>
//! quill watch
//! ```
//!
//! The database path comes from `QUILL_DB` (default `quill.db`). Output is
//! JSON, one value per line.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use quill::core::validate_patch;
use quill::{
    Filter, MessageId, MessageList, MessagePatch, NewMessage, Provider, ProviderConfig, SortOrder,
    SqliteStore,
};
use serde_json::json;
use tracing::info;

const USAGE: &str = "\
usage: quill <command> [args]

commands:
  add <text> <author> [--favorite]
  list [--author NAME] [--favorites] [--sort COLUMN[:desc]]
  favorite <id> [on|off]
  edit <id> [--text TEXT] [--author NAME]
  replace <id> <text> <author> [--favorite]
  delete <id>
  watch";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=info,quill_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let db_path = std::env::var("QUILL_DB").unwrap_or_else(|_| "quill.db".into());
    let provider = Arc::new(
        Provider::open(&db_path, ProviderConfig::default())
            .with_context(|| format!("opening {}", db_path))?,
    );

    match command.as_str() {
        "add" => add(&provider, rest).await,
        "list" => list(&provider, rest).await,
        "favorite" => favorite(&provider, rest).await,
        "edit" => edit(&provider, rest).await,
        "replace" => replace(&provider, rest).await,
        "delete" => delete(&provider, rest).await,
        "watch" => watch(provider).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command `{}`\n\n{}", other, USAGE),
    }
}

async fn add(provider: &Provider<SqliteStore>, args: &[String]) -> anyhow::Result<()> {
    let (positional, favorite) = message_args(args);
    let &[text, author] = positional.as_slice() else {
        bail!("usage: quill add <text> <author> [--favorite]");
    };

    let address = provider.submit(text, author, favorite).await?;
    println!("{}", json!({ "address": address.to_string() }));
    Ok(())
}

async fn list(provider: &Provider<SqliteStore>, args: &[String]) -> anyhow::Result<()> {
    let mut filter = Filter::all();
    let mut sort: Option<SortOrder> = None;

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--author" => filter = filter.author(value(&mut args, "--author")?),
            "--favorites" => filter = filter.favorite(true),
            "--sort" => sort = Some(value(&mut args, "--sort")?.parse()?),
            other => bail!("unexpected argument `{}`", other),
        }
    }

    let rows = provider
        .query(provider.collection_address(), filter, sort)
        .await?;
    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

async fn favorite(provider: &Provider<SqliteStore>, args: &[String]) -> anyhow::Result<()> {
    let (id, rest) = id_arg(args)?;
    let on = match rest.first().map(String::as_str) {
        None | Some("on") => true,
        Some("off") => false,
        Some(other) => bail!("expected `on` or `off`, got `{}`", other),
    };
    let patch = MessagePatch::new().favorite(on);
    write_result(id, provider.update(&provider.item_address(id), patch).await?)
}

async fn edit(provider: &Provider<SqliteStore>, args: &[String]) -> anyhow::Result<()> {
    let (id, rest) = id_arg(args)?;

    let mut patch = MessagePatch::new();
    let mut args = rest.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--text" => patch = patch.text(value(&mut args, "--text")?),
            "--author" => patch = patch.author(value(&mut args, "--author")?),
            other => bail!("unexpected argument `{}`", other),
        }
    }
    if patch.is_empty() {
        bail!("nothing to edit; pass --text and/or --author");
    }

    let patch = validate_patch(patch)?;
    write_result(id, provider.update(&provider.item_address(id), patch).await?)
}

/// Overwrite every column of an existing message.
async fn replace(provider: &Provider<SqliteStore>, args: &[String]) -> anyhow::Result<()> {
    let (id, rest) = id_arg(args)?;
    let (positional, favorite) = message_args(rest);
    let &[text, author] = positional.as_slice() else {
        bail!("usage: quill replace <id> <text> <author> [--favorite]");
    };

    let message = NewMessage::from_form(text, author, favorite)?;
    let patch = MessagePatch::replace_all(&message);
    write_result(id, provider.update(&provider.item_address(id), patch).await?)
}

async fn delete(provider: &Provider<SqliteStore>, args: &[String]) -> anyhow::Result<()> {
    let (id, _) = id_arg(args)?;
    write_result(id, provider.delete(&provider.item_address(id)).await?)
}

async fn watch(provider: Arc<Provider<SqliteStore>>) -> anyhow::Result<()> {
    let list = MessageList::open(provider).await;
    let mut rx = list.watch();
    info!("watching for changes, Ctrl+C to stop");

    print_state(&list.snapshot())?;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    list.teardown().await;
    Ok(())
}

fn print_state(state: &quill::ListState) -> anyhow::Result<()> {
    let line = match state {
        quill::ListState::Loading => json!({ "state": "loading" }),
        quill::ListState::Ready(rows) => json!({ "state": "ready", "messages": &rows[..] }),
        quill::ListState::Failed { reason, stale } => {
            json!({ "state": "failed", "reason": reason, "messages": &stale[..] })
        }
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

/// Split `<text> <author> [--favorite]` style arguments.
fn message_args(args: &[String]) -> (Vec<&str>, bool) {
    let mut positional = Vec::new();
    let mut favorite = false;
    for arg in args {
        match arg.as_str() {
            "--favorite" => favorite = true,
            _ => positional.push(arg.as_str()),
        }
    }
    (positional, favorite)
}

fn id_arg(args: &[String]) -> anyhow::Result<(MessageId, &[String])> {
    let (first, rest) = args.split_first().ok_or_else(|| anyhow!("missing message id"))?;
    let id = first.parse::<MessageId>()?;
    Ok((id, rest))
}

fn value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<&'a str> {
    args.next()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

/// Zero rows means the id did not exist; report it as a failure.
fn write_result(id: MessageId, rows: u64) -> anyhow::Result<()> {
    if rows == 0 {
        bail!("no message with id {}", id);
    }
    println!("{}", json!({ "id": id, "rows": rows }));
    Ok(())
}
