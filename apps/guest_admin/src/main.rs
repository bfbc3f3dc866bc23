use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use directory_core::{
    ControllerError, DirectorySnapshot, GuestCollection, GuestDeletionController,
    GuestDirectoryController, GuestFormController, HttpRecordStore, LoadOutcome, RecordStore,
};
use shared::domain::{Guest, GuestFields, GuestId};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(name = "guest_admin", about = "Manage guest records in the record store")]
struct Cli {
    /// Record store base URL; overrides config and environment.
    #[arg(long)]
    store_url: Option<String>,
    #[arg(long)]
    page_size: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one page of guests, newest first.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Filter the shown page by name or email.
        #[arg(long)]
        search: Option<String>,
        /// Print every guest instead of one page.
        #[arg(long, conflicts_with_all = ["page", "search"])]
        all: bool,
    },
    Add(FieldArgs),
    Edit {
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: Option<String>,
}

impl FieldArgs {
    /// Overlays the given flags on `base`; fields without a flag keep their value.
    fn apply(self, mut base: GuestFields) -> GuestFields {
        let overlays = [
            (self.first_name, &mut base.first_name),
            (self.last_name, &mut base.last_name),
            (self.email, &mut base.email),
            (self.phone, &mut base.phone),
            (self.address, &mut base.address),
            (self.date_of_birth, &mut base.date_of_birth),
        ];
        for (value, slot) in overlays {
            if let Some(value) = value {
                *slot = value;
            }
        }
        base
    }
}

struct Controllers {
    guests: GuestCollection,
    directory: Arc<GuestDirectoryController>,
    form: GuestFormController,
    deletion: GuestDeletionController,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings();
    if let Some(url) = cli.store_url {
        settings.store_url = url;
    }
    if let Some(page_size) = cli.page_size.filter(|size| *size > 0) {
        settings.page_size = page_size;
    }

    let store = HttpRecordStore::with_timeout(&settings.store_url, settings.request_timeout)?;
    store.set_auth_token(settings.auth_token.clone()).await;
    if let Some((identity, password)) = settings.admin_credentials() {
        store
            .authenticate_admin(identity, password)
            .await
            .map_err(|err| anyhow!("admin sign-in failed: {err}"))?;
    }

    let store: Arc<dyn RecordStore> = Arc::new(store);
    let guests = GuestCollection::new(store)
        .with_name(settings.collection.clone())
        .with_timeout(settings.request_timeout);
    let controllers = Controllers {
        directory: Arc::new(GuestDirectoryController::new(
            guests.clone(),
            settings.page_size,
        )),
        form: GuestFormController::new(guests.clone()),
        deletion: GuestDeletionController::new(guests.clone()),
        guests,
    };

    match cli.command {
        Command::List { all: true, .. } => list_all(&controllers).await,
        Command::List { page, search, .. } => list(&controllers, page, search).await,
        Command::Add(fields) => add(&controllers, fields).await,
        Command::Edit { id, fields } => edit(&controllers, GuestId::new(id), fields).await,
        Command::Delete { id, yes } => delete(&controllers, GuestId::new(id), yes).await,
    }
}

async fn list(c: &Controllers, page: u32, search: Option<String>) -> Result<()> {
    c.directory.load_page(1).await.map_err(user_facing)?;
    if page != 1 {
        let outcome = c.directory.go_to_page(page).await.map_err(user_facing)?;
        if outcome == LoadOutcome::OutOfRange {
            eprintln!("Page {page} does not exist; showing page 1.");
        }
    }
    if let Some(query) = search {
        c.directory.search(&query).await;
    }
    print_page(&c.directory.snapshot().await);
    Ok(())
}

async fn list_all(c: &Controllers) -> Result<()> {
    let guests = c
        .guests
        .all()
        .await
        .map_err(|err| user_facing(err.into()))?;
    print_guests(&guests);
    println!("{} guests", guests.len());
    Ok(())
}

async fn add(c: &Controllers, fields: FieldArgs) -> Result<()> {
    let mut events = c.form.subscribe_events();
    c.form.open(None).await;
    let saved = c
        .form
        .submit(fields.apply(GuestFields::default()))
        .await
        .map_err(user_facing)?;
    println!("Added guest {} ({})", saved.display_name(), saved.id);

    let event = events.recv().await.context("form closed without a completion event")?;
    c.directory.handle_event(event).await.map_err(user_facing)?;
    print_page(&c.directory.snapshot().await);
    Ok(())
}

async fn edit(c: &Controllers, id: GuestId, fields: FieldArgs) -> Result<()> {
    let mut events = c.form.subscribe_events();
    c.form.open_edit_by_id(&id).await.map_err(user_facing)?;
    let current = c
        .form
        .state()
        .await
        .fields()
        .cloned()
        .unwrap_or_default();
    let saved = c
        .form
        .submit(fields.apply(current))
        .await
        .map_err(user_facing)?;
    println!("Updated guest {} ({})", saved.display_name(), saved.id);

    let event = events.recv().await.context("form closed without a completion event")?;
    c.directory.handle_event(event).await.map_err(user_facing)?;
    print_page(&c.directory.snapshot().await);
    Ok(())
}

async fn delete(c: &Controllers, id: GuestId, yes: bool) -> Result<()> {
    let guest = c
        .guests
        .get(&id)
        .await
        .map_err(|err| user_facing(err.into()))?;
    let mut events = c.deletion.subscribe_events();
    c.deletion.request(&guest).await;

    if !yes && !confirm_on_stdin(&guest.display_name())? {
        c.deletion.cancel().await;
        println!("Cancelled.");
        return Ok(());
    }

    c.deletion.confirm().await.map_err(user_facing)?;
    println!("Deleted guest {} ({})", guest.display_name(), guest.id);

    let event = events.recv().await.context("deletion closed without a completion event")?;
    c.directory.handle_event(event).await.map_err(user_facing)?;
    print_page(&c.directory.snapshot().await);
    Ok(())
}

fn confirm_on_stdin(name: &str) -> Result<bool> {
    print!("Delete the guest {name}? This action cannot be undone. [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn user_facing(err: ControllerError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn print_guests(guests: &[Guest]) {
    if guests.is_empty() {
        println!("No guests found.");
    }
    for guest in guests {
        println!(
            "{:<16} {} - {}",
            guest.id.as_str(),
            guest.display_name(),
            guest.email
        );
    }
}

fn print_page(snapshot: &DirectorySnapshot) {
    print_guests(&snapshot.visible);
    let page = &snapshot.page;
    let mut footer = format!(
        "Page {} of {} ({} guests)",
        page.page_number,
        page.total_pages.max(1),
        page.total_items
    );
    if !snapshot.query.is_empty() {
        footer.push_str(&format!(
            ", {} matching \"{}\" on this page",
            snapshot.visible.len(),
            snapshot.query
        ));
    }
    println!("{footer}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_flags_overlay_existing_values() {
        let base = GuestFields::new("Ada", "Lovelace", "ada@example.com").with_phone("0711111111");
        let args = FieldArgs {
            email: Some("countess@example.com".into()),
            address: Some("12 St James's Square".into()),
            ..FieldArgs::default()
        };

        let merged = args.apply(base);

        assert_eq!(merged.first_name, "Ada");
        assert_eq!(merged.email, "countess@example.com");
        assert_eq!(merged.phone, "0711111111");
        assert_eq!(merged.address, "12 St James's Square");
    }

    #[test]
    fn cli_parses_edit_with_flattened_fields() {
        let cli = Cli::try_parse_from([
            "guest_admin",
            "--page-size",
            "5",
            "edit",
            "abc123",
            "--last-name",
            "Byron",
        ])
        .expect("parse");
        assert_eq!(cli.page_size, Some(5));
        match cli.command {
            Command::Edit { id, fields } => {
                assert_eq!(id, "abc123");
                assert_eq!(fields.last_name.as_deref(), Some("Byron"));
                assert_eq!(fields.first_name, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_list_all_and_rejects_it_with_a_page() {
        let cli = Cli::try_parse_from(["guest_admin", "list", "--all"]).expect("parse");
        assert!(matches!(cli.command, Command::List { all: true, page: 1, search: None }));

        assert!(Cli::try_parse_from(["guest_admin", "list", "--all", "--page", "2"]).is_err());
    }
}
