use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

mod app;
mod ui;

use app::{App, AppEvent};
use dishdeck::api::{ApiClient, Dish, TagId};
use dishdeck::config::Config;
use dishdeck::feed::{FeedController, PageFetched};
use dishdeck::query::QueryResult;
use dishdeck::storage::{Database, DatabaseError, PositionStore};
use dishdeck::util::sanitize;

/// `~/.config/dishdeck`, holding `config.toml` and `state.db`.
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".config/dishdeck"))
}

/// Limit the state directory to the current user. Failure is only logged.
#[cfg(unix)]
fn restrict_dir(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
        tracing::warn!(path = %dir.display(), error = %e, "Could not restrict config directory to 0700");
    }
}

#[cfg(not(unix))]
fn restrict_dir(_dir: &Path) {}

#[derive(Parser, Debug)]
#[command(name = "dishdeck", about = "Browse recipes one dish at a time, by tag")]
struct Args {
    /// Reset saved positions (delete and recreate the state database)
    #[arg(long)]
    reset_db: bool,

    /// Open this tag instead of the one used last
    #[arg(long, value_name = "ID")]
    tag: Option<TagId>,

    /// Print a single dish and exit
    #[arg(long, value_name = "ID")]
    dish: Option<i64>,

    /// Scale ingredient amounts for `--dish` by this many servings
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(app::MAX_SERVINGS))
    )]
    servings: u32,
}

/// Plain-text rendering of a dish for `--dish`.
fn dish_text(dish: &Dish, servings: u32) -> String {
    let mut out = String::new();
    out.push_str(&sanitize(&dish.name));
    out.push('\n');
    if let Some(image) = &dish.image {
        out.push_str(&format!("Image: {}\n", sanitize(image)));
    }
    if !dish.tags.is_empty() {
        let names: Vec<&str> = dish.tags.iter().map(|t| t.name.as_str()).collect();
        out.push_str(&format!("Tags: {}\n", sanitize(&names.join(", "))));
    }
    match servings {
        1 => out.push_str("\nIngredients\n"),
        n => out.push_str(&format!("\nIngredients (x{n})\n")),
    }
    for ingredient in &dish.ingredients {
        let line = ingredient.display(f64::from(servings));
        out.push_str(&format!("  - {}\n", sanitize(&line)));
    }
    if let Some(recipe) = &dish.recipe {
        out.push_str("\nRecipe\n");
        out.push_str(&sanitize(recipe));
        out.push('\n');
    }
    out
}

/// Outcome of `--dish`, chosen by the query status of the fetch.
enum FoundDish {
    Card(String),
    Failed(String),
}

async fn print_dish(api: &ApiClient, id: i64, servings: u32) -> Result<()> {
    let result = api.dish(id).await;

    let card = result
        .as_ref()
        .map(|dish| dish_text(dish, servings))
        .unwrap_or_default();
    let error = result
        .as_ref()
        .err()
        .map(|e| format!("Error: could not load dish {}: {}", id, e))
        .unwrap_or_default();

    match QueryResult::create(&result)
        .on_success(FoundDish::Card(card))
        .on_error(FoundDish::Failed(error))
        .build()
    {
        Some(FoundDish::Card(text)) => {
            print!("{}", text);
            Ok(())
        }
        Some(FoundDish::Failed(msg)) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    restrict_dir(&config_dir);

    let config =
        Config::load(&config_dir.join("config.toml")).context("Failed to load config.toml")?;
    let api = ApiClient::new(&config).context("Failed to set up the API client")?;

    if let Some(id) = args.dish {
        return print_dish(&api, id, args.servings).await;
    }

    let db_path = config_dir.join("state.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Saved positions reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => Some(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of dishdeck appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            // Browsing works without position memory
            tracing::warn!(error = %e, "Failed to open state database");
            eprintln!("Warning: saved positions unavailable ({})", e);
            None
        }
    };
    let positions = match &db {
        Some(db) => PositionStore::load(db).await,
        None => PositionStore::unavailable(),
    };

    let initial_tag = args
        .tag
        .or_else(|| positions.last_tag())
        .or(config.default_tag);

    let (feed_tx, feed_rx) = mpsc::channel::<PageFetched<Dish>>(32);
    let mut feed = FeedController::new(api.clone(), positions, feed_tx);
    if let Some(tag) = initial_tag {
        feed.activate(tag);
    }

    let mut app = App::new(feed);
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    let result = ui::run(&mut app, api, event_tx, event_rx, feed_rx).await;

    app.shutdown().await;
    if let Some(db) = db {
        db.close().await;
    }

    result
}
