use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;

use invlens::cache::{DurableStore, SqliteStore, TwoLevelCache};
use invlens::config::Config;
use invlens::directory::{HttpDirectory, PersonSearch, ResultKind};
use invlens::inventory::{self, Asset};
use invlens::view::filter::TextOperator;
use invlens::view::{
  apply_filters, FilterCondition, GroupConfig, SortDirection, SortState, ViewMode, ViewPage,
  ViewRecord, ViewStateStore,
};

#[derive(Parser, Debug)]
#[command(name = "invlens")]
#[command(about = "Cached directory search and record views for inventory data")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/invlens/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Search people and groups
  Search {
    query: String,
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
    /// Restrict to result types (person, group)
    #[arg(short = 't', long = "type")]
    types: Vec<ResultKind>,
  },
  /// Look up one directory entry by id
  Get { id: String },
  /// Prefetch entries into the cache
  Warm {
    #[arg(required = true)]
    ids: Vec<String>,
  },
  /// Drop every cached directory entry
  Clear,
  /// Show a page of assets through a persisted view
  View(ViewArgs),
}

#[derive(clap::Args, Debug)]
struct ViewArgs {
  /// JSON file holding an array of assets
  assets: PathBuf,
  /// Key under which the view state is saved
  #[arg(long, default_value = "assets")]
  namespace: String,
  /// Text filter, `field=value`; replaces saved filters
  #[arg(long, value_parser = parse_contains)]
  contains: Vec<(String, String)>,
  #[arg(long)]
  group: Option<String>,
  #[arg(long)]
  sort: Option<String>,
  #[arg(long, requires = "sort")]
  desc: bool,
  #[arg(long)]
  page: Option<usize>,
  #[arg(long)]
  page_size: Option<usize>,
  #[arg(long)]
  mode: Option<ViewMode>,
  /// Forget the saved state before applying overrides
  #[arg(long)]
  reset: bool,
}

fn parse_contains(s: &str) -> std::result::Result<(String, String), String> {
  match s.split_once('=') {
    Some((field, value)) if !field.trim().is_empty() => {
      Ok((field.trim().to_string(), value.to_string()))
    }
    _ => Err(format!("expected field=value, got '{}'", s)),
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = invlens::logging::init(&invlens::logging::default_dir()?)?;

  let config = Config::load(args.config.as_deref())?;
  let store: Arc<dyn DurableStore> = Arc::new(SqliteStore::open(config.storage.path.as_deref())?);

  match args.command {
    Command::View(view) => run_view(view, store),
    command => run_directory(command, &config, store).await,
  }
}

async fn run_directory(command: Command, config: &Config, store: Arc<dyn DurableStore>) -> Result<()> {
  let cache = TwoLevelCache::new(store, config.cache.to_settings());
  let search = PersonSearch::new(HttpDirectory::new(config)?, cache);

  match command {
    Command::Search {
      query,
      limit,
      types,
    } => {
      let results = search.search(&query, limit, &types).await?;
      if results.is_empty() {
        println!("No results for '{}'", query.trim());
      }
      for result in results {
        let entry = result.data;
        println!(
          "{:<8} {:<24} {:<32} {}",
          entry.kind.as_str(),
          entry.id.as_deref().unwrap_or("-"),
          entry.display_name,
          entry.subtitle.as_deref().unwrap_or("")
        );
      }
    }
    Command::Get { id } => {
      let result = search.get_by_id(&id).await?;
      println!("{}", serde_json::to_string_pretty(&result.data)?);
      println!("{}", result.provenance());
    }
    Command::Warm { ids } => {
      let warmed = search.warm_cache(&ids).await;
      println!("Warmed {} of {} entries", warmed, ids.len());
    }
    Command::Clear => {
      search.clear_cache();
      println!("Directory cache cleared");
    }
    Command::View(_) => return Err(eyre!("view is not a directory command")),
  }

  Ok(())
}

fn run_view(args: ViewArgs, store: Arc<dyn DurableStore>) -> Result<()> {
  let assets: Vec<Asset> = inventory::load_json(&args.assets)?;
  let records = inventory::to_records(&assets);

  let states = ViewStateStore::new(store);
  if args.reset {
    states.reset(&args.namespace)?;
  }
  let mut state = states.load(&args.namespace);

  if !args.contains.is_empty() {
    state.set_filters(
      args
        .contains
        .into_iter()
        .map(|(field, value)| FilterCondition::Text {
          field,
          operator: TextOperator::Contains,
          value,
        })
        .collect(),
    );
  }
  if let Some(field) = args.group {
    state.set_group(Some(GroupConfig::by(field)));
  }
  if let Some(column) = args.sort {
    let direction = if args.desc {
      SortDirection::Desc
    } else {
      SortDirection::Asc
    };
    state.set_sort(Some(SortState { column, direction }));
  }
  if let Some(size) = args.page_size {
    state.set_page_size(size);
  }
  if let Some(page) = args.page {
    state.set_page(page);
  }
  if let Some(mode) = args.mode {
    state.set_mode(mode);
  }

  let now = Utc::now();
  let page = state.apply(&records, now);
  state.set_page(page.page);
  states.save(&args.namespace, &state)?;

  match state.mode() {
    ViewMode::Kanban => {
      let visible: Vec<ViewRecord> = apply_filters(&records, state.filters(), now)
        .into_iter()
        .cloned()
        .collect();
      print_board(&visible);
    }
    _ => print_page(&page),
  }

  Ok(())
}

fn print_row(record: &ViewRecord) {
  println!(
    "  {:<12} {:<32} {:<14} {}",
    record.id,
    record.title,
    record.status.as_deref().unwrap_or("-"),
    record.subtitle.as_deref().unwrap_or("")
  );
}

fn print_page(page: &ViewPage) {
  match &page.groups {
    Some(groups) => {
      for group in groups {
        println!("{} ({})", group.label, group.records.len());
        group.records.iter().for_each(print_row);
      }
    }
    None => page.records.iter().for_each(print_row),
  }
  println!(
    "page {}/{} ({} records)",
    page.page,
    page.total_pages,
    page.total
  );
}

fn print_board(records: &[ViewRecord]) {
  let board = inventory::asset_board(records);
  for column in board.columns() {
    println!("{} ({})", column.title, column.len());
    column.visible_records().iter().for_each(print_row);
    if column.has_more() {
      println!("  ... {} more", column.len() - column.visible_count());
    }
  }
}
