use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use ghusers::cache::{LocalStore, NoopStore, SqliteStore};
use ghusers::config::Config;
use ghusers::github::{GithubClient, User, UserDetail};
use ghusers::paging::{Page, Pager};
use ghusers::repository::Repository;
use ghusers::{logging, Fetched};

#[derive(Parser, Debug)]
#[command(name = "ghusers")]
#[command(about = "Browse GitHub users, with an offline-tolerant local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ghusers/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Bypass the local cache entirely
  #[arg(long, global = true)]
  no_cache: bool,

  /// Log to stderr at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List users, oldest account first
  Users {
    /// Start after this user id
    #[arg(long)]
    since: Option<u64>,

    /// How many pages to print
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Users per page (default from config)
    #[arg(long)]
    page_size: Option<usize>,

    /// One JSON object per line
    #[arg(long)]
    json: bool,
  },

  /// Show a single user's profile
  User {
    login: String,

    #[arg(long)]
    json: bool,
  },

  /// Manage the local cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Delete every cached user and profile
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log = logging::init(args.verbose)?;

  let config = Config::load(args.config.as_deref())?;
  let repo = Arc::new(build_repository(&config, args.no_cache)?);

  let outcome = match args.command {
    Command::Users {
      since,
      pages,
      page_size,
      json,
    } => {
      let page_size = page_size.unwrap_or(config.paging.page_size).max(1);
      list_users(&repo, since, pages, page_size, json).await
    }
    Command::User { login, json } => show_user(&repo, &login, json).await,
    Command::Cache {
      action: CacheAction::Clear,
    } => {
      repo.clear_cache().await?;
      println!("Cache cleared.");
      Ok(())
    }
  };

  // Let background cache writes land before the process exits.
  repo.flush().await;
  outcome
}

type App = Repository<GithubClient, dyn LocalStore>;

fn build_repository(config: &Config, no_cache: bool) -> Result<App> {
  let store: Arc<dyn LocalStore> = if no_cache || !config.cache.enabled {
    Arc::new(NoopStore)
  } else {
    match &config.cache.path {
      Some(path) => Arc::new(SqliteStore::open_at(path)?),
      None => Arc::new(SqliteStore::open()?),
    }
  };

  let token = Config::github_token();
  let client = GithubClient::new(&config.github, token.as_deref())?;

  Ok(Repository::new(client, store))
}

async fn list_users(
  repo: &Arc<App>,
  since: Option<u64>,
  pages: usize,
  page_size: usize,
  json: bool,
) -> Result<()> {
  let mut pager = Pager::new(Arc::clone(repo), page_size);
  let mut next = Some(pager.refresh(since).await);
  let mut printed = 0;

  while let Some(result) = next {
    let page = result?;
    print_page(&page, json)?;
    printed += 1;

    if printed >= pages {
      break;
    }
    next = pager.load_next().await;
  }

  if pager.is_exhausted() {
    eprintln!("-- end of list");
  }
  Ok(())
}

async fn show_user(repo: &App, login: &str, json: bool) -> Result<()> {
  let fetched = repo.detail(login).await?;
  print_offline_notice(&fetched);

  if json {
    println!("{}", serde_json::to_string_pretty(&fetched.data)?);
  } else {
    print_detail(&fetched.data);
  }
  Ok(())
}

fn print_page(page: &Page, json: bool) -> Result<()> {
  if page.is_offline() {
    match page.cached_at {
      Some(at) => eprintln!("(offline: cached users as of {})", at.format("%Y-%m-%d %H:%M UTC")),
      None => eprintln!("(offline: nothing cached from here on)"),
    }
  }

  for user in &page.items {
    if json {
      println!("{}", serde_json::to_string(user)?);
    } else {
      print_user(user);
    }
  }
  Ok(())
}

fn print_user(user: &User) {
  println!("{:>10}  {:<39}  {}", user.id, user.login, user.avatar_url);
}

fn print_detail(d: &UserDetail) {
  let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
  let count = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());

  println!("{} ({})", d.login, or_dash(&d.name));
  println!("  id:         {}", d.id);
  println!("  location:   {}", or_dash(&d.location));
  println!("  followers:  {}", d.followers);
  println!("  following:  {}", d.following);
  println!("  repos:      {}", count(d.public_repos));
  println!("  gists:      {}", count(d.public_gists));
  println!("  updated:    {}", or_dash(&d.updated_at));
  println!("  avatar:     {}", d.avatar_url);
  if let Some(bio) = &d.bio {
    println!();
    println!("  {}", bio);
  }
}

fn print_offline_notice<T>(fetched: &Fetched<T>) {
  if let (true, Some(at)) = (fetched.is_offline(), fetched.cached_at) {
    eprintln!("(offline: cached as of {})", at.format("%Y-%m-%d %H:%M UTC"));
  }
}
