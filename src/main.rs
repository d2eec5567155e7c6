//! user-roster binary entry point.
//!
//! Loads configuration, initializes logging, opens the user store, runs one
//! command against it, and persists the store on the way out.
//!
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use user_roster::app::{App, AppConfig, config};
use user_roster::search::filter_users;

#[derive(Debug, Parser)]
#[command(name = "user-roster", version, about = "Create and list locally stored users")]
struct Cli {
    /// Configuration file (created with defaults if missing).
    #[arg(long, env = "USER_ROSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Settings file holding the user list; overrides the config file.
    #[arg(long, env = "USER_ROSTER_STORAGE")]
    storage: Option<PathBuf>,

    /// Keep everything in memory for this run.
    #[arg(long)]
    ephemeral: bool,

    /// Log filter directive; `RUST_LOG` takes precedence.
    #[arg(long, env = "USER_ROSTER_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List users in the order they were added.
    List {
        /// Only show users whose name, email or id contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a user.
    Add {
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Grant administrator rights.
        #[arg(long)]
        admin: bool,
        /// Do not write the store right after saving.
        #[arg(long)]
        no_persist: bool,
    },
    /// Show one user by id.
    Show { id: String },
    /// Remove one user by id.
    Remove { id: String },
    /// Delete the persisted user list.
    Clear,
}

fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> AppConfig {
    let path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = AppConfig::load_or_init(&path);
    if let Some(storage) = &cli.storage {
        cfg.storage_path = storage.clone();
    }
    if cli.ephemeral {
        cfg.ephemeral = true;
    }
    if let Some(level) = &cli.log_level {
        cfg.log_level = level.clone();
    }
    cfg
}

/// Program entry point: run one command, then persist as the app terminates.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli);
    init_logging(&cfg.log_level);

    // Clearing must leave the key absent, so skip the exit-time write.
    let persist_on_exit = !matches!(cli.command, Command::Clear);
    let mut app = App::open(cfg);
    let res = run(&mut app, cli.command);

    if persist_on_exit && !app.on_terminate().wait() {
        tracing::error!("final persist did not complete");
    }
    res
}

/// Text shown when `list` has nothing to print.
fn empty_list_message(query: &str) -> String {
    let q = query.trim();
    if q.is_empty() {
        "No users found. Run `user-roster add` to add a user.".to_string()
    } else {
        format!("No users match \"{q}\".")
    }
}

fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::List { search } => {
            let query = search.as_deref().unwrap_or("");
            let users = filter_users(app.store().users(), query);
            if users.is_empty() {
                println!("{}", empty_list_message(query));
            }
            for (i, u) in users.iter().enumerate() {
                println!("{:>3}. {:<20} {:<30} {:<13} {}", i + 1, u.username, u.email, u.role_label(), u.user_id);
            }
        }
        Command::Add { username, password, email, admin, no_persist } => {
            let persist = app.config.persist_on_save && !no_persist;
            let mut form = app.create_user_form();
            form.username = username;
            form.password = password;
            form.email = email;
            form.is_admin = admin;

            let errors: Rc<RefCell<Vec<String>>> = Rc::default();
            let sink = Rc::clone(&errors);
            form.errors().subscribe(move |batch: &Vec<String>| sink.borrow_mut().extend(batch.iter().cloned()));
            form.saved().subscribe(|_| println!("User successfully saved."));

            let saved = form.save(persist);
            if let Some(handle) = form.take_pending_persist() {
                handle.wait();
            }
            if let Some(id) = saved {
                println!("{id}");
            } else {
                for e in errors.borrow().iter() {
                    eprintln!("Error: {e}");
                }
                bail!("user not saved");
            }
        }
        Command::Show { id } => match app.store().fetch(&id) {
            Some(u) => {
                println!("id:       {}", u.user_id);
                println!("username: {}", u.username);
                println!("email:    {}", u.email);
                println!("role:     {}", u.role_label());
            }
            None => bail!("no user with id {id}"),
        },
        Command::Remove { id } => match app.store_mut().remove_by_id(&id) {
            Some(u) => println!("Removed {}", u.username),
            None => bail!("no user with id {id}"),
        },
        Command::Clear => {
            app.clear_local_storage().map_err(|e| anyhow::anyhow!(e))?;
            app.store_mut().load_users();
            println!("Local storage cleared.");
        }
    }
    Ok(())
}
