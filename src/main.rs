//! CLI entry point for inkpress

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inkpress::Site;

#[derive(Parser)]
#[command(name = "inkpress", version)]
#[command(about = "A static blog generator with built-in content-integrity checks")]
struct Args {
    /// Base directory of the site (defaults to the current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Verbose debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new site
    Init {
        /// Directory to create the site in (defaults to here)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a post, page, or draft from a scaffold
    New {
        /// Scaffold layout (post, page, draft)
        #[arg(short, long, default_value = "post")]
        layout: String,

        /// Title of the new document
        title: String,

        /// Filename for the new post (without extension)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Build the site into the public directory
    #[command(alias = "g")]
    Generate {
        /// Keep watching for file changes after generating
        #[arg(short, long)]
        watch: bool,

        /// Regenerate everything, ignoring the cache
        #[arg(short, long)]
        force: bool,
    },

    /// Start a local server with live reload
    #[command(alias = "s")]
    Server {
        /// Port to serve on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Address to bind
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Serve without watching for changes
        #[arg(long)]
        r#static: bool,
    },

    /// Check content integrity (front matter, routes, links)
    Check,

    /// Delete the public folder and cache
    Clean,

    /// List site content
    List {
        /// Type of content to list (post, page, tag)
        #[arg(default_value = "post")]
        r#type: String,
    },
}

fn init_tracing(debug: bool) {
    let default_directive = if debug {
        "inkpress=debug,info"
    } else {
        "inkpress=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let base_dir = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match args.command {
        Command::Init { folder } => {
            let target = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            inkpress::commands::init::init_site(&target)?;
            println!("Initialized empty site in {:?}", target);
        }

        Command::New {
            layout,
            title,
            path,
        } => {
            let site = Site::open(&base_dir)?;
            inkpress::commands::new::create_post(&site, &title, &layout, path.as_deref())?;
        }

        Command::Generate { watch, force } => {
            let site = Site::open(&base_dir)?;
            inkpress::commands::generate::run_with_options(&site, force)?;
            println!("Generated successfully!");

            if watch {
                inkpress::commands::generate::watch(&site).await?;
            }
        }

        Command::Server {
            port,
            ip,
            r#static,
        } => {
            let site = Site::open(&base_dir)?;
            site.generate()?;
            inkpress::server::start(&site, &ip, port, !r#static).await?;
        }

        Command::Check => {
            let site = Site::open(&base_dir)?;
            let report = inkpress::commands::check::run(&site)?;
            if report.has_errors() {
                std::process::exit(1);
            }
        }

        Command::Clean => {
            let site = Site::open(&base_dir)?;
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Command::List { r#type } => {
            let site = Site::open(&base_dir)?;
            inkpress::commands::list::run(&site, &r#type)?;
        }
    }

    Ok(())
}
