use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blobstore_core::OpContext;

mod commands;

use commands::{OutputFormat, StoreArgs};

#[derive(Parser)]
#[command(name = "blobstore")]
#[command(about = "Read, write and list objects in any supported blob store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage URL (s3://bucket, azure://container@account, kvpbase://host/user/container,
    /// komodo://host/index, file:///path, memory://)
    #[arg(short, long, global = true, conflicts_with = "config")]
    store: Option<String>,

    /// Path to a YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Download an object
    Get {
        /// Object key
        key: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload an object
    Put {
        /// Object key
        key: String,

        /// Upload the contents of this file
        #[arg(short, long, conflicts_with = "data", required_unless_present = "data")]
        file: Option<PathBuf>,

        /// Upload this string
        #[arg(short, long)]
        data: Option<String>,

        /// Content type stored with the object
        #[arg(short = 't', long, default_value = blobstore_core::DEFAULT_CONTENT_TYPE)]
        content_type: String,
    },

    /// Delete an object (succeeds if it does not exist)
    Delete {
        /// Object key
        key: String,
    },

    /// Check whether an object exists
    Exists {
        /// Object key
        key: String,
    },

    /// Show an object's metadata
    Head {
        /// Object key
        key: String,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List objects
    List {
        /// Only list keys starting with this string
        #[arg(short, long)]
        prefix: Option<String>,

        /// Continue from a previous page's token
        #[arg(long)]
        token: Option<String>,

        /// Follow continuation tokens until the listing is exhausted
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print an object's public URL
    Url {
        /// Object key
        key: String,
    },

    /// Delete every object in the store
    Empty {
        /// Confirm deletion of everything
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let store = StoreArgs {
        url: cli.store,
        config: cli.config,
    };

    // Ctrl-C cancels whatever operation is in flight
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });
    let ctx = OpContext::with_cancellation(token);

    match cli.command {
        Commands::Get { key, output } => {
            commands::object::get(&store, &key, output.as_deref(), &ctx).await?;
        }
        Commands::Put {
            key,
            file,
            data,
            content_type,
        } => {
            commands::object::put(
                &store,
                &key,
                file.as_deref(),
                data,
                &content_type,
                &ctx,
            )
            .await?;
        }
        Commands::Delete { key } => {
            commands::object::delete(&store, &key, &ctx).await?;
        }
        Commands::Exists { key } => {
            commands::object::exists(&store, &key, &ctx).await?;
        }
        Commands::Head { key, format } => {
            commands::object::head(&store, &key, OutputFormat::from_str(&format), &ctx).await?;
        }
        Commands::List {
            prefix,
            token,
            all,
            format,
        } => {
            commands::list::run(
                &store,
                prefix.as_deref(),
                token.as_deref(),
                all,
                OutputFormat::from_str(&format),
                &ctx,
            )
            .await?;
        }
        Commands::Url { key } => {
            commands::object::url(&store, &key)?;
        }
        Commands::Empty { yes } => {
            commands::empty::run(&store, yes, &ctx).await?;
        }
    }

    Ok(())
}
