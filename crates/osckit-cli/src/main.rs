//! osckit CLI - send and dump Open Sound Control messages

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use osckit_core::{EncodingErrors, TextEncoding};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod dump;
mod send;

/// osckit - Open Sound Control tools
#[derive(Parser, Debug)]
#[command(name = "osckit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a message to a server
    Send {
        /// Host (ip or name) to send the message to
        #[arg(short = 'H', long, default_value = "localhost")]
        host: String,

        /// Port to send the message to
        #[arg(short = 'P', long, default_value = "8000")]
        port: u16,

        /// How to encode strings
        #[arg(short, long, default_value = "utf-8")]
        encoding: TextEncoding,

        /// How to treat string encoding issues (strict, ignore, replace)
        #[arg(short = 'E', long, default_value = "replace")]
        encoding_errors: EncodingErrors,

        /// How many times to send the message
        #[arg(short, long, default_value = "1")]
        repeat: u32,

        /// OSC address to send the message to
        address: String,

        /// Message values: integers, decimals, True/False/None, b'raw' or text
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Listen for messages and print them
    Dump {
        /// Host (ip or name) to listen on
        #[arg(short = 'H', long, default_value = "localhost")]
        host: String,

        /// Port to listen on
        #[arg(short = 'P', long, default_value = "8000")]
        port: u16,

        /// How to decode strings [default: utf-8]
        #[arg(short, long)]
        encoding: Option<TextEncoding>,

        /// How to treat string decoding issues [default: replace]
        #[arg(short = 'E', long)]
        encoding_errors: Option<EncodingErrors>,

        /// Server configuration file (TOML)
        #[arg(short, long, env = "OSCKIT_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Send {
            host,
            port,
            encoding,
            encoding_errors,
            repeat,
            address,
            values,
        } => {
            let options = send::SendOptions {
                host,
                port,
                encoding,
                encoding_errors,
                repeat,
            };
            send::run(&options, &address, &values).await?;
        }

        Commands::Dump {
            host,
            port,
            encoding,
            encoding_errors,
            config,
        } => {
            let config = dump::load_config(config.as_deref(), encoding, encoding_errors)?;
            let server = dump::start(&host, port, config).await?;

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for ctrl+c")?;
            info!("Received shutdown signal");
            server.terminate();
            server.join(None).await;
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}
