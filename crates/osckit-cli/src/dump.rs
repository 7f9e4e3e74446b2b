//! `osckit dump`

use anyhow::{Context, Result};
use colored::Colorize;
use osckit_core::{EncodingErrors, OscValue, TextEncoding};
use osckit_server::{Callback, OscServer, ServerConfig};
use std::path::Path;

/// Server configuration from an optional file, with flags on top
///
/// Without a file, strings are decoded as UTF-8 with replacement.
pub fn load_config(
    path: Option<&Path>,
    encoding: Option<TextEncoding>,
    encoding_errors: Option<EncodingErrors>,
) -> Result<ServerConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => ServerConfig {
            encoding: Some(TextEncoding::Utf8),
            encoding_errors: EncodingErrors::Replace,
            ..Default::default()
        },
    };

    if encoding.is_some() {
        config.encoding = encoding;
    }
    if let Some(errors) = encoding_errors {
        config.encoding_errors = errors;
    }
    Ok(config)
}

/// One line per message: `address: v1, v2, ...`
pub fn format_line(address: &[u8], values: &[OscValue]) -> String {
    let values: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("{}: {}", String::from_utf8_lossy(address), values.join(", "))
}

/// Listen on `host:port` and print everything that arrives
pub async fn start(host: &str, port: u16, config: ServerConfig) -> Result<OscServer> {
    let server = OscServer::new(config);
    server
        .listen(host, port, true)
        .await
        .with_context(|| format!("Failed to listen on {}:{}", host, port))?;

    server.set_default_handler(Some(Callback::new(|request| {
        let address = request.address().unwrap_or_default();
        println!("{}", format_line(address, request.values()));
        Ok(())
    })));
    server.start()?;

    println!(
        "{} Dumping OSC messages on {}",
        "osckit".cyan().bold(),
        server.local_addr(None)?
    );
    Ok(server)
}
