//! `osckit send`

use anyhow::{Context, Result};
use colored::Colorize;
use osckit_core::{EncodingErrors, OscValue, Stats, TextCodec, TextEncoding};
use osckit_server::OscClient;

pub struct SendOptions {
    pub host: String,
    pub port: u16,
    pub encoding: TextEncoding,
    pub encoding_errors: EncodingErrors,
    pub repeat: u32,
}

/// Parse command-line values into OSC arguments
pub fn parse_values(raw: &[String]) -> Result<Vec<OscValue>> {
    raw.iter()
        .map(|s| OscValue::from_literal(s).with_context(|| format!("Invalid value: {}", s)))
        .collect()
}

pub async fn run(options: &SendOptions, address: &str, raw: &[String]) -> Result<()> {
    let values = parse_values(raw)?;
    let codec = TextCodec::new(options.encoding, options.encoding_errors);
    let client = OscClient::connect(&options.host, options.port, Some(codec))
        .await
        .with_context(|| format!("Failed to reach {}:{}", options.host, options.port))?;

    let mut stats = Stats::new();
    for _ in 0..options.repeat {
        stats += client.send_message(address, &values).await?;
    }

    println!(
        "{} {} -> {}",
        "Sent".green().bold(),
        address.yellow(),
        client.target()
    );
    println!("{}", stats);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        let raw: Vec<String> = ["1", "-1", "1.5", "True", "b'raw'", "hello"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            parse_values(&raw).unwrap(),
            vec![
                OscValue::Int(1),
                OscValue::Int(-1),
                OscValue::Float(1.5),
                OscValue::True,
                OscValue::String(b"raw".to_vec()),
                OscValue::Text("hello".to_string()),
            ]
        );
    }

    #[test]
    fn test_containers_rejected() {
        assert!(parse_values(&["[1, 2]".to_string()]).is_err());
    }
}
