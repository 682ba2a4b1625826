use std::path::PathBuf;

use adtrack_rs::{ScreenerBuilder, ScreenerConfig};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cha_screen")]
#[command(about = "Screen a CHAT transcript for dementia markers")]
struct Args {
    /// Transcript file in CHAT (.cha) format.
    transcript: PathBuf,
    #[arg(long, env = "ADTRACK_MODEL", default_value = "models/hybrid/model.safetensors")]
    model: PathBuf,
    #[arg(
        long,
        env = "ADTRACK_MODEL_CONFIG",
        default_value = "models/hybrid/config.json"
    )]
    model_config: PathBuf,
    #[arg(
        long,
        env = "ADTRACK_TOKENIZER",
        default_value = "models/encoder/tokenizer.json"
    )]
    tokenizer: PathBuf,
    #[arg(
        long,
        env = "ADTRACK_ENCODER",
        default_value = "models/encoder/model.safetensors"
    )]
    encoder: PathBuf,
    #[arg(
        long,
        env = "ADTRACK_ENCODER_CONFIG",
        default_value = "models/encoder/config.json"
    )]
    encoder_config: PathBuf,
    #[arg(long, env = "ADTRACK_DEVICE", default_value = "cpu")]
    device: String,
    #[arg(long, env = "ADTRACK_THRESHOLD", default_value_t = ScreenerConfig::DEFAULT_THRESHOLD)]
    threshold: f32,
    #[arg(
        long,
        env = "ADTRACK_MAX_SESSION_LEN",
        default_value_t = ScreenerConfig::DEFAULT_MAX_SESSION_LEN
    )]
    max_session_len: usize,
    #[arg(
        long,
        env = "ADTRACK_MAX_TOKEN_LEN",
        default_value_t = ScreenerConfig::DEFAULT_MAX_TOKEN_LEN
    )]
    max_token_len: usize,
    /// Pretty-print the JSON result.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let config = ScreenerConfig {
        model_path: args.model.to_string_lossy().into_owned(),
        config_path: args.model_config.to_string_lossy().into_owned(),
        tokenizer_path: args.tokenizer.to_string_lossy().into_owned(),
        encoder_path: args.encoder.to_string_lossy().into_owned(),
        encoder_config_path: args.encoder_config.to_string_lossy().into_owned(),
        device: args.device,
        max_session_len: args.max_session_len,
        max_token_len: args.max_token_len,
        threshold: args.threshold,
    };

    let screener = ScreenerBuilder::new(config)
        .build()
        .map_err(|e| e.to_string())?;

    let filename = args
        .transcript
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.transcript.to_string_lossy().into_owned());
    let content = std::fs::read(&args.transcript)
        .map_err(|e| format!("read transcript {}: {e}", args.transcript.display()))?;

    let screening = screener
        .screen(&filename, &content)
        .map_err(|e| e.to_string())?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&screening)
    } else {
        serde_json::to_string(&screening)
    }
    .map_err(|e| format!("serialize screening: {e}"))?;
    println!("{rendered}");
    Ok(())
}
