use anyhow::{anyhow, Context};
use realcheck_lib::init_console_only_logging;
use realcheck_lib::services::config_store::{ConfigCommand, ConfigStore};
use realcheck_lib::services::detection::{
    media_type_for_extension, DetectionService, EngineOrchestrator,
};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin analyze_image -- <image> [--local-only] [--type <media/type>] [--out <json_path>]\n  cargo run --bin analyze_image -- --set-key <name> <value>\n  cargo run --bin analyze_image -- --delete-key <name>\n  cargo run --bin analyze_image -- --set-engine-url <engine_id> <url>\n\nNotes:\n  - `--local-only` skips remote engines and runs the metadata analyzer alone.\n  - The media type is taken from the file extension unless `--type` is given.\n  - Key names: sightengine_user, sightengine_secret, huggingface."
        );
        return Ok(());
    }

    if let Some(command) = ConfigCommand::parse(&args).map_err(anyhow::Error::msg)? {
        let dir = ConfigStore::default_config_dir()
            .ok_or_else(|| anyhow!("no config directory; set REALCHECK_CONFIG_DIR"))?;
        let store = ConfigStore::new(dir);
        store.apply(&command).map_err(anyhow::Error::msg)?;
        eprintln!("Updated: {}", store.config_file().display());
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    init_console_only_logging(env_filter);

    let path = args[1].clone();
    let local_only = has_flag(&args, "--local-only");
    let out_path = parse_arg_value(&args, "--out");

    let media_type = match parse_arg_value(&args, "--type") {
        Some(t) => t,
        None => Path::new(&path)
            .extension()
            .and_then(|ext| media_type_for_extension(&ext.to_string_lossy()))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot infer media type of {}; pass --type", path))?,
    };

    let bytes = std::fs::read(&path).with_context(|| format!("read file failed: {}", path))?;

    let config = ConfigStore::load_default().map_err(anyhow::Error::msg)?;
    let service = if local_only {
        DetectionService::new(
            EngineOrchestrator::local_only(config.detection.metadata.clone()),
            config.detection.max_upload_bytes,
            config.detection.ensemble.clone(),
        )
    } else {
        DetectionService::from_config(&config)
    };

    let response = service.detect(bytes, &media_type).await?;
    let json = serde_json::to_string_pretty(&response)?;

    match out_path {
        Some(out) => {
            std::fs::write(&out, &json).with_context(|| format!("write output failed: {}", out))?;
            eprintln!("Wrote: {}", out);
        }
        None => println!("{}", json),
    }

    eprintln!(
        "Verdict: {:?} (confidence {:.2}, {} of {} engines)",
        response.verdict,
        response.confidence,
        response.models_used,
        response.models.len()
    );

    Ok(())
}
