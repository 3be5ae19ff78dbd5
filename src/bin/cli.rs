use anyhow::{anyhow, bail, Context, Result};
use record_webcam::{init_logging, Platform, RecordWebcam, RecordWebcamConfig};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const USAGE: &str = "Usage: record-webcam-cli <command> [args]

Commands:
  list-devices [--json]
  record [<video_id> <audio_id>] [--seconds <n>] [--out <dir>] [--json]
  config [<path>]";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "list-devices" => cmd_list_devices(&args).await,
        "record" => cmd_record(&args).await,
        "config" => cmd_config(&args),
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

async fn cmd_list_devices(args: &[String]) -> Result<()> {
    let webcam = RecordWebcam::new(Platform::synthetic(), RecordWebcamConfig::load_or_default()).await?;
    let devices = webcam.devices();
    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(devices)?);
    } else {
        let defaults = devices.defaults();
        for d in &devices.by_type().video {
            let marker = if d.device_id == defaults.video.device_id { "*" } else { " " };
            println!("{} video {}: {}", marker, d.device_id, d.label);
        }
        for d in &devices.by_type().audio {
            let marker = if d.device_id == defaults.audio.device_id { "*" } else { " " };
            println!("{} audio {}: {}", marker, d.device_id, d.label);
        }
    }
    Ok(())
}

async fn cmd_record(args: &[String]) -> Result<()> {
    // Parse args: record [<video_id> <audio_id>] [--seconds <n>] [--out <dir>] [--json]
    let mut video_id = None;
    let mut audio_id = None;
    let mut seconds: Option<u64> = None;
    let mut out_dir = PathBuf::from(".");
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--seconds" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--seconds needs a value"))?;
                seconds = Some(value.parse().context("--seconds must be a whole number")?);
            }
            "--out" => {
                i += 1;
                out_dir = PathBuf::from(args.get(i).ok_or_else(|| anyhow!("--out needs a value"))?);
            }
            "--json" => json = true,
            other => {
                if video_id.is_none() {
                    video_id = Some(other.to_string());
                } else if audio_id.is_none() {
                    audio_id = Some(other.to_string());
                } else {
                    bail!("Unexpected argument: {}", other);
                }
            }
        }
        i += 1;
    }

    let webcam = RecordWebcam::new(Platform::synthetic(), RecordWebcamConfig::load_or_default()).await?;
    let session = webcam.create_recording(video_id.as_deref(), audio_id.as_deref())?;
    let id = session.id.clone();

    webcam.open_camera(&id).await?;
    webcam.start_recording(&id).await?;

    match seconds {
        Some(n) => {
            if !json {
                println!("Recording {} for {}s...", id, n);
            }
            tokio::time::sleep(Duration::from_secs(n)).await;
        }
        None => {
            if !json {
                println!("Recording {}, press Ctrl-C to stop...", id);
            }
            let interrupted = Arc::new(Notify::new());
            let handler = interrupted.clone();
            ctrlc::set_handler(move || handler.notify_one())
                .context("failed to install Ctrl-C handler")?;
            interrupted.notified().await;
        }
    }

    let stopped = webcam.stop_recording(&id).await?;
    let download = webcam.download(&id)?;
    let path = out_dir.join(&download.file_name);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    std::fs::write(&path, download.blob.data())
        .with_context(|| format!("failed to write {}", path.display()))?;

    webcam.close_camera(&id).await?;
    webcam.teardown().await;

    if json {
        println!("{}", serde_json::to_string(&*stopped)?);
    } else {
        let stats = stopped.stats.clone().unwrap_or_default();
        println!(
            "Saved {} ({} bytes, {} chunks, {:.1}s)",
            path.display(),
            download.blob.size(),
            stats.chunks,
            stats.duration_secs
        );
    }
    Ok(())
}

fn cmd_config(args: &[String]) -> Result<()> {
    let config = match args.get(2) {
        Some(path) => RecordWebcamConfig::load_layered(path)?,
        None => RecordWebcamConfig::load_or_default(),
    };
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
