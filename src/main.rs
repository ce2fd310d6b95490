mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use vf_av::ToolRegistry;
use vf_core::config::Config;
use vf_core::events::{EventBus, EventPayload};
use vf_core::Preset;
use vf_pipeline::{BackendSet, JobStatus, ResultAggregator, Scheduler};
use tokio::sync::{broadcast, oneshot};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "variantforge=debug,vf_pipeline=debug,vf_av=debug,vf_server=debug,tower_http=debug"
                .to_string()
        } else {
            "variantforge=info,vf_pipeline=info,vf_server=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config = Config::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(config, host, port))
        }
        Commands::Generate {
            inputs,
            preset,
            copies,
            backend,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(generate(config, &inputs, &preset, copies, backend, output))
        }
        Commands::ValidatePreset { file, strict } => validate_preset(&file, strict),
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(&config))
        }
        Commands::Version => {
            println!("variantforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn start_server(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    vf_server::start(config).await?;
    Ok(())
}

async fn generate(
    mut config: Config,
    inputs: &[PathBuf],
    preset_path: &Path,
    copies: u32,
    backend: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(kind) = backend {
        config.backend.video = kind.parse()?;
    }
    if let Some(dir) = output {
        config.queue.output_dir = dir;
    }
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let preset = Preset::load_snapshot(preset_path)?;
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let backends = BackendSet::from_config(&config, tools)?;
    let events = Arc::new(EventBus::default());
    let aggregator = Arc::new(ResultAggregator::new(events.clone()));
    let scheduler = Scheduler::new(config.queue.clone(), backends, aggregator.clone(), events);

    let ids = match inputs {
        [single] => vec![scheduler.enqueue(single, preset, copies)?],
        many => scheduler.enqueue_batch(many, preset, copies)?,
    };

    let mut rx = scheduler.subscribe();
    let (done_tx, mut done_rx) = oneshot::channel::<()>();
    let reporter = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => report(&event.payload),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("skipped {n} progress events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                _ = &mut done_rx => break,
            }
        }
        // The queue is idle; print whatever is still buffered.
        while let Ok(event) = rx.try_recv() {
            report(&event.payload);
        }
    });

    scheduler.process_queue().await;
    let _ = done_tx.send(());
    if let Err(e) = reporter.await {
        tracing::warn!("event reporter failed: {e}");
    }

    let mut failed = 0;
    for id in ids {
        let Some(job) = scheduler.job(id) else {
            continue;
        };
        match job.status {
            JobStatus::Completed => {
                println!("✓ {}", job.source.file_name);
                for artifact in job.results.unwrap_or_default() {
                    println!("    {} ({} bytes)", artifact.location.display(), artifact.size);
                }
            }
            _ => {
                failed += 1;
                println!(
                    "✗ {}: {}",
                    job.source.file_name,
                    job.error.as_deref().unwrap_or("not processed")
                );
            }
        }
    }
    println!("\n{} variants written", aggregator.len());

    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn report(payload: &EventPayload) {
    match payload {
        EventPayload::JobStarted { job_id } => println!("[{job_id}] started"),
        EventPayload::JobProgress {
            job_id, progress, ..
        } => println!("[{job_id}] {progress}%"),
        EventPayload::JobFailed { job_id, error } => println!("[{job_id}] failed: {error}"),
        _ => {}
    }
}

fn validate_preset(path: &Path, strict: bool) -> Result<()> {
    let mut preset = Preset::load_snapshot(path)?;
    if strict {
        preset.validate_strict()?;
    } else {
        for warning in preset.normalize()? {
            println!("! {warning}");
        }
    }
    println!("✓ Preset '{}' is valid ({})", preset.name(), preset.kind());
    Ok(())
}

async fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools);
    let infos = tools.check_all().await;
    let mut all_ok = true;

    for tool in &infos {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable local transcoding.");
    }
    Ok(())
}
