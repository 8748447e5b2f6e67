use super::DirArgs;
use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use tmpl_core::config::TemplatesConfig;
use tmpl_core::watch::{watch_directory, WatchEvent, WatchOptions};
use tokio::sync::broadcast::error::RecvError;

pub fn run(root: &Path, dirs: &DirArgs, interval_ms: Option<u64>, json: bool) -> anyhow::Result<()> {
    let config = TemplatesConfig::load(root).context("failed to load tmpl.yaml")?;
    let options = WatchOptions {
        compile: dirs.compile_options(root, &config),
        poll_interval: interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.watch.poll_interval()),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let handle = watch_directory(options.clone())
            .await
            .context("failed to start watcher")?;
        let initial = handle.initial();
        println!(
            "Compiled {} template(s), {} failed. Watching {} (Ctrl-C to stop)",
            initial.compiled,
            initial.failed,
            options.compile.input_dir.display()
        );

        let mut events = handle.subscribe();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(event) => report(&event, json)?,
                    Err(RecvError::Lagged(n)) => tracing::warn!("dropped {n} watch events"),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        handle.stop().await;
        anyhow::Ok(())
    })
}

fn report(event: &WatchEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        WatchEvent::Compiled { source, output } => {
            println!("compiled {} -> {}", source.display(), output.display())
        }
        WatchEvent::Removed { source, output } => {
            println!("removed {} ({} deleted)", source.display(), output.display())
        }
        WatchEvent::Failed { source, message } => {
            eprintln!("failed {}: {message}", source.display())
        }
    }
    Ok(())
}
