use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use filesync_lib::cli::Cli;
use filesync_lib::logging::{LogConfig, SizeRotatingWriter};
use filesync_lib::{SyncEngine, SyncError, SyncEvent};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

/// 初始化日志系统：stderr 始终输出，指定目录时额外写入文件
fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::default().add_directive(config.tracing_level().into());

    let file_layer = match &config.log_dir {
        Some(dir) => {
            let writer = SizeRotatingWriter::new(dir, config.max_size_mb)
                .with_context(|| format!("无法创建日志文件: {}", dir.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
        }
        None => None,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let engine = SyncEngine::new(cli.sync_config());

    // 事件按处理顺序逐行打印到 stdout
    let (tx, mut rx) = mpsc::channel::<SyncEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", event);
        }
    });

    let result = engine.run(Some(tx)).await;
    printer.await?;
    let report = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            println!("{}", SyncError::Usage);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&cli.log_config()) {
        eprintln!("Warning: {:#}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("同步中止: {:#}", e);
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
