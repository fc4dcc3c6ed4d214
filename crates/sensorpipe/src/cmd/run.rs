use std::path::PathBuf;

use sensorpipe_decode::DecoderConfig;
use sensorpipe_pipeline::{
    from_fn, PipelineConfig, PipelineExecutor, PipelineRegistry, ReaderSource,
};

use crate::cmd::{check_chunk_size, parse_duration, RunArgs};
use crate::exit::{io_error, pipeline_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_records, print_statuses, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let chunk_size = check_chunk_size(args.chunk_size)?;
    if args.queue_capacity == 0 {
        return Err(CliError::new(USAGE, "queue capacity must be greater than zero"));
    }
    let pipeline = PipelineConfig {
        queue_capacity: args.queue_capacity,
        stage_timeout: parse_duration(&args.stage_timeout)?,
        join_timeout: parse_duration(&args.join_timeout)?,
    };
    let decoder = args.decoder.load()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(run_pipelines(
        args.files, decoder, pipeline, chunk_size, format,
    ))
}

async fn run_pipelines(
    files: Vec<PathBuf>,
    decoder: DecoderConfig,
    config: PipelineConfig,
    chunk_size: usize,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut registry = PipelineRegistry::new();

    for path in &files {
        let id = path.display().to_string();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|err| io_error(&format!("open {id}"), err))?;

        let source_id = id.clone();
        let emitter = from_fn("stdout", move |record| {
            print_records(std::slice::from_ref(&record), &source_id, format);
            Ok(None)
        });

        let pipeline = PipelineExecutor::from_config(
            id.clone(),
            ReaderSource::with_chunk_size(file, chunk_size),
            decoder.clone(),
            config,
        )
        .map_err(|err| pipeline_error("pipeline setup failed", err))?
        .with_emitter(emitter);

        registry
            .register(pipeline)
            .map_err(|err| pipeline_error(&format!("register {id}"), err))?;
    }

    if let Some((id, err)) = registry.start_all().into_iter().next() {
        let _ = registry.stop_all().await;
        return Err(pipeline_error(&format!("start {id}"), err));
    }
    tracing::info!(pipelines = registry.len(), "pipelines running");

    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "signal handler unavailable, waiting for sources to end");
            std::future::pending::<()>().await;
        }
    };
    let finished = tokio::select! {
        failures = registry.wait_all() => Some(failures),
        () = interrupt => None,
    };
    let failures = match finished {
        Some(failures) => failures,
        None => {
            tracing::info!("interrupt received, stopping pipelines");
            registry.stop_all().await
        }
    };

    print_statuses(&registry.statuses(), format);

    for (id, err) in &failures {
        tracing::error!(pipeline = %id, error = %err, "pipeline failed");
    }
    match failures.into_iter().next() {
        Some((id, err)) => Err(pipeline_error(&format!("pipeline {id}"), err)),
        None => Ok(SUCCESS),
    }
}
