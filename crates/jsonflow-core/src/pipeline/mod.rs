//! Stream plumbing (C2): sources, sinks, transformers, and their
//! composition into pipelines.
//!
//! Each stage runs on its own tokio task (a `spawn_blocking` task, since
//! the stage bodies are synchronous — see `channel`); stages communicate
//! through bounded FIFO channels. Ordering is strictly preserved per
//! channel. Closing the downstream sink propagates back: a write to a
//! closed channel yields `Error::BrokenPipe`, which unwinds the pipeline
//! cleanly and is reported as success by the driver.

pub mod channel;
pub mod transforms;

use std::panic::{AssertUnwindSafe, catch_unwind};

pub use channel::{TokenReader, TokenWriter, token_channel};

use crate::error::{Error, Result};

/// Fills a token sink until input is exhausted or fails. Must emit a
/// well-formed token stream (§3). A stage owns its channel endpoint for
/// its entire lifetime, so `out` is taken by value rather than borrowed.
pub trait Source: Send {
    fn produce(&mut self, out: TokenWriter) -> Result<()>;
}

/// Pulls tokens, pushes tokens. Must preserve well-formedness.
pub trait Transformer: Send {
    fn transform(&mut self, input: TokenReader, out: TokenWriter) -> Result<()>;
}

/// Drains a token stream, possibly producing bytes on some external
/// writer. Must tolerate a broken pipe by returning success.
pub trait Sink: Send {
    fn consume(&mut self, input: TokenReader) -> Result<()>;
}

/// Bounded-channel capacity and related knobs for a pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// A caller-supplied handler for source errors: the source reports through
/// it rather than blocking the channel (§4.2).
pub type ErrorHandler = Box<dyn FnOnce(Error) + Send>;

/// Wires `source -> transformers[0] -> ... -> transformers[n] -> sink`
/// left to right and runs the whole pipeline to completion.
///
/// Returns once the sink has finished or a fatal error propagates.
/// Broken-pipe conditions anywhere in the chain are recovered silently and
/// reported as `Ok(())`, matching the top-level driver's policy.
pub async fn pipe(
    mut source: Box<dyn Source>,
    mut transformers: Vec<Box<dyn Transformer>>,
    mut sink: Box<dyn Sink>,
    config: PipelineConfig,
    on_source_error: Option<ErrorHandler>,
) -> Result<()> {
    let stage_count = transformers.len() + 1;
    let mut readers = Vec::with_capacity(stage_count);
    let mut writers = Vec::with_capacity(stage_count);
    for _ in 0..stage_count {
        let (w, r) = token_channel(config.channel_capacity);
        writers.push(w);
        readers.push(r);
    }
    // writers[i] feeds readers[i]; stage i writes to writers[i], stage i+1
    // reads from readers[i].
    let mut handles = Vec::new();

    {
        let out = writers.remove(0);
        handles.push(tokio::task::spawn_blocking(move || {
            tracing::debug!(stage = "source", "pipeline stage starting");
            let result = catch_unwind(AssertUnwindSafe(|| source.produce(out)));
            let result = match result {
                Ok(r) => r,
                Err(_) => Err(Error::Source("source panicked".into())),
            };
            log_stage_exit("source", &result);
            result
        }));
    }

    let mut next_reader = Some(readers.remove(0));
    for (i, mut t) in transformers.drain(..).enumerate() {
        let input = next_reader.take().unwrap();
        let out = writers.remove(0);
        next_reader = Some(readers.remove(0));
        handles.push(tokio::task::spawn_blocking(move || {
            tracing::debug!(stage = "transformer", index = i, "pipeline stage starting");
            let result = catch_unwind(AssertUnwindSafe(|| t.transform(input, out)));
            let result = match result {
                Ok(r) => r,
                Err(_) => Err(Error::Sink("transformer panicked".into())),
            };
            log_stage_exit("transformer", &result);
            result
        }));
    }

    let final_input = next_reader.take().unwrap();
    let sink_handle = tokio::task::spawn_blocking(move || {
        tracing::debug!(stage = "sink", "pipeline stage starting");
        let result = catch_unwind(AssertUnwindSafe(|| sink.consume(final_input)));
        let result = match result {
            Ok(r) => r,
            Err(_) => Err(Error::Sink("sink panicked".into())),
        };
        log_stage_exit("sink", &result);
        result
    });

    let mut first_error: Option<Error> = None;
    for (i, h) in handles.into_iter().enumerate() {
        match h.await {
            Ok(Ok(())) => {}
            Ok(Err(Error::BrokenPipe)) => {}
            Ok(Err(e)) => {
                if i == 0 {
                    if let Some(handler) = on_source_error {
                        handler(e);
                        return finish_sink(sink_handle).await;
                    }
                }
                first_error.get_or_insert(e);
            }
            Err(join_err) => {
                first_error.get_or_insert(Error::Sink(join_err.to_string()));
            }
        }
    }

    let sink_result = finish_sink(sink_handle).await;
    match (first_error, sink_result) {
        (Some(e), _) => Err(e),
        (None, r) => r,
    }
}

fn log_stage_exit(stage: &str, result: &Result<()>) {
    match result {
        Ok(()) => tracing::debug!(stage, "pipeline stage finished"),
        Err(Error::BrokenPipe) => tracing::debug!(stage, "pipeline stage unwound on broken pipe"),
        Err(e) => tracing::warn!(stage, error = %e, "pipeline stage failed"),
    }
}

async fn finish_sink(
    handle: tokio::task::JoinHandle<Result<()>>,
) -> Result<()> {
    match handle.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(Error::BrokenPipe)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(join_err) => Err(Error::Sink(join_err.to_string())),
    }
}

/// Convenience entry point for a non-async caller: builds a small
/// current-thread runtime and drives `pipe` to completion on it. Stage
/// bodies still run on the runtime's blocking thread pool, satisfying the
/// "each stage runs on its own task/thread" contract even for a
/// single-threaded caller.
pub fn pipe_blocking(
    source: Box<dyn Source>,
    transformers: Vec<Box<dyn Transformer>>,
    sink: Box<dyn Sink>,
    config: PipelineConfig,
    on_source_error: Option<ErrorHandler>,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build pipeline runtime");
    rt.block_on(pipe(source, transformers, sink, config, on_source_error))
}
