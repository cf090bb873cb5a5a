//! Mixed native/script traffic on one queue
//!
//! Native producers push `{ type: "FROM NATIVE", value: <size> }`, native
//! consumers pop a fixed number of times, and a script on the main thread
//! alternates pop and push of `{ type: "FROM SCRIPT", value: <size> }`.
//! Afterwards the queue is drained and every message is accounted for.

use crate::settings::DemoSettings;
use anyhow::{bail, Context, Result};
use scriptq_core::{map, BindingRegistry, MessageQueue};
use scriptq_script::ScriptRuntime;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub const NATIVE_TYPE: &str = "FROM NATIVE";
pub const SCRIPT_TYPE: &str = "FROM SCRIPT";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub native_pushed: usize,
    pub native_popped: usize,
    pub script_pushed: usize,
    pub script_popped: usize,
    pub remaining_native: usize,
    pub remaining_script: usize,
}

impl Report {
    pub fn pushed(&self) -> usize {
        self.native_pushed + self.script_pushed
    }

    pub fn popped(&self) -> usize {
        self.native_popped + self.script_popped
    }

    pub fn remaining(&self) -> usize {
        self.remaining_native + self.remaining_script
    }

    /// Every pushed message was either popped or is still queued.
    pub fn is_balanced(&self) -> bool {
        self.pushed() == self.popped() + self.remaining()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pushed:    {} ({} native, {} script)",
            self.pushed(),
            self.native_pushed,
            self.script_pushed
        )?;
        writeln!(
            f,
            "popped:    {} ({} native, {} script)",
            self.popped(),
            self.native_popped,
            self.script_popped
        )?;
        write!(
            f,
            "remaining: {} ({} native, {} script)",
            self.remaining(),
            self.remaining_native,
            self.remaining_script
        )
    }
}

fn builtin_script(queue_name: &str, iterations: usize) -> String {
    format!(
        r#"
        var pushed = 0;
        var popped = 0;
        for (var i = 0; i < {iterations}; i++) {{
            if ({queue_name}.pop() !== undefined) popped++;
            {queue_name}.push({{ type: "{SCRIPT_TYPE}", value: {queue_name}.size() }});
            pushed++;
        }}
        "#
    )
}

pub fn run(settings: &DemoSettings) -> Result<Report> {
    let workers = &settings.workers;
    let queue: Arc<MessageQueue> = Arc::new(MessageQueue::new());

    let runtime: ScriptRuntime = ScriptRuntime::with_settings(settings.script.clone())?;
    queue
        .expose(&runtime, BindingRegistry::global(), &settings.queue_name)
        .context("failed to expose the queue to the script runtime")?;

    let native_popped = AtomicUsize::new(0);

    let (script_pushed, script_popped) = std::thread::scope(|scope| -> Result<(usize, usize)> {
        for producer in 0..workers.producers {
            let queue = &queue;
            scope.spawn(move || {
                for _ in 0..workers.items_per_producer {
                    let size = queue.size() as i64;
                    queue
                        .push(map! { "type" => NATIVE_TYPE, "value" => size })
                        .expect("owned message values always copy");
                }
                debug!(producer, "native producer finished");
            });
        }
        for consumer in 0..workers.consumers {
            let (queue, native_popped) = (&queue, &native_popped);
            scope.spawn(move || {
                let taken = (0..workers.pops_per_consumer)
                    .filter(|_| queue.pop().is_some())
                    .count();
                native_popped.fetch_add(taken, Ordering::Relaxed);
                debug!(consumer, taken, "native consumer finished");
            });
        }

        match &settings.script_path {
            Some(path) => runtime.execute_file(path)?,
            None => runtime.execute(&builtin_script(
                &settings.queue_name,
                workers.script_iterations,
            ))?,
        }
        let pushed = runtime.read_global::<Option<u32>>("pushed")?.unwrap_or(0);
        let popped = runtime.read_global::<Option<u32>>("popped")?.unwrap_or(0);
        Ok((pushed as usize, popped as usize))
    })?;

    let mut report = Report {
        native_pushed: workers.producers * workers.items_per_producer,
        native_popped: native_popped.into_inner(),
        script_pushed,
        script_popped,
        ..Report::default()
    };

    while let Some(msg) = queue.pop() {
        match msg.get("type")?.cast::<String>()?.as_str() {
            NATIVE_TYPE => report.remaining_native += 1,
            SCRIPT_TYPE => report.remaining_script += 1,
            other => bail!("unexpected message type {other:?}"),
        }
    }

    info!(
        pushed = report.pushed(),
        popped = report.popped(),
        remaining = report.remaining(),
        "demo finished"
    );
    Ok(report)
}
