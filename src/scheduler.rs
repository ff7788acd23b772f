//! Expansion scheduling
//!
//! One expansion pass renders every configured file specifier in order.
//! A single-shot run does exactly one pass. A periodic run re-expands
//! whenever a monitored value changes or the period elapses, whichever
//! comes first, until shutdown is requested. Shutdown is honored between
//! passes only; a pass that has started always completes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cache::{ChangeAggregator, ValueCache, Wake};
use crate::error::MacroError;
use crate::macros::{FileSpecifier, MacroContext};
use crate::render::{RenderContext, Renderer};

/// Clamp the per-fetch timeout below the re-expansion period.
///
/// The effective timeout for a single fetch must stay strictly below the
/// period; one that is not smaller is forced down to half the period.
/// Returns the effective timeout and whether it was adjusted.
pub fn effective_timeout(timeout: Duration, period: Option<Duration>) -> (Duration, bool) {
    match period {
        Some(period) if !period.is_zero() && timeout >= period => (period / 2, true),
        _ => (timeout, false),
    }
}

/// Scheduler parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Directory rendered output is written into
    pub outdir: PathBuf,
    /// Re-expansion period; `None` runs a single pass
    pub period: Option<Duration>,
}

/// Counts for one expansion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub rendered: usize,
    pub failed: usize,
}

/// A specifier as prepared at startup: either ready to render with its
/// merged macro context, or recorded as failed so it is skipped (and
/// logged) on every pass without disturbing the others.
enum SpecSlot {
    Ready {
        spec: FileSpecifier,
        macros: MacroContext,
    },
    Failed {
        raw: String,
        error: MacroError,
    },
}

/// Drives expansion passes over the configured specifiers.
pub struct ExpansionScheduler {
    slots: Vec<SpecSlot>,
    renderer: Arc<dyn Renderer>,
    cache: Arc<ValueCache>,
    changes: Arc<ChangeAggregator>,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
}

impl ExpansionScheduler {
    /// Prepare specifiers and merge macro contexts once.
    ///
    /// The per-file context is globals overlaid with the specifier's
    /// inline macros (inline wins on collision). Malformed macro strings
    /// are reported here with full context and the specifier is retained
    /// as failed.
    pub fn new(
        raw_specifiers: &[String],
        globals: &MacroContext,
        renderer: Arc<dyn Renderer>,
        cache: Arc<ValueCache>,
        config: SchedulerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> ExpansionScheduler {
        let slots = raw_specifiers
            .iter()
            .map(|raw| match FileSpecifier::parse(raw) {
                Ok(spec) => {
                    let macros = match &spec.macros {
                        Some(inline) => globals.merged(inline),
                        None => globals.clone(),
                    };
                    SpecSlot::Ready { spec, macros }
                }
                Err(error) => {
                    warn!(
                        specifier = %raw,
                        "malformed macro string:\n{}",
                        error.format(raw)
                    );
                    SpecSlot::Failed {
                        raw: raw.clone(),
                        error,
                    }
                }
            })
            .collect();

        let changes = cache.changes();
        ExpansionScheduler {
            slots,
            renderer,
            cache,
            changes,
            config,
            shutdown,
        }
    }

    /// Run to completion: one pass, then (if periodic) the change loop
    /// until shutdown.
    pub async fn run(mut self) {
        info!("initial expansion");
        self.expand_pass().await;
        info!("initial expansion complete");

        let Some(period) = self.config.period else {
            return;
        };

        let changes = self.changes.clone();
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let wake = tokio::select! {
                wake = changes.wait_timeout(period) => wake,
                _ = self.shutdown.changed() => break,
            };
            if *self.shutdown.borrow() {
                break;
            }
            match wake {
                Wake::Changed => debug!("re-expansion: value changed"),
                Wake::Elapsed => debug!("re-expansion: period elapsed"),
            }
            self.expand_pass().await;
        }
        info!("scheduler stopped");
    }

    /// Render every specifier in order. Failures are logged and isolated
    /// to their file; the pass always visits every specifier.
    pub async fn expand_pass(&self) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        for slot in &self.slots {
            match slot {
                SpecSlot::Failed { raw, error } => {
                    error!(specifier = %raw, error = %error, "skipping specifier");
                    outcome.failed += 1;
                }
                SpecSlot::Ready { spec, macros } => {
                    let context = RenderContext::new(macros.clone(), self.cache.clone());
                    match self.renderer.render(spec.path(), &context).await {
                        Ok(text) => match self.write_output(spec.path(), &text).await {
                            Ok(dest) => {
                                debug!(
                                    template = %spec.path().display(),
                                    output = %dest.display(),
                                    "expanded"
                                );
                                outcome.rendered += 1;
                            }
                            Err(err) => {
                                error!(
                                    template = %spec.path().display(),
                                    error = %err,
                                    "failed to write output"
                                );
                                outcome.failed += 1;
                            }
                        },
                        Err(err) => {
                            error!(
                                template = %spec.path().display(),
                                error = %err,
                                "render failed"
                            );
                            outcome.failed += 1;
                        }
                    }
                }
            }
        }
        outcome
    }

    async fn write_output(&self, template: &Path, text: &str) -> io::Result<PathBuf> {
        let name = template.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "specifier has no file name")
        })?;
        let dest = self.config.outdir.join(name);
        tokio::fs::write(&dest, text).await?;
        Ok(dest)
    }
}
