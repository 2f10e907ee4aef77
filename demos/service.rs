//! # Service Example
//!
//! A small service wired from four modules:
//!
//! ```text
//! api ──► store ──► config        (config is invisible: only pulled in as a dependency)
//! metrics                         (gated by the "observability" flag, added automatically)
//! ```
//!
//! `api` ticks until stopped, `metrics` counts events seen by a custom subscriber.
//! Events are also logged through `LogWriter` + `tracing_subscriber`.
//!
//! ## Run
//! ```bash
//! TARGETS="api" RUST_LOG=debug cargo run --example service
//! # Ctrl-C to stop
//! ```

use std::{
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use modvisor::{
    Event, IdleUnit, LogWriter, Orchestrator, OrchestratorConfig, Registry, StaticToggles,
    Subscribe, SystemdNotifier, Unit, UnitError, UnitFn, UnitRef,
};

struct TransitionCounter {
    seen: AtomicU64,
}

#[async_trait::async_trait]
impl Subscribe for TransitionCounter {
    async fn on_event(&self, ev: &Event) {
        if ev.kind == modvisor::EventKind::UnitTransition {
            self.seen.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn name(&self) -> &'static str {
        "transition-counter"
    }
}

/// Store that "opens" on start and "flushes" on stop.
struct Store;

#[async_trait::async_trait]
impl Unit for Store {
    async fn start(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        tracing::info!("store opened");
        Ok(())
    }

    async fn stop(&self, _ctx: CancellationToken) -> Result<(), UnitError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::info!("store flushed");
        Ok(())
    }
}

fn registry() -> Result<Registry, modvisor::ConfigError> {
    let mut reg = Registry::new();
    reg.register_invisible_module("config", || Ok(IdleUnit::arc()))
        .register_module("store", || Ok(Arc::new(Store) as UnitRef))
        .register_module("api", || {
            let unit: UnitRef = UnitFn::arc(|ctx: CancellationToken| async move {
                let mut ticks = 0u64;
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => return Ok::<_, UnitError>(()),
                        _ = tokio::time::sleep(Duration::from_millis(500)) => {
                            ticks += 1;
                            tracing::info!(ticks, "api tick");
                        }
                    }
                }
            });
            Ok(unit)
        })
        .register_module("metrics", || Ok(IdleUnit::arc()));
    reg.add_dependency("store", ["config"])?;
    reg.add_dependency("api", ["store"])?;
    reg.add_conditional("metrics", "observability");
    Ok(reg)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let targets = std::env::var("TARGETS").unwrap_or_else(|_| "api".to_string());
    let mut cfg = OrchestratorConfig::default().with_targets(modvisor::parse_targets(&targets));
    cfg.grace = Duration::from_secs(5);

    let counter = Arc::new(TransitionCounter {
        seen: AtomicU64::new(0),
    });
    let orch = Orchestrator::builder(cfg, registry()?)
        .with_toggles(StaticToggles::new(["observability"]))
        .with_notifier(SystemdNotifier::from_env())
        .with_subscribers(vec![
            Arc::new(LogWriter::new()) as Arc<dyn Subscribe>,
            counter.clone() as Arc<dyn Subscribe>,
        ])
        .build();

    orch.init(CancellationToken::new()).await?;
    println!("activating: {:?}", orch.active_modules());

    let res = orch.serve().await;
    println!("transitions observed: {}", counter.seen.load(Ordering::Relaxed));
    res?;
    Ok(())
}
