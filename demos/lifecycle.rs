//! # Example: Pea lifecycle
//!
//! Starts one isolated and one cooperative pea running a scripted runtime,
//! prints the events each publishes, then shuts both down. A third pea never
//! becomes ready in time and is killed by its ready timeout.
//!
//! ```text
//! cargo run --example lifecycle --features test-utils
//! ```

use std::time::Duration;

use peapod::testing::{Script, ScriptedFactory};
use peapod::{
    DEFAULT_DIRECTIVE, ExecutionModel, LOCAL_RUNTIME, Pea, PeaConfig, RuntimeRegistry,
    init_logging,
};

fn print_events(pea: &Pea, mut rx: tokio::sync::broadcast::Receiver<peapod::Event>) {
    while let Ok(ev) = rx.try_recv() {
        println!(
            "[{}] #{} {:?} addr={:?} reason={:?}",
            pea.name(),
            ev.seq,
            ev.kind,
            ev.addr.as_deref(),
            ev.reason.as_deref()
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = init_logging(DEFAULT_DIRECTIVE);

    let mut registry = RuntimeRegistry::new();
    registry.register(ScriptedFactory::new(
        LOCAL_RUNTIME,
        Script::default().with_setup_delay(Duration::from_millis(200)),
    ));

    for (name, model) in [
        ("isolated", ExecutionModel::Isolated),
        ("cooperative", ExecutionModel::Cooperative),
    ] {
        let cfg = PeaConfig {
            ctrl_with_ipc: true,
            ..PeaConfig::default().with_name(name).with_execution(model)
        };
        let pea = Pea::new(cfg, &registry)?;
        let rx = pea.subscribe();

        pea.start().await?;
        println!("[{name}] state after start: {:?}", pea.state());
        tokio::time::sleep(Duration::from_millis(300)).await;

        pea.close().await;
        println!("[{name}] state after close: {:?}", pea.state());
        print_events(&pea, rx);
    }

    let cfg = PeaConfig {
        ctrl_with_ipc: true,
        ..PeaConfig::default()
            .with_name("impatient")
            .with_execution(ExecutionModel::Isolated)
            .with_timeout_ready(Duration::from_millis(20))
    };
    let pea = Pea::new(cfg, &registry)?;
    let rx = pea.subscribe();
    if let Err(err) = pea.start().await {
        println!("[impatient] {} ({})", err.as_message(), err.as_label());
    }
    print_events(&pea, rx);

    Ok(())
}
