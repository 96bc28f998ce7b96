//! temp repro
#![allow(missing_docs)]
use tasklet_engine::config::EngineConfig;
use tasklet_engine::engine::Engine;

#[test]
fn repro() {
    let mut config = EngineConfig::default();
    config.worker_count = 2;
    config.autoconfig_enabled = false;
    eprintln!("before new");
    let engine = Engine::new(config).expect("valid config");
    eprintln!("after new");
    eprintln!("is_finished: {}", engine.is_finished(999999));
    eprintln!("before shutdown");
    engine.shutdown();
    eprintln!("after shutdown");
}
