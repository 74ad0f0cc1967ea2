use std::{
    env,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Context;
use handstream::{
    config::Config, pipeline::Pipeline, queue::frame_queue, server::Server, source::SourceSpec,
};

fn main() -> anyhow::Result<()> {
    handstream::init_logger!();

    let config = Config::from_env()?;
    let input = SourceSpec::from_args(env::args().skip(1))
        .context("usage: handstream [FILE | - | --detector CMD [ARGS...]]")?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("interrupted, shutting down");
            stop.store(true, Ordering::Relaxed);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let server = Server::bind(
        config.addr(),
        config.listen_transport(),
        config.write_timeout(),
    )?;
    let (publisher, subscriber) = frame_queue(config.frame_queue_capacity());
    let emitter = server.spawn(subscriber)?;

    let source = input.open()?;
    let mut pipeline = Pipeline::new(source, config.extractor(), publisher)
        .display_debug(config.is_display_debug());
    let result = pipeline.run(&stop);

    // Release the capture source first, then let the emitter drain and close the listener.
    drop(pipeline.into_source());
    emitter.join();

    let stats = result?;
    log::info!(
        "processed {} frames ({} hands, {} dropped hands, {} frames never sent)",
        stats.frames,
        stats.hands,
        stats.dropped_hands,
        stats.evicted
    );
    Ok(())
}
