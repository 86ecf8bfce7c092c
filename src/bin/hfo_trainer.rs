use anyhow::Context;
use tracing::info;

use hfo_trainer::prelude::*;

fn main() -> anyhow::Result<()> {
    let config = Configuration::from_env();
    config.validate().context("invalid HFO_* settings")?;

    let (host, port) = config.coach_address();
    let mut trainer = Trainer::connect(config)
        .with_context(|| format!("could not open the coach link to {host}:{port}"))?;
    let stop = trainer.stop_handle();
    ctrlc::set_handler(move || stop.stop()).context("could not install the Ctrl-C handler")?;
    let stats = trainer.run()?;
    info!(goals = stats.goals, trials = stats.trials, "trainer exiting");
    Ok(())
}
