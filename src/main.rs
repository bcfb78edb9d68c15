use log::{error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use hardball::config::SimulationConfig;
use hardball::simulation;

fn init_logging() {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {h({l})} {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        .unwrap();
    log4rs::init_config(config).unwrap();
}

fn main() {
    init_logging();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "hardball".into());
    let Some(config_path) = args.next() else {
        eprintln!("usage: {program} <config.json>");
        std::process::exit(2);
    };

    let config = match SimulationConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    match simulation::run(config) {
        Ok(stats) => {
            info!(
                "run complete: {} events, {} exports",
                stats.events_processed, stats.exports
            );
        }
        Err(e) => {
            error!("run failed: {e}");
            std::process::exit(1);
        }
    }
}
