use flexi_logger::{FileSpec, Logger, LoggerHandle};
use gaknn::error::Result;
use gaknn::param::{self, Param};
use gaknn::run;
use log::{error, info, warn};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn main() {
    let param_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(param_file.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot read parameters from {}: {}", param_file, e);
            process::exit(1);
        }
    };

    // the handle must live as long as the program for file logging to be flushed
    let _logger = match start_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            process::exit(1);
        }
    };

    info!("gaknn v{} using {}", gaknn::utils::version(), param_file);

    if let Err(e) = run_and_save(&param) {
        error!("{}", e);
        process::exit(1);
    }
}

fn start_logger(
    param: &Param,
) -> std::result::Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let logger = Logger::try_with_str(&param.general.log_level)?;
    if param.general.log_base.is_empty() {
        logger.log_to_stdout().start()
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .start()
    }
}

fn run_and_save(param: &Param) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    // stop after the current generation on SIGINT, SIGTERM or SIGHUP
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    thread::spawn(move || {
        for sig in signals.forever() {
            warn!("Received signal {}, finishing the current generation...", sig);
            r.store(false, Ordering::Relaxed);
        }
    });

    let exp = run(param, running)?;

    info!("{}", exp.display_results());

    if !param.general.save_exp.is_empty() {
        exp.save_auto(&param.general.save_exp)?;
        info!("Experiment saved to {}", param.general.save_exp);
    }

    Ok(())
}
