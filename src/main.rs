use clap::Parser;
use retire::cli::{self, Cli};
use retire::output::OutputFormatter;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version arrive here too; only real usage errors
        // leave with a failure status.
        Err(err) => {
            let _ = err.print();
            process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    let handler = ctrlc::set_handler(move || {
        if handler_flag.load(Ordering::SeqCst) {
            // Second Ctrl+C forces the exit
            process::exit(130);
        }
        OutputFormatter::warning("Received Ctrl+C, finishing current work...");
        handler_flag.store(true, Ordering::SeqCst);
    });
    if let Err(err) = handler {
        OutputFormatter::warning(&format!("Could not install Ctrl+C handler: {}", err));
    }

    if let Err(message) = cli::run(cli, &cancel) {
        OutputFormatter::error(&message);
        process::exit(1);
    }
}
