//! CLI front end for the free-space erase engine.

use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use disk_eraser::config::{parse_size_with_suffix, FILE_COUNT_DEFAULT};
use disk_eraser::report::{format_byte_size, format_speed, RunLog};
use disk_eraser::space::get_free_space;
use disk_eraser::status::Action;
use disk_eraser::{EraseConfig, Eraser, PassSpec};

/// Seconds between status refreshes, like the wizard's status timer.
const TIMER_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[clap(author, version, about = "Erase the free space of a folder by filling it with temporary files", long_about = None)]
struct Cli {
    /// Target folder (must exist and be writable)
    folder: PathBuf,

    /// Write the custom patterns 0x69 and 0x96 (two passes)
    #[clap(long)]
    custom: bool,

    /// Write all ones (0xFF bytes)
    #[clap(long)]
    ones: bool,

    /// Write pseudo-random data (the default when no pass is selected)
    #[clap(long)]
    random: bool,

    /// Read verify after the pseudo-random pass
    #[clap(long)]
    verify: bool,

    /// Pause before the verify so removable media can be ejected and
    /// reinserted (defeats the OS read cache)
    #[clap(long)]
    prompt: bool,

    /// Write all zeros (0x00 bytes)
    #[clap(long)]
    zeros: bool,

    /// Maximum number of temporary files (1 to 9999)
    #[clap(long, default_value_t = FILE_COUNT_DEFAULT)]
    file_count: u32,

    /// Maximum bytes per temporary file, e.g. "4G"
    #[clap(long, value_parser = parse_size_with_suffix)]
    file_size: Option<u64>,

    /// Maximum total bytes per pass, e.g. "100G"
    #[clap(long, value_parser = parse_size_with_suffix)]
    pass_size: Option<u64>,

    /// Generate every random byte instead of reusing a per-pass pool
    #[clap(long)]
    fresh_random: bool,

    /// Leave the temporary files in place after the run
    #[clap(long)]
    keep_files: bool,

    /// Log per-file details (creation, buffer reductions, deletions)
    #[clap(long)]
    verbose: bool,

    /// Print the final summary as JSON on stdout
    #[clap(long)]
    json: bool,

    /// Append all output to this log file
    #[clap(long)]
    log_file: Option<PathBuf>,
}

fn build_passes(cli: &Cli) -> Vec<PassSpec> {
    let mut passes = Vec::new();
    if cli.custom {
        let mut first = PassSpec::constant(0x69);
        first.label = "Writing custom pattern 0x69...".to_string();
        let mut second = PassSpec::constant(0x96);
        second.label = "Writing custom pattern 0x96...".to_string();
        passes.push(first);
        passes.push(second);
    }
    if cli.ones {
        let mut pass = PassSpec::constant(0xFF);
        pass.label = "Writing all ones (0xFF)...".to_string();
        passes.push(pass);
    }
    if cli.random || (passes.is_empty() && !cli.zeros) {
        passes.push(PassSpec::random(cli.verify, cli.prompt));
    }
    if cli.zeros {
        let mut pass = PassSpec::constant(0x00);
        pass.label = "Writing all zeros (0x00)...".to_string();
        passes.push(pass);
    }
    passes
}

fn main() {
    let cli = Cli::parse();
    let code = match main_logic(cli) {
        Ok(errors) if errors == 0 => 0,
        Ok(_) => 1,
        Err(e) => {
            eprintln!("error: {}", e);
            2
        }
    };
    std::process::exit(code);
}

fn main_logic(cli: Cli) -> Result<u64, String> {
    let log_file = match &cli.log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("can't open log file {}: {}", path.display(), e))?,
        ),
        None => None,
    };
    let log = Arc::new(RunLog::new(log_file, false));

    let mut config = EraseConfig::new(cli.folder.clone(), build_passes(&cli));
    config.max_file_count = cli.file_count;
    if let Some(size) = cli.file_size {
        config.max_file_size = size;
    }
    if let Some(size) = cli.pass_size {
        config.max_pass_size = size;
    }
    config.reuse_random_pool = !cli.fresh_random;
    config.verbose = cli.verbose;

    let eraser = Eraser::new(config, Arc::clone(&log)).map_err(|e| e.to_string())?;
    let state = eraser.state();

    match get_free_space(&cli.folder) {
        Ok(free) => log.put(format!(
            "Disk free space for {}: {}",
            cli.folder.display(),
            format_byte_size(free)
        )),
        Err(e) => log.put(format!(
            "Could not read free space for {}: {}",
            cli.folder.display(),
            e
        )),
    }

    if cli.keep_files {
        state.set_delete_temp_files(false);
    }
    {
        let state = Arc::clone(&state);
        let delete = !cli.keep_files;
        ctrlc::set_handler(move || {
            eprintln!("\nCancel requested; finishing the current block...");
            state.request_cancel(delete);
        })
        .map_err(|e| format!("can't install Ctrl+C handler: {}", e))?;
    }

    let worker = thread::spawn(move || eraser.run());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {wide_msg}",
        )
        .unwrap()
        .progress_chars("##-"),
    );

    let mut prev_bytes = 0u64;
    let mut prev_rate = -1.0f64;
    while !worker.is_finished() {
        thread::sleep(TIMER_DELAY);
        for line in log.drain() {
            pb.println(line);
        }
        let snap = state.snapshot();
        if let Some(max) = snap.pass_est_max {
            pb.set_length(max);
            pb.set_position(snap.pass_bytes_done.min(max));
        }
        // Rates are blended 70/30 with the previous interval, as the
        // wizard's status display did; pass boundaries reset the baseline.
        let rate = if snap.pass_bytes_done >= prev_bytes {
            (snap.pass_bytes_done - prev_bytes) as f64 / TIMER_DELAY.as_secs_f64()
        } else {
            0.0
        };
        if prev_rate < 0.0 {
            prev_rate = rate;
        }
        let shown = rate * 0.7 + prev_rate * 0.3;
        prev_bytes = snap.pass_bytes_done;
        prev_rate = rate;

        let mut message = snap.action.label().to_string();
        if let Some(name) = &snap.file_name {
            message.push_str(&format!(" file {}", name));
        }
        message.push_str(&format!(" at {}", format_speed(shown)));
        pb.set_message(message);

        if snap.action == Action::Waiting && state.is_paused() {
            pb.println("Paused. Press Enter to resume.");
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            state.toggle_pause();
        }
    }

    let summary = worker
        .join()
        .map_err(|_| "worker thread panicked".to_string())?;
    for line in log.drain() {
        pb.println(line);
    }
    pb.finish_and_clear();

    if cli.json {
        println!("{}", summary.to_json());
    }
    Ok(summary.total_errors)
}
