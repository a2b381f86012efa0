use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, LevelFilter};

use kiwi8::{Config, Quirks, TimerMode, DEFAULT_RATE};
use kiwi_host::{logger, run, KeyEvent, Settings};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TimerArg {
    PerInstruction,
    #[value(name = "fixed60hz")]
    Fixed60Hz,
}

impl From<TimerArg> for TimerMode {
    fn from(arg: TimerArg) -> Self {
        match arg {
            TimerArg::PerInstruction => TimerMode::PerInstruction,
            TimerArg::Fixed60Hz => TimerMode::Fixed60Hz,
        }
    }
}

/// Run a CHIP-8 ROM headless and print the final screen
#[derive(Parser, Debug)]
#[command(name = "kiwi", version)]
struct Args {
    /// ROM file to run
    rom: PathBuf,

    /// Instructions per second
    #[arg(short, long, default_value_t = DEFAULT_RATE)]
    rate: u64,

    /// How long to run, in milliseconds
    #[arg(short, long = "duration-ms", default_value_t = 1000)]
    duration_ms: u64,

    /// Seed for CXNN random numbers
    #[arg(long, default_value_t = 0)]
    seed: u128,

    #[arg(long = "timer-mode", value_enum, default_value_t = TimerArg::PerInstruction)]
    timer_mode: TimerArg,

    /// Make EXA1 skip when the key is not pressed
    #[arg(long = "fix-exa1")]
    fix_exa1: bool,

    /// Press KEY (hex digit) MS milliseconds into the run, e.g. `A@250`
    #[arg(short, long = "press", value_name = "KEY@MS")]
    press: Vec<KeyEvent>,

    /// Characters per pixel in the printed screen
    #[arg(short, long, default_value_t = 1)]
    scale: usize,

    #[arg(long = "log-level", default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(args.log_level);

    let settings = Settings {
        rom: args.rom,
        rate: args.rate,
        duration_ms: args.duration_ms,
        seed: args.seed,
        config: Config::default()
            .with_timer_mode(args.timer_mode.into())
            .with_quirks(Quirks {
                exa1_skips_when_pressed: !args.fix_exa1,
            }),
        keys: args.press,
    };

    match run(&settings, args.scale) {
        Ok(report) => {
            print!("{}", report.screen);
            if report.waiting_for_key {
                println!("{}: waiting for a key", report.name);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}: {}", settings.rom.display(), err);
            ExitCode::FAILURE
        }
    }
}
