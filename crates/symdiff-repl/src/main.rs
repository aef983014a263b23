use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use exec::ExecContext;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

mod error;
mod exec;
mod repl;
mod resolve;

struct Args {
    level: LevelFilter,
    log_file: Option<PathBuf>,
    script: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        level: LevelFilter::Warn,
        log_file: None,
        script: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--log" => {
                let level = args.next().ok_or("--log needs a level")?;
                parsed.level = level
                    .parse()
                    .map_err(|_| format!("unknown log level {level}"))?;
            }
            "--log-file" => {
                parsed.log_file = Some(args.next().ok_or("--log-file needs a path")?.into());
            }
            _ if parsed.script.is_none() => parsed.script = Some(arg.into()),
            _ => return Err(format!("unexpected argument {arg}")),
        }
    }
    Ok(parsed)
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        args.level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &args.log_file {
        loggers.push(WriteLogger::new(
            args.level,
            Config::default(),
            File::create(path)?,
        ));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Usage: symdiff [--log LEVEL] [--log-file PATH] [SCRIPT]");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&args) {
        eprintln!("Could not start logging: {err}");
    }

    let mut exec_ctx = ExecContext::default();
    let res = match &args.script {
        None => repl::repl(&mut exec_ctx).map_err(|err| err.to_string()),
        Some(path) => exec::exec_file(path, &mut exec_ctx).map_err(|err| err.to_string()),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
