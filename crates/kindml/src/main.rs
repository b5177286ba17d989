use std::env;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use kindml::typecheck::{Kind, TypePrinter};
use kindml::{check_source, run_with_config, Config, ConfigError, Diagnostic};
use serde::Serialize;

const CONFIG_ENV: &str = "KINDML_CONFIG";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The program failed; the error has already been printed.
    #[error("program failed")]
    Reported,
}

#[derive(Serialize)]
struct CheckReport {
    #[serde(rename = "type")]
    ty: Option<String>,
    kind: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

struct Options {
    target: String,
    json: bool,
    config: Config,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Reported) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "run" => cmd_run(parse_options(&rest)?),
        "check" => cmd_check(parse_options(&rest)?),
        other => Err(CliError::Usage(format!(
            "unknown command {other}; try --help"
        ))),
    }
}

fn print_help() {
    println!(
        "kindml\n\nUSAGE:\n  kindml <COMMAND>\n\nCOMMANDS:\n  run <path|->\n  check <path|-> [--json]\n\nOPTIONS:\n  --config <path>  read settings from a TOML file (default: ${CONFIG_ENV})\n  -h, --help"
    );
}

fn parse_options(args: &[String]) -> Result<Options, CliError> {
    let mut target = None;
    let mut json = false;
    let mut config_path = env::var(CONFIG_ENV).ok();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--config" => {
                let Some(path) = iter.next() else {
                    return Err(CliError::Usage("--config expects a path".to_string()));
                };
                config_path = Some(path.clone());
            }
            value if target.is_none() && (value == "-" || !value.starts_with('-')) => {
                target = Some(value.to_string());
            }
            other => {
                return Err(CliError::Usage(format!("unexpected argument {other}")));
            }
        }
    }
    let Some(target) = target else {
        return Err(CliError::Usage("expected a source path or '-'".to_string()));
    };
    let config = match config_path {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };
    Ok(Options {
        target,
        json,
        config,
    })
}

fn read_source(target: &str) -> Result<String, CliError> {
    if target == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| CliError::Io {
                path: "<stdin>".to_string(),
                source,
            })?;
        return Ok(text);
    }
    std::fs::read_to_string(target).map_err(|source| CliError::Io {
        path: target.to_string(),
        source,
    })
}

fn cmd_run(options: Options) -> Result<(), CliError> {
    let source = read_source(&options.target)?;
    match run_with_config(&source, &options.config) {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(err) => {
            println!("! [ERROR AT {}] {}.", err.stage(), err);
            Err(CliError::Reported)
        }
    }
}

fn cmd_check(options: Options) -> Result<(), CliError> {
    let source = read_source(&options.target)?;
    let report = match check_source(&source, &options.config) {
        Ok(checked) => {
            let mut printer = TypePrinter::new();
            let ty = printer.print_type(&checked.ty);
            let kind = match checked.kind {
                Kind::Universal => None,
                ref kind => Some(printer.print_kind(kind)),
            };
            CheckReport {
                ty: Some(ty),
                kind,
                diagnostics: checked
                    .warnings
                    .iter()
                    .map(|warning| warning.to_diagnostic())
                    .collect(),
            }
        }
        Err(err) => CheckReport {
            ty: None,
            kind: None,
            diagnostics: vec![err.to_diagnostic()],
        },
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(ty) = &report.ty {
            match &report.kind {
                Some(kind) => println!("{ty} where {ty} :: {kind}"),
                None => println!("{ty}"),
            }
        }
        if !report.diagnostics.is_empty() {
            eprintln!(
                "{}",
                kindml::render_diagnostics(&options.target, &report.diagnostics)
            );
        }
    }
    if report.ty.is_none() {
        return Err(CliError::Reported);
    }
    Ok(())
}
