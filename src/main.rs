use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser as ClapParser, ValueEnum};
use serde_json::json;

use swiftlet::core::diag::CompileError;
use swiftlet::core::resolve::CompatibilityMode;
use swiftlet::core::session::{CompilationSession, CompilerOptions};
use swiftlet::driver;
use swiftlet::logging::{LogFormat, LogLevel, LogOptions, init_logging};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SwiftVersion {
    #[value(name = "3")]
    V3,
    #[value(name = "4")]
    V4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
#[command(group(clap::ArgGroup::new("mode").multiple(false)))]
struct Args {
    /// Print the parsed syntax tree
    #[arg(long, group = "mode")]
    emit_ast: bool,
    /// Print the lowered ownership IR (the default)
    #[arg(long, group = "mode")]
    emit_sil: bool,
    /// Only parse and type-check
    #[arg(long, group = "mode")]
    typecheck: bool,
    /// Complete at the `#^NAME^#` marker given by --token
    #[arg(long, group = "mode", requires = "token")]
    code_completion: bool,
    #[arg(long)]
    token: Option<String>,
    #[arg(long, value_enum, default_value = "4")]
    swift_version: SwiftVersion,
    #[arg(long, default_value = "main")]
    module_name: String,
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
    file: PathBuf,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level: {value}"))
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format: {value}"))
}

/// What a run produced: text for stdout and whether errors were reported.
struct Outcome {
    text: String,
    failed: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(LogOptions::from_env().with_overrides(args.log_format, args.log_level));

    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", args.file.display());
            return ExitCode::from(2);
        }
    };
    let options = CompilerOptions {
        module_name: args.module_name.clone(),
        compat: match args.swift_version {
            SwiftVersion::V3 => CompatibilityMode::Swift3,
            SwiftVersion::V4 => CompatibilityMode::Swift4,
        },
        ..CompilerOptions::default()
    };
    let session = match CompilationSession::new(options) {
        Ok(session) => session,
        Err(errors) => {
            eprintln!("error: the prelude failed to load");
            for err in &errors {
                eprintln!("{}", err.to_diagnostic());
            }
            return ExitCode::from(2);
        }
    };

    let outcome = match run(&args, &session, &source) {
        Ok(outcome) => outcome,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };
    print!("{}", outcome.text);
    if outcome.failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn run(args: &Args, session: &CompilationSession, source: &str) -> Result<Outcome, String> {
    let json = args.format == OutputFormat::Json;
    if args.code_completion {
        let token = args.token.as_deref().unwrap_or_default();
        let items = driver::complete_at_token(session, source, token)
            .ok_or_else(|| format!("no #^{token}^# marker in {}", args.file.display()))?;
        let text = if json {
            to_json(&json!({ "token": token, "items": items }))?
        } else {
            driver::format_completions(&items)
        };
        return Ok(Outcome {
            text,
            failed: false,
        });
    }

    let parsed = driver::parse_in(session, source);
    if args.emit_ast {
        let errors = parsed
            .errors
            .iter()
            .cloned()
            .map(CompileError::from)
            .collect::<Vec<_>>();
        let ast = driver::format_ast(&parsed);
        return report(source, json, &errors, Some(("ast", ast)));
    }

    let checked = driver::typecheck(session, parsed);
    if args.typecheck || checked.has_errors() {
        return report(source, json, &checked.errors, None);
    }
    match driver::lower(session, &checked) {
        Ok(module) => report(source, json, &[], Some(("sil", driver::format_module(&module)))),
        Err(errors) => report(source, json, &errors, None),
    }
}

fn report(
    source: &str,
    json: bool,
    errors: &[CompileError],
    output: Option<(&str, String)>,
) -> Result<Outcome, String> {
    let failed = !errors.is_empty();
    let text = if json {
        let mut value = json!({ "diagnostics": driver::diagnostics(errors) });
        if let Some((key, text)) = output {
            value[key] = json!(text);
        }
        to_json(&value)?
    } else {
        if failed {
            eprintln!("{}", driver::format_diagnostics(source, errors));
        }
        output.map(|(_, text)| text).unwrap_or_default()
    };
    Ok(Outcome { text, failed })
}

fn to_json(value: &serde_json::Value) -> Result<String, String> {
    serde_json::to_string_pretty(value)
        .map(|text| text + "\n")
        .map_err(|err| format!("cannot serialize output: {err}"))
}
