//! Kiln CLI

use kiln_diagnostic::emitter::ColorMode;
use kiln_diagnostic::Severity;
use kilnc::commands::{check_files, explain_error, print_ir, run_files};
use kilnc::DriverOptions;

/// Positional arguments and `--` program arguments left after flag parsing.
struct Invocation {
    files: Vec<String>,
    program_args: Vec<String>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = args[1].as_str();
    let status = match command {
        "run" => {
            let (options, invocation) = parse_options(&args[2..]);
            if invocation.files.is_empty() {
                eprintln!("Usage: kiln run <file.kt>... [options] [-- args]");
                std::process::exit(1);
            }
            run_files(&invocation.files, &options, &invocation.program_args)
        }
        "check" => {
            let (options, invocation) = parse_options(&args[2..]);
            if invocation.files.is_empty() {
                eprintln!("Usage: kiln check <file.kt>... [options]");
                std::process::exit(1);
            }
            check_files(&invocation.files, &options)
        }
        "ir" => {
            let (options, invocation) = parse_options(&args[2..]);
            if invocation.files.is_empty() {
                eprintln!("Usage: kiln ir <file.kt>... [options]");
                std::process::exit(1);
            }
            print_ir(&invocation.files, &options)
        }
        "explain" | "--explain" => {
            if args.len() < 3 {
                eprintln!("Usage: kiln explain <CODE>");
                eprintln!("Example: kiln explain K2001");
                std::process::exit(1);
            }
            explain_error(&args[2])
        }
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        "version" | "--version" | "-V" => {
            println!("kiln {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            // A bare tree file runs directly.
            if std::path::Path::new(command)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("kt"))
            {
                let (options, invocation) = parse_options(&args[1..]);
                run_files(&invocation.files, &options, &invocation.program_args)
            } else {
                eprintln!("Unknown command: {command}");
                eprintln!();
                print_usage();
                1
            }
        }
    };
    std::process::exit(status);
}

/// Split flags from files. Everything after `--` is passed to the program.
fn parse_options(args: &[String]) -> (DriverOptions, Invocation) {
    let mut options = DriverOptions::default();
    let mut invocation = Invocation {
        files: Vec::new(),
        program_args: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            invocation.program_args = iter.cloned().collect();
            break;
        } else if let Some(depth) = arg.strip_prefix("--max-depth=") {
            options.vm.max_call_depth = parse_number("--max-depth", depth);
        } else if let Some(entry) = arg.strip_prefix("--entry=") {
            options.entry = entry.to_string();
        } else if let Some(jobs) = arg.strip_prefix("--jobs=") {
            options.jobs = parse_number("--jobs", jobs);
        } else if let Some(mode) = arg.strip_prefix("--color=") {
            let Some(color) = ColorMode::parse(mode) else {
                eprintln!("error: invalid --color value '{mode}' (expected auto, always or never)");
                std::process::exit(1);
            };
            options.emitter.color = color;
        } else if let Some(level) = arg.strip_prefix("--min-severity=") {
            let Some(severity) = Severity::parse(level) else {
                eprintln!("error: invalid --min-severity value '{level}'");
                std::process::exit(1);
            };
            options.emitter.min_severity = severity;
        } else if arg == "--trace-ops" {
            options.vm.trace_ops = true;
        } else if arg == "--no-unreachable-warnings" {
            options.lower.warn_unreachable = false;
        } else if arg.starts_with("--") {
            eprintln!("error: unknown option '{arg}'");
            std::process::exit(1);
        } else {
            invocation.files.push(arg.clone());
        }
    }
    (options, invocation)
}

fn parse_number(flag: &str, value: &str) -> usize {
    value.parse().unwrap_or_else(|_| {
        eprintln!("error: {flag} expects a number, got '{value}'");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Kiln - lower tree programs to IR and run them");
    println!();
    println!("Usage: kiln <command> [options]");
    println!();
    println!("Commands:");
    println!("  run <file.kt>... [-- args]   Lower the files as one program and run `main`");
    println!("  check <file.kt>...           Lower each file independently, report problems");
    println!("  ir <file.kt>...              Print the IR listing of every lowered atom");
    println!("  explain <code>               Explain a report code (e.g., K2001)");
    println!("  help                         Show this help message");
    println!("  version                      Show version information");
    println!();
    println!("Options:");
    println!("  --entry=<name>               Entry function (default: main)");
    println!("  --max-depth=<n>              Maximum call depth (default: 1024)");
    println!("  --trace-ops                  Log every executed op (needs RUST_LOG=kiln_vm=trace)");
    println!("  --jobs=<n>                   Threads for `check` (default: all cores)");
    println!("  --color=<auto|always|never>  Colored diagnostics");
    println!("  --min-severity=<level>       Hide reports less severe than <level>");
    println!("  --no-unreachable-warnings    Do not warn about code after return/break/continue");
    println!();
    println!("Environment:");
    println!("  RUST_LOG                     Enable tracing, e.g. RUST_LOG=kiln_lower=debug");
    println!("  KILN_LOG_TREE=1              Render tracing spans as a tree");
}
