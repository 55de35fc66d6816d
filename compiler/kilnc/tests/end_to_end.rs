// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Driver tests: tree-text programs through `run_with`.
//!
//! Each test lowers in-memory (or temporary file) sources as one target,
//! executes the entry function, and checks the exit status, captured
//! output and the reports pushed to the sink.

use std::sync::Arc;

use kiln_diagnostic::{ErrorCode, Report, Reporter, Severity};
use kiln_vm::buffer_handler;
use kilnc::{run_with, DriverOptions, Source};
use pretty_assertions::assert_eq;

struct Outcome {
    status: i32,
    output: String,
    reports: Vec<Report>,
}

impl Outcome {
    fn codes(&self) -> Vec<ErrorCode> {
        self.reports.iter().filter_map(|r| r.code).collect()
    }

    fn failures(&self) -> Vec<&Report> {
        self.reports
            .iter()
            .filter(|r| r.severity.marks_failure())
            .collect()
    }
}

fn run_sources(options: &DriverOptions, sources: Vec<Source>, args: &[&str]) -> Outcome {
    let sink = Reporter::shared();
    let print = buffer_handler();
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    let status = run_with(options, sources, &args, &sink, Arc::clone(&print));
    Outcome {
        status,
        output: print.output(),
        reports: sink.reports(),
    }
}

fn run_text(text: &str) -> Outcome {
    run_sources(
        &DriverOptions::default(),
        vec![Source::memory("main.kt", text)],
        &[],
    )
}

// Completion

#[test]
fn int_result_is_the_exit_status() {
    let out = run_text("(module (fn main (type int) (block (return (binary + (int 40) (int 2))))))");
    assert_eq!(out.status, 42);
    assert!(out.reports.is_empty());
}

#[test]
fn void_program_exits_zero() {
    let out = run_text(
        "(module (fn main (block
           (intrinsic println (str \"hello\"))
           (intrinsic println (intrinsic int_to_str (intrinsic abs (int -5)))))))",
    );
    assert_eq!(out.status, 0);
    assert_eq!(out.output, "hello\n5\n");
}

#[test]
fn sources_of_one_target_see_each_other() {
    let out = run_sources(
        &DriverOptions::default(),
        vec![
            Source::memory(
                "main.kt",
                "(module (fn main (type int) (block (return (call geo::double (int 21))))))",
            ),
            Source::memory(
                "geo.kt",
                "(module (namespace geo
                   (fn double (params (param x (type int))) (type int)
                     (block (return (binary * (ident x) (int 2)))))))",
            ),
        ],
        &[],
    );
    assert_eq!(out.failures(), Vec::<&Report>::new());
    assert_eq!(out.status, 42);
}

#[test]
fn globals_run_before_the_entry() {
    let out = run_text(
        "(module
           (global banner (str \"ready\"))
           (global base (type int) (int 7))
           (fn main (type int) (block
             (intrinsic println (ident banner))
             (return (binary * (ident base) (int 6))))))",
    );
    assert_eq!(out.output, "ready\n");
    assert_eq!(out.status, 42);
}

#[test]
fn program_arguments_reach_the_intrinsics() {
    let out = run_sources(
        &DriverOptions::default(),
        vec![Source::memory(
            "args.kt",
            "(module (fn main (type int) (block
               (intrinsic println (intrinsic argv (int 0)))
               (return (intrinsic argc)))))",
        )],
        &["first", "second", "third"],
    );
    assert_eq!(out.output, "first\n");
    assert_eq!(out.status, 3);
}

#[test]
fn entry_name_is_configurable() {
    let options = DriverOptions {
        entry: "start".to_string(),
        ..DriverOptions::default()
    };
    let out = run_sources(
        &options,
        vec![Source::memory(
            "start.kt",
            "(module
               (fn main (type int) (block (return (int 1))))
               (fn start (type int) (block (return (int 9)))))",
        )],
        &[],
    );
    assert_eq!(out.status, 9);
}

#[test]
fn file_sources_are_read_from_disk() {
    let dir = std::env::temp_dir().join(format!("kilnc-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("disk.kt");
    std::fs::write(
        &path,
        "; answer from disk\n(module (fn main (type int) (block (return (int 17)))))\n",
    )
    .unwrap();

    let out = run_sources(&DriverOptions::default(), vec![Source::file(&path)], &[]);
    let _ = std::fs::remove_dir_all(&dir);
    assert_eq!(out.status, 17);
}

#[test]
fn uninitialised_local_reads_as_zero() {
    let out = run_text(
        "(module (fn main (type int) (block
           (let x (type int))
           (if (bool false) (block (assign x (int 5))))
           (return (binary + (ident x) (int 7))))))",
    );
    assert!(out.reports.is_empty());
    assert_eq!(out.status, 7);

    let out = run_text(
        "(module
           (class Cell (field v (type int)))
           (fn main (block (let c (type Cell)))))",
    );
    assert_eq!(out.status, 1);
    assert_eq!(out.codes(), vec![ErrorCode::K2001]);
}

// Lowering failures

#[test]
fn lowering_errors_prevent_execution() {
    let out = run_text(
        "(module
           (fn main (block
             (intrinsic println (str \"never\"))
             (let x (int 1))
             (assign x (float 2.5)))))",
    );
    assert_eq!(out.status, 1);
    assert_eq!(out.output, "");
    assert_eq!(out.codes(), vec![ErrorCode::K2001]);
}

#[test]
fn overload_scenarios() {
    let program = |call: &str| {
        format!(
            "(module
               (fn f (params (param x (type int))) (type int) (block (return (int 1))))
               (fn f (params (param x (type float))) (type float) (block (return (float 2.0))))
               (fn main (block (intrinsic println {call}))))"
        )
    };
    assert_eq!(run_text(&program("(call f (int 3))")).output, "1\n");
    assert_eq!(run_text(&program("(call f (float 3.0))")).output, "2.0\n");

    let out = run_text(&program("(call f (str \"x\"))"));
    assert_eq!(out.status, 1);
    assert_eq!(out.codes(), vec![ErrorCode::K2002]);
}

#[test]
fn malformed_tree_is_reported_with_its_location() {
    let out = run_text("(module (fn main (block (return (int 1)))");
    assert_eq!(out.status, 1);
    assert_eq!(out.codes(), vec![ErrorCode::K1001]);
    let location = out.reports[0].location.as_ref().expect("located");
    assert_eq!(&*location.source, "main.kt");
}

#[test]
fn missing_entry_is_an_error() {
    let out = run_text("(module (fn helper (block)))");
    assert_eq!(out.status, 1);
    let failures = out.failures();
    assert_eq!(failures.len(), 1);
    assert!(
        failures[0].message.contains("no function `main`"),
        "{}",
        failures[0].message
    );
}

#[test]
fn warnings_do_not_fail_the_run() {
    let out = run_text(
        "(module (fn main (type int) (block
           (return (int 5))
           (intrinsic println (str \"dead\")))))",
    );
    assert_eq!(out.status, 5);
    assert_eq!(out.codes(), vec![ErrorCode::K3002]);
    assert_eq!(out.reports[0].severity, Severity::Warning);

    let quiet = DriverOptions {
        lower: kiln_lower::LowerOptions {
            warn_unreachable: false,
        },
        ..DriverOptions::default()
    };
    let out = run_sources(
        &quiet,
        vec![Source::memory(
            "main.kt",
            "(module (fn main (type int) (block (return (int 5)) (return (int 6)))))",
        )],
        &[],
    );
    assert_eq!(out.status, 5);
    assert!(out.reports.is_empty());
}

// Runtime faults

#[test]
fn division_by_zero_halts_in_the_dividing_function() {
    let out = run_text(
        "(module
           (fn divide (params (param a (type int)) (param b (type int))) (type int)
             (block (return (binary / (ident a) (ident b)))))
           (fn main (type int) (block
             (intrinsic println (str \"before\"))
             (let r (call divide (int 1) (int 0)))
             (intrinsic println (str \"after\"))
             (return (ident r)))))",
    );
    assert_eq!(out.status, 1);
    assert_eq!(out.output, "before\n");
    assert_eq!(out.codes(), vec![ErrorCode::K6002]);

    let report = &out.reports[0];
    assert_eq!(report.severity, Severity::Error);
    assert!(report.location.is_some());
    assert!(report
        .notes
        .iter()
        .any(|n| n == "while executing `divide`"));
}

#[test]
fn faults_in_multi_source_targets_are_not_located() {
    let out = run_sources(
        &DriverOptions::default(),
        vec![
            Source::memory(
                "main.kt",
                "(module (fn main (block (assert (bool false) (str \"invariant\")))))",
            ),
            Source::memory("empty.kt", "(module)"),
        ],
        &[],
    );
    assert_eq!(out.status, 1);
    assert_eq!(out.codes(), vec![ErrorCode::K6005]);
    assert_eq!(out.reports[0].message, "invariant");
    assert!(out.reports[0].location.is_none());
}

#[test]
fn call_depth_is_bounded_by_the_options() {
    let options = DriverOptions {
        vm: kiln_vm::VmOptions {
            max_call_depth: 32,
            ..kiln_vm::VmOptions::default()
        },
        ..DriverOptions::default()
    };
    let out = run_sources(
        &options,
        vec![Source::memory(
            "deep.kt",
            "(module
               (fn down (params (param n (type int))) (type int)
                 (block
                   (if (binary >= (ident n) (int 40)) (block (return (ident n))))
                   (return (call down (binary + (ident n) (int 1))))))
               (fn main (type int) (block (return (call down (int 0))))))",
        )],
        &[],
    );
    assert_eq!(out.codes(), vec![ErrorCode::K6007]);
    assert_eq!(out.status, 1);

    let out = run_sources(
        &DriverOptions::default(),
        vec![Source::memory(
            "deep.kt",
            "(module
               (fn down (params (param n (type int))) (type int)
                 (block
                   (if (binary >= (ident n) (int 40)) (block (return (ident n))))
                   (return (call down (binary + (ident n) (int 1))))))
               (fn main (type int) (block (return (call down (int 0))))))",
        )],
        &[],
    );
    assert_eq!(out.status, 40);
}

#[test]
fn destructors_run_on_destroy() {
    let out = run_text(
        "(module
           (class Cell (field v (type int))
             (dtor (block (intrinsic println (str \"freed\")))))
           (fn main (type int) (block
             (let c (new Cell (int 8)))
             (let v (get v (ident c)))
             (destroy (ident c))
             (return (ident v)))))",
    );
    assert_eq!(out.output, "freed\n");
    assert_eq!(out.status, 8);
}

#[test]
fn invalid_cast_is_a_runtime_fault() {
    let out = run_text(
        "(module (fn main (type int) (block
           (return (cast (str \"twelve\") (type int)))))))",
    );
    assert_eq!(out.status, 1);
    assert_eq!(out.codes(), vec![ErrorCode::K6003]);
}
