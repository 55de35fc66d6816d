#![allow(
    clippy::expect_used,
    reason = "test code uses unwrap/expect for concise assertions"
)]

use std::sync::Arc;

use kiln_diagnostic::{ErrorCode, Reporter};
use kiln_types::IntrinsicRegistry;
use pretty_assertions::assert_eq;

use crate::commands::render_ir;
use crate::{lower_targets_parallel, DriverError, DriverOptions, Source, Target};

const ANSWER: &str = "(module (fn main (type int) (block (return (binary + (int 40) (int 2))))))";

fn registry() -> Arc<IntrinsicRegistry> {
    Arc::new(IntrinsicRegistry::standard())
}

fn codes(reporter: &Reporter) -> Vec<ErrorCode> {
    reporter.reports().iter().filter_map(|r| r.code).collect()
}

#[test]
fn memory_source_produces_a_named_unit() {
    let source = Source::memory("answer.kt", ANSWER);
    assert_eq!(&*source.name(), "answer.kt");
    assert_eq!(&*source.read().expect("in memory"), ANSWER);

    let unit = source.produce_ast().expect("parses");
    assert_eq!(&*unit.name, "answer.kt");
}

#[test]
fn unreadable_file_is_reported_before_lowering() {
    let sink = Reporter::shared();
    let target = Target::new(
        "missing",
        vec![Source::file("/nonexistent/kiln/missing.kt")],
    );
    let err = target
        .lower_all(&registry(), &sink)
        .err()
        .expect("load fails");

    assert!(matches!(err, DriverError::Load { count: 1, .. }));
    assert!(err.is_reported());
    assert_eq!(codes(&sink), vec![ErrorCode::K1002]);
    assert!(sink.has_failed());
}

#[test]
fn every_malformed_source_is_reported() {
    let sink = Reporter::shared();
    let target = Target::new(
        "broken",
        vec![
            Source::memory("a.kt", "(module (fn main (block)"),
            Source::memory("b.kt", ANSWER),
            Source::memory("c.kt", "(modul)"),
        ],
    );
    let err = target.lower_all(&registry(), &sink).err().expect("fails");

    assert!(matches!(err, DriverError::Load { count: 2, .. }));
    assert_eq!(codes(&sink), vec![ErrorCode::K1001, ErrorCode::K1001]);
    let names: Vec<String> = sink
        .reports()
        .iter()
        .filter_map(|r| r.location.as_ref().map(|l| l.source.to_string()))
        .collect();
    assert_eq!(names, vec!["a.kt".to_string(), "c.kt".to_string()]);
}

#[test]
fn target_without_sources_is_rejected() {
    let sink = Reporter::shared();
    let err = Target::new("empty", Vec::new())
        .lower_all(&registry(), &sink)
        .err()
        .expect("fails");
    assert!(matches!(err, DriverError::NoSources { .. }));
    assert!(!err.is_reported());
    assert!(sink.reports().is_empty());
}

#[test]
fn lowering_errors_stop_the_target() {
    let sink = Reporter::shared();
    let target = Target::new(
        "conflict",
        vec![Source::memory(
            "conflict.kt",
            "(module (fn main (block (let x (int 1)) (assign x (float 2.5)))))",
        )],
    );
    let err = target.lower_all(&registry(), &sink).err().expect("fails");
    assert!(matches!(err, DriverError::Lowering { errors: 1, .. }));
    assert_eq!(codes(&sink), vec![ErrorCode::K2001]);
}

#[test]
fn entry_must_be_a_function_without_parameters() {
    let sink = Reporter::shared();
    let compiled = Target::new(
        "entries",
        vec![Source::memory(
            "entries.kt",
            "(module
               (global start (int 1))
               (fn main (params (param x (type int))) (block))
               (fn main (block))
               (fn helper (params (param x (type int))) (block)))",
        )],
    )
    .lower_all(&registry(), &sink)
    .expect("lowers");

    let main = compiled.entry("main").expect("zero-argument overload");
    assert_eq!(compiled.lowered.atoms[main].arity(), 0);
    assert!(matches!(
        compiled.entry("helper"),
        Err(DriverError::MissingEntry { .. })
    ));
    assert!(matches!(
        compiled.entry("start"),
        Err(DriverError::MissingEntry { .. })
    ));
    assert!(matches!(
        compiled.entry("nowhere"),
        Err(DriverError::MissingEntry { .. })
    ));
}

#[test]
fn ir_listing_covers_every_body() {
    let sink = Reporter::shared();
    let compiled = Target::new(
        "listing",
        vec![Source::memory(
            "listing.kt",
            "(module
               (global g (int 1))
               (fn main (type int) (block (return (ident g)))))",
        )],
    )
    .lower_all(&registry(), &sink)
    .expect("lowers");

    let text = render_ir(&compiled);
    let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("; ")).collect();
    assert_eq!(headers.len(), 2, "{text}");
    assert!(headers.iter().any(|h| h.starts_with("; main (atom#")));
    assert!(headers.iter().any(|h| h.starts_with("; {init} (atom#")));
    assert_eq!(text.matches("blueprint.begin").count(), 2);
    assert_eq!(text.matches("blueprint.end").count(), 2);
}

#[test]
fn parallel_targets_keep_their_order_and_share_the_sink() {
    let targets: Vec<Target> = (0..6)
        .map(|i| {
            let text = if i == 3 {
                "(module (fn main (block (let x (ident nope)))))".to_string()
            } else {
                format!("(module (fn main (type int) (block (return (int {i})))))")
            };
            Target::new(format!("t{i}"), vec![Source::memory(format!("t{i}.kt"), text)])
        })
        .collect();

    let sink = Reporter::shared();
    let results = lower_targets_parallel(&targets, &registry(), &sink, 2);
    assert_eq!(results.len(), 6);
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(compiled) => assert_eq!(compiled.name, format!("t{i}")),
            Err(err) => {
                assert_eq!(i, 3);
                assert!(matches!(err, DriverError::Lowering { .. }));
            }
        }
    }
    assert_eq!(codes(&sink), vec![ErrorCode::K2004]);
}

#[test]
fn parallel_targets_own_separate_tables() {
    let text = "(module (fn f (params (param x (type int))) (type int) (block (return (ident x))))
                        (fn main (type int) (block (return (call f (int 1))))))";
    let targets: Vec<Target> = (0..4)
        .map(|i| Target::new(format!("t{i}"), vec![Source::memory("same.kt", text)]))
        .collect();
    let sink = Reporter::shared();
    let results = lower_targets_parallel(&targets, &registry(), &sink, 0);

    let sizes: Vec<usize> = results
        .iter()
        .map(|r| r.as_ref().expect("lowers").lowered.atoms.len())
        .collect();
    assert_eq!(sizes, vec![sizes[0]; 4]);
    assert!(!sink.has_failed());
}

#[test]
fn default_options() {
    let options = DriverOptions::default();
    assert_eq!(options.entry, "main");
    assert_eq!(options.jobs, 0);
    assert_eq!(options.vm.max_call_depth, 1024);
    assert!(!options.vm.trace_ops);
    assert!(options.lower.warn_unreachable);
}
