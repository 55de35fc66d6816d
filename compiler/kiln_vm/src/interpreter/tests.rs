#![allow(
    clippy::expect_used,
    reason = "test code uses unwrap/expect for concise assertions"
)]

use std::sync::Arc;

use kiln_diagnostic::{FaultKind, Reporter, Severity};
use kiln_ir::ir::{Constant, IrSequence, Op, BLUEPRINT_MAGIC};
use kiln_ir::{AtomId, Label, Slot, Span, StringInterner};
use kiln_lower::{LowerOptions, Lowered, Session, SourceUnit};
use kiln_types::{AtomKind, AtomTable, IntrinsicRegistry, TypeId};
use pretty_assertions::assert_eq;
use smallvec::smallvec;

use crate::{buffer_handler, Execution, NativeTable, Value, Vm, VmOptions};

fn lower_with(text: &str, registry: IntrinsicRegistry) -> Lowered {
    let root = kiln_syntax::load_from_memory(text).expect("tree parses");
    let reporter = Reporter::shared();
    let mut session = Session::new(
        Arc::new(StringInterner::new()),
        Arc::new(registry),
        reporter.clone(),
        LowerOptions::default(),
    );
    session.lower_units(&[SourceUnit::new("test.kt", root)]);
    session.finish()
}

fn lower(text: &str) -> Lowered {
    let lowered = lower_with(text, IntrinsicRegistry::standard());
    assert_eq!(lowered.errors, 0, "program should lower cleanly");
    lowered
}

fn entry(atoms: &AtomTable, name: &str) -> AtomId {
    atoms.lookup_path(atoms.root(), name).expect("declared")[0]
}

fn exec_with(lowered: &Lowered, options: VmOptions, args: &[&str]) -> (Execution, String) {
    let natives = NativeTable::standard();
    let print = buffer_handler();
    let main = entry(&lowered.atoms, "main");
    let mut vm = Vm::new(&lowered.atoms, &natives, options, print.clone())
        .with_args(args.iter().copied());
    let result = vm.run(lowered.init, main);
    (result, print.output())
}

fn exec(text: &str) -> (Execution, String) {
    exec_with(&lower(text), VmOptions::default(), &[])
}

fn fault_kind(execution: &Execution) -> Option<FaultKind> {
    execution.fault().map(|f| f.kind)
}

#[test]
fn returns_int_as_exit_status() {
    let (result, _) =
        exec("(module (fn main (type int) (block (return (binary + (int 40) (int 2))))))");
    assert_eq!(result, Execution::Completed(Value::Int(42)));
    assert_eq!(result.exit_status(), 42);
}

#[test]
fn void_entry_exits_zero_and_prints() {
    let (result, out) = exec(
        "(module (fn main (block
           (intrinsic println (str \"hello\"))
           (intrinsic print (int 7))
           (intrinsic print (bool true)))))",
    );
    assert_eq!(result.exit_status(), 0);
    assert_eq!(out, "hello\n7true");
}

#[test]
fn recursion_and_branches() {
    let (result, _) = exec(
        "(module
           (fn fact (params (param n (type int))) (type int)
             (block
               (if (binary <= (ident n) (int 1)) (block (return (int 1))))
               (return (binary * (ident n) (call fact (binary - (ident n) (int 1)))))))
           (fn main (type int) (block (return (binary % (call fact (int 10)) (int 256))))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(3_628_800 % 256)));
}

#[test]
fn loops_with_break_and_logic() {
    let (result, _) = exec(
        "(module (fn main (type int) (block
           (let i (int 0))
           (let sum (int 0))
           (while (bool true) (block
             (assign i (binary + (ident i) (int 1)))
             (if (and (binary > (ident i) (int 10)) (bool true)) (block (break)))
             (if (or (binary == (binary % (ident i) (int 2)) (int 0)) (bool false))
               (block (continue)))
             (assign sum (binary + (ident sum) (ident i)))))
           (return (ident sum)))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(1 + 3 + 5 + 7 + 9)));
}

#[test]
fn globals_are_initialised_before_entry() {
    let (result, out) = exec(
        "(module
           (global greeting (str \"hi\"))
           (global counter (type int) (int 40))
           (fn bump (block (assign counter (binary + (ident counter) (int 1)))))
           (fn main (type int) (block
             (intrinsic println (ident greeting))
             (call bump)
             (call bump)
             (return (ident counter)))))",
    );
    assert_eq!(out, "hi\n");
    assert_eq!(result.exit_status(), 42);
}

#[test]
fn global_read_before_its_initializer_faults() {
    let (result, _) = exec(
        "(module
           (global a (type int) (ident b))
           (global b (type int) (int 2))
           (fn main (block)))",
    );
    assert_eq!(fault_kind(&result), Some(FaultKind::InvalidAtom));
    assert_eq!(result.exit_status(), 1);
}

#[test]
fn overloads_dispatch_by_argument_type() {
    let (_, out) = exec(
        "(module
           (fn show (params (param x (type int))) (block (intrinsic println (str \"int\"))))
           (fn show (params (param x (type float))) (block (intrinsic println (str \"float\"))))
           (fn main (block
             (call show (int 3))
             (call show (float 3.0))
             (let h (ident show))
             (call h (int 1)))))",
    );
    assert_eq!(out, "int\nfloat\nint\n");
}

#[test]
fn closures_are_first_class() {
    let (result, _) = exec(
        "(module
           (fn apply (params (param f (type fn (type int) (type int))) (param v (type int)))
             (type int)
             (block (return (call f (ident v)))))
           (fn main (type int) (block
             (let twice (closure (params (param x (type int))) (type int)
               (binary * (ident x) (int 2))))
             (return (call apply (ident twice) (int 21))))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(42)));
}

const POINT: &str = "
  (class Point (field x (type int)) (field y (type int))
    (fn sum (type int)
      (block (return (binary + (get x (ident self)) (get y (ident self))))))
    (dtor (block (intrinsic println (str \"bye\")))))
  (fn operator+ (params (param a (type Point)) (param b (type Point))) (type Point)
    (block (return (new Point
      (binary + (get x (ident a)) (get x (ident b)))
      (binary + (get y (ident a)) (get y (ident b)))))))";

#[test]
fn objects_methods_and_destructors() {
    let (result, out) = exec(&format!(
        "(module {POINT}
           (fn main (type int) (block
             (let p (binary + (new Point (int 1) (int 2)) (new Point (int 3) (int 4))))
             (set y (ident p) (int 30))
             (let total (method sum (ident p)))
             (destroy (ident p))
             (return (ident total)))))"
    ));
    assert_eq!(out, "bye\n");
    assert_eq!(result, Execution::Completed(Value::Int(34)));
}

#[test]
fn destroying_twice_faults() {
    let (result, out) = exec(&format!(
        "(module {POINT}
           (fn main (block
             (let p (new Point (int 1) (int 2)))
             (destroy (ident p))
             (destroy (ident p)))))"
    ));
    assert_eq!(out, "bye\n");
    assert_eq!(fault_kind(&result), Some(FaultKind::InvalidDtor));
}

#[test]
fn destroy_without_destructor_faults() {
    let lowered = lower_with(
        "(module (class Bag (field n (type int)))
           (fn main (block (destroy (new Bag (int 1))))))",
        IntrinsicRegistry::standard(),
    );
    assert_eq!(lowered.warnings, 1);
    let (result, _) = exec_with(&lowered, VmOptions::default(), &[]);
    let fault = result.fault().expect("faulted");
    assert_eq!(fault.kind, FaultKind::InvalidDtor);
    assert_eq!(fault.message, "class `Bag` declares no destructor");
}

#[test]
fn division_by_zero_names_enclosing_function() {
    let lowered = lower(
        "(module
           (fn divide (params (param a (type int)) (param b (type int))) (type int)
             (block (return (binary / (ident a) (ident b)))))
           (fn main (type int) (block
             (intrinsic println (str \"before\"))
             (let r (call divide (int 1) (int 0)))
             (intrinsic println (str \"after\"))
             (return (ident r)))))",
    );
    let (result, out) = exec_with(&lowered, VmOptions::default(), &[]);
    assert_eq!(out, "before\n");
    let fault = result.fault().expect("faulted");
    assert_eq!(fault.kind, FaultKind::DivideByZero);
    assert_eq!(fault.atom, Some(entry(&lowered.atoms, "divide")));
    assert!(fault.span.is_some());
    assert_eq!(result.exit_status(), 1);
}

#[test]
fn checked_arithmetic_overflows() {
    let (result, _) = exec(
        "(module (fn main (type int) (block
           (let b (type byte) (binary checked+ (int 250 (type byte)) (int 10)))
           (return (int 0)))))",
    );
    assert_eq!(fault_kind(&result), Some(FaultKind::Overflow));
}

#[test]
fn wrapping_arithmetic_uses_slot_width() {
    let (result, _) = exec(
        "(module (fn main (type int) (block
           (let b (type byte) (binary + (int 250 (type byte)) (int 10)))
           (return (cast (ident b) (type int))))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(4)));
}

#[test]
fn uninitialised_locals_hold_their_default() {
    let (result, _) = exec(
        "(module (fn main (type int) (block
           (let x (type int))
           (return (binary + (ident x) (int 1))))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(1)));

    let (result, _) = exec(
        "(module (fn main (type int) (block
           (let x (type int))
           (if (bool false) (block (assign x (int 5))))
           (return (ident x)))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(0)));

    let (result, out) = exec(
        "(module (fn main (type int) (block
           (let s (type str))
           (let b (type bool))
           (intrinsic println (ident s))
           (if (ident b) (block (return (int 1))))
           (return (int 2)))))",
    );
    assert_eq!(out, "\n");
    assert_eq!(result, Execution::Completed(Value::Int(2)));
}

#[test]
fn untyped_local_reads_default_before_assignment() {
    let (result, _) = exec(
        "(module (fn main (type int) (block
           (let n)
           (let m (ident n))
           (assign n (int 3))
           (return (binary + (ident m) (ident n))))))",
    );
    assert_eq!(result, Execution::Completed(Value::Int(3)));
}

#[test]
fn casts_are_checked_at_run_time() {
    let (ok, _) =
        exec("(module (fn main (type int) (block (return (cast (str \"12\") (type int))))))");
    assert_eq!(ok, Execution::Completed(Value::Int(12)));

    let (bad, _) =
        exec("(module (fn main (type int) (block (return (cast (str \"x\") (type int))))))");
    assert_eq!(fault_kind(&bad), Some(FaultKind::InvalidCast));

    let (illegal, _) =
        exec("(module (fn main (block (let s (cast (bool true) (type float))))))");
    assert_eq!(fault_kind(&illegal), Some(FaultKind::InvalidCast));
}

#[test]
fn failed_assert_carries_message() {
    let (result, _) = exec(
        "(module (fn main (block (assert (binary == (int 1) (int 2)) (str \"one is two\")))))",
    );
    let fault = result.fault().expect("faulted");
    assert_eq!(fault.kind, FaultKind::Assert);
    assert_eq!(fault.message, "one is two");
}

#[test]
fn deep_recursion_overflows_the_call_stack() {
    let lowered = lower(
        "(module
           (fn down (params (param n (type int))) (type int)
             (block (return (call down (binary + (ident n) (int 1))))))
           (fn main (type int) (block (return (call down (int 0))))))",
    );
    let options = VmOptions {
        max_call_depth: 64,
        ..VmOptions::default()
    };
    let (result, _) = exec_with(&lowered, options, &[]);
    assert_eq!(fault_kind(&result), Some(FaultKind::StackOverflow));
}

#[test]
fn calling_an_invalid_atom_faults() {
    let lowered = lower_with(
        "(module
           (fn broken (block (let x (ident nope))))
           (fn main (block (intrinsic println (str \"start\")) (call broken))))",
        IntrinsicRegistry::standard(),
    );
    assert_eq!(lowered.errors, 1);
    let (result, out) = exec_with(&lowered, VmOptions::default(), &[]);
    assert_eq!(out, "start\n");
    let fault = result.fault().expect("faulted");
    assert_eq!(fault.kind, FaultKind::InvalidAtom);
    assert_eq!(fault.atom, Some(entry(&lowered.atoms, "broken")));
}

#[test]
fn program_arguments_reach_natives() {
    let lowered = lower(
        "(module (fn main (type int) (block
           (intrinsic println (intrinsic concat (intrinsic argv (int 1)) (str \"!\")))
           (return (intrinsic argc)))))",
    );
    let (result, out) = exec_with(&lowered, VmOptions::default(), &["a", "bc"]);
    assert_eq!(out, "bc!\n");
    assert_eq!(result.exit_status(), 2);
}

#[test]
fn missing_native_handler_is_internal() {
    let mut registry = IntrinsicRegistry::standard();
    registry
        .register("mystery", &[], TypeId::INT)
        .expect("registers");
    let lowered = lower_with(
        "(module (fn main (type int) (block (return (intrinsic mystery)))))",
        registry,
    );
    let (result, _) = exec_with(&lowered, VmOptions::default(), &[]);
    assert!(result.fault().is_some_and(kiln_diagnostic::Fault::is_ice));
    assert_eq!(result.exit_status(), 70);
    let report = result.fault().expect("faulted").to_report(None);
    assert_eq!(report.severity, Severity::Ice);
}

// Hand-built bodies

/// A `main` atom whose body is `ops`, built against the table's interner.
fn hand_built(
    slot_types: &[TypeId],
    ops: impl FnOnce(&StringInterner) -> Vec<Op>,
) -> (AtomTable, AtomId) {
    let mut atoms = AtomTable::new(Arc::new(StringInterner::new()));
    let root = atoms.root();
    let id = atoms
        .declare(root, "main", AtomKind::Function, Span::DUMMY)
        .expect("declares");
    atoms.set_signature(id, &[], TypeId::VOID).expect("signature");
    for &ty in slot_types {
        let clid = atoms.declare_slot(id);
        atoms.unify(clid, ty).expect("unifies");
    }
    let mut seq = IrSequence::new();
    seq.push(
        Op::BlueprintBegin {
            magic: BLUEPRINT_MAGIC,
            atom: id,
        },
        Span::DUMMY,
    );
    for op in ops(atoms.interner()) {
        seq.push(op, Span::DUMMY);
    }
    seq.push(
        Op::BlueprintEnd {
            magic: BLUEPRINT_MAGIC,
            atom: id,
        },
        Span::DUMMY,
    );
    atoms.set_body(id, seq);
    atoms.classdefs_mut().freeze(id);
    (atoms, id)
}

fn run_hand_built(atoms: &AtomTable, id: AtomId) -> (Execution, String) {
    let natives = NativeTable::standard();
    let print = buffer_handler();
    let result = Vm::new(atoms, &natives, VmOptions::default(), print.clone()).run(None, id);
    (result, print.output())
}

/// `println(text)` through slot 0, result in slot 1.
fn println_ops(interner: &StringInterner, text: &str) -> [Op; 2] {
    [
        Op::Const {
            dst: Slot::new(0),
            value: Constant::Str(interner.intern(text)),
        },
        Op::Intrinsic {
            dst: Slot::new(1),
            name: interner.intern("println"),
            args: smallvec![Slot::new(0)],
        },
    ]
}

#[test]
fn jump_past_sequence_end_faults_before_next_op() {
    let (atoms, id) = hand_built(&[TypeId::STR, TypeId::VOID], |interner| {
        let mut ops = Vec::new();
        ops.extend(println_ops(interner, "a"));
        ops.push(Op::Jump {
            target: Label::new(99),
        });
        ops.extend(println_ops(interner, "b"));
        ops
    });
    let (result, out) = run_hand_built(&atoms, id);
    assert_eq!(out, "a\n");
    let fault = result.fault().expect("faulted");
    assert_eq!(fault.kind, FaultKind::InvalidLabel);
    assert_eq!(fault.label, Some(Label::new(99)));
    assert_eq!(fault.atom, Some(id));
}

#[test]
fn jump_onto_begin_marker_is_rejected() {
    let (atoms, id) = hand_built(&[], |_| {
        vec![Op::Jump {
            target: Label::new(0),
        }]
    });
    let (result, _) = run_hand_built(&atoms, id);
    assert_eq!(fault_kind(&result), Some(FaultKind::InvalidLabel));
}

#[test]
fn backward_jump_inside_blueprint_runs() {
    // counter = 0; loop: counter += 1; if counter < 3 goto loop
    let (atoms, id) = hand_built(
        &[TypeId::INT, TypeId::INT, TypeId::INT, TypeId::BOOL],
        |_| {
            vec![
                Op::Const {
                    dst: Slot::new(0),
                    value: Constant::Int(0),
                },
                Op::Const {
                    dst: Slot::new(1),
                    value: Constant::Int(1),
                },
                Op::Const {
                    dst: Slot::new(2),
                    value: Constant::Int(3),
                },
                Op::Binary {
                    op: kiln_ir::ir::BinOp::Add,
                    dst: Slot::new(0),
                    lhs: Slot::new(0),
                    rhs: Slot::new(1),
                },
                Op::Binary {
                    op: kiln_ir::ir::BinOp::Lt,
                    dst: Slot::new(3),
                    lhs: Slot::new(0),
                    rhs: Slot::new(2),
                },
                Op::JumpIf {
                    cond: Slot::new(3),
                    target: Label::new(4),
                },
                Op::Return {
                    value: Some(Slot::new(0)),
                },
            ]
        },
    );
    let (result, _) = run_hand_built(&atoms, id);
    assert_eq!(result, Execution::Completed(Value::Int(3)));
}

#[test]
fn unknown_opcode_reports_its_mnemonic() {
    let (atoms, id) = hand_built(&[], |interner| {
        vec![Op::Unknown {
            code: 0x7f,
            mnemonic: Some(interner.intern("vector.splat")),
        }]
    });
    let (result, _) = run_hand_built(&atoms, id);
    let fault = result.fault().expect("faulted");
    assert_eq!(fault.kind, FaultKind::UnexpectedOpcode);
    assert_eq!(fault.opcode.as_deref(), Some("vector.splat"));
}

#[test]
fn mismatched_end_marker_is_internal() {
    let (mut atoms, id) = hand_built(&[], |_| Vec::new());
    let mut seq = IrSequence::new();
    seq.push(
        Op::BlueprintBegin {
            magic: BLUEPRINT_MAGIC,
            atom: id,
        },
        Span::DUMMY,
    );
    seq.push(
        Op::BlueprintEnd {
            magic: BLUEPRINT_MAGIC,
            atom: AtomId::new(77),
        },
        Span::DUMMY,
    );
    atoms.set_body(id, seq);
    let (result, _) = run_hand_built(&atoms, id);
    assert!(result.fault().is_some_and(kiln_diagnostic::Fault::is_ice));
}
