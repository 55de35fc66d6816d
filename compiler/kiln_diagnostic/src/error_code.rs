//! Stable codes for every reported problem.
//!
//! Format: `K####`, where the first digit names the phase:
//! - K1xxx: tree loading
//! - K2xxx: resolution and type inference
//! - K3xxx: lowering
//! - K6xxx: execution
//! - K9xxx: internal compiler errors

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    /// Malformed tree text
    K1001,
    /// Source file could not be read
    K1002,

    /// Type conflict
    K2001,
    /// No matching overload
    K2002,
    /// Ambiguous overload
    K2003,
    /// Unknown identifier
    K2004,
    /// Invalid identifier at declaration
    K2005,
    /// Type of a local could not be inferred
    K2006,

    /// Unexpected node in this context
    K3001,
    /// Unreachable code (warning)
    K3002,
    /// Destroying a value whose class declares no destructor (warning)
    K3003,

    /// Invalid jump label
    K6001,
    /// Division by zero
    K6002,
    /// Invalid cast
    K6003,
    /// Invalid destructor invocation
    K6004,
    /// Assertion failed
    K6005,
    /// Checked arithmetic overflow
    K6006,
    /// Call depth exceeded
    K6007,
    /// Executing an atom that failed to lower
    K6008,
    /// Unexpected opcode
    K6009,

    /// Internal compiler error
    K9001,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::K1001,
        ErrorCode::K1002,
        ErrorCode::K2001,
        ErrorCode::K2002,
        ErrorCode::K2003,
        ErrorCode::K2004,
        ErrorCode::K2005,
        ErrorCode::K2006,
        ErrorCode::K3001,
        ErrorCode::K3002,
        ErrorCode::K3003,
        ErrorCode::K6001,
        ErrorCode::K6002,
        ErrorCode::K6003,
        ErrorCode::K6004,
        ErrorCode::K6005,
        ErrorCode::K6006,
        ErrorCode::K6007,
        ErrorCode::K6008,
        ErrorCode::K6009,
        ErrorCode::K9001,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::K1001 => "K1001",
            ErrorCode::K1002 => "K1002",
            ErrorCode::K2001 => "K2001",
            ErrorCode::K2002 => "K2002",
            ErrorCode::K2003 => "K2003",
            ErrorCode::K2004 => "K2004",
            ErrorCode::K2005 => "K2005",
            ErrorCode::K2006 => "K2006",
            ErrorCode::K3001 => "K3001",
            ErrorCode::K3002 => "K3002",
            ErrorCode::K3003 => "K3003",
            ErrorCode::K6001 => "K6001",
            ErrorCode::K6002 => "K6002",
            ErrorCode::K6003 => "K6003",
            ErrorCode::K6004 => "K6004",
            ErrorCode::K6005 => "K6005",
            ErrorCode::K6006 => "K6006",
            ErrorCode::K6007 => "K6007",
            ErrorCode::K6008 => "K6008",
            ErrorCode::K6009 => "K6009",
            ErrorCode::K9001 => "K9001",
        }
    }

    pub fn parse(code: &str) -> Option<ErrorCode> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    /// Long-form explanation for `kiln explain`.
    pub const fn explanation(self) -> &'static str {
        match self {
            ErrorCode::K1001 => "The tree text is malformed: unbalanced parentheses, an unknown rule name, or a literal after a child node.",
            ErrorCode::K1002 => "A source file named on the command line could not be read.",
            ErrorCode::K2001 => "Two concrete types met where one type was required. Kiln never widens implicitly; insert a `cast`.",
            ErrorCode::K2002 => "No overload accepts the argument types at this call. Overloads are matched by arity and exact parameter types.",
            ErrorCode::K2003 => "More than one overload accepts these arguments and none is more specific on every parameter.",
            ErrorCode::K2004 => "The name is not declared in any enclosing scope. Locals must be declared before use.",
            ErrorCode::K2005 => "The name cannot be declared: it is a reserved word or not a valid identifier or operator spelling.",
            ErrorCode::K2006 => "A local was declared without a type and never received a value, so its type is unknown.",
            ErrorCode::K3001 => "This syntax node is not allowed here, for example a statement in expression position.",
            ErrorCode::K3002 => "Code after `return`, `break` or `continue` never runs.",
            ErrorCode::K3003 => "`destroy` is applied to a class that declares no destructor; executing it will fault.",
            ErrorCode::K6001 => "A jump targets a position outside the body of the function that contains it.",
            ErrorCode::K6002 => "An integer division or remainder had a zero divisor.",
            ErrorCode::K6003 => "The value cannot be converted to the requested type.",
            ErrorCode::K6004 => "`destroy` was executed on a class that declares no destructor.",
            ErrorCode::K6005 => "A runtime assertion failed. This signals a broken invariant, not a recoverable error.",
            ErrorCode::K6006 => "A checked arithmetic operation overflowed its width.",
            ErrorCode::K6007 => "The call stack exceeded the configured maximum depth.",
            ErrorCode::K6008 => "A function whose body failed to lower was called.",
            ErrorCode::K6009 => "The VM met an opcode it does not implement. The IR is corrupt or from an incompatible producer.",
            ErrorCode::K9001 => "An internal consistency check failed. This is a bug in the toolchain, not in the program.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
