//! The `explain` command: long-form documentation for a report code.

use kiln_diagnostic::ErrorCode;

pub fn explain_error(code: &str) -> i32 {
    let Some(code) = ErrorCode::parse(code) else {
        eprintln!("Unknown error code: {code}");
        eprintln!();
        eprintln!("Codes have the format KXXXX where X is a digit.");
        eprintln!("Known codes:");
        for known in ErrorCode::ALL {
            eprintln!("  {known}");
        }
        return 1;
    };
    println!("{code}: {}", code.explanation());
    0
}
