use crate::{run, DriverOptions};

use super::sources_of;

/// Lower `paths` as one program and execute its entry function.
pub fn run_files(paths: &[String], options: &DriverOptions, args: &[String]) -> i32 {
    run(options, sources_of(paths), args)
}
