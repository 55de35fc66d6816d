use super::*;

#[test]
fn nested_tree_depth_is_counted_without_overflow() {
    fn depth(n: u32) -> u32 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { depth(n - 1) + 1 })
    }

    // Far deeper than an 8MB main-thread stack allows without growth.
    assert_eq!(depth(200_000), 200_000);
}

#[test]
fn result_passes_through() {
    let lowered: Result<u32, String> = ensure_sufficient_stack(|| Ok(7));
    assert_eq!(lowered, Ok(7));
}

#[test]
fn remaining_stack_is_reported_on_native() {
    #[cfg(not(target_arch = "wasm32"))]
    assert!(remaining_stack().is_some());
}
