//! End-to-end scenarios: translate a source program, run the image, check
//! the captured output.

use stackarch_core::isa::{self, ImageRecord};
use stackarch_core::machine::{MachineConfig, Outcome, Run, run_image};
use stackarch_forthc::translate;

fn compile_and_run(src: &str, input: &str) -> Run {
    let image = translate(src, 0, 10).expect("source compiles");
    let config = MachineConfig {
        input: input.to_string(),
        ..MachineConfig::default()
    };
    run_image(&image, &config).expect("program runs to a normal stop")
}

#[test]
fn test_hello() {
    let run = compile_and_run(".\" Hello\"", "");
    assert_eq!(run.output, "Hello");
    assert_eq!(run.outcome, Outcome::Halted);
}

#[test]
fn test_echo_until_nul() {
    let run = compile_and_run(": main begin key dup emit 0 = until ; main", "hi\0");
    assert_eq!(run.output_raw, vec![104, 105, 0]);
    assert_eq!(run.outcome, Outcome::Halted);
}

#[test]
fn test_sum_one_to_ten() {
    let run = compile_and_run(": s 0 10 1 do i + loop . ; s", "");
    assert_eq!(run.output, "55");
    assert_eq!(run.outcome, Outcome::Halted);
}

#[test]
fn test_factorial_of_five_by_recursion() {
    let run = compile_and_run(": f dup 1 = if drop 1 else dup 1 - f * then ; 5 f .", "");
    assert_eq!(run.output, "120");
    assert_eq!(run.outcome, Outcome::Halted);
}

#[test]
fn test_variable_store_fetch_print() {
    let run = compile_and_run("variable x 7 x ! x @ .", "");
    assert_eq!(run.output, "7");
    assert_eq!(run.outcome, Outcome::Halted);
}

#[test]
fn test_negative_number_printing() {
    let run = compile_and_run("0 25 - .", "");
    assert_eq!(run.output, "-25");
}

#[test]
fn test_zero_prints_as_single_digit() {
    let run = compile_and_run("0 .", "");
    assert_eq!(run.output, "0");
}

#[test]
fn test_leave_exits_loop_early() {
    let run = compile_and_run(": s 0 9 1 do i + i 3 = if leave then loop . ; s", "");
    // 1 + 2 + 3, then leave
    assert_eq!(run.output, "6");
    assert_eq!(run.outcome, Outcome::Halted);
}

#[test]
fn test_conditional_branches_both_ways() {
    let run = compile_and_run(": pick if 10 else 20 then . ; 1 pick 0 pick", "");
    assert_eq!(run.output, "1020");
}

#[test]
fn test_run_reports_cache_statistics() {
    let run = compile_and_run(".\" x\"", "");
    assert!(run.cache_hits <= run.cache_requests);
    assert!(run.cache_requests > 0);
    assert!((0.0..=1.0).contains(&run.miss_rate()));
}

#[test]
fn test_image_survives_serialization_round_trip() {
    let image = translate(": s 0 3 1 do i + loop . ; s", 0, 10).unwrap();
    let text = isa::code_to_string(&image);
    let reread: Vec<ImageRecord> = serde_json::from_str(&text).unwrap();
    assert_eq!(reread, image);
    let a = run_image(&image, &MachineConfig::default()).unwrap();
    let b = run_image(&reread, &MachineConfig::default()).unwrap();
    assert_eq!(a.output, b.output);
    assert_eq!(a.ticks, b.ticks);
}

#[test]
fn test_end_to_end_determinism() {
    let src = ": s 0 10 1 do i + loop . ; s";
    let a = compile_and_run(src, "");
    let b = compile_and_run(src, "");
    assert_eq!(a.output, b.output);
    assert_eq!(a.ticks, b.ticks);
    assert_eq!(a.cache_requests, b.cache_requests);
    assert_eq!(a.cache_hits, b.cache_hits);
}
