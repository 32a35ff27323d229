//! End-to-end tests: compile C-subset source, run it on a process, and
//! compare the exact characters written to the stdout sink.

use crate::compiler::compile;
use crate::process::state::ProcessState;
use crate::process::vm::{OutputSink, Process};
use std::sync::{Arc, Mutex};

fn capture() -> (Arc<Mutex<String>>, Box<dyn OutputSink>) {
    let buffer = Arc::new(Mutex::new(String::new()));
    let sink = buffer.clone();
    (
        buffer,
        Box::new(move |text: &str| sink.lock().unwrap().push_str(text)),
    )
}

/// Compiles and runs `source` to completion, returning everything written
/// to stdout. Panics if the program suspends on input.
fn run_source(source: &str) -> String {
    run_with_input(source, &[])
}

/// Compiles and runs `source`, feeding `lines` one at a time whenever the
/// process suspends on input.
fn run_with_input(source: &str, lines: &[&str]) -> String {
    let output = compile(source).expect("compilation failed");
    let (buffer, sink) = capture();
    let mut process = Process::new(100, output.bytecode, output.data, sink);

    let mut inputs = lines.iter();
    loop {
        while process.step(1024) {}
        match process.state() {
            ProcessState::Terminated => break,
            ProcessState::WaitingInput => {
                let line = inputs.next().expect("program wants more input than provided");
                process.resolve_input(line);
            }
            ProcessState::Running => unreachable!("step reported false while running"),
        }
    }

    let captured = buffer.lock().unwrap().clone();
    captured
}

fn compile_err(source: &str) -> String {
    compile(source).unwrap_err().to_string()
}

// ==================== End-to-end scenarios ====================

#[test]
fn hello_world() {
    let source = r#"int main(){ printf("Hello, Optimus-OS!\n"); }"#;
    assert_eq!(run_source(source), "Hello, Optimus-OS!\n");
}

#[test]
fn counting_for_loop() {
    let source = r#"int main(){ int i; for(i=1;i<=5;i=i+1) printf("%d ", i); printf("\n"); }"#;
    assert_eq!(run_source(source), "1 2 3 4 5 \n");
}

#[test]
fn macro_bound_loop() {
    let source = "#define MAX 3\nint main(){ int i; for(i=0;i<MAX;i=i+1) printf(\"%d,\", i); }";
    assert_eq!(run_source(source), "0,1,2,");
}

#[test]
fn sqrt_prints_with_default_precision() {
    let source = r#"int main(){ int a=9; printf("%f\n", sqrt(a)); }"#;
    assert_eq!(run_source(source), "3.000000\n");
}

#[test]
fn scanf_branches_on_input() {
    let source =
        r#"int main(){ int d; scanf("%d", &d); if(d<18) printf("minor"); else printf("adult"); }"#;
    assert_eq!(run_with_input(source, &["21"]), "adult");
    assert_eq!(run_with_input(source, &["9"]), "minor");
}

#[test]
fn continue_and_break_in_a_loop() {
    let source = r#"int main(){ int i; for(i=0;i<5;i=i+1){ if(i==2) continue; if(i==4) break; printf("%d", i);} }"#;
    assert_eq!(run_source(source), "013");
}

#[test]
fn switch_fall_through() {
    let source = r#"int main(){ int x=2; switch(x){ case 1: printf("a"); break; case 2: printf("b"); case 3: printf("c"); break; default: printf("d"); } }"#;
    assert_eq!(run_source(source), "bc");
}

// ==================== Statements and control flow ====================

#[test]
fn switch_takes_default_when_nothing_matches() {
    let source = r#"int main(){ int x=9; switch(x){ case 1: printf("a"); break; default: printf("d"); } }"#;
    assert_eq!(run_source(source), "d");
}

#[test]
fn switch_without_match_or_default_does_nothing() {
    let source = r#"int main(){ int x=9; switch(x){ case 1: printf("a"); } printf("after"); }"#;
    assert_eq!(run_source(source), "after");
}

#[test]
fn negative_case_constant_matches() {
    let source = r#"int main(){ int x; x = -1; switch(x){ case -1: printf("neg"); break; default: printf("other"); } }"#;
    assert_eq!(run_source(source), "neg");
}

#[test]
fn char_case_constant_matches() {
    let source = r#"int main(){ switch('b'){ case 'a': printf("a"); break; case 'b': printf("b"); break; } }"#;
    assert_eq!(run_source(source), "b");
}

#[test]
fn do_while_runs_body_first() {
    let source = r#"int main(){ int i=10; do { printf("%d", i); i = i + 1; } while(i<3); }"#;
    assert_eq!(run_source(source), "10");
}

#[test]
fn do_while_continue_targets_the_condition() {
    let source = r#"int main(){ int i=0; do { i = i + 1; if(i==2) continue; printf("%d", i); } while(i<4); }"#;
    assert_eq!(run_source(source), "134");
}

#[test]
fn while_loop_counts_down() {
    let source = r#"int main(){ int n=3; while(n>0){ printf("%d", n); n = n - 1; } }"#;
    assert_eq!(run_source(source), "321");
}

#[test]
fn for_with_empty_condition_breaks_out() {
    let source = r#"int main(){ int i; for(i=0;;i=i+1){ if(i==3) break; } printf("%d", i); }"#;
    assert_eq!(run_source(source), "3");
}

#[test]
fn nested_loops_bind_break_to_the_inner_one() {
    let source = r#"int main(){ int i; int j; for(i=0;i<2;i=i+1){ for(j=0;j<5;j=j+1){ if(j==1) break; printf("%d%d ", i, j); } } }"#;
    assert_eq!(run_source(source), "00 10 ");
}

#[test]
fn return_halts_execution() {
    let source = r#"int main(){ printf("a"); return 0; printf("b"); }"#;
    assert_eq!(run_source(source), "a");
}

// ==================== Expressions ====================

#[test]
fn arithmetic_precedence() {
    let source = r#"int main(){ printf("%d %d %d", 2+3*4, (2+3)*4, 7%3); }"#;
    assert_eq!(run_source(source), "14 20 1");
}

#[test]
fn unary_operators() {
    let source = r#"int main(){ printf("%d%d%d", !0, !5, -(2+1)); }"#;
    assert_eq!(run_source(source), "10-3");
}

#[test]
fn comparisons_yield_one_or_zero() {
    let source = r#"int main(){ printf("%d%d%d%d", 1<2, 2<=1, 3==3, 3!=3); }"#;
    assert_eq!(run_source(source), "1010");
}

#[test]
fn assignment_is_an_expression_with_a_value() {
    let source = r#"int main(){ int a; int b; a = b = 5; printf("%d%d", a, b); }"#;
    assert_eq!(run_source(source), "55");
}

#[test]
fn pow_builtin() {
    let source = r#"int main(){ printf("%d", pow(2, 10)); }"#;
    assert_eq!(run_source(source), "1024");
}

#[test]
fn trig_builtins_at_zero() {
    let source = r#"int main(){ printf("%f %f %f", sin(0), cos(0), tan(0)); }"#;
    assert_eq!(run_source(source), "0.000000 1.000000 0.000000");
}

#[test]
fn abs_builtin() {
    let source = r#"int main(){ int a; a = -7; printf("%d", abs(a)); }"#;
    assert_eq!(run_source(source), "7");
}

// ==================== Memory: arrays, pointers, heap ====================

#[test]
fn array_elements_store_and_load() {
    let source = r#"int main(){ int a[3]; a[0]=1; a[2]=7; printf("%d%d", a[0], a[2]); }"#;
    assert_eq!(run_source(source), "17");
}

#[test]
fn array_element_assignment_keeps_a_value() {
    let source = r#"int main(){ int a[2]; printf("%d", a[0] = 9); }"#;
    assert_eq!(run_source(source), "9");
}

#[test]
fn malloc_pointer_roundtrip() {
    let source = r#"int main(){ int *p; p = malloc(8); *p = 5; printf("%d", *p); }"#;
    assert_eq!(run_source(source), "5");
}

#[test]
fn address_of_and_dereference() {
    let source = r#"int main(){ int x; int *p; x = 3; p = &x; printf("%d", *p); }"#;
    assert_eq!(run_source(source), "3");
}

#[test]
fn double_locals_keep_full_precision() {
    let source = r#"int main(){ double d = 0.1; printf("%.10f", d); }"#;
    assert_eq!(run_source(source), "0.1000000000");
}

#[test]
fn float_locals_are_single_precision() {
    let source = r#"int main(){ float f = 0.1; printf("%.10f", f); }"#;
    assert_eq!(run_source(source), "0.1000000015");
}

#[test]
fn double_array_uses_wide_slots() {
    let source = r#"int main(){ double d[2]; d[0] = 0.1; d[1] = 0.2; printf("%.10f %.10f", d[0], d[1]); }"#;
    assert_eq!(run_source(source), "0.1000000000 0.2000000000");
}

// ==================== printf / scanf ====================

#[test]
fn printf_string_literal_argument() {
    let source = r#"int main(){ printf("%s", "abc"); }"#;
    assert_eq!(run_source(source), "abc");
}

#[test]
fn printf_char_conversion() {
    let source = r#"int main(){ printf("%c%c", 65, 98); }"#;
    assert_eq!(run_source(source), "Ab");
}

#[test]
fn printf_argument_order_matches_declaration() {
    let source = r#"int main(){ printf("%d-%d-%d", 1, 2, 3); }"#;
    assert_eq!(run_source(source), "1-2-3");
}

#[test]
fn scanf_long_float_keeps_double_precision() {
    let source = r#"int main(){ double d; scanf("%lf", &d); printf("%.10f", d); }"#;
    assert_eq!(run_with_input(source, &["0.1"]), "0.1000000000");
}

#[test]
fn scanf_string_into_char_array() {
    let source = r#"int main(){ char s[16]; scanf("%s", s); printf("Hi %s!", s); }"#;
    assert_eq!(run_with_input(source, &["bob"]), "Hi bob!");
}

#[test]
fn scanf_multiple_values_on_one_line() {
    let source = r#"int main(){ int a; int b; scanf("%d %d", &a, &b); printf("%d", a+b); }"#;
    assert_eq!(run_with_input(source, &["20 22"]), "42");
}

#[test]
fn scanf_char_conversion_takes_first_character() {
    let source = r#"int main(){ char c; scanf("%c", &c); printf("%c", c); }"#;
    assert_eq!(run_with_input(source, &["zebra"]), "z");
}

// ==================== Preprocessor integration ====================

#[test]
fn ifdef_selects_the_defined_branch() {
    let source = "#define FAST\nint main(){\n#ifdef FAST\nprintf(\"fast\");\n#endif\n#ifndef FAST\nprintf(\"slow\");\n#endif\n}";
    assert_eq!(run_source(source), "fast");
}

#[test]
fn errors_report_original_line_numbers() {
    // The directive lines are blanked, not removed, so the bad statement
    // still sits on line 3.
    let source = "#define A 1\n#include <stdio.h>\nint main(){ x = 1; }";
    assert_eq!(compile_err(source), "Line 3: undefined identifier 'x'");
}

// ==================== Faults ====================

#[test]
fn division_by_zero_terminates_with_diagnostic() {
    let source = r#"int main(){ int a = 1/0; printf("unreachable"); }"#;
    assert_eq!(
        run_source(source),
        "Segmentation Fault (Core Dumped): division by zero\n"
    );
}

#[test]
fn wild_pointer_write_segfaults() {
    let source = r#"int main(){ int *p; p = 70000; *p = 1; }"#;
    let output = run_source(source);
    assert!(
        output.starts_with("Segmentation Fault (Core Dumped): out of bounds write"),
        "{output}"
    );
}

#[test]
fn output_before_a_fault_is_preserved() {
    let source = r#"int main(){ printf("before "); int a = 1/0; }"#;
    assert_eq!(
        run_source(source),
        "before Segmentation Fault (Core Dumped): division by zero\n"
    );
}
