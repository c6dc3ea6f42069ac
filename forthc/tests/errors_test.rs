use stackarch_forthc::{CompileError, translate};

fn err_for(src: &str) -> CompileError {
    translate(src, 0, 10).expect_err("source must be rejected")
}

#[test]
fn test_out_of_range_literal() {
    assert!(matches!(
        err_for("5000000000"),
        CompileError::InvalidIntLiteral(t) if t.val == "5000000000"
    ));
    // boundary values still fit
    assert!(translate("2147483647 -2147483648", 0, 10).is_ok());
}

#[test]
fn test_unknown_word() {
    assert!(matches!(
        err_for("frobnicate"),
        CompileError::UnknownWord(t) if t.val == "frobnicate" && t.line == 1 && t.num == 1
    ));
}

#[test]
fn test_print_without_string_literal() {
    assert!(matches!(
        err_for(".\""),
        CompileError::ExpectedStringLiteral(_)
    ));
}

#[test]
fn test_sallot_with_bad_query() {
    assert!(matches!(
        err_for("sallot nope"),
        CompileError::SallotQuery(t) if t.val == "nope"
    ));
}

#[test]
fn test_nested_word_definition() {
    assert!(matches!(
        err_for(": a : b ; ;"),
        CompileError::NestedWord(_)
    ));
}

#[test]
fn test_stray_semicolon() {
    assert!(matches!(err_for(";"), CompileError::WordEnd(_)));
}

#[test]
fn test_semicolon_with_open_conditional() {
    assert!(matches!(err_for(": a if ;"), CompileError::WordEnd(_)));
}

#[test]
fn test_bare_conditional() {
    assert!(matches!(err_for("if"), CompileError::BareConditional(_)));
}

#[test]
fn test_unmatched_then_and_else() {
    assert!(matches!(err_for(": a then ;"), CompileError::IfElseTree(_)));
    assert!(matches!(err_for(": a else ;"), CompileError::IfElseTree(_)));
}

#[test]
fn test_bare_begin() {
    assert!(matches!(err_for("begin"), CompileError::BareBeginUntil(_)));
}

#[test]
fn test_unmatched_until() {
    assert!(matches!(
        err_for(": a until ;"),
        CompileError::BeginUntilTree(_)
    ));
}

#[test]
fn test_bare_do() {
    assert!(matches!(err_for("do"), CompileError::BareDoLoop(_)));
}

#[test]
fn test_loop_var_outside_do() {
    assert!(matches!(err_for(": a i ;"), CompileError::LoopVar(_)));
}

#[test]
fn test_unmatched_loop() {
    assert!(matches!(err_for(": a loop ;"), CompileError::DoLoopTree(_)));
}

#[test]
fn test_bare_leave() {
    assert!(matches!(err_for("leave"), CompileError::BareLeave(_)));
    assert!(matches!(
        err_for(": a leave ;"),
        CompileError::BareLeave(_)
    ));
}

#[test]
fn test_unclosed_definition_at_end_of_input() {
    assert!(matches!(
        err_for(": a 1"),
        CompileError::UnclosedWords(name) if name == ":"
    ));
    assert!(matches!(
        err_for(": a begin"),
        CompileError::UnclosedWords(name) if name == "begin"
    ));
}

#[test]
fn test_error_messages_carry_location() {
    let err = err_for("1 2\n 3 nope");
    let text = err.to_string();
    assert!(text.contains("nope"), "{text}");
    assert!(text.contains("ln:2"), "{text}");
    assert!(text.contains("wrd num:2"), "{text}");
}
