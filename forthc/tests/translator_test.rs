use stackarch_core::isa::{self, ImageRecord, Opcode};
use stackarch_forthc::translate;

mod common;
use common::{data_words, operand_at, opcode_at, ops, record_at};

#[test]
fn test_empty_source_compiles_to_halt() {
    let image = translate("", 0, 10).unwrap();
    assert_eq!(ops(&image), vec![(10, Opcode::Halt, None)]);
}

#[test]
fn test_start_adr_moves_the_program() {
    let image = translate("", 0, 100).unwrap();
    assert_eq!(image[0].offset(), 100);
}

#[test]
fn test_translation_is_deterministic() {
    let src = ": s 0 10 1 do i + loop . ; s .\" done\"";
    let a = isa::code_to_string(&translate(src, 0, 10).unwrap());
    let b = isa::code_to_string(&translate(src, 0, 10).unwrap());
    assert_eq!(a, b);
}

#[test]
fn test_integer_literal_becomes_push() {
    let image = translate("7", 0, 10).unwrap();
    assert_eq!(
        ops(&image),
        vec![(10, Opcode::Push, Some(7)), (11, Opcode::Halt, None)]
    );
}

#[test]
fn test_negative_literal() {
    let image = translate("-12", 0, 10).unwrap();
    assert_eq!(operand_at(&image, 10), -12);
}

#[test]
fn test_primitive_words_map_to_opcodes() {
    let image = translate("1 2 dup drop swap + - * / mod or and =", 0, 10).unwrap();
    let opcodes: Vec<Opcode> = ops(&image).iter().map(|&(_, op, _)| op).collect();
    assert_eq!(
        opcodes,
        vec![
            Opcode::Push,
            Opcode::Push,
            Opcode::Dup,
            Opcode::Pop,
            Opcode::Swap,
            Opcode::Add,
            Opcode::Sub,
            Opcode::Mul,
            Opcode::Div,
            Opcode::Mod,
            Opcode::Or,
            Opcode::And,
            Opcode::Equal,
            Opcode::Halt,
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    let image = translate("( this is a comment ) 5 ( another )", 0, 10).unwrap();
    assert_eq!(
        ops(&image),
        vec![(10, Opcode::Push, Some(5)), (11, Opcode::Halt, None)]
    );
}

#[test]
fn test_key_and_emit_expand_to_port_accesses() {
    let image = translate("key emit", 7, 10).unwrap();
    assert_eq!(
        ops(&image),
        vec![
            (10, Opcode::Push, Some(7)),
            (11, Opcode::Fetch, None),
            (12, Opcode::Push, Some(7)),
            (13, Opcode::Store, None),
            (14, Opcode::Halt, None),
        ]
    );
}

#[test]
fn test_variable_reserves_data_cell() {
    let image = translate("variable x 7 x ! x @", 0, 10).unwrap();
    // PUSH 7, PUSH &x, STORE, PUSH &x, FETCH, HALT
    let listing = ops(&image);
    assert_eq!(listing[0], (10, Opcode::Push, Some(7)));
    assert_eq!(listing[1].1, Opcode::Push);
    assert_eq!(listing[2].1, Opcode::Store);
    assert_eq!(listing[3].1, Opcode::Push);
    assert_eq!(listing[4].1, Opcode::Fetch);
    let x_addr = operand_at(&image, 11);
    assert_eq!(operand_at(&image, 13), x_addr);
    assert_eq!(
        record_at(&image, x_addr),
        &ImageRecord::Data { word: 0, offset: x_addr }
    );
}

#[test]
fn test_sallot_advances_data_cursor() {
    let image = translate("variable a sallot 3 variable b", 0, 10).unwrap();
    let words = data_words(&image);
    assert_eq!(words.len(), 2);
    assert_eq!(words[1].0 - words[0].0, 4);
}

#[test]
fn test_string_literal_is_pascal_encoded() {
    let image = translate(".\" Hello\"", 0, 10).unwrap();
    // PUSH &count, CALL print-string, HALT at the front
    let listing = ops(&image);
    assert_eq!(listing[0].1, Opcode::Push);
    assert_eq!(listing[1].1, Opcode::Call);
    assert_eq!(listing[2], (12, Opcode::Halt, None));
    let count_addr = operand_at(&image, 10);
    assert_eq!(
        record_at(&image, count_addr),
        &ImageRecord::Data { word: 5, offset: count_addr }
    );
    let expected: Vec<i32> = "Hello".chars().map(|c| c as i32).collect();
    for (i, &code) in expected.iter().enumerate() {
        assert_eq!(
            record_at(&image, count_addr + 1 + i as i32),
            &ImageRecord::Data { word: code, offset: count_addr + 1 + i as i32 }
        );
    }
    // the call lands on the print routine's first instruction
    let routine = operand_at(&image, 11);
    assert_eq!(opcode_at(&image, routine), Opcode::Dup);
}

#[test]
fn test_print_routine_emitted_once() {
    let image = translate(".\" a\" .\" b\"", 0, 10).unwrap();
    let call_targets: Vec<i32> = ops(&image)
        .iter()
        .filter(|(_, op, _)| *op == Opcode::Call)
        .map(|&(_, _, operand)| operand.unwrap())
        .collect();
    assert_eq!(call_targets.len(), 2);
    assert_eq!(call_targets[0], call_targets[1]);
}

#[test]
fn test_dot_installs_decimal_routine() {
    let image = translate("42 .", 0, 10).unwrap();
    let listing = ops(&image);
    assert_eq!(listing[0], (10, Opcode::Push, Some(42)));
    assert_eq!(listing[1].1, Opcode::Call);
    let routine = operand_at(&image, 11);
    // routine begins with the sign test
    assert_eq!(opcode_at(&image, routine), Opcode::Dup);
    assert_eq!(operand_at(&image, routine + 1), i32::MIN);
}

#[test]
fn test_colon_definition_compiles_to_word_section() {
    let image = translate(": s 1 2 + ; s", 0, 10).unwrap();
    // main program: CALL s, HALT
    let listing = ops(&image);
    assert_eq!(listing[0].1, Opcode::Call);
    assert_eq!(listing[1], (11, Opcode::Halt, None));
    let body = operand_at(&image, 10);
    assert_eq!(opcode_at(&image, body), Opcode::Push);
    assert_eq!(opcode_at(&image, body + 3), Opcode::Ret);
}

#[test]
fn test_word_can_call_itself() {
    let image = translate(": f f ; f", 0, 10).unwrap();
    let body = operand_at(&image, 10);
    // the recursive call points back at the word's own start
    assert_eq!(operand_at(&image, body), body);
}

#[test]
fn test_layout_is_contiguous_and_ordered() {
    let src = ": s 0 10 1 do i + loop . ; s .\" x\"";
    let image = translate(src, 0, 10).unwrap();
    let offsets: Vec<i32> = image.iter().map(ImageRecord::offset).collect();
    let expected: Vec<i32> = (10..10 + image.len() as i32).collect();
    assert_eq!(offsets, expected);
}

#[test]
fn test_token_metadata_survives_to_image() {
    let image = translate("7", 0, 10).unwrap();
    match record_at(&image, 10) {
        ImageRecord::Instruction {
            token: Some(token), ..
        } => {
            assert_eq!(token.val, "7");
            assert_eq!(token.line, 1);
            assert_eq!(token.num, 1);
        }
        other => panic!("expected token metadata, got {other:?}"),
    }
}
