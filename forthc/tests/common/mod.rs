use stackarch_core::isa::{ImageRecord, Opcode};

/// Instruction records of the image in emission order as
/// `(offset, opcode, operand)`.
pub fn ops(image: &[ImageRecord]) -> Vec<(i32, Opcode, Option<i32>)> {
    image
        .iter()
        .filter_map(|r| match r {
            ImageRecord::Instruction {
                opcode,
                operand,
                offset,
                ..
            } => Some((*offset, *opcode, *operand)),
            ImageRecord::Data { .. } => None,
        })
        .collect()
}

/// Data records as `(offset, word)`.
pub fn data_words(image: &[ImageRecord]) -> Vec<(i32, i32)> {
    image
        .iter()
        .filter_map(|r| match r {
            ImageRecord::Data { word, offset } => Some((*offset, *word)),
            ImageRecord::Instruction { .. } => None,
        })
        .collect()
}

/// The record placed at `offset`.
pub fn record_at(image: &[ImageRecord], offset: i32) -> &ImageRecord {
    image
        .iter()
        .find(|r| r.offset() == offset)
        .unwrap_or_else(|| panic!("no record at offset {offset}"))
}

pub fn opcode_at(image: &[ImageRecord], offset: i32) -> Opcode {
    match record_at(image, offset) {
        ImageRecord::Instruction { opcode, .. } => *opcode,
        ImageRecord::Data { .. } => panic!("data record at offset {offset}"),
    }
}

pub fn operand_at(image: &[ImageRecord], offset: i32) -> i32 {
    match record_at(image, offset) {
        ImageRecord::Instruction {
            operand: Some(operand),
            ..
        } => *operand,
        _ => panic!("no operand at offset {offset}"),
    }
}
