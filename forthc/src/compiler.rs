//! The translator proper: token processors, the structured-control frame
//! stack, and final section allocation.

use std::collections::{HashMap, VecDeque};

use stackarch_core::isa::{ImageRecord, Opcode};

use crate::error::CompileError;
use crate::preamble;
use crate::section::{DraftCell, MemoryAddress, MemorySection};
use crate::token::{Token, extract_string_literals, tokenize};

fn primitive_word(val: &str) -> Option<Opcode> {
    Some(match val {
        "dup" => Opcode::Dup,
        "drop" => Opcode::Pop,
        "swap" => Opcode::Swap,
        "@" => Opcode::Fetch,
        "!" => Opcode::Store,
        "+" => Opcode::Add,
        "-" => Opcode::Sub,
        "*" => Opcode::Mul,
        "/" => Opcode::Div,
        "mod" => Opcode::Mod,
        "or" => Opcode::Or,
        "and" => Opcode::And,
        "=" => Opcode::Equal,
        _ => return None,
    })
}

/// One open construct on the parse stack.
enum Frame {
    Colon,
    If { patch: usize },
    Else { patch: usize },
    Begin { addr: MemoryAddress },
    Do { addr: MemoryAddress, leaves: Vec<usize> },
}

impl Frame {
    fn name(&self) -> &'static str {
        match self {
            Frame::Colon => ":",
            Frame::If { .. } => "if",
            Frame::Else { .. } => "else",
            Frame::Begin { .. } => "begin",
            Frame::Do { .. } => "do",
        }
    }
}

enum IntParse {
    NotNumeric,
    OutOfRange,
}

fn parse_int_lit(token: &Token) -> Result<i32, IntParse> {
    let wide: i128 = token.val.parse().map_err(|_| IntParse::NotNumeric)?;
    i32::try_from(wide).map_err(|_| IntParse::OutOfRange)
}

pub struct Translator {
    instructions: MemorySection,
    preamble: MemorySection,
    word: MemorySection,
    data: MemorySection,
    io_adr: i32,
    tokens: VecDeque<Token>,
    str_literals: VecDeque<String>,
    variables: HashMap<String, MemoryAddress>,
    word_start: HashMap<String, MemoryAddress>,
    frames: Vec<Frame>,
    in_word: bool,
}

/// Compile `src` into an addressed program image.
///
/// Layout is `instructions ++ preamble ++ word ++ data`, with
/// `instructions.start = start_adr` and each following section starting
/// where the previous one ends.
pub fn translate(src: &str, io_adr: i32, start_adr: i32) -> Result<Vec<ImageRecord>, CompileError> {
    let (clean, literals) = extract_string_literals(src);
    let tokens = tokenize(&clean);
    let mut t = Translator {
        instructions: MemorySection::new(),
        preamble: MemorySection::new(),
        word: MemorySection::new(),
        data: MemorySection::new(),
        io_adr,
        tokens,
        str_literals: literals,
        variables: HashMap::new(),
        word_start: HashMap::new(),
        frames: Vec::new(),
        in_word: false,
    };
    t.run()?;

    t.instructions.set_start(start_adr);
    let preamble_start = start_adr + t.instructions.offset();
    t.preamble.set_start(preamble_start);
    let word_start = preamble_start + t.preamble.offset();
    t.word.set_start(word_start);
    t.data.set_start(word_start + t.word.offset());

    let mut image = t.instructions.allocate();
    image.extend(t.preamble.allocate());
    image.extend(t.word.allocate());
    image.extend(t.data.allocate());
    Ok(image)
}

impl Translator {
    fn section(&mut self) -> &mut MemorySection {
        if self.in_word {
            &mut self.word
        } else {
            &mut self.instructions
        }
    }

    fn in_colon(&self) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::Colon))
    }

    fn run(&mut self) -> Result<(), CompileError> {
        while let Some(token) = self.tokens.pop_front() {
            if let Some(opcode) = primitive_word(&token.val) {
                let cell = DraftCell::op(opcode).with_token(token.meta());
                self.section().push(cell);
                continue;
            }
            match token.val.as_str() {
                ".\"" => self.process_print(token)?,
                "emit" => self.process_emit(token),
                "." => self.process_dot(token)?,
                "key" => self.process_key(token),
                "variable" => self.process_variable(token)?,
                "sallot" => self.process_sallot(token)?,
                ":" => self.process_colon(token)?,
                ";" => self.process_semicolon(token)?,
                "if" => self.process_if(token)?,
                "else" => self.process_else(token)?,
                "then" => self.process_then(token)?,
                "begin" => self.process_begin(token)?,
                "until" => self.process_until(token)?,
                "do" => self.process_do(token)?,
                "i" => self.process_i(token)?,
                "loop" => self.process_loop(token)?,
                "leave" => self.process_leave(token)?,
                _ if token.val.starts_with('(') => self.skip_comment(&token),
                _ => self.process_word_or_literal(token)?,
            }
        }
        if let Some(frame) = self.frames.last() {
            return Err(CompileError::UnclosedWords(frame.name().to_string()));
        }
        self.instructions.push(DraftCell::op(Opcode::Halt));
        Ok(())
    }

    fn skip_comment(&mut self, opener: &Token) {
        if opener.val.len() > 1 && opener.val.ends_with(')') {
            return;
        }
        while let Some(next) = self.tokens.pop_front() {
            if next.val.ends_with(')') {
                break;
            }
        }
    }

    // ------------------------------
    // IO
    // ------------------------------

    fn process_print(&mut self, token: Token) -> Result<(), CompileError> {
        let Some(lit) = self.str_literals.pop_front() else {
            return Err(CompileError::ExpectedStringLiteral(token));
        };
        if !self.word_start.contains_key(".\"") {
            let addr = preamble::add_print_string(&mut self.preamble, self.io_adr);
            self.word_start.insert(".\"".to_string(), addr);
        }
        let routine = self
            .word_start
            .get(".\"")
            .cloned()
            .ok_or_else(|| CompileError::MissingPreambleWord(token.clone()))?;
        // Pascal string: count cell, then one cell per code point.
        let data_off = self.data.push(DraftCell::word(lit.chars().count() as i32));
        for ch in lit.chars() {
            self.data.push(DraftCell::word(ch as i32));
        }
        let meta = token.meta();
        self.section().push_range([
            DraftCell::op_addr(Opcode::Push, data_off).with_token(meta),
            DraftCell::op_addr(Opcode::Call, routine),
        ]);
        Ok(())
    }

    fn process_emit(&mut self, token: Token) {
        let io_adr = self.io_adr;
        self.section().push_range([
            DraftCell::op_lit(Opcode::Push, io_adr).with_token(token.meta()),
            DraftCell::op(Opcode::Store),
        ]);
    }

    fn process_dot(&mut self, token: Token) -> Result<(), CompileError> {
        if !self.word_start.contains_key(".") {
            let addr = preamble::add_print_num(&mut self.preamble, self.io_adr);
            self.word_start.insert(".".to_string(), addr);
        }
        let routine = self
            .word_start
            .get(".")
            .cloned()
            .ok_or_else(|| CompileError::MissingPreambleWord(token.clone()))?;
        let cell = DraftCell::op_addr(Opcode::Call, routine).with_token(token.meta());
        self.section().push(cell);
        Ok(())
    }

    fn process_key(&mut self, token: Token) {
        let io_adr = self.io_adr;
        self.section().push_range([
            DraftCell::op_lit(Opcode::Push, io_adr).with_token(token.meta()),
            DraftCell::op(Opcode::Fetch),
        ]);
    }

    // ------------------------------
    // Variables and static allocation
    // ------------------------------

    fn process_variable(&mut self, token: Token) -> Result<(), CompileError> {
        let name = self
            .tokens
            .pop_front()
            .ok_or_else(|| CompileError::UnclosedWords(token.val.clone()))?;
        let addr = self.data.push(DraftCell::word(0));
        self.variables.insert(name.val, addr);
        Ok(())
    }

    fn process_sallot(&mut self, token: Token) -> Result<(), CompileError> {
        let query = self
            .tokens
            .pop_front()
            .ok_or_else(|| CompileError::UnclosedWords(token.val.clone()))?;
        let cells = parse_int_lit(&query).map_err(|_| CompileError::SallotQuery(query.clone()))?;
        let offset = self.data.offset();
        self.data.set_offset(offset + cells);
        Ok(())
    }

    // ------------------------------
    // Word definition
    // ------------------------------

    fn process_colon(&mut self, token: Token) -> Result<(), CompileError> {
        if self.in_colon() {
            return Err(CompileError::NestedWord(token));
        }
        let name = self
            .tokens
            .pop_front()
            .ok_or_else(|| CompileError::UnclosedWords(token.val.clone()))?;
        self.word_start.insert(name.val, self.word.offset_addr());
        self.frames.push(Frame::Colon);
        self.in_word = true;
        Ok(())
    }

    fn process_semicolon(&mut self, token: Token) -> Result<(), CompileError> {
        if !matches!(self.frames.last(), Some(Frame::Colon)) {
            return Err(CompileError::WordEnd(token));
        }
        let cell = DraftCell::op(Opcode::Ret).with_token(token.meta());
        self.section().push(cell);
        self.frames.pop();
        self.in_word = false;
        Ok(())
    }

    // ------------------------------
    // if-else-then
    // ------------------------------

    fn process_if(&mut self, token: Token) -> Result<(), CompileError> {
        if !self.in_colon() {
            return Err(CompileError::BareConditional(token));
        }
        let patch = self.section().next_index();
        let cell = DraftCell::op(Opcode::Jmpz).with_token(token.meta());
        self.section().push(cell);
        self.frames.push(Frame::If { patch });
        Ok(())
    }

    fn process_else(&mut self, token: Token) -> Result<(), CompileError> {
        let if_patch = match self.frames.last() {
            Some(Frame::If { patch }) => *patch,
            _ => return Err(CompileError::IfElseTree(token)),
        };
        let else_patch = self.section().next_index();
        let cell = DraftCell::op(Opcode::Jmp).with_token(token.meta());
        self.section().push(cell);
        let after = self.section().offset_addr();
        self.section().patch_operand(if_patch, after);
        self.frames.push(Frame::Else { patch: else_patch });
        Ok(())
    }

    fn process_then(&mut self, token: Token) -> Result<(), CompileError> {
        let here = self.section().offset_addr();
        match self.frames.last() {
            Some(Frame::Else { patch }) => {
                let patch = *patch;
                self.section().patch_operand(patch, here);
                self.frames.pop();
                // the if frame underneath was patched by `else`
                self.frames.pop();
            }
            Some(Frame::If { patch }) => {
                let patch = *patch;
                self.section().patch_operand(patch, here);
                self.frames.pop();
            }
            _ => return Err(CompileError::IfElseTree(token)),
        }
        Ok(())
    }

    // ------------------------------
    // begin-until
    // ------------------------------

    fn process_begin(&mut self, token: Token) -> Result<(), CompileError> {
        if !self.in_colon() {
            return Err(CompileError::BareBeginUntil(token));
        }
        let addr = self.section().offset_addr();
        self.frames.push(Frame::Begin { addr });
        Ok(())
    }

    fn process_until(&mut self, token: Token) -> Result<(), CompileError> {
        let addr = match self.frames.last() {
            Some(Frame::Begin { addr }) => addr.clone(),
            _ => return Err(CompileError::BeginUntilTree(token)),
        };
        self.frames.pop();
        let cell = DraftCell::op_addr(Opcode::Jmpz, addr).with_token(token.meta());
        self.section().push(cell);
        Ok(())
    }

    // ------------------------------
    // do-loop
    // ------------------------------

    fn process_do(&mut self, token: Token) -> Result<(), CompileError> {
        if !self.in_colon() {
            return Err(CompileError::BareDoLoop(token));
        }
        // The start value is on top but must land above the limit on the
        // return stack, so it is stashed last.
        let meta = token.meta();
        self.section().push_range([
            DraftCell::op(Opcode::Swap).with_token(meta),
            DraftCell::op(Opcode::Stash),
            DraftCell::op(Opcode::Stash),
        ]);
        let addr = self.section().offset_addr();
        self.frames.push(Frame::Do {
            addr,
            leaves: Vec::new(),
        });
        Ok(())
    }

    fn process_i(&mut self, token: Token) -> Result<(), CompileError> {
        if !self.frames.iter().any(|f| matches!(f, Frame::Do { .. })) {
            return Err(CompileError::LoopVar(token));
        }
        let cell = DraftCell::op(Opcode::Cpstash).with_token(token.meta());
        self.section().push(cell);
        Ok(())
    }

    fn process_loop(&mut self, token: Token) -> Result<(), CompileError> {
        let Some(Frame::Do { addr, leaves }) = self.frames.pop() else {
            return Err(CompileError::DoLoopTree(token));
        };
        let cell = DraftCell::op_addr(Opcode::Loop, addr).with_token(token.meta());
        self.section().push(cell);
        let after = self.section().offset_addr();
        for patch in leaves {
            self.section().patch_operand(patch, after.clone());
        }
        Ok(())
    }

    fn process_leave(&mut self, token: Token) -> Result<(), CompileError> {
        if !self.frames.iter().any(|f| matches!(f, Frame::Do { .. })) {
            return Err(CompileError::BareLeave(token));
        }
        // Unwind the counter and limit that `do` stashed, then jump past
        // the loop; the enclosing `do` patches the target at `loop`.
        let meta = token.meta();
        self.section().push_range([
            DraftCell::op(Opcode::Unstash).with_token(meta),
            DraftCell::op(Opcode::Pop),
            DraftCell::op(Opcode::Unstash),
            DraftCell::op(Opcode::Pop),
        ]);
        let patch = self.section().next_index();
        self.section().push(DraftCell::op(Opcode::Jmp));
        for frame in self.frames.iter_mut().rev() {
            if let Frame::Do { leaves, .. } = frame {
                leaves.push(patch);
                break;
            }
        }
        Ok(())
    }

    // ------------------------------
    // Literals and bound words
    // ------------------------------

    fn process_word_or_literal(&mut self, token: Token) -> Result<(), CompileError> {
        if let Some(addr) = self.variables.get(&token.val).cloned() {
            let cell = DraftCell::op_addr(Opcode::Push, addr).with_token(token.meta());
            self.section().push(cell);
            return Ok(());
        }
        if let Some(addr) = self.word_start.get(&token.val).cloned() {
            let cell = DraftCell::op_addr(Opcode::Call, addr).with_token(token.meta());
            self.section().push(cell);
            return Ok(());
        }
        match parse_int_lit(&token) {
            Ok(value) => {
                let cell = DraftCell::op_lit(Opcode::Push, value).with_token(token.meta());
                self.section().push(cell);
                Ok(())
            }
            Err(IntParse::OutOfRange) => Err(CompileError::InvalidIntLiteral(token)),
            Err(IntParse::NotNumeric) => Err(CompileError::UnknownWord(token)),
        }
    }
}
