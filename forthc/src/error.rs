use thiserror::Error;

use crate::token::Token;

/// Everything the translator can reject, tagged with the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("literal doesn't fit into 32 bit signed integer format: {0}")]
    InvalidIntLiteral(Token),
    #[error("no string literal provided after: {0}")]
    ExpectedStringLiteral(Token),
    #[error("couldn't parse sallot query: {0}")]
    SallotQuery(Token),
    #[error("nested word definition is forbidden: {0}")]
    NestedWord(Token),
    #[error("failed to end word definition at: {0} | check for opened \":\", conditionals and loops")]
    WordEnd(Token),
    #[error("conditionals are allowed only in word definitions: {0}")]
    BareConditional(Token),
    #[error("failed to complete if-else-then tree: {0} | check for opened \"if\"")]
    IfElseTree(Token),
    #[error("begin-until is allowed only in word definitions: {0}")]
    BareBeginUntil(Token),
    #[error("failed to complete begin-until tree: {0} | check for opened \"begin\"")]
    BeginUntilTree(Token),
    #[error("do-loop is allowed only in word definitions: {0}")]
    BareDoLoop(Token),
    #[error("failed to insert iterating var: {0} | check for opened \"do\"")]
    LoopVar(Token),
    #[error("failed to complete do-loop tree: {0} | check for opened \"do\"")]
    DoLoopTree(Token),
    #[error("leave is allowed only inside do-loop: {0}")]
    BareLeave(Token),
    #[error("predefined word is missing from the dictionary: {0}")]
    MissingPreambleWord(Token),
    #[error("unrecognized word: {0}")]
    UnknownWord(Token),
    #[error("some constructs weren't closed, most recent opened: {0}")]
    UnclosedWords(String),
}
