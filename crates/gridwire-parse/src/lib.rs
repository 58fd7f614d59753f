pub mod parser;
pub mod tokenizer;

pub use parser::{Formula, Parser, ParserError, parse};
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer, TokenizerError};

// Re-export common types
pub use gridwire_common::{BinOp, Bounds, FuncName, RangeRef};
