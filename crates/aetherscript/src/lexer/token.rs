use std::fmt::Display;

/// A single point in source text. Both fields are 1-based, matching the
/// editor-facing convention the rest of the pipeline assumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub const START: Pos = Pos { line: 1, column: 1 };
}

impl Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Error,

    Identifier,
    Integer,
    Float,
    String,

    // keywords
    KwIf,
    KwElse,
    KwElif,
    KwWhile,
    KwFor,
    KwReturn,
    KwBreak,
    KwContinue,
    KwFunction,
    KwSpell,
    KwRitual,
    KwConjure,
    KwEntity,
    KwRealm,
    KwDimension,

    // type names
    TyVoid,
    TyInt,
    TyFloat,
    TyString,
    TyBoolean,
    TyArray,
    TyMap,
    TyElement,
    TyEnergy,
    TySpirit,
    TyMatter,

    // operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqualEqual,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,

    // delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semicolon,
    Colon,
    Arrow,
}

impl TokenKind {
    /// Look up a keyword or type-name kind for the given identifier text,
    /// falling back to `Identifier` when `text` is not reserved.
    pub fn keyword_or_type(text: &str) -> TokenKind {
        use TokenKind::*;
        match text {
            "if" => KwIf,
            "else" => KwElse,
            "elif" => KwElif,
            "while" => KwWhile,
            "for" => KwFor,
            "return" => KwReturn,
            "break" => KwBreak,
            "continue" => KwContinue,
            "function" => KwFunction,
            "spell" => KwSpell,
            "ritual" => KwRitual,
            "conjure" => KwConjure,
            "entity" => KwEntity,
            "realm" => KwRealm,
            "dimension" => KwDimension,
            "Void" => TyVoid,
            "Int" => TyInt,
            "Float" => TyFloat,
            "String" => TyString,
            "Boolean" => TyBoolean,
            "Array" => TyArray,
            "Map" => TyMap,
            "Element" => TyElement,
            "Energy" => TyEnergy,
            "Spirit" => TySpirit,
            "Matter" => TyMatter,
            _ => Identifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }
}
