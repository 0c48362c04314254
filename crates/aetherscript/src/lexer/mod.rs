//! Lexical analysis for AetherScript.
//!
//! Turns source text into a flat stream of [`Token`]s via a single-pass,
//! single-character-lookahead scan. The lexer never fails outright:
//! unrecognized input becomes an `Error`-kind token carrying the offending
//! text, and the stream always ends with exactly one `Eof` token.

mod token;

pub use token::{Pos, Token, TokenKind};

/// Scans `source` into a token stream, terminated by one `Eof` token.
///
/// Indexes `source` by Unicode scalar value, not by byte, so a multi-byte
/// UTF-8 character advances the position/line/column bookkeeping exactly
/// once — matching a ground-truth lexer written over a language whose
/// strings are sequences of codepoints, not bytes.
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if self.current() == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        if self.current() == Some('/') && self.peek() == Some('/') {
            while !matches!(self.current(), None | Some('\n')) {
                self.advance();
            }
        } else if self.current() == Some('/') && self.peek() == Some('*') {
            self.advance();
            self.advance();
            while let Some(c) = self.current() {
                if c == '*' && self.peek() == Some('/') {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
        }
    }

    fn make(&self, kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Token {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    fn identifier(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let start = self.position;
        while matches!(self.current(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text: String = self.chars[start..self.position].iter().collect();
        let kind = TokenKind::keyword_or_type(&text);
        self.make(kind, text, line, column)
    }

    fn number(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let start = self.position;
        let mut is_float = false;
        while let Some(c) = self.current() {
            if c == '.' {
                if is_float {
                    break;
                }
                is_float = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            self.advance();
        }
        let mut text: String = self.chars[start..self.position].iter().collect();
        if text.ends_with('.') {
            text.push('0');
        }
        let kind = if is_float { TokenKind::Float } else { TokenKind::Integer };
        self.make(kind, text, line, column)
    }

    fn string(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let quote = self.current().expect("caller checked for a quote char");
        self.advance();

        let mut result = String::new();
        loop {
            match self.current() {
                None => return self.make(TokenKind::Error, result, line, column),
                Some(c) if c == quote => break,
                Some('\\') if self.peek().is_some() => {
                    self.advance();
                    let escaped = self.current().expect("peeked Some above");
                    result.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        other => other,
                    });
                    self.advance();
                }
                Some(c) => {
                    result.push(c);
                    self.advance();
                }
            }
        }

        self.advance(); // closing quote
        self.make(TokenKind::String, result, line, column)
    }

    fn two_char(&mut self, second: char, two: TokenKind, one: TokenKind, lex_one: &str, lex_two: &str) -> Token {
        let (line, column) = (self.line, self.column);
        if self.peek() == Some(second) {
            self.advance();
            self.advance();
            self.make(two, lex_two, line, column)
        } else {
            self.advance();
            self.make(one, lex_one, line, column)
        }
    }

    /// Runs the full scan, returning every token including the trailing `Eof`.
    pub fn lex(mut self) -> Vec<Token> {
        use TokenKind::*;

        let mut tokens = Vec::new();

        loop {
            let Some(c) = self.current() else { break };

            if c.is_whitespace() {
                self.skip_whitespace();
                continue;
            }

            if c == '/' && matches!(self.peek(), Some('/') | Some('*')) {
                self.skip_comment();
                continue;
            }

            let (line, column) = (self.line, self.column);

            let token = if c.is_alphabetic() || c == '_' {
                self.identifier()
            } else if c.is_ascii_digit() {
                self.number()
            } else if c == '"' || c == '\'' {
                self.string()
            } else {
                match c {
                    '+' => {
                        self.advance();
                        self.make(Plus, "+", line, column)
                    }
                    '-' => self.two_char('>', Arrow, Minus, "-", "->"),
                    '*' => {
                        self.advance();
                        self.make(Star, "*", line, column)
                    }
                    '/' => {
                        self.advance();
                        self.make(Slash, "/", line, column)
                    }
                    '%' => {
                        self.advance();
                        self.make(Percent, "%", line, column)
                    }
                    '=' => self.two_char('=', EqualEqual, Assign, "=", "=="),
                    '!' => self.two_char('=', NotEqual, Bang, "!", "!="),
                    '<' => self.two_char('=', LessEqual, Less, "<", "<="),
                    '>' => self.two_char('=', GreaterEqual, Greater, ">", ">="),
                    '&' if self.peek() == Some('&') => {
                        self.advance();
                        self.advance();
                        self.make(AndAnd, "&&", line, column)
                    }
                    '|' if self.peek() == Some('|') => {
                        self.advance();
                        self.advance();
                        self.make(OrOr, "||", line, column)
                    }
                    '(' => {
                        self.advance();
                        self.make(LParen, "(", line, column)
                    }
                    ')' => {
                        self.advance();
                        self.make(RParen, ")", line, column)
                    }
                    '{' => {
                        self.advance();
                        self.make(LBrace, "{", line, column)
                    }
                    '}' => {
                        self.advance();
                        self.make(RBrace, "}", line, column)
                    }
                    '[' => {
                        self.advance();
                        self.make(LBracket, "[", line, column)
                    }
                    ']' => {
                        self.advance();
                        self.make(RBracket, "]", line, column)
                    }
                    ',' => {
                        self.advance();
                        self.make(Comma, ",", line, column)
                    }
                    '.' => {
                        self.advance();
                        self.make(Dot, ".", line, column)
                    }
                    ';' => {
                        self.advance();
                        self.make(Semicolon, ";", line, column)
                    }
                    ':' => {
                        self.advance();
                        self.make(Colon, ":", line, column)
                    }
                    other => {
                        self.advance();
                        self.make(Error, other.to_string(), line, column)
                    }
                }
            };

            tokens.push(token);
        }

        tokens.push(self.make(Eof, "", self.line, self.column));
        tokens
    }
}

/// Convenience wrapper mirroring the core contract `lex(source) -> tokens`.
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).lex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_has_only_eof_at_start() {
        let tokens = lex("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!(tokens[0].pos(), Pos::START);
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = lex("function conjure notakeyword");
        assert_eq!(tokens[0].kind, TokenKind::KwFunction);
        assert_eq!(tokens[1].kind, TokenKind::KwConjure);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].lexeme, "notakeyword");
    }

    #[test]
    fn two_char_operators_take_priority() {
        let tokens = lex("== != <= >= && ||");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn trailing_dot_float_is_normalized() {
        let tokens = lex("123.");
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].lexeme, "123.0");
    }

    #[test]
    fn unterminated_string_errors_at_opening_quote() {
        let tokens = lex("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].pos(), Pos::new(1, 1));
    }

    #[test]
    fn string_escapes() {
        let tokens = lex(r#""a\nb\tc\\d\"e""#);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "a\nb\tc\\d\"e");
    }

    #[test]
    fn unknown_escape_passes_through_verbatim() {
        let tokens = lex(r#""a\qb""#);
        assert_eq!(tokens[0].lexeme, "aqb");
    }

    #[test]
    fn block_comment_advances_line_counter_by_newline_count() {
        let tokens = lex("/* line1\nline2\nline3 */ x");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn line_comment_runs_to_end_of_line() {
        let tokens = lex("x // trailing comment\ny");
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[1].lexeme, "y");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn arrow_is_distinguished_from_minus() {
        let tokens = lex("a -> b - c");
        assert_eq!(tokens[1].kind, TokenKind::Arrow);
        assert_eq!(tokens[3].kind, TokenKind::Minus);
    }

    #[test]
    fn unrecognized_character_yields_error_token() {
        let tokens = lex("@");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "@");
    }

    #[test]
    fn multi_byte_utf8_in_a_string_literal_is_not_corrupted() {
        let tokens = lex(r#""café""#);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "café");
    }

    #[test]
    fn multi_byte_utf8_advances_column_by_one_scalar_not_one_byte() {
        let tokens = lex("\"é\" x");
        // `é` is 1 scalar but 2 UTF-8 bytes; `x` must sit right after the
        // 3-column-wide string literal (quote, é, quote), not after 4.
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].column, 5);
    }
}
