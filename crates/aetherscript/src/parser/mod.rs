//! Recursive-descent parser with precedence climbing and statement-boundary
//! error recovery.
//!
//! `parse(source)` never panics on malformed input: a `ParseError` is
//! recorded and the parser synchronizes to the next plausible statement
//! start, so a single malformed statement does not prevent the rest of the
//! file from being analyzed.

use crate::ast::{BinaryOp, Expr, ForInit, Param, Program, Stmt, UnaryOp};
use crate::lexer::{lex, Pos, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    pub fn pos(&self) -> Pos {
        self.token.pos()
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at {}: {}",
            self.token.pos(),
            self.message
        )
    }
}

/// Internal control-flow signal for a failed production; the actual
/// diagnostic has already been pushed onto `Parser::errors` by the time
/// this is returned.
struct Bail;

type PResult<T> = Result<T, Bail>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    pub errors: Vec<ParseError>,
}

/// Parses `source` into a `Program`, collecting parse errors along the way.
/// Always returns a `Program`, possibly with gaps where a statement failed
/// to parse.
pub fn parse(source: &str) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(lex(source));
    let program = parser.parse_program();
    (program, parser.errors)
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(Bail) => self.synchronize(),
            }
        }
        Program { statements }
    }

    // --- token cursor -----------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    /// True when the current token is an `Identifier` whose lexeme matches
    /// `text` exactly — used for the `var`/`true`/`false` soft keywords,
    /// recognized by lexeme rather than as reserved words.
    fn check_word(&self, text: &str) -> bool {
        !self.is_at_end() && self.peek().kind == TokenKind::Identifier && self.peek().lexeme == text
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn match_word(&mut self, text: &str) -> bool {
        if self.check_word(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        self.error_here(message)
    }

    fn error_here(&mut self, message: impl Into<String>) -> PResult<Token> {
        let token = self.peek().clone();
        self.errors.push(ParseError {
            token,
            message: message.into(),
        });
        Err(Bail)
    }

    fn synchronize(&mut self) {
        if !self.is_at_end() {
            self.advance();
        }

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            if matches!(
                self.peek().kind,
                TokenKind::KwFunction
                    | TokenKind::KwSpell
                    | TokenKind::KwRitual
                    | TokenKind::KwConjure
                    | TokenKind::KwIf
                    | TokenKind::KwWhile
                    | TokenKind::KwFor
                    | TokenKind::KwReturn
            ) || self.check_word("var")
            {
                return;
            }

            self.advance();
        }
    }

    // --- declarations & statements ------------------------------------

    fn declaration(&mut self) -> PResult<Stmt> {
        if self.check(TokenKind::KwConjure) || self.check_word("var") {
            return self.variable_declaration();
        }
        if matches!(
            self.peek().kind,
            TokenKind::KwFunction | TokenKind::KwSpell | TokenKind::KwRitual
        ) {
            return self.function_declaration();
        }
        self.statement()
    }

    fn variable_declaration(&mut self) -> PResult<Stmt> {
        let pos = self.peek().pos();
        self.advance(); // `conjure` or `var`

        let name_tok = self.consume(TokenKind::Identifier, "Expected variable name.")?;

        let type_annotation = if self.matches(&[TokenKind::Colon]) {
            Some(self.type_name()?)
        } else {
            None
        };

        let initializer = if self.matches(&[TokenKind::Assign]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expected ';' after variable declaration.")?;

        Ok(Stmt::VariableDeclaration {
            name: name_tok.lexeme,
            type_annotation,
            initializer,
            pos,
        })
    }

    fn type_name(&mut self) -> PResult<String> {
        if matches!(
            self.peek().kind,
            TokenKind::TyVoid
                | TokenKind::TyInt
                | TokenKind::TyFloat
                | TokenKind::TyString
                | TokenKind::TyBoolean
                | TokenKind::TyArray
                | TokenKind::TyMap
                | TokenKind::TyElement
                | TokenKind::TyEnergy
                | TokenKind::TySpirit
                | TokenKind::TyMatter
        ) || self.check(TokenKind::Identifier)
        {
            let tok = self.advance();
            let mut name = tok.lexeme;
            // allow an ad-hoc `Array<T>` annotation spelling, the only generic
            // form supported.
            if self.matches(&[TokenKind::Less]) {
                name.push('<');
                let inner = self.type_name()?;
                name.push_str(&inner);
                self.consume(TokenKind::Greater, "Expected '>' after type parameter.")?;
                name.push('>');
            }
            return Ok(name);
        }
        let tok = self.error_here("Expected a type name.")?;
        Ok(tok.lexeme)
    }

    fn function_declaration(&mut self) -> PResult<Stmt> {
        let pos = self.peek().pos();
        self.advance(); // `function` / `spell` / `ritual`

        let name_tok = self.consume(TokenKind::Identifier, "Expected function name.")?;
        self.consume(TokenKind::LParen, "Expected '(' after function name.")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param_pos = self.peek().pos();
                let param_name = self.consume(TokenKind::Identifier, "Expected parameter name.")?;
                self.consume(TokenKind::Colon, "Expected ':' after parameter name.")?;
                let param_type = self.type_name()?;
                params.push(Param {
                    name: param_name.lexeme,
                    type_annotation: param_type,
                    pos: param_pos,
                });
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "Expected ')' after parameters.")?;
        self.consume(TokenKind::Arrow, "Expected '->' before return type.")?;
        let return_type = self.type_name()?;

        let body = self.block_statements()?;

        Ok(Stmt::FunctionDeclaration {
            name: name_tok.lexeme,
            params,
            return_type,
            body,
            pos,
        })
    }

    fn statement(&mut self) -> PResult<Stmt> {
        if self.check(TokenKind::KwIf) {
            return self.if_statement();
        }
        if self.check(TokenKind::KwWhile) {
            return self.while_statement();
        }
        if self.check(TokenKind::KwFor) {
            return self.for_statement();
        }
        if self.check(TokenKind::KwReturn) {
            return self.return_statement();
        }
        if self.check(TokenKind::KwBreak) {
            let pos = self.advance().pos();
            self.consume(TokenKind::Semicolon, "Expected ';' after 'break'.")?;
            return Ok(Stmt::Break { pos });
        }
        if self.check(TokenKind::KwContinue) {
            let pos = self.advance().pos();
            self.consume(TokenKind::Semicolon, "Expected ';' after 'continue'.")?;
            return Ok(Stmt::Continue { pos });
        }
        if self.check(TokenKind::LBrace) {
            return self.block();
        }
        self.expression_statement()
    }

    fn block(&mut self) -> PResult<Stmt> {
        let pos = self.peek().pos();
        let statements = self.block_statements()?;
        Ok(Stmt::Block { statements, pos })
    }

    fn block_statements(&mut self) -> PResult<Vec<Stmt>> {
        self.consume(TokenKind::LBrace, "Expected '{'.")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(Bail) => self.synchronize(),
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after block.")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos(); // `if`
        self.consume(TokenKind::LParen, "Expected '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after condition.")?;
        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.check(TokenKind::KwElif) {
            Some(Box::new(self.if_statement_as_elif()?))
        } else if self.matches(&[TokenKind::KwElse]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            pos,
        })
    }

    /// An `elif` is parsed exactly like `if`, just entered without
    /// re-consuming the `if` keyword, and nested as the previous branch's
    /// `else_branch` — there is no dedicated elif AST node.
    fn if_statement_as_elif(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos(); // `elif`
        self.consume(TokenKind::LParen, "Expected '(' after 'elif'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after condition.")?;
        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.check(TokenKind::KwElif) {
            Some(Box::new(self.if_statement_as_elif()?))
        } else if self.matches(&[TokenKind::KwElse]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            pos,
        })
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos();
        self.consume(TokenKind::LParen, "Expected '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body, pos })
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos();
        self.consume(TokenKind::LParen, "Expected '(' after 'for'.")?;

        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.check(TokenKind::KwConjure) || self.check_word("var") {
            Some(ForInit::Decl(Box::new(self.variable_declaration()?)))
        } else {
            let expr = self.expression()?;
            self.consume(TokenKind::Semicolon, "Expected ';' after loop initializer.")?;
            Some(ForInit::Expr(expr))
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after loop condition.")?;

        let increment = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RParen, "Expected ')' after for clauses.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            pos,
        })
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.")?;
        Ok(Stmt::Return { value, pos })
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let pos = self.peek().pos();
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.")?;
        Ok(Stmt::ExpressionStatement { expr, pos })
    }

    // --- expressions: precedence climbing ------------------------------

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let target = self.logical_or()?;

        if self.matches(&[TokenKind::Assign]) {
            let pos = target.pos();
            let value = self.assignment()?;
            return Ok(Expr::Assignment {
                target: Box::new(target),
                value: Box::new(value),
                pos,
            });
        }

        Ok(target)
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let mut expr = self.logical_and()?;
        while self.matches(&[TokenKind::OrOr]) {
            let pos = expr.pos();
            let right = self.logical_and()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::Or,
                right: Box::new(right),
                pos,
            };
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::AndAnd]) {
            let pos = expr.pos();
            let right = self.equality()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::And,
                right: Box::new(right),
                pos,
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut expr = self.comparison()?;
        loop {
            let op = if self.matches(&[TokenKind::EqualEqual]) {
                BinaryOp::Eq
            } else if self.matches(&[TokenKind::NotEqual]) {
                BinaryOp::NotEq
            } else {
                break;
            };
            let pos = expr.pos();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                pos,
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut expr = self.term()?;
        loop {
            let op = if self.matches(&[TokenKind::Less]) {
                BinaryOp::Lt
            } else if self.matches(&[TokenKind::Greater]) {
                BinaryOp::Gt
            } else if self.matches(&[TokenKind::LessEqual]) {
                BinaryOp::LtEq
            } else if self.matches(&[TokenKind::GreaterEqual]) {
                BinaryOp::GtEq
            } else {
                break;
            };
            let pos = expr.pos();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                pos,
            };
        }
        Ok(expr)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut expr = self.factor()?;
        loop {
            let op = if self.matches(&[TokenKind::Plus]) {
                BinaryOp::Add
            } else if self.matches(&[TokenKind::Minus]) {
                BinaryOp::Sub
            } else {
                break;
            };
            let pos = expr.pos();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                pos,
            };
        }
        Ok(expr)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.matches(&[TokenKind::Star]) {
                BinaryOp::Mul
            } else if self.matches(&[TokenKind::Slash]) {
                BinaryOp::Div
            } else if self.matches(&[TokenKind::Percent]) {
                BinaryOp::Mod
            } else {
                break;
            };
            let pos = expr.pos();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                pos,
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.check(TokenKind::Minus) || self.check(TokenKind::Bang) {
            let pos = self.peek().pos();
            let op = if self.advance().kind == TokenKind::Minus {
                UnaryOp::Neg
            } else {
                UnaryOp::Not
            };
            let operand = Box::new(self.unary()?);
            return Ok(Expr::Unary { op, operand, pos });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(&[TokenKind::LParen]) {
                let pos = expr.pos();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.matches(&[TokenKind::Comma]) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "Expected ')' after arguments.")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    pos,
                };
            } else if self.matches(&[TokenKind::LBracket]) {
                let pos = expr.pos();
                let index = self.expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after index.")?;
                expr = Expr::Index {
                    array: Box::new(expr),
                    index: Box::new(index),
                    pos,
                };
            } else if self.matches(&[TokenKind::Dot]) {
                let pos = expr.pos();
                let field = self.consume(TokenKind::Identifier, "Expected field name after '.'.")?;
                expr = Expr::FieldAccess {
                    object: Box::new(expr),
                    field: field.lexeme,
                    pos,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::Integer => {
                self.advance();
                // The lexer only ever hands us a run of ASCII digits here, so
                // the sole way `parse` fails is the literal not fitting in 64
                // bits (the ground truth's integers are arbitrary-precision,
                // a case that can't arise there); report it as a parse error
                // rather than silently wrapping to some other value.
                match token.lexeme.parse::<i64>() {
                    Ok(value) => Ok(Expr::Integer { value, pos: token.pos() }),
                    Err(_) => {
                        let message = format!("Integer literal '{}' does not fit in 64 bits.", token.lexeme);
                        self.errors.push(ParseError { token, message });
                        Err(Bail)
                    }
                }
            }
            TokenKind::Float => {
                self.advance();
                // Unlike the integer case, this can't fail: the lexeme is
                // always digits with at most one '.', which `f64::parse`
                // always accepts, saturating to `f64::INFINITY` rather than
                // erroring on magnitudes a 64-bit float can't represent.
                let value = token.lexeme.parse::<f64>().unwrap_or(0.0);
                Ok(Expr::Float { value, pos: token.pos() })
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Str {
                    value: token.lexeme,
                    pos: token.pos(),
                })
            }
            TokenKind::Identifier if token.lexeme == "true" => {
                self.advance();
                Ok(Expr::Bool { value: true, pos: token.pos() })
            }
            TokenKind::Identifier if token.lexeme == "false" => {
                self.advance();
                Ok(Expr::Bool { value: false, pos: token.pos() })
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    pos: token.pos(),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RParen, "Expected ')' after expression.")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.array_literal(),
            _ => {
                self.advance();
                let message = format!("Unexpected token: {}", token.lexeme);
                self.errors.push(ParseError { token, message });
                Err(Bail)
            }
        }
    }

    fn array_literal(&mut self) -> PResult<Expr> {
        let pos = self.advance().pos(); // `[`
        let mut elements = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                elements.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RBracket, "Expected ']' after array literal.")?;
        Ok(Expr::ArrayLiteral { elements, pos })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_parses_to_empty_program() {
        let (program, errors) = parse("");
        assert!(program.statements.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn variable_declaration_with_var_keyword() {
        let (program, errors) = parse("var x: Int = 42;");
        assert!(errors.is_empty());
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Stmt::VariableDeclaration {
                name,
                type_annotation,
                initializer,
                pos,
            } => {
                assert_eq!(name, "x");
                assert_eq!(type_annotation.as_deref(), Some("Int"));
                assert!(initializer.is_some());
                assert_eq!(*pos, Pos::new(1, 1));
            }
            other => panic!("expected a variable declaration, got {other:?}"),
        }
    }

    #[test]
    fn function_declaration_with_call() {
        let (program, errors) = parse("function f(a: Int) -> Int { return a; } f(1);");
        assert!(errors.is_empty());
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(program.statements[0], Stmt::FunctionDeclaration { .. }));
        assert!(matches!(program.statements[1], Stmt::ExpressionStatement { .. }));
    }

    #[test]
    fn unexpected_token_is_recovered_via_synchronization() {
        let (program, errors) = parse("@ var y: Int = 1;");
        assert_eq!(errors.len(), 1);
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn if_elif_else_desugars_to_nested_if() {
        let (program, errors) = parse("if (1) { } elif (2) { } else { }");
        assert!(errors.is_empty());
        match &program.statements[0] {
            Stmt::If { else_branch, .. } => {
                let inner = else_branch.as_deref().expect("elif becomes nested else branch");
                assert!(matches!(inner, Stmt::If { .. }));
            }
            other => panic!("expected an if statement, got {other:?}"),
        }
    }

    #[test]
    fn integer_literal_overflowing_64_bits_is_a_parse_error() {
        let (_, errors) = parse("var x = 99999999999999999999;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("does not fit in 64 bits"));
    }

    #[test]
    fn precedence_climbs_correctly() {
        let (program, errors) = parse("var x = 1 + 2 * 3;");
        assert!(errors.is_empty());
        let Stmt::VariableDeclaration { initializer, .. } = &program.statements[0] else {
            panic!("expected a variable declaration");
        };
        match initializer.as_ref().unwrap() {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected addition at the top, got {other:?}"),
        }
    }
}
