//! Single-pass type checker.
//!
//! Walks the AST built by [`crate::parser`], populating a fresh
//! [`SymbolTable`] as it goes and collecting [`TypeError`]s. Does not mutate
//! its input and never panics on malformed input — every rule either
//! produces a type or falls back to the [`UNKNOWN`] sentinel plus a pushed
//! error.

use crate::ast::{BinaryOp, Expr, ForInit, Param, Program, Stmt, UnaryOp};
use crate::lexer::Pos;
use crate::symbols::{FunctionSymbol, Symbol, SymbolTable, VariableSymbol};

/// Sentinel type for "a sub-expression's type could not be determined; this
/// has already been reported, don't cascade". Most rules treat it as
/// incompatible with everything else, which can produce extra downstream
/// errors for one malformed sub-expression — accepted for simplicity.
pub const UNKNOWN: &str = "Unknown";

const VOID: &str = "Void";
const INT: &str = "Int";
const FLOAT: &str = "Float";
const STRING: &str = "String";
const BOOLEAN: &str = "Boolean";
const ANY: &str = "Any";

const KNOWN_TYPES: [&str; 11] = [
    "Void", "Int", "Float", "String", "Boolean", "Array", "Map", "Element", "Energy", "Spirit", "Matter",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl TypeError {
    fn at(pos: Pos, message: impl Into<String>) -> Self {
        TypeError {
            message: message.into(),
            line: pos.line,
            column: pos.column,
        }
    }
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Type Error at line {}, column {}: {}", self.line, self.column, self.message)
    }
}

/// Checks `program`, returning every [`TypeError`] found, in source-visit
/// order.
pub fn check(program: &Program) -> Vec<TypeError> {
    let mut checker = TypeChecker::new();
    checker.check_program(program);
    checker.errors
}

struct TypeChecker {
    scope: SymbolTable,
    errors: Vec<TypeError>,
    current_function: Option<FunctionSymbol>,
}

impl TypeChecker {
    fn new() -> Self {
        let scope = SymbolTable::new_root("global");
        scope.define(Symbol::Function(FunctionSymbol {
            name: "print".to_string(),
            return_type: VOID.to_string(),
            parameters: vec![VariableSymbol::new("value", ANY)],
            is_builtin: true,
        }));
        TypeChecker {
            scope,
            errors: Vec::new(),
            current_function: None,
        }
    }

    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.errors.push(TypeError::at(pos, message));
    }

    /// Runs `f` with `self.scope` temporarily replaced by a fresh child
    /// scope, then restores the saved scope on every path — `f` here never
    /// panics or returns early out of the walk, so there are no fallible
    /// exits to guard against.
    fn with_child_scope<R>(&mut self, label: impl Into<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.scope.clone();
        self.scope = saved.create_child_scope(label);
        let result = f(self);
        self.scope = saved;
        result
    }

    fn check_program(&mut self, program: &Program) {
        for stmt in &program.statements {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VariableDeclaration {
                name,
                type_annotation,
                initializer,
                pos,
            } => self.check_variable_declaration(name, type_annotation.as_deref(), initializer.as_ref(), *pos),

            Stmt::FunctionDeclaration {
                name,
                params,
                return_type,
                body,
                pos,
            } => self.check_function_declaration(name, params, return_type, body, *pos),

            Stmt::Return { value, pos } => self.check_return(value.as_ref(), *pos),

            Stmt::Block { statements, .. } => {
                let label = format!("{}.block", self.scope.name());
                self.with_child_scope(label, |checker| {
                    for stmt in statements {
                        checker.check_stmt(stmt);
                    }
                });
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let cond_type = self.check_expr(condition);
                if cond_type != BOOLEAN {
                    self.error(condition.pos(), format!("If condition must be a Boolean, got '{cond_type}'"));
                }
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }

            Stmt::While { condition, body, .. } => {
                let cond_type = self.check_expr(condition);
                if cond_type != BOOLEAN {
                    self.error(condition.pos(), format!("While condition must be a Boolean, got '{cond_type}'"));
                }
                self.check_stmt(body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                let label = format!("{}.for", self.scope.name());
                self.with_child_scope(label, |checker| {
                    match initializer {
                        Some(ForInit::Decl(decl)) => checker.check_stmt(decl),
                        Some(ForInit::Expr(expr)) => {
                            checker.check_expr(expr);
                        }
                        None => {}
                    }

                    if let Some(condition) = condition {
                        let cond_type = checker.check_expr(condition);
                        if cond_type != BOOLEAN {
                            checker.error(condition.pos(), format!("For condition must be a Boolean, got '{cond_type}'"));
                        }
                    }

                    if let Some(increment) = increment {
                        checker.check_expr(increment);
                    }

                    checker.check_stmt(body);
                });
            }

            Stmt::Break { .. } | Stmt::Continue { .. } => {}

            Stmt::ExpressionStatement { expr, .. } => {
                self.check_expr(expr);
            }
        }
    }

    fn check_variable_declaration(&mut self, name: &str, type_annotation: Option<&str>, initializer: Option<&Expr>, pos: Pos) {
        let init_type = initializer.map(|expr| self.check_expr(expr)).unwrap_or_else(|| VOID.to_string());

        if let Some(annotation) = type_annotation {
            if !KNOWN_TYPES.contains(&annotation) {
                self.error(pos, format!("Unknown type '{annotation}'"));
            } else if initializer.is_some() && init_type != annotation {
                self.error(
                    pos,
                    format!("Cannot assign a value of type '{init_type}' to a variable of type '{annotation}'"),
                );
            }
        }

        let var_type = type_annotation.map(str::to_string).unwrap_or(init_type);

        if self.scope.contains_local(name) {
            self.error(pos, format!("Variable '{name}' is already defined in this scope"));
        } else {
            self.scope.define(Symbol::Variable(VariableSymbol::new(name, var_type)));
        }
    }

    fn check_function_declaration(&mut self, name: &str, params: &[Param], return_type: &str, body: &[Stmt], pos: Pos) {
        let func_symbol = FunctionSymbol {
            name: name.to_string(),
            return_type: return_type.to_string(),
            parameters: Vec::new(),
            is_builtin: false,
        };

        if self.scope.contains_local(name) {
            self.error(pos, format!("Function '{name}' is already defined in this scope"));
        } else {
            self.scope.define(Symbol::Function(func_symbol.clone()));
        }

        self.with_child_scope(name.to_string(), |checker| {
            let previous_function = checker.current_function.replace(func_symbol);

            let mut parameters = Vec::with_capacity(params.len());
            for param in params {
                let param_symbol = VariableSymbol::new(param.name.clone(), param.type_annotation.clone());
                checker.scope.define(Symbol::Variable(param_symbol.clone()));
                parameters.push(param_symbol);
            }
            if let Some(func) = checker.current_function.as_mut() {
                func.parameters = parameters;
            }

            for stmt in body {
                checker.check_stmt(stmt);
            }

            checker.current_function = previous_function;
        });
    }

    fn check_return(&mut self, value: Option<&Expr>, pos: Pos) {
        let Some(current_function) = self.current_function.clone() else {
            self.error(pos, "Return statement outside of function");
            return;
        };

        match value {
            None => {
                if current_function.return_type != VOID {
                    self.error(
                        pos,
                        format!(
                            "Function '{}' must return a value of type '{}'",
                            current_function.name, current_function.return_type
                        ),
                    );
                }
            }
            Some(expr) => {
                let return_type = self.check_expr(expr);
                if return_type != current_function.return_type {
                    self.error(
                        pos,
                        format!(
                            "Cannot return a value of type '{return_type}' from a function with return type '{}'",
                            current_function.return_type
                        ),
                    );
                }
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Integer { .. } => INT.to_string(),
            Expr::Float { .. } => FLOAT.to_string(),
            Expr::Str { .. } => STRING.to_string(),
            Expr::Bool { .. } => BOOLEAN.to_string(),

            Expr::Identifier { name, pos } => match self.scope.resolve(name) {
                Some(symbol) => symbol_type(&symbol),
                None => {
                    self.error(*pos, format!("Undefined identifier '{name}'"));
                    UNKNOWN.to_string()
                }
            },

            Expr::Binary { left, op, right, pos } => {
                let left_type = self.check_expr(left);
                let right_type = self.check_expr(right);
                self.check_binary(*op, &left_type, &right_type, *pos)
            }

            Expr::Unary { op, operand, pos } => {
                let operand_type = self.check_expr(operand);
                self.check_unary(*op, &operand_type, *pos)
            }

            Expr::Call { callee, args, pos } => self.check_call(callee, args, *pos),

            Expr::Assignment { target, value, pos } => self.check_assignment(target, value, *pos),

            Expr::ArrayLiteral { elements, pos } => self.check_array_literal(elements, *pos),

            Expr::Index { array, index, pos } => self.check_index(array, index, *pos),

            Expr::FieldAccess { object, .. } => {
                // No field-access rule is defined; walk the object for its
                // side effects (error reporting) and fall back to Unknown
                // without reporting a new error.
                self.check_expr(object);
                UNKNOWN.to_string()
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left_type: &str, right_type: &str, pos: Pos) -> String {
        use BinaryOp::*;
        match op {
            Add | Sub | Mul | Div | Mod => {
                if left_type == INT && right_type == INT {
                    return INT.to_string();
                }
                if matches!(left_type, "Int" | "Float") && matches!(right_type, "Int" | "Float") {
                    return FLOAT.to_string();
                }
                if op == Add && (left_type == STRING || right_type == STRING) {
                    return STRING.to_string();
                }
                self.error(
                    pos,
                    format!("Cannot apply operator '{}' to types '{left_type}' and '{right_type}'", binary_op_lexeme(op)),
                );
                UNKNOWN.to_string()
            }
            Eq | NotEq | Lt | Gt | LtEq | GtEq | And | Or => BOOLEAN.to_string(),
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand_type: &str, pos: Pos) -> String {
        match op {
            UnaryOp::Neg if matches!(operand_type, "Int" | "Float") => operand_type.to_string(),
            UnaryOp::Not if operand_type == BOOLEAN => BOOLEAN.to_string(),
            _ => {
                let lexeme = if op == UnaryOp::Neg { "-" } else { "!" };
                self.error(pos, format!("Cannot apply unary operator '{lexeme}' to type '{operand_type}'"));
                UNKNOWN.to_string()
            }
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr], pos: Pos) -> String {
        // The callee is always visited, whether or not it turns out to be
        // an Identifier — an undefined callee therefore reports both
        // "Undefined identifier" (from this visit) and, below, "Undefined
        // function", matching the ground truth's double-error behavior for
        // a call to an undefined name.
        let callee_type = self.check_expr(callee);

        let Expr::Identifier { name: func_name, .. } = callee else {
            self.error(pos, format!("Expression of type '{callee_type}' is not callable"));
            return UNKNOWN.to_string();
        };

        let resolved = self.scope.resolve(func_name);
        let func_symbol = match resolved {
            Some(Symbol::Function(func_symbol)) => func_symbol,
            Some(Symbol::Variable(_)) => {
                self.error(pos, format!("Cannot call non-function '{func_name}'"));
                return UNKNOWN.to_string();
            }
            None => {
                self.error(pos, format!("Undefined function '{func_name}'"));
                return UNKNOWN.to_string();
            }
        };

        if args.len() != func_symbol.parameters.len() {
            self.error(
                pos,
                format!(
                    "Function '{func_name}' expects {} arguments, but got {}",
                    func_symbol.parameters.len(),
                    args.len()
                ),
            );
        } else {
            for (i, (arg, param)) in args.iter().zip(&func_symbol.parameters).enumerate() {
                let arg_type = self.check_expr(arg);
                if arg_type != param.type_name && param.type_name != ANY {
                    self.error(
                        arg.pos(),
                        format!(
                            "Argument {} to function '{func_name}' must be of type '{}', got '{arg_type}'",
                            i + 1,
                            param.type_name
                        ),
                    );
                }
            }
        }

        func_symbol.return_type
    }

    fn check_assignment(&mut self, target: &Expr, value: &Expr, pos: Pos) -> String {
        let Expr::Identifier { name: var_name, .. } = target else {
            self.error(pos, "Invalid assignment target");
            return UNKNOWN.to_string();
        };

        let Some(var_symbol) = self.scope.resolve(var_name) else {
            self.error(pos, format!("Undefined variable '{var_name}'"));
            return UNKNOWN.to_string();
        };

        if let Symbol::Variable(v) = &var_symbol {
            if !v.is_mutable {
                self.error(pos, format!("Cannot assign to immutable variable '{var_name}'"));
            }
        }

        let value_type = self.check_expr(value);
        let var_type = symbol_type(&var_symbol);
        if value_type != var_type {
            self.error(
                pos,
                format!("Cannot assign a value of type '{value_type}' to a variable of type '{var_type}'"),
            );
        }

        var_type
    }

    fn check_array_literal(&mut self, elements: &[Expr], _pos: Pos) -> String {
        let Some(first) = elements.first() else {
            return "Array<Any>".to_string();
        };
        let element_type = self.check_expr(first);
        for element in &elements[1..] {
            let current_type = self.check_expr(element);
            if current_type != element_type {
                self.error(
                    element.pos(),
                    format!("Array elements must all have the same type. Expected '{element_type}', got '{current_type}'"),
                );
            }
        }
        format!("Array<{element_type}>")
    }

    fn check_index(&mut self, array: &Expr, index: &Expr, pos: Pos) -> String {
        let array_type = self.check_expr(array);
        let index_type = self.check_expr(index);

        if !array_type.starts_with("Array<") {
            self.error(pos, format!("Cannot index into non-array type '{array_type}'"));
            return UNKNOWN.to_string();
        }

        if index_type != INT {
            self.error(index.pos(), format!("Array index must be an Int, got '{index_type}'"));
        }

        array_type[6..array_type.len() - 1].to_string()
    }
}

fn symbol_type(symbol: &Symbol) -> String {
    match symbol {
        Symbol::Variable(v) => v.type_name.clone(),
        Symbol::Function(f) => f.return_type.clone(),
    }
}

fn binary_op_lexeme(op: BinaryOp) -> &'static str {
    use BinaryOp::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        Eq => "==",
        NotEq => "!=",
        Lt => "<",
        Gt => ">",
        LtEq => "<=",
        GtEq => ">=",
        And => "&&",
        Or => "||",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check_src(src: &str) -> Vec<TypeError> {
        let (program, parse_errors) = parse(src);
        assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
        check(&program)
    }

    #[test]
    fn simple_typed_declaration_has_no_errors() {
        assert!(check_src("var x: Int = 42;").is_empty());
    }

    #[test]
    fn mismatched_initializer_is_an_error() {
        let errors = check_src(r#"var x: Int = "hi";"#);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("String"));
        assert!(errors[0].message.contains("Int"));
    }

    #[test]
    fn function_call_roundtrip_has_no_errors() {
        let errors = check_src("function f(a: Int) -> Int { return a; } f(1);");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn missing_return_value_for_non_void_function_errors() {
        let errors = check_src("function f() -> Int { return; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must return"));
    }

    #[test]
    fn mixed_array_element_types_error_once() {
        let errors = check_src(r#"var a = [1, 2, "x"];"#);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("same type"));
    }

    #[test]
    fn non_boolean_if_condition_errors() {
        let errors = check_src("if (1) { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Boolean"));
    }

    #[test]
    fn comparison_never_validates_operand_types() {
        assert!(check_src(r#"var x = 1 == "str";"#).is_empty());
    }

    #[test]
    fn string_concatenation_only_needs_one_string_operand() {
        assert!(check_src(r#"var x = "a" + 1;"#).is_empty());
    }

    #[test]
    fn redeclaration_in_same_scope_errors() {
        let errors = check_src("var x: Int = 1; var x: Int = 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("already defined"));
    }

    #[test]
    fn shadowing_in_nested_scope_is_allowed() {
        let errors = check_src("var x: Int = 1; { var x: Int = 2; }");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn array_index_type_checking() {
        let errors = check_src("var a = [1, 2]; var x: Int = a[0];");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn indexing_non_array_errors() {
        let errors = check_src("var x: Int = 1; var y = x[0];");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("non-array"));
    }

    #[test]
    fn builtin_print_is_callable_with_any_argument() {
        assert!(check_src(r#"print("hi"); print(1);"#).is_empty());
    }

    #[test]
    fn calling_an_undefined_function_reports_both_identifier_and_call_errors() {
        let errors = check_src("foo(1);");
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].message.contains("Undefined identifier"));
        assert!(errors[1].message.contains("Undefined function"));
    }

    #[test]
    fn malformed_argument_to_an_undefined_call_is_not_double_reported() {
        let errors = check_src("foo(bar);");
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].message.contains("Undefined identifier 'foo'"));
        assert!(errors[1].message.contains("Undefined function 'foo'"));
        assert!(errors[2].message.contains("Undefined identifier 'bar'"));
    }

    #[test]
    fn assigning_to_an_undeclared_variable_does_not_also_check_the_value() {
        let errors = check_src("x = undeclared;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Undefined variable 'x'"));
    }

    #[test]
    fn assigning_through_an_invalid_target_does_not_also_check_the_value() {
        let errors = check_src("1 = undeclared;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Invalid assignment target"));
    }

    #[test]
    fn scope_is_restored_to_root_after_check() {
        let (program, _) = parse("function f(a: Int) -> Int { var b: Int = a; return b; }");
        let mut checker = TypeChecker::new();
        let root_name = checker.scope.name();
        checker.check_program(&program);
        assert_eq!(checker.scope.name(), root_name);
    }
}
