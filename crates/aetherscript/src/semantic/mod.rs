//! Semantic analyzer: a second, independent walk over the AST that builds
//! the navigation model (definitions, references, hover text) consumed by
//! the LSP boundary. Shares no state with [`crate::typechecker`] — each
//! builds its own fresh [`SymbolTable`].

use std::collections::HashMap;

use crate::ast::{Expr, ForInit, Program, Stmt};
use crate::lexer::Pos;
use crate::symbols::{FunctionSymbol, Symbol, SymbolTable, VariableSymbol};

/// A source location. A thin re-export-shaped wrapper over [`Pos`] kept
/// distinct because it is part of the public navigation API (definitions,
/// references) rather than the lexer's internal position type, even though
/// the two carry identical fields.
pub type Location = Pos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    Function,
    Variable,
    Parameter,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Function => "function",
            DefinitionKind::Variable => "variable",
            DefinitionKind::Parameter => "parameter",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub location: Location,
    pub type_name: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub location: Location,
    pub definition: Definition,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticInfo {
    pub definitions: HashMap<String, Vec<Definition>>,
    pub references: Vec<Reference>,
    pub errors: Vec<String>,
}

impl SemanticInfo {
    /// Returns the first recorded [`Definition`] of `name`, regardless of
    /// `_location` — a known, preserved weakness: first-definition lookup
    /// is scope-blind and ignores shadowing.
    pub fn find_definition(&self, name: &str, _location: Location) -> Option<&Definition> {
        self.definitions.get(name).and_then(|defs| defs.first())
    }

    /// Every reference bound to the definition at exactly `def_location`.
    pub fn find_all_references(&self, name: &str, def_location: Location) -> Vec<&Reference> {
        self.references
            .iter()
            .filter(|r| r.name == name && r.definition.location == def_location)
            .collect()
    }

    /// Formats hover text for `name` at `location`, or `None` if `name` has
    /// no recorded definition.
    pub fn find_hover_info(&self, name: &str, location: Location) -> Option<String> {
        let definition = self.find_definition(name, location)?;
        Some(if definition.detail.is_empty() {
            format!("{} {}: {}", definition.kind.as_str(), definition.name, definition.type_name)
        } else {
            format!(
                "{} {}: {}\n{}",
                definition.kind.as_str(),
                definition.name,
                definition.type_name,
                definition.detail
            )
        })
    }
}

/// The synthetic location the `print` builtin's definition is recorded at.
/// No real source location exists for it; the LSP boundary special-cases
/// this exact location to suppress go-to-definition.
pub const BUILTIN_LOCATION: Location = Pos { line: 0, column: 0 };

/// Runs the semantic analysis walk over `program`, returning the completed
/// [`SemanticInfo`].
pub fn analyze(program: &Program) -> SemanticInfo {
    let mut analyzer = SemanticAnalyzer::new();
    analyzer.analyze_program(program);
    SemanticInfo {
        definitions: analyzer.definitions,
        references: analyzer.references,
        errors: analyzer.errors,
    }
}

struct SemanticAnalyzer {
    scope: SymbolTable,
    definitions: HashMap<String, Vec<Definition>>,
    references: Vec<Reference>,
    errors: Vec<String>,
}

impl SemanticAnalyzer {
    fn new() -> Self {
        let mut analyzer = SemanticAnalyzer {
            scope: SymbolTable::new_root("global"),
            definitions: HashMap::new(),
            references: Vec::new(),
            errors: Vec::new(),
        };
        analyzer.init_builtins();
        analyzer
    }

    fn init_builtins(&mut self) {
        let print_func = FunctionSymbol {
            name: "print".to_string(),
            return_type: "Void".to_string(),
            parameters: vec![VariableSymbol::new("value", "Any")],
            is_builtin: true,
        };
        self.scope.define(Symbol::Function(print_func));
        self.record_definition(
            "print",
            DefinitionKind::Function,
            BUILTIN_LOCATION,
            "Void",
            "Built-in function: print(value: Any) -> Void",
        );
    }

    fn record_definition(&mut self, name: &str, kind: DefinitionKind, location: Location, type_name: impl Into<String>, detail: impl Into<String>) -> Definition {
        let definition = Definition {
            name: name.to_string(),
            kind,
            location,
            type_name: type_name.into(),
            detail: detail.into(),
        };
        self.definitions.entry(name.to_string()).or_default().push(definition.clone());
        definition
    }

    fn record_reference(&mut self, name: &str, location: Location, definition: Definition) {
        self.references.push(Reference {
            name: name.to_string(),
            location,
            definition,
        });
    }

    fn with_child_scope<R>(&mut self, label: impl Into<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.scope.clone();
        self.scope = saved.create_child_scope(label);
        let result = f(self);
        self.scope = saved;
        result
    }

    fn analyze_program(&mut self, program: &Program) {
        for stmt in &program.statements {
            self.analyze_stmt(stmt);
        }
    }

    fn analyze_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VariableDeclaration {
                name,
                type_annotation,
                initializer,
                pos,
            } => self.analyze_variable_declaration(name, type_annotation.as_deref(), initializer.as_ref(), *pos),

            Stmt::FunctionDeclaration {
                name,
                params,
                return_type,
                body,
                pos,
            } => self.analyze_function_declaration(name, params, return_type, body, *pos),

            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.analyze_expr(value);
                }
            }

            Stmt::Block { statements, .. } => {
                let label = format!("{}.block", self.scope.name());
                self.with_child_scope(label, |analyzer| {
                    for stmt in statements {
                        analyzer.analyze_stmt(stmt);
                    }
                });
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.analyze_expr(condition);
                self.analyze_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.analyze_stmt(else_branch);
                }
            }

            Stmt::While { condition, body, .. } => {
                self.analyze_expr(condition);
                self.analyze_stmt(body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                let label = format!("{}.for", self.scope.name());
                self.with_child_scope(label, |analyzer| {
                    match initializer {
                        Some(ForInit::Decl(decl)) => analyzer.analyze_stmt(decl),
                        Some(ForInit::Expr(expr)) => analyzer.analyze_expr(expr),
                        None => {}
                    }
                    if let Some(condition) = condition {
                        analyzer.analyze_expr(condition);
                    }
                    if let Some(increment) = increment {
                        analyzer.analyze_expr(increment);
                    }
                    analyzer.analyze_stmt(body);
                });
            }

            Stmt::Break { .. } | Stmt::Continue { .. } => {}

            Stmt::ExpressionStatement { expr, .. } => self.analyze_expr(expr),
        }
    }

    fn analyze_variable_declaration(&mut self, name: &str, type_annotation: Option<&str>, initializer: Option<&Expr>, pos: Pos) {
        // Deliberately diverges from the type checker here: an un-annotated
        // variable's recorded type is the literal string "inferred", not the
        // initializer's real type.
        let var_type = type_annotation.unwrap_or("inferred");

        self.record_definition(name, DefinitionKind::Variable, pos, var_type, "");

        if self.scope.contains_local(name) {
            self.errors.push(format!("Variable '{name}' is already defined at {}:{}", pos.line, pos.column));
        } else {
            self.scope.define(Symbol::Variable(VariableSymbol::new(name, var_type)));
        }

        if let Some(initializer) = initializer {
            self.analyze_expr(initializer);
        }
    }

    fn analyze_function_declaration(&mut self, name: &str, params: &[crate::ast::Param], return_type: &str, body: &[Stmt], pos: Pos) {
        let detail = format_function_signature(name, params, return_type);
        self.record_definition(name, DefinitionKind::Function, pos, return_type, detail);

        let func_symbol = FunctionSymbol {
            name: name.to_string(),
            return_type: return_type.to_string(),
            parameters: Vec::new(),
            is_builtin: false,
        };

        if self.scope.contains_local(name) {
            self.errors.push(format!("Function '{name}' is already defined at {}:{}", pos.line, pos.column));
        } else {
            self.scope.define(Symbol::Function(func_symbol));
        }

        self.with_child_scope(name.to_string(), |analyzer| {
            for param in params {
                analyzer.analyze_parameter(param);
            }
            for stmt in body {
                analyzer.analyze_stmt(stmt);
            }
        });
    }

    fn analyze_parameter(&mut self, param: &crate::ast::Param) {
        self.record_definition(&param.name, DefinitionKind::Parameter, param.pos, &param.type_annotation, "");
        self.scope.define(Symbol::Variable(VariableSymbol::new(param.name.clone(), param.type_annotation.clone())));
    }

    fn analyze_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Integer { .. } | Expr::Float { .. } | Expr::Str { .. } | Expr::Bool { .. } => {}

            Expr::Identifier { name, pos } => {
                if self.scope.resolve(name).is_none() {
                    self.errors.push(format!("Undefined identifier '{name}' at {}:{}", pos.line, pos.column));
                    return;
                }
                if let Some(definition) = self.find_definition(name, *pos).cloned() {
                    self.record_reference(name, *pos, definition);
                }
            }

            Expr::Binary { left, right, .. } => {
                self.analyze_expr(left);
                self.analyze_expr(right);
            }

            Expr::Unary { operand, .. } => self.analyze_expr(operand),

            Expr::Call { callee, args, .. } => {
                self.analyze_expr(callee);
                for arg in args {
                    self.analyze_expr(arg);
                }
            }

            Expr::Assignment { target, value, .. } => {
                self.analyze_expr(target);
                self.analyze_expr(value);
            }

            Expr::ArrayLiteral { elements, .. } => {
                for element in elements {
                    self.analyze_expr(element);
                }
            }

            Expr::Index { array, index, .. } => {
                self.analyze_expr(array);
                self.analyze_expr(index);
            }

            Expr::FieldAccess { object, .. } => self.analyze_expr(object),
        }
    }

    fn find_definition(&self, name: &str, _location: Location) -> Option<&Definition> {
        self.definitions.get(name).and_then(|defs| defs.first())
    }
}

fn format_function_signature(name: &str, params: &[crate::ast::Param], return_type: &str) -> String {
    let rendered: Vec<String> = params.iter().map(|p| format!("{}: {}", p.name, p.type_annotation)).collect();
    format!("function {name}({}) -> {return_type}", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze_src(src: &str) -> SemanticInfo {
        let (program, errors) = parse(src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        analyze(&program)
    }

    #[test]
    fn variable_declaration_is_recorded() {
        let info = analyze_src("var x: Int = 42;");
        let defs = info.definitions.get("x").expect("x should be defined");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, DefinitionKind::Variable);
        assert_eq!(defs[0].type_name, "Int");
        assert_eq!(defs[0].location, Pos::new(1, 1));
        assert!(info.errors.is_empty());
    }

    #[test]
    fn function_and_parameter_and_reference() {
        let info = analyze_src("function f(a: Int) -> Int { return a; } f(1);");
        assert_eq!(info.definitions.get("f").unwrap().len(), 1);
        assert_eq!(info.definitions.get("a").unwrap().len(), 1);

        let f_def = info.definitions["f"][0].clone();
        let a_def = info.definitions["a"][0].clone();

        assert!(info.references.iter().any(|r| r.name == "a" && r.definition.location == a_def.location));
        assert!(info.references.iter().any(|r| r.name == "f" && r.definition.location == f_def.location));
    }

    #[test]
    fn function_signature_detail_is_formatted() {
        let info = analyze_src("function f(a: Int, b: String) -> Boolean { return true; }");
        let def = &info.definitions["f"][0];
        assert_eq!(def.detail, "function f(a: Int, b: String) -> Boolean");
    }

    #[test]
    fn undefined_identifier_is_a_formatted_error() {
        let info = analyze_src("print(missing);");
        assert_eq!(info.errors.len(), 1);
        assert!(info.errors[0].starts_with("Undefined identifier 'missing' at"));
    }

    #[test]
    fn references_every_point_to_a_recorded_definition() {
        let info = analyze_src("var x: Int = 1; var y: Int = x + x;");
        for reference in &info.references {
            let defs = info.definitions.get(&reference.name).unwrap();
            assert!(defs.iter().any(|d| d.location == reference.definition.location));
        }
    }

    #[test]
    fn find_definition_then_find_all_references() {
        let info = analyze_src("var x: Int = 1; var y: Int = x; var z: Int = x;");
        let def = info.find_definition("x", Pos::new(1, 1)).unwrap().clone();
        let refs = info.find_all_references("x", def.location);
        assert_eq!(refs.len(), 2);
        for r in refs {
            assert_eq!(r.definition.location, def.location);
        }
    }

    #[test]
    fn hover_for_builtin_print() {
        let info = analyze_src("print(1);");
        let hover = info.find_hover_info("print", Pos::new(1, 1)).unwrap();
        assert_eq!(hover, "function print: Void\nBuilt-in function: print(value: Any) -> Void");
    }

    #[test]
    fn hover_for_variable_without_detail_has_one_line() {
        let info = analyze_src("var x: Int = 1;");
        let hover = info.find_hover_info("x", Pos::new(1, 1)).unwrap();
        assert_eq!(hover, "variable x: Int");
    }

    #[test]
    fn untyped_variable_records_inferred_placeholder_type_name() {
        let info = analyze_src("var x = 1;");
        assert_eq!(info.definitions["x"][0].type_name, "inferred");
    }

    #[test]
    fn redeclaration_in_same_scope_is_an_error() {
        let info = analyze_src("var x: Int = 1; var x: Int = 2;");
        assert_eq!(info.errors.len(), 1);
        assert!(info.errors[0].contains("already defined"));
    }

    #[test]
    fn shadowing_in_a_nested_scope_records_two_definitions_but_no_error() {
        let info = analyze_src("var x: Int = 1; { var x: Int = 2; }");
        assert!(info.errors.is_empty());
        assert_eq!(info.definitions["x"].len(), 2);
    }

    #[test]
    fn scope_is_restored_after_analysis() {
        let (program, _) = parse("function f(a: Int) -> Int { var b: Int = a; return b; }");
        let mut analyzer = SemanticAnalyzer::new();
        let root_name = analyzer.scope.name();
        analyzer.analyze_program(&program);
        assert_eq!(analyzer.scope.name(), root_name);
    }
}
