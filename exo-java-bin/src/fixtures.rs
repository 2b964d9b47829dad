//! Hand-built AST fixtures standing in for a real `.java` front end.
//!
//! The generator's contract starts from an already-parsed
//! [`CompilationUnit`] (spec.md §6.2); this crate doesn't lex or parse
//! source text, so the driver picks one of these fixtures by name
//! instead of reading a file from disk.

use java_compiler::ast::*;
use java_compiler::types::Primitive;

pub const NAMES: &[&str] = &["counter", "fib", "grades"];

pub fn build(name: &str) -> Option<CompilationUnit> {
    match name {
        "counter" => Some(counter()),
        "fib" => Some(fib()),
        "grades" => Some(grades()),
        _ => None,
    }
}

fn modifiers(public: bool, is_static: bool) -> Modifiers {
    Modifiers {
        public,
        is_static,
        ..Modifiers::default()
    }
}

fn int_ty() -> TypeRef {
    TypeRef::Primitive(Primitive::Int)
}

fn name_expr(n: &str) -> Expr {
    Expr::Name(n.to_string())
}

fn int_lit(v: i32) -> Expr {
    Expr::Literal(Literal::Int(v))
}

fn param(name: &str, param_type: TypeRef) -> Parameter {
    Parameter {
        name: name.to_string(),
        param_type,
        is_varargs: false,
        is_final: false,
    }
}

fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `class Counter { private int value; Counter() {...} int increment()
/// {...} int sum(int n) {...} }` — instance fields, a constructor with
/// an implicit `super()`, a `for` loop, and `this`-qualified field
/// access and method calls.
fn counter() -> CompilationUnit {
    let field = FieldDecl {
        modifiers: modifiers(false, false),
        element_type: int_ty(),
        declarators: vec![Declarator {
            name: "value".to_string(),
            extra_dimensions: 0,
            initializer: None,
        }],
    };

    let ctor = ConstructorDecl {
        modifiers: modifiers(true, false),
        parameters: vec![],
        throws: vec![],
        body: vec![Stmt::Expr(Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(Expr::FieldAccess {
                target: Box::new(Expr::This),
                name: "value".to_string(),
            }),
            value: Box::new(int_lit(0)),
        })],
    };

    let increment = MethodDecl {
        modifiers: modifiers(true, false),
        type_parameters: vec![],
        return_type: int_ty(),
        name: "increment".to_string(),
        parameters: vec![],
        throws: vec![],
        body: Some(vec![
            Stmt::Expr(Expr::Assign {
                op: AssignOp::Assign,
                target: Box::new(Expr::FieldAccess {
                    target: Box::new(Expr::This),
                    name: "value".to_string(),
                }),
                value: Box::new(bin(
                    BinaryOp::Add,
                    Expr::FieldAccess {
                        target: Box::new(Expr::This),
                        name: "value".to_string(),
                    },
                    int_lit(1),
                )),
            }),
            Stmt::Return(Some(Expr::FieldAccess {
                target: Box::new(Expr::This),
                name: "value".to_string(),
            })),
        ]),
    };

    let sum = MethodDecl {
        modifiers: modifiers(true, false),
        type_parameters: vec![],
        return_type: int_ty(),
        name: "sum".to_string(),
        parameters: vec![param("n", int_ty())],
        throws: vec![],
        body: Some(vec![
            Stmt::LocalDecl {
                element_type: int_ty(),
                declarators: vec![Declarator {
                    name: "total".to_string(),
                    extra_dimensions: 0,
                    initializer: Some(int_lit(0)),
                }],
                is_final: false,
            },
            Stmt::For {
                init: vec![Stmt::LocalDecl {
                    element_type: int_ty(),
                    declarators: vec![Declarator {
                        name: "i".to_string(),
                        extra_dimensions: 0,
                        initializer: Some(int_lit(0)),
                    }],
                    is_final: false,
                }],
                condition: Some(bin(BinaryOp::Lt, name_expr("i"), name_expr("n"))),
                update: vec![Expr::Unary {
                    op: UnaryOp::PostIncrement,
                    operand: Box::new(name_expr("i")),
                }],
                body: Box::new(Stmt::Block(vec![Stmt::Expr(Expr::Assign {
                    op: AssignOp::Assign,
                    target: Box::new(name_expr("total")),
                    value: Box::new(bin(
                        BinaryOp::Add,
                        name_expr("total"),
                        Expr::MethodCall {
                            target: None,
                            name: "increment".to_string(),
                            arguments: vec![],
                        },
                    )),
                })])),
                label: None,
            },
            Stmt::Return(Some(name_expr("total"))),
        ]),
    };

    CompilationUnit {
        package: None,
        imports: vec![],
        types: vec![TypeDecl {
            kind: TypeKind::Class,
            modifiers: modifiers(true, false),
            name: "Counter".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![
                Member::Field(field),
                Member::Constructor(ctor),
                Member::Method(increment),
                Member::Method(sum),
            ],
            enum_constants: vec![],
        }],
    }
}

/// `class Fib { static int fib(int n) { if (n < 2) return n;
/// return fib(n - 1) + fib(n - 2); } }` — a static self-recursive call
/// and an `if` with no `else`.
fn fib() -> CompilationUnit {
    let body = vec![
        Stmt::If {
            condition: bin(BinaryOp::Lt, name_expr("n"), int_lit(2)),
            then_branch: Box::new(Stmt::Return(Some(name_expr("n")))),
            else_branch: None,
        },
        Stmt::Return(Some(bin(
            BinaryOp::Add,
            Expr::MethodCall {
                target: None,
                name: "fib".to_string(),
                arguments: vec![bin(BinaryOp::Sub, name_expr("n"), int_lit(1))],
            },
            Expr::MethodCall {
                target: None,
                name: "fib".to_string(),
                arguments: vec![bin(BinaryOp::Sub, name_expr("n"), int_lit(2))],
            },
        ))),
    ];

    let fib_method = MethodDecl {
        modifiers: modifiers(true, true),
        type_parameters: vec![],
        return_type: int_ty(),
        name: "fib".to_string(),
        parameters: vec![param("n", int_ty())],
        throws: vec![],
        body: Some(body),
    };

    CompilationUnit {
        package: None,
        imports: vec![],
        types: vec![TypeDecl {
            kind: TypeKind::Class,
            modifiers: modifiers(true, false),
            name: "Fib".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![Member::Method(fib_method)],
            enum_constants: vec![],
        }],
    }
}

/// `class Grades` — a `String` `switch`, an array enhanced-`for`, and a
/// `try`/`catch` around integer division.
fn grades() -> CompilationUnit {
    let describe = MethodDecl {
        modifiers: modifiers(true, true),
        type_parameters: vec![],
        return_type: TypeRef::class("java/lang/String"),
        name: "describe".to_string(),
        parameters: vec![param("grade", TypeRef::class("java/lang/String"))],
        throws: vec![],
        body: Some(vec![Stmt::Switch {
            selector: name_expr("grade"),
            cases: vec![
                SwitchCase {
                    labels: vec![Expr::Literal(Literal::String("A".to_string()))],
                    body: vec![Stmt::Return(Some(Expr::Literal(Literal::String(
                        "excellent".to_string(),
                    ))))],
                },
                SwitchCase {
                    labels: vec![Expr::Literal(Literal::String("B".to_string()))],
                    body: vec![Stmt::Return(Some(Expr::Literal(Literal::String(
                        "good".to_string(),
                    ))))],
                },
                SwitchCase {
                    labels: vec![],
                    body: vec![Stmt::Return(Some(Expr::Literal(Literal::String(
                        "unknown".to_string(),
                    ))))],
                },
            ],
        }]),
    };

    let sum_positive = MethodDecl {
        modifiers: modifiers(true, true),
        type_parameters: vec![],
        return_type: int_ty(),
        name: "sumPositive".to_string(),
        parameters: vec![param(
            "values",
            TypeRef::Array {
                element: Box::new(int_ty()),
                dimensions: 1,
            },
        )],
        throws: vec![],
        body: Some(vec![
            Stmt::LocalDecl {
                element_type: int_ty(),
                declarators: vec![Declarator {
                    name: "total".to_string(),
                    extra_dimensions: 0,
                    initializer: Some(int_lit(0)),
                }],
                is_final: false,
            },
            Stmt::ForEach {
                element_type: int_ty(),
                name: "v".to_string(),
                iterable: name_expr("values"),
                body: Box::new(Stmt::If {
                    condition: bin(BinaryOp::Gt, name_expr("v"), int_lit(0)),
                    then_branch: Box::new(Stmt::Expr(Expr::Assign {
                        op: AssignOp::Assign,
                        target: Box::new(name_expr("total")),
                        value: Box::new(bin(BinaryOp::Add, name_expr("total"), name_expr("v"))),
                    })),
                    else_branch: None,
                }),
                label: None,
            },
            Stmt::Return(Some(name_expr("total"))),
        ]),
    };

    let safe_divide = MethodDecl {
        modifiers: modifiers(true, true),
        type_parameters: vec![],
        return_type: int_ty(),
        name: "safeDivide".to_string(),
        parameters: vec![param("a", int_ty()), param("b", int_ty())],
        throws: vec![],
        body: Some(vec![Stmt::Try {
            resources: vec![],
            body: vec![Stmt::Return(Some(bin(BinaryOp::Div, name_expr("a"), name_expr("b"))))],
            catches: vec![CatchClause {
                exception_types: vec!["java/lang/ArithmeticException".to_string()],
                name: "e".to_string(),
                body: vec![Stmt::Return(Some(int_lit(0)))],
            }],
            finally: None,
        }]),
    };

    CompilationUnit {
        package: None,
        imports: vec![],
        types: vec![TypeDecl {
            kind: TypeKind::Class,
            modifiers: modifiers(true, false),
            name: "Grades".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![
                Member::Method(describe),
                Member::Method(sum_positive),
                Member::Method(safe_divide),
            ],
            enum_constants: vec![],
        }],
    }
}
