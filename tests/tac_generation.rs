use compilscript_core::ast::{
    Block, ClassDecl, ClassMember, Expr, ExprData, FunctionDecl, Parameter, Program, Stmt,
    StmtData, SwitchCase, TypeRef,
};
use compilscript_core::ast::BinaryOperator;
use compilscript_core::logger::init_logger_debug;
use compilscript_core::tac::{ProgramTacGenerator, TacError};
use log::info;

fn generate(statements: Vec<Stmt>) -> (ProgramTacGenerator, Vec<String>) {
    let mut generator = ProgramTacGenerator::new();
    let code = generator
        .generate_program(&Program::new(statements))
        .unwrap_or_else(|err| panic!("TAC generation failed: {err}"));
    info!("TAC:\n{}", code.join("\n"));
    (generator, code)
}

fn var_decl(name: &str, initializer: Expr) -> Stmt {
    StmtData::VarDecl {
        name: name.to_string(),
        declared_type: None,
        initializer: Some(initializer),
        is_const: false,
    }
    .stmt()
}

fn int_function(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    StmtData::Function(FunctionDecl {
        name: name.to_string(),
        parameters: params
            .iter()
            .map(|p| Parameter::new(*p, TypeRef::integer()))
            .collect(),
        return_type: Some(TypeRef::integer()),
        body: Block::new(body),
    })
    .stmt()
}

#[test]
fn arithmetic_expression_lowers_to_temporaries() {
    init_logger_debug();
    // var r = (1 + 2) * 3;
    let sum = Expr::binary(Expr::int(1), BinaryOperator::Add, Expr::int(2));
    let product = Expr::binary(sum, BinaryOperator::Mul, Expr::int(3));
    let (_, code) = generate(vec![var_decl("r", product)]);

    assert_eq!(code, vec!["t1 = 1 + 2", "t2 = t1 * 3", "r = t2"]);
}

#[test]
fn short_circuit_and_only_evaluates_rhs_when_lhs_holds() {
    init_logger_debug();
    let condition = Expr::binary(
        Expr::typed_var("a", TypeRef::boolean()),
        BinaryOperator::And,
        Expr::typed_var("b", TypeRef::boolean()),
    );
    let (_, code) = generate(vec![var_decl("x", condition)]);
    let text = code.join("\n");

    // The conditional jump on `a` must come before any read of `b`.
    let jump = text.find("if a == 0 goto").expect("guard jump on a");
    let rhs = text.find("= b").expect("rhs assignment");
    assert!(jump < rhs, "lhs test must precede rhs evaluation:\n{text}");
    assert!(text.contains("goto bool_end"));
}

#[test]
fn ternary_lowers_like_a_conditional() {
    init_logger_debug();
    let ternary = ExprData::Ternary {
        condition: Box::new(Expr::typed_var("c", TypeRef::boolean())),
        if_true: Box::new(Expr::int(1)),
        if_false: Box::new(Expr::int(2)),
    }
    .untyped();
    let (_, code) = generate(vec![var_decl("x", ternary)]);
    let text = code.join("\n");
    assert!(text.contains("goto ternary_false"));
    assert!(text.contains("ternary_end"));
}

#[test]
fn string_concatenation_uses_the_pseudo_op() {
    init_logger_debug();
    let concat = Expr::binary(
        Expr::string("hello "),
        BinaryOperator::Add,
        Expr::string("world"),
    );
    let (_, code) = generate(vec![var_decl("g", concat)]);
    let text = code.join("\n");
    assert!(text.contains("t1 = \"hello \" str_concat \"world\""), "{text}");
}

#[test]
fn string_operands_reject_non_concat_operators() {
    init_logger_debug();
    let bad = Expr::binary(Expr::string("a"), BinaryOperator::Sub, Expr::string("b"));
    let mut generator = ProgramTacGenerator::new();
    let error = generator
        .generate_program(&Program::new(vec![var_decl("x", bad)]))
        .unwrap_err();
    assert!(matches!(error, TacError::StringOperand { .. }));
}

#[test]
fn integer_operands_promote_to_float() {
    init_logger_debug();
    let mixed = Expr::binary(
        Expr::typed_var("i", TypeRef::integer()),
        BinaryOperator::Add,
        Expr::typed_var("f", TypeRef::float()),
    );
    let (_, code) = generate(vec![var_decl("x", mixed)]);
    let text = code.join("\n");
    assert!(text.contains("int_to_float i"), "{text}");
}

#[test]
fn while_loop_shape_and_break_target() {
    init_logger_debug();
    let body = Block::new(vec![StmtData::Break.stmt()]);
    let stmt = StmtData::While {
        condition: Expr::typed_var("c", TypeRef::boolean()),
        body,
    }
    .stmt();
    let (_, code) = generate(vec![stmt]);
    let text = code.join("\n");

    assert!(text.contains("while_start1:"));
    assert!(text.contains("if c == 0 goto while_end2"));
    // break jumps straight to the loop end
    assert!(text.contains("goto while_end2"));
    assert!(text.contains("goto while_start1"));
}

#[test]
fn foreach_iterates_by_index_and_length() {
    init_logger_debug();
    let stmt = StmtData::Foreach {
        var_name: "item".to_string(),
        iterable: Expr::typed_var("xs", TypeRef::new("integer", 1)),
        body: Block::default(),
    }
    .stmt();
    let (_, code) = generate(vec![stmt]);
    let text = code.join("\n");

    assert!(text.contains("t2 = len xs"), "{text}");
    assert!(text.contains("if t1 >= t2 goto foreach_end"), "{text}");
    assert!(text.contains("t3 = xs[t1]"));
    assert!(text.contains("item = t3"));
    assert!(text.contains("t1 = t1 + 1"));
}

#[test]
fn switch_cases_fall_through_and_break_targets_end() {
    init_logger_debug();
    let stmt = StmtData::Switch {
        expression: Expr::typed_var("x", TypeRef::integer()),
        cases: vec![
            SwitchCase {
                expression: Expr::int(1),
                statements: vec![var_decl("y", Expr::int(10))],
            },
            SwitchCase {
                expression: Expr::int(2),
                statements: vec![StmtData::Break.stmt()],
            },
        ],
        default: Some(vec![var_decl("y", Expr::int(0))]),
    }
    .stmt();
    let (_, code) = generate(vec![stmt]);
    let text = code.join("\n");

    assert!(text.contains("if x == 1 goto case"));
    assert!(text.contains("if x == 2 goto case"));
    assert!(text.contains("goto switch_default"));
    // break inside case 2 targets the switch end
    assert!(text.contains("goto switch_end1"));
    // case 1 has no break: no jump between its body and the next case label
    let case1_body = text.find("y = 10").unwrap();
    let next = &text[case1_body..];
    let next_label = next.find("case").unwrap();
    assert!(!next[..next_label].contains("goto switch_end"), "{text}");
}

#[test]
fn break_outside_loop_is_rejected() {
    init_logger_debug();
    let mut generator = ProgramTacGenerator::new();
    let error = generator
        .generate_program(&Program::new(vec![StmtData::Break.stmt()]))
        .unwrap_err();
    assert!(matches!(error, TacError::BreakOutsideLoop { .. }));
}

#[test]
fn functions_get_labels_frames_and_implicit_returns() {
    init_logger_debug();
    let body = vec![var_decl("x", Expr::int(1))];
    let (generator, code) = generate(vec![int_function("compute", &["n"], body)]);
    let text = code.join("\n");

    assert!(text.contains("BeginFunc compute, 1"), "{text}");
    assert!(text.contains("params=[n]"));
    assert!(text.contains("compute:"));
    // non-void function without a trailing return gets the typed default
    assert!(text.contains("return 0"));
    assert!(text.contains("EndFunc compute"));
    // the frame size was patched back into BeginFunc after lowering
    assert!(text.contains("frame_size="), "{text}");
    assert!(generator.addresses.completed_frame("compute").is_some());
}

#[test]
fn recursive_calls_resolve_through_the_pre_pass() {
    init_logger_debug();
    // func factorial(n) { return n * factorial(n - 1); } factorial(5);
    let recursive_call = Expr::call(
        "factorial",
        vec![Expr::binary(
            Expr::typed_var("n", TypeRef::integer()),
            BinaryOperator::Sub,
            Expr::int(1),
        )],
    );
    let body = vec![StmtData::Return(Some(Expr::binary(
        Expr::typed_var("n", TypeRef::integer()),
        BinaryOperator::Mul,
        recursive_call,
    )))
    .stmt()];
    let program = vec![
        int_function("factorial", &["n"], body),
        StmtData::Expression(Expr::call("factorial", vec![Expr::int(5)])).stmt(),
    ];
    let (generator, code) = generate(program);
    let text = code.join("\n");

    assert!(text.contains("# Recursive call to factorial"));
    assert!(text.contains("call factorial, 1"));
    assert!(generator.validate().is_empty(), "{:?}", generator.validate());
}

#[test]
fn call_arity_mismatches_are_errors() {
    init_logger_debug();
    let program = vec![
        int_function("pair", &["a", "b"], vec![]),
        StmtData::Expression(Expr::call("pair", vec![Expr::int(1)])).stmt(),
    ];
    let mut generator = ProgramTacGenerator::new();
    let error = generator
        .generate_program(&Program::new(program))
        .unwrap_err();
    assert!(matches!(
        error,
        TacError::ArityMismatch {
            expected: 2,
            got: 1,
            ..
        }
    ));
}

#[test]
fn unknown_callees_are_errors() {
    init_logger_debug();
    let call = StmtData::Expression(Expr::call("missing", vec![])).stmt();
    let mut generator = ProgramTacGenerator::new();
    let error = generator
        .generate_program(&Program::new(vec![call]))
        .unwrap_err();
    assert!(matches!(error, TacError::UndeclaredFunction { .. }));
}

#[test]
fn builtin_arity_is_checked() {
    init_logger_debug();
    let call = StmtData::Expression(Expr::call("print", vec![])).stmt();
    let mut generator = ProgramTacGenerator::new();
    let error = generator
        .generate_program(&Program::new(vec![call]))
        .unwrap_err();
    assert!(matches!(error, TacError::ArityMismatch { .. }));
}

fn point_class() -> Stmt {
    let constructor = FunctionDecl {
        name: "constructor".to_string(),
        parameters: vec![
            Parameter::new("a", TypeRef::integer()),
            Parameter::new("b", TypeRef::integer()),
        ],
        return_type: None,
        body: Block::new(vec![
            StmtData::Assignment {
                target: ExprData::Property {
                    object: Box::new(ExprData::This.untyped()),
                    property: "x".to_string(),
                }
                .untyped(),
                value: Expr::typed_var("a", TypeRef::integer()),
            }
            .stmt(),
            StmtData::Assignment {
                target: ExprData::Property {
                    object: Box::new(ExprData::This.untyped()),
                    property: "y".to_string(),
                }
                .untyped(),
                value: Expr::typed_var("b", TypeRef::integer()),
            }
            .stmt(),
        ]),
    };
    let sum = FunctionDecl {
        name: "sum".to_string(),
        parameters: vec![],
        return_type: Some(TypeRef::integer()),
        body: Block::new(vec![StmtData::Return(Some(Expr::binary(
            ExprData::Property {
                object: Box::new(ExprData::This.typed(TypeRef::new("Point", 0))),
                property: "x".to_string(),
            }
            .typed(TypeRef::integer()),
            BinaryOperator::Add,
            ExprData::Property {
                object: Box::new(ExprData::This.typed(TypeRef::new("Point", 0))),
                property: "y".to_string(),
            }
            .typed(TypeRef::integer()),
        )))
        .stmt()]),
    };
    StmtData::Class(ClassDecl {
        name: "Point".to_string(),
        superclass: None,
        members: vec![
            ClassMember::Field {
                name: "x".to_string(),
                type_ref: Some(TypeRef::integer()),
            },
            ClassMember::Field {
                name: "y".to_string(),
                type_ref: Some(TypeRef::integer()),
            },
            ClassMember::Method(constructor),
            ClassMember::Method(sum),
        ],
    })
    .stmt()
}

#[test]
fn classes_lower_to_qualified_functions_with_this() {
    init_logger_debug();
    let new_point = ExprData::New {
        class_name: "Point".to_string(),
        arguments: vec![Expr::int(3), Expr::int(4)],
    }
    .typed(TypeRef::new("Point", 0));
    let method_call = ExprData::Call {
        callee: Box::new(
            ExprData::Property {
                object: Box::new(Expr::typed_var("p", TypeRef::new("Point", 0))),
                property: "sum".to_string(),
            }
            .untyped(),
        ),
        arguments: vec![],
    }
    .typed(TypeRef::integer());
    let program = vec![
        point_class(),
        var_decl("p", new_point),
        var_decl("s", method_call),
    ];
    let (generator, code) = generate(program);
    let text = code.join("\n");

    assert!(text.contains("BeginFunc Point_constructor, 3, "), "{text}");
    assert!(text.contains("BeginFunc Point_sum, 1, "));
    // constructor returns the instance implicitly
    assert!(text.contains("return this"));
    // new: allocate, push instance as `this`, call, pop
    assert!(text.contains("= new Point"));
    assert!(text.contains("call Point_constructor, 3"));
    assert!(text.contains("PopParams 3"));
    // method call dispatches lexically with `this` first
    assert!(text.contains("call Point_sum, 1"));
    assert_eq!(
        generator.class_layouts(),
        vec![("Point".to_string(), vec!["x".to_string(), "y".to_string()])]
    );
}

#[test]
fn default_constructors_are_synthesized() {
    init_logger_debug();
    let class = StmtData::Class(ClassDecl {
        name: "Empty".to_string(),
        superclass: None,
        members: vec![],
    })
    .stmt();
    let (_, code) = generate(vec![class]);
    let text = code.join("\n");
    assert!(text.contains("BeginFunc Empty_constructor, 1"));
    assert!(text.contains("return this"));
}

#[test]
fn validation_reports_dangling_pieces() {
    init_logger_debug();
    let (mut generator, _) = generate(vec![var_decl("x", Expr::int(1))]);
    assert!(generator.validate().is_empty());

    // Inject an unresolved jump through the public label API.
    let label = generator
        .labels
        .new_label(&mut generator.addresses, "broken", None);
    generator.labels.reference_label(&label);
    let warnings = generator.validate();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("broken"));
}

#[test]
fn statistics_and_comment_dedup() {
    init_logger_debug();
    let (mut generator, code) = generate(vec![var_decl("x", Expr::int(1))]);
    let stats = generator.statistics();
    assert_eq!(stats.instructions_generated, code.len());

    let before = generator.instructions().len();
    let removed = generator.optimize();
    assert_eq!(generator.instructions().len() + removed, before);
}

#[test]
fn do_while_tests_the_condition_after_the_body() {
    init_logger_debug();
    let stmt = StmtData::DoWhile {
        body: Block::new(vec![var_decl("x", Expr::int(1))]),
        condition: Expr::typed_var("c", TypeRef::boolean()),
    }
    .stmt();
    let (_, code) = generate(vec![stmt]);
    let text = code.join("\n");

    let body = text.find("x = 1").unwrap();
    let test = text.find("if c != 0 goto do_start").unwrap();
    assert!(body < test, "body must run before the condition:\n{text}");
    assert!(text.contains("do_cond"));
    assert!(text.contains("do_end"));
}

#[test]
fn for_loop_continue_targets_the_update_label() {
    init_logger_debug();
    let body = Block::new(vec![StmtData::Continue.stmt()]);
    let stmt = StmtData::For {
        init: Some(Box::new(var_decl("i", Expr::int(0)))),
        condition: Some(Expr::binary(
            Expr::typed_var("i", TypeRef::integer()),
            BinaryOperator::Lt,
            Expr::int(10),
        )),
        update: Some(Box::new(
            StmtData::Assignment {
                target: Expr::var("i"),
                value: Expr::binary(
                    Expr::typed_var("i", TypeRef::integer()),
                    BinaryOperator::Add,
                    Expr::int(1),
                ),
            }
            .stmt(),
        )),
        body,
    }
    .stmt();
    let (_, code) = generate(vec![stmt]);
    let text = code.join("\n");

    assert!(text.contains("for_cond1:"));
    assert!(text.contains("goto for_update2"), "continue -> update:\n{text}");
    assert!(text.contains("for_update2:"));
    assert!(text.contains("goto for_cond1"));
    assert!(text.contains("for_end3:"));
}

#[test]
fn if_with_exiting_then_branch_elides_the_end_jump() {
    init_logger_debug();
    let then_branch = Block::new(vec![StmtData::Return(Some(Expr::int(1))).stmt()]);
    let else_branch = Block::new(vec![StmtData::Return(Some(Expr::int(2))).stmt()]);
    let body = vec![StmtData::If {
        condition: Expr::typed_var("c", TypeRef::boolean()),
        then_branch,
        else_branch: Some(else_branch),
    }
    .stmt()];
    let (_, code) = generate(vec![int_function("pick", &["c"], body)]);
    let text = code.join("\n");

    // the then branch returns, so no goto over the else branch is needed
    assert!(!text.contains("goto if_end"), "{text}");
    assert!(text.contains("if_false"));
}
