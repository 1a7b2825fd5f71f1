//! Whole-pipeline scenarios: typed AST through TAC generation, text
//! round-trip, symbol annotation and the MIPS backend.

use compilscript_core::ast::{
    BinaryOperator, Block, ClassDecl, ClassMember, Expr, ExprData, FunctionDecl, Parameter,
    Program, Stmt, StmtData, TypeRef,
};
use compilscript_core::logger::init_logger_debug;
use compilscript_core::mips::MipsGenerator;
use compilscript_core::symbols::{ScopeTree, Symbol};
use compilscript_core::tac::{parse_tac_text, ProgramTacGenerator, SymbolAnnotator};
use log::info;

fn var_decl(name: &str, initializer: Expr) -> Stmt {
    StmtData::VarDecl {
        name: name.to_string(),
        declared_type: None,
        initializer: Some(initializer),
        is_const: false,
    }
    .stmt()
}

fn factorial_program() -> Program {
    let recursive = Expr::call(
        "factorial",
        vec![Expr::binary(
            Expr::typed_var("n", TypeRef::integer()),
            BinaryOperator::Sub,
            Expr::int(1),
        )],
    );
    let body = Block::new(vec![
        StmtData::If {
            condition: Expr::binary(
                Expr::typed_var("n", TypeRef::integer()),
                BinaryOperator::Le,
                Expr::int(1),
            ),
            then_branch: Block::new(vec![StmtData::Return(Some(Expr::int(1))).stmt()]),
            else_branch: None,
        }
        .stmt(),
        StmtData::Return(Some(Expr::binary(
            Expr::typed_var("n", TypeRef::integer()),
            BinaryOperator::Mul,
            recursive,
        )))
        .stmt(),
    ]);
    Program::new(vec![
        StmtData::Function(FunctionDecl {
            name: "factorial".to_string(),
            parameters: vec![Parameter::new("n", TypeRef::integer())],
            return_type: Some(TypeRef::integer()),
            body,
        })
        .stmt(),
        var_decl("result", Expr::call("factorial", vec![Expr::int(5)])),
    ])
}

#[test]
fn factorial_flows_end_to_end() {
    init_logger_debug();
    let mut tac = ProgramTacGenerator::new();
    let code = tac.generate_program(&factorial_program()).unwrap();
    let tac_text = code.join("\n");
    info!("TAC:\n{tac_text}");

    assert!(tac.validate().is_empty(), "{:?}", tac.validate());
    assert!(tac_text.contains("# Recursive call to factorial"));

    let mut mips = MipsGenerator::new();
    let assembly = mips.generate_from_tac_text(&tac_text).unwrap();
    info!("assembly:\n{assembly}");

    assert!(assembly.contains("factorial:"));
    assert!(assembly.contains("jal factorial"));
    assert!(assembly.contains("main:"));
    assert!(assembly.contains("jr $ra"));
}

#[test]
fn generated_tac_survives_a_text_round_trip() {
    init_logger_debug();
    let mut tac = ProgramTacGenerator::new();
    let code = tac.generate_program(&factorial_program()).unwrap();
    let text = code.join("\n");

    let reparsed = parse_tac_text(&text).unwrap();
    assert_eq!(reparsed.len(), tac.instructions().len());
    for (original, parsed) in tac.instructions().iter().zip(&reparsed) {
        assert_eq!(original, parsed, "instruction drifted through text form");
    }
}

#[test]
fn string_program_prints_through_the_runtime() {
    init_logger_debug();
    // var g: string = "hello " + "world"; print(g);
    let program = Program::new(vec![
        var_decl(
            "g",
            Expr::binary(
                Expr::string("hello "),
                BinaryOperator::Add,
                Expr::string("world"),
            ),
        ),
        StmtData::Expression(Expr::call("print", vec![Expr::typed_var("g", TypeRef::string())]))
            .stmt(),
    ]);

    let mut tac = ProgramTacGenerator::new();
    let code = tac.generate_program(&program).unwrap();
    let tac_text = code.join("\n");
    assert!(tac_text.contains("str_concat"));
    assert!(tac_text.contains("call print, 1"));

    let mut mips = MipsGenerator::new();
    let assembly = mips.generate_from_tac_text(&tac_text).unwrap();
    assert!(assembly.contains(".asciiz \"hello \""));
    assert!(assembly.contains(".asciiz \"world\""));
    assert!(assembly.contains("jal string_concat"));
    assert!(assembly.contains("jal print"));
    // the print helper distinguishes strings by their segment address
    assert!(assembly.contains("_data_segment_start"));
}

#[test]
fn class_program_dispatches_methods_lexically() {
    init_logger_debug();
    let point = ClassDecl {
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
            ClassMember::Method(FunctionDecl {
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
            }),
            ClassMember::Method(FunctionDecl {
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
            }),
        ],
    };
    let program = Program::new(vec![
        StmtData::Class(point).stmt(),
        var_decl(
            "p",
            ExprData::New {
                class_name: "Point".to_string(),
                arguments: vec![Expr::int(3), Expr::int(4)],
            }
            .typed(TypeRef::new("Point", 0)),
        ),
        StmtData::Expression(
            ExprData::Call {
                callee: Box::new(Expr::var("print")),
                arguments: vec![ExprData::Call {
                    callee: Box::new(
                        ExprData::Property {
                            object: Box::new(Expr::typed_var("p", TypeRef::new("Point", 0))),
                            property: "sum".to_string(),
                        }
                        .untyped(),
                    ),
                    arguments: vec![],
                }
                .typed(TypeRef::integer())],
            }
            .untyped(),
        )
        .stmt(),
    ]);

    let mut tac = ProgramTacGenerator::new();
    let code = tac.generate_program(&program).unwrap();
    let tac_text = code.join("\n");
    info!("TAC:\n{tac_text}");
    assert!(tac.validate().is_empty(), "{:?}", tac.validate());

    let mut mips = MipsGenerator::new();
    for (class, fields) in tac.class_layouts() {
        mips.register_class(&class, fields);
    }
    let assembly = mips.generate_from_tac_text(&tac_text).unwrap();
    info!("assembly:\n{assembly}");

    assert!(assembly.contains("Point_constructor:"));
    assert!(assembly.contains("Point_sum:"));
    assert!(assembly.contains("jal Point_constructor"));
    assert!(assembly.contains("jal Point_sum"));
    // object allocation uses the registered layout size (metadata + 2 fields)
    assert!(assembly.contains("li $a0, 12"));
    // no vtables anywhere: dispatch is purely by label
    assert!(!assembly.contains("vtable"));
}

#[test]
fn annotated_scopes_serialize_for_the_driver() {
    init_logger_debug();
    let mut tac = ProgramTacGenerator::new();
    tac.generate_program(&factorial_program()).unwrap();

    let mut tree = ScopeTree::new();
    tree.define(
        ScopeTree::GLOBAL,
        Symbol::func("factorial", Some(TypeRef::integer())),
    )
    .unwrap();
    tree.define(ScopeTree::GLOBAL, Symbol::var("result", TypeRef::integer()))
        .unwrap();
    let scope = tree.push_function_scope(ScopeTree::GLOBAL, "factorial");
    tree.define(scope, Symbol::var("n", TypeRef::integer())).unwrap();

    SymbolAnnotator::new(&tac.addresses).annotate_scope_tree(&mut tree);

    let n = tree.lookup(scope, "n").unwrap();
    assert!(n.is_parameter);
    assert_eq!(n.parameter_index, Some(0));
    assert_eq!(n.memory_address.as_deref(), Some("fp+8"));

    let factorial = tree.lookup(ScopeTree::GLOBAL, "factorial").unwrap();
    assert_eq!(factorial.tac_label.as_deref(), Some("factorial"));
    assert!(factorial.frame_size.is_some());

    let json = tree.to_json().unwrap();
    assert!(json.contains("\"factorial\""));
    assert!(json.contains("\"fp+8\""));
}
