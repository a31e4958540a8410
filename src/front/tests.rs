use crate::front::ast::{BinOp, Expr, Stmt};
use crate::front::lex::{Lexer, TokenKind};
use crate::front::lower::lower_program;
use crate::front::parse::{parse, Parser};
use crate::ir::instr::Opcode;

#[test]
fn lexer_tokenizes_keywords_and_operators() {
    let tokens = Lexer::new(crate::common::id("t"), "if (x <= 2) { y = 1; }").tokenize().unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::KwIf,
            TokenKind::LParen,
            TokenKind::Ident,
            TokenKind::Le,
            TokenKind::IntLit,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Ident,
            TokenKind::Assign,
            TokenKind::IntLit,
            TokenKind::Semi,
            TokenKind::RBrace,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn parser_builds_a_while_loop_with_a_relational_condition() {
    let tokens = Lexer::new(crate::common::id("t"), "while (n < 10) { n = n + 1; }").tokenize().unwrap();
    let mut parser = Parser::new(&tokens);
    let program = parser.parse_program().unwrap();
    assert_eq!(program.stmts.len(), 1);
    match &program.stmts[0] {
        Stmt::While { cond, body } => {
            assert!(matches!(cond, Expr::Bin(BinOp::Lt, _, _)));
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected a while loop, got {other:?}"),
    }
}

#[test]
fn parser_rejects_a_missing_semicolon() {
    let tokens = Lexer::new(crate::common::id("t"), "x = 1").tokenize().unwrap();
    let mut parser = Parser::new(&tokens);
    assert!(parser.parse_program().is_err());
}

#[test]
fn lowering_an_if_else_produces_four_blocks_with_matching_edges() {
    let program = parse("t", "if (x < 1) { y = 1; } else { y = 2; }").unwrap();
    let module = lower_program(&program, "t");
    let proc = &module.procedures[0];
    // cond, then, else, merge
    assert_eq!(proc.blocks.len(), 4);
    assert!(proc.blocks[0].is_conditional(), "cond block");
    assert!(proc.blocks[1].is_unconditional_jump(), "then block");
    assert!(proc.blocks[2].is_exit(), "merge block ends the procedure");
    assert!(proc.blocks[3].is_unconditional_jump(), "else block");
}

#[test]
fn lowering_print_emits_a_host_call_then_a_trailing_return() {
    let program = parse("t", "print 42;").unwrap();
    let module = lower_program(&program, "t");
    let proc = &module.procedures[0];
    let codes: Vec<Opcode> = proc.blocks[0].instructions.iter().map(|i| i.code).collect();
    assert_eq!(codes, vec![Opcode::HostCall, Opcode::Return]);
}

#[test]
fn lowering_infers_float_type_from_any_float_literal_assigned() {
    let program = parse("t", "x = 1; x = 2.5;").unwrap();
    let module = lower_program(&program, "t");
    assert_eq!(module.global_vars.len(), 1);
    assert_eq!(module.global_vars[0].ty, crate::ir::types::IrType::Float);
}
