//! UDIL interpreter: runs statement trees against a chained symbol table.
//!
//! This crate provides the runtime half of the UDIL language: values, the
//! scope chain, the three-grammar expression evaluator, the interpreter state
//! machine with its program-counter jumps, and the sync subsystem that talks
//! to delegate runtimes.

pub mod delegate;
pub mod error;
pub mod eval;
pub mod flow;
pub mod interpreter;
pub mod symbols;
pub mod sync;
pub mod value;

pub use delegate::{JvmRuntime, JvmUnit, ScriptRuntime, Toolchain};
pub use error::{DelegateError, EvalError, ExecError, ScopeError, SyncError};
pub use eval::{Evaluator, Grammar};
pub use flow::Flow;
pub use interpreter::{Interpreter, Report};
pub use symbols::{Binding, Delete, SymbolTable};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use udil_syntax::ast::TypeTag;

    struct FakeScript {
        outputs: Vec<Value>,
        seen: RefCell<Vec<String>>,
    }

    impl ScriptRuntime for FakeScript {
        fn run(&self, _: &Toolchain, script: &str) -> Result<Vec<Value>, DelegateError> {
            self.seen.borrow_mut().push(script.to_string());
            Ok(self.outputs.clone())
        }
    }

    struct FakeJvm {
        values: Vec<Value>,
        seen: RefCell<Vec<JvmUnit>>,
    }

    impl JvmRuntime for FakeJvm {
        fn run(&self, _: &Toolchain, unit: &JvmUnit) -> Result<Vec<Value>, DelegateError> {
            self.seen.borrow_mut().push(unit.clone());
            Ok(self.values.clone())
        }
    }

    struct Broken;

    impl ScriptRuntime for Broken {
        fn run(&self, _: &Toolchain, _: &str) -> Result<Vec<Value>, DelegateError> {
            Err(DelegateError::Runtime("no script runtime in tests".into()))
        }
    }

    impl JvmRuntime for Broken {
        fn run(&self, _: &Toolchain, _: &JvmUnit) -> Result<Vec<Value>, DelegateError> {
            Err(DelegateError::Compile("no jvm in tests".into()))
        }
    }

    fn interpreter() -> Interpreter {
        Interpreter::with_runtimes(Toolchain::default(), Rc::new(Broken), Rc::new(Broken))
    }

    fn run_with(mut interp: Interpreter, input: &str) -> Interpreter {
        interp.parse_program(input).expect("Parsing should succeed");
        interp.exec_root();
        interp
    }

    fn run_program(input: &str) -> Interpreter {
        run_with(interpreter(), input)
    }

    fn expect_value(interp: &Interpreter, name: &str, expected: Value) {
        match interp.lookup(name) {
            Some(actual) => assert_eq!(actual, &expected, "variable {}", name),
            None => panic!("Expected '{}' to be bound", name),
        }
    }

    fn expect_clean(interp: &Interpreter) {
        let reports: Vec<String> = interp.reports().iter().map(|r| r.to_string()).collect();
        assert!(reports.is_empty(), "unexpected failures: {:#?}", reports);
    }

    #[test]
    fn test_declaration_zero_values() {
        let interp = run_program("int a;\nreal b;\ntext c;\nlist d;\nstatement e;\nchar f;");
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(0));
        expect_value(&interp, "b", Value::Real(0.0));
        expect_value(&interp, "c", Value::Text(String::new()));
        expect_value(&interp, "d", Value::List(vec![]));
        expect_value(&interp, "e", Value::Null);
        assert_eq!(interp.table().lookup("f").map(|b| b.ty), Some(TypeTag::Text));
    }

    #[test]
    fn test_assignment_and_arithmetic() {
        let interp = run_program("int a = 2 + 3 * 4;\na = a + 1;\nreal r = 2.0;\nr = r / 4;\ntext t = \"a\" + \"b\";");
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(15));
        expect_value(&interp, "r", Value::Real(0.5));
        expect_value(&interp, "t", Value::Text("ab".into()));
        assert_eq!(interp.lookup("t").map(|v| v.to_string()), Some("\"ab\"".to_string()));
    }

    #[test]
    fn test_failures_are_reported_and_execution_continues() {
        let interp = run_program("int a = 1;\nint a = 2;\na = 10 / 0;\nb = 20;\nint i = 2.5;\na = a + 1;");
        expect_value(&interp, "a", Value::Int(2));
        assert!(interp.lookup("i").is_none());
        let reports = interp.reports();
        assert_eq!(reports.len(), 4);
        assert!(matches!(reports[0].error, ExecError::Scope(ScopeError::AlreadyDeclared(_))));
        assert!(matches!(reports[1].error, ExecError::Eval(EvalError::DivisionByZero)));
        assert_eq!((reports[2].position, reports[2].text.as_str()), (4, "b = 20;"));
        assert!(matches!(reports[2].error, ExecError::Scope(ScopeError::Undefined(_))));
        assert!(matches!(reports[3].error, ExecError::ValueTypeMismatch { .. }));
    }

    #[test]
    fn test_declaring_void_fails() {
        let interp = run_program("void v;");
        assert!(matches!(
            interp.reports()[0].error,
            ExecError::Scope(ScopeError::VoidBinding(_))
        ));
    }

    #[test]
    fn test_while_loop() {
        let interp = run_program("int a = 10; while (a<20){ a = a+1; }");
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(20));
    }

    #[test]
    fn test_block_scoping() {
        let interp = run_program(
            "int a = 1;\nint x = 1;\nif (a) { int b = 2; a = b; int x = 5; }\nwhile (a < 4) { int w = a; a = w + 1; }\nint c = b;",
        );
        expect_value(&interp, "a", Value::Int(4));
        expect_value(&interp, "x", Value::Int(1));
        assert!(interp.lookup("b").is_none());
        assert!(interp.lookup("w").is_none());
        assert_eq!(interp.reports().len(), 1);
        assert_eq!(interp.table().depth(), 1);
    }

    #[test]
    fn test_if_else() {
        let interp = run_program("int a = 3;\ntext s;\nif (a > 5) { s = \"big\"; } else { s = \"small\"; }");
        expect_clean(&interp);
        expect_value(&interp, "s", Value::Text("small".into()));
    }

    #[test]
    fn test_list_auto_extension() {
        let interp = run_program(
            "list a = [];\nlist b = a;\nb[0] = 100;\nlist c = b;\nc[1][1] = 20;\nlist d = [c[0]];\nlist e = [1];\ne[3] = 9;\nlist m = [];\nm[1][2] = 5;",
        );
        expect_clean(&interp);
        expect_value(&interp, "a", Value::List(vec![]));
        expect_value(&interp, "b", Value::List(vec![Value::Int(100)]));
        expect_value(
            &interp,
            "c",
            Value::List(vec![Value::Int(100), Value::List(vec![Value::Null, Value::Int(20)])]),
        );
        expect_value(&interp, "d", Value::List(vec![Value::Int(100)]));
        expect_value(
            &interp,
            "e",
            Value::List(vec![Value::Int(1), Value::Null, Value::Null, Value::Int(9)]),
        );
        let row = |last| Value::List(vec![Value::Null, Value::Null, last]);
        expect_value(&interp, "m", Value::List(vec![row(Value::Null), row(Value::Int(5))]));
    }

    #[test]
    fn test_indexed_assignment_errors() {
        let interp = run_program("int a = 1;\na[0] = 1;\nlist l = [1];\nl[0][0] = 2;\nl[0][0][0] = 3;");
        let errors: Vec<&ExecError> = interp.reports().iter().map(|r| &r.error).collect();
        assert!(matches!(errors[0], ExecError::NotAList(_)));
        assert!(matches!(errors[1], ExecError::NotAList(_)));
        assert!(matches!(errors[2], ExecError::TooManyIndices(3)));
    }

    #[test]
    fn test_int_is_not_widened_to_real() {
        let interp = run_program("real r;\nr = 2;\nreal s = 2;\nr = 1.5;\nsync(\"context-current\", \"insert\") = [\"q\", \"real\", 3];");
        let errors: Vec<&ExecError> = interp.reports().iter().map(|r| &r.error).collect();
        assert_eq!(errors.len(), 3);
        assert!(matches!(
            errors[0],
            ExecError::ValueTypeMismatch { expected: TypeTag::Real, .. }
        ));
        assert!(matches!(errors[1], ExecError::ValueTypeMismatch { .. }));
        assert!(matches!(errors[2], ExecError::Sync(SyncError::BadArgument(_))));
        expect_value(&interp, "r", Value::Real(1.5));
        assert!(interp.lookup("s").is_none());
        assert!(interp.lookup("q").is_none());
    }

    #[test]
    fn test_indexed_store_growth_is_bounded() {
        let interp = run_program(
            "list l;\nl[4611686018427387904] = 1;\nl[0-1] = 1;\nl[2][1048576] = 1;\nl[1048575][1048575] = 1;\nl[1] = 5;",
        );
        let errors: Vec<&ExecError> = interp.reports().iter().map(|r| &r.error).collect();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], ExecError::IndexTooLarge { .. }));
        assert!(matches!(errors[1], ExecError::Eval(EvalError::BadIndex(_))));
        assert!(matches!(errors[2], ExecError::IndexTooLarge { .. }));
        assert!(matches!(errors[3], ExecError::IndexTooLarge { .. }));
        expect_value(&interp, "l", Value::List(vec![Value::Null, Value::Int(5)]));
    }

    #[test]
    fn test_parse_only_statements_are_reported() {
        let interp = run_program(
            "for (i = 0; i < 3; i = i + 1) { }\nint f(int x) { return x; }\nreturn;\n1 + 1;",
        );
        let errors: Vec<&ExecError> = interp.reports().iter().map(|r| &r.error).collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| matches!(e, ExecError::NotExecutable(_))));
    }

    #[test]
    fn test_blocks_are_values() {
        let interp = run_program("p{\nint q = 5;\n}\nint x = p[0] + 1;\n{ int hidden = 1; }");
        expect_clean(&interp);
        expect_value(&interp, "x", Value::Int(6));
        assert!(matches!(interp.lookup("p"), Some(Value::Block(_))));
        assert!(interp.lookup("hidden").is_none());
    }

    #[test]
    fn test_pc_jump_resumes_at_target() {
        let src = "int a = 0;\nint b = 0;\nb = b + 1;\na = a + 1;\na = a + 0;\nif (b < 3) { sync(\"udil\", \"pc_counter\") = 2; sync(\"udil\", \"restart\") = 1; }\na = a + 100;\na = a + 0;\na = a + 0;\na = a + 0;";
        let interp = run_program(src);
        expect_clean(&interp);
        expect_value(&interp, "b", Value::Int(3));
        expect_value(&interp, "a", Value::Int(103));
        assert_eq!(interp.pc_counter(), 10);
    }

    #[test]
    fn test_pc_counter_demo_program() {
        let interp = run_program(
            "int a = 0;\nint b = 0;\nb = b+1;\nif (b<5){\nsync(\"udil\", \"pc_counter\") = 2;\nsync(\"udil\", \"restart\") = 1;\n}\nint pc = sync(\"udil\", \"pc_counter\");",
        );
        expect_clean(&interp);
        expect_value(&interp, "b", Value::Int(5));
        expect_value(&interp, "pc", Value::Int(4));
    }

    #[test]
    fn test_pc_counter_write_moves_the_counter() {
        let interp = run_program(
            "int a = 0;\nsync(\"udil\", \"pc_counter\") = 3;\na = a + 1;\na = a + 1;\na = a + 10;",
        );
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(10));
        assert_eq!(interp.pc_counter(), 5);

        let interp = run_program(
            "int a = 0;\nif (1) { sync(\"udil\", \"pc_counter\") = 3; }\na = a + 1;\na = a + 1;\na = a + 10;",
        );
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(10));
    }

    #[test]
    fn test_restart_zero_does_nothing() {
        let interp = run_program("int a = 0;\nsync(\"udil\", \"restart\") = 0;\na = a + 1;");
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(1));
        assert_eq!(interp.pc_counter(), 3);
    }

    #[test]
    fn test_halt_and_resume_from_block() {
        let mut interp = interpreter();
        interp.set_resume_from_block(true);
        interp
            .parse_program("int a = 1;\nsync(\"udil\", \"halt\") = 1;\na = 2;")
            .unwrap();
        assert!(interp.exec_root());
        expect_value(&interp, "a", Value::Int(1));
        assert_eq!(interp.root().as_block().map(|b| b.exec_counter.get()), Some(2));
        assert!(interp.exec_root());
        expect_value(&interp, "a", Value::Int(2));
    }

    #[test]
    fn test_root_replacement() {
        let interp = run_program(
            "other{\nint z = 9;\n}\nif (1) { sync(\"udil\", \"root\") = other; sync(\"udil\", \"pc_counter\") = 0; sync(\"udil\", \"restart\") = 1; }",
        );
        expect_clean(&interp);
        expect_value(&interp, "z", Value::Int(9));
        assert!(interp.root().to_string().starts_with("other{"));
    }

    #[test]
    fn test_canonical_text_round_trip() {
        let interp = run_program("program{\nif (a < 2) { a = a + 1; } else { }\nwhile (x) { sync(\"context-in\", \"a\") = [1, \"b\"]; }\n}");
        let Some(Value::Block(block)) = interp.lookup("program") else {
            panic!("Expected program block");
        };
        let text = block.to_string();
        let reparsed = udil_parser::parse_source(&text).expect("rendering parses");
        assert_eq!(reparsed.statements[0].to_string(), text);
    }

    #[test]
    fn test_text_statement_bridge() {
        let interp = run_program(
            "program{\na = a+1;\n}\ntext b = \"c = c+1;\";\nsync(\"udil\", \"text\") = b;\nstatement d = sync(\"udil\", \"temp\");\nstatement temp = program[0];\nsync(\"udil\", \"statement\") = temp;\ntext e = sync(\"udil\", \"temp\");",
        );
        expect_clean(&interp);
        match interp.lookup("d") {
            Some(Value::Block(stmt)) => assert_eq!(stmt.to_string(), "c = c+1;"),
            other => panic!("Expected statement, got {:?}", other),
        }
        expect_value(&interp, "e", Value::Text("a = a+1;".into()));
    }

    #[test]
    fn test_udil_delegate() {
        let interp = run_program(
            "program{\na = 100;\nint extra = a * 2;\n}\nint b = 50;\nsync(\"context-in\", \"a\") = b;\nsync(\"context-out\", \"a\") = 0;\nsync(\"program\", \"udil\") = program;\nb = sync(\"context-out\", \"a\");",
        );
        expect_clean(&interp);
        expect_value(&interp, "b", Value::Int(100));
        assert!(interp.lookup("extra").is_none());
        assert_eq!(interp.context_out(), &[("a".to_string(), Value::Int(100))]);
    }

    #[test]
    fn test_udil_delegate_failures_surface() {
        let interp = run_program(
            "program{\nmissing = 1;\n}\nsync(\"context-out\", \"gone\") = 0;\nsync(\"program\", \"udil\") = program;\nsync(\"program\", \"udil\") = 5;",
        );
        let errors: Vec<&ExecError> = interp.reports().iter().map(|r| &r.error).collect();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ExecError::Scope(ScopeError::Undefined(_))));
        assert!(matches!(
            errors[1],
            ExecError::Sync(SyncError::Scope(ScopeError::Undefined(_)))
        ));
        assert!(matches!(errors[2], ExecError::Sync(SyncError::ExpectedBlock(_))));
    }

    #[test]
    fn test_udil_delegate_copies_nothing_when_an_output_is_missing() {
        let interp = run_program(
            "program{\nint a = 5;\n}\nsync(\"context-out\", \"a\") = 0;\nsync(\"context-out\", \"gone\") = 0;\nsync(\"program\", \"udil\") = program;",
        );
        assert_eq!(interp.reports().len(), 1);
        assert_eq!(
            interp.context_out(),
            &[
                ("a".to_string(), Value::Int(0)),
                ("gone".to_string(), Value::Int(0)),
            ]
        );
    }

    #[test]
    fn test_script_delegate() {
        let script = Rc::new(FakeScript {
            outputs: vec![Value::Int(10086)],
            seen: RefCell::new(Vec::new()),
        });
        let interp = Interpreter::with_runtimes(Toolchain::default(), script.clone(), Rc::new(Broken));
        let interp = run_with(
            interp,
            "int x = 10010;\nsync(\"context-in\", \"a\") = x;\nsync(\"context-out\", \"b\") = 0;\ntext pythonProgram = \"\nb = a + 76\n\";\nsync(\"program\", \"python\") = pythonProgram;\nint y = sync(\"context-out\", \"b\");",
        );
        expect_clean(&interp);
        expect_value(&interp, "y", Value::Int(10086));
        let seen = script.seen.borrow();
        assert!(seen[0].starts_with("a = 10010\n\nb = a + 76\n"));
        assert!(seen[0].contains("__udil_out.append(b)"));
    }

    #[test]
    fn test_jvm_delegate() {
        let jvm = Rc::new(FakeJvm {
            values: vec![Value::Int(2306)],
            seen: RefCell::new(Vec::new()),
        });
        let interp = Interpreter::with_runtimes(Toolchain::default(), Rc::new(Broken), jvm.clone());
        let interp = run_with(
            interp,
            "int a = 23;\nsync(\"context-in\", \"input\") = a;\nsync(\"context-out\", \"output\") = \"int\";\ntext javaProgram = \"\npublic class HelloWorld {\n    static int output = 0;\n    public static void main(String[] args) {\n        output = 2306;\n    }\n}\n\";\nsync(\"program\", \"java\") = javaProgram;\nint out = sync(\"context-out\", \"output\");",
        );
        expect_clean(&interp);
        expect_value(&interp, "out", Value::Int(2306));
        let seen = jvm.seen.borrow();
        assert_eq!(seen[0].class_name, "HelloWorld");
        assert!(seen[0].source.contains("static int input = 23;"));
    }

    #[test]
    fn test_failed_delegate_keeps_context_out() {
        let interp = run_program(
            "sync(\"context-out\", \"b\") = 7;\nsync(\"program\", \"python\") = \"b = 1\";\nint b = sync(\"context-out\", \"b\");",
        );
        assert_eq!(interp.reports().len(), 1);
        assert!(matches!(
            interp.reports()[0].error,
            ExecError::Sync(SyncError::Delegate(DelegateError::Runtime(_)))
        ));
        expect_value(&interp, "b", Value::Int(7));
    }

    #[test]
    fn test_context_lists() {
        let interp = run_program(
            "sync(\"context-in\", \"a\") = 1;\nsync(\"context-in\", \"a\") = 1;\nsync(\"context-in\", \"a\") = 2;\nsync(\"context-out\", \"r\") = \"real\";\nsync(\"context-out-clear\", \"x\") = 0;",
        );
        expect_clean(&interp);
        assert_eq!(
            interp.context_in(),
            &[
                ("a".to_string(), Value::Int(1)),
                ("a".to_string(), Value::Int(2)),
            ]
        );
        assert!(interp.context_out().is_empty());
    }

    #[test]
    fn test_context_current() {
        let interp = run_program(
            "int a = 1;\nsync(\"context-current\", \"insert\") = [\"z\", \"int\", 5];\nint has = sync(\"context-current\", \"z\");\nint none = sync(\"context-current\", \"q\");\nsync(\"context-current\", \"update\") = [\"a\", \"int\", 7];\nsync(\"context-current\", \"delete\") = \"z\";",
        );
        expect_clean(&interp);
        expect_value(&interp, "has", Value::Int(1));
        expect_value(&interp, "none", Value::Int(0));
        expect_value(&interp, "a", Value::Int(7));
        assert!(interp.lookup("z").is_none());

        let interp = run_program("int a = 1;\nsync(\"context-current\", \"delete\") = 0;");
        expect_clean(&interp);
        assert!(interp.lookup("a").is_none());
    }

    #[test]
    fn test_statement_channel_runs_in_current_scope() {
        let interp = run_program("p{\na = a + 5;\n}\nint a = 1;\nsync(\"statement\", \"current\") = p[0];");
        expect_clean(&interp);
        expect_value(&interp, "a", Value::Int(6));
    }

    #[test]
    fn test_sync_errors() {
        let interp = run_program(
            "sync(\"nope\", \"x\") = 1;\nsync(\"udil\", \"nope\") = 1;\nint v = sync(\"context-out\", \"missing\");\nsync(\"java\", \"javac\") = \"/opt/jdk/bin/javac\";",
        );
        let errors: Vec<&ExecError> = interp.reports().iter().map(|r| &r.error).collect();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], ExecError::Sync(SyncError::UnknownChannel(_))));
        assert!(matches!(errors[1], ExecError::Sync(SyncError::UnknownKey { .. })));
        assert!(matches!(errors[2], ExecError::Sync(SyncError::MissingContextOut(_))));
        assert_eq!(interp.toolchain().javac, "/opt/jdk/bin/javac");
    }

    #[test]
    fn test_reset() {
        let mut interp = run_program("int a = 1;\nb = 2;\nsync(\"context-in\", \"a\") = a;");
        interp.reset();
        assert!(interp.lookup("a").is_none());
        assert!(interp.reports().is_empty());
        assert!(interp.context_in().is_empty());
        assert!(interp.root().as_block().map_or(false, |b| b.is_empty()));
    }
}
