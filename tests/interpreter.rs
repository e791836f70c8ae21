#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use loxrs::ast::Stmt;
    use loxrs::error::LoxError;
    use loxrs::interpreter::Interpreter;
    use loxrs::parser::Parser;
    use loxrs::resolver::{ResolutionMap, Resolver};
    use loxrs::scanner::Scanner;
    use loxrs::token::Token;

    /// Clonable in-memory sink so a test can hand the interpreter an owned
    /// writer and still read what was printed afterwards.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).expect("valid utf-8 output")
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn tokens_of(source: &str) -> Vec<Token<'_>> {
        Scanner::new(source.as_bytes())
            .collect::<Result<_, _>>()
            .expect("source lexes")
    }

    fn run_statements(statements: &[Stmt<'_>], locals: ResolutionMap) -> Result<String, LoxError> {
        let buffer = SharedBuffer::default();

        Interpreter::with_output(Box::new(buffer.clone())).interpret(statements, locals)?;

        Ok(buffer.contents())
    }

    /// Run a full program and return everything it printed. Static failures
    /// panic (the test expects a valid program); runtime errors propagate.
    fn run(source: &str) -> Result<String, LoxError> {
        let tokens = tokens_of(source);
        let statements = Parser::new(&tokens).parse().expect("source parses");
        let locals = Resolver::new().resolve(&statements).expect("source resolves");

        run_statements(&statements, locals)
    }

    fn run_ok(source: &str) -> String {
        run(source).expect("program runs without error")
    }

    fn assert_runtime_error(source: &str, expected: &str) {
        match run(source) {
            Err(LoxError::Runtime { message, .. }) => assert_eq!(message, expected),
            Err(other) => panic!("expected runtime error, got {:?}", other),
            Ok(output) => panic!("expected runtime error, program printed {:?}", output),
        }
    }

    // ───────────────────── expressions and printing ────────────────────

    #[test]
    fn test_arithmetic_prints_integral_numbers_bare() {
        assert_eq!(run_ok("print 1 + 2;"), "3\n");
        assert_eq!(run_ok("print 10 / 4;"), "2.5\n");
        assert_eq!(run_ok("print -(3 * 2);"), "-6\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok("print \"a\" + \"b\";"), "ab\n");
    }

    #[test]
    fn test_division_by_zero_follows_ieee() {
        assert_eq!(run_ok("print 1 / 0;"), "inf\n");
        assert_eq!(run_ok("print -1 / 0;"), "-inf\n");
        assert_eq!(run_ok("print 0 / 0;"), "NaN\n");
    }

    #[test]
    fn test_plus_with_mixed_operands() {
        assert_runtime_error(
            "print 1 + \"a\";",
            "Operands must be two numbers or two strings.",
        );
    }

    #[test]
    fn test_comparison_requires_numbers() {
        assert_runtime_error("print 1 > \"a\";", "Operands must be numbers.");
    }

    #[test]
    fn test_unary_minus_requires_number() {
        assert_runtime_error("print -\"a\";", "Operand must be a number.");
    }

    #[test]
    fn test_equality_rules() {
        assert_eq!(run_ok("print 1 == 1;"), "true\n");
        assert_eq!(run_ok("print \"a\" == \"a\";"), "true\n");
        assert_eq!(run_ok("print nil == nil;"), "true\n");
        assert_eq!(run_ok("print 1 == \"1\";"), "false\n");
        assert_eq!(run_ok("print 0 == false;"), "false\n");
    }

    #[test]
    fn test_truthiness() {
        // Only nil and false are falsy.
        assert_eq!(run_ok("if (0) print \"yes\"; else print \"no\";"), "yes\n");
        assert_eq!(
            run_ok("if (\"\") print \"yes\"; else print \"no\";"),
            "yes\n"
        );
        assert_eq!(
            run_ok("if (nil) print \"yes\"; else print \"no\";"),
            "no\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operand_values() {
        assert_eq!(run_ok("print nil or \"x\";"), "x\n");
        assert_eq!(run_ok("print \"x\" or \"y\";"), "x\n");
        assert_eq!(run_ok("print nil and \"x\";"), "nil\n");
        assert_eq!(run_ok("print 1 and 2;"), "2\n");
    }

    #[test]
    fn test_logical_and_short_circuits() {
        let output = run_ok(
            "var called = false;\
             fun touch() { called = true; return true; }\
             false and touch();\
             print called;",
        );

        assert_eq!(output, "false\n");
    }

    // ──────────────────────── variables and scope ──────────────────────

    #[test]
    fn test_block_shadowing() {
        let output = run_ok("var a = 1; { var a = 2; print a; } print a;");

        assert_eq!(output, "2\n1\n");
    }

    #[test]
    fn test_assignment_is_an_expression() {
        assert_eq!(run_ok("var a = 1; print a = 2; print a;"), "2\n2\n");
    }

    #[test]
    fn test_undefined_variable_is_a_use_time_error() {
        assert_runtime_error("print missing;", "Undefined variable 'missing'.");
        assert_runtime_error("missing = 1;", "Undefined variable 'missing'.");
    }

    #[test]
    fn test_globals_may_be_referenced_before_definition() {
        let output = run_ok(
            "fun front() { return back(); }\
             fun back() { return 7; }\
             print front();",
        );

        assert_eq!(output, "7\n");
    }

    #[test]
    fn test_closure_binds_to_defining_scope() {
        let output = run_ok(
            "var a = \"global\";\
             {\
               fun showA() { print a; }\
               showA();\
               var a = \"block\";\
               showA();\
             }",
        );

        assert_eq!(output, "global\nglobal\n");
    }

    #[test]
    fn test_counter_closure_shares_captured_state() {
        let output = run_ok(
            "fun makeCounter() {\
               var i = 0;\
               fun count() { i = i + 1; print i; }\
               return count;\
             }\
             var counter = makeCounter();\
             counter();\
             counter();",
        );

        assert_eq!(output, "1\n2\n");
    }

    // ─────────────────────── functions and control ─────────────────────

    #[test]
    fn test_for_loop_desugars_and_runs() {
        assert_eq!(
            run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_while_loop_propagates_return() {
        let output = run_ok(
            "fun firstAbove(limit) {\
               var i = 0;\
               while (true) {\
                 if (i > limit) return i;\
                 i = i + 1;\
               }\
             }\
             print firstAbove(3);",
        );

        assert_eq!(output, "4\n");
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun noop() {} print noop();"), "nil\n");
    }

    #[test]
    fn test_recursion() {
        let output = run_ok(
            "fun fib(n) {\
               if (n < 2) return n;\
               return fib(n - 1) + fib(n - 2);\
             }\
             print fib(10);",
        );

        assert_eq!(output, "55\n");
    }

    #[test]
    fn test_arity_mismatch() {
        assert_runtime_error(
            "fun pair(a, b) {} pair(1);",
            "Expected 2 arguments but got 1.",
        );
        assert_runtime_error(
            "fun pair(a, b) {} pair(1, 2, 3);",
            "Expected 2 arguments but got 3.",
        );
    }

    #[test]
    fn test_calling_a_non_callable() {
        assert_runtime_error("\"text\"();", "Can only call functions and classes.");
        assert_runtime_error("nil();", "Can only call functions and classes.");
    }

    #[test]
    fn test_value_display_forms() {
        let output = run_ok(
            "fun f() {}\
             class Widget {}\
             print f;\
             print clock;\
             print Widget;\
             print Widget();",
        );

        assert_eq!(output, "<fn f>\n<native fn>\nWidget\nWidget instance\n");
    }

    // ──────────────────────────── classes ──────────────────────────────

    #[test]
    fn test_fields_are_per_instance() {
        let output = run_ok(
            "class Box {}\
             var a = Box();\
             var b = Box();\
             a.value = 1;\
             b.value = 2;\
             print a.value;\
             print b.value;",
        );

        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn test_methods_bind_this() {
        let output = run_ok(
            "class Cake {\
               taste() { print \"The \" + this.flavor + \" cake is delicious\"; }\
             }\
             var cake = Cake();\
             cake.flavor = \"chocolate\";\
             cake.taste();",
        );

        assert_eq!(output, "The chocolate cake is delicious\n");
    }

    #[test]
    fn test_detached_method_remembers_its_instance() {
        let output = run_ok(
            "class Person {\
               init(name) { this.name = name; }\
               sayName() { print this.name; }\
             }\
             var jane = Person(\"Jane\");\
             var method = jane.sayName;\
             method();",
        );

        assert_eq!(output, "Jane\n");
    }

    #[test]
    fn test_initializer_sets_arity_and_runs() {
        let output = run_ok(
            "class Point {\
               init(x, y) { this.x = x; this.y = y; }\
             }\
             var p = Point(3, 4);\
             print p.x + p.y;",
        );

        assert_eq!(output, "7\n");
    }

    #[test]
    fn test_initializer_always_returns_the_instance() {
        let output = run_ok(
            "class Early {\
               init() { this.x = 1; return; this.x = 2; }\
             }\
             var e = Early();\
             print e;\
             print e.init();\
             print e.x;",
        );

        assert_eq!(output, "Early instance\nEarly instance\n1\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let output = run_ok(
            "class Thing {\
               describe() { return \"method\"; }\
             }\
             var t = Thing();\
             print t.describe();\
             t.describe = \"field\";\
             print t.describe;",
        );

        assert_eq!(output, "method\nfield\n");
    }

    #[test]
    fn test_undefined_property() {
        assert_runtime_error("class Empty {} Empty().missing;", "Undefined property 'missing'.");
    }

    #[test]
    fn test_property_access_on_non_instance() {
        assert_runtime_error("\"text\".length;", "Only instances have properties.");
        assert_runtime_error("123.field = 1;", "Only instances have fields.");
    }

    // ─────────────────────────── inheritance ───────────────────────────

    #[test]
    fn test_subclass_overrides_win() {
        let output = run_ok(
            "class Base { get() { return 1; } }\
             class Derived < Base { get() { return 2; } }\
             print Derived().get();",
        );

        assert_eq!(output, "2\n");
    }

    #[test]
    fn test_inherited_methods_are_found_up_the_chain() {
        let output = run_ok(
            "class Base { greet() { print \"hi\"; } }\
             class Middle < Base {}\
             class Leaf < Middle {}\
             Leaf().greet();",
        );

        assert_eq!(output, "hi\n");
    }

    #[test]
    fn test_super_starts_above_the_defining_class() {
        // `super` in Middle::method resolves against Base even when invoked
        // through a Leaf instance.
        let output = run_ok(
            "class Base { method() { print \"Base method\"; } }\
             class Middle < Base {\
               method() { print \"Middle method\"; }\
               test() { super.method(); }\
             }\
             class Leaf < Middle {}\
             Leaf().test();",
        );

        assert_eq!(output, "Base method\n");
    }

    #[test]
    fn test_super_initializer_chaining() {
        let output = run_ok(
            "class A { init() { this.tag = \"A\"; } }\
             class B < A {\
               init() { super.init(); this.extra = \"B\"; }\
             }\
             var b = B();\
             print b.tag + b.extra;",
        );

        assert_eq!(output, "AB\n");
    }

    #[test]
    fn test_super_method_missing() {
        assert_runtime_error(
            "class A {}\
             class B < A { go() { super.missing(); } }\
             B().go();",
            "Undefined property 'missing'.",
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        assert_runtime_error(
            "var NotAClass = \"so not a class\"; class Sub < NotAClass {}",
            "Superclass must be a class.",
        );
    }

    // ─────────────────────────── determinism ───────────────────────────

    #[test]
    fn test_resolution_map_is_reusable_across_runs() {
        let source = "var a = \"first\";\
                      {\
                        var a = \"second\";\
                        fun show() { print a; }\
                        show();\
                      }\
                      print a;";

        let tokens = tokens_of(source);
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        let first = run_statements(&statements, locals.clone()).expect("first run");
        let second = run_statements(&statements, locals).expect("second run");

        assert_eq!(first, "second\nfirst\n");
        assert_eq!(first, second);
    }

    #[test]
    fn test_runtime_error_reports_line() {
        let tokens = tokens_of("var ok = 1;\nprint ok + nil;");
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        match run_statements(&statements, locals) {
            Err(LoxError::Runtime { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected runtime error, got {:?}", other),
        }
    }
}
