#[cfg(test)]
mod resolver_tests {
    use loxrs::ast::{Expr, Stmt};
    use loxrs::parser::Parser;
    use loxrs::resolver::Resolver;
    use loxrs::scanner::Scanner;
    use loxrs::token::Token;

    fn tokens_of(source: &str) -> Vec<Token<'_>> {
        Scanner::new(source.as_bytes())
            .collect::<Result<_, _>>()
            .expect("source lexes")
    }

    /// Resolve `source` and return the rendered static errors (empty when
    /// resolution succeeds).
    fn resolve_errors(source: &str) -> Vec<String> {
        let tokens = tokens_of(source);
        let statements = Parser::new(&tokens).parse().expect("source parses");

        match Resolver::new().resolve(&statements) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn assert_single_error(source: &str, expected: &str) {
        let errors = resolve_errors(source);

        assert_eq!(errors.len(), 1, "errors: {:?}", errors);
        assert!(
            errors[0].contains(expected),
            "expected {:?} in {:?}",
            expected,
            errors[0]
        );
    }

    #[test]
    fn test_read_in_own_initializer() {
        assert_single_error(
            "var a = \"outer\"; { var a = a; }",
            "Can't read local variable in its own initializer.",
        );
    }

    #[test]
    fn test_duplicate_declaration_in_scope() {
        assert_single_error(
            "fun bad() { var a = 1; var a = 2; }",
            "Already a variable with this name in this scope.",
        );
    }

    #[test]
    fn test_duplicate_declaration_allowed_at_global_scope() {
        assert!(resolve_errors("var a = 1; var a = 2;").is_empty());
    }

    #[test]
    fn test_return_outside_function() {
        assert_single_error("return 1;", "Can't return from top-level code.");
    }

    #[test]
    fn test_return_value_from_initializer() {
        assert_single_error(
            "class Thing { init() { return 1; } }",
            "Can't return a value from an initializer.",
        );
    }

    #[test]
    fn test_bare_return_from_initializer_is_fine() {
        assert!(resolve_errors("class Thing { init() { return; } }").is_empty());
    }

    #[test]
    fn test_this_outside_class() {
        assert_single_error("print this;", "Can't use 'this' outside of a class.");
        assert_single_error(
            "fun f() { return this; }",
            "Can't use 'this' outside of a class.",
        );
    }

    #[test]
    fn test_super_outside_class() {
        assert_single_error(
            "fun f() { super.f(); }",
            "Can't use 'super' outside of a class.",
        );
    }

    #[test]
    fn test_super_without_superclass() {
        assert_single_error(
            "class Base { cook() { super.cook(); } }",
            "Can't use 'super' in a class with no superclass.",
        );
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        assert_single_error("class Oops < Oops {}", "A class can't inherit from itself.");
    }

    #[test]
    fn test_errors_accumulate() {
        let errors = resolve_errors("return 1; print this;");

        assert_eq!(errors.len(), 2, "errors: {:?}", errors);
    }

    #[test]
    fn test_global_references_are_not_recorded() {
        let tokens = tokens_of("var a = 1; print a;");
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        assert!(locals.is_empty());

        let Stmt::Print(Expr::Variable { id, .. }) = &statements[1] else {
            panic!("expected print of a variable");
        };

        assert_eq!(locals.distance(*id), None);
    }

    #[test]
    fn test_local_reference_in_defining_scope() {
        let tokens = tokens_of("{ var a = 1; print a; }");
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        let Stmt::Block(body) = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Print(Expr::Variable { id, .. }) = &body[1] else {
            panic!("expected print of a variable");
        };

        assert_eq!(locals.distance(*id), Some(0));
    }

    #[test]
    fn test_distance_counts_intervening_scopes() {
        let tokens = tokens_of("{ var a = 1; { { print a; } } }");
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        assert_eq!(locals.len(), 1);

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Block(mid) = &outer[1] else {
            panic!("expected block");
        };
        let Stmt::Block(inner) = &mid[0] else {
            panic!("expected block");
        };
        let Stmt::Print(Expr::Variable { id, .. }) = &inner[0] else {
            panic!("expected print of a variable");
        };

        assert_eq!(locals.distance(*id), Some(2));
    }

    #[test]
    fn test_parameter_resolves_to_function_scope() {
        let tokens = tokens_of("fun echo(x) { print x; }");
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        let Stmt::Function(declaration) = &statements[0] else {
            panic!("expected function declaration");
        };
        let Stmt::Print(Expr::Variable { id, .. }) = &declaration.body[0] else {
            panic!("expected print of a variable");
        };

        assert_eq!(locals.distance(*id), Some(0));
    }

    #[test]
    fn test_identical_names_resolve_per_node() {
        // Both prints read `a`, but each reference is its own node with its
        // own depth: one sees the inner binding, one the outer.
        let tokens = tokens_of("{ var a = 1; { var a = 2; print a; } print a; }");
        let statements = Parser::new(&tokens).parse().expect("parses");
        let locals = Resolver::new().resolve(&statements).expect("resolves");

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Block(inner) = &outer[1] else {
            panic!("expected block");
        };
        let Stmt::Print(Expr::Variable { id: inner_id, .. }) = &inner[1] else {
            panic!("expected print of a variable");
        };
        let Stmt::Print(Expr::Variable { id: outer_id, .. }) = &outer[2] else {
            panic!("expected print of a variable");
        };

        assert_eq!(locals.distance(*inner_id), Some(0));
        assert_eq!(locals.distance(*outer_id), Some(0));
        assert_ne!(inner_id, outer_id);
    }
}
