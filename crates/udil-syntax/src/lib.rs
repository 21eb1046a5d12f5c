pub mod ast;
pub mod error;
pub mod token;

pub use ast::*;
pub use error::*;
pub use token::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn stmt(kind: StmtKind) -> Rc<Statement> {
        Rc::new(Statement::new(kind, 1))
    }

    #[test]
    fn test_simple_renderings() {
        let decl = Statement::new(
            StmtKind::Declaration {
                ty: TypeName::Real,
                name: "pi".into(),
            },
            1,
        );
        assert_eq!(decl.to_string(), "real pi;");

        let assign = Statement::new(
            StmtKind::Assignment {
                target: AssignTarget {
                    name: "m".into(),
                    indices: vec![Expr::new("0"), Expr::new("i+1")],
                },
                expr: Expr::new("\"x\""),
            },
            2,
        );
        assert_eq!(assign.to_string(), "m[0][i+1] = \"x\";");

        let read = Statement::new(
            StmtKind::SyncRead {
                target: "out".into(),
                ty: Some(TypeName::Int),
                parts: vec![Expr::new("\"context-out\""), Expr::new("\"b\"")],
            },
            3,
        );
        assert_eq!(read.to_string(), "int out = sync(\"context-out\",\"b\");");
    }

    #[test]
    fn test_block_and_if_rendering() {
        let body = vec![stmt(StmtKind::Assignment {
            target: AssignTarget::name("a"),
            expr: Expr::new("a+1"),
        })];
        let block = Statement::block("program", body.clone(), 1);
        assert_eq!(block.to_string(), "program{\na = a+1;\n}");

        let iff = Statement::new(
            StmtKind::If {
                cond: Expr::new("1<2"),
                then_block: body.clone(),
                else_block: Some(vec![]),
            },
            1,
        );
        assert_eq!(iff.to_string(), "if ( 1<2 ) {\na = a+1;\n}else{\n}");
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(TypeName::Char.tag(), Some(TypeTag::Text));
        assert_eq!(TypeName::Statement.tag(), Some(TypeTag::Block));
        assert_eq!(TypeName::Void.tag(), None);
        assert_eq!(TypeTag::from_name("real"), Some(TypeTag::Real));
        assert_eq!(TypeTag::from_name("Real"), None);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(TokenKind::keyword("sync"), Some(TokenKind::Sync));
        assert_eq!(
            TokenKind::keyword("Integer"),
            Some(TokenKind::Reserved("Integer".into()))
        );
        assert_eq!(TokenKind::keyword("counter"), None);
        assert!(TokenKind::StatementType.is_type_keyword());
        assert!(!TokenKind::Plus.is_keyword());
    }
}
