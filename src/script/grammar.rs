//! Code island parser using chumsky

use chumsky::error::{RichPattern, RichReason};
use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::{ScriptError, Span};
use crate::script::ast::*;
use crate::script::lexer::{format_token, Token};
use crate::value::Value;

/// Trailing operations on an expression: `->m()`, `->p`, `[i]`
#[derive(Debug, Clone)]
enum Postfix {
    Method(String, Vec<Expr>),
    Property(String),
    Index(Expr),
}

/// Parse the tokens of one code island into its statements
///
/// `end` is the absolute offset of the island's closing delimiter, used as the
/// end-of-input span. `line_of` maps absolute offsets to script line numbers.
pub fn parse_island(
    tokens: Vec<(Token, Span)>,
    end: usize,
    line_of: impl Fn(usize) -> usize,
) -> Result<Vec<Spanned<Instr>>, ScriptError> {
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((end..end).into(), |(t, s): (_, _)| (t, s));

    let errors = match island_parser().parse(token_stream).into_result() {
        Ok(instrs) => return Ok(instrs),
        Err(errors) => errors,
    };

    let first = errors.into_iter().next().map(|e| syntax_error(e, &line_of));
    Err(first.unwrap_or_else(|| ScriptError::Syntax {
        span: end..end,
        line: line_of(end),
        message: "invalid code".to_string(),
        expected: vec![],
    }))
}

fn syntax_error(err: Rich<'_, Token>, line_of: &impl Fn(usize) -> usize) -> ScriptError {
    let message = match err.reason() {
        RichReason::ExpectedFound { found, .. } => {
            let found_str = match found {
                Some(tok) => format_token(tok),
                None => "end of code".to_string(),
            };
            format!("Unexpected {}", found_str)
        }
        RichReason::Custom(msg) => msg.to_string(),
    };

    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            RichPattern::Token(tok) => Some(format_token(tok)),
            RichPattern::Label(label) => Some(label.to_string()),
            RichPattern::EndOfInput => Some("end of code".to_string()),
            RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
            RichPattern::Any => Some("any token".to_string()),
            RichPattern::SomethingElse => None,
        })
        .collect();

    let span = err.span().into_range();
    ScriptError::Syntax {
        line: line_of(span.start),
        span,
        message,
        expected,
    }
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> Span {
    e.start()..e.end()
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn island_parser<'a, I>(
) -> impl Parser<'a, I, Vec<Spanned<Instr>>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let variable = select! {
        Token::Variable(name) => name,
    };

    let ident = select! {
        Token::Ident(name) => name,
    };

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Int(i) => Value::Int(i),
            Token::Float(f) => Value::Float(f),
            Token::Str(s) => Value::Str(s),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
        }
        .map(Expr::Literal);

        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        // Array entries: `value` or `key => value`
        let items = expr
            .clone()
            .then(just(Token::FatArrow).ignore_then(expr.clone()).or_not())
            .map(|(first, second)| match second {
                Some(value) => ArrayItem {
                    key: Some(first),
                    value,
                },
                None => ArrayItem {
                    key: None,
                    value: first,
                },
            })
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>();

        let array = choice((
            items
                .clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose)),
            just(Token::Array).ignore_then(
                items.delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
            ),
        ))
        .map(Expr::Array);

        let call = ident
            .clone()
            .then(args.clone())
            .map(|(name, args)| Expr::Call { name, args });

        let step = variable
            .clone()
            .then(choice((
                just(Token::Increment).to(1),
                just(Token::Decrement).to(-1),
            )))
            .map(|(target, delta)| Expr::Step { target, delta });

        // Note: step must come before the bare variable
        let atom = choice((
            literal,
            step,
            variable.clone().map(Expr::Variable),
            array,
            call,
            expr.clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        ))
        .boxed();

        let postfix_op = choice((
            just(Token::Arrow)
                .ignore_then(ident.clone())
                .then(args.or_not())
                .map(|(name, args)| match args {
                    Some(args) => Postfix::Method(name, args),
                    None => Postfix::Property(name),
                }),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
        ));

        let postfix = atom
            .foldl(postfix_op.repeated(), |target, op| match op {
                Postfix::Method(method, args) => Expr::MethodCall {
                    target: Box::new(target),
                    method,
                    args,
                },
                Postfix::Property(name) => Expr::Property {
                    target: Box::new(target),
                    name,
                },
                Postfix::Index(index) => Expr::Index {
                    target: Box::new(target),
                    index: Box::new(index),
                },
            })
            .boxed();

        let unary = choice((
            just(Token::Bang).to(UnaryOp::Not),
            just(Token::Minus).to(UnaryOp::Neg),
        ))
        .repeated()
        .foldr(postfix, |op, expr| Expr::Unary {
            op,
            expr: Box::new(expr),
        })
        .boxed();

        let product = unary
            .clone()
            .foldl(
                choice((
                    just(Token::Star).to(BinaryOp::Mul),
                    just(Token::Slash).to(BinaryOp::Div),
                    just(Token::Percent).to(BinaryOp::Mod),
                ))
                .then(unary)
                .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let sum = product
            .clone()
            .foldl(
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Sub),
                    just(Token::Dot).to(BinaryOp::Concat),
                ))
                .then(product)
                .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let comparison = sum
            .clone()
            .foldl(
                choice((
                    just(Token::LessOrEqual).to(BinaryOp::LtEq),
                    just(Token::GreaterOrEqual).to(BinaryOp::GtEq),
                    just(Token::Less).to(BinaryOp::Lt),
                    just(Token::Greater).to(BinaryOp::Gt),
                ))
                .then(sum)
                .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let equality = comparison
            .clone()
            .foldl(
                choice((
                    just(Token::Identical).to(BinaryOp::Identical),
                    just(Token::NotIdentical).to(BinaryOp::NotIdentical),
                    just(Token::EqualEqual).to(BinaryOp::Eq),
                    just(Token::NotEqual).to(BinaryOp::NotEq),
                ))
                .then(comparison)
                .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let and = equality
            .clone()
            .foldl(
                choice((just(Token::AndAnd), just(Token::And)))
                    .to(BinaryOp::And)
                    .then(equality)
                    .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let or = and
            .clone()
            .foldl(
                choice((just(Token::OrOr), just(Token::Or)))
                    .to(BinaryOp::Or)
                    .then(and)
                    .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let coalesce = or
            .clone()
            .foldl(
                just(Token::Coalesce)
                    .to(BinaryOp::Coalesce)
                    .then(or)
                    .repeated(),
                |lhs, (op, rhs)| binary(op, lhs, rhs),
            )
            .boxed();

        let ternary = coalesce
            .then(
                just(Token::Question)
                    .ignore_then(expr.clone().or_not())
                    .then_ignore(just(Token::Colon))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(cond, rest)| match rest {
                Some((then, otherwise)) => Expr::Ternary {
                    cond: Box::new(cond),
                    then: then.map(Box::new),
                    otherwise: Box::new(otherwise),
                },
                None => cond,
            });

        let assign_op = choice((
            just(Token::Assign).to(AssignOp::Set),
            just(Token::PlusAssign).to(AssignOp::Add),
            just(Token::MinusAssign).to(AssignOp::Sub),
            just(Token::ConcatAssign).to(AssignOp::Concat),
        ));

        let assignment = variable
            .clone()
            .then(assign_op)
            .then(expr.clone())
            .map(|((target, op), value)| Expr::Assign {
                op,
                target,
                value: Box::new(value),
            });

        choice((assignment, ternary)).boxed()
    });

    // Statements terminated by ';'
    let echo = just(Token::Echo)
        .ignore_then(
            expr.clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(Instr::Echo);

    let unset = just(Token::Unset)
        .ignore_then(
            variable
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(Instr::Unset);

    let simple = choice((
        echo,
        unset,
        just(Token::EndIf).to(Instr::EndIf),
        just(Token::EndForeach).to(Instr::EndForeach),
        just(Token::EndFor).to(Instr::EndFor),
        just(Token::EndWhile).to(Instr::EndWhile),
        expr.clone().map(Instr::Expr),
    ))
    .map_with(|instr, e| Spanned::new(instr, span_range(&e.span())))
    .boxed();

    // Block openers terminated by ':'
    let foreach = just(Token::Foreach)
        .ignore_then(
            expr.clone()
                .then_ignore(just(Token::As))
                .then(variable.clone().then_ignore(just(Token::FatArrow)).or_not())
                .then(variable)
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(|((subject, key), value)| Instr::Foreach {
            subject,
            key,
            value,
        });

    let expr_list = expr
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>();

    let for_loop = just(Token::For)
        .ignore_then(
            expr_list
                .clone()
                .then_ignore(just(Token::Semicolon))
                .then(expr.clone().or_not())
                .then_ignore(just(Token::Semicolon))
                .then(expr_list)
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(|((init, cond), step)| Instr::For { init, cond, step });

    let opener = choice((
        just(Token::If).ignore_then(expr.clone()).map(Instr::If),
        just(Token::ElseIf).ignore_then(expr.clone()).map(Instr::ElseIf),
        just(Token::Else).to(Instr::Else),
        foreach,
        for_loop,
        just(Token::While).ignore_then(expr).map(Instr::While),
    ))
    .map_with(|instr, e| Spanned::new(instr, span_range(&e.span())))
    .then_ignore(just(Token::Colon));

    let separators = just(Token::Semicolon)
        .repeated()
        .collect::<Vec<_>>()
        .ignored();

    let statement = choice((opener, simple.clone().then_ignore(just(Token::Semicolon))));

    // The final statement of an island may omit its ';'
    separators
        .clone()
        .ignore_then(
            statement
                .then_ignore(separators)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then(simple.or_not())
        .then_ignore(end())
        .map(|(mut instrs, last)| {
            instrs.extend(last);
            instrs
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::lex;

    fn parse(code: &str) -> Result<Vec<Instr>, ScriptError> {
        let tokens = lex(code, 0).expect("lexes");
        parse_island(tokens, code.len(), |_| 1)
            .map(|instrs| instrs.into_iter().map(|s| s.node).collect())
    }

    fn var(name: &str) -> Expr {
        Expr::Variable(name.to_string())
    }

    #[test]
    fn test_echo_variable() {
        assert_eq!(parse(" echo $name; ").unwrap(), vec![Instr::Echo(vec![var("name")])]);
    }

    #[test]
    fn test_empty_island() {
        assert_eq!(parse("").unwrap(), vec![]);
        assert_eq!(parse(";;").unwrap(), vec![]);
    }

    #[test]
    fn test_last_statement_may_omit_semicolon() {
        assert_eq!(
            parse("$a = 1; echo $a").unwrap(),
            vec![
                Instr::Expr(Expr::Assign {
                    op: AssignOp::Set,
                    target: "a".to_string(),
                    value: Box::new(Expr::Literal(Value::Int(1))),
                }),
                Instr::Echo(vec![var("a")]),
            ]
        );
    }

    #[test]
    fn test_if_opener_with_colon() {
        assert_eq!(parse("if($a):").unwrap(), vec![Instr::If(var("a"))]);
        assert_eq!(parse("else:").unwrap(), vec![Instr::Else]);
        assert_eq!(parse("endif;").unwrap(), vec![Instr::EndIf]);
    }

    #[test]
    fn test_foreach_with_key() {
        assert_eq!(
            parse("foreach ($items as $k => $v):").unwrap(),
            vec![Instr::Foreach {
                subject: var("items"),
                key: Some("k".to_string()),
                value: "v".to_string(),
            }]
        );
    }

    #[test]
    fn test_for_header() {
        let instrs = parse("for($i = 0; $i < 3; $i++):").unwrap();
        let Instr::For { init, cond, step } = &instrs[0] else {
            panic!("expected for");
        };
        assert_eq!(init.len(), 1);
        assert!(matches!(cond, Some(Expr::Binary { op: BinaryOp::Lt, .. })));
        assert_eq!(
            step,
            &vec![Expr::Step {
                target: "i".to_string(),
                delta: 1
            }]
        );
    }

    #[test]
    fn test_method_chain() {
        let instrs = parse("echo $__env->make('a', $__data)->render();").unwrap();
        let Instr::Echo(exprs) = &instrs[0] else {
            panic!("expected echo");
        };
        let Expr::MethodCall { target, method, args } = &exprs[0] else {
            panic!("expected method call");
        };
        assert_eq!(method, "render");
        assert!(args.is_empty());
        assert!(matches!(**target, Expr::MethodCall { ref method, .. } if method == "make"));
    }

    #[test]
    fn test_precedence() {
        let instrs = parse("echo 1 + 2 * 3;").unwrap();
        let Instr::Echo(exprs) = &instrs[0] else {
            panic!("expected echo");
        };
        let Expr::Binary { op, rhs, .. } = &exprs[0] else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_array_literals() {
        let instrs = parse("echo ['a' => 1, 2];").unwrap();
        let Instr::Echo(exprs) = &instrs[0] else {
            panic!("expected echo");
        };
        let Expr::Array(items) = &exprs[0] else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 2);
        assert!(items[0].key.is_some());
        assert!(items[1].key.is_none());
        assert!(parse("echo array(1, 2);").is_ok());
    }

    #[test]
    fn test_negated_condition() {
        assert_eq!(
            parse("if (!($ok)):").unwrap(),
            vec![Instr::If(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(var("ok")),
            })]
        );
    }

    #[test]
    fn test_unset_and_ternary() {
        assert_eq!(
            parse("unset($a, $b);").unwrap(),
            vec![Instr::Unset(vec!["a".to_string(), "b".to_string()])]
        );
        assert!(matches!(
            &parse("echo $a ? 'y' : 'n';").unwrap()[0],
            Instr::Echo(exprs) if matches!(exprs[0], Expr::Ternary { .. })
        ));
    }

    #[test]
    fn test_missing_expression_is_a_syntax_error() {
        let err = parse("echo ;").unwrap_err();
        let ScriptError::Syntax { message, .. } = err else {
            panic!("expected syntax error");
        };
        assert!(message.starts_with("Unexpected"));
    }
}
