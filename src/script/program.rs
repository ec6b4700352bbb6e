//! Splitting compiled scripts into text and code, and pairing block statements

use std::mem;

use crate::error::{ScriptError, Span};
use crate::script::ast::{Expr, Instr, Spanned};
use crate::script::grammar::parse_island;
use crate::script::lexer::{lex, unknown_character};
use crate::value::Value;

pub const OPEN_TAG: &str = "<%";
pub const CLOSE_TAG: &str = "%>";

/// One arm of an `if` / `elseif` chain
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub line: usize,
    pub cond: Expr,
    pub body: Vec<Node>,
}

/// An executable script tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Echo {
        line: usize,
        exprs: Vec<Expr>,
    },
    Expr {
        line: usize,
        expr: Expr,
    },
    Unset {
        line: usize,
        names: Vec<String>,
    },
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    Foreach {
        line: usize,
        subject: Expr,
        key: Option<String>,
        value: String,
        body: Vec<Node>,
    },
    For {
        line: usize,
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Vec<Node>,
    },
    While {
        line: usize,
        cond: Expr,
        body: Vec<Node>,
    },
}

/// A parsed compiled script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub nodes: Vec<Node>,
}

impl Program {
    /// Parse compiled script text
    ///
    /// Text outside `<% ... %>` is kept verbatim, except that a single newline
    /// directly after `%>` is dropped.
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let lines = LineIndex::new(source);
        let mut builder = Builder::default();
        let mut cursor = 0;

        while let Some(found) = source[cursor..].find(OPEN_TAG) {
            let open = cursor + found;
            if open > cursor {
                builder.text(&source[cursor..open]);
            }

            let code_start = open + OPEN_TAG.len();
            let Some(close_offset) = source[code_start..].find(CLOSE_TAG) else {
                return Err(ScriptError::Unterminated {
                    span: open..source.len(),
                    line: lines.line_of(open),
                });
            };
            let close = code_start + close_offset;

            let tokens = lex(&source[code_start..close], code_start).map_err(|span| {
                let line = lines.line_of(span.start);
                unknown_character(source, span, line)
            })?;
            for instr in parse_island(tokens, close, |offset| lines.line_of(offset))? {
                let line = lines.line_of(instr.span.start);
                builder.instr(instr, line)?;
            }

            cursor = close + CLOSE_TAG.len();
            if source[cursor..].starts_with('\n') {
                cursor += 1;
            }
        }

        if cursor < source.len() {
            builder.text(&source[cursor..]);
        }
        builder.finish()
    }
}

/// Maps byte offsets to 1-based line numbers
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }
}

enum Block {
    If {
        branches: Vec<Branch>,
        cond: Expr,
        cond_line: usize,
        in_else: bool,
    },
    Foreach {
        subject: Expr,
        key: Option<String>,
        value: String,
    },
    For {
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
    },
    While {
        cond: Expr,
    },
}

impl Block {
    fn opener(&self) -> &'static str {
        match self {
            Block::If { .. } => "if",
            Block::Foreach { .. } => "foreach",
            Block::For { .. } => "for",
            Block::While { .. } => "while",
        }
    }

    fn closer(&self) -> &'static str {
        match self {
            Block::If { .. } => "endif",
            Block::Foreach { .. } => "endforeach",
            Block::For { .. } => "endfor",
            Block::While { .. } => "endwhile",
        }
    }
}

struct Frame {
    block: Block,
    line: usize,
    span: Span,
    body: Vec<Node>,
}

#[derive(Default)]
struct Builder {
    root: Vec<Node>,
    frames: Vec<Frame>,
}

impl Builder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.body,
            None => &mut self.root,
        }
    }

    fn text(&mut self, text: &str) {
        self.current().push(Node::Text(text.to_string()));
    }

    fn open(&mut self, block: Block, line: usize, span: Span) {
        self.frames.push(Frame {
            block,
            line,
            span,
            body: Vec::new(),
        });
    }

    /// Pop the innermost block if `closer` ends it
    fn close(&mut self, closer: &'static str, span: Span, line: usize) -> Result<Frame, ScriptError> {
        match self.frames.pop() {
            Some(frame) if frame.block.closer() == closer => Ok(frame),
            _ => Err(ScriptError::Unexpected {
                span,
                line,
                found: closer.to_string(),
            }),
        }
    }

    fn instr(&mut self, instr: Spanned<Instr>, line: usize) -> Result<(), ScriptError> {
        let Spanned { node, span } = instr;
        let keyword = node.keyword();
        let unexpected = |span: Span| ScriptError::Unexpected {
            span,
            line,
            found: keyword.to_string(),
        };

        match node {
            Instr::Echo(exprs) => self.current().push(Node::Echo { line, exprs }),
            Instr::Expr(expr) => self.current().push(Node::Expr { line, expr }),
            Instr::Unset(names) => self.current().push(Node::Unset { line, names }),

            Instr::If(cond) => self.open(
                Block::If {
                    branches: Vec::new(),
                    cond,
                    cond_line: line,
                    in_else: false,
                },
                line,
                span,
            ),
            Instr::ElseIf(next) => match self.frames.last_mut() {
                Some(Frame {
                    block:
                        Block::If {
                            branches,
                            cond,
                            cond_line,
                            in_else: false,
                        },
                    body,
                    ..
                }) => {
                    let previous = mem::replace(cond, next);
                    branches.push(Branch {
                        line: *cond_line,
                        cond: previous,
                        body: mem::take(body),
                    });
                    *cond_line = line;
                }
                _ => return Err(unexpected(span)),
            },
            Instr::Else => match self.frames.last_mut() {
                Some(Frame {
                    block:
                        Block::If {
                            branches,
                            cond,
                            cond_line,
                            in_else,
                        },
                    body,
                    ..
                }) if !*in_else => {
                    let previous = mem::replace(cond, Expr::Literal(Value::Null));
                    branches.push(Branch {
                        line: *cond_line,
                        cond: previous,
                        body: mem::take(body),
                    });
                    *in_else = true;
                }
                _ => return Err(unexpected(span)),
            },
            Instr::EndIf => {
                let frame = self.close("endif", span, line)?;
                let node = match frame.block {
                    Block::If {
                        mut branches,
                        cond,
                        cond_line,
                        in_else,
                    } => {
                        if in_else {
                            Node::If {
                                branches,
                                otherwise: Some(frame.body),
                            }
                        } else {
                            branches.push(Branch {
                                line: cond_line,
                                cond,
                                body: frame.body,
                            });
                            Node::If {
                                branches,
                                otherwise: None,
                            }
                        }
                    }
                    _ => return Err(unexpected(frame.span)),
                };
                self.current().push(node);
            }

            Instr::Foreach {
                subject,
                key,
                value,
            } => self.open(
                Block::Foreach {
                    subject,
                    key,
                    value,
                },
                line,
                span,
            ),
            Instr::EndForeach => {
                let frame = self.close("endforeach", span, line)?;
                let Block::Foreach {
                    subject,
                    key,
                    value,
                } = frame.block
                else {
                    return Err(unexpected(frame.span));
                };
                self.current().push(Node::Foreach {
                    line: frame.line,
                    subject,
                    key,
                    value,
                    body: frame.body,
                });
            }

            Instr::For { init, cond, step } => {
                self.open(Block::For { init, cond, step }, line, span)
            }
            Instr::EndFor => {
                let frame = self.close("endfor", span, line)?;
                let Block::For { init, cond, step } = frame.block else {
                    return Err(unexpected(frame.span));
                };
                self.current().push(Node::For {
                    line: frame.line,
                    init,
                    cond,
                    step,
                    body: frame.body,
                });
            }

            Instr::While(cond) => self.open(Block::While { cond }, line, span),
            Instr::EndWhile => {
                let frame = self.close("endwhile", span, line)?;
                let Block::While { cond } = frame.block else {
                    return Err(unexpected(frame.span));
                };
                self.current().push(Node::While {
                    line: frame.line,
                    cond,
                    body: frame.body,
                });
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Program, ScriptError> {
        match self.frames.pop() {
            Some(frame) => Err(ScriptError::Unclosed {
                span: frame.span,
                line: frame.line,
                block: frame.block.opener(),
            }),
            None => Ok(Program { nodes: self.root }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_only() {
        let program = Program::parse("<p>hi</p>").unwrap();
        assert_eq!(program.nodes, vec![Node::Text("<p>hi</p>".to_string())]);
    }

    #[test]
    fn test_newline_after_island_is_swallowed() {
        let program = Program::parse("<% $a = 1; %>\nnext\n").unwrap();
        assert_eq!(program.nodes.len(), 2);
        assert_eq!(program.nodes[1], Node::Text("next\n".to_string()));
    }

    #[test]
    fn test_if_chain_builds_branches() {
        let source = "<% if($a): %>\nA\n<% elseif($b): %>\nB\n<% else: %>\nC\n<% endif; %>";
        let program = Program::parse(source).unwrap();
        let [Node::If { branches, otherwise }] = program.nodes.as_slice() else {
            panic!("expected a single if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].line, 1);
        assert_eq!(branches[1].line, 3);
        assert_eq!(branches[1].body, vec![Node::Text("B\n".to_string())]);
        assert_eq!(otherwise.as_deref(), Some(&[Node::Text("C\n".to_string())][..]));
    }

    #[test]
    fn test_statement_lines() {
        let program = Program::parse("a\nb\n<% echo $x; %>").unwrap();
        assert!(matches!(program.nodes[1], Node::Echo { line: 3, .. }));
    }

    #[test]
    fn test_nested_loops() {
        let source = "<% foreach($rows as $row): %><% foreach($row as $cell): %>x<% endforeach; %><% endforeach; %>";
        let program = Program::parse(source).unwrap();
        let [Node::Foreach { body, .. }] = program.nodes.as_slice() else {
            panic!("expected foreach");
        };
        assert!(matches!(body[0], Node::Foreach { .. }));
    }

    #[test]
    fn test_unclosed_block() {
        let err = Program::parse("<% while(true): %>").unwrap_err();
        assert!(matches!(err, ScriptError::Unclosed { block: "while", line: 1, .. }));
    }

    #[test]
    fn test_mismatched_closer() {
        let err = Program::parse("<% if($a): %>\n<% endforeach; %>").unwrap_err();
        assert!(matches!(err, ScriptError::Unexpected { ref found, line: 2, .. } if found == "endforeach"));
    }

    #[test]
    fn test_else_without_if() {
        let err = Program::parse("<% else: %>").unwrap_err();
        assert!(matches!(err, ScriptError::Unexpected { ref found, .. } if found == "else"));
    }

    #[test]
    fn test_unterminated_island() {
        let err = Program::parse("text\n<% echo $a;").unwrap_err();
        assert!(matches!(err, ScriptError::Unterminated { line: 2, .. }));
    }

    #[test]
    fn test_empty_comment_island() {
        let program = Program::parse("a<%/**/%>b").unwrap();
        assert_eq!(
            program.nodes,
            vec![Node::Text("a".to_string()), Node::Text("b".to_string())]
        );
    }
}
