//! Tree-walking evaluator for compiled scripts

use std::path::Path;

use crate::error::ViewError;
use crate::script::ast::{ArrayItem, AssignOp, BinaryOp, Expr, UnaryOp};
use crate::script::builtins;
use crate::script::program::Node;
use crate::script::Host;
use crate::value::{Data, Number, Value};

/// Executes one view's script against its data
///
/// Every failure leaving [`Evaluator::run`] is a [`ViewError::Evaluation`]
/// naming this view and the script line that raised it.
pub struct Evaluator<'a> {
    host: &'a dyn Host,
    path: &'a Path,
    scope: Data,
}

impl<'a> Evaluator<'a> {
    /// Bind `data` as variables, plus `$__env` and `$__data`
    pub fn new(host: &'a dyn Host, path: &'a Path, data: &Data) -> Self {
        let mut scope = data.clone();
        scope.insert("__env".to_string(), Value::Env);
        scope.insert("__data".to_string(), Value::Map(data.clone()));
        Self { host, path, scope }
    }

    pub fn run(&mut self, nodes: &[Node]) -> Result<(), ViewError> {
        for node in nodes {
            self.exec(node)?;
        }
        Ok(())
    }

    fn located(&self, line: usize, source: ViewError) -> ViewError {
        ViewError::Evaluation {
            path: self.path.to_path_buf(),
            line,
            source: Box::new(source),
        }
    }

    fn eval_at(&mut self, expr: &Expr, line: usize) -> Result<Value, ViewError> {
        self.eval(expr).map_err(|e| self.located(line, e))
    }

    fn condition(&mut self, expr: &Expr, line: usize) -> Result<bool, ViewError> {
        Ok(self.eval_at(expr, line)?.truthy())
    }

    fn exec(&mut self, node: &Node) -> Result<(), ViewError> {
        match node {
            Node::Text(text) => self.host.write(text),
            Node::Echo { line, exprs } => {
                for expr in exprs {
                    let text = self
                        .eval(expr)
                        .and_then(|value| value.to_output())
                        .map_err(|e| self.located(*line, e))?;
                    self.host.write(&text);
                }
            }
            Node::Expr { line, expr } => {
                self.eval_at(expr, *line)?;
            }
            Node::Unset { names, .. } => {
                for name in names {
                    self.scope.shift_remove(name);
                }
            }
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    if self.condition(&branch.cond, branch.line)? {
                        return self.run(&branch.body);
                    }
                }
                if let Some(body) = otherwise {
                    self.run(body)?;
                }
            }
            Node::Foreach {
                line,
                subject,
                key,
                value,
                body,
            } => {
                let entries: Vec<(Value, Value)> = match self.eval_at(subject, *line)? {
                    Value::List(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| (Value::from(i), item))
                        .collect(),
                    Value::Map(map) => map.into_iter().map(|(k, v)| (Value::Str(k), v)).collect(),
                    other => {
                        let message = format!(
                            "foreach() argument must be of type array, {} given",
                            other.type_name()
                        );
                        return Err(self.located(*line, ViewError::runtime(message)));
                    }
                };
                for (k, v) in entries {
                    if let Some(key) = key {
                        self.scope.insert(key.clone(), k);
                    }
                    self.scope.insert(value.clone(), v);
                    self.run(body)?;
                }
            }
            Node::For {
                line,
                init,
                cond,
                step,
                body,
            } => {
                for expr in init {
                    self.eval_at(expr, *line)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.condition(cond, *line)? {
                            break;
                        }
                    }
                    self.run(body)?;
                    for expr in step {
                        self.eval_at(expr, *line)?;
                    }
                }
            }
            Node::While { line, cond, body } => {
                while self.condition(cond, *line)? {
                    self.run(body)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ViewError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => self.variable(name),
            Expr::Array(items) => self.array(items),
            Expr::Call { name, args } => self.call(name, args),
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let target = self.eval(target)?;
                let args = self.eval_all(args)?;
                self.invoke(&target, method, args)
            }
            Expr::Property { target, name } => {
                let target = self.eval(target)?;
                property(&target, name)?.ok_or_else(|| {
                    ViewError::runtime(format!("undefined property {}", name))
                })
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)?.ok_or_else(|| {
                    ViewError::runtime(format!("undefined array key {}", describe_key(&index)))
                })
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => negate(&value),
                }
            }
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Ok(Value::Bool(
                self.eval(lhs)?.truthy() && self.eval(rhs)?.truthy(),
            )),
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Ok(Value::Bool(
                self.eval(lhs)?.truthy() || self.eval(rhs)?.truthy(),
            )),
            Expr::Binary {
                op: BinaryOp::Coalesce,
                lhs,
                rhs,
            } => match self.quiet(lhs)? {
                Some(value) if !value.is_null() => Ok(value),
                _ => self.eval(rhs),
            },
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond)?;
                if !cond.truthy() {
                    return self.eval(otherwise);
                }
                match then {
                    Some(then) => self.eval(then),
                    None => Ok(cond),
                }
            }
            Expr::Assign { op, target, value } => {
                let value = self.eval(value)?;
                let assigned = match op {
                    AssignOp::Set => value,
                    AssignOp::Add => arithmetic(BinaryOp::Add, &self.variable(target)?, &value)?,
                    AssignOp::Sub => arithmetic(BinaryOp::Sub, &self.variable(target)?, &value)?,
                    AssignOp::Concat => {
                        let current = self.variable(target)?.to_output()?;
                        Value::Str(current + &value.to_output()?)
                    }
                };
                self.scope.insert(target.clone(), assigned.clone());
                Ok(assigned)
            }
            Expr::Step { target, delta } => {
                let previous = self.variable(target)?;
                let next = arithmetic(BinaryOp::Add, &previous, &Value::Int(*delta))?;
                self.scope.insert(target.clone(), next);
                Ok(previous)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ViewError> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn variable(&self, name: &str) -> Result<Value, ViewError> {
        self.scope
            .get(name)
            .cloned()
            .ok_or_else(|| ViewError::runtime(format!("undefined variable ${}", name)))
    }

    /// Evaluate without failing on missing variables, keys or properties
    fn quiet(&mut self, expr: &Expr) -> Result<Option<Value>, ViewError> {
        match expr {
            Expr::Variable(name) => Ok(self.scope.get(name).cloned()),
            Expr::Property { target, name } => match self.quiet(target)? {
                Some(target) if !target.is_null() => Ok(property(&target, name).unwrap_or(None)),
                _ => Ok(None),
            },
            Expr::Index { target, index } => match self.quiet(target)? {
                Some(target) if !target.is_null() => {
                    let index = self.eval(index)?;
                    Ok(index_value(&target, &index).unwrap_or(None))
                }
                _ => Ok(None),
            },
            other => self.eval(other).map(Some),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value, ViewError> {
        match name {
            "isset" => {
                if args.is_empty() {
                    return Err(ViewError::runtime("isset() expects at least 1 argument"));
                }
                for arg in args {
                    match self.quiet(arg)? {
                        Some(value) if !value.is_null() => {}
                        _ => return Ok(Value::Bool(false)),
                    }
                }
                Ok(Value::Bool(true))
            }
            "empty" => {
                let [arg] = args else {
                    return Err(ViewError::runtime("empty() expects exactly 1 argument"));
                };
                let present = self.quiet(arg)?.is_some_and(|value| value.truthy());
                Ok(Value::Bool(!present))
            }
            _ => {
                let values = self.eval_all(args)?;
                builtins::call(name, values)
            }
        }
    }

    fn invoke(&self, target: &Value, method: &str, args: Vec<Value>) -> Result<Value, ViewError> {
        match target {
            Value::Env | Value::View(_) => self.host.invoke(target, method, args),
            Value::Errors(errors) => errors.call(method, &args),
            Value::Messages(bag) => bag.call(method, &args),
            other => Err(ViewError::runtime(format!(
                "call to a member function {}() on {}",
                method,
                other.type_name()
            ))),
        }
    }

    /// Lists when no entry has a key, ordered maps otherwise
    fn array(&mut self, items: &[ArrayItem]) -> Result<Value, ViewError> {
        if items.iter().all(|item| item.key.is_none()) {
            let values = items
                .iter()
                .map(|item| self.eval(&item.value))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::List(values));
        }

        let mut map = Data::new();
        // `None` once the largest integer key has been used
        let mut next_index: Option<i64> = Some(0);
        for item in items {
            let key = match (&item.key, next_index) {
                (Some(key), _) => self.eval(key)?.to_output()?,
                (None, Some(index)) => index.to_string(),
                (None, None) => {
                    return Err(ViewError::runtime(
                        "cannot add element to the array, the next index is already occupied",
                    ))
                }
            };
            if let Ok(index) = key.parse::<i64>() {
                next_index = next_index
                    .zip(index.checked_add(1))
                    .map(|(next, after)| next.max(after));
            }
            let value = self.eval(&item.value)?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

fn describe_key(index: &Value) -> String {
    match index {
        Value::Str(s) => format!("\"{}\"", s),
        other => other.to_output().unwrap_or_else(|_| other.type_name().to_string()),
    }
}

/// `$target->name`; `Ok(None)` when the property is missing
fn property(target: &Value, name: &str) -> Result<Option<Value>, ViewError> {
    match target {
        Value::Map(map) => Ok(map.get(name).cloned()),
        Value::View(view) => Ok(view.data.get(name).cloned()),
        other => Err(ViewError::runtime(format!(
            "attempt to read property \"{}\" on {}",
            name,
            other.type_name()
        ))),
    }
}

/// `$target[index]`; `Ok(None)` when the key is missing
fn index_value(target: &Value, index: &Value) -> Result<Option<Value>, ViewError> {
    match target {
        Value::List(items) => Ok(match index.to_number() {
            Some(Number::Int(i)) if i >= 0 => items.get(i as usize).cloned(),
            _ => None,
        }),
        Value::Map(map) => Ok(map.get(&index.to_output()?).cloned()),
        Value::Str(s) => Ok(match index.to_number() {
            Some(Number::Int(i)) if i >= 0 => s
                .chars()
                .nth(i as usize)
                .map(|c| Value::Str(c.to_string())),
            _ => None,
        }),
        other => Err(ViewError::runtime(format!(
            "cannot use a value of type {} as an array",
            other.type_name()
        ))),
    }
}

fn negate(value: &Value) -> Result<Value, ViewError> {
    match value.to_number() {
        Some(Number::Int(i)) => Ok(i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(i as f64)))),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(ViewError::runtime(format!(
            "unsupported operand type for negation: {}",
            value.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ViewError> {
    let result = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            return arithmetic(op, lhs, rhs)
        }
        BinaryOp::Concat => Value::Str(lhs.to_output()? + &rhs.to_output()?),
        BinaryOp::Eq => Value::Bool(lhs.loose_eq(rhs)),
        BinaryOp::NotEq => Value::Bool(!lhs.loose_eq(rhs)),
        BinaryOp::Identical => Value::Bool(lhs == rhs),
        BinaryOp::NotIdentical => Value::Bool(lhs != rhs),
        BinaryOp::Lt => Value::Bool(lhs.compare(rhs)?.is_lt()),
        BinaryOp::Gt => Value::Bool(lhs.compare(rhs)?.is_gt()),
        BinaryOp::LtEq => Value::Bool(lhs.compare(rhs)?.is_le()),
        BinaryOp::GtEq => Value::Bool(lhs.compare(rhs)?.is_ge()),
        BinaryOp::And => Value::Bool(lhs.truthy() && rhs.truthy()),
        BinaryOp::Or => Value::Bool(lhs.truthy() || rhs.truthy()),
        BinaryOp::Coalesce => {
            if lhs.is_null() {
                rhs.clone()
            } else {
                lhs.clone()
            }
        }
    };
    Ok(result)
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        _ => "?",
    }
}

/// Integer arithmetic when both sides are integers and the result is exact,
/// floating point otherwise
fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ViewError> {
    let (Some(a), Some(b)) = (lhs.to_number(), rhs.to_number()) else {
        return Err(ViewError::runtime(format!(
            "unsupported operand types: {} {} {}",
            lhs.type_name(),
            symbol(op),
            rhs.type_name()
        )));
    };

    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b.as_f64() == 0.0 {
        let what = if op == BinaryOp::Div { "division" } else { "modulo" };
        return Err(ViewError::runtime(format!("{} by zero", what)));
    }

    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Mod => Some(x.checked_rem(y).unwrap_or(0)),
            _ => None,
        };
        if let Some(value) = exact {
            return Ok(Value::Int(value));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Mod => {
            let (xi, yi) = (x as i64, y as i64);
            if yi == 0 {
                return Err(ViewError::runtime("modulo by zero"));
            }
            return Ok(Value::Int(xi.checked_rem(yi).unwrap_or(0)));
        }
        _ => {
            return Err(ViewError::runtime(format!(
                "{:?} is not an arithmetic operator",
                op
            )))
        }
    };
    Ok(Value::Float(result))
}
