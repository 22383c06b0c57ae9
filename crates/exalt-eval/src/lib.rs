//! Reference interpreter for legalized trees.
//!
//! Small-step enough to be obviously correct, used by tests to check that
//! legalization preserves evaluation results. Matches target-language
//! semantics where the passes depend on them: floor integer division,
//! `nil`/`false` falsiness, boolean-strict `and`/`or`, first-matching-clause
//! dispatch with guards.

use std::collections::HashMap;

use exalt_ast::{BinOp, Clause, Lit, Node, NodeKind, Pattern, UnOp};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Atom(String),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Closure {
        clauses: Vec<Clause>,
        captured: HashMap<String, Value>,
    },
}

impl Value {
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, PartialEq)]
pub enum EvalError {
    #[display("unbound variable: {_0}")]
    UnboundVariable(#[error(not(source))] String),
    #[display("undefined function: {_0}")]
    UndefinedFunction(#[error(not(source))] String),
    #[display("no clause matched")]
    NoMatchingClause,
    #[display("match failed")]
    MatchFailed,
    #[display("division by zero")]
    DivisionByZero,
    #[display("expected {expected} arguments, got {got}")]
    BadArity { expected: usize, got: usize },
    #[display("type error: {_0}")]
    TypeError(#[error(not(source))] String),
    #[display("cannot evaluate: {_0}")]
    Unsupported(#[error(not(source))] String),
}

pub struct Environment<'parent> {
    parent: Option<&'parent Self>,
    bindings: HashMap<String, Value>,
}

impl Environment<'_> {
    pub fn toplevel() -> Self {
        Environment {
            parent: None,
            bindings: HashMap::new(),
        }
    }

    pub fn from_bindings(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        Environment {
            parent: None,
            bindings: bindings.into_iter().collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }

    pub fn bind(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    pub fn child(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Environment<'_> {
        Environment {
            parent: Some(self),
            bindings: bindings.into_iter().collect(),
        }
    }

    /// Snapshot every visible binding, innermost shadowing outermost.
    fn flatten(&self) -> HashMap<String, Value> {
        let mut snapshot = match self.parent {
            Some(parent) => parent.flatten(),
            None => HashMap::new(),
        };
        snapshot.extend(self.bindings.clone());
        snapshot
    }
}

/// Evaluate a single node to a value, binding into `env` as matches run.
pub fn eval(env: &mut Environment<'_>, node: &Node) -> Result<Value, EvalError> {
    match &node.kind {
        NodeKind::Int(n) => Ok(Value::Int(*n)),
        NodeKind::Float(f) => Ok(Value::Float(*f)),
        NodeKind::Bool(b) => Ok(Value::Bool(*b)),
        NodeKind::Nil => Ok(Value::Nil),
        NodeKind::Atom(name) => Ok(Value::Atom(name.clone())),
        NodeKind::Str(lit) => {
            let mut out = lit.leading.clone();
            for segment in &lit.segments {
                let value = eval(env, &segment.expr)?;
                out.push_str(&display_value(&value)?);
                out.push_str(&segment.trailing);
            }
            Ok(Value::Str(out))
        }
        NodeKind::Var(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
        NodeKind::List(items) => Ok(Value::List(eval_all(env, items)?)),
        NodeKind::Tuple(items) => Ok(Value::Tuple(eval_all(env, items)?)),
        NodeKind::Map(entries) => {
            let mut out: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let key = eval(env, k)?;
                let value = eval(env, v)?;
                match out.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(slot) => slot.1 = value,
                    None => out.push((key, value)),
                }
            }
            Ok(Value::Map(out))
        }
        NodeKind::Keywords(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, v) in entries {
                let value = eval(env, v)?;
                out.push(Value::Tuple(vec![Value::Atom(key.clone()), value]));
            }
            Ok(Value::List(out))
        }
        NodeKind::FieldAccess { base, field } => {
            let base = eval(env, base)?;
            map_fetch(&base, &Value::Atom(field.clone()))
        }
        NodeKind::Index { base, index } => {
            let base = eval(env, base)?;
            let key = eval(env, index)?;
            match &base {
                Value::Map(entries) => Ok(entries
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Nil)),
                Value::Nil => Ok(Value::Nil),
                other => Err(EvalError::TypeError(format!(
                    "cannot index into {other:?}"
                ))),
            }
        }
        NodeKind::Binary { op, left, right } => eval_binary(env, *op, left, right),
        NodeKind::Unary { op, operand } => {
            let value = eval(env, operand)?;
            match (op, value) {
                (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnOp::Not, other) => Err(EvalError::TypeError(format!(
                    "not expects a boolean, got {other:?}"
                ))),
                (UnOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
                (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                (UnOp::Neg, other) => Err(EvalError::TypeError(format!(
                    "cannot negate {other:?}"
                ))),
            }
        }
        NodeKind::Call { name, args } => {
            let Some(fun) = env.lookup(name).cloned() else {
                return Err(EvalError::UndefinedFunction(name.clone()));
            };
            let args = eval_all(env, args)?;
            apply_value(fun, Some(name.as_str()), args)
        }
        NodeKind::ModuleCall { module, name, .. } => Err(EvalError::Unsupported(format!(
            "module call {module}.{name}"
        ))),
        NodeKind::Apply { fun, args } => {
            let fun = eval(env, fun)?;
            let args = eval_all(env, args)?;
            apply_value(fun, None, args)
        }
        NodeKind::Fn { clauses } => Ok(Value::Closure {
            clauses: clauses.clone(),
            captured: env.flatten(),
        }),
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            // Branch-local binds do not escape the branch.
            if eval(env, cond)?.truthy() {
                eval(&mut env.child(Vec::new()), then_branch)
            } else {
                match else_branch {
                    Some(e) => eval(&mut env.child(Vec::new()), e),
                    None => Ok(Value::Nil),
                }
            }
        }
        NodeKind::Match { pattern, value } => {
            let value = eval(env, value)?;
            let mut binds = Vec::new();
            if !match_pattern(pattern, &value, env, &mut binds)? {
                return Err(EvalError::MatchFailed);
            }
            for (name, bound) in binds {
                env.bind(name, bound);
            }
            Ok(value)
        }
        NodeKind::Case { scrutinee, clauses } => {
            let value = eval(env, scrutinee)?;
            eval_clauses(env, clauses, &[value])
        }
        NodeKind::Block(statements) => {
            let mut result = Value::Nil;
            for statement in statements {
                result = eval(env, statement)?;
            }
            Ok(result)
        }
        NodeKind::Module { name: _, body } => {
            for item in body {
                eval(env, item)?;
            }
            Ok(Value::Nil)
        }
        NodeKind::FunctionDef { name, clauses, .. } => {
            let closure = Value::Closure {
                clauses: clauses.clone(),
                captured: env.flatten(),
            };
            env.bind(name.clone(), closure);
            Ok(Value::Atom(name.clone()))
        }
        NodeKind::Raw(text) => Err(EvalError::Unsupported(format!("raw leaf {text:?}"))),
    }
}

fn eval_all(env: &mut Environment<'_>, nodes: &[Node]) -> Result<Vec<Value>, EvalError> {
    nodes.iter().map(|n| eval(env, n)).collect()
}

// Strict field lookup: unlike `Index`, a missing key is an error.
fn map_fetch(base: &Value, key: &Value) -> Result<Value, EvalError> {
    let Value::Map(entries) = base else {
        return Err(EvalError::TypeError(format!(
            "cannot access a field of {base:?}"
        )));
    };
    entries
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| EvalError::TypeError(format!("missing key {key:?}")))
}

fn apply_value(fun: Value, self_name: Option<&str>, args: Vec<Value>) -> Result<Value, EvalError> {
    let Value::Closure { clauses, captured } = fun else {
        return Err(EvalError::TypeError(format!("{fun:?} is not a function")));
    };
    let mut env = Environment::from_bindings(captured.clone());
    // Let named functions recurse even though the closure was captured
    // before its own definition completed.
    if let Some(name) = self_name {
        env.bind(
            name.to_owned(),
            Value::Closure {
                clauses: clauses.clone(),
                captured,
            },
        );
    }
    eval_clauses(&mut env, &clauses, &args)
}

/// First-matching-clause dispatch: patterns must all match and the guard,
/// if any, must evaluate to `true` exactly.
fn eval_clauses(
    env: &mut Environment<'_>,
    clauses: &[Clause],
    args: &[Value],
) -> Result<Value, EvalError> {
    for clause in clauses {
        if clause.patterns.len() != args.len() {
            return Err(EvalError::BadArity {
                expected: clause.patterns.len(),
                got: args.len(),
            });
        }
        let mut binds = Vec::new();
        let mut matched = true;
        for (pattern, arg) in clause.patterns.iter().zip(args) {
            if !match_pattern(pattern, arg, env, &mut binds)? {
                matched = false;
                break;
            }
        }
        if !matched {
            continue;
        }
        let mut inner = env.child(binds);
        if let Some(guard) = &clause.guard {
            if eval(&mut inner, guard)? != Value::Bool(true) {
                continue;
            }
        }
        return eval(&mut inner, &clause.body);
    }
    Err(EvalError::NoMatchingClause)
}

/// Match a pattern against a value, accumulating binds. A variable bound
/// twice in one pattern must bind equal values.
fn match_pattern(
    pattern: &Pattern,
    value: &Value,
    env: &Environment<'_>,
    binds: &mut Vec<(String, Value)>,
) -> Result<bool, EvalError> {
    match pattern {
        Pattern::Wildcard => Ok(true),
        Pattern::Var(name) => {
            if let Some((_, previous)) = binds.iter().find(|(n, _)| n == name) {
                return Ok(previous == value);
            }
            binds.push((name.clone(), value.clone()));
            Ok(true)
        }
        Pattern::Pin(name) => match env.lookup(name) {
            Some(pinned) => Ok(pinned == value),
            None => Err(EvalError::UnboundVariable(name.clone())),
        },
        Pattern::Literal(lit) => Ok(lit_value(lit) == *value),
        Pattern::Tuple(patterns) => match value {
            Value::Tuple(items) => match_all(patterns, items, env, binds),
            _ => Ok(false),
        },
        Pattern::List(patterns) => match value {
            Value::List(items) => match_all(patterns, items, env, binds),
            _ => Ok(false),
        },
        Pattern::Cons(head, tail) => match value {
            Value::List(items) if !items.is_empty() => {
                if !match_pattern(head, &items[0], env, binds)? {
                    return Ok(false);
                }
                match_pattern(tail, &Value::List(items[1..].to_vec()), env, binds)
            }
            _ => Ok(false),
        },
        Pattern::Map(entries) => match value {
            Value::Map(pairs) => {
                for (key, sub) in entries {
                    let key = lit_value(key);
                    let Some((_, found)) = pairs.iter().find(|(k, _)| *k == key) else {
                        return Ok(false);
                    };
                    if !match_pattern(sub, found, env, binds)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        },
        Pattern::Struct { name, fields } => match value {
            Value::Map(pairs) => {
                let tag = (
                    Value::Atom("__struct__".to_owned()),
                    Value::Atom(name.clone()),
                );
                if !pairs.contains(&tag) {
                    return Ok(false);
                }
                for (field, sub) in fields {
                    let key = Value::Atom(field.clone());
                    let Some((_, found)) = pairs.iter().find(|(k, _)| *k == key) else {
                        return Ok(false);
                    };
                    if !match_pattern(sub, found, env, binds)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        },
        Pattern::Alias {
            pattern: inner,
            name,
        } => {
            if !match_pattern(inner, value, env, binds)? {
                return Ok(false);
            }
            binds.push((name.clone(), value.clone()));
            Ok(true)
        }
    }
}

fn match_all(
    patterns: &[Pattern],
    items: &[Value],
    env: &Environment<'_>,
    binds: &mut Vec<(String, Value)>,
) -> Result<bool, EvalError> {
    if patterns.len() != items.len() {
        return Ok(false);
    }
    for (pattern, item) in patterns.iter().zip(items) {
        if !match_pattern(pattern, item, env, binds)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn lit_value(lit: &Lit) -> Value {
    match lit {
        Lit::Int(n) => Value::Int(*n),
        Lit::Float(f) => Value::Float(*f),
        Lit::Bool(b) => Value::Bool(*b),
        Lit::Nil => Value::Nil,
        Lit::Atom(name) => Value::Atom(name.clone()),
        Lit::Str(text) => Value::Str(text.clone()),
    }
}

fn eval_binary(
    env: &mut Environment<'_>,
    op: BinOp,
    left: &Node,
    right: &Node,
) -> Result<Value, EvalError> {
    // `and`/`or` are boolean-strict on the left and short-circuit.
    if matches!(op, BinOp::And | BinOp::Or) {
        let Value::Bool(l) = eval(env, left)? else {
            return Err(EvalError::TypeError(format!(
                "{} expects a boolean left operand",
                op.symbol()
            )));
        };
        return match (op, l) {
            (BinOp::And, false) => Ok(Value::Bool(false)),
            (BinOp::Or, true) => Ok(Value::Bool(true)),
            _ => eval(env, right),
        };
    }

    let left = eval(env, left)?;
    let right = eval(env, right)?;
    use Value::*;
    match (op, left, right) {
        (BinOp::Add, Int(a), Int(b)) => Ok(Int(a.wrapping_add(b))),
        (BinOp::Sub, Int(a), Int(b)) => Ok(Int(a.wrapping_sub(b))),
        (BinOp::Mul, Int(a), Int(b)) => Ok(Int(a.wrapping_mul(b))),
        (BinOp::Add, a, b) => float_arith(a, b, |x, y| x + y),
        (BinOp::Sub, a, b) => float_arith(a, b, |x, y| x - y),
        (BinOp::Mul, a, b) => float_arith(a, b, |x, y| x * y),
        (BinOp::Div, Int(_), Int(0)) | (BinOp::Rem, Int(_), Int(0)) => {
            Err(EvalError::DivisionByZero)
        }
        (BinOp::Div, Int(a), Int(b)) => Ok(Int(floor_div(a, b))),
        (BinOp::Rem, Int(a), Int(b)) => Ok(Int(a - floor_div(a, b) * b)),
        (BinOp::Div | BinOp::Rem, a, b) => Err(EvalError::TypeError(format!(
            "integer division over {a:?} and {b:?}"
        ))),
        (BinOp::Concat, Str(a), Str(b)) => Ok(Str(a + &b)),
        (BinOp::Concat, a, b) => Err(EvalError::TypeError(format!(
            "cannot concatenate {a:?} and {b:?}"
        ))),
        (BinOp::ListConcat, List(mut a), List(b)) => {
            a.extend(b);
            Ok(List(a))
        }
        (BinOp::ListConcat, a, b) => Err(EvalError::TypeError(format!(
            "cannot append {a:?} and {b:?}"
        ))),
        (BinOp::Eq, a, b) => Ok(Bool(a == b)),
        (BinOp::NotEq, a, b) => Ok(Bool(a != b)),
        (BinOp::Lt, a, b) => compare(a, b, |o| o.is_lt()),
        (BinOp::Le, a, b) => compare(a, b, |o| o.is_le()),
        (BinOp::Gt, a, b) => compare(a, b, |o| o.is_gt()),
        (BinOp::Ge, a, b) => compare(a, b, |o| o.is_ge()),
        (BinOp::And | BinOp::Or, ..) => unreachable!("handled above"),
    }
}

fn float_arith(a: Value, b: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    let (x, y) = match (&a, &b) {
        (Value::Int(a), Value::Float(b)) => (*a as f64, *b),
        (Value::Float(a), Value::Int(b)) => (*a, *b as f64),
        (Value::Float(a), Value::Float(b)) => (*a, *b),
        _ => {
            return Err(EvalError::TypeError(format!(
                "arithmetic over {a:?} and {b:?}"
            )));
        }
    };
    Ok(Value::Float(f(x, y)))
}

fn compare(a: Value, b: Value, f: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, EvalError> {
    let ordering = match (&a, &b) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| EvalError::TypeError("nan comparison".to_owned()))?,
        (Value::Int(a), Value::Float(b)) => (*a as f64)
            .partial_cmp(b)
            .ok_or_else(|| EvalError::TypeError("nan comparison".to_owned()))?,
        (Value::Float(a), Value::Int(b)) => a
            .partial_cmp(&(*b as f64))
            .ok_or_else(|| EvalError::TypeError("nan comparison".to_owned()))?,
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Atom(a), Value::Atom(b)) => a.cmp(b),
        _ => {
            return Err(EvalError::TypeError(format!(
                "cannot order {a:?} and {b:?}"
            )));
        }
    };
    Ok(Value::Bool(f(ordering)))
}

// Division truncates toward negative infinity.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q }
}

/// String form used by interpolation. Containers have no canonical string
/// form here, so interpolating one is a type error.
fn display_value(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Nil => Ok(String::new()),
        Value::Atom(name) => Ok(name.clone()),
        Value::Str(text) => Ok(text.clone()),
        other => Err(EvalError::TypeError(format!(
            "cannot interpolate {other:?}"
        ))),
    }
}
