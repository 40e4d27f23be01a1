//! Fragment evaluator
//!
//! Statements run one at a time against the live namespace store, so
//! bindings made before a fault persist (REPL partial-effect semantics).
//! All printed output lands in the `Capture` buffers, never on the process
//! streams.

use std::collections::BTreeMap;

use crate::engine::builtins;
use crate::namespace::NamespaceStore;
use crate::parser::ast::*;
use crate::runtime::{Fault, FuncValue, Value};

/// Recursion guard for user function calls.
const MAX_CALL_DEPTH: usize = 64;

/// Captured output streams for one fragment.
#[derive(Debug, Default)]
pub struct Capture {
    pub stdout: String,
    pub stderr: String,
}

/// Non-local exits during evaluation.
enum Signal {
    Fault(Fault),
    Return(Value),
}

type Exec<T> = std::result::Result<T, Signal>;

pub struct Interp<'a> {
    ns: &'a mut NamespaceStore,
    capture: &'a mut Capture,
    exec_no: u64,
    locals: Vec<BTreeMap<String, Value>>,
}

impl<'a> Interp<'a> {
    pub fn new(ns: &'a mut NamespaceStore, capture: &'a mut Capture, exec_no: u64) -> Self {
        Self {
            ns,
            capture,
            exec_no,
            locals: Vec::new(),
        }
    }

    /// Run a parsed fragment. The value of a trailing bare expression is
    /// returned; `return` outside a function is a fault.
    pub fn run(&mut self, program: &Program) -> Result<Option<Value>, Fault> {
        let mut last = None;
        let count = program.statements.len();
        for (i, stmt) in program.statements.iter().enumerate() {
            match self.exec_stmt(stmt) {
                Ok(value) => {
                    last = if i + 1 == count { value } else { None };
                }
                Err(Signal::Fault(fault)) => return Err(fault),
                Err(Signal::Return(_)) => {
                    return Err(Fault::new(
                        "SyntaxFault",
                        "'return' outside of a function",
                    ))
                }
            }
        }
        Ok(last)
    }

    /// Call a callable value directly. Used by the tool bridge so helper
    /// invocation goes through exactly the evaluator's calling convention.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Fault> {
        match self.call_value(callee.clone(), args) {
            Ok(v) => Ok(v),
            Err(Signal::Fault(f)) => Err(f),
            Err(Signal::Return(_)) => Err(Fault::new(
                "SyntaxFault",
                "'return' outside of a function",
            )),
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Exec<Option<Value>> {
        match stmt {
            Stmt::Assign(assign) => {
                let value = self.eval(&assign.value)?;
                self.bind(&assign.name, value);
                Ok(None)
            }
            Stmt::Expr(expr) => Ok(Some(self.eval(expr)?)),
            Stmt::FnDef(decl) => {
                let func = Value::Func(FuncValue {
                    decl: decl.clone(),
                    defined_in: self.exec_no,
                });
                self.bind(&decl.name, func);
                Ok(None)
            }
            Stmt::Raise(expr) => {
                let value = self.eval(expr)?;
                Err(Signal::Fault(Fault::raised(value.to_text())))
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(e)?,
                    None => Value::Null,
                };
                Err(Signal::Return(value))
            }
            Stmt::If(stmt) => {
                if self.eval(&stmt.condition)?.truthy() {
                    self.exec_body(&stmt.then_body)?;
                } else if let Some(else_body) = &stmt.else_body {
                    self.exec_body(else_body)?;
                }
                Ok(None)
            }
            Stmt::For(stmt) => {
                let iterable = self.eval(&stmt.iterable)?;
                let items = iteration_items(&iterable).map_err(Signal::Fault)?;
                for item in items {
                    self.bind(&stmt.var, item);
                    self.exec_body(&stmt.body)?;
                }
                Ok(None)
            }
        }
    }

    fn exec_body(&mut self, body: &[Stmt]) -> Exec<()> {
        for stmt in body {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn bind(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.locals.last_mut() {
            frame.insert(name.to_string(), value);
        } else {
            self.ns.set(name, value);
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        for frame in self.locals.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Some(v.clone());
            }
        }
        self.ns.get(name).cloned()
    }

    fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| Signal::Fault(Fault::name(name))),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(Value::List(out))
            }
            Expr::Map(entries) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    out.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Map(out))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(Signal::Fault(Fault::type_fault(format!(
                            "cannot negate '{}' value",
                            other.type_name()
                        )))),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Attr { object, name } => {
                let value = self.eval(object)?;
                self.read_attr(&value, name).map_err(Signal::Fault)
            }
            Expr::Index { object, index } => {
                let value = self.eval(object)?;
                let idx = self.eval(index)?;
                index_value(&value, &idx).map_err(Signal::Fault)
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Exec<Value> {
        // Short-circuit logic first.
        match op {
            BinaryOp::And => {
                let left = self.eval(lhs)?;
                if !left.truthy() {
                    return Ok(Value::Bool(false));
                }
                let right = self.eval(rhs)?;
                return Ok(Value::Bool(right.truthy()));
            }
            BinaryOp::Or => {
                let left = self.eval(lhs)?;
                if left.truthy() {
                    return Ok(Value::Bool(true));
                }
                let right = self.eval(rhs)?;
                return Ok(Value::Bool(right.truthy()));
            }
            _ => {}
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        binary_op(op, &left, &right).map_err(Signal::Fault)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Exec<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }

        match callee {
            // Method call: map fields holding callables win over builtin
            // methods, so user data can carry behavior.
            Expr::Attr { object, name } => {
                let recv = self.eval(object)?;
                if let Value::Map(entries) = &recv {
                    if let Some(field) = entries.get(name) {
                        if field.is_callable() {
                            return self.call_value(field.clone(), values);
                        }
                    }
                }
                builtins::call_method(&recv, name, &values).map_err(Signal::Fault)
            }
            Expr::Ident(name) => {
                if let Some(value) = self.lookup(name) {
                    return self.call_value(value, values);
                }
                match builtins::call_builtin(name, &values, self.capture) {
                    Some(result) => result.map_err(Signal::Fault),
                    None => Err(Signal::Fault(Fault::name(name))),
                }
            }
            other => {
                let value = self.eval(other)?;
                self.call_value(value, values)
            }
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Exec<Value> {
        match callee {
            Value::Func(func) => {
                if args.len() != func.decl.params.len() {
                    return Err(Signal::Fault(Fault::arity(
                        &func.decl.name,
                        func.decl.params.len(),
                        args.len(),
                    )));
                }
                if self.locals.len() >= MAX_CALL_DEPTH {
                    return Err(Signal::Fault(Fault::new(
                        "RecursionFault",
                        format!("call depth exceeded {}", MAX_CALL_DEPTH),
                    )));
                }

                let mut frame = BTreeMap::new();
                for (param, value) in func.decl.params.iter().zip(args) {
                    frame.insert(param.clone(), value);
                }
                self.locals.push(frame);

                let mut outcome = Ok(Value::Null);
                for stmt in &func.decl.body {
                    match self.exec_stmt(stmt) {
                        Ok(_) => {}
                        Err(Signal::Return(value)) => {
                            outcome = Ok(value);
                            break;
                        }
                        Err(Signal::Fault(fault)) => {
                            outcome = Err(Signal::Fault(fault));
                            break;
                        }
                    }
                }

                self.locals.pop();
                outcome
            }
            Value::Native(native) => native.call(&args).map_err(Signal::Fault),
            other => Err(Signal::Fault(Fault::type_fault(format!(
                "'{}' value is not callable",
                other.type_name()
            )))),
        }
    }

    fn read_attr(&self, value: &Value, name: &str) -> Result<Value, Fault> {
        if let Value::Map(entries) = value {
            if let Some(field) = entries.get(name) {
                return Ok(field.clone());
            }
        }
        builtins::get_property(value, name)
            .ok_or_else(|| Fault::attribute(value.type_name(), name))
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn iteration_items(value: &Value) -> Result<Vec<Value>, Fault> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Map(entries) => Ok(entries.keys().map(|k| Value::Str(k.clone())).collect()),
        other => Err(Fault::type_fault(format!(
            "'{}' value is not iterable",
            other.type_name()
        ))),
    }
}

fn index_value(value: &Value, idx: &Value) -> Result<Value, Fault> {
    match (value, idx) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let pos = if *i < 0 { len + i } else { *i };
            if pos < 0 || pos >= len {
                return Err(Fault::index(format!(
                    "list index {} out of range for length {}",
                    i, len
                )));
            }
            Ok(items[pos as usize].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let pos = if *i < 0 { len + i } else { *i };
            if pos < 0 || pos >= len {
                return Err(Fault::index(format!(
                    "string index {} out of range for length {}",
                    i, len
                )));
            }
            Ok(Value::Str(chars[pos as usize].to_string()))
        }
        (Value::Map(entries), Value::Str(key)) => entries
            .get(key)
            .cloned()
            .ok_or_else(|| Fault::index(format!("map has no key {:?}", key))),
        (container, index) => Err(Fault::type_fault(format!(
            "cannot index '{}' value with '{}'",
            container.type_name(),
            index.type_name()
        ))),
    }
}

fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Fault> {
    use BinaryOp::*;

    match op {
        Eq => return Ok(Value::Bool(left == right)),
        Ne => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b),
        (Value::Int(a), Value::Float(b)) => float_op(op, *a as f64, *b),
        (Value::Float(a), Value::Int(b)) => float_op(op, *a, *b as f64),
        (Value::Float(a), Value::Float(b)) => float_op(op, *a, *b),
        (Value::Str(a), Value::Str(b)) => match op {
            Add => Ok(Value::Str(format!("{}{}", a, b))),
            Lt => Ok(Value::Bool(a < b)),
            Le => Ok(Value::Bool(a <= b)),
            Gt => Ok(Value::Bool(a > b)),
            Ge => Ok(Value::Bool(a >= b)),
            _ => Err(type_mismatch(op, left, right)),
        },
        (Value::List(a), Value::List(b)) => match op {
            Add => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(Value::List(out))
            }
            _ => Err(type_mismatch(op, left, right)),
        },
        _ => Err(type_mismatch(op, left, right)),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, Fault> {
    use BinaryOp::*;
    match op {
        Add => Ok(Value::Int(a.wrapping_add(b))),
        Sub => Ok(Value::Int(a.wrapping_sub(b))),
        Mul => Ok(Value::Int(a.wrapping_mul(b))),
        Div => {
            if b == 0 {
                Err(Fault::new("ZeroDivisionFault", "division by zero"))
            } else {
                Ok(Value::Float(a as f64 / b as f64))
            }
        }
        Rem => {
            if b == 0 {
                Err(Fault::new("ZeroDivisionFault", "modulo by zero"))
            } else {
                Ok(Value::Int(a % b))
            }
        }
        Lt => Ok(Value::Bool(a < b)),
        Le => Ok(Value::Bool(a <= b)),
        Gt => Ok(Value::Bool(a > b)),
        Ge => Ok(Value::Bool(a >= b)),
        _ => Err(Fault::type_fault(format!("unsupported int operation '{}'", op))),
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, Fault> {
    use BinaryOp::*;
    match op {
        Add => Ok(Value::Float(a + b)),
        Sub => Ok(Value::Float(a - b)),
        Mul => Ok(Value::Float(a * b)),
        Div => {
            if b == 0.0 {
                Err(Fault::new("ZeroDivisionFault", "division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        Rem => Ok(Value::Float(a % b)),
        Lt => Ok(Value::Bool(a < b)),
        Le => Ok(Value::Bool(a <= b)),
        Gt => Ok(Value::Bool(a > b)),
        Ge => Ok(Value::Bool(a >= b)),
        _ => Err(Fault::type_fault(format!(
            "unsupported float operation '{}'",
            op
        ))),
    }
}

fn type_mismatch(op: BinaryOp, left: &Value, right: &Value) -> Fault {
    Fault::type_fault(format!(
        "unsupported operand types for '{}': '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn eval_fragment(ns: &mut NamespaceStore, code: &str) -> Result<Option<Value>, Fault> {
        let program = parse_program(code).expect("fragment should parse");
        let mut capture = Capture::default();
        Interp::new(ns, &mut capture, 1).run(&program)
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let mut ns = NamespaceStore::new();
        let result = eval_fragment(&mut ns, "1 + 2 * 3").unwrap();
        assert_eq!(result, Some(Value::Int(7)));
    }

    #[test]
    fn test_assignment_persists_in_namespace() {
        let mut ns = NamespaceStore::new();
        eval_fragment(&mut ns, "x = 1").unwrap();
        assert_eq!(ns.get("x"), Some(&Value::Int(1)));
        let result = eval_fragment(&mut ns, "x + 1").unwrap();
        assert_eq!(result, Some(Value::Int(2)));
    }

    #[test]
    fn test_partial_effect_before_fault() {
        let mut ns = NamespaceStore::new();
        let fault = eval_fragment(&mut ns, "y = 2; raise \"boom\"").unwrap_err();
        assert_eq!(fault.kind, "RaisedFault");
        assert_eq!(fault.message, "boom");
        assert_eq!(ns.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unbound_name_fault() {
        let mut ns = NamespaceStore::new();
        let fault = eval_fragment(&mut ns, "nope + 1").unwrap_err();
        assert_eq!(fault.kind, "NameFault");
    }

    #[test]
    fn test_function_call_and_locals() {
        let mut ns = NamespaceStore::new();
        eval_fragment(&mut ns, "fn double(n) { return n * 2 }").unwrap();
        let result = eval_fragment(&mut ns, "double(21)").unwrap();
        assert_eq!(result, Some(Value::Int(42)));
        // Parameters do not leak into the namespace.
        assert!(ns.get("n").is_none());
    }

    #[test]
    fn test_function_without_return_yields_null() {
        let mut ns = NamespaceStore::new();
        eval_fragment(&mut ns, "fn noop() { x = 1 }").unwrap();
        let result = eval_fragment(&mut ns, "noop()").unwrap();
        assert_eq!(result, Some(Value::Null));
    }

    #[test]
    fn test_return_outside_function_faults() {
        let mut ns = NamespaceStore::new();
        let fault = eval_fragment(&mut ns, "return 1").unwrap_err();
        assert_eq!(fault.kind, "SyntaxFault");
    }

    #[test]
    fn test_if_else_and_for() {
        let mut ns = NamespaceStore::new();
        eval_fragment(
            &mut ns,
            "total = 0\nfor n in range(5) { if n % 2 == 0 { total = total + n } }",
        )
        .unwrap();
        assert_eq!(ns.get("total"), Some(&Value::Int(6)));
    }

    #[test]
    fn test_print_goes_to_capture() {
        let mut ns = NamespaceStore::new();
        let program = parse_program("print(\"hello\", 1 + 1)").unwrap();
        let mut capture = Capture::default();
        Interp::new(&mut ns, &mut capture, 1).run(&program).unwrap();
        assert_eq!(capture.stdout, "hello 2\n");
    }

    #[test]
    fn test_division_semantics() {
        let mut ns = NamespaceStore::new();
        assert_eq!(
            eval_fragment(&mut ns, "7 / 2").unwrap(),
            Some(Value::Float(3.5))
        );
        assert_eq!(
            eval_fragment(&mut ns, "7 % 2").unwrap(),
            Some(Value::Int(1))
        );
        let fault = eval_fragment(&mut ns, "1 / 0").unwrap_err();
        assert_eq!(fault.kind, "ZeroDivisionFault");
    }

    #[test]
    fn test_indexing() {
        let mut ns = NamespaceStore::new();
        eval_fragment(&mut ns, "xs = [10, 20, 30]; m = {\"a\": 1}").unwrap();
        assert_eq!(
            eval_fragment(&mut ns, "xs[-1]").unwrap(),
            Some(Value::Int(30))
        );
        assert_eq!(
            eval_fragment(&mut ns, "m[\"a\"]").unwrap(),
            Some(Value::Int(1))
        );
        let fault = eval_fragment(&mut ns, "xs[3]").unwrap_err();
        assert_eq!(fault.kind, "IndexFault");
    }

    #[test]
    fn test_attribute_and_property_access() {
        let mut ns = NamespaceStore::new();
        eval_fragment(&mut ns, "m = {\"host\": \"db1\"}").unwrap();
        assert_eq!(
            eval_fragment(&mut ns, "m.host").unwrap(),
            Some(Value::Str("db1".to_string()))
        );
        assert_eq!(
            eval_fragment(&mut ns, "\"abc\".len").unwrap(),
            Some(Value::Int(3))
        );
        let fault = eval_fragment(&mut ns, "m.missing").unwrap_err();
        assert_eq!(fault.kind, "AttributeFault");
    }

    #[test]
    fn test_recursion_guard() {
        let mut ns = NamespaceStore::new();
        eval_fragment(&mut ns, "fn loop_forever(n) { return loop_forever(n) }").unwrap();
        let fault = eval_fragment(&mut ns, "loop_forever(1)").unwrap_err();
        assert_eq!(fault.kind, "RecursionFault");
    }

    #[test]
    fn test_short_circuit() {
        let mut ns = NamespaceStore::new();
        // Right side would fault if evaluated.
        let result = eval_fragment(&mut ns, "false and missing_name").unwrap();
        assert_eq!(result, Some(Value::Bool(false)));
        let result = eval_fragment(&mut ns, "true or missing_name").unwrap();
        assert_eq!(result, Some(Value::Bool(true)));
    }
}
