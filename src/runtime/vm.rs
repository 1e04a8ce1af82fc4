use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::compile::ByteCode;
use crate::bytecode::op::Op;
use crate::lang::value::{Closure, CompiledFunction, Value};
use crate::runtime::builtins::{Builtin, BUILTINS};
use crate::runtime::frame::Frame;
use crate::runtime::runtime_error::{
    calling_non_function, division_by_zero, frame_overflow, index_out_of_range, invalid_condition,
    invalid_subscript, invalid_unary, stack_overflow, unsupported_binary, unusable_hash_key,
    wrong_number_of_arguments, RuntimeError,
};

/// Operand stack capacity.
pub const STACK_SIZE: usize = 2048;
/// Global slot count; bounded to keep operands small.
pub const GLOBALS_SIZE: usize = 65536;
/// Frame stack capacity.
pub const MAX_FRAMES: usize = 1024;

/// Stack-based virtual machine.
///
/// Executes one `ByteCode` bundle over a preallocated operand stack and a
/// frame stack. Frame 0 is a synthetic closure wrapping the top-level
/// instructions; calls push further frames. The VM trusts the compiler to
/// produce well-formed bytecode and does not re-verify operands.
pub struct Vm {
    constants: Vec<Value>,

    stack: Vec<Value>,
    /// Next free stack slot. The stack is never read above `sp`, with one
    /// exception: `last_popped_stack_elem` looks at the slot just above.
    sp: usize,

    globals: Vec<Value>,

    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: ByteCode) -> Self {
        Vm::with_globals_store(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// A VM reusing an earlier run's globals (the REPL contract).
    pub fn with_globals_store(bytecode: ByteCode, globals: Vec<Value>) -> Self {
        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_fn,
            free: Vec::new(),
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_closure, 0));

        Vm {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Releases the globals array for the next run.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The value the last `Pop` discarded: the slot just above `sp`. The
    /// REPL prints this as the result of the line's final expression
    /// statement.
    pub fn last_popped_stack_elem(&self) -> Value {
        self.stack[self.sp].clone()
    }

    /// The fetch-decode-execute loop. Every iteration advances the
    /// current frame's instruction pointer, then dispatches; jumps store
    /// `target - 1` so the increment lands on the target.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let (op, base_pointer) = {
                let frame = match self.frames.last_mut() {
                    Some(frame) => frame,
                    None => break,
                };
                if frame.ip + 1 >= frame.instructions().len() as i64 {
                    break;
                }
                frame.ip += 1;
                let ip = frame.ip as usize;
                (frame.instructions()[ip], frame.base_pointer)
            };

            match op {
                Op::Constant(index) => {
                    let value = self.constants[index].clone();
                    self.push(value)?;
                }

                Op::True => self.push(Value::Bool(true))?,
                Op::False => self.push(Value::Bool(false))?,
                Op::Null => self.push(Value::Null)?,

                Op::Add
                | Op::Sub
                | Op::Mul
                | Op::Div
                | Op::Less
                | Op::LessEq
                | Op::Greater
                | Op::GreaterEq
                | Op::Equal
                | Op::NotEq
                | Op::And
                | Op::Or => self.execute_binary_operation(op)?,

                Op::NegInt => {
                    let operand = self.pop();
                    match operand {
                        Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg()))?,
                        other => return Err(invalid_unary("-", other.type_name())),
                    }
                }

                Op::NegBool => {
                    let operand = self.pop();
                    match operand {
                        Value::Bool(b) => self.push(Value::Bool(!b))?,
                        other => return Err(invalid_unary("!", other.type_name())),
                    }
                }

                Op::Jump(target) => self.set_ip(target as i64 - 1),

                Op::JumpIfFalse(target) => {
                    let condition = self.pop();
                    match condition {
                        Value::Bool(false) => self.set_ip(target as i64 - 1),
                        Value::Bool(true) => {}
                        other => return Err(invalid_condition(other.type_name())),
                    }
                }

                Op::SetGlobal(slot) => {
                    let value = self.pop();
                    self.globals[slot] = value;
                }

                Op::GetGlobal(slot) => {
                    let value = self.globals[slot].clone();
                    self.push(value)?;
                }

                Op::SetLocal(slot) => {
                    let value = self.pop();
                    self.stack[base_pointer + slot] = value;
                }

                Op::GetLocal(slot) => {
                    let value = self.stack[base_pointer + slot].clone();
                    self.push(value)?;
                }

                Op::GetFree(slot) => {
                    let value = match self.frames.last() {
                        Some(frame) => frame.closure().free[slot].clone(),
                        None => Value::Null,
                    };
                    self.push(value)?;
                }

                Op::GetBuiltin(index) => {
                    let builtin = &BUILTINS[index];
                    self.push(Value::Builtin(builtin))?;
                }

                Op::Array(count) => {
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Value::Array(Rc::new(elements)))?;
                }

                Op::Hash(count) => {
                    let base = self.sp - 2 * count;

                    let mut pairs = HashMap::with_capacity(count);
                    for chunk in self.stack[base..self.sp].chunks_exact(2) {
                        let value = chunk[0].clone();
                        let key = match &chunk[1] {
                            Value::Str(s) => s.to_string(),
                            other => return Err(unusable_hash_key(other.type_name())),
                        };
                        // duplicate keys: last write wins
                        pairs.insert(key, value);
                    }

                    self.sp = base;
                    self.push(Value::Hash(Rc::new(pairs)))?;
                }

                Op::Index => self.execute_index()?,

                Op::Call(argc) => self.execute_call(argc)?,

                Op::ReturnValue => {
                    let return_value = self.pop();
                    self.unwind_frame();
                    self.push(return_value)?;
                }

                Op::Return => {
                    self.unwind_frame();
                    self.push(Value::Null)?;
                }

                Op::Closure {
                    const_index,
                    free_count,
                } => self.push_closure(const_index, free_count)?,

                Op::Pop => {
                    self.pop();
                }
            }
        }

        Ok(())
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(stack_overflow());
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        // the slot keeps its value; see last_popped_stack_elem
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    fn set_ip(&mut self, ip: i64) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = ip;
        }
    }

    /// Pops the current frame and drops its locals region along with the
    /// callee value sitting below it.
    fn unwind_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.sp = frame.base_pointer.saturating_sub(1);
        }
    }

    fn execute_binary_operation(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => self.execute_integer_binary(op, *l, *r),
            (Value::Str(l), Value::Str(r)) => self.execute_string_binary(op, l, r),
            (Value::Bool(l), Value::Bool(r)) => self.execute_boolean_binary(op, *l, *r),
            _ => Err(unsupported_binary(left.type_name(), right.type_name())),
        }
    }

    /// Integer arithmetic wraps in 64-bit two's complement.
    fn execute_integer_binary(&mut self, op: Op, l: i64, r: i64) -> Result<(), RuntimeError> {
        let result = match op {
            Op::Add => Value::Integer(l.wrapping_add(r)),
            Op::Sub => Value::Integer(l.wrapping_sub(r)),
            Op::Mul => Value::Integer(l.wrapping_mul(r)),
            Op::Div => {
                if r == 0 {
                    return Err(division_by_zero());
                }
                Value::Integer(l.wrapping_div(r))
            }
            Op::Less => Value::Bool(l < r),
            Op::LessEq => Value::Bool(l <= r),
            Op::Greater => Value::Bool(l > r),
            Op::GreaterEq => Value::Bool(l >= r),
            Op::Equal => Value::Bool(l == r),
            Op::NotEq => Value::Bool(l != r),
            _ => return Err(unsupported_binary("INTEGER", "INTEGER")),
        };
        self.push(result)
    }

    /// Strings only concatenate.
    fn execute_string_binary(&mut self, op: Op, l: &str, r: &str) -> Result<(), RuntimeError> {
        match op {
            Op::Add => {
                let mut joined = String::with_capacity(l.len() + r.len());
                joined.push_str(l);
                joined.push_str(r);
                self.push(Value::Str(joined.into()))
            }
            _ => Err(unsupported_binary("STRING", "STRING")),
        }
    }

    fn execute_boolean_binary(&mut self, op: Op, l: bool, r: bool) -> Result<(), RuntimeError> {
        match op {
            Op::And => self.push(Value::Bool(l && r)),
            Op::Or => self.push(Value::Bool(l || r)),
            // comparisons coerce true -> 1, false -> 0 and reuse the
            // integer path
            Op::Less | Op::LessEq | Op::Greater | Op::GreaterEq | Op::Equal | Op::NotEq => {
                self.execute_integer_binary(op, l as i64, r as i64)
            }
            _ => Err(unsupported_binary("BOOLEAN", "BOOLEAN")),
        }
    }

    fn execute_index(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop();
        let collection = self.pop();

        match (&collection, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    return Err(index_out_of_range(*i));
                }
                let value = elements[*i as usize].clone();
                self.push(value)
            }

            (Value::Hash(pairs), Value::Str(key)) => {
                // a missing key is null, not an error
                let value = pairs.get(key.as_ref()).cloned().unwrap_or(Value::Null);
                self.push(value)
            }

            (Value::Str(s), Value::Integer(i)) => {
                // byte-wise; a hit yields a one-byte string
                let bytes = s.as_bytes();
                if *i < 0 || *i as usize >= bytes.len() {
                    return Err(index_out_of_range(*i));
                }
                let byte = bytes[*i as usize] as char;
                self.push(Value::Str(byte.to_string().into()))
            }

            _ => Err(invalid_subscript(
                collection.type_name(),
                index.type_name(),
            )),
        }
    }

    fn execute_call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        // the callee was pushed before its arguments
        let callee = self.stack[self.sp - 1 - argc].clone();

        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Builtin(builtin) => self.call_builtin(builtin, argc),
            other => Err(calling_non_function(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> Result<(), RuntimeError> {
        if argc != closure.func.num_parameters {
            return Err(wrong_number_of_arguments(closure.func.num_parameters, argc));
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(frame_overflow());
        }

        // arguments already occupy local slots 0..argc; the rest of the
        // locals region is reserved by bumping sp
        let base_pointer = self.sp - argc;
        let reserved_sp = base_pointer + closure.func.num_locals;
        if reserved_sp > STACK_SIZE {
            return Err(stack_overflow());
        }

        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = reserved_sp;

        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static Builtin, argc: usize) -> Result<(), RuntimeError> {
        let args = self.stack[self.sp - argc..self.sp].to_vec();
        self.sp = self.sp - argc - 1;

        let result = (builtin.func)(&args).map_err(|e| RuntimeError::new(e.0))?;
        self.push(result.unwrap_or(Value::Null))
    }

    fn push_closure(&mut self, const_index: usize, free_count: usize) -> Result<(), RuntimeError> {
        let constant = self.constants[const_index].clone();
        let function = match constant {
            Value::Function(func) => func,
            other => {
                return Err(RuntimeError::new(format!(
                    "not a function: {}",
                    other.type_name()
                )))
            }
        };

        let free = self.stack[self.sp - free_count..self.sp].to_vec();
        self.sp -= free_count;

        self.push(Value::Closure(Rc::new(Closure {
            func: function,
            free,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;

    /// Run Habilis source and return the value of its final expression
    /// statement.
    fn run(source: &str) -> Result<Value, RuntimeError> {
        let tokens = Lexer::new(source)
            .tokenize()
            .map_err(|e| RuntimeError::new(format!("lexer error: {}", e)))?;
        let program = Parser::new(tokens)
            .parse()
            .map_err(|e| RuntimeError::new(format!("parser error: {}", e)))?;

        let mut compiler = Compiler::new();
        compiler
            .compile(&program)
            .map_err(|e| RuntimeError::new(e.to_string()))?;

        let mut vm = Vm::new(compiler.bytecode());
        vm.run()?;
        Ok(vm.last_popped_stack_elem())
    }

    fn assert_result(source: &str, expected: Value) {
        let result = run(source).expect("execution should succeed");
        assert_eq!(result, expected, "source: {}", source);
    }

    fn assert_error(source: &str, contains: &str) {
        match run(source) {
            Ok(value) => panic!("expected error '{}', got value: {:?}", contains, value),
            Err(e) => assert!(
                e.message.contains(contains),
                "expected '{}' in error, got: {} (source: {})",
                contains,
                e.message,
                source
            ),
        }
    }

    // Shorthand constructors
    fn int(n: i64) -> Value {
        Value::Integer(n)
    }
    fn string(s: &str) -> Value {
        Value::Str(s.into())
    }
    fn boolean(b: bool) -> Value {
        Value::Bool(b)
    }
    fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(elements))
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    #[test]
    fn test_integer_arithmetic() {
        assert_result("1;", int(1));
        assert_result("1 + 2;", int(3));
        assert_result("1 - 2;", int(-1));
        assert_result("2 * 2 * 2;", int(8));
        assert_result("50 / 2 * 2 + 10 - 5;", int(55));
        assert_result("5 * (2 + 10);", int(60));
        assert_result("-5 + 10;", int(5));
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_result("9223372036854775807 + 1;", int(i64::MIN));
        assert_result("0 - 9223372036854775807 - 1 - 1;", int(i64::MAX));
    }

    #[test]
    fn test_division_by_zero() {
        assert_error("1 / 0;", "division by zero");
        assert_error("1 / (5 - 5);", "division by zero");
    }

    // =========================================================================
    // Booleans, comparisons, logic
    // =========================================================================

    #[test]
    fn test_comparisons() {
        assert_result("1 < 2;", boolean(true));
        assert_result("1 > 2;", boolean(false));
        assert_result("1 <= 1;", boolean(true));
        assert_result("2 >= 3;", boolean(false));
        assert_result("1 == 1;", boolean(true));
        assert_result("1 != 1;", boolean(false));
    }

    #[test]
    fn test_boolean_comparison_coerces_to_integers() {
        assert_result("true == true;", boolean(true));
        assert_result("true != false;", boolean(true));
        assert_result("false < true;", boolean(true));
        assert_result("(1 < 2) == true;", boolean(true));
    }

    #[test]
    fn test_logic_connectives() {
        assert_result("true && true;", boolean(true));
        assert_result("true && false;", boolean(false));
        assert_result("false || true;", boolean(true));
        assert_result("false || false;", boolean(false));
    }

    #[test]
    fn test_logic_is_not_short_circuiting() {
        // both operands run before the connective does
        assert_error("false && 1 / 0 == 0;", "division by zero");
        assert_error("true || 1 / 0 == 0;", "division by zero");
    }

    #[test]
    fn test_unary_operators() {
        assert_result("-5;", int(-5));
        assert_result("!true;", boolean(false));
        assert_result("!!true;", boolean(true));
    }

    #[test]
    fn test_binary_type_errors() {
        assert_error("5 + true;", "unsupported types for binary operation");
        assert_error("1 && 2;", "unsupported types for binary operation");
        assert_error("true + false;", "unsupported types for binary operation");
        assert_error(r#""a" < "b";"#, "unsupported types for binary operation");
        assert_error("null == null;", "unsupported types for binary operation");
    }

    #[test]
    fn test_unary_type_errors() {
        assert_error("-true;", "invalid type for unary -");
        assert_error("!5;", "invalid type for unary !");
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    #[test]
    fn test_conditionals() {
        assert_result("if (true) { 10 };", int(10));
        assert_result("if (false) { 10 };", Value::Null);
        assert_result("if (1 < 2) { 10 } else { 20 };", int(10));
        assert_result("if (1 > 2) { 10 } else { 20 };", int(20));
        assert_result(r#"if (1 < 2) { "yes" } else { "no" };"#, string("yes"));
    }

    #[test]
    fn test_conditionals_nest() {
        assert_result(
            "if (true) { if (false) { 1 } else { 2 } } else { 3 };",
            int(2),
        );
    }

    #[test]
    fn test_condition_must_be_boolean() {
        assert_error("if (1) { 10 };", "unsupported type for condition: INTEGER");
        assert_error(
            r#"if ("yes") { 10 };"#,
            "unsupported type for condition: STRING",
        );
    }

    #[test]
    fn test_conditional_value_feeds_expressions() {
        assert_result("if (true) { 10 } + 5;", int(15));
    }

    // =========================================================================
    // Globals
    // =========================================================================

    #[test]
    fn test_global_let_statements() {
        assert_result("let a = 5; a;", int(5));
        assert_result("let a = 5; let b = 10; a + b;", int(15));
        assert_result("let a = 5; let b = a + a; a + b;", int(15));
    }

    #[test]
    fn test_shadowing_rebinds() {
        assert_result("let a = 5; let a = a + 1; a;", int(6));
    }

    #[test]
    fn test_globals_survive_across_runs() {
        // first line
        let tokens = Lexer::new("let x = 41;").tokenize().expect("lex");
        let program = Parser::new(tokens).parse().expect("parse");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("run");
        let globals = vm.into_globals();
        let (symbols, constants) = compiler.into_state();

        // second line reuses symbols, constants and globals
        let tokens = Lexer::new("x + 1;").tokenize().expect("lex");
        let program = Parser::new(tokens).parse().expect("parse");
        let mut compiler = Compiler::with_state(symbols, constants);
        compiler.compile(&program).expect("compile");
        let mut vm = Vm::with_globals_store(compiler.bytecode(), globals);
        vm.run().expect("run");

        assert_eq!(vm.last_popped_stack_elem(), int(42));
    }

    // =========================================================================
    // Strings
    // =========================================================================

    #[test]
    fn test_string_concatenation() {
        assert_result(r#""hab" + "ilis";"#, string("habilis"));
        assert_result(r#""a" + "b" + "c";"#, string("abc"));
    }

    #[test]
    fn test_string_indexing_is_bytewise() {
        assert_result(r#""abc"[0];"#, string("a"));
        assert_result(r#""abc"[2];"#, string("c"));
        assert_error(r#""abc"[3];"#, "index out of range");
        assert_error(r#""abc"[0 - 1];"#, "index out of range");
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    #[test]
    fn test_array_literals() {
        assert_result("[];", array(vec![]));
        assert_result("[1, 2, 3];", array(vec![int(1), int(2), int(3)]));
        assert_result(
            "[1 + 2, 3 * 4, 5 + 6];",
            array(vec![int(3), int(12), int(11)]),
        );
    }

    #[test]
    fn test_array_indexing() {
        assert_result("let xs = [10, 20, 30]; xs[1];", int(20));
        assert_result("[1, 2, 3][0 + 2];", int(3));
        assert_result("[[1, 1, 1]][0][0];", int(1));
    }

    #[test]
    fn test_array_index_out_of_range() {
        assert_error("[1, 2, 3][3];", "index out of range: 3");
        assert_error("[1][0 - 1];", "index out of range: -1");
        assert_error("[][0];", "index out of range: 0");
    }

    #[test]
    fn test_subscript_type_errors() {
        assert_error(r#"[1]["a"];"#, "invalid subscript type");
        assert_error(r#"{"a": 1}[0];"#, "invalid subscript type");
        assert_error("5[0];", "invalid subscript type");
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    #[test]
    fn test_hash_literals_and_lookup() {
        assert_result(r#"{"k": 1}["k"];"#, int(1));
        assert_result(r#"let h = {"one": 1, "two": 2}; h["two"];"#, int(2));
        assert_result(r#"{"a": 1 + 1}["a"];"#, int(2));
    }

    #[test]
    fn test_hash_miss_is_null() {
        assert_result(r#"{"k": 1}["missing"];"#, Value::Null);
        assert_result("{}[\"anything\"];", Value::Null);
    }

    #[test]
    fn test_hash_miss_then_arithmetic_is_type_error() {
        assert_error(
            r#"let h = {"k": 1}; h["k"] + h["missing"];"#,
            "unsupported types for binary operation",
        );
    }

    #[test]
    fn test_hash_duplicate_keys_last_write_wins() {
        assert_result(r#"{"k": 1, "k": 2}["k"];"#, int(2));
    }

    #[test]
    fn test_hash_keys_must_be_strings() {
        assert_error("{1: 2};", "unusable as hash key: INTEGER");
        assert_error("{true: 2};", "unusable as hash key: BOOLEAN");
    }

    // =========================================================================
    // Functions and calls
    // =========================================================================

    #[test]
    fn test_function_calls() {
        assert_result("let f = fn(x) { x * x }; f(6);", int(36));
        assert_result("let f = fn() { 5 + 10 }; f();", int(15));
        assert_result("fn() { 1 }();", int(1));
    }

    #[test]
    fn test_explicit_and_implicit_returns() {
        assert_result("let f = fn() { return 99; 100; }; f();", int(99));
        assert_result("let f = fn() { 99; 100 }; f();", int(100));
        assert_result("let f = fn() { }; f();", Value::Null);
    }

    #[test]
    fn test_first_class_functions() {
        assert_result("let a = fn() { 1 }; let b = fn() { a() + 1 }; b();", int(2));
        assert_result(
            "let apply = fn(f, x) { f(x) }; apply(fn(n) { n * 2 }, 21);",
            int(42),
        );
    }

    #[test]
    fn test_local_bindings() {
        assert_result("let f = fn() { let one = 1; let two = 2; one + two }; f();", int(3));
        assert_result(
            "let g = fn() { let n = 50; n }; let h = fn() { let n = 100; n }; g() + h();",
            int(150),
        );
    }

    #[test]
    fn test_arguments_are_locals() {
        assert_result("let identity = fn(a) { a }; identity(4);", int(4));
        assert_result("let sum = fn(a, b) { a + b }; sum(1, 2);", int(3));
        assert_result(
            "let sum = fn(a, b) { let c = a + b; c }; sum(1, 2) + sum(3, 4);",
            int(10),
        );
    }

    #[test]
    fn test_wrong_number_of_arguments() {
        assert_error("fn() { 1 }(1);", "wrong number of arguments: want=0, got=1");
        assert_error(
            "fn(a, b) { a + b }(1);",
            "wrong number of arguments: want=2, got=1",
        );
    }

    #[test]
    fn test_calling_non_function() {
        assert_error("1(2);", "calling non-function: INTEGER");
        assert_error("let x = 5; x();", "calling non-function: INTEGER");
        assert_error(r#""str"();"#, "calling non-function: STRING");
    }

    // =========================================================================
    // Closures
    // =========================================================================

    #[test]
    fn test_closures_capture_parameters() {
        assert_result(
            "let newAdder = fn(a) { fn(b) { a + b } }; let add2 = newAdder(2); add2(40);",
            int(42),
        );
    }

    #[test]
    fn test_closures_capture_locals() {
        assert_result(
            "let make = fn() { let n = 7; fn() { n } }; let get = make(); get();",
            int(7),
        );
    }

    #[test]
    fn test_closures_capture_through_scopes() {
        assert_result(
            "let f = fn(a) { fn(b) { fn(c) { a + b + c } } }; f(1)(2)(3);",
            int(6),
        );
    }

    #[test]
    fn test_closure_over_local_and_parameters() {
        assert_result(
            "let newAdderPlus = fn(a, b) { let c = a + b; fn(d) { c + d } };
             let adder = newAdderPlus(1, 2);
             adder(8);",
            int(11),
        );
    }

    #[test]
    fn test_closures_capture_by_value() {
        // the captured slot is snapshotted when the closure is built;
        // each call of `make` re-captures independently
        assert_result(
            "let make = fn(n) { fn() { n } };
             let one = make(1);
             let two = make(2);
             one() + two();",
            int(3),
        );
    }

    // =========================================================================
    // Builtins
    // =========================================================================

    #[test]
    fn test_builtin_len() {
        assert_result(r#"len("hello");"#, int(5));
        assert_result(r#"len("");"#, int(0));
        assert_result("len([1, 2, 3]);", int(3));
        assert_result(r#"len({"a": 1});"#, int(1));
    }

    #[test]
    fn test_builtin_errors() {
        assert_error("len(1);", "argument to `len` not supported");
        assert_error(r#"len("a", "b");"#, "wrong number of arguments");
        assert_error("first(1);", "must be ARRAY");
    }

    #[test]
    fn test_builtin_array_helpers() {
        assert_result("first([1, 2]);", int(1));
        assert_result("last([1, 2]);", int(2));
        assert_result("rest([1, 2, 3]);", array(vec![int(2), int(3)]));
        assert_result("push([1], 2);", array(vec![int(1), int(2)]));
        assert_result("first([]);", Value::Null);
    }

    #[test]
    fn test_builtin_without_result_pushes_null() {
        assert_result("puts(1);", Value::Null);
    }

    #[test]
    fn test_builtins_are_first_class() {
        assert_result("let measure = len; measure([1, 2]);", int(2));
    }

    // =========================================================================
    // Resource limits
    // =========================================================================

    #[test]
    fn test_frame_overflow() {
        // self-application recurses until the frame stack is exhausted
        assert_error("let f = fn(g) { g(g) }; f(f);", "frame overflow");
    }

    #[test]
    fn test_stack_overflow() {
        // crafted bytecode that pushes past the operand stack capacity
        let bytecode = ByteCode {
            instructions: vec![Op::True; STACK_SIZE + 1],
            constants: vec![],
        };
        let mut vm = Vm::new(bytecode);
        let err = vm.run().unwrap_err();
        assert_eq!(err.message, "stack overflow");
    }

    // =========================================================================
    // Stack discipline
    // =========================================================================

    #[test]
    fn test_last_popped_tracks_final_statement() {
        assert_result("1; 2; 3;", int(3));
        assert_result("let a = 1; a; a + 1;", int(2));
    }

    #[test]
    fn test_stack_is_drained_after_run() {
        let sources = [
            "1 + 2;",
            "let a = 5; a * a;",
            "if (1 < 2) { 10 } else { 20 };",
            "let f = fn(x) { x + 1 }; f(1); f(2);",
            "[1, 2, 3][0]; {\"k\": 1}[\"k\"];",
        ];

        for source in sources {
            let tokens = Lexer::new(source).tokenize().expect("lex");
            let program = Parser::new(tokens).parse().expect("parse");
            let mut compiler = Compiler::new();
            compiler.compile(&program).expect("compile");

            let mut vm = Vm::new(compiler.bytecode());
            vm.run().expect("run");

            // every statement's value was popped; only the sentinel slot
            // above sp still holds the last one
            assert_eq!(vm.sp, 0, "source: {}", source);
        }
    }

    #[test]
    fn test_empty_program_yields_null() {
        assert_result("", Value::Null);
    }
}
