use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::op::Op;
use crate::runtime::builtins::Builtin;

/// Runtime value in the Habilis language.
///
/// Values are the only data that can live on the VM's operand stack and in
/// the globals array. Heap-allocated variants use `Rc` for cheap clones on
/// stack operations; compiled functions and strings are immutable and may
/// be shared freely.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),

    /// Immutable string.
    Str(Rc<str>),

    /// Boolean value.
    Bool(bool),

    /// The null value.
    Null,

    /// Array literal value: `[1, 2, 3]`.
    Array(Rc<Vec<Value>>),

    /// Hash literal value: `{"k": 1}`. Keys are always strings.
    Hash(Rc<HashMap<String, Value>>),

    /// A compiled function, as stored in the constant pool. Never
    /// executed directly; the VM always enters it through a `Closure`.
    Function(Rc<CompiledFunction>),

    /// A compiled function paired with its captured free variables.
    Closure(Rc<Closure>),

    /// A host-implemented function, reachable by index.
    Builtin(&'static Builtin),
}

/// Instructions plus the frame-layout facts the VM needs to call it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<Op>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// Free variables are captured by value at closure-creation time;
/// mutating the outer binding afterwards does not affect the closure.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl Value {
    /// The value's type tag, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Str(_) => "STRING",
            Value::Bool(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }
}

impl std::fmt::Display for Value {
    /// Format a value the way the REPL inspects it.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                // Keys are sorted so the output is stable.
                let mut keys: Vec<&String> = pairs.keys().collect();
                keys.sort();

                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, pairs[*key])?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<fn/{}>", func.num_parameters),
            Value::Closure(closure) => write!(f, "<closure/{}>", closure.func.num_parameters),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
        }
    }
}
