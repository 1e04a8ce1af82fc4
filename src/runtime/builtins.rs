use std::rc::Rc;

use crate::lang::value::Value;

// ---------------------------------------------------------------------------
// Builtin Function Table
// ---------------------------------------------------------------------------

/// Error from a builtin function call; the VM turns it into a
/// `RuntimeError` verbatim.
#[derive(Debug, Clone)]
pub struct BuiltinError(pub String);

/// A builtin function: takes the call's argument values, returns an
/// optional result. `None` means "no value"; the VM pushes null for it.
pub type BuiltinFn = fn(&[Value]) -> Result<Option<Value>, BuiltinError>;

/// A host-implemented function registered in the process-wide table.
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// The builtin table. Order matters: user code reaches an entry through
/// its index, wired up when the root symbol table pre-defines each name.
pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

fn check_arity(name: &str, args: &[Value], want: usize) -> Result<(), BuiltinError> {
    if args.len() != want {
        return Err(BuiltinError(format!(
            "wrong number of arguments to `{}`: want={}, got={}",
            name,
            want,
            args.len()
        )));
    }
    Ok(())
}

fn builtin_len(args: &[Value]) -> Result<Option<Value>, BuiltinError> {
    check_arity("len", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Some(Value::Integer(s.len() as i64))),
        Value::Array(elements) => Ok(Some(Value::Integer(elements.len() as i64))),
        Value::Hash(pairs) => Ok(Some(Value::Integer(pairs.len() as i64))),
        other => Err(BuiltinError(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        ))),
    }
}

/// Prints each argument on its own line; produces no value.
fn builtin_puts(args: &[Value]) -> Result<Option<Value>, BuiltinError> {
    for arg in args {
        println!("{}", arg);
    }
    Ok(None)
}

fn builtin_first(args: &[Value]) -> Result<Option<Value>, BuiltinError> {
    check_arity("first", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(Some(elements.first().cloned().unwrap_or(Value::Null))),
        other => Err(BuiltinError(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_last(args: &[Value]) -> Result<Option<Value>, BuiltinError> {
    check_arity("last", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(Some(elements.last().cloned().unwrap_or(Value::Null))),
        other => Err(BuiltinError(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

/// All elements but the first, as a fresh array; null for an empty array.
fn builtin_rest(args: &[Value]) -> Result<Option<Value>, BuiltinError> {
    check_arity("rest", args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                return Ok(Some(Value::Null));
            }
            Ok(Some(Value::Array(Rc::new(elements[1..].to_vec()))))
        }
        other => Err(BuiltinError(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}

/// A copy of the array with the value appended; arrays are immutable.
fn builtin_push(args: &[Value]) -> Result<Option<Value>, BuiltinError> {
    check_arity("push", args, 2)?;
    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.as_ref().clone();
            extended.push(args[1].clone());
            Ok(Some(Value::Array(Rc::new(extended))))
        }
        other => Err(BuiltinError(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_name()
        ))),
    }
}
