#[derive(Debug)]
pub struct RuntimeError {
    pub message: String,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
        }
    }
}

pub fn stack_overflow() -> RuntimeError {
    RuntimeError::new("stack overflow")
}

pub fn frame_overflow() -> RuntimeError {
    RuntimeError::new("frame overflow")
}

pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

pub fn index_out_of_range(index: i64) -> RuntimeError {
    RuntimeError::new(format!("index out of range: {}", index))
}

pub fn unsupported_binary(left: &str, right: &str) -> RuntimeError {
    RuntimeError::new(format!(
        "unsupported types for binary operation: {} {}",
        left, right
    ))
}

pub fn invalid_unary(op: &str, operand: &str) -> RuntimeError {
    RuntimeError::new(format!("invalid type for unary {}: {}", op, operand))
}

pub fn invalid_subscript(collection: &str, index: &str) -> RuntimeError {
    RuntimeError::new(format!(
        "invalid subscript type: cannot index {} with {}",
        collection, index
    ))
}

pub fn invalid_condition(got: &str) -> RuntimeError {
    RuntimeError::new(format!("unsupported type for condition: {}", got))
}

pub fn calling_non_function(got: &str) -> RuntimeError {
    RuntimeError::new(format!("calling non-function: {}", got))
}

pub fn wrong_number_of_arguments(want: usize, got: usize) -> RuntimeError {
    RuntimeError::new(format!(
        "wrong number of arguments: want={}, got={}",
        want, got
    ))
}

pub fn unusable_hash_key(got: &str) -> RuntimeError {
    RuntimeError::new(format!("unusable as hash key: {}", got))
}
