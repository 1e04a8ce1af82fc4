use crate::bytecode::compile::ByteCode;
use crate::bytecode::op::Op;
use crate::lang::value::Value;

#[derive(Debug)]
pub struct CheckError {
    pub message: String,
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bytecode check error: {}", self.message)
    }
}

impl std::error::Error for CheckError {}

impl CheckError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returns (pops, pushes) for an op.
fn effect(op: &Op) -> (i32, i32) {
    use Op::*;
    match op {
        Constant(_) | True | False | Null => (0, 1),

        Add | Sub | Mul | Div => (2, 1),
        Less | LessEq | Greater | GreaterEq | Equal | NotEq => (2, 1),
        And | Or => (2, 1),
        NegInt | NegBool => (1, 1),

        Jump(_) => (0, 0),
        JumpIfFalse(_) => (1, 0),

        SetGlobal(_) | SetLocal(_) => (1, 0),
        GetGlobal(_) | GetLocal(_) | GetFree(_) | GetBuiltin(_) => (0, 1),

        Array(n) => (*n as i32, 1),
        Hash(n) => (2 * *n as i32, 1),
        Index => (2, 1),

        Call(argc) => (*argc as i32 + 1, 1),
        ReturnValue => (1, 0),
        Return => (0, 0),

        Closure { free_count, .. } => (*free_count as i32, 1),

        Pop => (1, 0),
    }
}

/// Validates one function's instruction list: every jump target must land
/// on an instruction of the same function, and a linear scan of stack
/// effects must never go below the starting height.
///
/// NOTE: the stack scan is a straight-line pass that doesn't follow jump
/// targets. It catches plain underflows but is not a full control-flow
/// analysis; the conditional-branch convention (both arms leave one
/// value) keeps it accurate for compiler output.
pub fn check_function(instructions: &[Op]) -> Result<(), CheckError> {
    for (ip, op) in instructions.iter().enumerate() {
        if let Op::Jump(target) | Op::JumpIfFalse(target) = op {
            if *target >= instructions.len() {
                return Err(CheckError::new(format!(
                    "jump at ip={} targets {} but the function ends at {}",
                    ip,
                    target,
                    instructions.len()
                )));
            }
        }
    }

    let mut height: i32 = 0;
    for (ip, op) in instructions.iter().enumerate() {
        let (pops, pushes) = effect(op);
        height -= pops;
        if height < 0 {
            return Err(CheckError::new(format!(
                "stack underflow at ip={}, op={:?}, needed {} items",
                ip, op, pops
            )));
        }
        height += pushes;

        // past a return the linear scan stops being meaningful
        if matches!(op, Op::ReturnValue | Op::Return) {
            break;
        }
    }

    Ok(())
}

/// Checks the top-level program and every compiled function in its
/// constant pool.
pub fn check_bytecode(bytecode: &ByteCode) -> Result<(), CheckError> {
    check_function(&bytecode.instructions)?;

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Value::Function(func) = constant {
            check_function(&func.instructions).map_err(|e| {
                CheckError::new(format!("in function constant {}: {}", index, e.message))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;

    fn compile(source: &str) -> ByteCode {
        let tokens = Lexer::new(source).tokenize().expect("lexing should succeed");
        let program = Parser::new(tokens)
            .parse()
            .expect("parsing should succeed");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compilation should succeed");
        compiler.bytecode()
    }

    #[test]
    fn test_simple_ops() {
        let ops = vec![Op::Constant(0), Op::Constant(1), Op::Add, Op::Pop];
        assert!(check_function(&ops).is_ok());
    }

    #[test]
    fn test_underflow() {
        let result = check_function(&[Op::Add]);
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains("underflow"));
    }

    #[test]
    fn test_jump_out_of_range() {
        let ops = vec![Op::True, Op::JumpIfFalse(9), Op::Null];
        let result = check_function(&ops);
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains("targets 9"));
    }

    #[test]
    fn test_call_effect_includes_callee() {
        // callee + 2 args collapse into one result
        let ops = vec![
            Op::GetBuiltin(0),
            Op::Constant(0),
            Op::Constant(1),
            Op::Call(2),
            Op::Pop,
        ];
        assert!(check_function(&ops).is_ok());

        // a call with nothing beneath it underflows
        assert!(check_function(&[Op::Call(0)]).is_err());
    }

    #[test]
    fn test_compiler_output_passes() {
        let sources = [
            "let a = 5; let b = 10; a + b;",
            r#"if (1 < 2) { "yes" } else { "no" };"#,
            "let f = fn(x) { x * x }; f(6);",
            "let newAdder = fn(a) { fn(b) { a + b } }; let add2 = newAdder(2); add2(40);",
            r#"let h = {"k": 1}; h["k"];"#,
            "let xs = [10, 20, 30]; xs[1];",
            "len([1, 2, 3]);",
        ];

        for source in sources {
            let bytecode = compile(source);
            check_bytecode(&bytecode)
                .unwrap_or_else(|e| panic!("{} failed the check: {}", source, e));
        }
    }
}
