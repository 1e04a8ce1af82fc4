use crate::bytecode::compile::ByteCode;
use crate::bytecode::op::Op;
use crate::lang::value::Value;

/// Render a bytecode bundle as a readable listing: the top-level program
/// first, then every compiled function in the constant pool.
pub fn disassemble(bytecode: &ByteCode) -> String {
    let mut out = String::new();

    print_code_object(&mut out, "main", &bytecode.instructions, &bytecode.constants);

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Value::Function(func) = constant {
            let label = format!(
                "fn @{} ({} params, {} locals)",
                index, func.num_parameters, func.num_locals
            );
            print_code_object(&mut out, &label, &func.instructions, &bytecode.constants);
        }
    }

    out
}

fn print_code_object(out: &mut String, name: &str, ops: &[Op], constants: &[Value]) {
    out.push_str("════════════════════════════════════════\n");
    out.push_str(&format!(" {}\n", name));
    out.push_str(&format!(" {} instructions\n", ops.len()));
    out.push_str("════════════════════════════════════════\n");
    disassemble_ops(out, ops, constants);
    out.push('\n');
}

fn disassemble_ops(out: &mut String, ops: &[Op], constants: &[Value]) {
    let jump_targets = collect_jump_targets(ops);

    for (ip, op) in ops.iter().enumerate() {
        if jump_targets.contains(&ip) {
            out.push_str("      ┌──────────────────────────────\n");
        }

        out.push_str(&format!("{:04} ", ip));

        if jump_targets.contains(&ip) {
            out.push_str("► ");
        } else {
            out.push_str("  ");
        }

        out.push_str(&format_op(op, constants));
        out.push('\n');
    }
}

fn collect_jump_targets(ops: &[Op]) -> Vec<usize> {
    let mut targets = Vec::new();

    for op in ops {
        if let Op::Jump(target) | Op::JumpIfFalse(target) = op {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
    }

    targets
}

fn format_op(op: &Op, constants: &[Value]) -> String {
    let mnemonic = op.mnemonic();

    match op {
        // operand plus the resolved constant, for readability
        Op::Constant(index) => match constants.get(*index) {
            Some(value) => format!("{:<12}{} ; {}", mnemonic, index, describe(value)),
            None => format!("{:<12}{}", mnemonic, index),
        },

        Op::Jump(target) | Op::JumpIfFalse(target) => {
            format!("{:<12}→ {:04}", mnemonic, target)
        }

        Op::SetGlobal(slot)
        | Op::GetGlobal(slot)
        | Op::SetLocal(slot)
        | Op::GetLocal(slot)
        | Op::GetFree(slot)
        | Op::GetBuiltin(slot) => format!("{:<12}{}", mnemonic, slot),

        Op::Array(count) | Op::Hash(count) | Op::Call(count) => {
            format!("{:<12}{}", mnemonic, count)
        }

        Op::Closure {
            const_index,
            free_count,
        } => format!("{:<12}@{} free={}", mnemonic, const_index, free_count),

        _ => mnemonic.to_string(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("\"{}\"", s),
        Value::Function(func) => format!("<fn/{}>", func.num_parameters),
        other => other.to_string(),
    }
}
