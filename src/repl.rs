use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::compile::Compiler;
use crate::bytecode::disasm;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::lang::value::Value;
use crate::runtime::vm::{Vm, GLOBALS_SIZE};

const PROMPT: &str = ">> ";

/// The interactive loop.
///
/// Three pieces of state survive from line to line: the global symbol
/// table (with the builtins pre-defined), the constant pool, and the
/// globals array. `let x = 1;` on one line is visible on the next.
/// Every line runs the full pipeline and prints the value of its final
/// expression statement.
pub fn run() {
    println!("Habilis {}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for commands, :quit to exit\n");

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to initialize line editor: {}", e);
            return;
        }
    };

    let (mut symbol_table, mut constants) = Compiler::new().into_state();
    let mut globals = vec![Value::Null; GLOBALS_SIZE];
    let mut show_bytecode = false;

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            // Ctrl-C clears the line, Ctrl-D exits
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("error: {}", e);
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        if input.starts_with(':') {
            if !handle_command(input, &mut show_bytecode) {
                break;
            }
            continue;
        }

        let tokens = match Lexer::new(input).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("lexer error: {}", e);
                continue;
            }
        };

        let program = match Parser::new(tokens).parse() {
            Ok(program) => program,
            Err(e) => {
                eprintln!("parse error: {}", e);
                continue;
            }
        };

        // the compiler borrows the session state and hands it back,
        // whether or not the line compiled
        let mut compiler = Compiler::with_state(
            std::mem::take(&mut symbol_table),
            std::mem::take(&mut constants),
        );
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        let (table, pool) = compiler.into_state();
        symbol_table = table;
        constants = pool;

        if let Err(e) = compiled {
            eprintln!("{}", e);
            continue;
        }

        if show_bytecode {
            print!("{}", disasm::disassemble(&bytecode));
        }

        let mut machine = Vm::with_globals_store(bytecode, std::mem::take(&mut globals));
        match machine.run() {
            Ok(()) => println!("{}", machine.last_popped_stack_elem()),
            Err(e) => eprintln!("{}", e),
        }
        globals = machine.into_globals();
    }

    println!();
}

/// Returns false when the REPL should exit.
fn handle_command(command: &str, show_bytecode: &mut bool) -> bool {
    match command {
        ":help" | ":h" => {
            println!("Commands:");
            println!("  :help    :h   Show this help");
            println!("  :quit    :q   Exit the REPL");
            println!("  :bc           Toggle the per-line bytecode listing");
            true
        }
        ":quit" | ":q" => false,
        ":bc" => {
            *show_bytecode = !*show_bytecode;
            println!(
                "bytecode listing {}",
                if *show_bytecode { "on" } else { "off" }
            );
            true
        }
        _ => {
            println!(
                "unknown command: {}. Type :help for available commands.",
                command
            );
            true
        }
    }
}
