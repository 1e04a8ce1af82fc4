mod bytecode;
mod frontend;
mod lang;
mod repl;
mod runtime;

use std::{env, fs, path::Path, process};

use crate::bytecode::check;
use crate::bytecode::compile::{ByteCode, Compiler};
use crate::bytecode::disasm;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::token_dumper::TokenDumper;
use crate::lang::ast::Program;
use crate::runtime::vm::Vm;

fn main() {
    let args: Vec<String> = env::args().collect();

    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let ast = args.contains(&"--ast".to_string());
    let ast_json = args.contains(&"--ast-json".to_string());
    let bytecode = args.contains(&"--bc".to_string()) || args.contains(&"--bytecode".to_string());
    let want_repl = args.contains(&"--repl".to_string()) || args.contains(&"-i".to_string());

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return;
    }

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) if !want_repl => {
            ensure_extension(filename);
            match fs::read_to_string(filename) {
                Ok(source) => {
                    if tokens_only {
                        dump_tokens(&source, no_color);
                    } else if ast || ast_json {
                        dump_ast(&source, ast_json);
                    } else if bytecode {
                        dump_bytecode(&source);
                    } else {
                        run_program(&source);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    process::exit(1);
                }
            }
        }
        _ => repl::run(),
    }
}

fn print_usage() {
    println!("HABILIS - Bytecode-compiled expression language");
    println!();
    println!("Usage:");
    println!("  habilis                    Start interactive REPL");
    println!("  habilis <file.hab>         Run a program");
    println!("  habilis --repl, -i         Start interactive REPL");
    println!("  habilis --tokens <file>    Show tokens only (--no-color to disable ANSI)");
    println!("  habilis --ast <file>       Show the parsed AST");
    println!("  habilis --ast-json <file>  Show the parsed AST as JSON");
    println!("  habilis --bc <file.hab>    Show the compiled bytecode listing");
    println!("  habilis --help, -h         Show this help");
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("hab") {
        eprintln!("Error: expected a .hab file, got {}", filename);
        process::exit(1);
    }
}

fn dump_tokens(source: &str, no_color: bool) {
    let mut lexer = Lexer::new(source);

    match lexer.tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("lexer error: {}", e);
            process::exit(1);
        }
    }
}

fn dump_ast(source: &str, as_json: bool) {
    let program = parse_or_exit(source);

    if as_json {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("failed to serialize AST: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{:#?}", program);
    }
}

fn dump_bytecode(source: &str) {
    let bytecode = compile_or_exit(source);

    if let Err(e) = check::check_bytecode(&bytecode) {
        eprintln!("warning: {}", e);
    }

    print!("{}", disasm::disassemble(&bytecode));
}

fn run_program(source: &str) {
    let bytecode = compile_or_exit(source);

    let mut vm = Vm::new(bytecode);
    if let Err(e) = vm.run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn parse_or_exit(source: &str) -> Program {
    let tokens = match Lexer::new(source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("lexer error: {}", e);
            process::exit(1);
        }
    };

    match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(e) => {
            eprintln!("parse error: {}", e);
            process::exit(1);
        }
    }
}

fn compile_or_exit(source: &str) -> ByteCode {
    let program = parse_or_exit(source);

    let mut compiler = Compiler::new();
    if let Err(e) = compiler.compile(&program) {
        eprintln!("{}", e);
        process::exit(1);
    }
    compiler.bytecode()
}
