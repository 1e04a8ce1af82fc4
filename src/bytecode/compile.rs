use std::rc::Rc;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::op::Op;
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::lang::ast::{BinOp, Block, Expr, Program, Stmt, UnOp};
use crate::lang::value::{CompiledFunction, Value};
use crate::runtime::builtins::BUILTINS;
use crate::runtime::vm::GLOBALS_SIZE;

/// Jump operand emitted before the target is known; every placeholder is
/// patched before the enclosing function is sealed.
const PLACEHOLDER: usize = usize::MAX;

/// The compiled program: top-level instructions plus the constant pool.
/// Compiled functions live in the pool next to integer and string
/// constants; the pool is append-only during a compile and survives REPL
/// lines.
#[derive(Debug, Clone)]
pub struct ByteCode {
    pub instructions: Vec<Op>,
    pub constants: Vec<Value>,
}

/// Instruction collector for one function body. The outermost scope is
/// the top-level program.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<Op>,
}

/// Walks the AST depth-first and emits a flat instruction stream,
/// resolving names through a chain of symbol tables.
pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,

    /// The scope instructions are currently appended to.
    scope: CompilationScope,
    /// Suspended scopes of enclosing function literals, innermost last.
    enclosing_scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// A fresh compiler with the builtin table pre-defined in the global
    /// symbol table.
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(i, builtin.name);
        }

        Compiler {
            constants: Vec::new(),
            symbol_table,
            scope: CompilationScope::default(),
            enclosing_scopes: Vec::new(),
        }
    }

    /// A compiler resuming from an earlier line's symbol table and
    /// constant pool (the REPL contract).
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Compiler {
            constants,
            symbol_table,
            scope: CompilationScope::default(),
            enclosing_scopes: Vec::new(),
        }
    }

    /// Releases the symbol table and constant pool for the next line.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbol_table, self.constants)
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// The compiled program so far.
    pub fn bytecode(&self) -> ByteCode {
        ByteCode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.compile_expression(expr)?;
                // an expression represents itself; statement position
                // discards the value
                self.emit(Op::Pop);
            }

            Stmt::Let { name, value } => {
                self.compile_expression(value)?;

                let symbol = self.symbol_table.define(name);
                if symbol.scope == SymbolScope::Global && symbol.index >= GLOBALS_SIZE {
                    return Err(CompileError::too_many_globals(GLOBALS_SIZE));
                }

                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::SetGlobal(symbol.index)),
                    _ => self.emit(Op::SetLocal(symbol.index)),
                };
            }

            Stmt::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Integer(value) => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Op::Constant(index));
            }

            Expr::Str(value) => {
                let index = self.add_constant(Value::Str(Rc::from(value.as_str())));
                self.emit(Op::Constant(index));
            }

            Expr::Bool(true) => {
                self.emit(Op::True);
            }
            Expr::Bool(false) => {
                self.emit(Op::False);
            }

            Expr::Null => {
                self.emit(Op::Null);
            }

            Expr::Ident(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::undefined_variable(name))?;
                self.load_symbol(&symbol);
            }

            Expr::Binary { op, left, right } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;

                let emitted = match op {
                    BinOp::Add => Op::Add,
                    BinOp::Sub => Op::Sub,
                    BinOp::Mul => Op::Mul,
                    BinOp::Div => Op::Div,
                    BinOp::Lt => Op::Less,
                    BinOp::LtEq => Op::LessEq,
                    BinOp::Gt => Op::Greater,
                    BinOp::GtEq => Op::GreaterEq,
                    BinOp::Eq => Op::Equal,
                    BinOp::NotEq => Op::NotEq,
                    BinOp::And => Op::And,
                    BinOp::Or => Op::Or,
                    BinOp::Dot => return Err(CompileError::unknown_operator(op.symbol())),
                };
                self.emit(emitted);
            }

            Expr::Unary { op, operand } => {
                self.compile_expression(operand)?;
                match op {
                    UnOp::Neg => self.emit(Op::NegInt),
                    UnOp::Not => self.emit(Op::NegBool),
                };
            }

            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                let jump_not_true_pos = self.emit(Op::JumpIfFalse(PLACEHOLDER));

                self.compile_block(consequence)?;
                // the if is an expression: its branch must leave a value,
                // so the statement-position Pop is stripped
                self.strip_trailing_pop();

                let jump_pos = self.emit(Op::Jump(PLACEHOLDER));
                self.patch_jump(jump_not_true_pos, self.scope.instructions.len());

                match alternative {
                    Some(block) => {
                        self.compile_block(block)?;
                        self.strip_trailing_pop();
                    }
                    None => {
                        self.emit(Op::Null);
                    }
                }
                self.patch_jump(jump_pos, self.scope.instructions.len());
            }

            Expr::Function { parameters, body } => {
                self.enter_scope();

                // parameters occupy local slots 0..num_parameters
                for parameter in parameters {
                    self.symbol_table.define(parameter);
                }

                self.compile_block(body)?;

                // the final expression statement is the return value
                if let Some(last) = self.scope.instructions.last_mut() {
                    if matches!(last, Op::Pop) {
                        *last = Op::ReturnValue;
                    }
                }
                if !matches!(self.scope.instructions.last(), Some(Op::ReturnValue)) {
                    self.emit(Op::Return);
                }

                let free_symbols = self.symbol_table.free_symbols.clone();
                let num_locals = self.symbol_table.num_definitions;
                let instructions = self.leave_scope();

                // push the captured values, in capture order, before the
                // closure is built
                for symbol in &free_symbols {
                    self.load_symbol(symbol);
                }

                let function = CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                };
                let const_index = self.add_constant(Value::Function(Rc::new(function)));
                self.emit(Op::Closure {
                    const_index,
                    free_count: free_symbols.len(),
                });
            }

            Expr::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call(arguments.len()));
            }

            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array(elements.len()));
            }

            Expr::Hash(pairs) => {
                // value first, key second, so the VM reads (value, key)
                // pairs off the stack
                for (key, value) in pairs {
                    self.compile_expression(value)?;
                    self.compile_expression(key)?;
                }
                self.emit(Op::Hash(pairs.len()));
            }

            Expr::Index { collection, index } => {
                self.compile_expression(collection)?;
                self.compile_expression(index)?;
                self.emit(Op::Index);
            }
        }
        Ok(())
    }

    /// Appends a constant to the pool and returns its index. Duplicates
    /// are not coalesced.
    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Appends an instruction to the current scope and returns its index.
    fn emit(&mut self, op: Op) -> usize {
        let position = self.scope.instructions.len();
        self.scope.instructions.push(op);
        position
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        let op = match symbol.scope {
            SymbolScope::Global => Op::GetGlobal(symbol.index),
            SymbolScope::Local => Op::GetLocal(symbol.index),
            SymbolScope::Builtin => Op::GetBuiltin(symbol.index),
            SymbolScope::Free => Op::GetFree(symbol.index),
        };
        self.emit(op);
    }

    fn strip_trailing_pop(&mut self) {
        if matches!(self.scope.instructions.last(), Some(Op::Pop)) {
            self.scope.instructions.pop();
        }
    }

    fn patch_jump(&mut self, position: usize, target: usize) {
        if let Some(Op::Jump(t) | Op::JumpIfFalse(t)) = self.scope.instructions.get_mut(position) {
            *t = target;
        }
    }

    fn enter_scope(&mut self) {
        self.enclosing_scopes.push(std::mem::take(&mut self.scope));

        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
    }

    /// Seals the current function body: restores the enclosing scope and
    /// symbol table, returning the finished instruction list.
    fn leave_scope(&mut self) -> Vec<Op> {
        let outer_scope = self.enclosing_scopes.pop().unwrap_or_default();
        let finished = std::mem::replace(&mut self.scope, outer_scope);

        if let Some(outer) = self.symbol_table.outer.take() {
            self.symbol_table = *outer;
        }

        finished.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
