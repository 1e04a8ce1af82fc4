use std::rc::Rc;

use crate::bytecode::op::Op;
use crate::lang::value::Closure;

// ---------------------------------------------------------------------------
// Call Frame
// ---------------------------------------------------------------------------

/// Activation record for one in-progress call.
///
/// `ip` starts at -1 so the VM's post-increment fetch lands on
/// instruction 0. `base_pointer` marks where this call's local-slot
/// region begins on the operand stack; arguments already sit in slots
/// `0..num_parameters` when the frame is pushed.
#[derive(Debug)]
pub struct Frame {
    closure: Rc<Closure>,
    pub ip: i64,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame {
            closure,
            ip: -1,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &[Op] {
        &self.closure.func.instructions
    }

    pub fn closure(&self) -> &Closure {
        &self.closure
    }
}
