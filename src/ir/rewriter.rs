use super::{Function, Inst, Op, Type, ValueId};

/// Cursor-based editor over a [`Function`] body.
///
/// New instructions are inserted immediately before the cursor. Rewriting an
/// instruction leaves the cursor on the first instruction after it.
pub struct FunctionRewriter<'f> {
    function: &'f mut Function,
    cursor: usize,
}

impl<'f> FunctionRewriter<'f> {
    /// Positions the cursor on instruction `cursor`, clamped to the body length.
    pub fn new(function: &'f mut Function, cursor: usize) -> Self {
        let cursor = cursor.min(function.body.len());
        Self { function, cursor }
    }

    /// Index of the instruction under the cursor.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// The function being edited.
    #[must_use]
    pub fn function(&self) -> &Function {
        self.function
    }

    /// See [`Function::type_of`].
    #[must_use]
    pub fn type_of(&self, value: ValueId) -> Option<&Type> {
        self.function.type_of(value)
    }

    /// Inserts a value-producing instruction and returns its result.
    pub fn insert(&mut self, op: Op, operands: Vec<ValueId>, ty: Type) -> ValueId {
        let result = self.function.fresh_value();
        self.insert_inst(Inst {
            result: Some(result),
            ty,
            op,
            operands,
        });
        result
    }

    /// Inserts an instruction without a result.
    pub fn insert_void(&mut self, op: Op, operands: Vec<ValueId>) {
        self.insert_inst(Inst {
            result: None,
            ty: Type::Void,
            op,
            operands,
        });
    }

    /// Replaces the instruction under the cursor in place, keeping its result
    /// value, and advances past it.
    pub fn replace_current(&mut self, op: Op, operands: Vec<ValueId>, ty: Type) {
        if let Some(inst) = self.function.body.get_mut(self.cursor) {
            inst.op = op;
            inst.operands = operands;
            inst.ty = ty;
            self.cursor += 1;
        }
    }

    /// Removes the instruction under the cursor.
    pub fn erase_current(&mut self) -> Option<Inst> {
        (self.cursor < self.function.body.len()).then(|| self.function.body.remove(self.cursor))
    }

    fn insert_inst(&mut self, inst: Inst) {
        self.function.body.insert(self.cursor, inst);
        self.cursor += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Literal, LlvmOp, StdOp};

    #[test]
    fn insertions_land_before_the_rewritten_instruction() {
        let mut function = Function::new("f", [Type::Context], Type::Void);
        function.push(Op::Std(StdOp::Return), Vec::new(), Type::Void);

        let mut rewriter = FunctionRewriter::new(&mut function, 0);
        let one = rewriter.insert(
            Op::Llvm(LlvmOp::Constant(Literal::i32(1))),
            Vec::new(),
            Type::i32(),
        );
        rewriter.replace_current(Op::Llvm(LlvmOp::Return), Vec::new(), Type::Void);
        assert_eq!(rewriter.cursor(), 2);

        assert_eq!(one, ValueId(1));
        assert_eq!(function.body.len(), 2);
        assert_eq!(function.body[0].result, Some(one));
        assert_eq!(function.body[1].op, Op::Llvm(LlvmOp::Return));
    }

    #[test]
    fn erase_keeps_cursor_on_next_instruction() {
        let mut function = Function::new("f", [], Type::Void);
        function.push(Op::Unregistered(String::from("a")), Vec::new(), Type::Void);
        function.push(Op::Unregistered(String::from("b")), Vec::new(), Type::Void);

        let mut rewriter = FunctionRewriter::new(&mut function, 0);
        let erased = rewriter.erase_current().unwrap();
        assert_eq!(erased.op.name(), "a");
        assert_eq!(rewriter.cursor(), 0);
        assert_eq!(function.body[0].op.name(), "b");
    }
}
