use crate::{Loc, Value};

/// Fixed-size value stack growing from the high end down to index 0.
/// `sp` indexes the top value; `sp == capacity` means empty.
#[derive(Debug)]
pub struct OperandStack {
    slots: Box<[Value]>,
    sp: usize,
}

/// Saved stack pointer of a scratch frame. Slot `i` of the frame lives
/// just below the saved pointer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    fp: usize,
}

impl Frame {
    #[must_use]
    pub fn at(self, i: usize) -> Loc {
        Loc::Stack(self.fp - 1 - i)
    }
}

impl OperandStack {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            sp: capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of live values above the floor
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len() - self.sp
    }

    /// Moves `sp` down by `n` nil slots, returning the previous `sp`.
    ///
    /// # Panics
    /// On overflow.
    pub fn reserve(&mut self, n: usize) -> Frame {
        assert!(self.sp >= n, "operand stack overflow");
        let fp = self.sp;
        self.sp -= n;
        debug_assert!(self.slots[self.sp..fp].iter().all(Option::is_none));
        Frame { fp }
    }

    /// Writes `value` into a fresh top slot
    pub fn push(&mut self, value: Value) {
        assert!(self.sp > 0, "operand stack overflow");
        self.sp -= 1;
        self.slots[self.sp] = value;
    }

    /// Removes the top slot, handing its reference to the caller
    pub fn pop(&mut self) -> Value {
        assert!(self.sp < self.slots.len(), "operand stack underflow");
        let value = self.slots[self.sp].take();
        self.sp += 1;
        value
    }

    /// Value `ofs` slots below the top, without removing it
    #[must_use]
    pub fn peek(&self, ofs: usize) -> Value {
        let i = self.sp + ofs;
        assert!(i < self.slots.len(), "operand stack underflow");
        self.slots[i]
    }

    /// Whether `fp` was handed out by `reserve` and is still at or above `sp`.
    #[must_use]
    pub fn contains_frame(&self, frame: Frame) -> bool {
        frame.fp >= self.sp && frame.fp <= self.slots.len()
    }

    pub(crate) fn frame_pointer(frame: Frame) -> usize {
        frame.fp
    }

    pub(crate) fn slot(&self, i: usize) -> &Value {
        assert!(i >= self.sp, "access below the operand stack top");
        &self.slots[i]
    }

    pub(crate) fn slot_mut(&mut self, i: usize) -> &mut Value {
        assert!(i >= self.sp, "access below the operand stack top");
        &mut self.slots[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjRef;

    #[test]
    fn test_push_pop_order() {
        let mut stack = OperandStack::new(4);
        stack.push(Some(ObjRef(1)));
        stack.push(Some(ObjRef(2)));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.peek(0), Some(ObjRef(2)));
        assert_eq!(stack.peek(1), Some(ObjRef(1)));
        assert_eq!(stack.pop(), Some(ObjRef(2)));
        assert_eq!(stack.pop(), Some(ObjRef(1)));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_frame_slots_sit_below_saved_pointer() {
        let mut stack = OperandStack::new(8);
        stack.push(None);
        let frame = stack.reserve(3);
        assert_eq!(stack.depth(), 4);
        assert_eq!(frame.at(0), Loc::Stack(6));
        assert_eq!(frame.at(2), Loc::Stack(4));
        assert!(stack.contains_frame(frame));
    }

    #[test]
    #[should_panic(expected = "operand stack overflow")]
    fn test_overflow() {
        let mut stack = OperandStack::new(1);
        stack.push(None);
        stack.push(None);
    }

    #[test]
    #[should_panic(expected = "operand stack underflow")]
    fn test_underflow() {
        let mut stack = OperandStack::new(2);
        stack.pop();
    }
}
