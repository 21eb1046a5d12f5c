//! Control signals returned from statement execution.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Carry on with the next statement
    Continue,
    /// Abandon the current pass and resume the root program at this index
    JumpTo(usize),
    /// Stop the root program
    Halt,
}
