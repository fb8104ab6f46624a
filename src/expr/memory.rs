use std::fmt;

/// Syntax tree of a memory navigation expression such as `[4 * eax + ecx]`.
///
/// Unlike breakpoint conditions these are evaluated locally against a
/// register snapshot and a memory provider, so the GUI can follow pointer
/// chains while the target is suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryExpression {
    /// Register reference, resolved against the active thread at
    /// evaluation time
    Register { name: String },
    /// Numeric literal
    NumericalValue { value: u64 },
    /// Dereference of the address computed by the child
    MemoryAccess { child: Box<MemoryExpression> },
    /// Sum of two or more operands
    Plus { children: Vec<MemoryExpression> },
    /// Left-associative difference of two or more operands
    Minus { children: Vec<MemoryExpression> },
    /// Product of two or more operands
    Multiplication { children: Vec<MemoryExpression> },
    /// Explicit grouping; transparent except for display
    Sub { child: Box<MemoryExpression> },
}

impl MemoryExpression {
    pub fn register(name: impl Into<String>) -> Self {
        Self::Register { name: name.into() }
    }

    pub fn value(value: u64) -> Self {
        Self::NumericalValue { value }
    }

    pub fn memory(child: MemoryExpression) -> Self {
        Self::MemoryAccess {
            child: Box::new(child),
        }
    }

    pub fn sub(child: MemoryExpression) -> Self {
        Self::Sub {
            child: Box::new(child),
        }
    }
}

impl fmt::Display for MemoryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register { name } => f.write_str(name),
            Self::NumericalValue { value } => write!(f, "{}", value),
            Self::MemoryAccess { child } => write!(f, "[{}]", child),
            Self::Plus { children } => write_joined(f, children, "+"),
            Self::Minus { children } => write_joined(f, children, "-"),
            Self::Multiplication { children } => write_joined(f, children, "*"),
            Self::Sub { child } => write!(f, "({})", child),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[MemoryExpression],
    separator: &str,
) -> fmt::Result {
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", child)?;
    }
    Ok(())
}
