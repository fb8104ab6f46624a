use std::fmt;

/// Logical combination operators (`condition && condition`, `... || ...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionOperator {
    And,
    Or,
}

impl ExpressionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Arithmetic and bitwise operators inside a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaOperator {
    BitOr,
    BitXor,
    BitAnd,
    ShiftLeft,
    ShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl FormulaOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

/// Binary comparison operators between two formulas.
///
/// `!=` and `<>` mean the same thing but are kept apart so a condition
/// prints back exactly the way the user wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationOperator {
    Equal,
    NotEqual,
    NotEqualAngle,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl RelationOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::NotEqualAngle => "<>",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

/// Immutable syntax tree of a conditional-breakpoint expression.
///
/// The tree is never evaluated locally; it is flattened into
/// [`ConditionInstruction`]s and shipped to the debug agent, which tests the
/// condition at target speed without a round trip per hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionTree {
    /// Logical combination of one or more sub-conditions
    Expression {
        operator: ExpressionOperator,
        children: Vec<ConditionTree>,
    },
    /// Arithmetic/bitwise combination of one or more operands
    Formula {
        operator: FormulaOperator,
        children: Vec<ConditionTree>,
    },
    /// Binary comparison; always exactly two children
    Relation {
        operator: RelationOperator,
        lhs: Box<ConditionTree>,
        rhs: Box<ConditionTree>,
    },
    /// Memory dereference of the address computed by the child
    Memory { child: Box<ConditionTree> },
    /// Numeric literal
    Number { value: u64 },
    /// Register or symbol name, resolved on the agent
    Identifier { name: String },
    /// Explicit grouping; transparent except for display
    Sub { child: Box<ConditionTree> },
}

impl ConditionTree {
    pub fn number(value: u64) -> Self {
        Self::Number { value }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    pub fn relation(operator: RelationOperator, lhs: ConditionTree, rhs: ConditionTree) -> Self {
        Self::Relation {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn memory(child: ConditionTree) -> Self {
        Self::Memory {
            child: Box::new(child),
        }
    }

    pub fn sub(child: ConditionTree) -> Self {
        Self::Sub {
            child: Box::new(child),
        }
    }

    /// Flattens the tree into a postfix instruction stream a stack-based
    /// evaluator on the agent side can execute.
    pub fn flatten(&self) -> Vec<ConditionInstruction> {
        let mut instructions = Vec::new();
        self.flatten_into(&mut instructions);
        instructions
    }

    fn flatten_into(&self, out: &mut Vec<ConditionInstruction>) {
        match self {
            Self::Expression { operator, children } => {
                flatten_chain(children, ConditionInstruction::Logical(*operator), out);
            }
            Self::Formula { operator, children } => {
                flatten_chain(children, ConditionInstruction::Arithmetic(*operator), out);
            }
            Self::Relation { operator, lhs, rhs } => {
                lhs.flatten_into(out);
                rhs.flatten_into(out);
                out.push(ConditionInstruction::Relation(*operator));
            }
            Self::Memory { child } => {
                child.flatten_into(out);
                out.push(ConditionInstruction::Dereference);
            }
            Self::Number { value } => out.push(ConditionInstruction::PushValue(*value)),
            Self::Identifier { name } => {
                out.push(ConditionInstruction::PushRegister(name.clone()));
            }
            // Grouping carries no runtime meaning
            Self::Sub { child } => child.flatten_into(out),
        }
    }
}

fn flatten_chain(
    children: &[ConditionTree],
    operator: ConditionInstruction,
    out: &mut Vec<ConditionInstruction>,
) {
    for (index, child) in children.iter().enumerate() {
        child.flatten_into(out);
        if index > 0 {
            out.push(operator.clone());
        }
    }
}

impl fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression { operator, children } => {
                write_joined(f, children, operator.as_str())
            }
            Self::Formula { operator, children } => write_joined(f, children, operator.as_str()),
            Self::Relation { operator, lhs, rhs } => {
                write!(f, "{} {} {}", lhs, operator.as_str(), rhs)
            }
            Self::Memory { child } => write!(f, "[{}]", child),
            Self::Number { value } => write!(f, "{}", value),
            Self::Identifier { name } => f.write_str(name),
            Self::Sub { child } => write!(f, "({})", child),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[ConditionTree],
    separator: &str,
) -> fmt::Result {
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            write!(f, " {} ", separator)?;
        }
        write!(f, "{}", child)?;
    }
    Ok(())
}

/// One step of the flattened, remote-evaluable condition form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionInstruction {
    /// Push a literal value
    PushValue(u64),
    /// Push the current value of a register or symbol
    PushRegister(String),
    /// Pop an address, push the word read from it
    Dereference,
    /// Pop two operands, push the comparison result
    Relation(RelationOperator),
    /// Pop two operands, push the logical combination
    Logical(ExpressionOperator),
    /// Pop two operands, push the arithmetic result
    Arithmetic(FormulaOperator),
}
