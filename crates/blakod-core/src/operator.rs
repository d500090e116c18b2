//! Expression operators.

use std::fmt;

use crate::limits::wrap_kod_int;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `AND` (short-circuit)
    And,
    /// `OR` (short-circuit)
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `=`
    Eq,
    /// `<>`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Leq,
    /// `>=`
    Geq,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `IsClass(object, class)`
    IsClass,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Leq => "<=",
            BinaryOp::Geq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::IsClass => "IsClass",
        }
    }

    /// Operators that only make sense on integers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Leq
                | BinaryOp::Geq
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Neq)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Evaluate on two integers, as the runtime would.
    ///
    /// Returns `None` when the result is not known at compile time
    /// (division by zero, `IsClass`).
    pub fn evaluate(&self, left: i32, right: i32) -> Option<i32> {
        let (l, r) = (left as i64, right as i64);
        let value = match self {
            BinaryOp::And => ((l != 0) && (r != 0)) as i64,
            BinaryOp::Or => ((l != 0) || (r != 0)) as i64,
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div if r == 0 => return None,
            BinaryOp::Div => l / r,
            BinaryOp::Mod if r == 0 => return None,
            BinaryOp::Mod => l % r,
            BinaryOp::Eq => (l == r) as i64,
            BinaryOp::Neq => (l != r) as i64,
            BinaryOp::Lt => (l < r) as i64,
            BinaryOp::Gt => (l > r) as i64,
            BinaryOp::Leq => (l <= r) as i64,
            BinaryOp::Geq => (l >= r) as i64,
            BinaryOp::BitAnd => l & r,
            BinaryOp::BitOr => l | r,
            BinaryOp::IsClass => return None,
        };
        Some(wrap_kod_int(value))
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `NOT`
    Not,
    /// `-`
    Neg,
    /// `~`
    BitNot,
    /// `++x`
    PreInc,
    /// `--x`
    PreDec,
    /// `x++`
    PostInc,
    /// `x--`
    PostDec,
    /// `First(list)`
    First,
    /// `Rest(list)`
    Rest,
    /// `GetClass(object)`
    GetClass,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
            UnaryOp::First => "First",
            UnaryOp::Rest => "Rest",
            UnaryOp::GetClass => "GetClass",
        }
    }

    /// Operators that write back to their operand.
    pub fn is_increment(&self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }

    /// Operators that take a list or object rather than a number.
    pub fn takes_reference(&self) -> bool {
        matches!(self, UnaryOp::First | UnaryOp::Rest | UnaryOp::GetClass)
    }

    /// Evaluate on an integer, if the result is known at compile time.
    pub fn evaluate(&self, operand: i32) -> Option<i32> {
        let v = operand as i64;
        let value = match self {
            UnaryOp::Not => (v == 0) as i64,
            UnaryOp::Neg => -v,
            UnaryOp::BitNot => !v,
            _ => return None,
        };
        Some(wrap_kod_int(value))
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_arithmetic() {
        assert_eq!(BinaryOp::Add.evaluate(2, 3), Some(5));
        assert_eq!(BinaryOp::Mul.evaluate(4, -3), Some(-12));
        assert_eq!(BinaryOp::Div.evaluate(7, 2), Some(3));
        assert_eq!(BinaryOp::Mod.evaluate(7, 2), Some(1));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        assert_eq!(BinaryOp::Div.evaluate(1, 0), None);
        assert_eq!(BinaryOp::Mod.evaluate(1, 0), None);
    }

    #[test]
    fn comparisons_yield_booleans() {
        assert_eq!(BinaryOp::Lt.evaluate(1, 2), Some(1));
        assert_eq!(BinaryOp::Geq.evaluate(1, 2), Some(0));
        assert_eq!(BinaryOp::Neq.evaluate(3, 3), Some(0));
        assert_eq!(BinaryOp::And.evaluate(5, 0), Some(0));
        assert_eq!(BinaryOp::Or.evaluate(5, 0), Some(1));
    }

    #[test]
    fn addition_wraps_to_28_bits() {
        assert_eq!(
            BinaryOp::Add.evaluate(crate::limits::KOD_INT_MAX, 1),
            Some(crate::limits::KOD_INT_MIN)
        );
    }

    #[test]
    fn unary_evaluation() {
        assert_eq!(UnaryOp::Not.evaluate(0), Some(1));
        assert_eq!(UnaryOp::Neg.evaluate(4), Some(-4));
        assert_eq!(UnaryOp::BitNot.evaluate(0), Some(-1));
        assert_eq!(UnaryOp::First.evaluate(1), None);
    }

    #[test]
    fn categories() {
        assert!(BinaryOp::BitAnd.is_numeric());
        assert!(!BinaryOp::Eq.is_numeric());
        assert!(BinaryOp::Or.is_logical());
        assert!(UnaryOp::PostDec.is_increment());
        assert!(UnaryOp::Rest.takes_reference());
    }
}
