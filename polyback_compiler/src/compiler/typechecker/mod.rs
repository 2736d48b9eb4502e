//! Assignment, call and operator compatibility for both source languages

pub mod intrinsics;

use crate::compiler::common::{decl::Language, error::*, expr::*, symbol_table::*, types::*};

/// What has to happen to a value before it can be stored into its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    Ok,
    CoercionNeeded(Promotion),
}

/// The checked form of a binary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryTyping {
    /// Might differ from the source operator, a Comal `+` on strings is a concatenation
    pub op: BinaryOp,
    /// Type both operands have after coercion
    pub operand: BaseType,
    pub result: BaseType,
    pub left: Assignability,
    pub right: Assignability,
}

pub struct TypeChecker {
    language: Language,
}

impl TypeChecker {
    pub fn new(language: Language) -> Self {
        TypeChecker { language }
    }

    /// Checks whether a value of type `value` can be stored into `target`
    pub fn check_assignment(
        &self,
        target: &TypeDescriptor,
        value: &TypeDescriptor,
        line: i32,
    ) -> Result<Assignability, Error> {
        let mismatch = || {
            Error::at(
                line,
                ErrorKind::TypeMismatch(target.clone(), value.clone()),
            )
        };

        if !target.base.is_storable() || !value.base.is_storable() {
            return Err(mismatch());
        }

        match (target.is_array(), value.is_array()) {
            (true, true) => {
                if target.rank() != value.rank() {
                    return Err(Error::at(
                        line,
                        ErrorKind::ArrayDimension(format!(
                            "cannot use array '{}' of rank {} where rank {} is expected",
                            value,
                            value.rank(),
                            target.rank()
                        )),
                    ));
                }
                for (index, pair) in target.dimensions.iter().zip(&value.dimensions).enumerate() {
                    if let (Extent::Fixed(expected), Extent::Fixed(found)) = pair {
                        if expected != found {
                            return Err(Error::at(
                                line,
                                ErrorKind::ArrayDimension(format!(
                                    "dimension {} has extent {}, expected {}",
                                    index + 1,
                                    found,
                                    expected
                                )),
                            ));
                        }
                    }
                }
                // elements are shared, so no element-wise conversion is possible
                if target.base == value.base {
                    Ok(Assignability::Ok)
                } else {
                    Err(mismatch())
                }
            }
            (false, false) => match (target.base, value.base) {
                (t, v) if t == v => Ok(Assignability::Ok),
                (BaseType::Double, BaseType::Integer) => {
                    Ok(Assignability::CoercionNeeded(Promotion::IntegerToDouble))
                }
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }

    /// Checks the arguments of a call against the routine's signature and returns the
    /// coercion needed for every argument
    pub fn check_call(
        &self,
        function: &Symbol,
        args: &[TypeDescriptor],
        line: i32,
    ) -> Result<Vec<Assignability>, Error> {
        if !function.is_routine() {
            return Err(Error::at(
                line,
                ErrorKind::NotCallable(function.name.clone(), function.class),
            ));
        }
        if function.params.len() != args.len() {
            return Err(Error::at(
                line,
                ErrorKind::Arity(function.name.clone(), function.params.len(), args.len()),
            ));
        }

        function
            .params
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (param, arg))| {
                self.check_assignment(param, arg, line).or(Err(Error::at(
                    line,
                    ErrorKind::ArgumentType(
                        index + 1,
                        function.name.clone(),
                        param.clone(),
                        arg.clone(),
                    ),
                )))
            })
            .collect()
    }

    pub fn check_binary(
        &self,
        op: BinaryOp,
        left: &TypeDescriptor,
        right: &TypeDescriptor,
        line: i32,
    ) -> Result<BinaryTyping, Error> {
        let invalid = || {
            Error::at(
                line,
                ErrorKind::InvalidOperands(op.symbol(), left.clone(), right.clone()),
            )
        };
        if left.is_array() || right.is_array() {
            return Err(invalid());
        }

        let typing = |op: BinaryOp, operand: BaseType| BinaryTyping {
            op,
            operand,
            result: op.result_base(operand),
            left: promotion(left.base, operand),
            right: promotion(right.base, operand),
        };
        let numeric = common_numeric(left.base, right.base);

        match op {
            BinaryOp::Add
                if self.language == Language::Comal
                    && left.base == BaseType::Char
                    && right.base == BaseType::Char =>
            {
                Ok(typing(BinaryOp::Concat, BaseType::Char))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Pow => {
                numeric.map(|operand| typing(op, operand)).ok_or_else(invalid)
            }
            BinaryOp::Div => match numeric {
                // Fortran truncates when dividing two integers
                Some(BaseType::Integer) if self.language == Language::Fortran => {
                    Ok(typing(op, BaseType::Integer))
                }
                Some(_) => Ok(typing(op, BaseType::Double)),
                None => Err(invalid()),
            },
            BinaryOp::IntDiv | BinaryOp::Mod => match (left.base, right.base) {
                (BaseType::Integer, BaseType::Integer) => Ok(typing(op, BaseType::Integer)),
                _ => Err(invalid()),
            },
            BinaryOp::Concat => match (left.base, right.base) {
                (BaseType::Char, BaseType::Char) => Ok(typing(op, BaseType::Char)),
                _ => Err(invalid()),
            },
            BinaryOp::Eq | BinaryOp::Ne => match (left.base, right.base) {
                (BaseType::Char, BaseType::Char) => Ok(typing(op, BaseType::Char)),
                (BaseType::Boolean, BaseType::Boolean) => Ok(typing(op, BaseType::Boolean)),
                _ => numeric.map(|operand| typing(op, operand)).ok_or_else(invalid),
            },
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                match (left.base, right.base) {
                    (BaseType::Char, BaseType::Char) => Ok(typing(op, BaseType::Char)),
                    _ => numeric.map(|operand| typing(op, operand)).ok_or_else(invalid),
                }
            }
            BinaryOp::And | BinaryOp::Or => match (left.base, right.base) {
                (BaseType::Boolean, BaseType::Boolean) => Ok(typing(op, BaseType::Boolean)),
                _ => Err(invalid()),
            },
        }
    }

    pub fn check_unary(
        &self,
        op: UnaryOp,
        operand: &TypeDescriptor,
        line: i32,
    ) -> Result<BaseType, Error> {
        match op {
            UnaryOp::Neg if operand.is_numeric() => Ok(operand.base),
            UnaryOp::Not if operand.is_scalar() && operand.base == BaseType::Boolean => {
                Ok(BaseType::Boolean)
            }
            _ => Err(Error::at(
                line,
                ErrorKind::InvalidOperand(op.symbol(), operand.clone()),
            )),
        }
    }

    /// Conditions of IF, WHILE and UNTIL
    pub fn check_condition(&self, ty: &TypeDescriptor, line: i32) -> Result<(), Error> {
        self.expect_scalar(BaseType::Boolean, ty, line)
    }

    /// Subscripts and run-time extents
    pub fn check_subscript(&self, ty: &TypeDescriptor, line: i32) -> Result<(), Error> {
        self.expect_scalar(BaseType::Integer, ty, line)
    }

    fn expect_scalar(&self, base: BaseType, ty: &TypeDescriptor, line: i32) -> Result<(), Error> {
        if ty.is_scalar() && ty.base == base {
            Ok(())
        } else {
            Err(Error::at(
                line,
                ErrorKind::TypeMismatch(TypeDescriptor::scalar(base), ty.clone()),
            ))
        }
    }
}

fn common_numeric(left: BaseType, right: BaseType) -> Option<BaseType> {
    match (left, right) {
        (BaseType::Integer, BaseType::Integer) => Some(BaseType::Integer),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(BaseType::Double),
        _ => None,
    }
}

fn promotion(from: BaseType, to: BaseType) -> Assignability {
    match (from, to) {
        (BaseType::Integer, BaseType::Double) => {
            Assignability::CoercionNeeded(Promotion::IntegerToDouble)
        }
        _ => Assignability::Ok,
    }
}
