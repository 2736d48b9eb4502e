use crate::compiler::codegen::lir::*;
use crate::compiler::common::{expr::*, types::*};
use log::trace;

/// Applies window rewrites until none matches anymore, returns the number of rewrites
pub fn simplify(code: &mut Vec<Lir>) -> usize {
    let mut rewrites = 0;

    loop {
        let changed = rewrite_pass(code) + remove_unreachable(code);
        if changed == 0 {
            break;
        }
        rewrites += changed;
    }
    rewrites
}

fn rewrite_pass(code: &mut Vec<Lir>) -> usize {
    let mut result = Vec::with_capacity(code.len());
    let mut count = 0;
    let mut i = 0;

    while i < code.len() {
        match rewrite(&code[i..]) {
            Some((consumed, replacement)) => {
                trace!("{:?} => {:?}", &code[i..i + consumed], replacement);

                result.extend(replacement);
                i += consumed;
                count += 1;
            }
            None => {
                result.push(code[i].clone());
                i += 1;
            }
        }
    }
    *code = result;

    count
}

// number of instructions matched at the start of the window and what replaces them
fn rewrite(window: &[Lir]) -> Option<(usize, Vec<Lir>)> {
    if let [Lir::LoadConst(left), Lir::LoadConst(right), Lir::Binary(op, ty), ..] = window {
        if let Some(value) = fold_binary(*op, *ty, left, right) {
            return Some((3, vec![Lir::LoadConst(value)]));
        }
    }

    match window {
        [Lir::LoadConst(Literal::Integer(n)), Lir::Convert(Promotion::IntegerToDouble), ..] => {
            Some((2, vec![Lir::LoadConst(Literal::Double(*n as f64))]))
        }
        [Lir::LoadConst(value), Lir::Unary(op, _), ..] => {
            fold_unary(*op, value).map(|value| (2, vec![Lir::LoadConst(value)]))
        }

        [Lir::LoadLocal(load), Lir::Store(store), ..] if load == store => Some((2, vec![])),
        [Lir::LoadGlobal(load), Lir::StoreGlobal(store), ..] if load == store => Some((2, vec![])),
        [Lir::Store(store), Lir::LoadLocal(load), ..] if load == store => {
            Some((2, vec![Lir::Dup, Lir::Store(*store)]))
        }
        [Lir::StoreGlobal(store), Lir::LoadGlobal(load), ..] if load == store => {
            Some((2, vec![Lir::Dup, Lir::StoreGlobal(store.clone())]))
        }

        // jumps to the next instruction
        [Lir::Branch(target), Lir::Label(label), ..] if target == label => Some((1, vec![])),
        [Lir::BranchIf(_, target), Lir::Label(label), ..] if target == label => {
            Some((1, vec![Lir::Pop]))
        }
        [Lir::LoadConst(Literal::Boolean(value)), Lir::BranchIf(flag, label), ..] => {
            Some((2, if value == flag { vec![Lir::Branch(*label)] } else { vec![] }))
        }

        [Lir::LoadConst(_) | Lir::LoadLocal(_) | Lir::LoadGlobal(_) | Lir::Dup, Lir::Pop, ..] => {
            Some((2, vec![]))
        }
        _ => None,
    }
}

// drops everything between an unconditional transfer and the next label
fn remove_unreachable(code: &mut Vec<Lir>) -> usize {
    let mut removed = 0;
    let mut reachable = true;

    code.retain(|instr| {
        if let Lir::Label(_) = instr {
            reachable = true;
        }
        let keep = reachable;
        if !keep {
            removed += 1;
        } else if instr.ends_flow() {
            reachable = false;
        }
        keep
    });

    removed
}

fn fold_binary(op: BinaryOp, ty: BaseType, left: &Literal, right: &Literal) -> Option<Literal> {
    match (left, right) {
        (Literal::Integer(l), Literal::Integer(r)) if ty == BaseType::Integer => fold_integer(op, *l, *r),
        (Literal::Double(l), Literal::Double(r)) if ty == BaseType::Double => fold_double(op, *l, *r),
        (Literal::Char(l), Literal::Char(r)) if ty == BaseType::Char => match op {
            BinaryOp::Concat => Some(Literal::Char(format!("{}{}", l, r))),
            _ => compare(op, l, r),
        },
        (Literal::Boolean(l), Literal::Boolean(r)) if ty == BaseType::Boolean => match op {
            BinaryOp::And => Some(Literal::Boolean(*l && *r)),
            BinaryOp::Or => Some(Literal::Boolean(*l || *r)),
            BinaryOp::Eq => Some(Literal::Boolean(l == r)),
            BinaryOp::Ne => Some(Literal::Boolean(l != r)),
            _ => None,
        },
        _ => None,
    }
}

fn compare<T: PartialOrd + ?Sized>(op: BinaryOp, l: &T, r: &T) -> Option<Literal> {
    let result = match op {
        BinaryOp::Eq => l == r,
        BinaryOp::Ne => l != r,
        BinaryOp::Lt => l < r,
        BinaryOp::Le => l <= r,
        BinaryOp::Gt => l > r,
        BinaryOp::Ge => l >= r,
        _ => return None,
    };
    Some(Literal::Boolean(result))
}

// division and remainder are only folded for non-negative operands, where truncating
// and flooring agree
fn fold_integer(op: BinaryOp, l: i64, r: i64) -> Option<Literal> {
    let value = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div | BinaryOp::IntDiv if l >= 0 && r > 0 => Some(l / r),
        BinaryOp::Mod if l >= 0 && r > 0 => Some(l % r),
        BinaryOp::Pow => u32::try_from(r).ok().and_then(|r| l.checked_pow(r)),
        _ => return compare(op, &l, &r),
    };
    value.map(Literal::Integer)
}

fn fold_double(op: BinaryOp, l: f64, r: f64) -> Option<Literal> {
    let value = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div if r != 0.0 => l / r,
        BinaryOp::Pow => l.powf(r),
        BinaryOp::Div => return None,
        _ => return compare(op, &l, &r),
    };
    value.is_finite().then_some(Literal::Double(value))
}

fn fold_unary(op: UnaryOp, value: &Literal) -> Option<Literal> {
    match (op, value) {
        (UnaryOp::Neg, Literal::Integer(n)) => n.checked_neg().map(Literal::Integer),
        (UnaryOp::Neg, Literal::Double(n)) => Some(Literal::Double(-n)),
        (UnaryOp::Not, Literal::Boolean(b)) => Some(Literal::Boolean(!b)),
        _ => None,
    }
}
