use crate::compiler::codegen::{frame::*, lir::*, RoutineCode};
use crate::compiler::common::{expr::*, types::*};
use log::trace;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Integer(i64),
    // bit-pattern, floats aren't hashable
    Double(u64),
    Char(String),
    Boolean(bool),
}
impl From<&Literal> for ConstKey {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Integer(n) => ConstKey::Integer(*n),
            Literal::Double(n) => ConstKey::Double(n.to_bits()),
            Literal::Char(s) => ConstKey::Char(s.clone()),
            Literal::Boolean(b) => ConstKey::Boolean(*b),
        }
    }
}

// symbolic value on the operand stack
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Const(ConstKey),
    Local(Slot),
    Global(String),
    Unary(UnaryOp, BaseType, Box<ValueKey>),
    Convert(Promotion, Box<ValueKey>),
    Binary(BinaryOp, BaseType, Box<ValueKey>, Box<ValueKey>),
}

impl ValueKey {
    fn mentions(&self, storage: &Storage) -> bool {
        match (self, storage) {
            (ValueKey::Local(slot), Storage::Local(written)) => slot == written,
            (ValueKey::Global(name), Storage::Global(written)) => name == written,
            (ValueKey::Unary(.., operand) | ValueKey::Convert(_, operand), _) => operand.mentions(storage),
            (ValueKey::Binary(_, _, left, right), _) => left.mentions(storage) || right.mentions(storage),
            _ => false,
        }
    }
}

// stack entry: pure value if known, with the index of the first instruction computing it
type StackEntry = (Option<ValueKey>, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Repeat {
    start: usize,
    end: usize,
    // last instruction of the first evaluation
    first: usize,
}

fn find_repeats(code: &[Lir]) -> Vec<Repeat> {
    let mut repeats = Vec::new();
    let mut stack: Vec<StackEntry> = Vec::new();
    // pure binary operation to the index of its first evaluation
    let mut available: HashMap<ValueKey, usize> = HashMap::new();

    for (i, instr) in code.iter().enumerate() {
        match instr {
            Lir::LoadConst(literal) => stack.push((Some(ValueKey::Const(literal.into())), i)),
            Lir::LoadLocal(slot) => stack.push((Some(ValueKey::Local(*slot)), i)),
            Lir::LoadGlobal(name) => stack.push((Some(ValueKey::Global(name.clone())), i)),
            Lir::Unary(op, ty) => {
                let (operand, start) = stack.pop().unwrap_or((None, i));
                let key = operand.map(|operand| ValueKey::Unary(*op, *ty, Box::new(operand)));
                stack.push((key, start));
            }
            Lir::Convert(promotion) => {
                let (operand, start) = stack.pop().unwrap_or((None, i));
                let key = operand.map(|operand| ValueKey::Convert(*promotion, Box::new(operand)));
                stack.push((key, start));
            }
            Lir::Binary(op, ty) => {
                let right = stack.pop().unwrap_or((None, i));
                let (left, start) = stack.pop().unwrap_or((None, right.1));

                let key = match (left, right.0) {
                    (Some(left), Some(right)) => {
                        Some(ValueKey::Binary(*op, *ty, Box::new(left), Box::new(right)))
                    }
                    _ => None,
                };
                if let Some(key) = &key {
                    match available.get(key) {
                        Some(first) => repeats.push(Repeat { start, end: i, first: *first }),
                        None => {
                            available.insert(key.clone(), i);
                        }
                    }
                }
                stack.push((key, start));
            }
            Lir::Store(slot) => {
                stack.pop();
                available.retain(|key, _| !key.mentions(&Storage::Local(*slot)));
            }
            Lir::StoreGlobal(name) => {
                stack.pop();
                available.retain(|key, _| !key.mentions(&Storage::Global(name.clone())));
            }
            Lir::AllocArray(array, ..) => {
                let (pops, _) = instr.stack_effect();
                stack.truncate(stack.len().saturating_sub(pops));
                available.retain(|key, _| !key.mentions(array));
            }
            Lir::Call(..) => {
                let (pops, pushes) = instr.stack_effect();
                stack.truncate(stack.len().saturating_sub(pops));
                stack.extend((0..pushes).map(|_| (None, i)));
                available.clear();
            }
            _ if instr.is_block_boundary() => {
                stack.clear();
                available.clear();
            }
            _ => {
                let (pops, pushes) = instr.stack_effect();
                stack.truncate(stack.len().saturating_sub(pops));
                stack.extend((0..pushes).map(|_| (None, i)));
            }
        }
    }

    repeats
}

/// Evaluates identical pure binary operations within a basic block once. The first result
/// is kept in a new temporary slot which later occurrences load instead of recomputing.
/// Returns the number of replaced occurrences.
pub fn eliminate(routine: &mut RoutineCode) -> usize {
    let mut repeats = find_repeats(&routine.code);
    // outermost first
    repeats.sort_by_key(|repeat| (repeat.start, Reverse(repeat.end)));

    // a repeat inside a replaced repeat disappears with it
    let mut kept: Vec<Repeat> = Vec::new();
    for repeat in repeats {
        match kept.last() {
            Some(outer) if repeat.start <= outer.end => (),
            _ => kept.push(repeat),
        }
    }
    let replaced = |i: usize| kept.iter().any(|r| r.start <= i && i <= r.end);
    let kept: Vec<Repeat> = kept.iter().copied().filter(|r| !replaced(r.first)).collect();

    if kept.is_empty() {
        return 0;
    }

    // first evaluation to its cache slot
    let mut cached: BTreeMap<usize, Slot> = BTreeMap::new();
    let firsts: HashSet<usize> = kept.iter().map(|r| r.first).collect();
    let mut firsts: Vec<usize> = firsts.into_iter().collect();
    firsts.sort();

    for first in firsts {
        let result = match &routine.code[first] {
            Lir::Binary(op, ty) => op.result_base(*ty),
            _ => continue,
        };
        let index = routine.frame.len();
        routine.frame.push(SlotInfo {
            index,
            type_decl: TypeDescriptor::scalar(result),
            kind: SlotKind::Temporary,
            names: Vec::new(),
        });
        cached.insert(first, index);
    }

    let starts: HashMap<usize, &Repeat> = kept.iter().map(|r| (r.start, r)).collect();
    let code = std::mem::take(&mut routine.code);
    let mut result = Vec::with_capacity(code.len());
    let mut count = 0;
    let mut skip_until = None;

    for (i, instr) in code.into_iter().enumerate() {
        if let Some(end) = skip_until {
            if i <= end {
                continue;
            }
            skip_until = None;
        }
        if let Some(repeat) = starts.get(&i) {
            if let Some(slot) = cached.get(&repeat.first) {
                trace!("{}: {}..={} loaded from %{}", routine.name, repeat.start, repeat.end, slot);

                result.push(Lir::LoadLocal(*slot));
                skip_until = Some(repeat.end);
                count += 1;
                continue;
            }
        }

        result.push(instr);
        if let Some(slot) = cached.get(&i) {
            result.push(Lir::Dup);
            result.push(Lir::Store(*slot));
        }
    }
    routine.code = result;

    count
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn routine(code: Vec<Lir>) -> RoutineCode {
        let frame = (0..5)
            .map(|index| SlotInfo {
                index,
                type_decl: TypeDescriptor::scalar(BaseType::Double),
                kind: SlotKind::Local,
                names: vec![["A", "B", "C", "X", "Y"][index].to_string()],
            })
            .collect();

        RoutineCode { name: "P".to_string(), params: 0, returns: BaseType::Void, frame, code }
    }

    // X := (B / 20) * A
    fn x_assignment(factor: Slot, target: Slot) -> Vec<Lir> {
        vec![
            Lir::LoadLocal(1),
            Lir::LoadConst(Literal::Double(20.0)),
            Lir::Binary(BinaryOp::Div, BaseType::Double),
            Lir::LoadLocal(factor),
            Lir::Binary(BinaryOp::Mul, BaseType::Double),
            Lir::Store(target),
        ]
    }

    #[test]
    fn shared_quotient_evaluated_once() {
        let mut code = x_assignment(0, 3);
        code.extend(x_assignment(2, 4));
        code.push(Lir::Return(false));
        let mut routine = routine(code);

        assert_eq!(eliminate(&mut routine), 1);
        assert_eq!(routine.code, vec![
            Lir::LoadLocal(1),
            Lir::LoadConst(Literal::Double(20.0)),
            Lir::Binary(BinaryOp::Div, BaseType::Double),
            Lir::Dup,
            Lir::Store(5),
            Lir::LoadLocal(0),
            Lir::Binary(BinaryOp::Mul, BaseType::Double),
            Lir::Store(3),
            Lir::LoadLocal(5),
            Lir::LoadLocal(2),
            Lir::Binary(BinaryOp::Mul, BaseType::Double),
            Lir::Store(4),
            Lir::Return(false),
        ]);
        assert_eq!(routine.frame[5].kind, SlotKind::Temporary);
        assert_eq!(routine.frame[5].type_decl, TypeDescriptor::scalar(BaseType::Double));
    }

    #[test]
    fn writes_invalidate() {
        let mut code = x_assignment(0, 3);
        code.extend([Lir::LoadConst(Literal::Double(1.0)), Lir::Store(1)]);
        code.extend(x_assignment(2, 4));
        code.push(Lir::Return(false));
        let mut routine = routine(code.clone());

        assert_eq!(eliminate(&mut routine), 0);
        assert_eq!(routine.code, code);
        assert_eq!(routine.frame.len(), 5);
    }

    #[test]
    fn calls_and_labels_invalidate() {
        for barrier in [
            Lir::Call(CallTarget::Routine("F".to_string()), 0, false),
            Lir::Label(7),
        ] {
            let mut code = x_assignment(0, 3);
            code.push(barrier);
            code.extend(x_assignment(2, 4));
            code.push(Lir::Return(false));
            let mut routine = routine(code.clone());

            assert_eq!(eliminate(&mut routine), 0);
            assert_eq!(routine.code, code);
        }
    }

    #[test]
    fn whole_expression_repeated() {
        let mut code = x_assignment(0, 3);
        code.extend(x_assignment(0, 4));
        code.push(Lir::Return(false));
        let mut routine = routine(code);

        // the outer product is reused, the quotient inside it goes with it
        assert_eq!(eliminate(&mut routine), 1);
        assert_eq!(routine.code, vec![
            Lir::LoadLocal(1),
            Lir::LoadConst(Literal::Double(20.0)),
            Lir::Binary(BinaryOp::Div, BaseType::Double),
            Lir::LoadLocal(0),
            Lir::Binary(BinaryOp::Mul, BaseType::Double),
            Lir::Dup,
            Lir::Store(5),
            Lir::Store(3),
            Lir::LoadLocal(5),
            Lir::Store(4),
            Lir::Return(false),
        ]);
        assert_eq!(routine.frame.len(), 6);
    }
}
