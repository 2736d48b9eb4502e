use crate::compiler::codegen::{frame::*, lir::*, RoutineCode};
use crate::compiler::common::types::TypeDescriptor;
use log::trace;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalEntry {
    pub slot: Slot,
    pub start: usize,
    pub end: usize,
    pub type_decl: TypeDescriptor,
}

fn successors(code: &[Lir], labels: &HashMap<LabelId, usize>, i: usize) -> Vec<usize> {
    let next = (i + 1 < code.len()).then_some(i + 1);

    match &code[i] {
        Lir::Branch(label) => labels.get(label).copied().into_iter().collect(),
        Lir::BranchIf(_, label) => next.into_iter().chain(labels.get(label).copied()).collect(),
        Lir::Return(_) => Vec::new(),
        _ => next.into_iter().collect(),
    }
}

/// Slots live on entry of every instruction
pub fn liveness(code: &[Lir]) -> Vec<HashSet<Slot>> {
    let labels: HashMap<LabelId, usize> = code
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| match instr {
            Lir::Label(label) => Some((*label, i)),
            _ => None,
        })
        .collect();
    let successors: Vec<Vec<usize>> = (0..code.len()).map(|i| successors(code, &labels, i)).collect();

    let mut live_in = vec![HashSet::new(); code.len()];
    let mut changed = true;

    // backwards until nothing changes, back-edges need more than one round
    while changed {
        changed = false;

        for i in (0..code.len()).rev() {
            let mut live: HashSet<Slot> = successors[i]
                .iter()
                .flat_map(|succ| live_in[*succ].iter().copied())
                .collect();

            if let Some(slot) = code[i].defined_slot() {
                live.remove(&slot);
            }
            if let Some(slot) = code[i].used_slot() {
                live.insert(slot);
            }
            if live != live_in[i] {
                live_in[i] = live;
                changed = true;
            }
        }
    }
    live_in
}

/// Range from the first to the last instruction a slot is live at or referenced by,
/// sorted by start. Slots read before being written are live from the routine's entry.
pub fn live_intervals(routine: &RoutineCode) -> Vec<IntervalEntry> {
    let live_in = liveness(&routine.code);
    let mut bounds: HashMap<Slot, (usize, usize)> = HashMap::new();

    let mut extend = |slot: Slot, i: usize| {
        let (start, end) = bounds.entry(slot).or_insert((i, i));
        *start = (*start).min(i);
        *end = (*end).max(i);
    };
    for (i, instr) in routine.code.iter().enumerate() {
        for slot in &live_in[i] {
            extend(*slot, i);
        }
        if let Some(slot) = instr.slot() {
            extend(slot, i);
        }
    }

    let mut intervals: Vec<IntervalEntry> = bounds
        .into_iter()
        .filter_map(|(slot, (start, end))| {
            routine.frame.get(slot).map(|info| IntervalEntry {
                slot,
                start,
                end,
                type_decl: info.type_decl.clone(),
            })
        })
        .collect();
    intervals.sort_by_key(|interval| (interval.start, interval.slot));

    intervals
}

/// Linear scan over the live intervals, a slot whose interval has ended is reused by the
/// next interval of the same type. Parameters keep their slots, slots that are never
/// referenced are dropped. Returns how many slots the frame shrank by.
pub fn reduce(routine: &mut RoutineCode) -> usize {
    let intervals = live_intervals(routine);
    let before = routine.frame.len();

    let mut mapping: HashMap<Slot, Slot> = HashMap::new();
    let mut frame: Vec<SlotInfo> = Vec::with_capacity(before);

    for info in routine.frame.iter().take(routine.params) {
        mapping.insert(info.index, frame.len());
        frame.push(info.clone());
    }

    let mut free: HashMap<TypeDescriptor, BTreeSet<Slot>> = HashMap::new();
    // end, new slot, type
    let mut active: Vec<(usize, Slot, TypeDescriptor)> = Vec::new();

    for interval in intervals.iter().filter(|interval| interval.slot >= routine.params) {
        active.retain(|(end, index, type_decl)| {
            if *end < interval.start {
                free.entry(type_decl.clone()).or_default().insert(*index);
                false
            } else {
                true
            }
        });

        let old = &routine.frame[interval.slot];
        let index = match free.get_mut(&interval.type_decl).and_then(|slots| slots.pop_first()) {
            Some(index) => {
                trace!("{}: %{} shares slot %{}", routine.name, interval.slot, index);

                let info = &mut frame[index];
                info.names.extend(old.names.iter().cloned());
                if info.kind == SlotKind::Temporary {
                    info.kind = old.kind;
                }
                index
            }
            None => {
                let index = frame.len();
                frame.push(SlotInfo { index, ..old.clone() });
                index
            }
        };

        mapping.insert(interval.slot, index);
        active.push((interval.end, index, interval.type_decl.clone()));
    }

    for instr in routine.code.iter_mut() {
        if let Some(slot) = instr.slot_mut() {
            if let Some(new) = mapping.get(slot) {
                *slot = *new;
            }
        }
    }
    routine.frame = frame;

    before - routine.frame.len()
}
