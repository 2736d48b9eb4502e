use crate::compiler::codegen::lir::Slot;
use crate::compiler::common::types::*;
use std::collections::HashMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Parameter,
    Local,
    /// Introduced by the code generator or the optimizer, has no source name
    Temporary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub index: Slot,
    pub type_decl: TypeDescriptor,
    pub kind: SlotKind,
    /// Source names of all variables sharing this slot
    pub names: Vec<String>,
}
impl Display for SlotInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            SlotKind::Parameter => "param",
            SlotKind::Local => "local",
            SlotKind::Temporary => "temp",
        };
        write!(f, "%{} {} {}", self.index, kind, self.type_decl)?;
        if !self.names.is_empty() {
            write!(f, " {}", self.names.join("/"))?;
        }
        Ok(())
    }
}

/// Slots of the routine being translated. Parameters take the first slots, locals are
/// numbered in order of first use.
#[derive(Debug, Default)]
pub struct LocalFrame {
    slots: Vec<SlotInfo>,
    by_name: HashMap<String, Slot>,
}

impl LocalFrame {
    pub fn new() -> Self {
        LocalFrame::default()
    }

    fn push(&mut self, name: Option<&str>, type_decl: TypeDescriptor, kind: SlotKind) -> Slot {
        let index = self.slots.len();
        self.slots.push(SlotInfo {
            index,
            type_decl,
            kind,
            names: name.map(|n| vec![n.to_string()]).unwrap_or_default(),
        });
        if let Some(name) = name {
            self.by_name.insert(name.to_string(), index);
        }
        index
    }

    pub fn param(&mut self, name: &str, type_decl: TypeDescriptor) -> Slot {
        self.push(Some(name), type_decl, SlotKind::Parameter)
    }

    /// Slot of the named local, allocated on first use
    pub fn local(&mut self, name: &str, type_decl: &TypeDescriptor) -> Slot {
        match self.by_name.get(name) {
            Some(slot) => *slot,
            None => self.push(Some(name), type_decl.clone(), SlotKind::Local),
        }
    }

    pub fn temp(&mut self, type_decl: TypeDescriptor) -> Slot {
        self.push(None, type_decl, SlotKind::Temporary)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn into_slots(self) -> Vec<SlotInfo> {
        self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        let int = TypeDescriptor::scalar(BaseType::Integer);
        let mut frame = LocalFrame::new();

        assert_eq!(frame.param("N", int.clone()), 0);
        assert_eq!(frame.local("I", &int), 1);
        assert_eq!(frame.temp(int.clone()), 2);
        assert_eq!(frame.local("J", &int), 3);
        // same local, same slot
        assert_eq!(frame.local("I", &int), 1);

        let slots = frame.into_slots();
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[2].kind, SlotKind::Temporary);
        assert_eq!(slots[3].to_string(), "%3 local INTEGER J");
    }
}
