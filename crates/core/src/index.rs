//! In-memory working schedule for one generation run.
//!
//! Entries live in an arena addressed by [`EntryHandle`]. The primary index
//! is keyed by (day, start); secondary indices by professor and scope keep
//! conflict lookups to the handful of entries that can actually collide.
//! Entries from other cohorts are "foreign": they occupy professors and lab
//! capacity but never cohort slots, and they are not emitted.

use std::collections::{BTreeMap, HashMap};
use types::{ClockTime, Day, EntryKind, ProfessorId, ScheduleEntry, Scope, Window};

pub type SlotKey = (Day, ClockTime);
pub type LabTriple = (Day, ClockTime, ClockTime);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle(usize);

#[derive(Clone, Debug)]
struct Placed {
    entry: ScheduleEntry,
    foreign: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ScheduleIndex {
    arena: Vec<Option<Placed>>,
    by_slot: BTreeMap<SlotKey, Vec<EntryHandle>>,
    by_professor: HashMap<ProfessorId, Vec<EntryHandle>>,
    by_scope: HashMap<Scope, Vec<EntryHandle>>,
    lab_usage: HashMap<LabTriple, u32>,
}

pub fn lab_triple(e: &ScheduleEntry) -> LabTriple {
    (e.day, e.start, e.end)
}

impl ScheduleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers committed entries of other cohorts.
    pub fn seed_external(&mut self, entries: impl IntoIterator<Item = ScheduleEntry>) {
        for entry in entries {
            self.push(entry, true);
        }
    }

    pub fn insert(&mut self, entry: ScheduleEntry) -> EntryHandle {
        self.push(entry, false)
    }

    fn push(&mut self, entry: ScheduleEntry, foreign: bool) -> EntryHandle {
        let h = EntryHandle(self.arena.len());
        if let Some(p) = &entry.professor_id {
            self.by_professor.entry(p.clone()).or_default().push(h);
        }
        if entry.kind == EntryKind::Lab {
            *self.lab_usage.entry(lab_triple(&entry)).or_default() += 1;
        }
        if !foreign {
            self.by_slot.entry((entry.day, entry.start)).or_default().push(h);
            self.by_scope.entry(entry.scope.clone()).or_default().push(h);
        }
        self.arena.push(Some(Placed { entry, foreign }));
        h
    }

    pub fn remove(&mut self, h: EntryHandle) -> Option<ScheduleEntry> {
        let placed = self.arena.get_mut(h.0)?.take()?;
        let e = &placed.entry;
        if let Some(p) = &e.professor_id {
            if let Some(v) = self.by_professor.get_mut(p) {
                v.retain(|x| *x != h);
            }
        }
        if e.kind == EntryKind::Lab {
            if let Some(n) = self.lab_usage.get_mut(&lab_triple(e)) {
                *n = n.saturating_sub(1);
            }
        }
        if !placed.foreign {
            if let Some(v) = self.by_slot.get_mut(&(e.day, e.start)) {
                v.retain(|x| *x != h);
            }
            if let Some(v) = self.by_scope.get_mut(&e.scope) {
                v.retain(|x| *x != h);
            }
        }
        Some(placed.entry)
    }

    pub fn get(&self, h: EntryHandle) -> Option<&ScheduleEntry> {
        self.arena
            .get(h.0)
            .and_then(|p| p.as_ref())
            .map(|p| &p.entry)
    }

    /// Live cohort entries in (day, start) order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryHandle, &ScheduleEntry)> {
        self.by_slot
            .values()
            .flatten()
            .filter_map(move |&h| self.get(h).map(|e| (h, e)))
    }

    pub fn len(&self) -> usize {
        self.by_slot.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cohort entries on `day` overlapping `w`, whatever their scope.
    pub fn overlapping(&self, day: Day, w: Window) -> impl Iterator<Item = &ScheduleEntry> {
        self.by_slot
            .range((day, ClockTime::from_minutes(0))..(day, w.end))
            .flat_map(|(_, hs)| hs.iter())
            .filter_map(move |&h| self.get(h))
            .filter(move |e| e.window().overlaps(&w))
    }

    /// Whether anything attended by `scope` overlaps `w` on `day`.
    pub fn scope_busy(&self, scope: &Scope, day: Day, w: Window) -> bool {
        self.by_scope
            .iter()
            .filter(|(s, _)| s.intersects(scope))
            .flat_map(|(_, hs)| hs.iter())
            .filter_map(|&h| self.get(h))
            .any(|e| e.day == day && e.window().overlaps(&w))
    }

    /// Whether the professor is committed anywhere, in any cohort, during `w`.
    pub fn professor_busy(&self, professor: &ProfessorId, day: Day, w: Window) -> bool {
        self.by_professor
            .get(professor)
            .into_iter()
            .flatten()
            .filter_map(|&h| self.get(h))
            .any(|e| e.day == day && e.window().overlaps(&w))
    }

    pub fn lab_usage(&self, triple: LabTriple) -> u32 {
        self.lab_usage.get(&triple).copied().unwrap_or(0)
    }

    /// Handles of cohort entries matching `pred`, in (day, start) order.
    pub fn select(&self, pred: impl Fn(&ScheduleEntry) -> bool) -> Vec<EntryHandle> {
        self.iter().filter(|(_, e)| pred(e)).map(|(h, _)| h).collect()
    }

    /// Drops the index, returning cohort entries in (day, start) order.
    pub fn into_entries(self) -> Vec<ScheduleEntry> {
        let ScheduleIndex {
            mut arena, by_slot, ..
        } = self;
        by_slot
            .into_values()
            .flatten()
            .filter_map(|h| arena[h.0].take())
            .map(|p| p.entry)
            .collect()
    }
}
