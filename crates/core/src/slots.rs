//! Weekly slot grid.
//!
//! The college day is cut into teaching blocks by removing the tea break
//! and recess, and splitting at the start of the reserved (library/project)
//! hour. With the default constraints that gives:
//!
//! - 09:00-11:00
//! - 11:15-13:15
//! - 14:00-16:00
//! - 16:00-17:00
//!
//! Every block yields 1-hour theory slots; every block of at least two hours
//! yields one 2-hour lab slot starting at the block start. Labs therefore
//! never cross a break.

use types::{ClockTime, Constraints, Day, EntryKind, SessionKind, TimeSlot, Window};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotTemplate {
    slots: Vec<TimeSlot>,
}

impl SlotTemplate {
    pub fn new(c: &Constraints) -> Self {
        let blocks = teaching_blocks(c);
        let theory = SessionKind::Theory.minutes();
        let lab = SessionKind::Lab.minutes();

        let mut slots = Vec::new();
        for day in Day::ALL {
            for (i, b) in blocks.iter().enumerate() {
                let mut t = b.start;
                while t.plus(theory) <= b.end {
                    slots.push(TimeSlot {
                        day,
                        start: t,
                        end: t.plus(theory),
                        kind: SessionKind::Theory,
                        block: i as u8 + 1,
                    });
                    t = t.plus(theory);
                }
            }
            for (i, b) in blocks.iter().enumerate() {
                if b.minutes() >= lab {
                    slots.push(TimeSlot {
                        day,
                        start: b.start,
                        end: b.start.plus(lab),
                        kind: SessionKind::Lab,
                        block: i as u8 + 1,
                    });
                }
            }
        }

        Self { slots }
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn theory_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.slots.iter().filter(|s| s.kind == SessionKind::Theory)
    }

    pub fn lab_slots_on(&self, day: Day) -> impl Iterator<Item = &TimeSlot> {
        self.slots
            .iter()
            .filter(move |s| s.kind == SessionKind::Lab && s.day == day)
    }

    /// Size of the weekly theory grid, the denominator for utilization.
    pub fn grid_size(&self) -> usize {
        self.theory_slots().count()
    }
}

/// Maximal break-free intervals of the college day.
pub fn teaching_blocks(c: &Constraints) -> Vec<Window> {
    let mut open = vec![Window::new(c.college_start, c.college_end)];
    for (_, brk) in c.breaks() {
        open = open
            .into_iter()
            .flat_map(|w| subtract(w, brk))
            .collect();
    }

    let split = c.reserved_hour_start;
    let mut blocks = Vec::with_capacity(open.len() + 1);
    for w in open {
        if w.start < split && split < w.end {
            blocks.push(Window::new(w.start, split));
            blocks.push(Window::new(split, w.end));
        } else {
            blocks.push(w);
        }
    }
    blocks
}

fn subtract(w: Window, cut: Window) -> Vec<Window> {
    if !w.overlaps(&cut) {
        return vec![w];
    }
    let mut out = Vec::with_capacity(2);
    if w.start < cut.start {
        out.push(Window::new(w.start, cut.start));
    }
    if cut.end < w.end {
        out.push(Window::new(cut.end, w.end));
    }
    out
}

/// Teaching minutes inside `w` once break time is taken out.
pub fn effective_teaching_minutes(w: Window, c: &Constraints) -> u16 {
    c.breaks()
        .iter()
        .fold(w.minutes(), |acc, (_, brk)| acc.saturating_sub(w.overlap_minutes(brk)))
}

pub fn spans_break(w: Window, c: &Constraints) -> bool {
    c.breaks().iter().any(|(_, brk)| w.overlaps(brk))
}

/// Labs must sit inside one teaching block; a lecture may cross a break
/// only while it keeps enough teaching time.
pub fn session_fits(kind: EntryKind, w: Window, c: &Constraints) -> bool {
    match kind {
        EntryKind::Lab => teaching_blocks(c)
            .iter()
            .any(|b| b.start <= w.start && w.end <= b.end),
        EntryKind::Theory => {
            !spans_break(w, c) || effective_teaching_minutes(w, c) >= c.min_effective_theory_minutes
        }
        _ => true,
    }
}

/// Position of `start` in the preference list; unlisted starts rank last.
pub fn preference_rank(preference: &[ClockTime], start: ClockTime) -> usize {
    preference
        .iter()
        .position(|&p| p == start)
        .unwrap_or(preference.len())
}
