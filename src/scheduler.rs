//! Addition scheduler for hops and malt.
//!
//! Every addition is a one-shot timer measured on its phase clock: the boil
//! timer for hops, the mashing clock for malt.  An addition whose input time
//! is later than the pre-notification lead also gets a second one-shot that
//! fires `lead` seconds earlier, so the brewer can weigh it in time.
//!
//! ```text
//!  clock start                     t - lead            t
//!  ────┼──────────────────────────────┼────────────────┼──────▶
//!                                 PreNotice           Due
//! ```
//!
//! The schedule is driven with the total elapsed time, so a late tick fires
//! everything that came due in between, in input-time order.  If a tick
//! jumps past both instants of one addition only the `Due` event is emitted.

use log::info;

use crate::model::{HopAddition, MaltAddition};

/// Something that goes into the kettle at a fixed time.
pub trait Addition: Clone {
    /// Log prefix for this kind of addition.
    const KIND: &'static str;

    fn name(&self) -> &str;
    fn input_time_secs(&self) -> i64;
}

impl Addition for HopAddition {
    const KIND: &'static str = "Hops";

    fn name(&self) -> &str {
        &self.name
    }

    fn input_time_secs(&self) -> i64 {
        self.input_time_secs
    }
}

impl Addition for MaltAddition {
    const KIND: &'static str = "Malt";

    fn name(&self) -> &str {
        &self.name
    }

    fn input_time_secs(&self) -> i64 {
        self.input_time_secs
    }
}

// ═══════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum AdditionEvent<A> {
    /// `lead_secs` before the addition is due.
    PreNotice {
        index: usize,
        addition: A,
        lead_secs: u64,
    },
    /// The addition should go into the kettle now.
    Due { index: usize, addition: A },
}

pub type HopEvent = AdditionEvent<HopAddition>;
pub type MaltEvent = AdditionEvent<MaltAddition>;

// ═══════════════════════════════════════════════════════════════
//  Schedule
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Entry<A> {
    addition: A,
    due_secs: u64,
    /// `None` when the addition comes too early for advance notice.
    notice_secs: Option<u64>,
    noticed: bool,
    fired: bool,
}

#[derive(Debug, Clone)]
pub struct AdditionSchedule<A> {
    entries: Vec<Entry<A>>,
    lead_secs: u64,
}

pub type HopSchedule = AdditionSchedule<HopAddition>;
pub type MaltSchedule = AdditionSchedule<MaltAddition>;

impl<A: Addition> AdditionSchedule<A> {
    pub fn new(additions: impl IntoIterator<Item = A>, lead_secs: u64) -> Self {
        let mut entries: Vec<Entry<A>> = additions
            .into_iter()
            .map(|addition| {
                let due_secs = u64::try_from(addition.input_time_secs()).unwrap_or(0);
                let notice_secs = (due_secs > lead_secs).then(|| due_secs - lead_secs);
                Entry {
                    addition,
                    due_secs,
                    notice_secs,
                    noticed: false,
                    fired: false,
                }
            })
            .collect();
        entries.sort_by_key(|e| e.due_secs);
        Self { entries, lead_secs }
    }

    /// Emit every event that is due at `elapsed_secs` on the phase clock.
    pub fn tick(&mut self, elapsed_secs: u64, out: &mut Vec<AdditionEvent<A>>) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.fired {
                continue;
            }
            if elapsed_secs >= entry.due_secs {
                info!(
                    "{}: '{}' due at {}s",
                    A::KIND,
                    entry.addition.name(),
                    entry.due_secs
                );
                entry.fired = true;
                entry.noticed = true;
                out.push(AdditionEvent::Due {
                    index,
                    addition: entry.addition.clone(),
                });
                continue;
            }
            match entry.notice_secs {
                Some(at) if !entry.noticed && elapsed_secs >= at => {
                    info!(
                        "{}: '{}' pre-notice ({}s ahead)",
                        A::KIND,
                        entry.addition.name(),
                        self.lead_secs
                    );
                    entry.noticed = true;
                    out.push(AdditionEvent::PreNotice {
                        index,
                        addition: entry.addition.clone(),
                        lead_secs: self.lead_secs,
                    });
                }
                _ => {}
            }
        }
    }

    /// Additions that have not come due yet.
    pub fn remaining(&self) -> usize {
        self.entries.iter().filter(|e| !e.fired).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn addition(name: &str, at: i64) -> HopAddition {
        HopAddition {
            name: name.into(),
            amount_grams: 20.0,
            input_time_secs: at,
        }
    }

    fn run<A: Addition>(schedule: &mut AdditionSchedule<A>, secs: u64) -> Vec<AdditionEvent<A>> {
        let mut out = Vec::new();
        schedule.tick(secs, &mut out);
        out
    }

    #[test]
    fn prenotice_then_due() {
        let mut sched = HopSchedule::new(vec![addition("Saaz", 600)], 180);

        assert!(run(&mut sched, 419).is_empty());
        let events = run(&mut sched, 420);
        assert!(matches!(
            events.as_slice(),
            [HopEvent::PreNotice { index: 0, lead_secs: 180, .. }]
        ));
        assert!(run(&mut sched, 500).is_empty());

        let events = run(&mut sched, 600);
        assert!(matches!(events.as_slice(), [HopEvent::Due { index: 0, .. }]));
        assert_eq!(sched.remaining(), 0);
        assert!(run(&mut sched, 3600).is_empty());
    }

    #[test]
    fn early_addition_gets_no_prenotice() {
        let mut sched = HopSchedule::new(vec![addition("bittering", 0)], 180);
        let events = run(&mut sched, 0);
        assert!(matches!(events.as_slice(), [HopEvent::Due { .. }]));

        let mut sched = HopSchedule::new(vec![addition("edge", 180)], 180);
        assert!(run(&mut sched, 0).is_empty());
        assert!(matches!(run(&mut sched, 180).as_slice(), [HopEvent::Due { .. }]));
    }

    #[test]
    fn late_tick_fires_in_input_order_without_prenotice() {
        let mut sched =
            HopSchedule::new(vec![addition("late", 900), addition("early", 400)], 180);
        let events = run(&mut sched, 1000);
        let names: Vec<&str> = events
            .iter()
            .map(|e| match e {
                HopEvent::Due { addition, .. } => addition.name.as_str(),
                HopEvent::PreNotice { .. } => "notice",
            })
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn empty_plan_has_nothing_to_do() {
        let mut sched = HopSchedule::new(Vec::new(), 180);
        assert!(sched.is_empty());
        assert!(run(&mut sched, 10_000).is_empty());
    }

    #[test]
    fn malt_uses_the_same_timing() {
        let malt = MaltAddition {
            name: "Munich".into(),
            amount_grams: 500.0,
            input_time_secs: 900,
        };
        let mut sched = MaltSchedule::new(vec![malt], 300);
        assert!(matches!(
            run(&mut sched, 600).as_slice(),
            [MaltEvent::PreNotice { lead_secs: 300, .. }]
        ));
        assert!(matches!(run(&mut sched, 900).as_slice(), [MaltEvent::Due { .. }]));
        assert_eq!(sched.remaining(), 0);
    }
}
