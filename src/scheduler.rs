//! Cycle-accurate event scheduler.
//!
//! Ported from Hatari's `cycInt.c` timer wheel: a statically-sized table of
//! slots, one per known interrupt source, linked into a single doubly-linked
//! list sorted ascending by `due_cycles` with an always-present sentinel at
//! the tail. Handlers are looked up by a tagged identifier rather than a
//! function pointer, so a snapshot never needs to serialize an address and
//! ownership of a slot never needs to outlive the struct holding it.
//!
//! The scheduler does not call into chip code itself — it has no way to, since
//! chip state lives in sibling fields of `EmulatorCore` rather than behind a
//! trait object here. [`Scheduler::dispatch_due`] drives a caller-supplied
//! closure that matches on [`HandlerId`] and routes to the right chip.

/// Every interrupt source the master table must have a slot for, in the
/// same order as Hatari's `pIntHandlerFunctions`. Only ACIA, DMA sound, and
/// SCC slots are driven by chip code in this crate; the remaining slots
/// belong to external collaborators (video shifter, MFP timers, FDC,
/// blitter) and are wired to a logged no-op so the table stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum HandlerId {
    /// The sentinel. Never armed; always the tail of the list.
    Null = 0,
    VideoHbl,
    VideoVbl,
    VideoEndLine,
    MfpTimerA,
    MfpTimerB,
    MfpTimerC,
    MfpTimerD,
    AciaIkbd,
    AciaMidi,
    IkbdResetTimer,
    IkbdAutoSend,
    DmaSoundFrame,
    DmaSoundMicrowire,
    CrossbarRefill25Mhz,
    CrossbarRefill32Mhz,
    FdcUpdate,
    Blitter,
    MidiUpdate,
    SccBrgA,
    SccTxRxA,
    SccRxA,
    SccBrgB,
    SccTxRxB,
    SccRxB,
}

pub const HANDLER_COUNT: usize = 25;

const ALL_HANDLER_IDS: [HandlerId; HANDLER_COUNT] = [
    HandlerId::Null,
    HandlerId::VideoHbl,
    HandlerId::VideoVbl,
    HandlerId::VideoEndLine,
    HandlerId::MfpTimerA,
    HandlerId::MfpTimerB,
    HandlerId::MfpTimerC,
    HandlerId::MfpTimerD,
    HandlerId::AciaIkbd,
    HandlerId::AciaMidi,
    HandlerId::IkbdResetTimer,
    HandlerId::IkbdAutoSend,
    HandlerId::DmaSoundFrame,
    HandlerId::DmaSoundMicrowire,
    HandlerId::CrossbarRefill25Mhz,
    HandlerId::CrossbarRefill32Mhz,
    HandlerId::FdcUpdate,
    HandlerId::Blitter,
    HandlerId::MidiUpdate,
    HandlerId::SccBrgA,
    HandlerId::SccTxRxA,
    HandlerId::SccRxA,
    HandlerId::SccBrgB,
    HandlerId::SccTxRxB,
    HandlerId::SccRxB,
];

impl HandlerId {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    active: bool,
    due_cycles: u64,
    prev: Option<HandlerId>,
    next: Option<HandlerId>,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            active: false,
            due_cycles: u64::MAX,
            prev: None,
            next: None,
        }
    }
}

/// The event scheduler: a fixed table of [`HANDLER_COUNT`] slots threaded
/// into one ascending-`due_cycles` list, plus a cached head for O(1)
/// "is anything due" checks.
pub struct Scheduler {
    slots: [Slot; HANDLER_COUNT],
    /// Cached head of the list — `Null` sentinel when nothing is armed.
    active_head: HandlerId,
    active_cycles: u64,
    /// Overshoot of the most recently dispatched handler; periodic
    /// handlers read this via [`Scheduler::last_delayed_cycles`] and
    /// subtract it from their next rearm delay.
    cyc_delayed: i64,
}

impl Scheduler {
    pub fn new() -> Self {
        let mut s = Self {
            slots: [Slot::empty(); HANDLER_COUNT],
            active_head: HandlerId::Null,
            active_cycles: u64::MAX,
            cyc_delayed: 0,
        };
        s.reset();
        s
    }

    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::empty();
        }
        self.slots[HandlerId::Null.index()] = Slot {
            active: true,
            due_cycles: u64::MAX,
            prev: None,
            next: None,
        };
        self.active_head = HandlerId::Null;
        self.active_cycles = u64::MAX;
        self.cyc_delayed = 0;
    }

    pub fn active_head(&self) -> HandlerId {
        self.active_head
    }

    pub fn active_cycles(&self) -> u64 {
        self.active_cycles
    }

    pub fn is_active(&self, id: HandlerId) -> bool {
        self.slots[id.index()].active
    }

    pub fn due_cycles(&self, id: HandlerId) -> u64 {
        self.slots[id.index()].due_cycles
    }

    /// Overshoot recorded by the last call to [`Scheduler::dispatch_due`]
    /// for the handler currently being serviced.
    pub fn last_delayed_cycles(&self) -> i64 {
        self.cyc_delayed
    }

    // ── Linked-list surgery ─────────────────────────────────────

    /// Unlink `id` from the list. No-op if it wasn't linked.
    fn unlink(&mut self, id: HandlerId) {
        let (prev, next) = {
            let slot = &self.slots[id.index()];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p.index()].next = next,
            None => {
                // id was the head.
                if let Some(n) = next {
                    self.active_head = n;
                    self.active_cycles = self.slots[n.index()].due_cycles;
                }
            }
        }
        if let Some(n) = next {
            self.slots[n.index()].prev = prev;
        }
        let slot = &mut self.slots[id.index()];
        slot.prev = None;
        slot.next = None;
    }

    /// Walk from the current head toward the sentinel, insert `id` before
    /// the first entry whose `due_cycles` is strictly greater. Equal
    /// `due_cycles` keep insertion order (new entry goes after existing
    /// equal ones), matching the stability guarantee.
    fn insert(&mut self, id: HandlerId, due_cycles: u64) {
        self.slots[id.index()].active = true;
        self.slots[id.index()].due_cycles = due_cycles;

        let mut cursor = self.active_head;
        let mut prev: Option<HandlerId> = None;
        loop {
            let cursor_due = self.slots[cursor.index()].due_cycles;
            if cursor_due > due_cycles {
                break;
            }
            prev = Some(cursor);
            cursor = self.slots[cursor.index()].next.expect("sentinel must terminate list");
        }

        self.slots[id.index()].prev = prev;
        self.slots[id.index()].next = Some(cursor);
        self.slots[cursor.index()].prev = Some(id);
        match prev {
            Some(p) => self.slots[p.index()].next = Some(id),
            None => {
                self.active_head = id;
                self.active_cycles = due_cycles;
            }
        }
    }

    // ── Public scheduling operations ────────────────────────────

    /// Arm `id` to fire `due_cycles` (absolute, internal units) from now.
    /// If already active, it is first removed (silent cancel-and-replace).
    fn arm_absolute(&mut self, id: HandlerId, due_cycles: u64) {
        if self.slots[id.index()].active {
            self.unlink(id);
        }
        self.insert(id, due_cycles);
    }

    pub fn add_relative(&mut self, id: HandlerId, now_internal: u64, delay_internal: u64) {
        self.arm_absolute(id, now_internal.saturating_add(delay_internal));
    }

    /// As `add_relative`, but with an explicit correction so back-to-back
    /// MFP-style timer restarts keep exact phase relative to the
    /// triggering instruction instead of the instant this call executes.
    pub fn add_relative_with_offset(
        &mut self,
        id: HandlerId,
        now_internal: u64,
        delay_internal: u64,
        offset_internal: i64,
    ) {
        let due = (now_internal as i64 + delay_internal as i64 + offset_internal).max(0) as u64;
        self.arm_absolute(id, due);
    }

    /// Schedule relative to the handler's own previous expiration rather
    /// than "now", so periodic sources (HBL/VBL) don't accumulate drift.
    pub fn add_absolute(&mut self, id: HandlerId, previous_due: u64, delay_internal: u64) {
        self.arm_absolute(id, previous_due.saturating_add(delay_internal));
    }

    /// Remove, then reinsert at `due_cycles + extra_delta` (which may be
    /// negative). No-op if `id` isn't currently active.
    pub fn modify(&mut self, id: HandlerId, extra_delta: i64) {
        if !self.slots[id.index()].active {
            return;
        }
        let due = (self.slots[id.index()].due_cycles as i64 + extra_delta).max(0) as u64;
        self.unlink(id);
        self.insert(id, due);
    }

    /// Unlink `id` without firing it. Idempotent: calling this on an
    /// already-inactive id is a no-op, matching Property 2.
    pub fn remove(&mut self, id: HandlerId) {
        if id == HandlerId::Null {
            panic!("cannot remove the sentinel");
        }
        if !self.slots[id.index()].active {
            return;
        }
        self.unlink(id);
        self.slots[id.index()].active = false;
    }

    /// Called by (or on behalf of) the handler currently being serviced to
    /// mark itself inactive. Acknowledging the sentinel is a programming
    /// error — the scheduler would have nothing left to advance to.
    pub fn acknowledge_current(&mut self) {
        let id = self.active_head;
        if id == HandlerId::Null {
            panic!("acknowledge_current called with nothing active — sentinel has no handler");
        }
        self.unlink(id);
        self.slots[id.index()].active = false;
    }

    /// Cycles remaining until `id` fires, for diagnostics. Negative if it
    /// is already overdue relative to `now_internal`.
    pub fn find_cycles_remaining(&self, id: HandlerId, now_internal: u64) -> i64 {
        self.slots[id.index()].due_cycles as i64 - now_internal as i64
    }

    /// While the cached head is due at or before `master_clock`, record the
    /// overshoot and invoke `f(self, id, cyc_delayed)`. `f` is expected to
    /// call `acknowledge_current()` (directly, or indirectly via `remove`)
    /// as part of servicing the handler; if it doesn't, the same id would
    /// be dispatched again on the next iteration, matching "acknowledging
    /// is a handler's own job, not an invariant the scheduler enforces".
    ///
    /// Stops as soon as the head is no longer due — it re-checks only the
    /// cached head each iteration, never re-expanding within the loop, so a
    /// handler that reschedules itself with delay 0 fires on the *next*
    /// call rather than live-locking this one.
    pub fn dispatch_due<F>(&mut self, master_clock: u64, mut f: F)
    where
        F: FnMut(&mut Scheduler, HandlerId, i64),
    {
        loop {
            let id = self.active_head;
            let due = self.active_cycles;
            if id == HandlerId::Null || due > master_clock {
                break;
            }
            self.cyc_delayed = master_clock as i64 - due as i64;
            f(self, id, self.cyc_delayed);
        }
    }

    /// All known handler identifiers, in table order — used by the
    /// snapshot module to walk every slot, including ones this crate
    /// never arms, so restore stays total.
    pub fn all_ids() -> &'static [HandlerId; HANDLER_COUNT] {
        &ALL_HANDLER_IDS
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_leaves_only_sentinel_active() {
        let s = Scheduler::new();
        assert_eq!(s.active_head(), HandlerId::Null);
        assert_eq!(s.active_cycles(), u64::MAX);
    }

    #[test]
    fn add_relative_arms_and_becomes_head() {
        let mut s = Scheduler::new();
        s.add_relative(HandlerId::AciaIkbd, 1000, 500);
        assert_eq!(s.active_head(), HandlerId::AciaIkbd);
        assert_eq!(s.active_cycles(), 1500);
    }

    /// Property 1 — scheduler monotonicity: fired ids come out in
    /// non-decreasing due_cycles order.
    #[test]
    fn fires_in_ascending_due_cycles_order() {
        let mut s = Scheduler::new();
        s.add_relative(HandlerId::SccRxA, 0, 300);
        s.add_relative(HandlerId::SccRxB, 0, 100);
        s.add_relative(HandlerId::AciaIkbd, 0, 200);

        let mut fired = Vec::new();
        s.dispatch_due(1000, |sched, id, _cyc_delayed| {
            fired.push(id);
            sched.acknowledge_current();
        });
        assert_eq!(
            fired,
            vec![HandlerId::SccRxB, HandlerId::AciaIkbd, HandlerId::SccRxA]
        );
    }

    #[test]
    fn equal_due_cycles_keep_insertion_order() {
        let mut s = Scheduler::new();
        s.add_relative(HandlerId::SccRxA, 0, 100);
        s.add_relative(HandlerId::SccRxB, 0, 100);

        let mut fired = Vec::new();
        s.dispatch_due(100, |sched, id, _| {
            fired.push(id);
            sched.acknowledge_current();
        });
        assert_eq!(fired, vec![HandlerId::SccRxA, HandlerId::SccRxB]);
    }

    /// Property 2 — scheduler idempotence.
    #[test]
    fn remove_twice_same_as_remove_once() {
        let mut s = Scheduler::new();
        s.add_relative(HandlerId::AciaIkbd, 0, 50);
        s.remove(HandlerId::AciaIkbd);
        let head_after_one = s.active_head();
        s.remove(HandlerId::AciaIkbd);
        assert_eq!(s.active_head(), head_after_one);
        assert_eq!(s.active_head(), HandlerId::Null);
    }

    /// Scenario E — scheduler overshoot reclaim.
    #[test]
    fn overshoot_is_reclaimed_on_rearm() {
        let mut s = Scheduler::new();
        s.add_relative(HandlerId::MfpTimerA, 0, 100);

        let mut next_due = 0u64;
        s.dispatch_due(112, |sched, _id, cyc_delayed| {
            sched.acknowledge_current();
            let corrected_delay = (100i64 - cyc_delayed).max(0) as u64;
            sched.add_relative(HandlerId::MfpTimerA, 112, corrected_delay);
            next_due = sched.due_cycles(HandlerId::MfpTimerA);
        });
        assert_eq!(next_due, 112 + 88);
    }

    #[test]
    fn modify_can_move_due_cycles_earlier() {
        let mut s = Scheduler::new();
        s.add_relative(HandlerId::Blitter, 0, 500);
        s.modify(HandlerId::Blitter, -200);
        assert_eq!(s.due_cycles(HandlerId::Blitter), 300);
    }

    #[test]
    fn all_ids_covers_every_variant_exactly_once() {
        let ids = Scheduler::all_ids();
        assert_eq!(ids.len(), HANDLER_COUNT);
        assert_eq!(ids[0], HandlerId::Null);
    }
}
