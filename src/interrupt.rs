//! Interrupt aggregator.
//!
//! Computes the CPU's interrupt priority level (IPL, 0..7) from the pending
//! sources and answers the CPU's interrupt-acknowledge cycle. Generalizes
//! the mask/trigger/clear shape of a CIA `InterruptSource` to three
//! independent sources feeding one aggregated line instead of one source's
//! internal mask register.
//!
//! Holds no pointer back to the chips that raise lines on it — each chip
//! calls [`InterruptAggregator::set_line`] as a free function call, same as
//! an external collaborator would; the aggregator itself is owned by
//! `EmulatorCore`, one level above every chip.

/// The three things that can assert a CPU interrupt line in this core. The
/// 68000 instruction decoder and bus-error logic live outside the crate;
/// they read [`InterruptAggregator::ipl`] and call
/// [`InterruptAggregator::iack`] but don't feed lines in themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrqSource {
    /// The MFP's own auto-vector chain — opaque here, always level 6.
    Mfp,
    /// The SCC, vectored or autovectored, always level 5.
    Scc,
}

impl IrqSource {
    fn level(self) -> u8 {
        match self {
            IrqSource::Mfp => 6,
            IrqSource::Scc => 5,
        }
    }
}

/// A vector (or request for autovectoring) returned from an interrupt
/// acknowledge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IackResult {
    Vector(u8),
    Autovector,
}

pub struct InterruptAggregator {
    mfp_asserted: bool,
    scc_asserted: bool,
    ipl: u8,
}

impl InterruptAggregator {
    pub fn new() -> Self {
        Self {
            mfp_asserted: false,
            scc_asserted: false,
            ipl: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current aggregated interrupt priority level observed by the CPU.
    pub fn ipl(&self) -> u8 {
        self.ipl
    }

    /// Edge-sensitive line update from `source`. Recomputes the aggregated
    /// IPL as the max of currently-asserted sources' levels.
    pub fn set_line(&mut self, source: IrqSource, asserted: bool) {
        match source {
            IrqSource::Mfp => self.mfp_asserted = asserted,
            IrqSource::Scc => self.scc_asserted = asserted,
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let mut ipl = 0u8;
        if self.mfp_asserted {
            ipl = ipl.max(IrqSource::Mfp.level());
        }
        if self.scc_asserted {
            ipl = ipl.max(IrqSource::Scc.level());
        }
        let changed = ipl != self.ipl;
        self.ipl = ipl;
        if changed {
            log::trace!("interrupt aggregator: ipl -> {ipl}");
        }
    }

    /// Called by the CPU during its interrupt-acknowledge cycle for the
    /// currently asserted `level`. Delegates level-5 (SCC) acknowledges to
    /// the caller-supplied closure, which runs the SCC's own IACK protocol
    /// (soft or hard, per §4.6) and may return `None` if WR9's No-Vector
    /// bit forces autovectoring.
    pub fn iack<F>(&mut self, level: u8, scc_iack: F) -> IackResult
    where
        F: FnOnce() -> Option<u8>,
    {
        if level == IrqSource::Scc.level() && self.scc_asserted {
            return match scc_iack() {
                Some(vector) => IackResult::Vector(vector),
                None => IackResult::Autovector,
            };
        }
        // MFP autovector chain and anything else: this crate doesn't own
        // MFP vector logic, so the CPU-side collaborator is expected to
        // fall back to autovectoring when it isn't the SCC.
        IackResult::Autovector
    }
}

impl Default for InterruptAggregator {
    fn default() -> Self {
        Self::new()
    }
}
