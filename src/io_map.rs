//! I/O address dispatch for `$FF8000-$FFFFFF`.
//!
//! Generalizes the teacher's page-indexed `IoBank`/`IoChip` router from
//! 256-byte C64 pages to the handful of small, non-contiguous register
//! windows a real Atari ST I/O area actually has. Rather than a
//! precomputed per-page table (most of this 32 KB range is unmapped), the
//! router matches address ranges directly — cheap enough since this runs
//! once per bus access, not once per byte of the fully decoded space.

/// Every memory-mapped device implements this trait.
pub trait Bank {
    fn poke(&mut self, address: u32, value: u8);
    fn peek(&self, address: u32) -> u8;

    /// Mutable peek for devices with read side effects (ACIA's RDR,
    /// SCC's RR2 soft-IACK). Default delegates to `peek`.
    fn peek_mut(&mut self, address: u32) -> u8 {
        self.peek(address)
    }
}

/// Which device (or which *kind* of unmapped hole) owns a given address.
/// Two distinct unmapped variants exist so that one of them overlapping a
/// real register window under future expansion doesn't silently alias to
/// the other's bus-error behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoRegion {
    DmaSoundAndMicrowire,
    Blitter,
    AciaKeyboardAndMidi,
    Scc,
    VmeScu,
    /// Addresses inside `$FF8000-$FFFFFF` that no chip answers, reported
    /// via `BusError` — the common case.
    UnmappedGeneral,
    /// Addresses that fall inside a register window's reserved padding
    /// (e.g. the unused half of the Blitter's declared 64-byte span) — kept
    /// distinct from `UnmappedGeneral` so a bus-error stub covering a
    /// whole window doesn't falsely claim the general hole's semantics.
    UnmappedReserved,
}

pub const IO_BASE: u32 = 0xFF_8000;
pub const IO_END: u32 = 0xFF_FFFF;

/// Classifies a 24-bit address into the region responsible for it. Callers
/// are expected to have already confirmed `IO_BASE..=IO_END` contains the
/// address; addresses outside that range still classify sanely (as
/// `UnmappedGeneral`) rather than panicking.
pub fn classify(address: u32) -> IoRegion {
    match address {
        0xFF_8900..=0xFF_893F => IoRegion::DmaSoundAndMicrowire,
        0xFF_8A00..=0xFF_8A3D => IoRegion::Blitter,
        0xFF_8A3E..=0xFF_8A3F => IoRegion::UnmappedReserved,
        0xFF_FC00..=0xFF_FC07 => IoRegion::AciaKeyboardAndMidi,
        0xFF_8C80..=0xFF_8C87 => IoRegion::Scc,
        0xFF_8E01..=0xFF_8E0F => IoRegion::VmeScu,
        _ => IoRegion::UnmappedGeneral,
    }
}

/// Splits a multi-byte access into its constituent byte addresses, high
/// byte first — the 68000 bus is big-endian and every chip in this table
/// is only ever accessed a byte (or byte-pair) at a time internally.
pub fn byte_addresses_for_word(base_address: u32) -> [u32; 2] {
    [base_address, base_address + 1]
}

pub fn byte_addresses_for_long(base_address: u32) -> [u32; 4] {
    [base_address, base_address + 1, base_address + 2, base_address + 3]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dma_sound_range_classifies_correctly() {
        assert_eq!(classify(0xFF_8900), IoRegion::DmaSoundAndMicrowire);
        assert_eq!(classify(0xFF_893F), IoRegion::DmaSoundAndMicrowire);
        assert_eq!(classify(0xFF_8940), IoRegion::UnmappedGeneral);
    }

    #[test]
    fn blitter_reserved_tail_is_distinct_from_general_hole() {
        assert_eq!(classify(0xFF_8A3D), IoRegion::Blitter);
        assert_eq!(classify(0xFF_8A3E), IoRegion::UnmappedReserved);
        assert_ne!(classify(0xFF_8A3E), classify(0xFF_9000));
    }

    #[test]
    fn acia_scc_vme_ranges_classify_correctly() {
        assert_eq!(classify(0xFF_FC00), IoRegion::AciaKeyboardAndMidi);
        assert_eq!(classify(0xFF_8C80), IoRegion::Scc);
        assert_eq!(classify(0xFF_8E01), IoRegion::VmeScu);
    }

    #[test]
    fn word_and_long_splits_are_big_endian_order() {
        assert_eq!(byte_addresses_for_word(0xFF_8900), [0xFF_8900, 0xFF_8901]);
        assert_eq!(
            byte_addresses_for_long(0xFF_8900),
            [0xFF_8900, 0xFF_8901, 0xFF_8902, 0xFF_8903]
        );
    }
}
