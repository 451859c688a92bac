//! Microwire bit-serial interface (`dmaSnd.c`'s `microwire_s` and
//! `DmaSnd_InterruptHandler_Microwire`). Shifts a 16-bit data word out one
//! bit per tick — the scheduler arms [`crate::scheduler::HandlerId::DmaSoundMicrowire`]
//! every 8 CPU cycles for as long as a transfer is in progress — and, once
//! 16 bits have gone out, decodes the 11-bit command frame and applies it
//! to the attached [`Lmc1992`].

use crate::dma_sound::lmc1992::Lmc1992;

const TOTAL_STEPS: u8 = 16;

/// Command nibble occupying bits 10..8 of the 11-bit address/data frame
/// (`10_aaa_ddddd`, address in bits 10..8, data in bits 4..0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Mixing,
    Bass,
    Treble,
    MasterVolume,
    RightVolume,
    LeftVolume,
    Unknown,
}

impl Command {
    fn decode(address: u8) -> Self {
        match address {
            0 => Command::Mixing,
            1 => Command::Bass,
            2 => Command::Treble,
            3 => Command::MasterVolume,
            4 => Command::RightVolume,
            5 => Command::LeftVolume,
            _ => Command::Unknown,
        }
    }
}

/// Bit-serial shift register state for one in-progress (or idle)
/// Microwire transfer.
#[derive(Debug, Clone, Copy)]
pub struct Microwire {
    data: u16,
    mask: u16,
    steps_left: u8,
}

impl Microwire {
    pub fn new() -> Self {
        Self {
            data: 0,
            mask: 0,
            steps_left: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_busy(&self) -> bool {
        self.steps_left > 0
    }

    /// Loads a new 16-bit frame and begins shifting it out.
    pub fn start(&mut self, data: u16) {
        self.data = data;
        self.mask = 0xFFFF;
        self.steps_left = TOTAL_STEPS;
    }

    /// The live register value, with already-shifted-out bits masked to
    /// zero — this is what a CPU read of the data register observes mid
    /// transfer, matching the real chip's visible shift progress.
    pub fn register_value(&self) -> u16 {
        self.data & self.mask
    }

    /// Advances one bit. Returns the decoded command once the 16th bit has
    /// gone out, or `None` if the transfer isn't complete yet (or isn't
    /// running at all).
    pub fn clock_tick(&mut self, lmc: &mut Lmc1992) -> bool {
        if self.steps_left == 0 {
            return false;
        }
        self.mask >>= 1;
        self.steps_left -= 1;
        if self.steps_left != 0 {
            return false;
        }
        self.apply(lmc);
        true
    }

    fn apply(&self, lmc: &mut Lmc1992) {
        // Frame layout: bits 15-14 start marker, 13-11 unused, 10-8
        // address, 7-5 unused, 4-0 data, matching the real 11-bit
        // `10_aaa_ddddd` Microwire protocol the chip actually uses.
        let address = ((self.data >> 8) & 0x7) as u8;
        let value = (self.data & 0x1F) as u8;
        match Command::decode(address) {
            Command::Mixing => lmc.set_mixing(value),
            Command::Bass => lmc.set_bass(value),
            Command::Treble => lmc.set_treble(value),
            Command::MasterVolume => lmc.set_master_volume(value),
            Command::RightVolume => lmc.set_right_volume(value),
            Command::LeftVolume => lmc.set_left_volume(value),
            Command::Unknown => log::warn!("microwire: unrecognized command address {address}"),
        }
    }
}

impl Default for Microwire {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(address: u8, value: u8) -> u16 {
        0b10_000_000_00000 | ((address as u16) << 8) | (value as u16 & 0x1F)
    }

    #[test]
    fn full_transfer_takes_sixteen_ticks_and_applies_once() {
        let mut mw = Microwire::new();
        let mut lmc = Lmc1992::new(44100);
        mw.start(frame(3, 42));

        let mut completions = 0;
        for _ in 0..16 {
            if mw.clock_tick(&mut lmc) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert!(!mw.is_busy());
        assert_eq!(lmc.master_vol, crate::dma_sound::lmc1992::MASTER_VOLUME_TABLE[42]);
    }

    #[test]
    fn ticking_an_idle_register_is_a_no_op() {
        let mut mw = Microwire::new();
        let mut lmc = Lmc1992::new(44100);
        assert!(!mw.clock_tick(&mut lmc));
    }

    #[test]
    fn register_value_masks_off_shifted_bits() {
        let mut mw = Microwire::new();
        let mut lmc = Lmc1992::new(44100);
        let data = frame(1, 7);
        mw.start(data);
        assert_eq!(mw.register_value(), data);
        mw.clock_tick(&mut lmc);
        assert_eq!(mw.register_value(), data & 0x7FFF);
    }

    #[test]
    fn bass_and_treble_commands_route_correctly() {
        let mut mw = Microwire::new();
        let mut lmc = Lmc1992::new(44100);
        mw.start(frame(1, 10));
        for _ in 0..16 {
            mw.clock_tick(&mut lmc);
        }
        assert_eq!(lmc.bass_level, crate::dma_sound::lmc1992::BASS_TREBLE_TABLE[10]);

        mw.start(frame(2, 5));
        for _ in 0..16 {
            mw.clock_tick(&mut lmc);
        }
        assert_eq!(lmc.treble_level, crate::dma_sound::lmc1992::BASS_TREBLE_TABLE[5]);
    }
}
