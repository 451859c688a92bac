//! Top-level emulator core.
//!
//! Wires together the event scheduler, clock-domain converter, interrupt
//! aggregator, the two ACIAs, the DMA sound engine, and the SCC behind one
//! address-dispatched I/O surface. Doesn't own CPU state or main memory —
//! those, along with 68000 instruction semantics, are the embedder's job;
//! this struct only answers `$FF8000-$FFFFFF` accesses and advances chip
//! state as the scheduler fires.

use crate::acia::{Acia, ClockDivide};
use crate::clock::ClockDomain;
use crate::config::{MachineConfig, MachineType};
use crate::dma_sound::fifo::{Channel, MemoryBus};
use crate::dma_sound::DmaSoundEngine;
use crate::error::{CoreError, CoreResult};
use crate::interrupt::{IackResult, InterruptAggregator, IrqSource};
use crate::io_map::{self, IoRegion};
use crate::scc::{ChannelId, Scc, SerialSink};
use crate::scheduler::{HandlerId, Scheduler};

// ── DMA sound control/mode register bits (`dmaSnd.h`) ─────────
const DMASNDCTRL_PLAY: u8 = 0x01;
const DMASNDCTRL_PLAYLOOP: u8 = 0x02;
const DMASNDMODE_MONO: u8 = 0x80;

/// The byte-level I/O latches behind `$FF8900-$FF893F` that aren't part of
/// [`DmaSoundEngine`]'s own runtime state: the frame start/end addresses
/// are written a byte at a time and only combined into a live address on a
/// control-register play edge (`dmaSnd.c`'s `DmaSnd_StartNewFrame`), and
/// the Microwire data register is written a byte at a time too.
#[derive(Debug, Clone, Copy, Default)]
struct DmaSoundRegs {
    control: u8,
    frame_start_hi: u8,
    frame_start_mid: u8,
    frame_start_lo: u8,
    frame_end_hi: u8,
    frame_end_mid: u8,
    frame_end_lo: u8,
    sound_mode: u8,
    microwire_data_hi: u8,
    microwire_mask_hi: u8,
    microwire_mask_lo: u8,
}

pub struct EmulatorCore {
    pub config: MachineConfig,
    pub scheduler: Scheduler,
    pub clock: ClockDomain,
    pub interrupts: InterruptAggregator,
    pub acia_ikbd: Acia,
    pub acia_midi: Acia,
    pub dma_sound: DmaSoundEngine,
    pub scc: Option<Scc>,
    /// The internal-unit clock value as of the last `advance` call. Writes
    /// reaching this core between `advance` calls (e.g. a CR write arming
    /// a fresh bit-clock event) use this as their "now" baseline.
    current_clock: u64,
    dma_sound_regs: DmaSoundRegs,
}

impl EmulatorCore {
    pub fn new(config: MachineConfig, host_rate_hz: u32) -> Self {
        let scc = if config.machine.has_scc() {
            Some(Scc::new(
                config.scc_rtxc,
                config.scc_trxc,
                config.scc_rtxc,
                crate::config::ClockSource::Unsupported,
            ))
        } else {
            None
        };
        Self {
            clock: ClockDomain::new(config.cpu_freq_hz as u64),
            scheduler: Scheduler::new(),
            interrupts: InterruptAggregator::new(),
            acia_ikbd: Acia::new(),
            acia_midi: Acia::new(),
            dma_sound: DmaSoundEngine::new(host_rate_hz),
            scc,
            current_clock: 0,
            dma_sound_regs: DmaSoundRegs::default(),
            config,
        }
    }

    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.interrupts.reset();
        self.acia_ikbd = Acia::new();
        self.acia_midi = Acia::new();
        self.dma_sound.reset();
        self.dma_sound_regs = DmaSoundRegs::default();
        self.current_clock = 0;
        if let Some(scc) = &mut self.scc {
            *scc = Scc::new(
                self.config.scc_rtxc,
                self.config.scc_trxc,
                self.config.scc_rtxc,
                crate::config::ClockSource::Unsupported,
            );
        }
    }

    /// Reconfigures for a different machine variant, e.g. switching
    /// between ST and STE at runtime. Disables the SCC entirely if the new
    /// machine doesn't have one.
    pub fn reconfigure(&mut self, config: MachineConfig) {
        self.clock = ClockDomain::new(config.cpu_freq_hz as u64);
        self.scc = if config.machine.has_scc() {
            Some(Scc::new(
                config.scc_rtxc,
                config.scc_trxc,
                config.scc_rtxc,
                crate::config::ClockSource::Unsupported,
            ))
        } else {
            None
        };
        self.config = config;
    }

    /// Runs the scheduler forward to `master_clock` (internal clock
    /// units), dispatching due handlers to the right chip. External
    /// collaborator slots (video shifter, MFP timers, FDC, blitter, MIDI
    /// smoothing) are acknowledged with a trace log and otherwise ignored
    /// — this crate doesn't implement those chips.
    ///
    /// ACIA and SCC handlers re-arm themselves at the end of their own tick
    /// for as long as their respective clock source stays enabled, so one
    /// CR/WR write starts a self-sustaining chain of scheduler events
    /// rather than a single one-shot tick.
    pub fn advance(&mut self, master_clock: u64, mem: &dyn MemoryBus, serial: &mut dyn SerialSink) {
        self.current_clock = master_clock;
        let clock = self.clock;
        let cpu_freq_hz = clock.cpu_freq_hz() as u32;
        let acia_ikbd = &mut self.acia_ikbd;
        let acia_midi = &mut self.acia_midi;
        let dma_sound = &mut self.dma_sound;
        let scc = &mut self.scc;
        self.scheduler.dispatch_due(master_clock, |sched, id, _cyc_delayed| {
            match id {
                HandlerId::AciaIkbd | HandlerId::AciaMidi => {
                    let acia = if id == HandlerId::AciaIkbd { &mut *acia_ikbd } else { &mut *acia_midi };
                    acia.clock_rx();
                    acia.clock_tx();
                    sched.acknowledge_current();
                    let divisor = acia.clock_divide();
                    if divisor != ClockDivide::MasterReset {
                        let delay = acia_bit_clock_delay(&clock, divisor);
                        sched.add_relative(id, master_clock, delay);
                    }
                }
                HandlerId::DmaSoundFrame => {
                    dma_sound.on_hbl_refill(mem);
                    sched.acknowledge_current();
                }
                HandlerId::DmaSoundMicrowire => {
                    dma_sound.on_microwire_tick();
                    sched.acknowledge_current();
                }
                HandlerId::SccBrgA | HandlerId::SccBrgB => {
                    sched.acknowledge_current();
                    let Some(scc) = scc.as_mut() else {
                        log::warn!("scheduler fired an SCC handler on a machine with no SCC");
                        return;
                    };
                    let channel = if id == HandlerId::SccBrgA { ChannelId::A } else { ChannelId::B };
                    scc.pulse_zero_count(channel);
                    if let Some(cycles) = scc.brg_cycles(channel, cpu_freq_hz) {
                        sched.add_relative(id, master_clock, clock.cpu_cycles_to_internal(cycles as u64));
                    }
                }
                HandlerId::SccTxRxA | HandlerId::SccTxRxB => {
                    sched.acknowledge_current();
                    let Some(scc) = scc.as_mut() else {
                        log::warn!("scheduler fired an SCC handler on a machine with no SCC");
                        return;
                    };
                    let channel = if id == HandlerId::SccTxRxA { ChannelId::A } else { ChannelId::B };
                    scc.process_tx(channel, serial);
                    if let Some(cycles) = scc.tx_char_cycles(channel, cpu_freq_hz) {
                        sched.add_relative(id, master_clock, clock.cpu_cycles_to_internal(cycles as u64));
                    }
                }
                HandlerId::SccRxA | HandlerId::SccRxB => {
                    sched.acknowledge_current();
                    let Some(scc) = scc.as_mut() else {
                        log::warn!("scheduler fired an SCC handler on a machine with no SCC");
                        return;
                    };
                    let channel = if id == HandlerId::SccRxA { ChannelId::A } else { ChannelId::B };
                    scc.process_rx(channel, serial);
                    if let Some(cycles) = scc.rx_char_cycles(channel, cpu_freq_hz) {
                        sched.add_relative(id, master_clock, clock.cpu_cycles_to_internal(cycles as u64));
                    }
                }
                _ => {
                    log::trace!("scheduler fired external-collaborator handler {id:?}; no-op here");
                    sched.acknowledge_current();
                }
            }
        });
        self.recompute_interrupts();
    }

    fn recompute_interrupts(&mut self) {
        let scc_asserted = self.scc.as_ref().map(|s| s.irq_asserted()).unwrap_or(false);
        self.interrupts.set_line(IrqSource::Scc, scc_asserted);
    }

    /// The CPU's interrupt-acknowledge cycle for `level`. Delegates SCC
    /// vectoring through the SCC's own soft/hard IACK protocol.
    pub fn iack(&mut self, level: u8) -> IackResult {
        let scc = &mut self.scc;
        self.interrupts.iack(level, || scc.as_mut().and_then(|s| s.hard_iack()))
    }

    pub fn read_io(&mut self, address: u32) -> CoreResult<u8> {
        match io_map::classify(address) {
            IoRegion::AciaKeyboardAndMidi => {
                let offset = (address - 0xFF_FC00) as u8;
                Ok(self.read_acia(offset))
            }
            IoRegion::DmaSoundAndMicrowire => Ok(self.read_dma_sound(address)),
            IoRegion::Scc => {
                let offset = (address - 0xFF_8C80) as u8;
                self.read_scc(offset)
            }
            IoRegion::Blitter | IoRegion::VmeScu => {
                log::trace!("read from unimplemented chip region at {address:#08x}");
                Ok(0)
            }
            IoRegion::UnmappedGeneral | IoRegion::UnmappedReserved => {
                Err(CoreError::BusError { address })
            }
        }
    }

    pub fn write_io(&mut self, address: u32, value: u8) -> CoreResult<()> {
        match io_map::classify(address) {
            IoRegion::AciaKeyboardAndMidi => {
                let offset = (address - 0xFF_FC00) as u8;
                self.write_acia(offset, value);
                Ok(())
            }
            IoRegion::DmaSoundAndMicrowire => {
                self.write_dma_sound(address, value);
                Ok(())
            }
            IoRegion::Scc => {
                let offset = (address - 0xFF_8C80) as u8;
                self.write_scc(offset, value)
            }
            IoRegion::Blitter | IoRegion::VmeScu => {
                log::trace!("write to unimplemented chip region at {address:#08x}");
                Ok(())
            }
            IoRegion::UnmappedGeneral | IoRegion::UnmappedReserved => {
                Err(CoreError::BusError { address })
            }
        }
    }

    fn read_acia(&mut self, offset: u8) -> u8 {
        match offset {
            0 => self.acia_ikbd.read_sr(),
            1 => self.acia_ikbd.read_rdr(),
            4 => self.acia_midi.read_sr(),
            5 => self.acia_midi.read_rdr(),
            _ => 0xFF,
        }
    }

    fn write_acia(&mut self, offset: u8, value: u8) {
        match offset {
            0 => {
                self.acia_ikbd.write_cr(value);
                self.arm_acia_bit_clock(HandlerId::AciaIkbd);
            }
            1 => self.acia_ikbd.write_tdr(value),
            4 => {
                self.acia_midi.write_cr(value);
                self.arm_acia_bit_clock(HandlerId::AciaMidi);
            }
            5 => self.acia_midi.write_tdr(value),
            _ => {}
        }
    }

    /// Arms (or, on a master-reset divider selection, disarms) the
    /// bit-clock scheduler slot for the ACIA whose control register was
    /// just written — without this, a CR write selecting a baud-rate
    /// divider would program the divider but the TX/RX FSMs would never
    /// actually get clocked.
    fn arm_acia_bit_clock(&mut self, id: HandlerId) {
        let divisor = match id {
            HandlerId::AciaIkbd => self.acia_ikbd.clock_divide(),
            HandlerId::AciaMidi => self.acia_midi.clock_divide(),
            _ => return,
        };
        if divisor == ClockDivide::MasterReset {
            self.scheduler.remove(id);
            return;
        }
        let delay = acia_bit_clock_delay(&self.clock, divisor);
        self.scheduler.add_relative(id, self.current_clock, delay);
    }

    fn read_dma_sound(&mut self, address: u32) -> u8 {
        let offset = address - 0xFF_8900;
        match offset {
            0x01 => self.dma_sound_regs.control,
            0x03 => self.dma_sound_regs.frame_start_hi,
            0x05 => self.dma_sound_regs.frame_start_mid,
            0x07 => self.dma_sound_regs.frame_start_lo,
            0x09 => ((self.dma_sound.dma.frame_addr >> 16) & 0xFF) as u8,
            0x0B => ((self.dma_sound.dma.frame_addr >> 8) & 0xFF) as u8,
            0x0D => (self.dma_sound.dma.frame_addr & 0xFF) as u8,
            0x0F => self.dma_sound_regs.frame_end_hi,
            0x11 => self.dma_sound_regs.frame_end_mid,
            0x13 => self.dma_sound_regs.frame_end_lo,
            0x21 => self.dma_sound_regs.sound_mode,
            0x22 => (self.dma_sound.microwire.register_value() >> 8) as u8,
            0x23 => (self.dma_sound.microwire.register_value() & 0xFF) as u8,
            0x24 => self.dma_sound_regs.microwire_mask_hi,
            0x25 => self.dma_sound_regs.microwire_mask_lo,
            _ => 0,
        }
    }

    /// `$FF8900-$FF893F` write dispatch (`dmaSnd.c`). The frame start/end
    /// address bytes are just latches until a 0->1 edge on the control
    /// register's PLAY bit combines them into the live DMA address
    /// (`DmaSnd_StartNewFrame`); frame-count bytes are read-only. The
    /// Microwire data and mask registers only take effect while no shift
    /// is already in progress, matching the real chip's busy-ignore rule.
    fn write_dma_sound(&mut self, address: u32, value: u8) {
        let offset = address - 0xFF_8900;
        match offset {
            0x01 => {
                let was_playing = self.dma_sound_regs.control & DMASNDCTRL_PLAY != 0;
                let new_ctrl = value & 0x03;
                let now_playing = new_ctrl & DMASNDCTRL_PLAY != 0;
                self.dma_sound_regs.control = new_ctrl;
                if !was_playing && now_playing {
                    let regs = &self.dma_sound_regs;
                    let start = ((regs.frame_start_hi as u32) << 16)
                        | ((regs.frame_start_mid as u32) << 8)
                        | (regs.frame_start_lo as u32 & !1);
                    let end = ((regs.frame_end_hi as u32) << 16)
                        | ((regs.frame_end_mid as u32) << 8)
                        | (regs.frame_end_lo as u32 & !1);
                    let looping = new_ctrl & DMASNDCTRL_PLAYLOOP != 0;
                    let channel = self.dma_sound.dma.channel;
                    self.dma_sound.dma.start(start, end, looping, channel);
                } else if was_playing && !now_playing {
                    self.dma_sound.dma.play = false;
                }
            }
            0x03 => self.dma_sound_regs.frame_start_hi = value,
            0x05 => self.dma_sound_regs.frame_start_mid = value,
            0x07 => self.dma_sound_regs.frame_start_lo = value,
            0x09 | 0x0B | 0x0D => {} // frame count: read-only, derived from DMA position
            0x0F => self.dma_sound_regs.frame_end_hi = value,
            0x11 => self.dma_sound_regs.frame_end_mid = value,
            0x13 => self.dma_sound_regs.frame_end_lo = value,
            0x21 => {
                let masked = value & 0x8F;
                let was_mono = self.dma_sound_regs.sound_mode & DMASNDMODE_MONO != 0;
                let now_mono = masked & DMASNDMODE_MONO != 0;
                self.dma_sound.set_source_rate_index(masked & 0x3);
                if was_mono != now_mono {
                    self.dma_sound.set_channel(if now_mono { Channel::Mono } else { Channel::Stereo });
                }
                self.dma_sound_regs.sound_mode = masked;
            }
            0x22 => self.dma_sound_regs.microwire_data_hi = value,
            0x23 => {
                if !self.dma_sound.microwire.is_busy() {
                    let data = ((self.dma_sound_regs.microwire_data_hi as u16) << 8) | value as u16;
                    self.dma_sound.microwire.start(data);
                    let delay = self.clock.cpu_cycles_to_internal(8);
                    self.scheduler.add_relative(HandlerId::DmaSoundMicrowire, self.current_clock, delay);
                }
            }
            0x24 => self.dma_sound_regs.microwire_mask_hi = value,
            0x25 => {
                if !self.dma_sound.microwire.is_busy() {
                    self.dma_sound_regs.microwire_mask_lo = value;
                }
            }
            _ => {}
        }
    }

    fn read_scc(&mut self, offset: u8) -> CoreResult<u8> {
        let scc = self.scc.as_mut().ok_or(CoreError::BusError { address: 0xFF_8C80 })?;
        match offset {
            2 => Ok(scc.read_rr2()),
            3 => Ok(scc.rr3()),
            _ => Ok(0),
        }
    }

    /// Writing WR8 (the TX data register) or enabling WR3's RX bit or
    /// WR14's BRG-enable bit arms the matching scheduler slot so the new
    /// state actually gets clocked, rather than just sitting in the
    /// register file until some unrelated tick happens to notice it.
    fn write_scc(&mut self, offset: u8, value: u8) -> CoreResult<()> {
        if self.scc.is_none() {
            return Err(CoreError::BusError { address: 0xFF_8C80 });
        }
        let channel = if offset < 4 { ChannelId::A } else { ChannelId::B };
        let cpu_freq_hz = self.clock.cpu_freq_hz() as u32;
        let current_clock = self.current_clock;
        let register = self.scc.as_ref().unwrap().active_register() as usize;

        match offset % 4 {
            0 => {
                self.scc.as_mut().unwrap().set_active_register(value & 0x0F, value & 0x40 != 0);
            }
            1 => {
                self.scc.as_mut().unwrap().write_register(channel, register, value);
                let scc = self.scc.as_mut().unwrap();
                match register {
                    8 => {
                        if let Some(cycles) = scc.tx_char_cycles(channel, cpu_freq_hz) {
                            let id = scc_tx_rx_handler(channel);
                            self.scheduler.add_relative(id, current_clock, self.clock.cpu_cycles_to_internal(cycles as u64));
                        }
                    }
                    3 => {
                        let id = scc_rx_handler(channel);
                        if scc.channel(channel).rx_enabled() {
                            if let Some(cycles) = scc.rx_char_cycles(channel, cpu_freq_hz) {
                                self.scheduler.add_relative(id, current_clock, self.clock.cpu_cycles_to_internal(cycles as u64));
                            }
                        } else {
                            self.scheduler.remove(id);
                        }
                    }
                    14 => {
                        let id = scc_brg_handler(channel);
                        if scc.channel(channel).wr[14] & 1 != 0 {
                            if let Some(cycles) = scc.brg_cycles(channel, cpu_freq_hz) {
                                self.scheduler.add_relative(id, current_clock, self.clock.cpu_cycles_to_internal(cycles as u64));
                            }
                        } else {
                            self.scheduler.remove(id);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Internal-unit delay until the next ACIA bit-clock tick, from the fixed
/// 500 kHz ACIA input clock divided by the CR-selected divisor
/// (`acia.c`'s default-parameters comment).
fn acia_bit_clock_delay(clock: &ClockDomain, divisor: ClockDivide) -> u64 {
    let internal_hz = clock.cpu_freq_hz() << crate::clock::INTERNAL_SHIFT;
    let bit_clock_hz = (crate::acia::ACIA_BASE_CLOCK_HZ as u64 / divisor.divisor() as u64).max(1);
    internal_hz / bit_clock_hz
}

fn scc_tx_rx_handler(channel: ChannelId) -> HandlerId {
    match channel {
        ChannelId::A => HandlerId::SccTxRxA,
        ChannelId::B => HandlerId::SccTxRxB,
    }
}

fn scc_rx_handler(channel: ChannelId) -> HandlerId {
    match channel {
        ChannelId::A => HandlerId::SccRxA,
        ChannelId::B => HandlerId::SccRxB,
    }
}

fn scc_brg_handler(channel: ChannelId) -> HandlerId {
    match channel {
        ChannelId::A => HandlerId::SccBrgA,
        ChannelId::B => HandlerId::SccBrgB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullMemory;
    impl MemoryBus for NullMemory {
        fn read_u8(&self, _address: u32) -> u8 {
            0
        }
    }

    struct NullSerial;
    impl SerialSink for NullSerial {
        fn write_byte(&mut self, _channel: ChannelId, _byte: u8) {}
        fn read_byte(&mut self, _channel: ChannelId) -> Option<u8> {
            None
        }
    }

    #[test]
    fn unmapped_address_reports_bus_error() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        assert!(matches!(
            core.read_io(0xFF_9000),
            Err(CoreError::BusError { address: 0xFF_9000 })
        ));
    }

    #[test]
    fn st_machine_has_no_scc_and_reports_bus_error_on_scc_range() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::St), 44100);
        assert!(core.read_io(0xFF_8C80).is_err());
    }

    #[test]
    fn tt_machine_can_read_scc_vector_register() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Tt), 44100);
        assert!(core.read_io(0xFF_8C82).is_ok());
    }

    #[test]
    fn advance_with_no_armed_handlers_does_not_panic() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        let mem = NullMemory;
        let mut serial = NullSerial;
        core.advance(1_000_000, &mem, &mut serial);
    }

    #[test]
    fn acia_register_window_round_trips_through_io_dispatch() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_FC00, 0x96).unwrap();
        assert_eq!(core.acia_ikbd.cr, 0x96);
    }

    /// A CR write selecting a real clock divider must arm the ACIA's
    /// bit-clock scheduler slot, not just update the register.
    #[test]
    fn acia_cr_write_arms_bit_clock_scheduler_slot() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_FC00, 0x96).unwrap(); // div64, 8-N-1
        assert!(core.scheduler.is_active(HandlerId::AciaIkbd));
    }

    /// A master-reset divider selection disarms any previously-armed
    /// bit-clock event instead of leaving it ticking forever.
    #[test]
    fn acia_master_reset_disarms_bit_clock_scheduler_slot() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_FC00, 0x96).unwrap();
        core.write_io(0xFF_FC00, 0b11).unwrap(); // master reset
        assert!(!core.scheduler.is_active(HandlerId::AciaIkbd));
    }

    /// A play-edge on the DMA sound control register must combine the
    /// latched frame start/end bytes into a live DMA address, not discard
    /// them as the old no-op stub did.
    #[test]
    fn dma_sound_play_edge_combines_latched_frame_addresses() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_8903, 0x00).unwrap();
        core.write_io(0xFF_8905, 0x10).unwrap();
        core.write_io(0xFF_8907, 0x00).unwrap();
        core.write_io(0xFF_890F, 0x00).unwrap();
        core.write_io(0xFF_8911, 0x20).unwrap();
        core.write_io(0xFF_8913, 0x00).unwrap();
        core.write_io(0xFF_8901, DMASNDCTRL_PLAY).unwrap();
        assert_eq!(core.dma_sound.dma.frame_addr, 0x1000);
        assert_eq!(core.dma_sound.dma.frame_end, 0x2000);
        assert!(core.dma_sound.dma.play);
    }

    /// A play-off edge stops DMA immediately.
    #[test]
    fn dma_sound_play_off_edge_stops_dma() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_8907, 0x00).unwrap();
        core.write_io(0xFF_8913, 0x10).unwrap();
        core.write_io(0xFF_8901, DMASNDCTRL_PLAY).unwrap();
        assert!(core.dma_sound.dma.play);
        core.write_io(0xFF_8901, 0x00).unwrap();
        assert!(!core.dma_sound.dma.play);
    }

    /// A sound-mode write with the mono bit set selects mono playback and
    /// the low 2 bits select the sample rate.
    #[test]
    fn dma_sound_mode_write_selects_mono_and_rate() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_8921, DMASNDMODE_MONO | 0x02).unwrap();
        assert_eq!(core.dma_sound.dma.channel, Channel::Mono);
        assert_eq!(core.read_io(0xFF_8921).unwrap(), DMASNDMODE_MONO | 0x02);
    }

    /// A Microwire data-register write arms the Microwire scheduler slot
    /// so `on_microwire_tick` actually gets called.
    #[test]
    fn microwire_data_write_arms_scheduler_slot() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.write_io(0xFF_8922, 0x80).unwrap();
        core.write_io(0xFF_8923, 0x00).unwrap();
        assert!(core.scheduler.is_active(HandlerId::DmaSoundMicrowire));
        assert!(core.dma_sound.microwire.is_busy());
    }

    /// Writing WR8 (the SCC TX data register) arms the TX/RX scheduler
    /// slot for the written channel.
    #[test]
    fn scc_wr8_write_arms_tx_rx_scheduler_slot() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Tt), 44100);
        core.write_io(0xFF_8C80, 0x08).unwrap(); // point to WR8 on channel A
        core.write_io(0xFF_8C81, 0x55).unwrap();
        assert!(core.scheduler.is_active(HandlerId::SccTxRxA));
    }
}
