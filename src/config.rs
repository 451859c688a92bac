//! Machine-variant configuration.
//!
//! Unlike the host application's CLI/config-file layer (out of scope for
//! this crate), `MachineConfig` only describes which chips exist and how
//! they're clocked — the embedder constructs it directly, there is no file
//! or environment-variable parsing here.

use serde::{Deserialize, Serialize};

/// Which Atari ST family member is being emulated. Determines which
/// peripherals exist and which I/O address ranges are wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineType {
    St,
    Ste,
    MegaSte,
    Tt,
    Falcon,
}

impl MachineType {
    pub fn has_dma_sound(self) -> bool {
        !matches!(self, MachineType::St)
    }

    pub fn has_scc(self) -> bool {
        matches!(self, MachineType::MegaSte | MachineType::Tt | MachineType::Falcon)
    }

    pub fn has_vme_scu(self) -> bool {
        matches!(self, MachineType::MegaSte | MachineType::Tt)
    }
}

/// The SCC's RTxC/TRxC pins are wired to different physical clocks
/// depending on machine variant (`original_source/src/scc.c`,
/// `SCC_Get_RTxC_Freq`/`SCC_Get_TRxC_Freq`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockSource {
    /// 8021247.6 Hz PCLK4, available on MegaSTE/TT/Falcon.
    Pclk4,
    /// 2457600 Hz BCLK, wired to TRxC on TT only.
    Bclk,
    /// A source the original firmware references (LCLK, SYNCA) but never
    /// wires up on any shipped board; falls back to Pclk4 with a warning.
    Unsupported,
}

/// Top-level configuration for one emulated machine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    pub machine: MachineType,
    /// CPU clock in Hz; 8021248 for PAL STF, doubled on MegaSTE turbo mode.
    pub cpu_freq_hz: u32,
    pub scc_rtxc: ClockSource,
    pub scc_trxc: ClockSource,
}

impl MachineConfig {
    pub const PAL_STF_CPU_FREQ_HZ: u32 = 8_021_248;

    pub fn for_machine(machine: MachineType) -> Self {
        let (scc_rtxc, scc_trxc) = match machine {
            MachineType::Tt => (ClockSource::Pclk4, ClockSource::Bclk),
            MachineType::MegaSte => (ClockSource::Pclk4, ClockSource::Unsupported),
            _ => (ClockSource::Unsupported, ClockSource::Unsupported),
        };
        Self {
            machine,
            cpu_freq_hz: Self::PAL_STF_CPU_FREQ_HZ,
            scc_rtxc,
            scc_trxc,
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::for_machine(MachineType::Ste)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn st_has_no_dma_sound_or_scc() {
        let cfg = MachineConfig::for_machine(MachineType::St);
        assert!(!cfg.machine.has_dma_sound());
        assert!(!cfg.machine.has_scc());
    }

    #[test]
    fn tt_wires_rtxc_and_trxc() {
        let cfg = MachineConfig::for_machine(MachineType::Tt);
        assert_eq!(cfg.scc_rtxc, ClockSource::Pclk4);
        assert_eq!(cfg.scc_trxc, ClockSource::Bclk);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = MachineConfig::for_machine(MachineType::MegaSte);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MachineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.machine, cfg.machine);
        assert_eq!(back.scc_rtxc, cfg.scc_rtxc);
    }
}
