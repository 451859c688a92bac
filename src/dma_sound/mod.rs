//! STE DMA sound engine: frame DMA + FIFO, rate conversion, low-pass
//! filtering, LMC1992 tone control and Microwire control interface
//! (§4.5). Grounded on `original_source/src/dmaSnd.c`'s top-level
//! `DmaSnd_GenerateSamples`/`DmaSnd_InterruptHandler_*` flow.

pub mod filter;
pub mod fifo;
pub mod lmc1992;
pub mod microwire;

use fifo::{Channel, FrameDma, MemoryBus, SAMPLE_RATES_HZ};
use filter::{LowPassFilter, RateConverter};
use lmc1992::Lmc1992;
use microwire::Microwire;

/// One fully mixed, tone-controlled stereo output sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoSample {
    pub left: f32,
    pub right: f32,
}

pub struct DmaSoundEngine {
    pub dma: FrameDma,
    pub microwire: Microwire,
    lmc1992: Lmc1992,
    rate_converter: RateConverter,
    low_pass_left: LowPassFilter,
    low_pass_right: LowPassFilter,
    source_rate_hz: u32,
    host_rate_hz: u32,
    pending_end_of_frame_irq: bool,
}

impl DmaSoundEngine {
    pub fn new(host_rate_hz: u32) -> Self {
        let source_rate_hz = SAMPLE_RATES_HZ[0];
        Self {
            dma: FrameDma::new(),
            microwire: Microwire::new(),
            lmc1992: Lmc1992::new(host_rate_hz),
            rate_converter: RateConverter::new(source_rate_hz, host_rate_hz),
            low_pass_left: LowPassFilter::new(),
            low_pass_right: LowPassFilter::new(),
            source_rate_hz,
            host_rate_hz,
            pending_end_of_frame_irq: false,
        }
    }

    pub fn reset(&mut self) {
        self.dma.reset();
        self.microwire.reset();
        self.rate_converter = RateConverter::new(self.source_rate_hz, self.host_rate_hz);
        self.low_pass_left = LowPassFilter::new();
        self.low_pass_right = LowPassFilter::new();
        self.pending_end_of_frame_irq = false;
    }

    /// Selects one of the four fixed DMA-sound source rates (register
    /// value 0..=3, masked) and rebuilds the rate converter for it.
    pub fn set_source_rate_index(&mut self, index: u8) {
        self.source_rate_hz = SAMPLE_RATES_HZ[(index & 0x3) as usize];
        self.rate_converter = RateConverter::new(self.source_rate_hz, self.host_rate_hz);
    }

    pub fn set_channel(&mut self, channel: Channel) {
        self.dma.set_channel(channel);
    }

    pub fn lmc1992(&self) -> &Lmc1992 {
        &self.lmc1992
    }

    /// Runs on the horizontal-blank tick (`HandlerId::DmaSoundFrame`).
    /// Refills the FIFO from memory and latches an end-of-frame interrupt
    /// if the frame boundary was crossed.
    pub fn on_hbl_refill(&mut self, mem: &dyn MemoryBus) {
        let event = self.dma.refill(mem);
        if event.end_of_frame_reached {
            self.pending_end_of_frame_irq = true;
        }
    }

    /// Consumes and clears the end-of-frame interrupt flag; the caller
    /// (`EmulatorCore`) raises the MFP's Timer-A-equivalent DMA sound IRQ
    /// line when this returns true.
    pub fn take_end_of_frame_irq(&mut self) -> bool {
        std::mem::take(&mut self.pending_end_of_frame_irq)
    }

    /// Runs on the Microwire shift clock (every 8 CPU cycles while a
    /// transfer is in progress).
    pub fn on_microwire_tick(&mut self) {
        self.microwire.clock_tick(&mut self.lmc1992);
    }

    /// Produces one host-rate stereo sample, pulling as many source bytes
    /// from the FIFO as the rate converter calls for and running them
    /// through the low-pass filter and LMC1992 biquad.
    pub fn generate_sample(&mut self, mem: &dyn MemoryBus) -> StereoSample {
        let pulls = self.rate_converter.advance().max(1);
        let mut last_left = 0i8;
        let mut last_right = 0i8;
        for i in 0..pulls {
            let byte = self.dma.pull_byte(mem);
            match self.dma.channel {
                Channel::Mono => {
                    last_left = byte;
                    last_right = byte;
                }
                Channel::Stereo => {
                    if i % 2 == 0 {
                        last_left = byte;
                    } else {
                        last_right = byte;
                    }
                }
            }
        }

        let low_pass_on = RateConverter::low_pass_enabled(self.host_rate_hz);
        let left_raw = if low_pass_on {
            self.low_pass_left.push((last_left as i16) << 2)
        } else {
            LowPassFilter::bypass(last_left)
        };
        let right_raw = if low_pass_on {
            self.low_pass_right.push((last_right as i16) << 2)
        } else {
            LowPassFilter::bypass(last_right)
        };

        StereoSample {
            left: self.lmc1992.filter_left(left_raw as f32),
            right: self.lmc1992.filter_right(right_raw as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatMemory(Vec<u8>);
    impl MemoryBus for FlatMemory {
        fn read_u8(&self, address: u32) -> u8 {
            self.0.get(address as usize).copied().unwrap_or(0)
        }
    }

    #[test]
    fn refill_raises_end_of_frame_irq_once_per_frame() {
        let mem = FlatMemory(vec![0; 16]);
        let mut engine = DmaSoundEngine::new(44100);
        engine.dma.start(0, 4, false, Channel::Mono);
        engine.on_hbl_refill(&mem);
        assert!(engine.take_end_of_frame_irq());
        assert!(!engine.take_end_of_frame_irq());
    }

    #[test]
    fn generate_sample_drains_fifo_and_returns_silence_when_stopped() {
        let mem = FlatMemory(vec![0; 4]);
        let mut engine = DmaSoundEngine::new(44100);
        engine.dma.start(0, 4, false, Channel::Mono);
        engine.on_hbl_refill(&mem);
        let sample = engine.generate_sample(&mem);
        assert_eq!(sample, StereoSample { left: 0.0, right: 0.0 });
    }

    #[test]
    fn source_rate_selection_rebuilds_converter_without_panicking() {
        let mut engine = DmaSoundEngine::new(48000);
        for index in 0..4 {
            engine.set_source_rate_index(index);
        }
    }
}
