//! The generator's real-time rendering loop.
//!
//! ## Per-iteration stages
//!
//! ```text
//! 1. Dequeue one tone (suspending on the queue's condvar when empty)
//! 2. Snapshot volume/slope parameters (brief lock, O(1))
//! 3. Key the sink down/up on audible/silent transitions
//! 4. Render the tone in ~20 ms blocks, writing each to the sink
//! 5. Re-check the running flag between blocks and between tones
//! ```
//!
//! The sink's blocking `write` paces this loop at real-time rate; the
//! queue lock is never held while rendering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::render::ToneRender;
use super::Params;
use crate::queue::ToneQueue;
use crate::sink::ToneSink;

/// All context the consumer needs, passed as one struct so the spawn
/// site stays tidy.
pub(crate) struct ConsumerContext {
    pub queue: Arc<ToneQueue>,
    pub params: Arc<Mutex<Params>>,
    pub running: Arc<AtomicBool>,
    pub rendering: Arc<AtomicBool>,
    pub sink_slot: Arc<Mutex<Option<Box<dyn ToneSink>>>>,
    pub sink: Box<dyn ToneSink>,
}

/// Run the rendering loop until `ctx.running` is cleared.
pub(crate) fn run(mut ctx: ConsumerContext) {
    let sample_rate = ctx.sink.sample_rate();
    // ~20 ms blocks: small enough for prompt stop(), large enough to
    // keep per-block overhead negligible.
    let block_len = (sample_rate as usize / 50).max(1);
    let mut block = vec![0.0f32; block_len];
    let mut phase = 0.0f64;
    let mut key_down = false;

    info!(sample_rate, "generator consumer started");

    'running: while ctx.running.load(Ordering::Acquire) {
        let Some(tone) = ctx.queue.dequeue_or_wait(&ctx.running) else {
            break;
        };
        ctx.rendering.store(true, Ordering::Release);

        let (volume, shape, slope_len_us) = {
            let p = ctx.params.lock();
            (p.volume, p.slope_shape, p.slope_len_us)
        };
        let render = ToneRender::new(&tone, volume, shape, slope_len_us, sample_rate);

        debug!(
            frequency = tone.frequency,
            duration_us = tone.duration_us,
            samples = render.total_samples(),
            "rendering tone"
        );

        let audible = !tone.is_silence();
        if audible != key_down {
            if let Err(e) = ctx.sink.key(audible) {
                error!("sink key event failed: {e}");
            }
            key_down = audible;
        }

        let mut offset = 0;
        while offset < render.total_samples() {
            if !ctx.running.load(Ordering::Acquire) {
                ctx.rendering.store(false, Ordering::Release);
                break 'running;
            }
            let n = render.fill(offset, &mut phase, &mut block);
            if let Err(e) = ctx.sink.write(&block[..n]) {
                // Hardware trouble is the sink's concern; keep the
                // queue draining so timing stays coherent.
                error!("sink write failed: {e}");
            }
            offset += n;
        }

        if tone.is_silence() {
            // A gap ends the keyed waveform; restart the carrier clean.
            phase = 0.0;
        }
        ctx.rendering.store(false, Ordering::Release);
    }

    if key_down {
        let _ = ctx.sink.key(false);
    }
    if let Err(e) = ctx.sink.finish() {
        error!("sink finish failed: {e}");
    }
    info!("generator consumer stopped");

    // Hand the sink back so the generator can be restarted.
    *ctx.sink_slot.lock() = Some(ctx.sink);
}
