pub mod replay;
pub mod state;

use std::thread;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    gesture::{GestureTracker, MouthTracker},
    types::ObservationFrame,
};

pub use replay::{JsonlReplay, ObservationSource, start_replay};
pub use state::{GestureStateHolder, GestureUpdate, HolderSnapshot};

/// How the worker picks frames off its input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePolicy {
    /// Classify every frame in capture order.
    Every,
    /// Skip to the newest queued frame when the worker falls behind.
    Latest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub declined: u64,
    pub skipped: u64,
    pub out_of_order: u64,
    pub transitions: u64,
}

pub fn start_classifier(
    config: &Config,
    frame_rx: Receiver<ObservationFrame>,
    holder: GestureStateHolder,
) -> thread::JoinHandle<WorkerStats> {
    let tracker = GestureTracker::from_config(&config.proximity);
    let mouth = MouthTracker::from_config(config);
    let frame_policy = config.pipeline.frame_policy;

    log::info!(
        "starting classifier worker ({:?} vs {:?}, {:?} frames, {:?} state)",
        config.proximity.reference,
        config.proximity.candidates,
        frame_policy,
        config.proximity.policy,
    );

    thread::spawn(move || run_worker_loop(tracker, mouth, frame_policy, frame_rx, holder))
}

fn run_worker_loop(
    mut tracker: GestureTracker,
    mut mouth: Option<MouthTracker>,
    frame_policy: FramePolicy,
    frame_rx: Receiver<ObservationFrame>,
    holder: GestureStateHolder,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    let mut last_sequence: Option<u64> = None;

    while let Some(frame) = next_frame(&frame_rx, frame_policy, &mut stats) {
        if last_sequence.is_some_and(|last| frame.sequence <= last) {
            log::warn!(
                "dropping out-of-order frame {} (last processed {:?})",
                frame.sequence,
                last_sequence
            );
            stats.out_of_order += 1;
            continue;
        }
        last_sequence = Some(frame.sequence);
        stats.processed += 1;

        let outcome = tracker.update(&frame);
        if outcome.declined {
            stats.declined += 1;
            log::debug!(
                "frame {} declined, keeping state {}",
                frame.sequence,
                outcome.state
            );
        }
        if holder.set_gesture_state(frame.sequence, outcome.state, outcome.distance) {
            stats.transitions += 1;
            log::info!(
                "frame {}: gesture {} (distance {:?})",
                frame.sequence,
                if outcome.state { "active" } else { "inactive" },
                outcome.distance
            );
        }

        if let Some(mouth) = mouth.as_mut() {
            let result = mouth.update(&frame);
            if holder.set_mouth_state(frame.sequence, mouth.is_open(), result.map(|r| r.ratio)) {
                log::info!(
                    "frame {}: mouth {}",
                    frame.sequence,
                    if mouth.is_open() { "open" } else { "closed" }
                );
            }
        }
    }

    log::info!(
        "classifier worker stopped after {} frames ({} declined, {} skipped)",
        stats.processed,
        stats.declined,
        stats.skipped
    );
    stats
}

fn next_frame(
    frame_rx: &Receiver<ObservationFrame>,
    frame_policy: FramePolicy,
    stats: &mut WorkerStats,
) -> Option<ObservationFrame> {
    let mut frame = frame_rx.recv().ok()?;
    if frame_policy == FramePolicy::Latest {
        while let Ok(newer) = frame_rx.try_recv() {
            stats.skipped += 1;
            frame = newer;
        }
    }
    Some(frame)
}
