// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Producer stages become duration slices on a `producer` track. Everything
//! the consumer does is an instant on a `consumer` track.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::collections::HashMap;
use std::io::{self, Write};

use serde_json::{Value, json};

use mantle_core::history::MainFrameOutcome;
use mantle_core::stage::PipelineStage;
use mantle_core::time::{HostTime, Timebase};
use mantle_core::timing::BeginFrameId;

use crate::recorder::{RecordedEvent, decode};

const PRODUCER_TID: u32 = 0;
const CONSUMER_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = vec![
        thread_name(PRODUCER_TID, "producer"),
        thread_name(CONSUMER_TID, "consumer"),
    ];
    // Stage each in-flight attempt is in, so the next boundary can close it.
    let mut open: HashMap<BeginFrameId, PipelineStage> = HashMap::new();
    let mut last_ts = 0.0;
    let us = |t: HostTime| timebase.ticks_to_micros(t.ticks());

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::BeginImplFrame(e) => {
                last_ts = us(e.frame_time);
                events.push(json!({
                    "ph": "i",
                    "name": "BeginImplFrame",
                    "cat": "Scheduler",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": CONSUMER_TID,
                    "s": "g",
                    "args": {
                        "frame": label(e.id),
                        "deadline_us": us(e.deadline),
                        "interval_us": timebase.ticks_to_micros(e.interval.ticks()),
                    }
                }));
            }
            RecordedEvent::Stage(e) => {
                last_ts = us(e.timestamp);
                if let Some(previous) = open.insert(e.id, e.stage) {
                    events.push(stage_end(e.id, previous, last_ts));
                }
                events.push(json!({
                    "ph": "B",
                    "name": e.stage.as_str(),
                    "cat": "Producer",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": PRODUCER_TID,
                    "args": {
                        "frame": label(e.id),
                        "final_stage": e.final_stage.as_str(),
                    }
                }));
            }
            RecordedEvent::MainFrameAborted(e) => {
                last_ts = us(e.timestamp);
                if let Some(previous) = open.remove(&e.id) {
                    events.push(stage_end(e.id, previous, last_ts));
                }
                events.push(json!({
                    "ph": "i",
                    "name": "MainFrameAborted",
                    "cat": "Producer",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": PRODUCER_TID,
                    "s": "t",
                    "args": {
                        "frame": label(e.id),
                        "reason": e.reason.as_str(),
                        "reached": e.reached.as_str(),
                    }
                }));
            }
            RecordedEvent::Commit(e) => {
                last_ts = us(e.timestamp);
                if let Some(previous) = open.remove(&e.id) {
                    events.push(stage_end(e.id, previous, last_ts));
                }
                events.push(json!({
                    "ph": "i",
                    "name": "Commit",
                    "cat": "Consumer",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": CONSUMER_TID,
                    "s": "t",
                    "args": {
                        "frame": label(e.id),
                        "waits_for_activation": e.waits_for_activation,
                    }
                }));
            }
            RecordedEvent::Activation(e) => {
                last_ts = us(e.timestamp);
                events.push(json!({
                    "ph": "i",
                    "name": "Activate",
                    "cat": "Consumer",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": CONSUMER_TID,
                    "s": "t",
                    "args": {
                        "frame": e.id.map(label),
                    }
                }));
            }
            RecordedEvent::Draw(e) => {
                last_ts = us(e.timestamp);
                events.push(json!({
                    "ph": "i",
                    "name": "Draw",
                    "cat": "Consumer",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": CONSUMER_TID,
                    "s": "t",
                    "args": {
                        "frame": e.id.map(label),
                        "forced": e.forced,
                        "result": e.result.as_str(),
                        "swapped": e.swapped,
                    }
                }));
            }
            RecordedEvent::MainFrameSummary(s) => {
                let outcome = match s.outcome {
                    MainFrameOutcome::Committed => "committed",
                    MainFrameOutcome::Aborted(reason) => reason.as_str(),
                };
                events.push(json!({
                    "ph": "i",
                    "name": "MainFrameSummary",
                    "cat": "Summary",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": PRODUCER_TID,
                    "s": "p",
                    "args": {
                        "frame": label(s.id),
                        "final_stage": s.final_stage.as_str(),
                        "outcome": outcome,
                        "animate_us": timebase.ticks_to_micros(s.animate_ticks),
                        "update_us": timebase.ticks_to_micros(s.update_ticks),
                        "commit_us": timebase.ticks_to_micros(s.commit_ticks),
                        "total_us": timebase.ticks_to_micros(s.total_ticks),
                    }
                }));
            }
        }
    }

    // Attempts cut off by the end of the recording.
    for (id, stage) in open {
        events.push(stage_end(id, stage, last_ts));
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn stage_end(id: BeginFrameId, stage: PipelineStage, ts: f64) -> Value {
    json!({
        "ph": "E",
        "name": stage.as_str(),
        "cat": "Producer",
        "ts": ts,
        "pid": 0,
        "tid": PRODUCER_TID,
        "args": {
            "frame": label(id),
        }
    })
}

fn thread_name(tid: u32, name: &str) -> Value {
    json!({
        "ph": "M",
        "name": "thread_name",
        "pid": 0,
        "tid": tid,
        "args": { "name": name }
    })
}

fn label(id: BeginFrameId) -> String {
    format!("{}:{}", id.source_id, id.sequence)
}
