// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use mantle_core::abort::CommitEarlyOutReason;
use mantle_core::history::MainFrameOutcome;
use mantle_core::host::DrawResult;
use mantle_core::stage::PipelineStage;
use mantle_core::time::{Duration, HostTime};
use mantle_core::timing::BeginFrameId;
use mantle_core::trace::{
    ActivationEvent, BeginImplFrameEvent, CommitEvent, DrawEvent, MainFrameAbortedEvent,
    MainFrameSummary, StageEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_BEGIN_IMPL_FRAME: u8 = 1;
const TAG_STAGE: u8 = 2;
const TAG_MAIN_FRAME_ABORTED: u8 = 3;
const TAG_COMMIT: u8 = 4;
const TAG_ACTIVATION: u8 = 5;
const TAG_DRAW: u8 = 6;
const TAG_MAIN_FRAME_SUMMARY: u8 = 7;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_id(&mut self, id: BeginFrameId) {
        self.write_u32(id.source_id);
        self.write_u64(id.sequence);
    }

    fn write_option_id(&mut self, id: Option<BeginFrameId>) {
        self.write_bool(id.is_some());
        self.write_id(id.unwrap_or_default());
    }

    fn write_stage(&mut self, stage: PipelineStage) {
        self.write_u8(match stage {
            PipelineStage::None => 0,
            PipelineStage::Animate => 1,
            PipelineStage::UpdateLayers => 2,
            PipelineStage::Commit => 3,
        });
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "there are four abort reasons"
    )]
    fn write_reason(&mut self, reason: CommitEarlyOutReason) {
        self.write_u8(reason.index() as u8);
    }

    /// 0 for a commit, `1 + reason` for an abort.
    fn write_outcome(&mut self, outcome: MainFrameOutcome) {
        match outcome {
            MainFrameOutcome::Committed => self.write_u8(0),
            MainFrameOutcome::Aborted(reason) => {
                self.write_u8(1);
                self.write_reason(reason);
            }
        }
    }

    fn write_draw_result(&mut self, result: DrawResult) {
        self.write_u8(match result {
            DrawResult::Success => 0,
            DrawResult::AbortedCheckerboardAnimations => 1,
            DrawResult::AbortedMissingHighResContent => 2,
            DrawResult::AbortedCantDraw => 3,
            DrawResult::AbortedContextLost => 4,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_begin_impl_frame(&mut self, e: &BeginImplFrameEvent) {
        self.write_u8(TAG_BEGIN_IMPL_FRAME);
        self.write_id(e.id);
        self.write_u64(e.frame_time.ticks());
        self.write_u64(e.deadline.ticks());
        self.write_u64(e.interval.ticks());
    }

    fn on_stage(&mut self, e: &StageEvent) {
        self.write_u8(TAG_STAGE);
        self.write_id(e.id);
        self.write_stage(e.stage);
        self.write_stage(e.final_stage);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_main_frame_aborted(&mut self, e: &MainFrameAbortedEvent) {
        self.write_u8(TAG_MAIN_FRAME_ABORTED);
        self.write_id(e.id);
        self.write_reason(e.reason);
        self.write_stage(e.reached);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.write_u8(TAG_COMMIT);
        self.write_id(e.id);
        self.write_bool(e.waits_for_activation);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_activation(&mut self, e: &ActivationEvent) {
        self.write_u8(TAG_ACTIVATION);
        self.write_option_id(e.id);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_draw(&mut self, e: &DrawEvent) {
        self.write_u8(TAG_DRAW);
        self.write_option_id(e.id);
        self.write_bool(e.forced);
        self.write_draw_result(e.result);
        self.write_bool(e.swapped);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_main_frame_summary(&mut self, s: &MainFrameSummary) {
        self.write_u8(TAG_MAIN_FRAME_SUMMARY);
        self.write_id(s.id);
        self.write_stage(s.final_stage);
        self.write_outcome(s.outcome);
        self.write_u64(s.animate_ticks);
        self.write_u64(s.update_ticks);
        self.write_u64(s.commit_ticks);
        self.write_u64(s.total_ticks);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`BeginImplFrameEvent`].
    BeginImplFrame(BeginImplFrameEvent),
    /// A [`StageEvent`].
    Stage(StageEvent),
    /// A [`MainFrameAbortedEvent`].
    MainFrameAborted(MainFrameAbortedEvent),
    /// A [`CommitEvent`].
    Commit(CommitEvent),
    /// An [`ActivationEvent`].
    Activation(ActivationEvent),
    /// A [`DrawEvent`].
    Draw(DrawEvent),
    /// A [`MainFrameSummary`].
    MainFrameSummary(MainFrameSummary),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_id(&mut self) -> Option<BeginFrameId> {
        Some(BeginFrameId {
            source_id: self.read_u32()?,
            sequence: self.read_u64()?,
        })
    }

    fn read_option_id(&mut self) -> Option<Option<BeginFrameId>> {
        let present = self.read_bool()?;
        let id = self.read_id()?;
        Some(present.then_some(id))
    }

    fn read_stage(&mut self) -> Option<PipelineStage> {
        Some(match self.read_u8()? {
            0 => PipelineStage::None,
            1 => PipelineStage::Animate,
            2 => PipelineStage::UpdateLayers,
            3 => PipelineStage::Commit,
            _ => return None,
        })
    }

    fn read_reason(&mut self) -> Option<CommitEarlyOutReason> {
        CommitEarlyOutReason::ALL
            .get(usize::from(self.read_u8()?))
            .copied()
    }

    fn read_outcome(&mut self) -> Option<MainFrameOutcome> {
        Some(match self.read_u8()? {
            0 => MainFrameOutcome::Committed,
            1 => MainFrameOutcome::Aborted(self.read_reason()?),
            _ => return None,
        })
    }

    fn read_draw_result(&mut self) -> Option<DrawResult> {
        Some(match self.read_u8()? {
            0 => DrawResult::Success,
            1 => DrawResult::AbortedCheckerboardAnimations,
            2 => DrawResult::AbortedMissingHighResContent,
            3 => DrawResult::AbortedCantDraw,
            4 => DrawResult::AbortedContextLost,
            _ => return None,
        })
    }

    fn decode_begin_impl_frame(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BeginImplFrame(BeginImplFrameEvent {
            id: self.read_id()?,
            frame_time: self.read_time()?,
            deadline: self.read_time()?,
            interval: Duration(self.read_u64()?),
        }))
    }

    fn decode_stage(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Stage(StageEvent {
            id: self.read_id()?,
            stage: self.read_stage()?,
            final_stage: self.read_stage()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_main_frame_aborted(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::MainFrameAborted(MainFrameAbortedEvent {
            id: self.read_id()?,
            reason: self.read_reason()?,
            reached: self.read_stage()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_commit(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Commit(CommitEvent {
            id: self.read_id()?,
            waits_for_activation: self.read_bool()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_activation(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Activation(ActivationEvent {
            id: self.read_option_id()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_draw(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Draw(DrawEvent {
            id: self.read_option_id()?,
            forced: self.read_bool()?,
            result: self.read_draw_result()?,
            swapped: self.read_bool()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_main_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::MainFrameSummary(MainFrameSummary {
            id: self.read_id()?,
            final_stage: self.read_stage()?,
            outcome: self.read_outcome()?,
            animate_ticks: self.read_u64()?,
            update_ticks: self.read_u64()?,
            commit_ticks: self.read_u64()?,
            total_ticks: self.read_u64()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_BEGIN_IMPL_FRAME => self.decode_begin_impl_frame(),
            TAG_STAGE => self.decode_stage(),
            TAG_MAIN_FRAME_ABORTED => self.decode_main_frame_aborted(),
            TAG_COMMIT => self.decode_commit(),
            TAG_ACTIVATION => self.decode_activation(),
            TAG_DRAW => self.decode_draw(),
            TAG_MAIN_FRAME_SUMMARY => self.decode_main_frame_summary(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ID: BeginFrameId = BeginFrameId {
        source_id: 2,
        sequence: 41,
    };

    fn sample_summary(outcome: MainFrameOutcome) -> MainFrameSummary {
        MainFrameSummary {
            id: ID,
            final_stage: PipelineStage::Commit,
            outcome,
            animate_ticks: 120,
            update_ticks: 900,
            commit_ticks: 300,
            total_ticks: 1_400,
        }
    }

    #[test]
    fn records_one_attempt_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_begin_impl_frame(&BeginImplFrameEvent {
            id: ID,
            frame_time: HostTime(1_000),
            deadline: HostTime(9_000),
            interval: Duration(16_666_667),
        });
        for (stage, ts) in [
            (PipelineStage::Animate, 1_100),
            (PipelineStage::UpdateLayers, 1_220),
            (PipelineStage::Commit, 2_120),
        ] {
            rec.on_stage(&StageEvent {
                id: ID,
                stage,
                final_stage: PipelineStage::Commit,
                timestamp: HostTime(ts),
            });
        }
        rec.on_commit(&CommitEvent {
            id: ID,
            waits_for_activation: true,
            timestamp: HostTime(2_420),
        });
        rec.on_main_frame_summary(&sample_summary(MainFrameOutcome::Committed));

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 6, "every event should decode");
        assert!(matches!(events[0], RecordedEvent::BeginImplFrame(e) if e.interval == Duration(16_666_667)));
        assert!(matches!(
            events[2],
            RecordedEvent::Stage(StageEvent {
                stage: PipelineStage::UpdateLayers,
                ..
            })
        ));
        match events[4] {
            RecordedEvent::Commit(e) => {
                assert_eq!(e.id, ID);
                assert!(e.waits_for_activation, "flag should survive encoding");
            }
            other => panic!("expected Commit, got {other:?}"),
        }
        assert_eq!(
            events[5],
            RecordedEvent::MainFrameSummary(sample_summary(MainFrameOutcome::Committed))
        );
    }

    #[test]
    fn abort_reasons_survive_encoding() {
        let mut rec = RecorderSink::new();
        for reason in CommitEarlyOutReason::ALL {
            rec.on_main_frame_aborted(&MainFrameAbortedEvent {
                id: ID,
                reason,
                reached: PipelineStage::None,
                timestamp: HostTime(5),
            });
            rec.on_main_frame_summary(&sample_summary(MainFrameOutcome::Aborted(reason)));
        }

        let reasons: Vec<_> = decode(rec.as_bytes())
            .filter_map(|e| match e {
                RecordedEvent::MainFrameAborted(e) => Some(e.reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, CommitEarlyOutReason::ALL);

        let outcomes: Vec<_> = decode(rec.as_bytes())
            .filter_map(|e| match e {
                RecordedEvent::MainFrameSummary(s) => Some(s.outcome),
                _ => None,
            })
            .collect();
        assert_eq!(
            outcomes[3],
            MainFrameOutcome::Aborted(CommitEarlyOutReason::FinishedNoUpdates)
        );
    }

    #[test]
    fn draws_and_activations_keep_optional_ids() {
        let mut rec = RecorderSink::new();
        rec.on_activation(&ActivationEvent {
            id: None,
            timestamp: HostTime(10),
        });
        rec.on_draw(&DrawEvent {
            id: Some(ID),
            forced: true,
            result: DrawResult::AbortedMissingHighResContent,
            swapped: true,
            timestamp: HostTime(20),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(
            events,
            [
                RecordedEvent::Activation(ActivationEvent {
                    id: None,
                    timestamp: HostTime(10),
                }),
                RecordedEvent::Draw(DrawEvent {
                    id: Some(ID),
                    forced: true,
                    result: DrawResult::AbortedMissingHighResContent,
                    swapped: true,
                    timestamp: HostTime(20),
                }),
            ]
        );
    }

    #[test]
    fn truncated_record_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_commit(&CommitEvent {
            id: ID,
            waits_for_activation: false,
            timestamp: HostTime(1),
        });
        rec.on_commit(&CommitEvent {
            id: ID,
            waits_for_activation: false,
            timestamp: HostTime(2),
        });
        let bytes = rec.into_bytes();

        let events: Vec<_> = decode(&bytes[..bytes.len() - 3]).collect();
        assert_eq!(events.len(), 1, "the partial second record is dropped");
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        assert_eq!(decode(&[]).count(), 0);
    }
}
