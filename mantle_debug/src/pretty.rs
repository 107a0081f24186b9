// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::fmt;
use std::io::Write;

use mantle_core::history::MainFrameOutcome;
use mantle_core::time::{HostTime, Timebase};
use mantle_core::timing::BeginFrameId;
use mantle_core::trace::{
    ActivationEvent, BeginImplFrameEvent, CommitEvent, DrawEvent, MainFrameAbortedEvent,
    MainFrameSummary, StageEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Returns the destination, dropping the sink.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ticks_to_us(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_micros(ticks)
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.ticks_to_us(t.ticks())
    }
}

/// `source:sequence`, or `-` when the frame is unknown.
struct FrameLabel(Option<BeginFrameId>);

impl fmt::Display for FrameLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{}:{}", id.source_id, id.sequence),
            None => f.write_str("-"),
        }
    }
}

fn frame(id: BeginFrameId) -> FrameLabel {
    FrameLabel(Some(id))
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_begin_impl_frame(&mut self, e: &BeginImplFrameEvent) {
        let _ = writeln!(
            self.writer,
            "[impl-frame] frame={} time={:.1}µs deadline={:.1}µs interval={:.1}µs",
            frame(e.id),
            self.host_us(e.frame_time),
            self.host_us(e.deadline),
            self.ticks_to_us(e.interval.ticks()),
        );
    }

    fn on_stage(&mut self, e: &StageEvent) {
        let _ = writeln!(
            self.writer,
            "[stage] frame={} {} (final {}) at {:.1}µs",
            frame(e.id),
            e.stage.as_str(),
            e.final_stage.as_str(),
            self.host_us(e.timestamp),
        );
    }

    fn on_main_frame_aborted(&mut self, e: &MainFrameAbortedEvent) {
        let _ = writeln!(
            self.writer,
            "[aborted] frame={} reason={} reached={} at {:.1}µs",
            frame(e.id),
            e.reason.as_str(),
            e.reached.as_str(),
            self.host_us(e.timestamp),
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        let wait = if e.waits_for_activation {
            " (waits for activation)"
        } else {
            ""
        };
        let _ = writeln!(
            self.writer,
            "[commit] frame={}{wait} at {:.1}µs",
            frame(e.id),
            self.host_us(e.timestamp),
        );
    }

    fn on_activation(&mut self, e: &ActivationEvent) {
        let _ = writeln!(
            self.writer,
            "[activate] frame={} at {:.1}µs",
            FrameLabel(e.id),
            self.host_us(e.timestamp),
        );
    }

    fn on_draw(&mut self, e: &DrawEvent) {
        let forced = if e.forced { " forced" } else { "" };
        let swapped = if e.swapped { "swapped" } else { "not swapped" };
        let _ = writeln!(
            self.writer,
            "[draw] frame={}{forced} result={} {swapped} at {:.1}µs",
            FrameLabel(e.id),
            e.result.as_str(),
            self.host_us(e.timestamp),
        );
    }

    fn on_main_frame_summary(&mut self, s: &MainFrameSummary) {
        let outcome = match s.outcome {
            MainFrameOutcome::Committed => "committed",
            MainFrameOutcome::Aborted(reason) => reason.as_str(),
        };
        let _ = writeln!(
            self.writer,
            "[summary] frame={} final={} animate={:.1}µs update={:.1}µs \
             commit={:.1}µs total={:.1}µs outcome={outcome}",
            frame(s.id),
            s.final_stage.as_str(),
            self.ticks_to_us(s.animate_ticks),
            self.ticks_to_us(s.update_ticks),
            self.ticks_to_us(s.commit_ticks),
            self.ticks_to_us(s.total_ticks),
        );
    }
}

#[cfg(test)]
mod tests {
    use mantle_core::abort::CommitEarlyOutReason;
    use mantle_core::host::DrawResult;
    use mantle_core::stage::PipelineStage;

    use super::*;

    const ID: BeginFrameId = BeginFrameId {
        source_id: 1,
        sequence: 9,
    };

    fn sink() -> PrettyPrintSink<Vec<u8>> {
        PrettyPrintSink::with_writer(Vec::new(), Timebase::NANOS)
    }

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_writer()).unwrap()
    }

    #[test]
    fn stage_lines_name_both_stages() {
        let mut sink = sink();
        sink.on_stage(&StageEvent {
            id: ID,
            stage: PipelineStage::UpdateLayers,
            final_stage: PipelineStage::Commit,
            timestamp: HostTime(2_500),
        });
        let out = output(sink);
        assert_eq!(
            out, "[stage] frame=1:9 update_layers (final commit) at 2.5µs\n",
            "got: {out}"
        );
    }

    #[test]
    fn abort_and_summary_use_reason_labels() {
        let mut sink = sink();
        sink.on_main_frame_aborted(&MainFrameAbortedEvent {
            id: ID,
            reason: CommitEarlyOutReason::NotVisible,
            reached: PipelineStage::None,
            timestamp: HostTime(0),
        });
        sink.on_main_frame_summary(&MainFrameSummary {
            id: ID,
            final_stage: PipelineStage::Commit,
            outcome: MainFrameOutcome::Aborted(CommitEarlyOutReason::NotVisible),
            animate_ticks: 0,
            update_ticks: 0,
            commit_ticks: 0,
            total_ticks: 1_000,
        });
        let out = output(sink);
        assert!(out.contains("[aborted] frame=1:9 reason=not_visible"), "got: {out}");
        assert!(out.contains("outcome=not_visible"), "got: {out}");
        assert!(out.contains("total=1.0µs"), "got: {out}");
    }

    #[test]
    fn draw_without_frame_prints_placeholder() {
        let mut sink = sink();
        sink.on_draw(&DrawEvent {
            id: None,
            forced: true,
            result: DrawResult::AbortedCheckerboardAnimations,
            swapped: true,
            timestamp: HostTime(0),
        });
        let out = output(sink);
        assert!(out.starts_with("[draw] frame=- forced"), "got: {out}");
        assert!(out.contains(DrawResult::AbortedCheckerboardAnimations.as_str()), "got: {out}");
    }
}
