// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording collaborators shared by the proxy tests.

use std::sync::Arc;

use mantle_core::abort::SwapPromiseFailure;
use mantle_core::host::{ConsumerTree, DrawFrame, DrawResult, ReturnedResource, SceneHost, SyncToken};
use mantle_core::stage::StageRequests;
use mantle_core::time::HostTime;
use parking_lot::Mutex;

use crate::resource::ConsumerReleaseCallback;

/// Calls made on either side, in order.
#[derive(Clone, Debug, Default)]
pub(crate) struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub(crate) fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub(crate) fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }

    /// Index of the first occurrence of `entry`.
    pub(crate) fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub(crate) fn clear(&self) {
        self.0.lock().clear();
    }
}

pub(crate) struct RecordingHost {
    pub(crate) log: Log,
    pub(crate) updates: bool,
    pub(crate) commit_from_update: bool,
    next_snapshot: u32,
}

impl RecordingHost {
    pub(crate) fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            updates: true,
            commit_from_update: false,
            next_snapshot: 0,
        }
    }
}

impl SceneHost for RecordingHost {
    type Snapshot = u32;

    fn will_begin_main_frame(&mut self) {
        self.log.push("host.will_begin_main_frame");
    }

    fn animate_layers(&mut self, _: HostTime, _: &mut StageRequests<'_>) {
        self.log.push("host.animate_layers");
    }

    fn layout(&mut self) {
        self.log.push("host.layout");
    }

    fn update_layers(&mut self, requests: &mut StageRequests<'_>) -> bool {
        self.log.push("host.update_layers");
        if self.commit_from_update {
            requests.request_commit();
        }
        self.updates
    }

    fn finish_commit(&mut self) -> u32 {
        self.next_snapshot += 1;
        self.log.push(format!("host.finish_commit({})", self.next_snapshot));
        self.next_snapshot
    }

    fn commit_complete(&mut self) {
        self.log.push("host.commit_complete");
    }

    fn did_begin_main_frame(&mut self) {
        self.log.push("host.did_begin_main_frame");
    }

    fn did_complete_swap(&mut self) {
        self.log.push("host.did_complete_swap");
    }

    fn break_swap_promises(&mut self, reason: SwapPromiseFailure) {
        self.log.push(format!("host.break_swap_promises({reason:?})"));
    }

    fn request_new_output_surface(&mut self) {
        self.log.push("host.request_new_output_surface");
    }

    fn did_lose_output_surface(&mut self) {
        self.log.push("host.did_lose_output_surface");
    }

    fn resources_returned(&mut self, resources: Vec<ReturnedResource>) {
        self.log.push(format!("host.resources_returned({})", resources.len()));
    }
}

pub(crate) struct RecordingTree {
    pub(crate) log: Log,
    pub(crate) ready_to_activate: bool,
    pub(crate) prepare: DrawResult,
    pub(crate) release_on_commit: Option<ConsumerReleaseCallback>,
    pub(crate) returned: Vec<ReturnedResource>,
}

impl RecordingTree {
    pub(crate) fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            ready_to_activate: true,
            prepare: DrawResult::Success,
            release_on_commit: None,
            returned: Vec::new(),
        }
    }
}

impl ConsumerTree for RecordingTree {
    type Snapshot = u32;

    fn finish_commit(&mut self, snapshot: u32) {
        self.log.push(format!("tree.finish_commit({snapshot})"));
        if let Some(release) = self.release_on_commit.take() {
            release.run(SyncToken(snapshot.into()), false);
        }
    }

    fn ready_to_activate_after_commit(&self) -> bool {
        self.ready_to_activate
    }

    fn activate_sync_tree(&mut self) {
        self.log.push("tree.activate");
    }

    fn prepare_to_draw(&mut self, _: &mut DrawFrame) -> DrawResult {
        self.prepare
    }

    fn draw_layers(&mut self, _: &DrawFrame) {
        self.log.push("tree.draw");
    }

    fn take_returned_resources(&mut self) -> Vec<ReturnedResource> {
        std::mem::take(&mut self.returned)
    }

    fn finish_all_rendering(&mut self) {
        self.log.push("tree.finish_all_rendering");
    }

    fn release_output_surface(&mut self) {
        self.log.push("tree.release_output_surface");
    }
}
