//! One interactive canvas session.
//!
//! [`CanvasClient`] owns the local geometry, both input controllers, the
//! sync service and one overlay renderer per generating session. Input
//! mutates the local box and publishes it; [`CanvasClient::pump`] pulls
//! remote state in; [`CanvasClient::scene`] lays out everything to draw.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use canvas_core::{
    BoxFrame, ComposeOptions, CursorAffordance, DragTarget, GeometryModel, KeyInput,
    KeyNudgeController, KeyboardBus, PreviewRequest, ProgressOverlayRenderer, RenderAdapter,
    SelectionBox, TransformController, compose_box, hit_test,
};
use canvas_sync::{PresenceChannel, SessionId, SessionSyncService, SyncError, SyncUpdate};

use crate::config::ClientConfig;

pub struct CanvasClient<C: PresenceChannel> {
    geometry: GeometryModel,
    transform: TransformController,
    nudge: KeyNudgeController,
    sync: SessionSyncService<C>,
    overlays: BTreeMap<SessionId, ProgressOverlayRenderer>,
}

impl<C: PresenceChannel> CanvasClient<C> {
    pub fn new(channel: C, config: &ClientConfig) -> Self {
        Self::with_session_id(SessionId::generate(), channel, config)
    }

    pub fn with_session_id(session_id: SessionId, channel: C, config: &ClientConfig) -> Self {
        let mut transform = TransformController::new();
        transform.set_scale(config.zoom);
        Self {
            geometry: GeometryModel::with_box(config.initial_box),
            transform,
            nudge: KeyNudgeController::new(config.nudge_step, config.nudge_multiplier),
            sync: SessionSyncService::with_session_id(session_id, channel, config.initial_box),
            overlays: BTreeMap::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        self.sync.session_id()
    }

    pub fn selection(&self) -> SelectionBox {
        self.geometry.get()
    }

    pub fn sync(&self) -> &SessionSyncService<C> {
        &self.sync
    }

    pub fn transform(&self) -> &TransformController {
        &self.transform
    }

    pub fn overlay(&self, session_id: &SessionId) -> Option<&ProgressOverlayRenderer> {
        self.overlays.get(session_id)
    }

    /// Whether the local session is generating; input is locked meanwhile.
    pub fn is_generating(&self) -> bool {
        self.sync.local().is_generating
    }

    pub fn open(&mut self) -> Result<(), SyncError> {
        self.sync.open()
    }

    pub fn close(&mut self) {
        self.sync.close();
        let local = self.sync.session_id().clone();
        self.overlays.retain(|id, _| *id == local);
    }

    /// Whether the box is the active interaction target. Hosts turn this off
    /// while focus is in a text input so arrow keys are left alone.
    pub fn set_keyboard_active(&mut self, active: bool) {
        self.nudge.set_enabled(active);
    }

    pub fn is_keyboard_active(&self) -> bool {
        self.nudge.is_enabled()
    }

    /// Cursor for the host surface; plain while the local box is generating.
    pub fn cursor(&self) -> CursorAffordance {
        if self.is_generating() {
            CursorAffordance::Default
        } else {
            self.transform.cursor()
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.transform.set_scale(zoom);
    }

    /// Restore the default box and publish it.
    pub fn reset_box(&mut self) -> SelectionBox {
        let selection = self.geometry.reset();
        self.sync.publish(selection);
        selection
    }

    pub fn pointer_enter(&mut self, target: DragTarget) -> CursorAffordance {
        let generating = self.is_generating();
        self.transform.pointer_enter(target, generating)
    }

    pub fn pointer_leave(&mut self, target: DragTarget) -> CursorAffordance {
        self.transform.pointer_leave(target)
    }

    /// Start dragging `target` (host did the hit-testing).
    pub fn pointer_down(&mut self, target: DragTarget, point: (f32, f32)) -> bool {
        let generating = self.is_generating();
        self.transform
            .pointer_down(target, point, &self.geometry, generating)
    }

    /// Hit-test `point` against the local box and start a drag on a hit.
    pub fn pointer_down_at(&mut self, point: (f32, f32)) -> Option<DragTarget> {
        let target = hit_test(&self.geometry.get(), point, self.transform.scale())?;
        self.pointer_down(target, point).then_some(target)
    }

    pub fn pointer_move(&mut self, point: (f32, f32)) -> Option<SelectionBox> {
        let selection = self.transform.pointer_move(point, &mut self.geometry)?;
        self.sync.publish(selection);
        Some(selection)
    }

    pub fn pointer_up(&mut self) -> Option<SelectionBox> {
        self.transform.pointer_up(&self.geometry)
    }

    pub fn capture_lost(&mut self) -> Option<SelectionBox> {
        self.transform.capture_lost(&self.geometry)
    }

    pub fn key_down(&mut self, input: &KeyInput) -> Option<SelectionBox> {
        let generating = self.is_generating();
        let selection = self.nudge.handle_key(input, generating, &mut self.geometry)?;
        self.sync.publish(selection);
        Some(selection)
    }

    /// Drain the channel: refresh remote boxes, route progress into the
    /// overlay renderers and resolve the preview loads it asked for.
    pub fn pump(&mut self) -> Vec<SyncUpdate> {
        let updates = self.sync.pump();
        let mut requests = Vec::new();

        for update in &updates {
            match update {
                SyncUpdate::Progress(snapshot) => {
                    let session = SessionId::from(snapshot.generating_session_id.as_str());
                    let overlay = self.overlays.entry(session.clone()).or_default();
                    if let Some(request) = overlay.apply(snapshot.clone()) {
                        requests.push((session, request));
                    }
                }
                SyncUpdate::RemoteSessions => {
                    let sync = &self.sync;
                    self.overlays.retain(|id, _| {
                        id == sync.session_id() || sync.remote_sessions().contains_key(id)
                    });
                }
                SyncUpdate::Joined => {}
            }
        }

        // Loads resolve after every event of this batch has been applied,
        // so the ones made stale by a later flip are dropped.
        for (session, request) in requests {
            self.resolve_preview(&session, &request);
        }

        if self.is_generating() && self.transform.is_dragging() {
            tracing::debug!("generation started, finishing drag");
            self.transform.capture_lost(&self.geometry);
        }
        updates
    }

    fn resolve_preview(&mut self, session: &SessionId, request: &PreviewRequest) -> bool {
        let result = request.decode();
        self.overlays
            .get_mut(session)
            .is_some_and(|overlay| overlay.complete_preview(request.ticket, result))
    }

    /// Frames for the local box followed by every remote box.
    pub fn scene(&self) -> Vec<BoxFrame> {
        let scale = self.transform.scale();
        let local = self.geometry.get();
        let generating = self.is_generating();

        let mut frames = Vec::with_capacity(1 + self.sync.remote_sessions().len());
        frames.extend(compose_box(
            self.session_id().as_str(),
            &local,
            self.overlays.get(self.session_id()).map(|o| o.frame(&local)),
            self.transform.dimension_label(&local),
            ComposeOptions {
                scale,
                anchors: !generating,
                is_local: true,
            },
        ));

        for (id, entry) in self.sync.remote_sessions() {
            frames.extend(compose_box(
                id.as_str(),
                &entry.selection_box,
                self.overlays.get(id).map(|o| o.frame(&entry.selection_box)),
                None,
                ComposeOptions {
                    scale,
                    anchors: false,
                    is_local: false,
                },
            ));
        }
        frames
    }

    pub fn render(&self, adapter: &mut impl RenderAdapter) {
        for frame in self.scene() {
            adapter.draw(&frame);
        }
        adapter.set_cursor(self.cursor());
    }

    /// Release the keyboard subscription, if any.
    pub fn unbind_keyboard(&mut self) {
        self.nudge.unbind();
    }
}

impl<C: PresenceChannel + 'static> CanvasClient<C> {
    /// Route arrow keys from `bus` into `client`. The listener is owned by
    /// the client and goes away with it.
    pub fn bind_keyboard(client: &Rc<RefCell<Self>>, bus: &KeyboardBus) {
        let weak = Rc::downgrade(client);
        let listener = bus.listen(move |input| {
            let Some(client) = weak.upgrade() else {
                return;
            };
            if let Ok(mut client) = client.try_borrow_mut() {
                client.key_down(input);
            }
        });
        client.borrow_mut().nudge.bind(listener);
    }
}
