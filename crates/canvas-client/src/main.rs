//! Headless shared-canvas demo.
//!
//! Spins up an in-memory presence hub with a few peers, drags and nudges
//! the first peer's box, runs a generation on it and logs what every peer
//! would draw.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use canvas_client::{CanvasClient, ClientConfig, logging};
use canvas_core::{BoxFrame, CursorAffordance, KeyInput, KeyboardBus, RenderAdapter};
use canvas_sync::{HubConnection, PresenceHub, ProgressEvent};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "canvas-client", about = "Headless shared-canvas session demo")]
struct Args {
    /// JSON client config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of peers sharing the canvas
    #[arg(long, default_value_t = 2)]
    peers: usize,
}

/// Logs each frame instead of drawing it.
struct LogAdapter {
    viewer: String,
}

impl RenderAdapter for LogAdapter {
    fn draw(&mut self, frame: &BoxFrame) {
        let o = frame.outline;
        tracing::info!(
            viewer = %self.viewer,
            session = %frame.session,
            local = frame.is_local,
            x = o.x,
            y = o.y,
            width = o.width,
            height = o.height,
            stop = frame.outline_gradient.stop,
            bar = frame.progress_bar.map(|bar| bar.rect.width),
            label = frame.label.as_ref().map(|label| label.text.as_str()),
            "box"
        );
    }

    fn set_cursor(&mut self, cursor: CursorAffordance) {
        tracing::debug!(viewer = %self.viewer, cursor = cursor.css(), "cursor");
    }
}

type Peer = Rc<RefCell<CanvasClient<HubConnection>>>;

fn pump_all(peers: &[Peer]) {
    for peer in peers {
        peer.borrow_mut().pump();
    }
}

fn render_all(peers: &[Peer]) {
    for peer in peers {
        let peer = peer.borrow();
        let mut adapter = LogAdapter {
            viewer: peer.session_id().to_string(),
        };
        peer.render(&mut adapter);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClientConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    logging::init(&config.log_filter)?;

    let hub = PresenceHub::new();
    let peers: Vec<Peer> = (0..args.peers.max(1))
        .map(|_| Rc::new(RefCell::new(CanvasClient::new(hub.connect(), &config))))
        .collect();
    for peer in &peers {
        peer.borrow_mut().open()?;
    }
    pump_all(&peers);
    pump_all(&peers);
    tracing::info!(peers = peers.len(), members = hub.member_count(), "all peers joined");

    let lead = &peers[0];
    let lead_id = lead.borrow().session_id().clone();
    let bus = KeyboardBus::new();
    CanvasClient::bind_keyboard(lead, &bus);

    {
        let mut client = lead.borrow_mut();
        let corner = {
            let b = client.selection();
            (b.right(), b.bottom())
        };
        if let Some(target) = client.pointer_down_at(corner) {
            tracing::info!(?target, "dragging");
            client.pointer_move((corner.0 + 64.0, corner.1 + 32.0));
        }
    }
    render_all(&peers[..1]);
    lead.borrow_mut().pointer_up();

    bus.dispatch(&KeyInput::new("ArrowRight", true));
    bus.dispatch(&KeyInput::new("ArrowDown", false));
    pump_all(&peers);
    render_all(&peers);

    for progress in [0.0, 25.0, 50.0, 75.0, 100.0] {
        hub.publish_progress(&ProgressEvent {
            eta_relative: (100.0 - progress) / 10.0,
            progress,
            current_image: None,
            is_generating: progress < 100.0,
            generating_session_name: lead_id.to_string(),
        })?;
        pump_all(&peers);
        render_all(&peers);
    }

    let (width, height) = lead.borrow().selection().generation_size();
    tracing::info!(session = %lead_id, width, height, "generation size");

    for peer in &peers {
        peer.borrow_mut().close();
    }
    Ok(())
}
