// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 5, §8: a length-1 `ABORT` frame is out-of-band — the server
//! invokes its control sink with `Abort` exactly once and never enqueues
//! the frame onto the FIFO the user handler would see.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use daemon_bridge::{
    protocol::{IdentityCodec, codec::frame, tag::PacketTag},
    server::{ControlEvent, ServerEngine},
    transport::{Transport, loopback::LoopbackTransport},
};

use crate::integration_tests::common::not_reached_handler;

#[tokio::test]
async fn abort_invokes_the_control_sink_exactly_once_and_bypasses_the_fifo() {
    let (client_transport, server_transport) = LoopbackTransport::pair();

    let abort_count = Arc::new(AtomicUsize::new(0));
    let abort_count_for_sink = abort_count.clone();
    let control_sink = Arc::new(move |event: ControlEvent| {
        if event == ControlEvent::Abort {
            abort_count_for_sink.fetch_add(1, Ordering::SeqCst);
        }
    });

    let server = ServerEngine::new(
        server_transport,
        Arc::new(IdentityCodec),
        not_reached_handler(),
        control_sink,
    );
    let server_task = server.clone();
    tokio::spawn(async move {
        let _ = server_task.serve("ignored", Some(0), None).await;
    });

    let channel = client_transport.connect("ignored", 0).await.expect("connect");
    let _ = client_transport.poll(Duration::from_millis(50)).await;

    let abort_wire = frame(&IdentityCodec, PacketTag::Abort, &[]).expect("frame");
    client_transport
        .send(channel, abort_wire)
        .await
        .expect("send ABORT");

    // Give the server's poll/dispatch loop a few iterations to observe it.
    // If ABORT had been enqueued instead of handled out-of-band, the
    // not_reached_handler would panic inside the server task.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(abort_count.load(Ordering::SeqCst), 1);
}
