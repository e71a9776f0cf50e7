// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Devices described in JSON and bound to simulated hardware.

mod common;

use common::{device_order, setup_test};
use xvip::{
    Error, MediaDevice,
    config::PipelineConfig,
    format::{FrameFormat, MbusCode},
    graphdef::GraphDef,
    routing::Route,
    sim::SimulatedBackend,
};
use xvip_sys::TraceEvent;

const CAMERA: &str = r#"{
    "entities": [
        { "name": "sensor", "kind": "sensor",
          "format": { "code": 12308, "width": 1280, "height": 720 } },
        { "name": "csi2rx", "kind": "csi2rx",
          "routes": [
              { "sink_pad": 0, "sink_stream": 0, "source_pad": 1, "source_stream": 0 },
              { "sink_pad": 0, "sink_stream": 1, "source_pad": 1, "source_stream": 1 }
          ],
          "format": { "code": 12308, "width": 1280, "height": 720 } },
        { "name": "switch", "kind": "axis_switch", "sinks": 1, "sources": 2,
          "tdest_routing": true,
          "routes": [
              { "sink_pad": 0, "sink_stream": 0, "source_pad": 1, "source_stream": 0 },
              { "sink_pad": 0, "sink_stream": 1, "source_pad": 2, "source_stream": 0 }
          ],
          "format": { "code": 12308, "width": 1280, "height": 720 } },
        { "name": "cfa0", "kind": "cfa",
          "format": { "code": 12308, "width": 1280, "height": 720 } },
        { "name": "cfa1", "kind": "cfa",
          "format": { "code": 12308, "width": 1280, "height": 720 } },
        { "name": "hls", "kind": "hls",
          "format": { "code": 4106, "width": 1280, "height": 720 } },
        { "name": "vcap0", "kind": "dma", "direction": "output",
          "format": { "code": 4106, "width": 1280, "height": 720 } },
        { "name": "vcap1", "kind": "dma", "direction": "output",
          "format": { "code": 4106, "width": 1280, "height": 720 } }
    ],
    "links": [
        { "source": "sensor:0", "sink": "csi2rx:0" },
        { "source": "csi2rx:1", "sink": "switch:0" },
        { "source": "switch:1", "sink": "cfa0:0" },
        { "source": "switch:2", "sink": "cfa1:0" },
        { "source": "cfa0:1", "sink": "vcap0:0" },
        { "source": "cfa1:1", "sink": "hls:0" },
        { "source": "hls:1", "sink": "vcap1:0" }
    ]
}"#;

fn camera(backend: &SimulatedBackend) -> MediaDevice {
    let def: GraphDef = serde_json::from_str(CAMERA).unwrap();
    MediaDevice::from_graph_def(&def, backend, PipelineConfig::default()).unwrap()
}

#[test]
fn graph_description_builds_the_device() {
    setup_test();
    let backend = SimulatedBackend::new();
    let dev = camera(&backend);

    let switch = dev.find("switch").unwrap();
    assert_eq!(
        dev.get_routing(switch).unwrap(),
        [Route::new(0, 0, 1, 0), Route::new(0, 1, 2, 0)]
    );

    // Initial formats are applied after routing and mirrored downstream.
    let cfa0 = dev.find("cfa0").unwrap();
    assert_eq!(
        dev.get_format(cfa0, 1, 0).unwrap(),
        FrameFormat {
            code: MbusCode::RGB888_1X24,
            width: 1280,
            height: 720,
            ..Default::default()
        }
    );
    assert_eq!(dev.get_format(switch, 2, 0).unwrap().width, 1280);
    assert!(backend.registers_of("cfa0").is_some());
    assert!(backend.channel_of("vcap1").is_some());
}

#[test]
fn simulated_camera_streams_in_sync_mode() {
    setup_test();
    let backend = SimulatedBackend::new();
    let dev = camera(&backend);
    let vcap0 = dev.find("vcap0").unwrap();
    let vcap1 = dev.find("vcap1").unwrap();

    dev.start_streaming(vcap0).unwrap();
    assert!(backend.log().is_empty());
    dev.start_streaming(vcap1).unwrap();

    let events = backend.log().events();
    let actions: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Action { device, action } => Some(format!("{device} {action}")),
            TraceEvent::Write { .. } => None,
        })
        .collect();
    assert_eq!(actions, ["vcap0 start", "vcap1 start"]);

    // Both output engines run before any block is touched, then each branch
    // is enabled from its engine up to the camera.
    assert_eq!(
        device_order(backend.log()),
        ["vcap0", "vcap1", "cfa0", "csi2rx", "sensor", "hls", "cfa1"]
    );

    dev.stop_streaming(vcap1);
    dev.stop_streaming(vcap0);
    assert!(dev.graph().pipeline_of(vcap0).is_none());
}

#[test]
fn unknown_entities_in_links_are_rejected() {
    let def: GraphDef = serde_json::from_str(
        r#"{
            "entities": [ { "name": "cfa", "kind": "cfa" } ],
            "links": [ { "source": "cfa:1", "sink": "nowhere:0" } ]
        }"#,
    )
    .unwrap();
    let result = MediaDevice::from_graph_def(&def, &SimulatedBackend::new(), PipelineConfig::default());
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}
