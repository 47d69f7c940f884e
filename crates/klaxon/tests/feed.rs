//! End-to-end checks against a local HTTP feed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::routing::get;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use klaxon_engine::{
    AckSettings, Alarm, ChannelVolume, Error, HttpMessageSource, MessageSource, StreamSupervisor,
    SupervisorSettings, TerminalPrompt, VolumeControl, VolumeSnapshot,
};

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn chunked(chunks: &[&'static str], hang: bool) -> Body {
    let chunks = futures::stream::iter(
        chunks
            .iter()
            .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(c.as_bytes())))
            .collect::<Vec<_>>(),
    );
    if hang {
        Body::from_stream(chunks.chain(futures::stream::pending()))
    } else {
        Body::from_stream(chunks)
    }
}

fn source() -> HttpMessageSource {
    HttpMessageSource::with_connect_timeout(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn frames_lines_split_across_chunks() {
    let router = Router::new().route(
        "/json",
        get(|| async {
            chunked(
                &["{\"mess", "age\":\"fire\"}\n{\"event\":", "\"keepalive\"}\n"],
                false,
            )
        }),
    );
    let addr = serve(router).await;

    let lines: Vec<Bytes> = source()
        .open(&format!("http://{addr}/json"))
        .await
        .unwrap()
        .map(|line| line.unwrap())
        .collect()
        .await;

    assert_eq!(
        lines,
        [
            Bytes::from_static(br#"{"message":"fire"}"#),
            Bytes::from_static(br#"{"event":"keepalive"}"#),
        ]
    );
    let decoded: Vec<_> = lines
        .iter()
        .map(|l| klaxon_engine::decode(l).unwrap())
        .collect();
    assert_eq!(decoded[0].as_ref().unwrap().text(), "fire");
    assert!(decoded[1].is_none());
}

#[tokio::test]
async fn error_status_is_reported() {
    let router = Router::new().route(
        "/json",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let addr = serve(router).await;

    let err = source()
        .open(&format!("http://{addr}/json"))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::HttpStatus {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ..
        }
    ));
}

struct Device {
    channels: Mutex<Vec<ChannelVolume>>,
}

impl Device {
    fn levels(&self) -> Vec<u32> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.current_level)
            .collect()
    }
}

#[async_trait]
impl VolumeControl for Device {
    async fn get(&self) -> klaxon_engine::Result<VolumeSnapshot> {
        Ok(VolumeSnapshot::new(self.channels.lock().unwrap().clone()))
    }

    async fn set_channel(&self, channel: &str, level: u32) -> klaxon_engine::Result<()> {
        let mut channels = self.channels.lock().unwrap();
        if let Some(c) = channels.iter_mut().find(|c| c.channel == channel) {
            c.current_level = level;
        }
        Ok(())
    }
}

struct Pulses {
    device: Arc<Device>,
    seen: Mutex<Vec<(String, Vec<u32>)>>,
    done: CancellationToken,
}

#[async_trait]
impl Alarm for Pulses {
    async fn emit(&self, message: &str) -> klaxon_engine::Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((message.to_owned(), self.device.levels()));
        self.done.cancel();
        Ok(())
    }
}

#[tokio::test]
async fn reconnects_after_malformed_line_and_delivers_the_alarm() {
    let connections = Arc::new(AtomicU32::new(0));
    let router = Router::new()
        .route(
            "/json",
            get(|State(connections): State<Arc<AtomicU32>>| async move {
                let body = match connections.fetch_add(1, Ordering::SeqCst) {
                    0 => chunked(&["not json\n"], true),
                    _ => chunked(&["{\"event\":\"open\"}\n", "{\"message\":\"fire\"}\n"], true),
                };
                ([(header::CONTENT_TYPE, "application/x-ndjson")], body)
            }),
        )
        .with_state(connections.clone());
    let addr = serve(router).await;

    let device = Arc::new(Device {
        channels: Mutex::new(vec![
            ChannelVolume {
                channel: "music".to_owned(),
                current_level: 4,
                max_level: 15,
            },
            ChannelVolume {
                channel: "alarm".to_owned(),
                current_level: 0,
                max_level: 7,
            },
        ]),
    });
    let shutdown = CancellationToken::new();
    let pulsed = CancellationToken::new();
    let alarm = Arc::new(Pulses {
        device: device.clone(),
        seen: Mutex::new(Vec::new()),
        done: pulsed.clone(),
    });
    let prompt: &'static [u8] = b"y\n";

    let supervisor = StreamSupervisor::new(
        Arc::new(source()),
        device.clone(),
        alarm.clone(),
        Box::new(TerminalPrompt::new(prompt, tokio::io::sink())),
        SupervisorSettings {
            feed_url: format!("http://{addr}/json"),
            recovery_sleep: Duration::from_millis(50),
            ack: AckSettings {
                timeout: Duration::from_secs(1),
                ..Default::default()
            },
        },
        shutdown.clone(),
    );

    let stopper = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            pulsed.cancelled().await;
            // Let the episode finish restoring before shutting down.
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.cancel();
        }
    });
    let stats = tokio::time::timeout(Duration::from_secs(10), supervisor.run())
        .await
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert_eq!(stats.reconnects, 1);
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(
        *alarm.seen.lock().unwrap(),
        [("fire".to_owned(), vec![15, 7])]
    );
    assert_eq!(device.levels(), [4, 0]);
}
