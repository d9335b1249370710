use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{DeviceId, FrameRead, FrameSource, SourceInfo};

const DEFAULT_CHANNEL_CAPACITY: usize = 2;

/// What the capture thread does when the consumer falls behind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameDropPolicy {
    /// Wait for room; nothing is ever dropped.
    #[default]
    Block,
    /// Discard frames that arrive while the channel is full.
    DropNewest,
}

enum Captured {
    Frame(Frame),
    End,
    Failed(String),
}

/// Runs another source's blocking reads on a background thread and hands
/// frames over through a bounded channel, so capture overlaps processing.
///
/// Arrival order is kept under both policies; end of stream and read
/// errors are never dropped.
pub struct ThreadedFrameSource {
    inner: Option<Box<dyn FrameSource>>,
    capacity: usize,
    policy: FrameDropPolicy,
    dropped: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    rx: Option<crossbeam_channel::Receiver<Captured>>,
    handle: Option<JoinHandle<Box<dyn FrameSource>>>,
    ended: bool,
}

impl ThreadedFrameSource {
    pub fn new(inner: Box<dyn FrameSource>, policy: FrameDropPolicy) -> Self {
        Self {
            inner: Some(inner),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            policy,
            dropped: Arc::new(AtomicUsize::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
            rx: None,
            handle: None,
            ended: false,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Frames discarded under [`FrameDropPolicy::DropNewest`] so far.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn stop_capture(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Unblocks a capture thread waiting on a full channel.
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(inner) => self.inner = Some(inner),
                Err(_) => log::error!("Capture thread panicked"),
            }
        }
    }
}

impl FrameSource for ThreadedFrameSource {
    fn open(&mut self, device: &DeviceId) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        self.stop_capture();
        let mut inner = self
            .inner
            .take()
            .ok_or("ThreadedFrameSource: capture source was lost")?;
        let info = match inner.open(device) {
            Ok(info) => info,
            Err(e) => {
                self.inner = Some(inner);
                return Err(e);
            }
        };

        let (tx, rx) = crossbeam_channel::bounded::<Captured>(self.capacity);
        self.stop = Arc::new(AtomicBool::new(false));
        self.handle = Some(spawn_capture(
            inner,
            tx,
            self.policy,
            self.stop.clone(),
            self.dropped.clone(),
        ));
        self.rx = Some(rx);
        self.ended = false;
        Ok(info)
    }

    fn read_frame(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>> {
        if self.ended {
            return Ok(FrameRead::EndOfStream);
        }
        let rx = self.rx.as_ref().ok_or("ThreadedFrameSource: not opened")?;
        match rx.recv() {
            Ok(Captured::Frame(frame)) => Ok(FrameRead::Frame(frame)),
            Ok(Captured::Failed(message)) => Err(message.into()),
            Ok(Captured::End) | Err(_) => {
                self.ended = true;
                Ok(FrameRead::EndOfStream)
            }
        }
    }

    fn close(&mut self) {
        self.stop_capture();
        if let Some(inner) = self.inner.as_mut() {
            inner.close();
        }
        let dropped = self.dropped_frames();
        if dropped > 0 {
            log::info!("Capture dropped {dropped} frame(s)");
        }
    }
}

impl Drop for ThreadedFrameSource {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

fn spawn_capture(
    mut inner: Box<dyn FrameSource>,
    tx: crossbeam_channel::Sender<Captured>,
    policy: FrameDropPolicy,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
) -> JoinHandle<Box<dyn FrameSource>> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let message = match inner.read_frame() {
                Ok(FrameRead::Frame(frame)) => Captured::Frame(frame),
                Ok(FrameRead::EndOfStream) => {
                    let _ = tx.send(Captured::End);
                    break;
                }
                Err(e) => Captured::Failed(e.to_string()),
            };

            let delivered = match (policy, message) {
                (FrameDropPolicy::DropNewest, Captured::Frame(frame)) => {
                    match tx.try_send(Captured::Frame(frame)) {
                        Ok(()) => true,
                        Err(crossbeam_channel::TrySendError::Full(_)) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                            true
                        }
                        Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
                    }
                }
                (_, message) => tx.send(message).is_ok(),
            };
            if !delivered {
                break;
            }
        }
        inner.close();
        inner
    })
}
