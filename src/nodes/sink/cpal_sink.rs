//! Device output through cpal

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, SupportedStreamConfig};
use dasp_graph::{Buffer, Input};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::node::{AudioNode, ProcessContext};

/// Plays the mix on a cpal output device.
///
/// The stream lives on its own thread and pulls from a ring buffer this node
/// fills, so the graph can be pumped from anywhere.
pub struct CpalSink {
    buffer: Producer<f32>,
    channels: usize,
    samples_consumed: Arc<AtomicUsize>,
    had_underrun: Arc<AtomicBool>,
    _output: OutputThread,
}

impl CpalSink {
    pub fn new(device: &cpal::Device, config: &SupportedStreamConfig) -> Result<Self> {
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config = config.config();
        let sample_rate = stream_config.sample_rate.0;

        // ~100ms of slack for scheduling jitter
        let buffer_samples = ((sample_rate as f32 * 0.1) as usize) * channels;
        let (producer, consumer) = RingBuffer::<f32>::new(buffer_samples.next_power_of_two().max(8192));

        let samples_consumed = Arc::new(AtomicUsize::new(0));
        let had_underrun = Arc::new(AtomicBool::new(false));
        let shared = (samples_consumed.clone(), had_underrun.clone());

        // cpal streams aren't Send, so the stream is built on the thread that keeps it
        let device = device.clone();
        let output = OutputThread::spawn("klangort-output", move || {
            let stream = build_stream(&device, sample_format, &stream_config, consumer, shared)?;
            stream.play().map_err(|e| Error::Backend(e.to_string()))?;
            debug!(sample_rate, "output stream running");
            Ok(stream)
        })?;

        Ok(Self {
            buffer: producer,
            channels,
            samples_consumed,
            had_underrun,
            _output: output,
        })
    }

    /// Samples the device has played so far.
    #[inline]
    pub fn samples_consumed(&self) -> usize {
        self.samples_consumed.load(Ordering::Relaxed)
    }

    /// Free space in the ring buffer, in samples.
    #[inline]
    pub fn buffer_available(&self) -> usize {
        self.buffer.slots()
    }

    /// Check and clear the underrun flag
    pub fn check_underrun(&self) -> bool {
        self.had_underrun.swap(false, Ordering::Relaxed)
    }
}

/// A thread that keeps whatever `start` returns alive until dropped.
struct OutputThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OutputThread {
    fn spawn<S, F>(name: &str, start: F) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let held = match start() {
                    Ok(held) => held,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while !stopped.load(Ordering::Acquire) {
                    thread::park();
                }
                drop(held);
            })
            .map_err(|e| Error::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(Error::Backend("output thread exited before the stream started".into())),
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("output thread panicked");
            }
        }
        debug!("output stream stopped");
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    consumer: Consumer<f32>,
    shared: (Arc<AtomicUsize>, Arc<AtomicBool>),
) -> Result<cpal::Stream> {
    match sample_format {
        SampleFormat::F32 => build_typed::<f32>(device, stream_config, consumer, shared),
        SampleFormat::I16 => build_typed::<i16>(device, stream_config, consumer, shared),
        SampleFormat::U16 => build_typed::<u16>(device, stream_config, consumer, shared),
        other => Err(Error::Backend(format!("unsupported sample format {other:?}"))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut consumer: Consumer<f32>,
    (samples_consumed, had_underrun): (Arc<AtomicUsize>, Arc<AtomicBool>),
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _| {
                let mut underrun = false;
                for sample in data.iter_mut() {
                    let s = consumer.pop().unwrap_or_else(|_| {
                        underrun = true;
                        0.0
                    });
                    *sample = T::from_sample(s.clamp(-1.0, 1.0));
                }
                if underrun {
                    had_underrun.store(true, Ordering::Relaxed);
                }
                samples_consumed.fetch_add(data.len(), Ordering::Relaxed);
            },
            |err| error!(%err, "output stream error"),
            None,
        )
        .map_err(|e| Error::Backend(e.to_string()))
}

impl AudioNode for CpalSink {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        let Some(buffers) = inputs.first().map(|i| i.buffers()).filter(|b| !b.is_empty()) else {
            return;
        };

        let frames = buffers[0].len();
        if self.buffer.slots() < frames * self.channels {
            // producing faster than the device plays; drop the block whole
            warn!("output buffer full, dropping block");
            return;
        }

        for i in 0..frames {
            for ch in 0..self.channels {
                let _ = self.buffer.push(buffers[ch.min(buffers.len() - 1)][i]);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}
