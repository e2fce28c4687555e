//! Fakes for the hardware collaborators

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::feature::{AudioError, AudioInput};
use crate::indicator::{Rgb, StatusIndicator};
use crate::link::{AdvertisingData, ConnectionHandle, RadioDriver, RadioError};
use crate::storage::{FeatureLog, StorageError};

/// Radio that records every command it receives
#[derive(Debug, Default)]
pub struct RecordingRadio {
    advertising_starts: AtomicUsize,
    fail_next_advertising: AtomicBool,
    last_advertisement: Mutex<Option<AdvertisingData>>,
    notifications: Mutex<Vec<(ConnectionHandle, Vec<u8>)>>,
    disconnects: Mutex<Vec<ConnectionHandle>>,
}

impl RecordingRadio {
    pub fn advertising_starts(&self) -> usize {
        self.advertising_starts.load(Ordering::SeqCst)
    }

    pub fn fail_next_advertising(&self) {
        self.fail_next_advertising.store(true, Ordering::SeqCst);
    }

    pub fn last_advertisement(&self) -> Option<AdvertisingData> {
        self.last_advertisement.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(ConnectionHandle, Vec<u8>)> {
        self.notifications.lock().unwrap().clone()
    }

    /// Sequence numbers of every notified frame, in transmission order
    pub fn sent_sequences(&self) -> Vec<u16> {
        self.notifications()
            .iter()
            .map(|(_, bytes)| u16::from_be_bytes([bytes[2], bytes[3]]))
            .collect()
    }

    pub fn disconnects(&self) -> Vec<ConnectionHandle> {
        self.disconnects.lock().unwrap().clone()
    }
}

impl RadioDriver for RecordingRadio {
    fn start_advertising(&self, data: &AdvertisingData) -> Result<(), RadioError> {
        if self.fail_next_advertising.swap(false, Ordering::SeqCst) {
            return Err(RadioError::Advertising("rc=2".into()));
        }
        self.advertising_starts.fetch_add(1, Ordering::SeqCst);
        *self.last_advertisement.lock().unwrap() = Some(data.clone());
        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), RadioError> {
        Ok(())
    }

    fn notify(&self, handle: ConnectionHandle, data: &[u8]) -> Result<(), RadioError> {
        self.notifications.lock().unwrap().push((handle, data.to_vec()));
        Ok(())
    }

    fn disconnect(&self, handle: ConnectionHandle) -> Result<(), RadioError> {
        self.disconnects.lock().unwrap().push(handle);
        Ok(())
    }
}

/// Indicator that keeps every command; `None` entries are `off()`
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    history: Mutex<Vec<Option<Rgb>>>,
}

impl RecordingIndicator {
    pub fn history(&self) -> Vec<Option<Rgb>> {
        self.history.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Option<Rgb>> {
        self.history.lock().unwrap().last().copied()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set_color(&self, _index: u32, red: u8, green: u8, blue: u8) {
        self.history
            .lock()
            .unwrap()
            .push(Some(Rgb::new(red, green, blue)));
    }

    fn off(&self) {
        self.history.lock().unwrap().push(None);
    }
}

/// Audio input replaying scripted reads, then a steady tone
pub struct ScriptedInput {
    script: VecDeque<Result<Vec<i16>, AudioError>>,
}

impl ScriptedInput {
    pub fn new(script: impl IntoIterator<Item = Result<Vec<i16>, AudioError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Input that never fails
    pub fn steady() -> Self {
        Self::new([])
    }
}

impl AudioInput for ScriptedInput {
    fn read(&mut self, dest: &mut [i16]) -> Result<usize, AudioError> {
        match self.script.pop_front() {
            Some(Ok(samples)) => {
                let n = samples.len().min(dest.len());
                dest[..n].copy_from_slice(&samples[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => {
                dest.fill(1000);
                Ok(dest.len())
            }
        }
    }
}

/// Audio input whose every read blocks the calling thread for `delay`
pub struct SlowInput {
    delay: Duration,
    reads: Arc<AtomicUsize>,
}

impl SlowInput {
    /// Returns the input and a counter of reads started
    pub fn new(delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let input = Self {
            delay,
            reads: Arc::clone(&reads),
        };
        (input, reads)
    }
}

impl AudioInput for SlowInput {
    fn read(&mut self, dest: &mut [i16]) -> Result<usize, AudioError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        dest.fill(1000);
        Ok(dest.len())
    }
}

/// Feature log held in memory
#[derive(Debug, Default)]
pub struct MemoryFeatureLog {
    entries: Mutex<Vec<(u32, u16, i8)>>,
}

impl MemoryFeatureLog {
    pub fn entries(&self) -> Vec<(u32, u16, i8)> {
        self.entries.lock().unwrap().clone()
    }
}

impl FeatureLog for MemoryFeatureLog {
    fn log_feature(
        &self,
        timestamp_ms: u32,
        sequence: u16,
        payload: i8,
    ) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap()
            .push((timestamp_ms, sequence, payload));
        Ok(())
    }
}
