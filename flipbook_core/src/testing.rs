// Copyright 2026 the Flipbook Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded backend doubles that log every call.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::time::Duration;

use crate::backend::{
    AcquireStatus, DisplayPipeline, DrawCall, FenceWait, GpuDevice, InitData, KeyedMutex,
    MappedImage, PixelBox, ScanoutTask, SharedHandle, TextureDesc, TimelineFence,
};
use crate::compositor::Vertex;
use crate::error::{DeviceError, Operation, Status};

#[derive(Debug)]
struct FenceState {
    value: Cell<u64>,
    tick_on_wait: Cell<u64>,
    handle: u64,
}

/// A fence whose value only moves when the test says so.
#[derive(Clone, Debug)]
pub(crate) struct FakeFence(Rc<FenceState>);

impl FakeFence {
    pub(crate) fn new(value: u64) -> Self {
        Self::with_handle(value, 0)
    }

    fn with_handle(value: u64, handle: u64) -> Self {
        Self(Rc::new(FenceState {
            value: Cell::new(value),
            tick_on_wait: Cell::new(0),
            handle,
        }))
    }

    /// Moves the fence forward by `n`.
    pub(crate) fn advance(&self, n: u64) {
        self.0.value.set(self.0.value.get() + n);
    }

    /// Makes every blocking wait advance the fence by `n` first, as if that
    /// many vertical blanks happened during the wait.
    pub(crate) fn tick_on_wait(&self, n: u64) {
        self.0.tick_on_wait.set(n);
    }

    fn set(&self, value: u64) {
        self.0.value.set(value);
    }
}

impl TimelineFence for FakeFence {
    fn completed_value(&self) -> u64 {
        self.0.value.get()
    }

    fn wait(&self, value: u64, _timeout: Duration) -> Result<FenceWait, DeviceError> {
        if self.completed_value() < value {
            self.advance(self.0.tick_on_wait.get());
        }
        let completed = self.completed_value();
        if completed >= value {
            Ok(FenceWait::Reached(completed))
        } else {
            Ok(FenceWait::TimedOut(completed))
        }
    }

    fn share(&self) -> Result<SharedHandle, DeviceError> {
        Ok(SharedHandle(self.0.handle))
    }
}

#[derive(Debug, Default)]
struct Shared {
    log: Vec<String>,
    faults: Vec<(Operation, Status)>,
    fences: Vec<FakeFence>,
    periodic: Option<FakeFence>,
    busy: bool,
    pending_signals: Vec<(FakeFence, u64)>,
}

/// Shared state behind the fake device, display pipeline and keyed mutex.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeBackend(Rc<RefCell<Shared>>);

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn device(&self) -> FakeDevice {
        FakeDevice(self.clone())
    }

    pub(crate) fn pipeline(&self) -> FakePipeline {
        FakePipeline(self.clone())
    }

    pub(crate) fn mutex(&self) -> FakeMutex {
        FakeMutex(self.clone())
    }

    /// Makes the next call of `op` fail with `status`.
    pub(crate) fn fail(&self, op: Operation, status: Status) {
        self.0.borrow_mut().faults.push((op, status));
    }

    /// Makes the keyed mutex time out until cleared.
    pub(crate) fn set_busy(&self, busy: bool) {
        self.0.borrow_mut().busy = busy;
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.0.borrow().log.clone()
    }

    pub(crate) fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub(crate) fn periodic_fence(&self) -> Option<FakeFence> {
        self.0.borrow().periodic.clone()
    }

    fn record(&self, entry: String) {
        self.0.borrow_mut().log.push(entry);
    }

    fn check(&self, op: Operation) -> Result<(), DeviceError> {
        let mut shared = self.0.borrow_mut();
        match shared.faults.iter().position(|(fault, _)| *fault == op) {
            Some(i) => {
                let (_, status) = shared.faults.remove(i);
                Err(DeviceError::new(op, status))
            }
            None => Ok(()),
        }
    }

    fn new_fence(&self, value: u64) -> FakeFence {
        let mut shared = self.0.borrow_mut();
        let handle = 0x100 + shared.fences.len() as u64;
        let fence = FakeFence::with_handle(value, handle);
        shared.fences.push(fence.clone());
        fence
    }

    fn find_fence(&self, handle: SharedHandle, op: Operation) -> Result<FakeFence, DeviceError> {
        self.0
            .borrow()
            .fences
            .iter()
            .find(|fence| fence.0.handle == handle.0)
            .cloned()
            .ok_or(DeviceError::new(op, Status::InvalidHandle))
    }
}

/// A texture identified by number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FakeTexture {
    pub(crate) id: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug)]
pub(crate) struct FakeDevice(FakeBackend);

impl FakeDevice {
    pub(crate) fn fence(&mut self, initial: u64) -> FakeFence {
        self.0.new_fence(initial)
    }
}

impl GpuDevice for FakeDevice {
    type Texture = FakeTexture;
    type View = u32;
    type Buffer = Vec<Vertex>;
    type Fence = FakeFence;

    fn texture_size(&self, texture: &FakeTexture) -> (u32, u32) {
        (texture.width, texture.height)
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        _init: InitData<'_>,
    ) -> Result<FakeTexture, DeviceError> {
        self.0.check(Operation::CreateTexture)?;
        self.0
            .record(format!("create-texture {}x{}", desc.width, desc.height));
        Ok(FakeTexture {
            id: 900,
            width: desc.width,
            height: desc.height,
        })
    }

    fn create_view(&mut self, texture: &FakeTexture) -> Result<u32, DeviceError> {
        self.0.check(Operation::CreateView)?;
        Ok(texture.id)
    }

    fn create_vertex_buffer(&mut self, vertices: &[Vertex]) -> Result<Vec<Vertex>, DeviceError> {
        self.0.check(Operation::CreateBuffer)?;
        Ok(vertices.to_vec())
    }

    fn read_region(
        &mut self,
        _texture: &FakeTexture,
        region: PixelBox,
    ) -> Result<MappedImage, DeviceError> {
        self.0.check(Operation::ReadRegion)?;
        self.0.record(format!(
            "read {},{} {}x{}",
            region.left,
            region.top,
            region.width(),
            region.height()
        ));
        Ok(MappedImage {
            pixels: vec![0xFF00_0000; (region.width() * region.height()) as usize],
            width: region.width(),
            height: region.height(),
            pitch: region.width(),
        })
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<(), DeviceError> {
        self.0.check(Operation::Draw)?;
        self.0.record(format!(
            "draw target={} source={} blend={:?}",
            call.target.id, call.source, call.blend
        ));
        Ok(())
    }

    fn create_fence(&mut self, initial: u64) -> Result<FakeFence, DeviceError> {
        self.0.check(Operation::CreateFence)?;
        Ok(self.0.new_fence(initial))
    }

    fn open_fence(&mut self, handle: SharedHandle) -> Result<FakeFence, DeviceError> {
        self.0.check(Operation::OpenFence)?;
        self.0.find_fence(handle, Operation::OpenFence)
    }

    fn signal(&mut self, fence: &FakeFence, value: u64) -> Result<(), DeviceError> {
        self.0.check(Operation::Signal)?;
        self.0.record(format!("signal {value}"));
        self.0
            .0
            .borrow_mut()
            .pending_signals
            .push((fence.clone(), value));
        Ok(())
    }

    fn flush(&mut self) {
        let pending = core::mem::take(&mut self.0.0.borrow_mut().pending_signals);
        for (fence, value) in pending {
            fence.set(value);
        }
        self.0.record(String::from("flush"));
    }
}

#[derive(Debug)]
pub(crate) struct FakePipeline(FakeBackend);

impl DisplayPipeline for FakePipeline {
    type Primary = u32;
    type Scanout = u32;
    type Fence = FakeFence;

    fn create_scanout(&mut self, primary: &u32) -> Result<u32, DeviceError> {
        self.0.record(format!("create-scanout {primary}"));
        self.0.check(Operation::CreateScanout)?;
        Ok(*primary)
    }

    fn import_fence(&mut self, handle: SharedHandle) -> Result<FakeFence, DeviceError> {
        self.0.check(Operation::ImportFence)?;
        self.0.record(format!("import-fence {:#x}", handle.0));
        self.0.find_fence(handle, Operation::ImportFence)
    }

    fn create_periodic_fence(&mut self, lead_time: Duration) -> Result<FakeFence, DeviceError> {
        self.0.check(Operation::CreatePeriodicFence)?;
        self.0.record(format!("periodic-fence {lead_time:?}"));
        let fence = self.0.new_fence(0);
        self.0.0.borrow_mut().periodic = Some(fence.clone());
        Ok(fence)
    }

    fn execute(&mut self, task: ScanoutTask<'_, Self>) -> Result<(), DeviceError> {
        self.0.check(Operation::ExecuteTask)?;
        let wait = task.wait().map_or(0, |(_, value)| value);
        self.0
            .record(format!("execute scanout={} wait={wait}", task.scanout()));
        Ok(())
    }

    fn backoff(&mut self, delay: Duration) {
        self.0.record(format!("backoff {delay:?}"));
    }
}

#[derive(Debug)]
pub(crate) struct FakeMutex(FakeBackend);

impl KeyedMutex for FakeMutex {
    fn acquire(&mut self, key: u64, _timeout: Duration) -> Result<AcquireStatus, DeviceError> {
        self.0.check(Operation::AcquireSync)?;
        self.0.record(format!("acquire {key}"));
        if self.0.0.borrow().busy {
            Ok(AcquireStatus::TimedOut)
        } else {
            Ok(AcquireStatus::Acquired)
        }
    }

    fn release(&mut self, key: u64) -> Result<(), DeviceError> {
        self.0.check(Operation::ReleaseSync)?;
        self.0.record(format!("release {key}"));
        Ok(())
    }

    fn shared_handle(&self) -> SharedHandle {
        SharedHandle(0xF00D)
    }
}
