//! Scripted backend and hosted renderer for driving the frame loop without a GPU.
//!
//! The fake GPU retires submissions in FIFO order, and only when the CPU
//! waits on a slot, so the number of submissions in flight is exactly what
//! the synchronizer lets through.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use ash::vk;
use vulkanisch_core::{Error, Result};
use vulkanisch_renderer::{
    Acquire, ChainDesc, ClearPolicy, Destination, FrameConfig, FrameContext, FrameOrchestrator,
    GpuBackend, HostedRenderer, PassAttachments, PassContext, PassDesc, PassTarget, PassTargets,
    PipelineId, Present, RenderGraph, RenderGraphBuilder, ResizeSignal, SurfaceCapabilities,
    SurfaceInfo, TargetDesc, TargetSize,
};

pub const WINDOW: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

pub fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

/// Everything the backend and renderer did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CreateChain { extent: vk::Extent2D, images: u32 },
    DestroyChain,
    CreateTarget { name: String, extent: vk::Extent2D },
    DestroyTarget { name: String },
    CreateSlot(usize),
    DestroySlot(usize),
    WaitSlot(usize),
    Acquire { slot: usize, image: u32 },
    StaleAcquire,
    BindInput(String),
    BeginPass { destination: String, depth: Option<String>, clear: ClearPolicy },
    /// A hosted draw, with the inputs bound for its pass.
    Record { frame: u64, pass: String, inputs: Vec<String> },
    EndPass,
    Submit { slot: usize, passes: usize },
    Present { slot: usize, image: u32 },
    StalePresent,
    WaitIdle,
    SurfaceReady(vk::Extent2D),
    SurfaceTeardown,
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(log: &Log, pred: impl Fn(&Event) -> bool) -> usize {
    log.borrow().iter().filter(|e| pred(e)).count()
}

pub struct MockSlot {
    id: usize,
}

pub struct MockChain {
    extent: vk::Extent2D,
    image_count: u32,
    next: Cell<u32>,
}

pub struct MockImage {
    index: u32,
}

#[derive(Debug)]
pub struct MockTarget {
    pub name: String,
    pub extent: vk::Extent2D,
}

pub struct MockRecorder {
    slot: usize,
    passes: usize,
    in_pass: bool,
    // Inputs bound since the last pass ended.
    bound: Vec<String>,
}

#[derive(Default)]
struct FakeGpu {
    signaled: HashMap<usize, bool>,
    queue: VecDeque<usize>,
    hung: bool,
    max_in_flight: usize,
}

pub struct MockBackend {
    log: Log,
    gpu: RefCell<FakeGpu>,
    /// Extent the surface reports; `None` leaves it to the window size.
    surface_extent: Cell<Option<vk::Extent2D>>,
    stale_acquires: Cell<usize>,
    stale_presents: Cell<usize>,
    next_slot: Cell<usize>,
}

impl MockBackend {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            gpu: RefCell::new(FakeGpu::default()),
            surface_extent: Cell::new(None),
            stale_acquires: Cell::new(0),
            stale_presents: Cell::new(0),
            next_slot: Cell::new(0),
        }
    }

    fn push(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    pub fn set_surface_extent(&self, extent: Option<vk::Extent2D>) {
        self.surface_extent.set(extent);
    }

    pub fn fail_next_acquires(&self, n: usize) {
        self.stale_acquires.set(n);
    }

    pub fn fail_next_presents(&self, n: usize) {
        self.stale_presents.set(n);
    }

    /// Stop retiring work; every later wait on a busy slot times out.
    pub fn hang(&self) {
        self.gpu.borrow_mut().hung = true;
    }

    pub fn max_in_flight(&self) -> usize {
        self.gpu.borrow().max_in_flight
    }

    pub fn in_flight(&self) -> usize {
        self.gpu.borrow().queue.len()
    }
}

impl GpuBackend for MockBackend {
    type Slot = MockSlot;
    type Chain = MockChain;
    type ImageTarget = MockImage;
    type Target = MockTarget;
    type Recorder = MockRecorder;

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(SurfaceCapabilities {
            min_images: 2,
            max_images: Some(3),
            current_extent: self.surface_extent.get(),
            min_extent: extent(0, 0),
            max_extent: extent(4096, 4096),
            formats: vec![FrameConfig::default().preferred_format],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        })
    }

    fn create_image_chain(&self, desc: &ChainDesc) -> Result<MockChain> {
        self.push(Event::CreateChain {
            extent: desc.extent,
            images: desc.image_count,
        });
        Ok(MockChain {
            extent: desc.extent,
            image_count: desc.image_count,
            next: Cell::new(0),
        })
    }

    fn chain_image_count(&self, chain: &MockChain) -> u32 {
        chain.image_count
    }

    fn create_image_target(&self, chain: &MockChain, index: u32) -> Result<MockImage> {
        assert!(index < chain.image_count);
        Ok(MockImage { index })
    }

    fn destroy_image_target(&self, _target: MockImage) {}

    fn destroy_image_chain(&self, _chain: MockChain) {
        self.push(Event::DestroyChain);
    }

    fn acquire_next_image(
        &self,
        chain: &MockChain,
        slot: &MockSlot,
        _timeout: Duration,
    ) -> Result<Acquire> {
        let stale = self.stale_acquires.get();
        if stale > 0 {
            self.stale_acquires.set(stale - 1);
            self.push(Event::StaleAcquire);
            return Ok(Acquire::Stale);
        }
        let index = chain.next.get();
        chain.next.set((index + 1) % chain.image_count);
        self.push(Event::Acquire {
            slot: slot.id,
            image: index,
        });
        Ok(Acquire::Acquired {
            index,
            suboptimal: false,
        })
    }

    fn present_image(&self, _chain: &MockChain, slot: &MockSlot, index: u32) -> Result<Present> {
        let stale = self.stale_presents.get();
        if stale > 0 {
            self.stale_presents.set(stale - 1);
            self.push(Event::StalePresent);
            return Ok(Present::Stale);
        }
        self.push(Event::Present {
            slot: slot.id,
            image: index,
        });
        Ok(Present::Presented)
    }

    fn create_frame_slot(&self) -> Result<MockSlot> {
        let id = self.next_slot.get();
        self.next_slot.set(id + 1);
        self.gpu.borrow_mut().signaled.insert(id, true);
        self.push(Event::CreateSlot(id));
        Ok(MockSlot { id })
    }

    fn destroy_frame_slot(&self, slot: MockSlot) {
        let mut gpu = self.gpu.borrow_mut();
        assert!(
            gpu.hung || !gpu.queue.contains(&slot.id),
            "slot {} destroyed while in flight",
            slot.id
        );
        gpu.signaled.remove(&slot.id);
        drop(gpu);
        self.push(Event::DestroySlot(slot.id));
    }

    fn wait_frame_slot(&self, slot: &MockSlot, _timeout: Duration) -> Result<bool> {
        self.push(Event::WaitSlot(slot.id));
        let mut gpu = self.gpu.borrow_mut();
        if gpu.signaled.get(&slot.id).copied().unwrap_or(false) {
            return Ok(true);
        }
        if gpu.hung {
            return Ok(false);
        }
        while let Some(done) = gpu.queue.pop_front() {
            gpu.signaled.insert(done, true);
            if done == slot.id {
                break;
            }
        }
        Ok(gpu.signaled.get(&slot.id).copied().unwrap_or(false))
    }

    fn reset_frame_slot(&self, slot: &MockSlot) -> Result<()> {
        self.gpu.borrow_mut().signaled.insert(slot.id, false);
        Ok(())
    }

    fn begin_recording(&self, slot: &MockSlot) -> Result<MockRecorder> {
        Ok(MockRecorder {
            slot: slot.id,
            passes: 0,
            in_pass: false,
            bound: Vec::new(),
        })
    }

    fn end_recording(&self, recorder: &mut MockRecorder, _image: &MockImage) -> Result<()> {
        assert!(!recorder.in_pass, "recording ended inside a pass");
        Ok(())
    }

    fn submit(&self, slot: &MockSlot, recorder: MockRecorder) -> Result<()> {
        assert_eq!(slot.id, recorder.slot);
        let mut gpu = self.gpu.borrow_mut();
        assert_eq!(
            gpu.signaled.get(&slot.id),
            Some(&false),
            "completion signal not reset before submit"
        );
        gpu.queue.push_back(slot.id);
        gpu.max_in_flight = gpu.max_in_flight.max(gpu.queue.len());
        drop(gpu);
        self.push(Event::Submit {
            slot: slot.id,
            passes: recorder.passes,
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.push(Event::WaitIdle);
        let mut gpu = self.gpu.borrow_mut();
        if gpu.hung {
            return Err(Error::DeviceLost("fake GPU hung".into()));
        }
        while let Some(done) = gpu.queue.pop_front() {
            gpu.signaled.insert(done, true);
        }
        Ok(())
    }

    fn create_render_target(&self, desc: &TargetDesc, extent: vk::Extent2D) -> Result<MockTarget> {
        self.push(Event::CreateTarget {
            name: desc.name.clone(),
            extent,
        });
        Ok(MockTarget {
            name: desc.name.clone(),
            extent,
        })
    }

    fn destroy_render_target(&self, target: MockTarget) {
        self.push(Event::DestroyTarget { name: target.name });
    }

    fn target_extent(&self, target: &MockTarget) -> vk::Extent2D {
        target.extent
    }

    fn bind_input(&self, recorder: &mut MockRecorder, target: &MockTarget) -> Result<()> {
        assert!(!recorder.in_pass, "input bound inside a pass");
        recorder.bound.push(target.name.clone());
        self.push(Event::BindInput(target.name.clone()));
        Ok(())
    }

    fn begin_pass(
        &self,
        recorder: &mut MockRecorder,
        attachments: &PassAttachments<'_, Self>,
        clear: &ClearPolicy,
    ) -> Result<()> {
        assert!(!recorder.in_pass, "nested pass");
        recorder.in_pass = true;
        let destination = match attachments.destination {
            PassTarget::Offscreen(target) => target.name.clone(),
            PassTarget::Presentable(image) => format!("presentable{}", image.index),
        };
        self.push(Event::BeginPass {
            destination,
            depth: attachments.depth.map(|d| d.name.clone()),
            clear: *clear,
        });
        Ok(())
    }

    fn end_pass(&self, recorder: &mut MockRecorder) -> Result<()> {
        assert!(recorder.in_pass, "end_pass without begin_pass");
        recorder.in_pass = false;
        recorder.passes += 1;
        recorder.bound.clear();
        self.push(Event::EndPass);
        Ok(())
    }
}

/// A resize to deliver while a given frame is being recorded.
pub struct ResizeInjection {
    pub frame: u64,
    pub extent: vk::Extent2D,
    pub signal: ResizeSignal,
}

/// Hosted renderer that logs every callback.
pub struct ScriptedRenderer {
    graph: RenderGraph,
    log: Log,
    pub resize: Rc<RefCell<Option<ResizeInjection>>>,
}

impl ScriptedRenderer {
    pub fn new(graph: RenderGraph, log: Log) -> Self {
        Self {
            graph,
            log,
            resize: Rc::new(RefCell::new(None)),
        }
    }
}

impl HostedRenderer<MockBackend> for ScriptedRenderer {
    fn render_graph(&self) -> &RenderGraph {
        &self.graph
    }

    fn on_surface_ready(
        &mut self,
        _backend: &MockBackend,
        surface: &SurfaceInfo,
        targets: &PassTargets<'_, MockBackend>,
    ) -> Result<()> {
        for id in self.graph.target_ids() {
            targets.get(id)?;
        }
        self.log.borrow_mut().push(Event::SurfaceReady(surface.extent));
        Ok(())
    }

    fn on_frame(
        &mut self,
        frame: &FrameContext,
        pass: &PassContext<'_>,
        recorder: &mut MockRecorder,
    ) -> Result<()> {
        assert!(recorder.in_pass);
        let declared: Vec<String> = pass
            .desc
            .inputs
            .iter()
            .filter_map(|&id| self.graph.target(id))
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(
            recorder.bound, declared,
            "pass '{}' recorded with inputs other than it declares",
            pass.name()
        );
        self.log.borrow_mut().push(Event::Record {
            frame: frame.frame_number,
            pass: pass.name().to_string(),
            inputs: recorder.bound.clone(),
        });
        let mut resize = self.resize.borrow_mut();
        let due = matches!(resize.as_ref(), Some(i) if i.frame == frame.frame_number);
        if pass.is_presentable()
            && due
            && let Some(injection) = resize.take()
        {
            injection.signal.notify(injection.extent);
        }
        Ok(())
    }

    fn on_surface_teardown(&mut self, _backend: &MockBackend) {
        self.log.borrow_mut().push(Event::SurfaceTeardown);
    }
}

/// One depth-tested color pass straight to the presentable image.
pub fn single_pass_graph() -> RenderGraph {
    let mut builder = RenderGraphBuilder::new();
    let depth = builder.add_target(TargetDesc::new(
        "depth",
        vk::Format::D32_SFLOAT,
        TargetSize::Surface,
    ));
    builder
        .add_pass(
            PassDesc::new("color", PipelineId(0), Destination::Presentable)
                .with_depth(depth)
                .with_clear(ClearPolicy::Color([0.0, 0.0, 0.0, 1.0])),
        )
        .unwrap();
    builder.build().unwrap()
}

pub struct Harness {
    pub log: Log,
    pub orchestrator: FrameOrchestrator<MockBackend>,
    pub resize: Rc<RefCell<Option<ResizeInjection>>>,
}

impl Harness {
    pub fn new(graph: RenderGraph, frames_in_flight: usize) -> Self {
        Self::with_window(graph, frames_in_flight, WINDOW)
    }

    pub fn with_window(graph: RenderGraph, frames_in_flight: usize, window: vk::Extent2D) -> Self {
        let log = new_log();
        let renderer = ScriptedRenderer::new(graph, log.clone());
        let resize = renderer.resize.clone();
        let orchestrator = FrameOrchestrator::new(
            MockBackend::new(log.clone()),
            Box::new(renderer),
            FrameConfig::default().with_frames_in_flight(frames_in_flight),
            window,
        )
        .unwrap();
        Self {
            log,
            orchestrator,
            resize,
        }
    }

    pub fn backend(&self) -> &MockBackend {
        self.orchestrator.backend()
    }

    /// Deliver `extent` as a resize while frame `frame` records its last pass.
    pub fn resize_during(&self, frame: u64, extent: vk::Extent2D) {
        *self.resize.borrow_mut() = Some(ResizeInjection {
            frame,
            extent,
            signal: self.orchestrator.resize_signal(),
        });
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }
}
