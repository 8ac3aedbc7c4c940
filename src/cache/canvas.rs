use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use kurbo::{Affine, Rect};
use smallvec::{smallvec, SmallVec};

use crate::cache::lock;
use crate::cache::scene::{SceneSource, ViewState};
use crate::cache::task::{CompletionFn, SceneTask, TaskEvent, TaskRunner, TileJob};
use crate::cache::tile::{FrameStatus, StatusMap, Tile, TileMap};
use crate::display::argb::{convert, ArgbImage, PixelLayout};
use crate::display::context::{Operator, PixelContext};
use crate::foundation::core::{FrameDesc, FrameId, Time};
use crate::foundation::error::CelError;
use crate::foundation::gamma::Gamma;
use crate::foundation::rect::{rects_merge, rects_subtract, RectInt, RectList};
use crate::surface::Surface;

/// Tunable cache behavior. Weights are eviction priorities: higher weight
/// means a preferred victim.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    /// Speculative frames stop being enqueued past this byte count.
    pub max_tiles_size_soft: u64,
    /// Eviction runs until the cache fits under this byte count.
    pub max_tiles_size_hard: u64,
    pub weight_future: f64,
    pub weight_past: f64,
    pub weight_zoom_in: f64,
    pub weight_zoom_out: f64,
    /// Tile rectangles align to this pixel grid.
    pub tile_grid_step: i32,
    /// Display gamma applied during pixel-format conversion.
    pub gamma: Gamma,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let soft = 512 * 1024 * 1024;
        Self {
            max_tiles_size_soft: soft,
            max_tiles_size_hard: soft + 128 * 1024 * 1024,
            weight_future: 1.0,
            weight_past: 2.0,
            weight_zoom_in: 1024.0,
            weight_zoom_out: 1024.0,
            tile_grid_step: 64,
            gamma: Gamma::identity(),
        }
    }
}

/// Lightweight snapshot of one cached tile, for inspection and tests.
#[derive(Clone, Copy, Debug)]
pub struct TileInfo {
    pub frame: FrameId,
    pub rect: RectInt,
    pub in_flight: bool,
    pub display_ready: bool,
}

enum UiEvent {
    TileFinished,
}

type FrameList = SmallVec<[FrameDesc; 8]>;

struct CacheState {
    scene: Box<dyn SceneSource>,
    view: ViewState,
    tiles: TileMap,
    tiles_size: u64,
    onion_frames: FrameList,
    visible_frames: BTreeSet<FrameId>,
    current_frame: FrameId,
    frame_duration: Time,
}

/// Trivial task standing in when the scene evaluator yields nothing; its
/// failure turns the tile into a visible diagnostic.
struct NullTask;

impl SceneTask for NullTask {
    fn clone_task(&self) -> Box<dyn SceneTask> {
        Box::new(NullTask)
    }

    fn run(&self, _target: &mut Surface, _transform: Affine, _source_rect: Rect) -> bool {
        false
    }
}

/// Memory-bounded cache of rendered viewport tiles with onion-skin
/// compositing and a prioritized render scheduler.
///
/// One mutex guards the whole cache state. The mutex is never held across
/// task-runner dispatch or pixel-format conversion; the compositor holds
/// it for the duration of painting so tiles cannot be evicted mid-paint.
pub struct CanvasCache {
    config: CacheConfig,
    layout: PixelLayout,
    runner: Arc<dyn TaskRunner>,
    state: Mutex<CacheState>,
    ui_tx: mpsc::Sender<UiEvent>,
    ui_rx: Mutex<mpsc::Receiver<UiEvent>>,
    draw_queued: AtomicBool,
}

impl CanvasCache {
    /// Build a cache over a scene and a task runner.
    pub fn new(
        scene: Box<dyn SceneSource>,
        runner: Arc<dyn TaskRunner>,
        config: CacheConfig,
    ) -> Arc<Self> {
        let (ui_tx, ui_rx) = mpsc::channel();
        Arc::new(Self {
            config,
            layout: PixelLayout::host(),
            runner,
            state: Mutex::new(CacheState {
                scene,
                view: ViewState::default(),
                tiles: TileMap::new(),
                tiles_size: 0,
                onion_frames: SmallVec::new(),
                visible_frames: BTreeSet::new(),
                current_frame: FrameId::new(Time::ZERO, 0, 0),
                frame_duration: Time::ZERO,
            }),
            ui_tx,
            ui_rx: Mutex::new(ui_rx),
            draw_queued: AtomicBool::new(false),
        })
    }

    /// Push the host's current view; call before [`enqueue_render`](Self::enqueue_render).
    pub fn set_view(&self, view: ViewState) {
        lock(&self.state).view = view;
    }

    /// Exact byte size of all cached tiles.
    pub fn tiles_size(&self) -> u64 {
        lock(&self.state).tiles_size
    }

    /// Duration of one timeline frame; zero when the frame rate is unset.
    pub fn frame_duration(&self) -> Time {
        lock(&self.state).frame_duration
    }

    /// Current onion-skin draw list (current frame last).
    pub fn onion_frames(&self) -> Vec<FrameDesc> {
        lock(&self.state).onion_frames.to_vec()
    }

    /// Snapshot of every cached tile.
    pub fn tiles_snapshot(&self) -> Vec<TileInfo> {
        let st = lock(&self.state);
        st.tiles
            .iter()
            .flat_map(|(frame, list)| {
                list.iter().map(|t| TileInfo {
                    frame: *frame,
                    rect: t.rect,
                    in_flight: t.in_flight(),
                    display_ready: t.display_ready(),
                })
            })
            .collect()
    }

    fn build_onion_frames(st: &mut CacheState) {
        let view = st.view;
        let fps = st.scene.frame_rate();
        let (t0, t1) = st.scene.time_bounds();

        st.current_frame = FrameId::new(view.time, view.width, view.height);
        st.frame_duration = if fps.num > 0 {
            fps.frame_duration()
        } else {
            Time::ZERO
        };

        st.onion_frames.clear();
        if view.onion_skin && !st.frame_duration.is_zero() && (view.past > 0 || view.future > 0) {
            let base_alpha = 1.0f32;
            let current_alpha = 0.5f32;
            for i in (1..=view.past).rev() {
                let time = view.time - st.frame_duration.scaled(i64::from(i));
                let alpha = base_alpha + (view.past - i + 1) as f32 / (view.past + 1) as f32;
                if time >= t0 && time <= t1 {
                    st.onion_frames
                        .push(FrameDesc::new(st.current_frame.at_time(time), alpha));
                }
            }
            for i in (1..=view.future).rev() {
                let time = view.time + st.frame_duration.scaled(i64::from(i));
                let alpha = base_alpha + (view.future - i + 1) as f32 / (view.future + 1) as f32;
                if time >= t0 && time <= t1 {
                    st.onion_frames
                        .push(FrameDesc::new(st.current_frame.at_time(time), alpha));
                }
            }
            st.onion_frames.push(FrameDesc::new(
                st.current_frame,
                base_alpha + 1.0 + current_alpha,
            ));

            let sum: f32 = st.onion_frames.iter().map(|f| f.alpha).sum();
            if sum > 1.0 {
                let k = 1.0 / sum;
                for f in st.onion_frames.iter_mut() {
                    f.alpha *= k;
                }
            }
        } else {
            st.onion_frames.push(FrameDesc::new(st.current_frame, 1.0));
        }

        st.visible_frames = st.onion_frames.iter().map(|f| f.id).collect();
    }

    /// Diff one frame against its cached tiles and create jobs for the
    /// missing regions. Returns whether anything was enqueued.
    fn enqueue_render_frame(
        self: &Arc<Self>,
        st: &mut CacheState,
        id: FrameId,
        jobs: &mut Vec<TileJob>,
    ) -> bool {
        let step = self.config.tile_grid_step;
        let window_rect = st.view.window_rect;
        if !window_rect.is_valid() || id.width == 0 || id.height == 0 {
            return false;
        }
        let full_rect = RectInt::from_wh(0, 0, id.width as i32, id.height as i32);

        // find regions not yet covered
        let mut rects: RectList = smallvec![window_rect];
        if let Some(list) = st.tiles.get(&id) {
            for tile in list {
                rects_subtract(&mut rects, tile.rect);
            }
        }
        rects_merge(&mut rects);
        if rects.is_empty() {
            return false;
        }

        // flip transform when document corners are swapped on an axis
        let (mut p0, mut p1) = st.scene.document_corners();
        let mut sx = 1.0;
        let mut sy = 1.0;
        let mut tx = 0.0;
        let mut ty = 0.0;
        if p0.x > p1.x {
            sx = -1.0;
            tx = p0.x + p1.x;
            std::mem::swap(&mut p0.x, &mut p1.x);
        }
        if p0.y > p1.y {
            sy = -1.0;
            ty = p0.y + p1.y;
            std::mem::swap(&mut p0.y, &mut p1.y);
        }
        let matrix = Affine::new([sx, 0.0, 0.0, sy, tx, ty]);

        let task = st.scene.build_task(id.time);
        if task.is_none() {
            tracing::debug!(time = ?id.time, "scene evaluator produced no task");
        }

        let w = f64::from(id.width);
        let h = f64::from(id.height);
        let mut enqueued = false;

        for rect in rects {
            let rect = rect.snapped_out(step).intersect(full_rect);
            if !rect.is_valid() {
                continue;
            }

            // user-space region backing this tile
            let source_rect = Rect::new(
                p0.x + (p1.x - p0.x) * f64::from(rect.minx) / w,
                p0.y + (p1.y - p0.y) * f64::from(rect.miny) / h,
                p0.x + (p1.x - p0.x) * f64::from(rect.maxx) / w,
                p0.y + (p1.y - p0.y) * f64::from(rect.maxy) / h,
            );

            let tile = Arc::new(Tile::new(id, rect));
            *lock(&tile.surface) = Some(Surface::new(rect.width() as u32, rect.height() as u32));
            let event = TaskEvent::new();
            *lock(&tile.event) = Some(event.clone());

            st.tiles.entry(id).or_default().push(tile.clone());
            st.tiles_size += rect.image_size();

            let weak = Arc::downgrade(self);
            let cb_tile = tile.clone();
            let on_finished: CompletionFn = Box::new(move |success| {
                if let Some(cache) = weak.upgrade() {
                    cache.on_tile_finished(success, &cb_tile);
                }
            });

            let job_task: Box<dyn SceneTask> = match task.as_ref() {
                Some(t) => t.clone_task(),
                None => Box::new(NullTask),
            };
            jobs.push(TileJob {
                task: job_task,
                transform: matrix,
                source_rect,
                tile,
                event,
                on_finished,
            });
            enqueued = true;
        }
        enqueued
    }

    fn erase_tile_fields(tiles_size: &mut u64, tile: &Tile, events: &mut Vec<Arc<TaskEvent>>) {
        if let Some(ev) = lock(&tile.event).take() {
            events.push(ev);
        }
        *lock(&tile.surface) = None;
        *lock(&tile.display) = None;
        *tiles_size -= tile.rect.image_size();
    }

    /// Drop whole non-visible frames, heaviest weight first, until the
    /// cache fits under the hard cap.
    fn remove_extra_tiles(&self, st: &mut CacheState, events: &mut Vec<Arc<TaskEvent>>) {
        if st.tiles_size <= self.config.max_tiles_size_hard {
            return;
        }

        let current = st.current_frame;
        let current_zoom = (f64::from(current.width) * f64::from(current.height)).sqrt();

        let mut weighted: Vec<(f64, FrameId)> = Vec::new();
        for id in st.tiles.keys() {
            if st.visible_frames.contains(id) {
                continue;
            }
            let mut weight = 0.0;
            if !st.frame_duration.is_zero() {
                let df = (id.time - current.time).div_f64(st.frame_duration);
                weight += df * if df > 0.0 {
                    self.config.weight_future
                } else {
                    self.config.weight_past
                };
            }
            if current_zoom > 0.0 {
                let zoom = (f64::from(id.width) * f64::from(id.height)).sqrt();
                let zs = (zoom / current_zoom).ln();
                weight += zs * if zs > 0.0 {
                    self.config.weight_zoom_in
                } else {
                    self.config.weight_zoom_out
                };
            }
            weighted.push((weight, *id));
        }
        weighted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let CacheState {
            tiles, tiles_size, ..
        } = st;
        for (_, id) in weighted {
            if *tiles_size <= self.config.max_tiles_size_hard {
                break;
            }
            if let Some(list) = tiles.get_mut(&id) {
                while *tiles_size > self.config.max_tiles_size_hard && !list.is_empty() {
                    let tile = list.remove(0);
                    Self::erase_tile_fields(tiles_size, &tile, events);
                }
            }
        }
        tiles.retain(|_, list| !list.is_empty());
    }

    /// Rebuild the onion list, diff every visible frame, evict, and
    /// speculatively prefetch neighbors within the soft cap. Idempotent;
    /// call whenever the view may require new tiles.
    #[tracing::instrument(skip_all)]
    pub fn enqueue_render(self: &Arc<Self>) {
        let mut jobs = Vec::new();
        let mut cancel_events = Vec::new();

        {
            let mut st = lock(&self.state);
            Self::build_onion_frames(&mut st);

            if st.view.window_rect.is_valid() {
                let mut enqueued = 0usize;

                let visible: Vec<FrameId> = st.onion_frames.iter().map(|f| f.id).collect();
                for id in visible {
                    if self.enqueue_render_frame(&mut st, id, &mut jobs) {
                        enqueued += 1;
                    }
                }

                self.remove_extra_tiles(&mut st, &mut cancel_events);

                for list in st.tiles.values() {
                    for tile in list {
                        if tile.in_flight() {
                            enqueued += 1;
                        }
                    }
                }

                // prefetch neighbors while nothing is pending, one frame at
                // a time, in the cheaper direction
                if st.tiles_size <= self.config.max_tiles_size_hard {
                    let frame_size = st.view.window_rect.image_size();
                    let (t0, t1) = st.scene.time_bounds();
                    let current = st.current_frame;
                    let step = st.frame_duration;
                    let mut future = 0i64;
                    let mut past = 0i64;
                    while !step.is_zero()
                        && st.tiles_size + frame_size < self.config.max_tiles_size_soft
                        && enqueued < 1
                    {
                        let future_time = current.time + step.scaled(future);
                        let future_exists = future_time >= t0 && future_time <= t1;
                        let past_time = current.time - step.scaled(past);
                        let past_exists = past_time >= t0 && past_time <= t1;
                        if !future_exists && !past_exists {
                            break;
                        }

                        if !past_exists
                            || (self.config.weight_future * future as f64)
                                < (self.config.weight_past * past as f64)
                        {
                            if future_exists
                                && self.enqueue_render_frame(
                                    &mut st,
                                    current.at_time(future_time),
                                    &mut jobs,
                                )
                            {
                                enqueued += 1;
                            }
                            future += 1;
                        } else {
                            if past_exists
                                && self.enqueue_render_frame(
                                    &mut st,
                                    current.at_time(past_time),
                                    &mut jobs,
                                )
                            {
                                enqueued += 1;
                            }
                            past += 1;
                        }
                    }
                } else {
                    let err = CelError::allocation_overflow(format!(
                        "visible frames hold {} bytes over the hard cap",
                        st.tiles_size
                    ));
                    tracing::debug!(%err, "skipping speculative prefetch");
                }
            }
        }

        // dispatch outside the cache mutex
        if !cancel_events.is_empty() {
            self.runner.cancel(&cancel_events);
        }
        for job in jobs {
            self.runner.enqueue(job);
        }
    }

    /// Block until every tile of every onion frame has completed.
    pub fn wait_render(&self) {
        let events: Vec<Arc<TaskEvent>> = {
            let st = lock(&self.state);
            st.onion_frames
                .iter()
                .filter_map(|f| st.tiles.get(&f.id))
                .flatten()
                .filter_map(|tile| lock(&tile.event).clone())
                .collect()
        };
        for event in events {
            event.wait();
        }
    }

    /// Cancel outstanding work and drop every tile.
    pub fn clear_render(&self) {
        let mut cancel_events = Vec::new();
        {
            let mut st = lock(&self.state);
            let CacheState {
                tiles, tiles_size, ..
            } = &mut *st;
            for list in tiles.values_mut() {
                while let Some(tile) = list.pop() {
                    Self::erase_tile_fields(tiles_size, &tile, &mut cancel_events);
                }
            }
            tiles.clear();
        }
        if !cancel_events.is_empty() {
            self.runner.cancel(&cancel_events);
        }
    }

    fn calc_frame_status(st: &CacheState, id: FrameId, window_rect: RectInt) -> FrameStatus {
        let Some(list) = st.tiles.get(&id) else {
            return FrameStatus::None;
        };
        if list.is_empty() {
            return FrameStatus::None;
        }

        let mut rects: RectList = smallvec![window_rect];
        for tile in list {
            if tile.in_flight() {
                return FrameStatus::InProcess;
            }
            if tile.display_ready() {
                rects_subtract(&mut rects, tile.rect);
            }
        }
        rects_merge(&mut rects);

        if rects.len() == 1 && rects[0] == window_rect {
            return FrameStatus::None;
        }
        if rects.is_empty() {
            return FrameStatus::Done;
        }
        FrameStatus::PartiallyDone
    }

    /// Snapshot per-frame status over the whole timeline for the status
    /// strip: the current frame plus every in-bounds `t0 + k·Δ`.
    pub fn get_render_status(&self, out_map: &mut StatusMap) {
        let st = lock(&self.state);
        let window_rect = st.view.window_rect;

        out_map.clear();
        out_map.insert(
            st.current_frame,
            Self::calc_frame_status(&st, st.current_frame, window_rect),
        );

        if !st.frame_duration.is_zero() {
            let (t0, t1) = st.scene.time_bounds();
            let mut frame = (t0 - st.current_frame.time).div_floor(st.frame_duration);
            loop {
                let time = st.current_frame.time + st.frame_duration.scaled(frame);
                if time > t1 {
                    break;
                }
                if frame != 0 && time >= t0 {
                    let id = st.current_frame.at_time(time);
                    out_map.insert(id, Self::calc_frame_status(&st, id, window_rect));
                }
                frame += 1;
            }
        }
    }

    /// Immediate completion handler; may run on any worker thread.
    ///
    /// Converts the raw surface to the display format outside the cache
    /// mutex, stores it, clears the event, and posts the deferred UI
    /// notification. A delivery for an erased tile is dropped silently.
    pub fn on_tile_finished(&self, success: bool, tile: &Arc<Tile>) {
        let surface = {
            let _st = lock(&self.state);
            if tile.is_removed() {
                return;
            }
            lock(&tile.surface).take()
        };

        let converted = convert(
            if success { surface.as_ref() } else { None },
            tile.rect.width(),
            tile.rect.height(),
            self.layout,
            &self.config.gamma,
        );

        {
            let _st = lock(&self.state);
            let mut event = lock(&tile.event);
            if event.is_none() {
                // erased while converting; do not resurrect
                return;
            }
            *lock(&tile.display) = Some(converted);
            *event = None;
        }

        let _ = self.ui_tx.send(UiEvent::TileFinished);
    }

    /// Deferred (main-thread) completion handler: drain posted events,
    /// re-enter the scheduler once everything is finished, and report
    /// whether the host should redraw.
    pub fn process_ui_events(self: &Arc<Self>) -> bool {
        let mut needs_redraw = false;
        loop {
            let received = lock(&self.ui_rx).try_recv();
            match received {
                Ok(UiEvent::TileFinished) => {
                    let all_finished = {
                        let st = lock(&self.state);
                        st.tiles
                            .values()
                            .flatten()
                            .all(|tile| !tile.in_flight())
                    };
                    if all_finished {
                        self.enqueue_render();
                    }
                    if !self.draw_queued.swap(true, Ordering::SeqCst) {
                        needs_redraw = true;
                    }
                }
                Err(_) => break,
            }
        }
        needs_redraw
    }

    /// Composite the cached tiles for the current onion stack into the
    /// host context, plus the frame border and the timeline status strip.
    pub fn render_vfunc(self: &Arc<Self>, context: &mut PixelContext<'_>, expose_rect: RectInt) {
        self.draw_queued.store(false, Ordering::SeqCst);

        let (offset, window_rect) = {
            let st = lock(&self.state);
            (st.view.window_offset, st.view.window_rect)
        };
        let expose = expose_rect
            .translated(-offset.0, -offset.1)
            .intersect(window_rect);
        if !expose.is_valid() {
            return;
        }

        // refresh tiles for anything missing before painting
        self.enqueue_render();

        let mut status_map = StatusMap::new();
        self.get_render_status(&mut status_map);

        let mut st = lock(&self.state);
        if st.onion_frames.is_empty() {
            return;
        }

        context.save();
        context.translate(offset.0, offset.1);

        let single_opaque =
            st.onion_frames.len() == 1 && (st.onion_frames[0].alpha - 1.0).abs() <= f32::EPSILON;

        if !single_opaque {
            self.renormalize_current_alpha(&mut st);

            // merge the stack additively offscreen, then paint it once
            let mut onion = ArgbImage::new(
                expose.width() as u32,
                expose.height() as u32,
                self.layout,
            );
            {
                let mut oc = PixelContext::new(&mut onion);
                oc.translate(-expose.minx, -expose.miny);
                oc.set_operator(Operator::Add);
                for desc in st.onion_frames.iter() {
                    let Some(list) = st.tiles.get(&desc.id) else {
                        continue;
                    };
                    for tile in list {
                        let display = lock(&tile.display);
                        if let Some(img) = display.as_ref() {
                            oc.save();
                            oc.clip_rect(tile.rect);
                            oc.paint_image_with_alpha(img, tile.rect.minx, tile.rect.miny, desc.alpha);
                            oc.restore();
                        }
                    }
                }
            }
            context.save();
            context.set_operator(Operator::SourceOver);
            context.paint_image(&onion, expose.minx, expose.miny);
            context.restore();
        } else {
            let desc = st.onion_frames[0];
            if let Some(list) = st.tiles.get(&desc.id) {
                for tile in list {
                    let display = lock(&tile.display);
                    if let Some(img) = display.as_ref() {
                        context.save();
                        context.clip_rect(tile.rect);
                        context.paint_image(img, tile.rect.minx, tile.rect.miny);
                        context.restore();
                    }
                }
            }
        }

        // border around the rendered frame
        let frame_w = st.current_frame.width as i32;
        let frame_h = st.current_frame.height as i32;
        context.save();
        context.set_operator(Operator::SourceOver);
        context.set_source_rgba(0.0, 0.0, 0.0, 1.0);
        context.clear_dash();
        context.stroke_rect(RectInt::new(0, 0, frame_w, frame_h));
        context.restore();

        // status strip: one cell per timeline frame below the canvas
        if !status_map.is_empty() {
            let scale = f64::from(frame_w) / status_map.len() as f64;
            let cell_h = scale.ceil().max(1.0) as i32;
            context.save();
            for (k, status) in status_map.values().enumerate() {
                let (r, g, b) = match status {
                    FrameStatus::PartiallyDone => (0.5, 0.5, 0.5),
                    FrameStatus::InProcess => (1.0, 1.0, 0.0),
                    FrameStatus::Done => (0.0, 0.0, 0.0),
                    FrameStatus::None => (1.0, 1.0, 1.0),
                };
                context.set_source_rgba(r, g, b, 1.0);
                let x0 = (k as f64 * scale).floor() as i32;
                let x1 = ((k + 1) as f64 * scale).floor() as i32;
                context.fill_rect(RectInt::new(x0, frame_h, x1.max(x0 + 1), frame_h + cell_h));
            }
            context.restore();
        }

        context.restore();
    }

    /// Iteratively bump the current frame's alpha until the additive onion
    /// stack saturates a 1-pixel probe, capped at 32 rounds.
    fn renormalize_current_alpha(&self, st: &mut CacheState) {
        let n = st.onion_frames.len();
        if n == 0 {
            return;
        }

        let mut probe_src = ArgbImage::new(1, 1, self.layout);
        {
            let mut pc = PixelContext::new(&mut probe_src);
            pc.set_source_rgba(1.0, 1.0, 1.0, 1.0);
            pc.fill_rect(RectInt::new(0, 0, 1, 1));
        }

        let mut base = ArgbImage::new(1, 1, self.layout);
        {
            let mut pc = PixelContext::new(&mut base);
            pc.set_operator(Operator::Add);
            for desc in &st.onion_frames[..n - 1] {
                pc.paint_image_with_alpha(&probe_src, 0, 0, desc.alpha);
            }
        }

        for _ in 0..32 {
            let mut dst = base.clone();
            let alpha = st.onion_frames[n - 1].alpha;
            {
                let mut pc = PixelContext::new(&mut dst);
                pc.set_operator(Operator::Add);
                pc.paint_image_with_alpha(&probe_src, 0, 0, alpha);
            }
            let measured = dst.alpha(0, 0);
            if measured >= 255 {
                break;
            }
            st.onion_frames[n - 1].alpha += f32::from(255 - measured) / 128.0;
        }
    }
}

impl Drop for CanvasCache {
    fn drop(&mut self) {
        self.clear_render();
    }
}
