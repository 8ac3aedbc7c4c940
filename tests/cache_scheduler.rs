use std::sync::{Arc, Mutex};

use celcanvas::{
    Affine, ArgbImage, CacheConfig, CanvasCache, Color, Fps, FrameStatus, PixelContext, PixelLayout,
    Point, Rect, RectInt, SceneSource, SceneTask, StatusMap, Surface, TaskEvent, TaskRunner,
    ThreadPoolRunner, TileJob, Time, ViewState,
};

struct SolidTask {
    color: Color,
}

impl SceneTask for SolidTask {
    fn clone_task(&self) -> Box<dyn SceneTask> {
        Box::new(SolidTask { color: self.color })
    }

    fn run(&self, target: &mut Surface, _transform: Affine, _source_rect: Rect) -> bool {
        target.fill(self.color);
        true
    }
}

struct SolidScene {
    fps: Fps,
    t0: Time,
    t1: Time,
    evaluates: bool,
}

impl SolidScene {
    fn new(fps: Fps, t0: Time, t1: Time) -> Self {
        Self {
            fps,
            t0,
            t1,
            evaluates: true,
        }
    }
}

impl SceneSource for SolidScene {
    fn frame_rate(&self) -> Fps {
        self.fps
    }

    fn time_bounds(&self) -> (Time, Time) {
        (self.t0, self.t1)
    }

    fn document_corners(&self) -> (Point, Point) {
        (Point::new(0.0, 0.0), Point::new(1.0, 1.0))
    }

    fn build_task(&mut self, _time: Time) -> Option<Box<dyn SceneTask>> {
        self.evaluates.then(|| {
            Box::new(SolidTask {
                color: Color::new(1.0, 0.0, 0.0, 1.0),
            }) as Box<dyn SceneTask>
        })
    }
}

/// Runner that parks jobs until the test decides to execute them.
#[derive(Default)]
struct ManualRunner {
    jobs: Mutex<Vec<TileJob>>,
}

impl ManualRunner {
    fn drain(&self) -> Vec<TileJob> {
        std::mem::take(&mut *self.jobs.lock().unwrap())
    }

    fn run_all(&self) {
        for job in self.drain() {
            run_job(job);
        }
    }

    fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

fn run_job(job: TileJob) {
    let TileJob {
        task,
        transform,
        source_rect,
        tile,
        event,
        on_finished,
    } = job;
    let success = {
        let mut surface = tile.surface.lock().unwrap();
        match surface.as_mut() {
            Some(s) => task.run(s, transform, source_rect),
            None => false,
        }
    };
    on_finished(success);
    event.signal(success);
}

impl TaskRunner for ManualRunner {
    fn enqueue(&self, job: TileJob) {
        self.jobs.lock().unwrap().push(job);
    }

    fn cancel(&self, events: &[Arc<TaskEvent>]) {
        for event in events {
            event.cancel();
        }
    }
}

fn view(time: Time, w: u32, h: u32) -> ViewState {
    ViewState {
        time,
        width: w,
        height: h,
        window_rect: RectInt::from_wh(0, 0, w as i32, h as i32),
        window_offset: (0, 0),
        onion_skin: false,
        past: 0,
        future: 0,
    }
}

fn assert_size_invariant(cache: &Arc<CanvasCache>) {
    let sum: u64 = cache
        .tiles_snapshot()
        .iter()
        .map(|t| t.rect.image_size())
        .sum();
    assert_eq!(cache.tiles_size(), sum, "tiles_size must track the tile sum");
}

#[test]
fn enqueue_then_wait_completes_every_visible_tile() {
    let scene = SolidScene::new(Fps::new(24, 1).unwrap(), Time::ZERO, Time::from_secs(1));
    let runner = Arc::new(ThreadPoolRunner::new(Some(2)).unwrap());
    let cache = CanvasCache::new(Box::new(scene), runner, CacheConfig::default());

    cache.set_view(view(Time::ZERO, 128, 96));
    cache.enqueue_render();
    cache.wait_render();

    let onion = cache.onion_frames();
    assert_eq!(onion.len(), 1);
    assert!((onion[0].alpha - 1.0).abs() < 1e-6);

    for info in cache.tiles_snapshot() {
        if info.frame == onion[0].id {
            assert!(!info.in_flight);
            assert!(info.display_ready);
        }
    }
    assert_size_invariant(&cache);

    let mut status = StatusMap::new();
    cache.get_render_status(&mut status);
    assert_eq!(status.get(&onion[0].id), Some(&FrameStatus::Done));
}

#[test]
fn speculative_prefetch_kicks_in_once_idle() {
    let scene = SolidScene::new(Fps::new(4, 1).unwrap(), Time::ZERO, Time::from_secs(2));
    let runner = Arc::new(ThreadPoolRunner::new(Some(2)).unwrap());
    let cache = CanvasCache::new(Box::new(scene), runner, CacheConfig::default());

    cache.set_view(view(Time::ZERO, 64, 64));
    cache.enqueue_render();
    cache.wait_render();

    // completions queue deferred notifications; draining them re-enters the
    // scheduler, which now prefetches neighbor frames one at a time
    for _ in 0..4 {
        cache.process_ui_events();
        cache.wait_render();
    }

    let frames: std::collections::BTreeSet<Time> = cache
        .tiles_snapshot()
        .iter()
        .map(|t| t.frame.time)
        .collect();
    assert!(
        frames.len() > 1,
        "prefetch should cache neighbors, got {frames:?}"
    );
    assert_size_invariant(&cache);
}

#[test]
fn onion_schedule_builds_expected_frames_and_alphas() {
    let scene = SolidScene::new(Fps::new(24, 1).unwrap(), Time::ZERO, Time::from_secs(2));
    let runner = Arc::new(ManualRunner::default());
    let cache = CanvasCache::new(Box::new(scene), runner, CacheConfig::default());

    cache.set_view(ViewState {
        onion_skin: true,
        past: 2,
        future: 1,
        ..view(Time::from_secs(1), 640, 480)
    });
    cache.enqueue_render();

    let onion = cache.onion_frames();
    let step = Time::new(1, 24);
    let expected_times = [
        Time::from_secs(1) - step.scaled(2),
        Time::from_secs(1) - step.scaled(1),
        Time::from_secs(1) + step.scaled(1),
        Time::from_secs(1),
    ];
    assert_eq!(onion.len(), 4);
    for (desc, t) in onion.iter().zip(expected_times) {
        assert_eq!(desc.id.time, t);
        assert_eq!((desc.id.width, desc.id.height), (640, 480));
    }

    // raw alphas 4/3, 5/3, 3/2, 5/2 sum to 7 and get normalized by it
    let raw = [4.0f32 / 3.0, 5.0 / 3.0, 3.0 / 2.0, 5.0 / 2.0];
    let sum: f32 = raw.iter().sum();
    for (desc, r) in onion.iter().zip(raw) {
        assert!((desc.alpha - r / sum).abs() < 1e-5, "alpha {}", desc.alpha);
    }
}

#[test]
fn onion_frames_outside_time_bounds_are_skipped() {
    let scene = SolidScene::new(Fps::new(24, 1).unwrap(), Time::ZERO, Time::from_secs(2));
    let runner = Arc::new(ManualRunner::default());
    let cache = CanvasCache::new(Box::new(scene), runner, CacheConfig::default());

    cache.set_view(ViewState {
        onion_skin: true,
        past: 3,
        future: 0,
        ..view(Time::new(1, 24), 64, 64)
    });
    cache.enqueue_render();

    // only one past step fits above t0; current frame comes last
    let onion = cache.onion_frames();
    assert_eq!(onion.len(), 2);
    assert_eq!(onion[0].id.time, Time::ZERO);
    assert_eq!(onion[1].id.time, Time::new(1, 24));
}

/// Populate four frames at 1 fps: the current 400x400 at 0s plus neighbors
/// at 1s, 2s and a 800x800 zoom variant of 0s.
fn populated_cache(hard_cap: u64, runner: Arc<ManualRunner>) -> Arc<CanvasCache> {
    let scene = SolidScene::new(Fps::new(1, 1).unwrap(), Time::ZERO, Time::from_secs(2));
    let config = CacheConfig {
        // soft == hard keeps speculative prefetch out of these tests
        max_tiles_size_soft: hard_cap,
        max_tiles_size_hard: hard_cap,
        ..CacheConfig::default()
    };
    let cache = CanvasCache::new(Box::new(scene), runner.clone(), config);

    cache.set_view(view(Time::ZERO, 800, 800));
    cache.enqueue_render();
    runner.run_all();
    cache.set_view(view(Time::from_secs(1), 400, 400));
    cache.enqueue_render();
    runner.run_all();
    cache.set_view(view(Time::from_secs(2), 400, 400));
    cache.enqueue_render();
    runner.run_all();
    cache.set_view(view(Time::ZERO, 400, 400));
    cache.enqueue_render();
    runner.run_all();
    cache
}

fn cached_frames(cache: &Arc<CanvasCache>) -> std::collections::BTreeSet<(Time, u32)> {
    cache
        .tiles_snapshot()
        .iter()
        .map(|t| (t.frame.time, t.frame.width))
        .collect()
}

#[test]
fn eviction_drops_zoom_variant_first() {
    // 4.48 MB cached, cap at 4.0 MB: only the zoomed frame (weight ~710)
    // must go; the temporal neighbors (weights 1 and 2) survive
    let runner = Arc::new(ManualRunner::default());
    let cache = populated_cache(4_000_000, runner);

    let frames = cached_frames(&cache);
    assert!(!frames.contains(&(Time::ZERO, 800)), "zoom variant evicted");
    assert!(frames.contains(&(Time::from_secs(1), 400)));
    assert!(frames.contains(&(Time::from_secs(2), 400)));
    assert!(frames.contains(&(Time::ZERO, 400)));
    assert_size_invariant(&cache);
}

#[test]
fn eviction_prefers_far_future_over_near_future() {
    // cap at 1.5 MB: the zoom variant goes while populating, and the final
    // pass at 0s drops the 2s frame (weight 2) before the 1s frame (1)
    let runner = Arc::new(ManualRunner::default());
    let cache = populated_cache(1_500_000, runner);

    let frames = cached_frames(&cache);
    assert!(!frames.contains(&(Time::ZERO, 800)));
    assert!(!frames.contains(&(Time::from_secs(2), 400)));
    assert!(frames.contains(&(Time::from_secs(1), 400)));
    assert!(frames.contains(&(Time::ZERO, 400)));
    assert!(cache.tiles_size() <= 1_500_000);
}

#[test]
fn eviction_never_drops_visible_frames() {
    // a zero cap evicts everything evictable, yet the visible frame stays
    let runner = Arc::new(ManualRunner::default());
    let cache = populated_cache(0, runner);

    let frames = cached_frames(&cache);
    assert_eq!(
        frames,
        [(Time::ZERO, 400u32)].into_iter().collect(),
        "only the visible frame survives"
    );
    assert_eq!(cache.tiles_size(), 4 * 400 * 400);
    assert_size_invariant(&cache);
}

#[test]
fn clear_render_empties_the_cache() {
    let runner = Arc::new(ManualRunner::default());
    let cache = populated_cache(u64::MAX, runner.clone());
    assert!(cache.tiles_size() > 0);

    // leave one render in flight so clearing also exercises cancellation
    cache.set_view(view(Time::from_secs(1), 800, 800));
    cache.enqueue_render();
    assert!(runner.pending() > 0);

    cache.clear_render();
    assert_eq!(cache.tiles_size(), 0);
    assert!(cache.tiles_snapshot().is_empty());

    // parked jobs for dropped tiles see cancelled events
    let jobs = runner.drain();
    assert!(!jobs.is_empty());
    for job in jobs {
        assert!(job.event.is_cancelled());
        run_job(job);
    }
    assert!(cache.tiles_snapshot().is_empty());
    assert_eq!(cache.tiles_size(), 0);
}

#[test]
fn stale_completion_for_evicted_tile_is_dropped() {
    let scene = SolidScene::new(Fps::new(24, 1).unwrap(), Time::ZERO, Time::from_secs(1));
    let runner = Arc::new(ManualRunner::default());
    let cache = CanvasCache::new(Box::new(scene), runner.clone(), CacheConfig::default());

    cache.set_view(view(Time::ZERO, 64, 64));
    cache.enqueue_render();
    assert!(runner.pending() > 0);

    cache.clear_render();
    let size_after_eviction = cache.tiles_size();
    assert_eq!(size_after_eviction, 0);

    // a worker that raced eviction still reports success; the cache must
    // neither crash nor resurrect the tile
    for job in runner.drain() {
        let TileJob {
            tile,
            event,
            on_finished,
            ..
        } = job;
        on_finished(true);
        event.signal(true);
        assert!(tile.display.lock().unwrap().is_none());
        assert!(tile.event.lock().unwrap().is_none());
    }
    assert_eq!(cache.tiles_size(), size_after_eviction);
    assert!(cache.tiles_snapshot().is_empty());
}

#[test]
fn failed_evaluation_yields_diagnostic_tiles() {
    let mut scene = SolidScene::new(Fps::new(24, 1).unwrap(), Time::ZERO, Time::from_secs(1));
    scene.evaluates = false;
    let runner = Arc::new(ManualRunner::default());
    let cache = CanvasCache::new(Box::new(scene), runner.clone(), CacheConfig::default());

    cache.set_view(view(Time::ZERO, 64, 64));
    cache.enqueue_render();
    runner.run_all();

    let snapshot = cache.tiles_snapshot();
    assert!(!snapshot.is_empty());
    for info in snapshot {
        assert!(!info.in_flight, "failed tiles still complete");
        assert!(info.display_ready, "diagnostic image must be stored");
    }

    let mut status = StatusMap::new();
    cache.get_render_status(&mut status);
    let current = cache.onion_frames()[0].id;
    assert_eq!(status.get(&current), Some(&FrameStatus::Done));
}

#[test]
fn render_status_tracks_progress_states() {
    let scene = SolidScene::new(Fps::new(2, 1).unwrap(), Time::ZERO, Time::from_secs(2));
    let runner = Arc::new(ManualRunner::default());
    let cache = CanvasCache::new(Box::new(scene), runner.clone(), CacheConfig::default());

    cache.set_view(view(Time::new(1, 2), 64, 64));
    cache.enqueue_render();

    let current = cache.onion_frames()[0].id;
    let mut status = StatusMap::new();
    cache.get_render_status(&mut status);
    // timeline at 2 fps over [0s, 2s]: 0, 0.5, 1, 1.5, 2
    assert_eq!(status.len(), 5);
    assert_eq!(status.get(&current), Some(&FrameStatus::InProcess));
    assert_eq!(
        status.get(&current.at_time(Time::ZERO)),
        Some(&FrameStatus::None)
    );

    runner.run_all();
    cache.get_render_status(&mut status);
    assert_eq!(status.get(&current), Some(&FrameStatus::Done));

    // widen the window without rescheduling: the finished tile now covers
    // the frame only partially
    cache.set_view(ViewState {
        window_rect: RectInt::from_wh(0, 0, 128, 128),
        ..view(Time::new(1, 2), 64, 64)
    });
    let mut wide = StatusMap::new();
    cache.get_render_status(&mut wide);
    assert_eq!(wide.get(&current), Some(&FrameStatus::PartiallyDone));
}

#[test]
fn render_vfunc_paints_tiles_border_and_status() {
    let scene = SolidScene::new(Fps::new(4, 1).unwrap(), Time::ZERO, Time::from_secs(1));
    let runner = Arc::new(ThreadPoolRunner::new(Some(2)).unwrap());
    let cache = CanvasCache::new(Box::new(scene), runner, CacheConfig::default());

    cache.set_view(ViewState {
        window_offset: (10, 10),
        ..view(Time::ZERO, 64, 64)
    });
    cache.enqueue_render();
    cache.wait_render();

    let mut host = ArgbImage::new(100, 100, PixelLayout::host());
    {
        let mut ctx = PixelContext::new(&mut host);
        cache.render_vfunc(&mut ctx, RectInt::from_wh(0, 0, 100, 100));
    }

    // interior of the frame is the solid scene color at full alpha
    assert_eq!(host.alpha(40, 40), 255);
    // the 1-px frame border is stroked black
    let border = host.pixel(10, 10);
    assert_eq!(host.alpha(10, 10), 255);
    let ai = host.layout().alpha_index();
    for (i, byte) in border.iter().enumerate() {
        if i != ai {
            assert_eq!(*byte, 0, "border must be black");
        }
    }
    // outside the exposed window nothing is painted
    assert_eq!(host.alpha(5, 5), 0);
}

#[test]
fn onion_composite_saturates_current_frame() {
    let scene = SolidScene::new(Fps::new(4, 1).unwrap(), Time::ZERO, Time::from_secs(1));
    let runner = Arc::new(ThreadPoolRunner::new(Some(2)).unwrap());
    let cache = CanvasCache::new(Box::new(scene), runner, CacheConfig::default());

    cache.set_view(ViewState {
        onion_skin: true,
        past: 1,
        future: 1,
        ..view(Time::new(1, 2), 48, 48)
    });
    cache.enqueue_render();
    cache.wait_render();
    assert!(cache.onion_frames().len() > 1);

    let mut host = ArgbImage::new(64, 64, PixelLayout::host());
    {
        let mut ctx = PixelContext::new(&mut host);
        cache.render_vfunc(&mut ctx, RectInt::from_wh(0, 0, 64, 64));
    }

    // the renormalization loop pushes the additive stack to saturation
    assert_eq!(host.alpha(20, 20), 255);
    // the adjusted current-frame alpha persists in the onion list
    let onion = cache.onion_frames();
    assert!(onion.last().unwrap().alpha > 0.0);
}
