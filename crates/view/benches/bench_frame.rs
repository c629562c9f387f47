use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use leafview_common::{Aabb, MaterialId, ModelType, RenderConfig, Renderable, TranslucencyType, WaterMaterial};
use leafview_leaf::{GridLeaves, GridWater, RenderableDesc};
use leafview_view::{CameraSource, FixedCamera, RecordingDevice, Scene, ViewConfig, ViewRender};

struct Prop {
    origin: Vec3,
    translucency: TranslucencyType,
}

impl Renderable for Prop {
    fn render_origin(&self) -> Vec3 {
        self.origin
    }

    fn render_bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(12.0))
    }

    fn compute_translucency_type(&self) -> TranslucencyType {
        self.translucency
    }
}

/// A 16x16 field with water at z = 0; every fifth prop is glass.
fn make_scene(config: &RenderConfig, count: usize) -> (Scene, Vec<Arc<dyn Renderable>>) {
    let grid = GridLeaves::new(Vec3::new(-1024.0, -1024.0, -256.0), 128.0, [16, 16, 4]).with_water(GridWater {
        height: 0.0,
        material: WaterMaterial {
            id: MaterialId(1),
            translucent: true,
            has_reflect_texture: true,
            has_refract_texture: true,
            force_cheap: false,
            force_expensive: false,
            reflect_entities: true,
            underwater_overlay: None,
        },
    });
    let mut scene = Scene::with_config(config, Box::new(grid));
    let side = (count as f32).sqrt().ceil() as usize;
    let spacing = 1900.0 / side as f32;
    let mut props: Vec<Arc<dyn Renderable>> = Vec::with_capacity(count);
    for i in 0..count {
        let translucency = if i % 5 == 0 {
            TranslucencyType::Translucent
        } else {
            TranslucencyType::Opaque
        };
        let origin = Vec3::new(
            (i % side) as f32 * spacing - 950.0,
            (i / side) as f32 * spacing - 950.0,
            if i % 2 == 0 { 32.0 } else { -32.0 },
        );
        let prop: Arc<dyn Renderable> = Arc::new(Prop { origin, translucency });
        scene.add_renderable(RenderableDesc::new(&prop, ModelType::StudioModel));
        props.push(prop);
    }
    scene.recompute_leaves();
    (scene, props)
}

fn bench_frames(label: &str, config: RenderConfig, count: usize, iterations: u32) {
    let (mut scene, _props) = make_scene(&config, count);
    let mut driver = ViewRender::new(ViewConfig::from(&config));
    driver.set_viewport(0, 0, 1280, 720);
    let camera = FixedCamera::new(Vec3::new(-900.0, 0.0, 64.0), Vec3::new(10.0, 0.0, 0.0)).with_fov(90.0);
    let mut device = RecordingDevice::new();

    let start = Instant::now();
    let mut views = 0;
    for frame in 0..iterations {
        scene.time = frame as f32 / 60.0;
        driver.set_up_views(CameraSource::Player(&camera));
        device.clear();
        views = black_box(driver.render(&mut scene, &mut device)).views;
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;
    println!(
        "  {label} ({count} renderables, {views} views, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Frame Benchmarks ===\n");

    let cheap = RenderConfig::default();
    let expensive = RenderConfig {
        water_force_expensive: true,
        ..RenderConfig::default()
    };
    let uncached = RenderConfig {
        world_list_cache: false,
        ..expensive.clone()
    };

    println!("Full frame:");
    bench_frames("cheap water", cheap.clone(), 1000, 100);
    bench_frames("expensive water", expensive.clone(), 1000, 100);
    bench_frames("expensive water, no list cache", uncached, 1000, 100);
    bench_frames("cheap water", cheap, 10000, 10);
    bench_frames("expensive water", expensive, 10000, 10);

    println!("\n=== Done ===");
}
