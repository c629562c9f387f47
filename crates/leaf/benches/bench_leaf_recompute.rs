use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use leafview_common::{Aabb, ModelType, NullShadowManager, RenderHandle, Renderable, ShadowFlags, ShadowId, SpatialQuery};
use leafview_leaf::{GridLeaves, LeafConfig, LeafSystem, ListItem, RenderableDesc};
use parking_lot::Mutex;

struct Prop {
    origin: Mutex<Vec3>,
}

impl Renderable for Prop {
    fn render_origin(&self) -> Vec3 {
        *self.origin.lock()
    }

    fn render_bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(12.0))
    }
}

fn make_level(count: usize, threaded: bool) -> (GridLeaves, LeafSystem, Vec<Arc<Prop>>, Vec<RenderHandle>) {
    let grid = GridLeaves::new(Vec3::ZERO, 128.0, [32, 32, 2]);
    let mut leaves = LeafSystem::new(LeafConfig {
        threaded_leaf_insert: threaded,
        ..LeafConfig::default()
    });
    leaves.level_init(grid.leaf_count());

    let side = (count as f32).sqrt().ceil() as usize;
    let mut props = Vec::with_capacity(count);
    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        let origin = Vec3::new((i % side) as f32 * 40.0 + 20.0, (i / side) as f32 * 40.0 + 20.0, 64.0);
        let prop = Arc::new(Prop {
            origin: Mutex::new(origin),
        });
        let dyn_prop: Arc<dyn Renderable> = prop.clone();
        handles.push(leaves.add_renderable(RenderableDesc::new(&dyn_prop, ModelType::StudioModel)));
        props.push(prop);
    }
    leaves.recompute_leaves(&grid, &mut NullShadowManager);
    (grid, leaves, props, handles)
}

fn bench_recompute(count: usize, threaded: bool, iterations: usize) {
    let (grid, mut leaves, props, handles) = make_level(count, threaded);

    let start = Instant::now();
    for i in 0..iterations {
        let step = if i % 2 == 0 { 70.0 } else { -70.0 };
        for (prop, &handle) in props.iter().zip(&handles) {
            let origin = *prop.origin.lock();
            *prop.origin.lock() = origin + Vec3::new(step, 0.0, 0.0);
            leaves.mark_changed(handle);
        }
        leaves.recompute_leaves(black_box(&grid), &mut NullShadowManager);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    let mode = if threaded { "threaded" } else { "serial" };
    println!("  recompute {mode} ({count} renderables, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_build_list(count: usize, iterations: usize) {
    let (grid, mut leaves, _props, _handles) = make_level(count, false);
    let visible: Vec<u32> = (0..grid.leaf_count()).collect();
    let mut items: Vec<ListItem> = Vec::new();

    let start = Instant::now();
    for frame in 0..iterations as u32 {
        leaves.collect_leaf_renderables(black_box(&visible), false, &mut items);
        leaves.extract_duplicates(frame, &mut items);
        let _ = black_box(leaves.compute_bounds(&items));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  flatten + dedup + bounds ({count} renderables, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_shadow_projection(count: usize, iterations: usize) {
    let (grid, mut leaves, _props, _handles) = make_level(count, false);
    let mut footprint = Vec::new();
    grid.enumerate_leaves_in_box(
        &Aabb::new(Vec3::ZERO, Vec3::new(1024.0, 1024.0, 128.0)),
        &mut |leaf| footprint.push(leaf),
    );

    let start = Instant::now();
    for i in 0..iterations {
        let shadow = leaves.add_shadow(ShadowId(i as u32), ShadowFlags::SHADOW);
        leaves.project_shadow(shadow, black_box(&footprint), &mut NullShadowManager);
        leaves.remove_shadow(shadow);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  project shadow ({count} renderables, {} leaves, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        footprint.len()
    );
}

fn main() {
    println!("=== Leaf Registry Benchmarks ===\n");

    println!("Dirty recompute:");
    bench_recompute(100, false, 1000);
    bench_recompute(1000, false, 100);
    bench_recompute(1000, true, 100);
    bench_recompute(10000, true, 10);

    println!("\nList build:");
    bench_build_list(1000, 1000);
    bench_build_list(10000, 100);

    println!("\nShadow projection:");
    bench_shadow_projection(1000, 1000);
    bench_shadow_projection(10000, 100);

    println!("\n=== Done ===");
}
