use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use leafview_common::{
    Aabb, BuiltWorldLists, LeafIndex, SpatialQuery, ViewSetup, VisibleFogVolume, WaterMaterial,
    WorldListId, WorldListRequest,
};

/// A flat water body covering the whole grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridWater {
    pub height: f32,
    pub material: WaterMaterial,
}

/// Spatial partition made of equal axis-aligned cells; each cell is one leaf.
///
/// Leaves are numbered x-fastest, then y, then z. Areas are vertical slabs of
/// `area_width` cells along x. Boxes that touch a cell boundary land in both
/// neighbours.
#[derive(Debug)]
pub struct GridLeaves {
    origin: Vec3,
    cell_size: f32,
    dims: [u32; 3],
    area_width: u32,
    water: Option<GridWater>,
    occluders: Vec<Aabb>,
    next_list: AtomicU32,
}

impl GridLeaves {
    /// Grid whose minimum corner sits at `origin`.
    pub fn new(origin: Vec3, cell_size: f32, dims: [u32; 3]) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        let dims = dims.map(|d| d.max(1));
        Self {
            origin,
            cell_size,
            dims,
            area_width: dims[0],
            water: None,
            occluders: Vec::new(),
            next_list: AtomicU32::new(0),
        }
    }

    pub fn with_areas(mut self, area_width: u32) -> Self {
        self.area_width = area_width.max(1);
        self
    }

    pub fn with_water(mut self, water: GridWater) -> Self {
        self.water = Some(water);
        self
    }

    /// Renderables entirely inside an occluder box report as occluded.
    pub fn with_occluder(mut self, occluder: Aabb) -> Self {
        self.occluders.push(occluder);
        self
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    pub fn bounds(&self) -> Aabb {
        let size = Vec3::new(self.dims[0] as f32, self.dims[1] as f32, self.dims[2] as f32) * self.cell_size;
        Aabb::new(self.origin, self.origin + size)
    }

    pub fn leaf_index(&self, cell: [u32; 3]) -> LeafIndex {
        cell[0] + self.dims[0] * (cell[1] + self.dims[1] * cell[2])
    }

    pub fn leaf_cell(&self, leaf: LeafIndex) -> [u32; 3] {
        let x = leaf % self.dims[0];
        let y = (leaf / self.dims[0]) % self.dims[1];
        let z = leaf / (self.dims[0] * self.dims[1]);
        [x, y, z]
    }

    pub fn leaf_bounds(&self, leaf: LeafIndex) -> Aabb {
        let [x, y, z] = self.leaf_cell(leaf);
        let mins = self.origin + Vec3::new(x as f32, y as f32, z as f32) * self.cell_size;
        Aabb::new(mins, mins + Vec3::splat(self.cell_size))
    }

    /// Leaf containing `point`, if inside the grid.
    pub fn leaf_at(&self, point: Vec3) -> Option<LeafIndex> {
        if !self.bounds().contains_point(point) {
            return None;
        }
        let rel = (point - self.origin) / self.cell_size;
        let cell = [0, 1, 2].map(|i| (rel[i].floor() as i64).clamp(0, self.dims[i] as i64 - 1) as u32);
        Some(self.leaf_index(cell))
    }

    pub fn area_of(&self, leaf: LeafIndex) -> i32 {
        (self.leaf_cell(leaf)[0] / self.area_width) as i32
    }

    fn fog_volume_of(&self, leaf: LeafIndex) -> i32 {
        match self.water {
            Some(water) if self.leaf_bounds(leaf).center().z < water.height => 0,
            _ => -1,
        }
    }

    fn cell_range(&self, bounds: &Aabb) -> Option<[(u32, u32); 3]> {
        if !bounds.is_valid() || !bounds.intersects(&self.bounds()) {
            return None;
        }
        let lo = (bounds.mins - self.origin) / self.cell_size;
        let hi = (bounds.maxs - self.origin) / self.cell_size;
        Some([0, 1, 2].map(|i| {
            let max = self.dims[i] as i64 - 1;
            let a = (lo[i].floor() as i64).clamp(0, max) as u32;
            let b = (hi[i].floor() as i64).clamp(0, max) as u32;
            (a, b)
        }))
    }
}

impl SpatialQuery for GridLeaves {
    fn leaf_count(&self) -> u32 {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    fn enumerate_leaves_in_box(&self, bounds: &Aabb, out: &mut dyn FnMut(LeafIndex)) {
        let Some([(x0, x1), (y0, y1), (z0, z1)]) = self.cell_range(bounds) else {
            return;
        };
        for z in z0..=z1 {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    out(self.leaf_index([x, y, z]));
                }
            }
        }
    }

    fn leaves_area(&self, leaves: &[LeafIndex]) -> i32 {
        let Some((&first, rest)) = leaves.split_first() else {
            return -1;
        };
        let area = self.area_of(first);
        if rest.iter().all(|&leaf| self.area_of(leaf) == area) {
            area
        } else {
            -1
        }
    }

    fn build_world_lists(&self, view: &ViewSetup, request: &WorldListRequest) -> BuiltWorldLists {
        let frustum = view.frustum();
        let mut visible: Vec<(f32, LeafIndex)> = (0..self.leaf_count())
            .filter_map(|leaf| {
                let bounds = self.leaf_bounds(leaf);
                let forced = request.force_view_leaf == Some(leaf);
                (forced || !frustum.cull_box(&bounds))
                    .then(|| (bounds.dist_sq_to_point(view.origin), leaf))
            })
            .collect();
        visible.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let leaves: Vec<LeafIndex> = visible.into_iter().map(|(_, leaf)| leaf).collect();
        let leaf_fog_volumes: Vec<i32> = leaves.iter().map(|&leaf| self.fog_volume_of(leaf)).collect();
        let has_water = self.water.is_some_and(|water| {
            leaves.iter().any(|&leaf| {
                let b = self.leaf_bounds(leaf);
                b.mins.z <= water.height
            })
        });

        BuiltWorldLists {
            list: WorldListId(self.next_list.fetch_add(1, Ordering::Relaxed)),
            leaves,
            leaf_fog_volumes,
            has_water,
        }
    }

    fn is_occluded(&self, bounds: &Aabb) -> bool {
        self.occluders
            .iter()
            .any(|o| o.contains_point(bounds.mins) && o.contains_point(bounds.maxs))
    }

    fn box_intersects_water_volume(&self, bounds: &Aabb, fog_volume: i32) -> bool {
        match self.water {
            Some(water) if fog_volume == 0 => {
                bounds.mins.z <= water.height && bounds.maxs.z >= water.height && bounds.intersects(&self.bounds())
            }
            _ => false,
        }
    }

    fn visible_fog_volume(&self, eye: Vec3) -> VisibleFogVolume {
        let Some(water) = self.water else {
            return VisibleFogVolume::default();
        };
        let eye_in_fog = eye.z < water.height;
        VisibleFogVolume {
            fog_volume: 0,
            fog_volume_leaf: self
                .leaf_at(Vec3::new(eye.x, eye.y, water.height - self.cell_size * 0.5))
                .map_or(-1, |leaf| leaf as i32),
            eye_in_fog,
            distance_to_water: (eye.z - water.height).abs(),
            water_height: water.height,
            material: Some(water.material),
        }
    }

    fn point_in_solid(&self, point: Vec3) -> bool {
        !self.bounds().contains_point(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn grid() -> GridLeaves {
        GridLeaves::new(Vec3::ZERO, 64.0, [4, 4, 2])
    }

    fn leaves_in(grid: &GridLeaves, bounds: Aabb) -> BTreeSet<LeafIndex> {
        let mut out = BTreeSet::new();
        grid.enumerate_leaves_in_box(&bounds, &mut |leaf| {
            out.insert(leaf);
        });
        out
    }

    #[test]
    fn leaf_index_round_trips_cells() {
        let g = grid();
        assert_eq!(g.leaf_count(), 32);
        for leaf in 0..g.leaf_count() {
            assert_eq!(g.leaf_index(g.leaf_cell(leaf)), leaf);
        }
        assert_eq!(g.leaf_at(Vec3::new(70.0, 10.0, 100.0)), Some(g.leaf_index([1, 0, 1])));
        assert_eq!(g.leaf_at(Vec3::new(-1.0, 0.0, 0.0)), None);
    }

    #[test]
    fn box_query_covers_overlapped_cells() {
        let g = grid();
        let inside = leaves_in(&g, Aabb::new(Vec3::splat(10.0), Vec3::splat(20.0)));
        assert_eq!(inside, BTreeSet::from([0]));

        let straddle = leaves_in(&g, Aabb::new(Vec3::new(60.0, 10.0, 10.0), Vec3::new(70.0, 20.0, 20.0)));
        assert_eq!(straddle, BTreeSet::from([0, 1]));

        let outside = leaves_in(&g, Aabb::new(Vec3::splat(-50.0), Vec3::splat(-10.0)));
        assert!(outside.is_empty());
    }

    #[test]
    fn areas_split_along_x() {
        let g = grid().with_areas(2);
        assert_eq!(g.leaves_area(&[0, 1]), 0);
        assert_eq!(g.leaves_area(&[2, 3]), 1);
        assert_eq!(g.leaves_area(&[1, 2]), -1);
        assert_eq!(g.leaves_area(&[]), -1);
    }

    #[test]
    fn world_lists_are_front_to_back() {
        let g = grid();
        let view = ViewSetup {
            origin: Vec3::new(-100.0, 128.0, 64.0),
            angles: Vec3::ZERO,
            ..ViewSetup::default()
        };
        let built = g.build_world_lists(&view, &WorldListRequest::default());
        assert!(!built.leaves.is_empty());
        assert_eq!(built.leaves.len(), built.leaf_fog_volumes.len());
        let dists: Vec<f32> = built
            .leaves
            .iter()
            .map(|&leaf| g.leaf_bounds(leaf).dist_sq_to_point(view.origin))
            .collect();
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));
        assert!(!built.has_water);
    }

    #[test]
    fn water_marks_low_leaves() {
        let g = grid().with_water(GridWater {
            height: 64.0,
            material: WaterMaterial::default(),
        });
        let fog = g.visible_fog_volume(Vec3::new(10.0, 10.0, 100.0));
        assert_eq!(fog.fog_volume, 0);
        assert!(!fog.eye_in_fog);
        assert_eq!(fog.distance_to_water, 36.0);
        assert_eq!(g.fog_volume_of(0), 0);
        assert_eq!(g.fog_volume_of(g.leaf_index([0, 0, 1])), -1);

        let crossing = Aabb::new(Vec3::new(0.0, 0.0, 60.0), Vec3::new(10.0, 10.0, 70.0));
        assert!(g.box_intersects_water_volume(&crossing, 0));
        assert!(!g.box_intersects_water_volume(&crossing, -1));
    }

    #[test]
    fn occluder_hides_contained_boxes() {
        let g = grid().with_occluder(Aabb::new(Vec3::ZERO, Vec3::splat(50.0)));
        assert!(g.is_occluded(&Aabb::new(Vec3::splat(10.0), Vec3::splat(20.0))));
        assert!(!g.is_occluded(&Aabb::new(Vec3::splat(40.0), Vec3::splat(60.0))));
    }
}
