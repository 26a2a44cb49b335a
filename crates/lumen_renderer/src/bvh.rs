//! Bounding Volume Hierarchy over indexed primitives.
//!
//! The same structure serves as the per-mesh bottom level (over triangles)
//! and as the top level (over instance bounds). Nodes store primitive
//! indices only; the caller supplies the primitive test as a closure.

use lumen_math::{Aabb, Ray, Vec3};

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// BVH node - either a branch with two children or a leaf with primitive indices.
#[derive(Debug, Clone)]
pub enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        items: Vec<u32>,
        bbox: Aabb,
    },
    Empty,
}

impl Default for BvhNode {
    fn default() -> Self {
        BvhNode::Empty
    }
}

impl BvhNode {
    /// Build a hierarchy over primitives with the given bounds. Primitive
    /// `i` is referred to by index `i` in traversal callbacks.
    pub fn build(bounds: &[Aabb]) -> Self {
        if bounds.is_empty() {
            return BvhNode::Empty;
        }
        let centroids: Vec<Vec3> = bounds.iter().map(Aabb::centroid).collect();
        let items = (0..bounds.len() as u32).collect();
        Self::build_recursive(items, bounds, &centroids)
    }

    /// Median split on the longest axis of the centroid bounds.
    fn build_recursive(mut items: Vec<u32>, bounds: &[Aabb], centroids: &[Vec3]) -> Self {
        let bbox = items
            .iter()
            .fold(Aabb::EMPTY, |acc, &i| Aabb::surrounding(&acc, &bounds[i as usize]));

        if items.len() <= LEAF_MAX_SIZE {
            return BvhNode::Leaf { items, bbox };
        }

        let mut centroid_bounds = Aabb::EMPTY;
        for &i in &items {
            centroid_bounds.grow(centroids[i as usize]);
        }
        let axis = centroid_bounds.longest_axis();

        items.sort_unstable_by(|&a, &b| {
            centroids[a as usize][axis]
                .partial_cmp(&centroids[b as usize][axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let right_items = items.split_off(items.len() / 2);
        let left = Self::build_recursive(items, bounds, centroids);
        let right = Self::build_recursive(right_items, bounds, centroids);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    /// Closest-hit traversal.
    ///
    /// `test(item, t_max)` returns the hit distance when primitive `item` is
    /// hit closer than `t_max`. `t_max` is tightened as hits are found;
    /// returns whether anything was hit.
    pub fn closest<F>(&self, ray: &Ray, t_min: f32, t_max: &mut f32, test: &mut F) -> bool
    where
        F: FnMut(u32, f32) -> Option<f32>,
    {
        match self {
            BvhNode::Empty => false,

            BvhNode::Leaf { items, bbox } => {
                if bbox.hit(ray, t_min, *t_max).is_none() {
                    return false;
                }
                let mut hit_anything = false;
                for &item in items {
                    if let Some(t) = test(item, *t_max) {
                        *t_max = t;
                        hit_anything = true;
                    }
                }
                hit_anything
            }

            BvhNode::Branch { left, right, bbox } => {
                if bbox.hit(ray, t_min, *t_max).is_none() {
                    return false;
                }
                let hit_left = left.closest(ray, t_min, t_max, test);
                let hit_right = right.closest(ray, t_min, t_max, test);
                hit_left || hit_right
            }
        }
    }

    /// Any-hit traversal for shadow rays; stops at the first primitive
    /// for which `test(item)` returns true.
    pub fn any<F>(&self, ray: &Ray, t_min: f32, t_max: f32, test: &mut F) -> bool
    where
        F: FnMut(u32) -> bool,
    {
        match self {
            BvhNode::Empty => false,
            BvhNode::Leaf { items, bbox } => {
                bbox.hit(ray, t_min, t_max).is_some() && items.iter().any(|&i| test(i))
            }
            BvhNode::Branch { left, right, bbox } => {
                bbox.hit(ray, t_min, t_max).is_some()
                    && (left.any(ray, t_min, t_max, test) || right.any(ray, t_min, t_max, test))
            }
        }
    }

    /// Number of nodes, for build statistics.
    pub fn node_count(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit boxes at x = 0, 2, 4, ... on the Z axis at z = -5.
    fn row_of_boxes(n: usize) -> Vec<Aabb> {
        (0..n)
            .map(|i| {
                let c = Vec3::new(i as f32 * 2.0, 0.0, -5.0);
                Aabb::from_points(c - Vec3::splat(0.5), c + Vec3::splat(0.5))
            })
            .collect()
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = BvhNode::build(&[]);
        assert!(matches!(bvh, BvhNode::Empty));
        let mut t = f32::INFINITY;
        assert!(!bvh.closest(&Ray::new(Vec3::ZERO, -Vec3::Z), 0.0, &mut t, &mut |_, _| Some(1.0)));
    }

    #[test]
    fn test_bvh_small_is_leaf() {
        let bvh = BvhNode::build(&row_of_boxes(3));
        assert!(matches!(bvh, BvhNode::Leaf { .. }));
    }

    #[test]
    fn test_bvh_closest_finds_right_item() {
        let boxes = row_of_boxes(10);
        let bvh = BvhNode::build(&boxes);
        assert!(bvh.node_count() > 1);

        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), -Vec3::Z);
        let mut t_max = f32::INFINITY;
        let mut found = None;
        let hit = bvh.closest(&ray, 0.0, &mut t_max, &mut |item, t_max| {
            let t = boxes[item as usize].hit(&ray, 0.0, t_max)?;
            found = Some(item);
            Some(t)
        });

        assert!(hit);
        assert_eq!(found, Some(5));
        assert!((t_max - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_bvh_closest_prefers_nearer() {
        // Two boxes on the same line of sight
        let boxes = vec![
            Aabb::from_points(Vec3::new(-0.5, -0.5, -10.5), Vec3::new(0.5, 0.5, -9.5)),
            Aabb::from_points(Vec3::new(-0.5, -0.5, -3.5), Vec3::new(0.5, 0.5, -2.5)),
        ];
        let bvh = BvhNode::build(&boxes);
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut t_max = f32::INFINITY;
        bvh.closest(&ray, 0.0, &mut t_max, &mut |item, t_max| boxes[item as usize].hit(&ray, 0.0, t_max));
        assert!((t_max - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_bvh_any() {
        let boxes = row_of_boxes(10);
        let bvh = BvhNode::build(&boxes);

        let ray = Ray::new(Vec3::new(6.0, 0.0, 0.0), -Vec3::Z);
        assert!(bvh.any(&ray, 0.0, f32::INFINITY, &mut |i| boxes[i as usize].hit(&ray, 0.0, 100.0).is_some()));
        // Bounded short of the boxes
        assert!(!bvh.any(&ray, 0.0, 2.0, &mut |i| boxes[i as usize].hit(&ray, 0.0, 2.0).is_some()));
        // Between two boxes
        let gap = Ray::new(Vec3::new(1.0, 0.0, 0.0), -Vec3::Z);
        assert!(!bvh.any(&gap, 0.0, f32::INFINITY, &mut |i| boxes[i as usize].hit(&gap, 0.0, 100.0).is_some()));
    }
}
