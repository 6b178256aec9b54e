use std::cmp::Reverse;
use std::collections::HashMap;

use super::image::GrayImage;
use super::unionfind::UnionFind;

/// Components smaller than this cannot hold a decodable marker and never
/// contribute boundary points.
const MIN_COMPONENT_PX: u32 = 25;

/// Neighbor steps that enumerate each boundary pair exactly once: right,
/// down, and the two downward diagonals.
const STEPS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 1), (1, 1)];

/// One black/white boundary sample.
#[derive(Debug, Clone, Copy)]
pub struct Pt {
    /// x in half-pixel units (2x the pixel coordinate).
    pub x: u16,
    /// y in half-pixel units.
    pub y: u16,
    /// Gradient x component, pointing black to white.
    pub gx: i16,
    /// Gradient y component.
    pub gy: i16,
    /// Angular position around the cluster centroid; filled in by the quad
    /// fitter.
    pub slope: f32,
}

/// Boundary samples separating one pair of components, a candidate marker
/// outline.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub points: Vec<Pt>,
}

/// Group black/white boundary samples by the component pair they separate.
///
/// A marker's dark border against the lighter floor meets it along exactly
/// one component pair, so the whole outline lands in a single cluster.
/// Clusters with fewer than `min_cluster_size` samples are dropped.
pub fn gradient_clusters(
    threshed: &GrayImage,
    uf: &mut UnionFind,
    min_cluster_size: u32,
) -> Vec<Cluster> {
    let (w, h) = (threshed.width, threshed.height);

    let mut buckets: HashMap<u64, Vec<Pt>> = HashMap::new();

    for y in 0..h {
        for x in 0..w {
            let shade = threshed.get(x, y);
            if shade == 127 || uf.set_size(y * w + x) < MIN_COMPONENT_PX {
                continue;
            }

            for (dx, dy) in STEPS {
                let (nx, ny) = (x as i32 + dx, y as i32 + dy);
                if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);

                // Want the exact opposite shade on the far side
                if threshed.get(nx, ny) != 255 - shade {
                    continue;
                }
                if uf.set_size(ny * w + nx) < MIN_COMPONENT_PX {
                    continue;
                }

                // +255 stepping black to white, -255 the other way
                let step = 255 - 2 * shade as i16;
                buckets
                    .entry(pair_key(uf.find(y * w + x), uf.find(ny * w + nx)))
                    .or_default()
                    .push(Pt {
                        x: (2 * x as i32 + dx) as u16,
                        y: (2 * y as i32 + dy) as u16,
                        gx: dx as i16 * step,
                        gy: dy as i16 * step,
                        slope: 0.0,
                    });
            }
        }
    }

    let mut clusters: Vec<Cluster> = buckets
        .into_values()
        .filter(|boundary| boundary.len() >= min_cluster_size as usize)
        .map(|points| Cluster { points })
        .collect();

    // Map order is arbitrary; largest-first keeps runs reproducible
    clusters.sort_by_key(|c| Reverse(c.points.len()));
    clusters
}

/// Order-independent key for a pair of component representatives.
fn pair_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}
