use super::image::GrayImage;
use super::unionfind::UnionFind;

/// Group thresholded pixels into connected components.
///
/// A pixel merges with a neighbor carrying the same binary value; the 127
/// skip value never merges. White pixels additionally merge across
/// diagonals, black ones do not: the black marker border must stay separate
/// from the black cells it touches only corner-to-corner, while the white
/// quiet zone around it is allowed to flow together.
pub fn connected_components(threshed: &GrayImage) -> UnionFind {
    let (w, h) = (threshed.width, threshed.height);
    let mut uf = UnionFind::new((w * h) as usize);

    for y in 0..h {
        for x in 0..w {
            let v = threshed.get(x, y);
            if v == 127 {
                continue;
            }
            let id = y * w + x;

            let left = x > 0 && threshed.get(x - 1, y) == v;
            if left {
                uf.union(id, id - 1);
            }

            if y == 0 {
                continue;
            }
            let above = threshed.get(x, y - 1) == v;

            // When left, upper-left and up all match, the up merge is
            // already implied through the left neighbor.
            let implied = left && threshed.get(x - 1, y - 1) == v;
            if above && !implied {
                uf.union(id, id - w);
            }

            if v == 255 {
                if x > 0 && !left && !above && threshed.get(x - 1, y - 1) == 255 {
                    uf.union(id, id - w - 1);
                }
                if x + 1 < w && !above && threshed.get(x + 1, y - 1) == 255 {
                    uf.union(id, id - w + 1);
                }
            }
        }
    }

    uf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(w: u32, h: u32, pixels: &[u8]) -> UnionFind {
        connected_components(&GrayImage::from_buf(w, h, w, pixels.to_vec()))
    }

    fn root_of(uf: &mut UnionFind, w: u32, x: u32, y: u32) -> u32 {
        uf.find(y * w + x)
    }

    #[test]
    fn solid_region_collapses_to_one_component() {
        let mut uf = components(4, 3, &[0; 12]);
        let r = root_of(&mut uf, 4, 0, 0);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(root_of(&mut uf, 4, x, y), r);
            }
        }
        assert_eq!(uf.set_size(0), 12);
    }

    #[test]
    fn skip_value_stays_isolated() {
        let mut uf = components(2, 3, &[127; 6]);
        for px in 0..6u32 {
            assert_eq!(uf.find(px), px);
            assert_eq!(uf.set_size(px), 1);
        }
    }

    #[test]
    fn opposite_values_never_merge() {
        #[rustfmt::skip]
        let mut uf = components(3, 2, &[
            0, 0, 255,
            0, 0, 255,
        ]);
        assert_eq!(root_of(&mut uf, 3, 0, 0), root_of(&mut uf, 3, 1, 1));
        assert_eq!(root_of(&mut uf, 3, 2, 0), root_of(&mut uf, 3, 2, 1));
        assert_ne!(root_of(&mut uf, 3, 0, 0), root_of(&mut uf, 3, 2, 0));
    }

    #[test]
    fn white_crosses_a_diagonal() {
        #[rustfmt::skip]
        let mut uf = components(2, 2, &[
            255,   0,
              0, 255,
        ]);
        assert_eq!(root_of(&mut uf, 2, 0, 0), root_of(&mut uf, 2, 1, 1));
    }

    #[test]
    fn white_crosses_the_other_diagonal() {
        #[rustfmt::skip]
        let mut uf = components(2, 2, &[
              0, 255,
            255,   0,
        ]);
        assert_eq!(root_of(&mut uf, 2, 1, 0), root_of(&mut uf, 2, 0, 1));
    }

    #[test]
    fn black_does_not_cross_diagonals() {
        #[rustfmt::skip]
        let mut uf = components(2, 2, &[
              0, 255,
            255,   0,
        ]);
        assert_ne!(root_of(&mut uf, 2, 0, 0), root_of(&mut uf, 2, 1, 1));
    }

    #[test]
    fn checkerboard_whites_unite_blacks_fragment() {
        #[rustfmt::skip]
        let mut uf = components(3, 3, &[
              0, 255,   0,
            255,   0, 255,
              0, 255,   0,
        ]);
        // All four edge whites flow together through diagonals
        let wr = root_of(&mut uf, 3, 1, 0);
        assert_eq!(root_of(&mut uf, 3, 0, 1), wr);
        assert_eq!(root_of(&mut uf, 3, 2, 1), wr);
        assert_eq!(root_of(&mut uf, 3, 1, 2), wr);
        // The five blacks stay five singletons
        for (x, y) in [(0, 0), (2, 0), (1, 1), (0, 2), (2, 2)] {
            assert_eq!(uf.set_size(y * 3 + x), 1);
        }
    }

    #[test]
    fn component_sizes_split_around_skip_pixels() {
        #[rustfmt::skip]
        let mut uf = components(4, 2, &[
            0,   0, 127, 255,
            0,   0, 127, 255,
        ]);
        assert_eq!(uf.set_size(0), 4);
        assert_eq!(uf.set_size(3), 2);
        assert_eq!(uf.set_size(2), 1);
    }
}
