//! Axis-aligned bounding boxes and range-proportional cut sampling

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

/// Componentwise min/max over a set of points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl BoundingBox {
    /// Box enclosing a single point
    pub fn from_point(point: &[f64]) -> Self {
        Self {
            min: point.to_vec(),
            max: point.to_vec(),
        }
    }

    /// Box enclosing every point yielded, or `None` when there are none
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut iter = points.into_iter();
        let mut bbox = Self::from_point(iter.next()?);
        for point in iter {
            bbox.extend(point);
        }
        Some(bbox)
    }

    pub fn dimension(&self) -> usize {
        self.min.len()
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Grow the box to include `point`
    pub fn extend(&mut self, point: &[f64]) {
        for (k, &x) in point.iter().enumerate() {
            if x < self.min[k] {
                self.min[k] = x;
            }
            if x > self.max[k] {
                self.max[k] = x;
            }
        }
    }

    /// Copy of the box grown to include `point`
    pub fn expanded(&self, point: &[f64]) -> Self {
        let mut bbox = self.clone();
        bbox.extend(point);
        bbox
    }

    /// Componentwise union of two boxes
    pub fn union(&self, other: &BoundingBox) -> Self {
        let min = self
            .min
            .iter()
            .zip(&other.min)
            .map(|(a, b)| a.min(*b))
            .collect();
        let max = self
            .max
            .iter()
            .zip(&other.max)
            .map(|(a, b)| a.max(*b))
            .collect();
        Self { min, max }
    }

    /// Per-dimension range `max - min`
    pub fn spans(&self) -> Vec<f64> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| hi - lo)
            .collect()
    }

    /// True when every dimension has zero range
    pub fn is_degenerate(&self) -> bool {
        self.min.iter().zip(&self.max).all(|(lo, hi)| lo == hi)
    }

    /// Per-dimension cut weights, proportional to the spans and at most 1.
    ///
    /// Spans of very large coordinates can overflow to infinity, in which case
    /// every span is halved before scaling.
    fn cut_weights(&self) -> Vec<f64> {
        let mut spans = self.spans();
        if spans.iter().any(|s| !s.is_finite()) {
            spans = self
                .min
                .iter()
                .zip(&self.max)
                .map(|(lo, hi)| hi / 2.0 - lo / 2.0)
                .collect();
        }
        let widest = spans.iter().copied().fold(0.0, f64::max);
        if widest > 0.0 {
            for span in &mut spans {
                *span /= widest;
            }
        }
        spans
    }

    /// Sample a random cut over this box.
    ///
    /// The dimension is drawn with probability proportional to its range and the
    /// value uniformly in `[min, max)` of that dimension, so partitioning with
    /// `coord <= cut` leaves both sides non-empty. Returns `None` for a
    /// degenerate box.
    pub fn sample_cut<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(usize, f64)> {
        if self.is_degenerate() {
            return None;
        }
        let dimension = WeightedIndex::new(self.cut_weights()).ok()?.sample(rng);
        let (lo, hi) = (self.min[dimension], self.max[dimension]);

        let cut = if (hi - lo).is_finite() {
            rng.gen_range(lo..hi)
        } else {
            let r: f64 = rng.gen();
            let cut = lo * (1.0 - r) + hi * r;
            // Rounding can land on `hi`; `lo` still splits the box
            if (lo..hi).contains(&cut) {
                cut
            } else {
                lo
            }
        };
        Some((dimension, cut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_from_points_and_union() {
        let points: Vec<Vec<f64>> = vec![vec![0.0, 5.0], vec![2.0, -1.0], vec![1.0, 3.0]];
        let bbox = BoundingBox::from_points(points.iter().map(Vec::as_slice)).unwrap();
        assert_eq!(bbox.min(), &[0.0, -1.0]);
        assert_eq!(bbox.max(), &[2.0, 5.0]);

        let other = BoundingBox::from_point(&[3.0, 0.0]);
        let joined = bbox.union(&other);
        assert_eq!(joined.min(), &[0.0, -1.0]);
        assert_eq!(joined.max(), &[3.0, 5.0]);
        assert_eq!(joined, bbox.expanded(&[3.0, 0.0]));
    }

    #[test]
    fn test_degenerate_and_empty() {
        let bbox = BoundingBox::from_point(&[1.0, 1.0]);
        assert!(bbox.is_degenerate());
        assert!(!bbox.expanded(&[1.0, 1.5]).is_degenerate());
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_cut_on_overflowing_span() {
        let mut rng = StdRng::seed_from_u64(5);
        let bbox =
            BoundingBox::from_points([&[-1e308, 1e308, 0.0][..], &[1e308, -1e308, 1.0][..]])
                .unwrap();
        assert!(bbox.spans()[0].is_infinite());

        for _ in 0..200 {
            let (dimension, cut) = bbox.sample_cut(&mut rng).unwrap();
            let (lo, hi) = (bbox.min()[dimension], bbox.max()[dimension]);
            assert!(cut.is_finite());
            assert!(lo <= cut && cut < hi, "cut {cut} outside [{lo}, {hi})");
        }
    }

    #[test]
    fn test_degenerate_box_has_no_cut() {
        let mut rng = StdRng::seed_from_u64(7);
        let bbox = BoundingBox::from_point(&[4.0, 4.0, 4.0]);
        assert!(bbox.sample_cut(&mut rng).is_none());
    }

    #[test]
    fn test_cut_only_on_spanning_dimensions() {
        let mut rng = StdRng::seed_from_u64(11);
        let bbox = BoundingBox::from_points([&[0.0, 3.0, 1.0][..], &[0.0, 7.0, 1.0][..]]).unwrap();

        for _ in 0..200 {
            let (dimension, cut) = bbox.sample_cut(&mut rng).unwrap();
            assert_eq!(dimension, 1);
            assert!((3.0..7.0).contains(&cut));
        }
    }

    #[test]
    fn test_cut_dimension_follows_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let bbox = BoundingBox::from_points([&[0.0, 0.0][..], &[1.0, 99.0][..]]).unwrap();

        let wide = (0..1000)
            .filter(|_| bbox.sample_cut(&mut rng).unwrap().0 == 1)
            .count();
        assert!(wide > 950, "wide dimension chosen {wide} times");
    }
}
