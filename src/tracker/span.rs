use serde::{Deserialize, Serialize};

/// Extent of an object along the channel axis.
///
/// `start` is the side facing the closed end of the channel, `end` the side
/// facing the open end. Objects in one frame are ordered by their center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Coordinate of the side facing the closed end
    pub start: f64,
    /// Coordinate of the side facing the open end
    pub end: f64,
}

impl Span {
    /// Create a span from its two bounds, in any order.
    #[inline]
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Create a span from its center and length.
    #[inline]
    pub fn from_center(center: f64, length: f64) -> Self {
        let half = length.abs() / 2.0;
        Self {
            start: center - half,
            end: center + half,
        }
    }

    #[inline]
    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Smallest span covering both spans.
    #[inline]
    pub fn union(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Cut the span at `position`, clamped into the span.
    pub fn split_at(&self, position: f64) -> (Span, Span) {
        let cut = position.clamp(self.start, self.end);
        (Span::new(self.start, cut), Span::new(cut, self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_bounds_are_ordered() {
        let span = Span::new(30.0, 10.0);
        assert_eq!(span.start, 10.0);
        assert_eq!(span.end, 30.0);
        assert_eq!(span.length(), 20.0);
        assert_eq!(span.center(), 20.0);
    }

    #[test]
    fn test_from_center() {
        let span = Span::from_center(25.0, 10.0);
        assert!((span.start - 20.0).abs() < 1e-9);
        assert!((span.end - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_at_clamps() {
        let span = Span::new(0.0, 10.0);
        let (a, b) = span.split_at(4.0);
        assert_eq!(a, Span::new(0.0, 4.0));
        assert_eq!(b, Span::new(4.0, 10.0));

        let (a, b) = span.split_at(15.0);
        assert_eq!(a, span);
        assert_eq!(b.length(), 0.0);
    }

    #[test]
    fn test_union() {
        let a = Span::new(0.0, 10.0);
        let b = Span::new(12.0, 15.0);
        assert_eq!(a.union(&b), Span::new(0.0, 15.0));
    }
}
