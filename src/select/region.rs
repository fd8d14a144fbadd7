//! Capture regions and the `X,Y WxH` geometry format.
//!
//! A [`Region`] is a screen rectangle in absolute pixel coordinates with an
//! optional polygon mask (lasso selection).  The mask is kept in the same
//! absolute coordinate space as the rectangle, never relative to its origin.

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// RegionError
// ---------------------------------------------------------------------------

/// Validation failures when building a [`Region`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    /// Width or height was zero.
    #[error("region must have a non-zero width and height (got {width}x{height})")]
    Empty { width: u32, height: u32 },

    /// A polygon mask needs at least three points to enclose an area.
    #[error("polygon mask needs at least 3 points (got {0})")]
    TooFewPoints(usize),

    /// A geometry string could not be parsed as `X,Y WxH`.
    #[error("malformed geometry {0:?} (expected \"X,Y WxH\")")]
    Geometry(String),
}

// ---------------------------------------------------------------------------
// Point / Region
// ---------------------------------------------------------------------------

/// A single vertex of a polygon mask, in absolute screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A validated capture area.
///
/// Construct with [`Region::new`] for a plain rectangle or
/// [`Region::from_polygon`] for a lasso selection.  Both constructors
/// guarantee `width > 0` and `height > 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    polygon: Option<Vec<Point>>,
}

impl Region {
    /// Build a rectangular region.
    ///
    /// ```
    /// use screen_to_text::select::Region;
    ///
    /// let r = Region::new(10, 20, 300, 40).unwrap();
    /// assert_eq!(r.geometry(), "10,20 300x40");
    /// assert!(Region::new(0, 0, 0, 40).is_err());
    /// ```
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self, RegionError> {
        if width == 0 || height == 0 {
            return Err(RegionError::Empty { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
            polygon: None,
        })
    }

    /// Build a region from a lasso outline.
    ///
    /// The rectangle is the bounding box of `points`; the points themselves
    /// are retained as the mask.
    pub fn from_polygon(points: Vec<Point>) -> Result<Self, RegionError> {
        if points.len() < 3 {
            return Err(RegionError::TooFewPoints(points.len()));
        }

        let min_x = points.iter().map(|p| p.x).min().unwrap_or_default();
        let max_x = points.iter().map(|p| p.x).max().unwrap_or_default();
        let min_y = points.iter().map(|p| p.y).min().unwrap_or_default();
        let max_y = points.iter().map(|p| p.y).max().unwrap_or_default();

        let width = max_x.abs_diff(min_x);
        let height = max_y.abs_diff(min_y);

        let mut region = Self::new(min_x, min_y, width, height)?;
        region.polygon = Some(points);
        Ok(region)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The lasso mask, if this region came from a polygon selection.
    pub fn polygon(&self) -> Option<&[Point]> {
        self.polygon.as_deref()
    }

    /// Format as `X,Y WxH`, the form understood by `slurp` / `grim`.
    pub fn geometry(&self) -> String {
        format!("{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.geometry())?;
        if let Some(points) = &self.polygon {
            write!(f, " ({} point mask)", points.len())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// parse_geometry
// ---------------------------------------------------------------------------

/// Parse `X,Y WxH` into a rectangular [`Region`].
///
/// Surrounding whitespace (including the trailing newline a picker prints)
/// is ignored.
///
/// ```
/// use screen_to_text::select::parse_geometry;
///
/// let r = parse_geometry("-5,12 640x480\n").unwrap();
/// assert_eq!((r.x(), r.y(), r.width(), r.height()), (-5, 12, 640, 480));
/// assert!(parse_geometry("640x480").is_err());
/// ```
pub fn parse_geometry(input: &str) -> Result<Region, RegionError> {
    let trimmed = input.trim();
    let malformed = || RegionError::Geometry(trimmed.to_string());

    let (origin, size) = trimmed.split_once(' ').ok_or_else(malformed)?;
    let (x, y) = origin.split_once(',').ok_or_else(malformed)?;
    let (w, h) = size.trim().split_once('x').ok_or_else(malformed)?;

    let x: i32 = x.trim().parse().map_err(|_| malformed())?;
    let y: i32 = y.trim().parse().map_err(|_| malformed())?;
    let w: u32 = w.trim().parse().map_err(|_| malformed())?;
    let h: u32 = h.trim().parse().map_err(|_| malformed())?;

    Region::new(x, y, w, h)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_region_is_rejected() {
        assert_eq!(
            Region::new(0, 0, 0, 10),
            Err(RegionError::Empty {
                width: 0,
                height: 10
            })
        );
        assert!(Region::new(0, 0, 10, 0).is_err());
    }

    #[test]
    fn polygon_needs_three_points() {
        let err = Region::from_polygon(vec![Point::new(0, 0), Point::new(5, 5)]).unwrap_err();
        assert_eq!(err, RegionError::TooFewPoints(2));
    }

    #[test]
    fn polygon_bounding_box_is_absolute() {
        let points = vec![
            Point::new(100, 50),
            Point::new(180, 60),
            Point::new(120, 90),
        ];
        let region = Region::from_polygon(points.clone()).unwrap();

        assert_eq!(region.x(), 100);
        assert_eq!(region.y(), 50);
        assert_eq!(region.width(), 80);
        assert_eq!(region.height(), 40);
        assert_eq!(region.polygon(), Some(points.as_slice()));
    }

    #[test]
    fn collinear_polygon_is_empty() {
        let points = vec![Point::new(0, 5), Point::new(10, 5), Point::new(20, 5)];
        assert!(matches!(
            Region::from_polygon(points),
            Err(RegionError::Empty { height: 0, .. })
        ));
    }

    #[test]
    fn geometry_parses_picker_output() {
        let region = parse_geometry("12,34 56x78\n").unwrap();
        assert_eq!(region.geometry(), "12,34 56x78");
        assert!(region.polygon().is_none());
    }

    #[test]
    fn geometry_rejects_garbage() {
        for bad in ["", "12,34", "a,b cxd", "1,2 3x", "1,2 0x5"] {
            assert!(parse_geometry(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_mentions_mask() {
        let region = Region::from_polygon(vec![
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(0, 4),
        ])
        .unwrap();
        assert_eq!(region.to_string(), "0,0 4x4 (3 point mask)");
    }
}
