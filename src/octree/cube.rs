use ultraviolet::DVec3;

/// Axis-aligned cube given by its center and edge length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cube {
    pub center: DVec3,
    pub size: f64,
}

impl Cube {
    pub fn new(center: DVec3, size: f64) -> Self {
        Self { center, size }
    }

    /// Smallest cube around the box `min..max`, sharing its center.
    pub fn new_containing(min: DVec3, max: DVec3) -> Self {
        let center = (min + max) * 0.5;
        let extent = max - min;
        let size = extent.x.max(extent.y).max(extent.z);
        if size > 0.0 && size.is_finite() {
            Self { center, size }
        } else {
            Self { center, size: 1.0 }
        }
    }

    pub fn min(&self) -> DVec3 {
        self.center - DVec3::broadcast(self.size * 0.5)
    }

    pub fn max(&self) -> DVec3 {
        self.center + DVec3::broadcast(self.size * 0.5)
    }

    /// Closed-interval containment.
    pub fn contains(&self, p: DVec3) -> bool {
        let half = self.size * 0.5;
        let d = p - self.center;
        d.x.abs() <= half && d.y.abs() <= half && d.z.abs() <= half
    }

    /// Octant of `p`, one bit per axis: x -> 1, y -> 2, z -> 4.
    pub fn octant(&self, p: DVec3) -> usize {
        ((p.x >= self.center.x) as usize)
            | ((p.y >= self.center.y) as usize) << 1
            | ((p.z >= self.center.z) as usize) << 2
    }

    pub fn into_octant(mut self, octant: usize) -> Self {
        self.size *= 0.5;
        self.center.x += ((octant & 1) as f64 - 0.5) * self.size;
        self.center.y += (((octant >> 1) & 1) as f64 - 0.5) * self.size;
        self.center.z += (((octant >> 2) & 1) as f64 - 0.5) * self.size;
        self
    }

    pub fn subdivide(&self) -> [Cube; 8] {
        [0, 1, 2, 3, 4, 5, 6, 7].map(|i| self.into_octant(i))
    }

    /// Twice-as-large cube that has `self` as one octant and extends towards `p`.
    /// Returns the parent together with the octant `self` occupies in it.
    pub fn grow_towards(&self, p: DVec3) -> (Cube, usize) {
        let half = self.size * 0.5;
        let mut center = self.center;
        let mut octant = 0;
        for axis in 0..3 {
            let (c, target) = match axis {
                0 => (&mut center.x, p.x),
                1 => (&mut center.y, p.y),
                _ => (&mut center.z, p.z),
            };
            if target < *c - half {
                *c -= half;
                octant |= 1 << axis;
            } else {
                *c += half;
            }
        }
        (Cube::new(center, self.size * 2.0), octant)
    }
}
