//! Geometry primitives shared by the integrator and the tether solver.
//!
//! Coordinates are screen pixels: x grows to the right, y grows downward.

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    ///Value along the x-axis.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the difference `self - other`.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

///Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    ///Strict AABB intersection; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    ///Horizontal overlap after shrinking `self` by `inset` on both sides.
    pub fn overlaps_horizontally(&self, other: &Rect, inset: f32) -> bool {
        self.right() > other.x + inset && self.x < other.right() - inset
    }

    ///Point containment including the boundary.
    pub fn contains(&self, point: Vector2) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }
}

///Penetration depths of a body into a solid, one per side of the solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    ///Distance the body must move left to clear the solid.
    pub left: f32,
    ///Distance the body must move right to clear the solid.
    pub right: f32,
    ///Distance the body must move up to clear the solid.
    pub top: f32,
    ///Distance the body must move down to clear the solid.
    pub bottom: f32,
}

impl Overlap {
    ///Returns the overlap of `body` into `solid`, or `None` when they do not intersect.
    pub fn between(body: &Rect, solid: &Rect) -> Option<Overlap> {
        if !body.intersects(solid) {
            return None;
        }
        Some(Overlap {
            left: body.right() - solid.x,
            right: solid.right() - body.x,
            top: body.bottom() - solid.y,
            bottom: solid.bottom() - body.y,
        })
    }

    pub fn min_horizontal(&self) -> f32 {
        self.left.min(self.right)
    }

    pub fn min_vertical(&self) -> f32 {
        self.top.min(self.bottom)
    }

    ///Signed x displacement along the shallower horizontal side.
    pub fn push_x(&self) -> f32 {
        if self.left < self.right {
            -self.left
        } else {
            self.right
        }
    }

    ///Signed y displacement along the shallower vertical side.
    pub fn push_y(&self) -> f32 {
        if self.top < self.bottom {
            -self.top
        } else {
            self.bottom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vector_operations() {
        let v = Vector2::new(3.0, 4.0);
        assert_approx_eq!(v.magnitude(), 5.0);
        assert_eq!(v.sub(&Vector2::new(1.0, 1.0)), Vector2::new(2.0, 3.0));

        let half = v.scale(0.5);
        assert_approx_eq!(half.x, 1.5);
        assert_approx_eq!(half.y, 2.0);
    }

    #[test]
    fn test_rect_intersection_excludes_touching() {
        let a = Rect::new(0.0, 0.0, 64.0, 64.0);
        let b = Rect::new(64.0, 0.0, 64.0, 64.0);
        let c = Rect::new(63.0, 63.0, 64.0, 64.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn test_horizontal_overlap_with_inset() {
        let player = Rect::new(0.0, 0.0, 64.0, 64.0);
        let platform = Rect::new(61.0, 64.0, 64.0, 64.0);
        assert!(player.overlaps_horizontally(&platform, 0.0));
        assert!(!player.overlaps_horizontally(&platform, 4.0));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let goal = Rect::new(64.0, 64.0, 64.0, 64.0);
        assert!(goal.contains(Vector2::new(64.0, 128.0)));
        assert!(goal.contains(Vector2::new(96.0, 96.0)));
        assert!(!goal.contains(Vector2::new(128.1, 96.0)));
    }

    #[test]
    fn test_overlap_push_directions() {
        let solid = Rect::new(100.0, 100.0, 64.0, 64.0);

        // Body sunk 10px into the top of the solid
        let body = Rect::new(110.0, 46.0, 64.0, 64.0);
        let overlap = Overlap::between(&body, &solid).unwrap();
        assert_approx_eq!(overlap.top, 10.0);
        assert_approx_eq!(overlap.push_y(), -10.0);
        assert!(overlap.min_vertical() < overlap.min_horizontal());

        // Body poking 6px into the right side of the solid
        let body = Rect::new(158.0, 100.0, 64.0, 64.0);
        let overlap = Overlap::between(&body, &solid).unwrap();
        assert_approx_eq!(overlap.push_x(), 6.0);

        assert!(Overlap::between(&Rect::new(0.0, 0.0, 10.0, 10.0), &solid).is_none());
    }
}
