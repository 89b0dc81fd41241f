//! Quadric error metrics
//!
//! A quadric stores the symmetric form `vᵀAv + 2bᵀv + c` summing squared distances of `v` to a set of planes.
//! Quadrics of merged vertices are added up as-is; there is no weight normalization, so the error of a vertex
//! grows with the area it represents.

use crate::Vector3;

use std::ops::AddAssign;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quadric {
    a00: f32,
    a11: f32,
    a22: f32,
    a10: f32,
    a20: f32,
    a21: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    c: f32,
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, other: Self) {
        self.a00 += other.a00;
        self.a11 += other.a11;
        self.a22 += other.a22;
        self.a10 += other.a10;
        self.a20 += other.a20;
        self.a21 += other.a21;
        self.b0 += other.b0;
        self.b1 += other.b1;
        self.b2 += other.b2;
        self.c += other.c;
    }
}

impl Quadric {
    /// Squared distance to the plane `ax + by + cz + d = 0`, scaled by `w`.
    ///
    /// The plane normal is expected to be unit length.
    pub fn from_plane(a: f32, b: f32, c: f32, d: f32, w: f32) -> Self {
        let aw = a * w;
        let bw = b * w;
        let cw = c * w;
        let dw = d * w;

        Self {
            a00: a * aw,
            a11: b * bw,
            a22: c * cw,
            a10: a * bw,
            a20: a * cw,
            a21: b * cw,
            b0: a * dw,
            b1: b * dw,
            b2: c * dw,
            c: d * dw,
        }
    }

    /// Plane quadric of a triangle, weighted by its area.
    ///
    /// Degenerate triangles produce an all-zero quadric.
    pub fn from_triangle(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3]) -> Self {
        let p0 = Vector3::from(p0);
        let p10 = Vector3::from(p1) - p0;
        let p20 = Vector3::from(p2) - p0;

        let mut normal = p10.cross(&p20);
        let area = normal.normalize() * 0.5;

        let distance = normal.dot(&p0);

        Self::from_plane(normal.x, normal.y, normal.z, -distance, area)
    }

    /// Evaluates the quadric at `p`.
    pub fn error(&self, p: [f32; 3]) -> f32 {
        let v = Vector3::from(p);

        let mut rx = self.b0;
        let mut ry = self.b1;
        let mut rz = self.b2;

        rx += self.a10 * v.y;
        ry += self.a21 * v.z;
        rz += self.a20 * v.x;

        rx *= 2.0;
        ry *= 2.0;
        rz *= 2.0;

        rx += self.a00 * v.x;
        ry += self.a11 * v.y;
        rz += self.a22 * v.z;

        let mut r = self.c;
        r += rx * v.x;
        r += ry * v.y;
        r += rz * v.z;

        r.abs()
    }

    fn mul_a(&self, v: &Vector3) -> Vector3 {
        Vector3::new(
            self.a00 * v.x + self.a10 * v.y + self.a20 * v.z,
            self.a10 * v.x + self.a11 * v.y + self.a21 * v.z,
            self.a20 * v.x + self.a21 * v.y + self.a22 * v.z,
        )
    }

    // Parameter along p0 + t * d minimizing the quadric, clamped to the segment.
    // Returns `None` when the quadric is flat along the edge.
    fn minimize_along(&self, p0: &Vector3, d: &Vector3) -> Option<f32> {
        let ad = self.mul_a(d);

        let h = ad.dot(d);
        let scale = (self.a00 + self.a11 + self.a22) * d.length_squared();

        if h <= scale * 1e-6 {
            return None;
        }

        let b = Vector3::new(self.b0, self.b1, self.b2);
        let g = 2.0 * (self.mul_a(p0) + b).dot(d);

        Some((-g / (2.0 * h)).clamp(0.0, 1.0))
    }
}

/// Accumulates the area weighted plane quadric of every triangle onto its three vertices.
pub fn compute_quadrics(positions: &[[f32; 3]], indices: &[u32]) -> Vec<Quadric> {
    let mut quadrics = vec![Quadric::default(); positions.len()];

    for i in indices.chunks_exact(3) {
        let (i0, i1, i2) = (i[0] as usize, i[1] as usize, i[2] as usize);

        let q = Quadric::from_triangle(positions[i0], positions[i1], positions[i2]);

        quadrics[i0] += q;
        quadrics[i1] += q;
        quadrics[i2] += q;
    }

    quadrics
}

/// Cost of collapsing an edge and where the merged vertex goes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollapseCost {
    pub error: f32,
    /// 0 keeps the origin in place, 1 moves it onto the destination
    pub pos: f32,
}

/// Evaluates the collapse of the edge `vert[0] -> vert[1]`.
///
/// The merged vertex is placed where the summed quadric is smallest along the edge, or at the midpoint when the
/// quadric doesn't constrain that direction. `tex_counts` holds the number of distinct texture coordinates around
/// each endpoint: an endpoint on more UV fans than the other stays put, so seams don't get dragged across the
/// surface.
pub fn calculate_error(
    vert: [u32; 2],
    positions: &[[f32; 3]],
    quadrics: &[Quadric],
    tex_counts: [usize; 2],
) -> CollapseCost {
    let [v0, v1] = vert;

    let mut q = quadrics[v0 as usize];
    q += quadrics[v1 as usize];

    let p0 = Vector3::from(positions[v0 as usize]);
    let p1 = Vector3::from(positions[v1 as usize]);
    let d = p1 - p0;

    let pos = if tex_counts[0] > tex_counts[1] {
        0.0
    } else if tex_counts[0] < tex_counts[1] {
        1.0
    } else {
        q.minimize_along(&p0, &d).unwrap_or(0.5)
    };

    let p = p0 + d * pos;

    CollapseCost {
        error: q.error(p.into()),
        pos,
    }
}
