// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Geometry for rotated text boxes
//!
//! DB detection produces pixel regions; these helpers fit the minimum-area
//! rectangle around a region so slanted lines get a rotated quadrilateral.

use std::cmp::Ordering;

use super::engine::Quad;

pub type Point = [f32; 2];

/// A rectangle of arbitrary orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    /// Unit vector along the `width` side
    pub axis: Point,
    pub width: f32,
    pub height: f32,
}

impl RotatedRect {
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Grow every side outwards by `distance`
    pub fn expanded(&self, distance: f32) -> Self {
        Self {
            width: (self.width + 2.0 * distance).max(0.0),
            height: (self.height + 2.0 * distance).max(0.0),
            ..*self
        }
    }

    /// Corners ordered top-left, top-right, bottom-right, bottom-left
    pub fn corners(&self) -> Quad {
        let [cx, cy] = self.center;
        let [ux, uy] = self.axis;
        let (vx, vy) = (-uy, ux);
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);

        order_points([
            [cx - hw * ux - hh * vx, cy - hw * uy - hh * vy],
            [cx + hw * ux - hh * vx, cy + hw * uy - hh * vy],
            [cx + hw * ux + hh * vx, cy + hw * uy + hh * vy],
            [cx - hw * ux + hh * vx, cy - hw * uy + hh * vy],
        ])
    }
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn compare_points(a: &Point, b: &Point) -> Ordering {
    a[0].partial_cmp(&b[0])
        .unwrap_or(Ordering::Equal)
        .then_with(|| a[1].partial_cmp(&b[1]).unwrap_or(Ordering::Equal))
}

/// Convex hull (monotone chain), counter-clockwise in y-up terms
///
/// Collinear points are dropped. Fewer than three distinct points are
/// returned as-is.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(compare_points);
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Minimum-area enclosing rectangle (rotating calipers over the hull)
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    let hull = convex_hull(points);

    if hull.is_empty() {
        return None;
    }

    if hull.len() < 3 {
        // Point or segment: fall back to the axis-aligned extent
        let (min_x, max_x) = hull
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        let (min_y, max_y) = hull
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p[1]), hi.max(p[1])));
        return Some(RotatedRect {
            center: [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0],
            axis: [1.0, 0.0],
            width: max_x - min_x,
            height: max_y - min_y,
        });
    }

    let mut best: Option<(f32, RotatedRect)> = None;

    for i in 0..hull.len() {
        let origin = hull[i];
        let next = hull[(i + 1) % hull.len()];
        let (ex, ey) = (next[0] - origin[0], next[1] - origin[1]);
        let length = (ex * ex + ey * ey).sqrt();
        if length < f32::EPSILON {
            continue;
        }

        let (ux, uy) = (ex / length, ey / length);
        let (vx, vy) = (-uy, ux);

        let mut min_u = f32::INFINITY;
        let mut max_u = f32::NEG_INFINITY;
        let mut min_v = f32::INFINITY;
        let mut max_v = f32::NEG_INFINITY;
        for p in &hull {
            let (dx, dy) = (p[0] - origin[0], p[1] - origin[1]);
            let u = dx * ux + dy * uy;
            let v = dx * vx + dy * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;

        if best.as_ref().is_some_and(|(best_area, _)| area >= *best_area) {
            continue;
        }

        let mid_u = (min_u + max_u) / 2.0;
        let mid_v = (min_v + max_v) / 2.0;
        best = Some((
            area,
            RotatedRect {
                center: [
                    origin[0] + mid_u * ux + mid_v * vx,
                    origin[1] + mid_u * uy + mid_v * vy,
                ],
                axis: [ux, uy],
                width,
                height,
            },
        ));
    }

    best.map(|(_, rect)| rect)
}

/// Order four corners top-left, top-right, bottom-right, bottom-left
///
/// The two leftmost points form the left side and the upper one of each
/// side comes first.
pub fn order_points(mut points: Quad) -> Quad {
    points.sort_by(compare_points);

    let (top_left, bottom_left) = if points[0][1] <= points[1][1] {
        (points[0], points[1])
    } else {
        (points[1], points[0])
    };
    let (top_right, bottom_right) = if points[2][1] <= points[3][1] {
        (points[2], points[3])
    } else {
        (points[3], points[2])
    };

    [top_left, top_right, bottom_right, bottom_left]
}

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}
