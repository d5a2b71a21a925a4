#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Linear blend towards `other`, `t` in `0..=1`.
    pub fn mix(self, other: Rgba, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Self {
            r: lerp(self.r, other.r),
            g: lerp(self.g, other.g),
            b: lerp(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSeg {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// Drawing target for the visualizer. Coordinates are in pixels with the
/// origin at the top-left corner.
pub trait Surface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn clear(&mut self, color: Rgba);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba);
    fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba);
    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba);
    fn stroke_circle(&mut self, center: Point, radius: f32, width: f32, color: Rgba);
    fn stroke_polyline(&mut self, points: &[Point], width: f32, color: Rgba);
    fn fill_path(&mut self, path: &[PathSeg], color: Rgba);
}

const CURVE_SEGMENTS: usize = 12;

/// Software RGBA raster, resized to whatever the host gives it.
#[derive(Debug, Clone, Default)]
pub struct PixelBuffer {
    w: usize,
    h: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(w: usize, h: usize) -> Self {
        let mut buffer = Self::default();
        buffer.resize(w, h);
        buffer
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        if self.w == w && self.h == h {
            return;
        }
        self.w = w;
        self.h = h;
        self.data.clear();
        self.data.resize(w.saturating_mul(h).saturating_mul(4), 0);
    }

    pub fn size(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.w || y >= self.h {
            return None;
        }
        let offset = (y * self.w + x) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn blend(&mut self, x: usize, y: usize, color: Rgba) {
        let offset = (y * self.w + x) * 4;
        let Some(px) = self.data.get_mut(offset..offset + 4) else {
            return;
        };
        let a = color.a.clamp(0.0, 1.0);
        let mix = |dst: u8, src: u8| (f32::from(dst) * (1.0 - a) + f32::from(src) * a).round() as u8;
        px[0] = mix(px[0], color.r);
        px[1] = mix(px[1], color.g);
        px[2] = mix(px[2], color.b);
        px[3] = 255;
    }

    /// Blends `color` into every pixel whose centre satisfies `inside`,
    /// scanning only the clipped box `min..max`.
    fn fill_mask(&mut self, min: Point, max: Point, color: Rgba, inside: impl Fn(f32, f32) -> bool) {
        if color.a <= 0.0 || self.w == 0 || self.h == 0 {
            return;
        }
        let x0 = clip(min.x.floor(), self.w);
        let x1 = clip(max.x.ceil(), self.w);
        let y0 = clip(min.y.floor(), self.h);
        let y1 = clip(max.y.ceil(), self.h);
        for y in y0..y1 {
            let cy = y as f32 + 0.5;
            for x in x0..x1 {
                if inside(x as f32 + 0.5, cy) {
                    self.blend(x, y, color);
                }
            }
        }
    }
}

fn clip(value: f32, limit: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value as usize).min(limit)
    }
}

impl Surface for PixelBuffer {
    fn width(&self) -> f32 {
        self.w as f32
    }

    fn height(&self) -> f32 {
        self.h as f32
    }

    fn clear(&mut self, color: Rgba) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        let (x1, y1) = (x + w, y + h);
        self.fill_mask(Point::new(x, y), Point::new(x1, y1), color, |px, py| {
            px >= x && px < x1 && py >= y && py < y1
        });
    }

    fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let r = radius.clamp(0.0, w.min(h) / 2.0);
        let (cx, cy) = (x + w / 2.0, y + h / 2.0);
        let (hx, hy) = (w / 2.0 - r, h / 2.0 - r);
        self.fill_mask(Point::new(x, y), Point::new(x + w, y + h), color, |px, py| {
            let qx = ((px - cx).abs() - hx).max(0.0);
            let qy = ((py - cy).abs() - hy).max(0.0);
            (px - cx).abs() <= w / 2.0 && (py - cy).abs() <= h / 2.0 && qx * qx + qy * qy <= r * r
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba) {
        let min = Point::new(center.x - radius, center.y - radius);
        let max = Point::new(center.x + radius, center.y + radius);
        self.fill_mask(min, max, color, |px, py| {
            let (dx, dy) = (px - center.x, py - center.y);
            dx * dx + dy * dy <= radius * radius
        });
    }

    fn stroke_circle(&mut self, center: Point, radius: f32, width: f32, color: Rgba) {
        let half = (width / 2.0).max(0.5);
        let outer = radius + half;
        let min = Point::new(center.x - outer, center.y - outer);
        let max = Point::new(center.x + outer, center.y + outer);
        self.fill_mask(min, max, color, |px, py| {
            let distance = ((px - center.x).powi(2) + (py - center.y).powi(2)).sqrt();
            (distance - radius).abs() <= half
        });
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f32, color: Rgba) {
        if points.is_empty() {
            return;
        }
        let half = (width / 2.0).max(0.5);
        let (mut min, mut max) = (points[0], points[0]);
        for point in points {
            min = Point::new(min.x.min(point.x), min.y.min(point.y));
            max = Point::new(max.x.max(point.x), max.y.max(point.y));
        }
        let min = Point::new(min.x - half, min.y - half);
        let max = Point::new(max.x + half, max.y + half);

        // One mask over the whole line so joints are not blended twice.
        self.fill_mask(min, max, color, |px, py| {
            let p = Point::new(px, py);
            if points.len() == 1 {
                return distance_to_segment(p, points[0], points[0]) <= half;
            }
            points
                .windows(2)
                .any(|pair| distance_to_segment(p, pair[0], pair[1]) <= half)
        });
    }

    fn fill_path(&mut self, path: &[PathSeg], color: Rgba) {
        let polygons = flatten(path);
        let Some(first) = polygons.iter().flatten().next().copied() else {
            return;
        };
        let (mut min, mut max) = (first, first);
        for point in polygons.iter().flatten() {
            min = Point::new(min.x.min(point.x), min.y.min(point.y));
            max = Point::new(max.x.max(point.x), max.y.max(point.y));
        }
        self.fill_mask(min, max, color, |px, py| {
            even_odd_contains(&polygons, Point::new(px, py))
        });
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (abx, aby) = (b.x - a.x, b.y - a.y);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let closest = a.lerp(b, t);
    ((p.x - closest.x).powi(2) + (p.y - closest.y).powi(2)).sqrt()
}

/// Flattens curves into closed polygons, one per sub-path.
fn flatten(path: &[PathSeg]) -> Vec<Vec<Point>> {
    let mut polygons = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut pen = Point::new(0.0, 0.0);

    for segment in path {
        match *segment {
            PathSeg::MoveTo(to) => {
                if current.len() > 2 {
                    polygons.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(to);
                pen = to;
            }
            PathSeg::LineTo(to) => {
                current.push(to);
                pen = to;
            }
            PathSeg::QuadTo(control, to) => {
                for step in 1..=CURVE_SEGMENTS {
                    let t = step as f32 / CURVE_SEGMENTS as f32;
                    current.push(pen.lerp(control, t).lerp(control.lerp(to, t), t));
                }
                pen = to;
            }
            PathSeg::CubicTo(c1, c2, to) => {
                for step in 1..=CURVE_SEGMENTS {
                    let t = step as f32 / CURVE_SEGMENTS as f32;
                    let a = pen.lerp(c1, t);
                    let b = c1.lerp(c2, t);
                    let c = c2.lerp(to, t);
                    current.push(a.lerp(b, t).lerp(b.lerp(c, t), t));
                }
                pen = to;
            }
            PathSeg::Close => {
                if current.len() > 2 {
                    polygons.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
    }
    if current.len() > 2 {
        polygons.push(current);
    }
    polygons
}

fn even_odd_contains(polygons: &[Vec<Point>], p: Point) -> bool {
    let mut inside = false;
    for polygon in polygons {
        let mut j = polygon.len() - 1;
        for i in 0..polygon.len() {
            let (a, b) = (polygon[i], polygon[j]);
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Clear,
    Rect,
    RoundedRect,
    Circle,
    Ring,
    Polyline,
    Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawOp {
    pub kind: DrawKind,
    pub color: Rgba,
}

/// Surface that only records what was asked of it.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    w: f32,
    h: f32,
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(w: f32, h: f32) -> Self {
        Self {
            w,
            h,
            ops: Vec::new(),
        }
    }

    pub fn count(&self, kind: DrawKind) -> usize {
        self.ops.iter().filter(|op| op.kind == kind).count()
    }

    fn record(&mut self, kind: DrawKind, color: Rgba) {
        self.ops.push(DrawOp { kind, color });
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> f32 {
        self.w
    }

    fn height(&self) -> f32 {
        self.h
    }

    fn clear(&mut self, color: Rgba) {
        self.ops.clear();
        self.record(DrawKind::Clear, color);
    }

    fn fill_rect(&mut self, _x: f32, _y: f32, _w: f32, _h: f32, color: Rgba) {
        self.record(DrawKind::Rect, color);
    }

    fn fill_rounded_rect(&mut self, _x: f32, _y: f32, _w: f32, _h: f32, _radius: f32, color: Rgba) {
        self.record(DrawKind::RoundedRect, color);
    }

    fn fill_circle(&mut self, _center: Point, _radius: f32, color: Rgba) {
        self.record(DrawKind::Circle, color);
    }

    fn stroke_circle(&mut self, _center: Point, _radius: f32, _width: f32, color: Rgba) {
        self.record(DrawKind::Ring, color);
    }

    fn stroke_polyline(&mut self, _points: &[Point], _width: f32, color: Rgba) {
        self.record(DrawKind::Polyline, color);
    }

    fn fill_path(&mut self, _path: &[PathSeg], color: Rgba) {
        self.record(DrawKind::Path, color);
    }
}
