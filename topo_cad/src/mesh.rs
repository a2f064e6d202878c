//! Surface meshes built from survey points.
//!
//! Three modes are supported: the plain Delaunay triangulation, a regular
//! mesh resampled through [`GridSampler`], and a concave mesh bounded by an
//! alpha shape and re-triangulated with boundary constraints.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::diagnostics::{Diagnostics, Fallback};
use crate::error::{GeoError, Result};
use crate::geometry::{orient2d, point_in_polygon, point_in_rings, signed_area, Point, Point3};
use crate::grid::{ElevationGrid, GridParams, GridSampler};
use crate::hull::{alpha_shape, boundary_edges, boundary_loops};
use crate::point_set::PointSet;
use crate::progress::Progress;
use crate::triangulation::Triangulation;

/// A mesh face. Vertices run counter-clockwise in plan view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Face {
    Tri([usize; 3]),
    Quad([usize; 4]),
}

impl Face {
    pub fn indices(&self) -> &[usize] {
        match self {
            Face::Tri(t) => t,
            Face::Quad(q) => q,
        }
    }

    /// Fan split into triangles.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        match *self {
            Face::Tri(t) => vec![t],
            Face::Quad([a, b, c, d]) => vec![[a, b, c], [a, c, d]],
        }
    }

    /// Edges in face order, closing back to the first vertex.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let idx = self.indices();
        (0..idx.len()).map(move |i| (idx[i], idx[(i + 1) % idx.len()]))
    }
}

/// Selector for the mesh construction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshKind {
    #[default]
    Delaunay,
    Grid,
    Concave,
}

/// Mesh mode together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MeshMode {
    #[default]
    Delaunay,
    Grid(GridParams),
    Concave { alpha: f64 },
}

impl MeshMode {
    pub fn kind(&self) -> MeshKind {
        match self {
            MeshMode::Delaunay => MeshKind::Delaunay,
            MeshMode::Grid(_) => MeshKind::Grid,
            MeshMode::Concave { .. } => MeshKind::Concave,
        }
    }
}

/// Parameters of [`MeshBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshParams {
    pub mode: MeshMode,
    /// Emit the boundary as a face-free edge list.
    pub boundary_edges: bool,
    /// In grid mode, split every quad into two triangles.
    pub quads_as_triangles: bool,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            mode: MeshMode::Delaunay,
            boundary_edges: true,
            quads_as_triangles: false,
        }
    }
}

impl MeshParams {
    pub fn new(mode: MeshMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.mode {
            MeshMode::Delaunay => Ok(()),
            MeshMode::Grid(grid) => grid.validate(),
            MeshMode::Concave { alpha } if alpha.is_finite() && alpha >= 0.0 => Ok(()),
            MeshMode::Concave { alpha } => Err(GeoError::config(format!(
                "alpha must be non-negative and finite, got {alpha}"
            ))),
        }
    }
}

/// Vertices and faces of a 2.5-D surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub faces: Vec<Face>,
    /// Directed boundary edges; empty when suppressed.
    pub boundary_edges: Vec<(usize, usize)>,
    /// Closed boundary loops of the faces, outer loops counter-clockwise.
    pub hull_loops: Vec<Vec<usize>>,
    pub crs: Crs,
    pub diagnostics: Diagnostics,
}

impl Mesh {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// All faces as triangles, quads split along their first diagonal.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        self.faces.iter().flat_map(Face::triangles).collect()
    }

    /// Deduplicated undirected edges in first-seen order, as drawn by a
    /// wireframe.
    pub fn unique_edges(&self) -> Vec<(usize, usize)> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for face in &self.faces {
            for (a, b) in face.edges() {
                let key = if a < b { (a, b) } else { (b, a) };
                if seen.insert(key) {
                    edges.push(key);
                }
            }
        }
        edges
    }

    /// Number of distinct vertices referenced by at least one face.
    pub fn used_vertices(&self) -> usize {
        self.faces
            .iter()
            .flat_map(|f| f.indices().iter().copied())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Plan-view area covered by the faces.
    pub fn area(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let ring: Vec<Point> = f.indices().iter().map(|&i| self.vertices[i].xy()).collect();
                signed_area(&ring).abs()
            })
            .sum()
    }

    /// Boundary loops as polygons; clockwise loops become holes of the
    /// counter-clockwise loop containing them.
    pub fn boundary_polygons(&self) -> geo_types::MultiPolygon<f64> {
        let rings: Vec<Vec<Point>> = self
            .hull_loops
            .iter()
            .map(|l| l.iter().map(|&i| self.vertices[i].xy()).collect())
            .collect();
        let to_line = |ring: &Vec<Point>| -> geo_types::LineString<f64> {
            ring.iter()
                .map(|p| geo_types::Coord { x: p.x, y: p.y })
                .collect::<Vec<_>>()
                .into()
        };
        let (outer, holes): (Vec<&Vec<Point>>, Vec<&Vec<Point>>) =
            rings.iter().partition(|r| signed_area(r) > 0.0);
        outer
            .into_iter()
            .map(|o| {
                let interiors = holes
                    .iter()
                    .filter(|h| h.first().is_some_and(|p| point_in_polygon(*p, o)))
                    .map(|&h| to_line(h))
                    .collect();
                geo_types::Polygon::new(to_line(o), interiors)
            })
            .collect::<Vec<_>>()
            .into()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    params: MeshParams,
}

impl MeshBuilder {
    pub fn new(params: MeshParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MeshParams {
        &self.params
    }

    pub fn build(&self, points: &PointSet, progress: &mut dyn Progress) -> Result<Mesh> {
        points.ensure_non_empty()?;
        self.params.validate()?;
        info!(
            "building {:?} mesh from {} points",
            self.params.mode.kind(),
            points.len()
        );
        let mut mesh = match self.params.mode {
            MeshMode::Delaunay => delaunay_mesh(points)?,
            MeshMode::Grid(grid) => {
                let grid = GridSampler::new(grid).sample(points, progress)?;
                grid_mesh(&grid, self.params.quads_as_triangles)?
            }
            MeshMode::Concave { alpha } => concave_mesh(points, alpha)?,
        };
        let triangles = mesh.triangles();
        if mesh.hull_loops.is_empty() {
            mesh.hull_loops = boundary_loops(&triangles);
        }
        if self.params.boundary_edges {
            mesh.boundary_edges = boundary_edges(&triangles);
        }
        progress.report("mesh", 1.0);
        info!(
            "mesh complete: {} vertices, {} faces, {} boundary edges",
            mesh.vertices.len(),
            mesh.faces.len(),
            mesh.boundary_edges.len()
        );
        Ok(mesh)
    }
}

fn base_mesh(points: &PointSet, faces: Vec<Face>) -> Mesh {
    Mesh {
        vertices: points.points().iter().map(|p| p.xyz()).collect(),
        faces,
        boundary_edges: Vec::new(),
        hull_loops: Vec::new(),
        crs: points.crs().clone(),
        diagnostics: points.diagnostics().clone(),
    }
}

fn triangulate(points: &PointSet, operation: &'static str) -> Result<(Vec<Point>, Triangulation)> {
    let xy: Vec<Point> = points.points().iter().map(|p| p.xy()).collect();
    let tri = Triangulation::delaunay(&xy).ok_or_else(|| {
        GeoError::insufficient(
            operation,
            format!(
                "need at least 3 non-collinear points, got {} point(s)",
                points.len()
            ),
        )
    })?;
    Ok((xy, tri))
}

fn delaunay_mesh(points: &PointSet) -> Result<Mesh> {
    let (_, tri) = triangulate(points, "delaunay mesh")?;
    debug!("delaunay: {} triangles", tri.triangles.len());
    Ok(base_mesh(
        points,
        tri.triangles.into_iter().map(Face::Tri).collect(),
    ))
}

/// One vertex per valid cell centre; one face per 2x2 block of valid cells.
fn grid_mesh(grid: &ElevationGrid, split: bool) -> Result<Mesh> {
    let mut index = vec![None; grid.rows * grid.cols];
    let mut vertices = Vec::with_capacity(grid.valid_count());
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            if let Some(z) = grid.get(row, col) {
                let c = grid.cell_center(row, col);
                index[row * grid.cols + col] = Some(vertices.len());
                vertices.push(Point3::new(c.x, c.y, z));
            }
        }
    }
    let at = |r: usize, c: usize| index[r * grid.cols + c];
    let mut faces = Vec::new();
    for r in 0..grid.rows.saturating_sub(1) {
        for c in 0..grid.cols.saturating_sub(1) {
            if let (Some(bl), Some(br), Some(tr), Some(tl)) =
                (at(r, c), at(r, c + 1), at(r + 1, c + 1), at(r + 1, c))
            {
                if split {
                    faces.push(Face::Tri([bl, br, tr]));
                    faces.push(Face::Tri([bl, tr, tl]));
                } else {
                    faces.push(Face::Quad([bl, br, tr, tl]));
                }
            }
        }
    }
    if faces.is_empty() {
        return Err(GeoError::insufficient(
            "grid mesh",
            format!(
                "{}x{} grid has no block of four valid samples",
                grid.rows, grid.cols
            ),
        ));
    }
    Ok(Mesh {
        vertices,
        faces,
        boundary_edges: Vec::new(),
        hull_loops: Vec::new(),
        crs: grid.crs.clone(),
        diagnostics: grid.diagnostics.clone(),
    })
}

fn concave_mesh(points: &PointSet, alpha: f64) -> Result<Mesh> {
    let (xy, tri) = triangulate(points, "concave mesh")?;
    let shape = alpha_shape(&xy, &tri, alpha);
    debug!(
        "alpha {}: kept {} of {} triangles in {} loops",
        alpha,
        shape.triangles.len(),
        tri.triangles.len(),
        shape.loops.len()
    );
    if shape.removed == 0 {
        let mut mesh = base_mesh(points, tri.triangles.into_iter().map(Face::Tri).collect());
        mesh.hull_loops = shape.loops;
        return Ok(mesh);
    }
    if shape.triangles.is_empty() {
        return Err(GeoError::insufficient(
            "concave mesh",
            format!("alpha {alpha} removes every triangle"),
        ));
    }

    let mut diagnostics = points.diagnostics().clone();
    let triangles = match constrained(&xy, &shape.loops) {
        Ok(tris) if !tris.is_empty() => tris,
        Ok(_) => {
            diagnostics.record(Fallback::UnconstrainedTriangulation {
                reason: "constrained triangulation left no face inside the boundary".into(),
            });
            shape.triangles
        }
        Err(reason) => {
            diagnostics.record(Fallback::UnconstrainedTriangulation { reason });
            shape.triangles
        }
    };
    let mut mesh = base_mesh(points, triangles.into_iter().map(Face::Tri).collect());
    mesh.hull_loops = shape.loops;
    mesh.diagnostics = diagnostics;
    Ok(mesh)
}

/// Constrained Delaunay triangulation with the loops as fixed edges, keeping
/// faces whose centroid lies inside the loops.
fn constrained(xy: &[Point], loops: &[Vec<usize>]) -> std::result::Result<Vec<[usize; 3]>, String> {
    // cdt rejects coincident points, so triangulate the distinct ones only.
    let mut first_at: HashMap<(u64, u64), usize> = HashMap::new();
    let mut remap = Vec::with_capacity(xy.len());
    let mut unique = Vec::new();
    for (i, p) in xy.iter().enumerate() {
        let slot = *first_at.entry((p.x.to_bits(), p.y.to_bits())).or_insert_with(|| {
            unique.push(i);
            unique.len() - 1
        });
        remap.push(slot);
    }
    let coords: Vec<(f64, f64)> = unique.iter().map(|&i| (xy[i].x, xy[i].y)).collect();
    let mut edges = Vec::new();
    for ring in loops {
        for i in 0..ring.len() {
            edges.push((remap[ring[i]], remap[ring[(i + 1) % ring.len()]]));
        }
    }
    let tris = cdt::triangulate_with_edges(&coords, &edges).map_err(|e| format!("{e:?}"))?;

    let rings: Vec<Vec<Point>> = loops
        .iter()
        .map(|l| l.iter().map(|&i| xy[i]).collect())
        .collect();
    Ok(tris
        .into_iter()
        .map(|(a, b, c)| [unique[a], unique[b], unique[c]])
        .filter(|t| {
            let (a, b, c) = (xy[t[0]], xy[t[1]], xy[t[2]]);
            let centroid = Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
            point_in_rings(centroid, &rings)
        })
        .map(|t| {
            if orient2d(xy[t[0]], xy[t[1]], xy[t[2]]) < 0.0 {
                [t[0], t[2], t[1]]
            } else {
                t
            }
        })
        .collect())
}
