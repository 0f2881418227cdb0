use crate::cross_section::escape_map;
use fractal4d_core::{EscapeFunction, Plane4, Quat};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A sampling configuration whose mask can never accept a draw. Workers
/// retry rejected draws without consuming budget, so such a space would
/// spin forever; it is refused at construction instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleSpaceError {
    #[error("exterior sampling mask covers the whole plane; every draw would be rejected")]
    FullMask,
    #[error("interior sampling mask is empty; every draw would be rejected")]
    EmptyMask,
}

/// How candidate trajectories are filtered.
///
/// Exterior keeps the density of trajectories that never escape the deep
/// iteration budget, Interior keeps the complementary thin shell of early
/// escapees, All keeps every trajectory. The tag lives on the sample space
/// because the importance mask must be built to match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMethod {
    Exterior,
    Interior,
    All,
}

/// An axis-aligned 4D box spanned by two opposite corner quaternions.
/// Draws are independently uniform per axis; a collapsed axis (min == max)
/// deterministically yields the fixed coordinate.
#[derive(Debug, Clone)]
pub struct CubeSpace {
    vertex1: Quat,
    vertex2: Quat,
    bounds: [(f64, f64); 4],
}

impl CubeSpace {
    pub fn new(vertex1: Quat, vertex2: Quat) -> Self {
        let mut cube = Self {
            vertex1,
            vertex2,
            bounds: [(0.0, 0.0); 4],
        };
        cube.update_bounds();
        cube
    }

    fn update_bounds(&mut self) {
        let v1 = [self.vertex1.q0, self.vertex1.q1, self.vertex1.q2, self.vertex1.q3];
        let v2 = [self.vertex2.q0, self.vertex2.q1, self.vertex2.q2, self.vertex2.q3];
        for axis in 0..4 {
            self.bounds[axis] = (v1[axis].min(v2[axis]), v1[axis].max(v2[axis]));
        }
    }

    pub fn vertex1(&self) -> Quat {
        self.vertex1
    }

    pub fn vertex2(&self) -> Quat {
        self.vertex2
    }

    pub fn set_vertex1(&mut self, vertex: Quat) {
        self.vertex1 = vertex;
        self.update_bounds();
    }

    pub fn set_vertex2(&mut self, vertex: Quat) {
        self.vertex2 = vertex;
        self.update_bounds();
    }

    pub fn center(&self) -> Quat {
        (self.vertex1 + self.vertex2) * 0.5
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> Quat {
        let mut coords = [0.0; 4];
        for (coord, &(min, max)) in coords.iter_mut().zip(&self.bounds) {
            *coord = if min < max { rng.gen_range(min..max) } else { min };
        }
        Quat::new(coords[0], coords[1], coords[2], coords[3])
    }
}

/// A 2D sampling plane restricted by an importance mask.
///
/// Construction renders one escape map of the plane at a modest iteration
/// budget and then erodes it (Exterior) or dilates it (Interior) by one
/// morphological step. Building it costs a full low-resolution render, so
/// instances are reused until the function, bailout or method changes.
///
/// A draw landing on the wrong side of the mask is not an error: it yields
/// `None` and the caller simply tries again on its next loop iteration.
/// A mask that would reject every draw is refused by the constructor.
#[derive(Debug, Clone)]
pub struct MaskedPlaneSpace {
    method: SamplingMethod,
    plane: Plane4,
    width: u32,
    height: u32,
    /// Interior estimate; empty when the method is All.
    mask: Vec<bool>,
}

impl MaskedPlaneSpace {
    pub fn new(
        method: SamplingMethod,
        function: EscapeFunction,
        plane: Plane4,
        width: u32,
        height: u32,
        mask_iter: u32,
        bailout: f64,
    ) -> Result<Self, SampleSpaceError> {
        let mask = match method {
            SamplingMethod::Exterior => erode(
                &escape_map(function, &plane, width, height, mask_iter, bailout),
                width,
                height,
            ),
            SamplingMethod::Interior => dilate(
                &escape_map(function, &plane, width, height, mask_iter, bailout),
                width,
                height,
            ),
            SamplingMethod::All => Vec::new(),
        };
        match method {
            SamplingMethod::Exterior if mask.iter().all(|&m| m) => {
                return Err(SampleSpaceError::FullMask)
            }
            SamplingMethod::Interior if !mask.iter().any(|&m| m) => {
                return Err(SampleSpaceError::EmptyMask)
            }
            _ => {}
        }
        Ok(Self {
            method,
            plane,
            width,
            height,
            mask,
        })
    }

    pub fn method(&self) -> SamplingMethod {
        self.method
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> Option<Quat> {
        let x = rng.gen_range(0.0..self.width as f64);
        let y = rng.gen_range(0.0..self.height as f64);

        let masked = || self.mask[(x as u32 + y as u32 * self.width) as usize];
        match self.method {
            SamplingMethod::Exterior if masked() => return None,
            SamplingMethod::Interior if !masked() => return None,
            _ => {}
        }
        Some(self.plane.point_at_pixel(x, y, self.width, self.height))
    }

    #[cfg(test)]
    fn mask_at(&self, x: u32, y: u32) -> bool {
        self.mask[(x + y * self.width) as usize]
    }
}

/// Erosion by one step: a pixel stays set only if it and all 8 neighbors
/// are set. Border pixels are cleared.
fn erode(map: &[bool], width: u32, height: u32) -> Vec<bool> {
    morph(map, width, height, true)
}

/// Dilation by one step: a pixel is set if it or any of its 8 neighbors is
/// set. Border pixels are cleared.
fn dilate(map: &[bool], width: u32, height: u32) -> Vec<bool> {
    morph(map, width, height, false)
}

fn morph(map: &[bool], width: u32, height: u32, all: bool) -> Vec<bool> {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![false; w * h];
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let mut acc = all;
            for dy in 0..3 {
                for dx in 0..3 {
                    let v = map[(x + dx - 1) + (y + dy - 1) * w];
                    acc = if all { acc && v } else { acc || v };
                }
            }
            out[x + y * w] = acc;
        }
    }
    out
}

/// The closed set of sample sources the engine draws from.
#[derive(Debug, Clone)]
pub enum SampleSpace {
    Cube(CubeSpace),
    Plane(MaskedPlaneSpace),
}

impl SampleSpace {
    pub fn method(&self) -> SamplingMethod {
        match self {
            // A bare cube has no mask to filter against.
            Self::Cube(_) => SamplingMethod::All,
            Self::Plane(p) => p.method(),
        }
    }

    /// Draws a candidate 4D point, or `None` when the draw fell in the
    /// masked-out region.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Option<Quat> {
        match self {
            Self::Cube(cube) => Some(cube.draw(rng)),
            Self::Plane(plane) => plane.draw(rng),
        }
    }
}
