use nalgebra::Vector3;
use ord_subset::OrdSubsetIterExt;
use serde::{Deserialize, Serialize};

use crate::model::point::Point;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bounds {
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,
}

impl Bounds {
    pub fn new(lx: f64, ly: f64, lz: f64, ux: f64, uy: f64, uz: f64) -> Bounds {
        Bounds {
            lx,
            ly,
            lz,
            ux,
            uy,
            uz,
        }
    }

    pub fn min(&self) -> Vector3<f64> {
        Vector3::new(self.lx, self.ly, self.lz)
    }

    pub fn max(&self) -> Vector3<f64> {
        Vector3::new(self.ux, self.uy, self.uz)
    }

    pub fn center(&self) -> Vector3<f64> {
        (self.min() + self.max()) * 0.5
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max() - self.min()
    }

    /// Octant index bits select the upper half per axis: x << 2 | y << 1 | z.
    pub fn child_octant(&self, index: usize) -> Bounds {
        let center = self.center();
        let mut child = self.clone();

        if (index & 0b100) == 0 {
            child.ux = center.x;
        } else {
            child.lx = center.x;
        }

        if (index & 0b010) == 0 {
            child.uy = center.y;
        } else {
            child.ly = center.y;
        }

        if (index & 0b001) == 0 {
            child.uz = center.z;
        } else {
            child.lz = center.z;
        }

        child
    }
}

pub fn find_bounds<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Bounds> {
    let mut xs: Vec<f64> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    let mut zs: Vec<f64> = Vec::new();
    for point in points {
        xs.push(point.position.x);
        ys.push(point.position.y);
        zs.push(point.position.z);
    }

    Some(Bounds::new(
        *xs.iter().ord_subset_min()?,
        *ys.iter().ord_subset_min()?,
        *zs.iter().ord_subset_min()?,
        *xs.iter().ord_subset_max()?,
        *ys.iter().ord_subset_max()?,
        *zs.iter().ord_subset_max()?,
    ))
}
