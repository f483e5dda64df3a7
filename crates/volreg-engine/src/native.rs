//! NIfTI-backed implementation of the volume-utility ports.
//!
//! Header probing, orientation surgery, mask algebra and image statistics
//! operate directly on NIfTI files through the `nifti` + `ndarray` stack.
//! Geometry is derived from the sform rows when present, falling back to
//! pixdim scaling.

use crate::error::{EngineError, Result};
use crate::traits::{ImageStats, IntensityStats, MaskOps, OverlapStats, VolumeOps, WarpStats};
use nalgebra::{Matrix3, Matrix4};
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use volreg_core::{ContentKind, FrameCode, OrientationCode, Volume, VolumeGeometry};

/// Volume utilities working on NIfTI files in place on disk.
#[derive(Debug, Clone, Default)]
pub struct NiftiVolumes;

impl NiftiVolumes {
    pub fn new() -> Self {
        Self
    }
}

fn read_object(path: &Path) -> Result<nifti::InMemNiftiObject> {
    ReaderOptions::new()
        .read_file(path)
        .map_err(|e| EngineError::format(path, e.to_string()))
}

pub(crate) fn read_header(path: &Path) -> Result<NiftiHeader> {
    Ok(read_object(path)?.header().clone())
}

pub(crate) fn read_array(path: &Path) -> Result<Array3<f32>> {
    let data = read_dyn(path)?;
    data.into_dimensionality::<Ix3>()
        .map_err(|e| EngineError::format(path, format!("expected 3-D volume: {}", e)))
}

pub(crate) fn read_dyn(path: &Path) -> Result<ArrayD<f32>> {
    let obj = read_object(path)?;
    obj.into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| EngineError::format(path, e.to_string()))
}

/// Write an array with an explicit header.
pub fn write_volume(path: &Path, array: &Array3<f32>, header: &NiftiHeader) -> Result<()> {
    nifti::writer::WriterOptions::new(path)
        .reference_header(header)
        .write_nifti(array)
        .map_err(|e| EngineError::format(path, e.to_string()))
}

/// Voxel-to-physical affine from a header: sform rows when set, otherwise
/// pixdim scaling alone.
fn affine_from_header(header: &NiftiHeader) -> Matrix4<f64> {
    let mut affine = Matrix4::identity();
    if header.sform_code > 0 {
        for (r, row) in [header.srow_x, header.srow_y, header.srow_z]
            .iter()
            .enumerate()
        {
            for c in 0..4 {
                affine[(r, c)] = row[c] as f64;
            }
        }
    } else {
        for i in 0..3 {
            let p = header.pixdim[i + 1] as f64;
            affine[(i, i)] = if p.abs() > 1e-9 { p } else { 1.0 };
        }
    }
    affine
}

fn geometry_from_header(header: &NiftiHeader) -> VolumeGeometry {
    let affine = affine_from_header(header);
    let mut spacing = [1.0f64; 3];
    let mut direction = Matrix3::identity();
    for c in 0..3 {
        let col = affine.fixed_view::<3, 1>(0, c).into_owned();
        let norm = col.norm();
        spacing[c] = if norm > 1e-9 {
            norm
        } else {
            let p = header.pixdim[c + 1].abs() as f64;
            if p > 1e-9 {
                p
            } else {
                1.0
            }
        };
        let unit = if norm > 1e-9 { col / norm } else { col };
        for r in 0..3 {
            direction[(r, c)] = if norm > 1e-9 {
                unit[r]
            } else if r == c {
                1.0
            } else {
                0.0
            };
        }
    }
    VolumeGeometry {
        dims: [
            header.dim[1] as usize,
            header.dim[2] as usize,
            header.dim[3] as usize,
        ],
        spacing,
        orientation: OrientationCode::from_direction(&direction),
        qform: FrameCode::from_code(header.qform_code),
        sform: FrameCode::from_code(header.sform_code),
    }
}

fn write_affine_to_header(header: &mut NiftiHeader, affine: &Matrix4<f64>, spacing: &[f64; 3]) {
    for c in 0..4 {
        header.srow_x[c] = affine[(0, c)] as f32;
        header.srow_y[c] = affine[(1, c)] as f32;
        header.srow_z[c] = affine[(2, c)] as f32;
    }
    for i in 0..3 {
        header.pixdim[i + 1] = spacing[i] as f32;
    }
    if header.sform_code <= 0 {
        header.sform_code = header.qform_code.max(1);
    }
}

impl VolumeOps for NiftiVolumes {
    fn probe(&self, path: &Path, kind: ContentKind) -> Result<Volume> {
        if !path.is_file() {
            return Err(EngineError::output_missing(path));
        }
        let header = read_header(path)?;
        Ok(Volume::new(path, geometry_from_header(&header), kind))
    }

    fn reorient(&self, volume: &Volume, target: OrientationCode, output: &Path) -> Result<Volume> {
        let current = volume.geometry().orientation;
        let remap = current.remap_to(&target);
        if remap.is_identity() {
            fs::copy(volume.path(), output)?;
            return Ok(volume.relocated(output));
        }

        let mut header = read_header(volume.path())?;
        let array = read_array(volume.path())?;
        let old_dims = volume.geometry().dims;
        let old_spacing = volume.geometry().spacing;

        let mut permuted = array.permuted_axes(remap.order);
        for (j, &flip) in remap.flip.iter().enumerate() {
            if flip {
                permuted.invert_axis(Axis(j));
            }
        }
        let reordered = permuted.as_standard_layout().to_owned();

        // Index transform from new voxel coordinates to old ones, so the
        // physical mapping stays fixed while storage order changes.
        let affine = affine_from_header(&header);
        let mut index_map = Matrix4::zeros();
        index_map[(3, 3)] = 1.0;
        for j in 0..3 {
            let i = remap.order[j];
            if remap.flip[j] {
                index_map[(i, j)] = -1.0;
                index_map[(i, 3)] = (old_dims[i] as f64) - 1.0;
            } else {
                index_map[(i, j)] = 1.0;
            }
        }
        let new_affine = affine * index_map;

        let mut dims = [0usize; 3];
        let mut spacing = [0.0f64; 3];
        for j in 0..3 {
            dims[j] = old_dims[remap.order[j]];
            spacing[j] = old_spacing[remap.order[j]];
        }
        write_affine_to_header(&mut header, &new_affine, &spacing);
        write_volume(output, &reordered, &header)?;

        let geometry = VolumeGeometry {
            dims,
            spacing,
            orientation: target,
            qform: volume.geometry().qform,
            sform: FrameCode::from_code(header.sform_code),
        };
        Ok(Volume::new(output, geometry, volume.kind()))
    }

    fn flip_handedness(&self, volume: &Volume, output: &Path) -> Result<Volume> {
        let target = volume.geometry().orientation.with_flipped_handedness();
        self.reorient(volume, target, output)
    }

    fn set_frame_codes(
        &self,
        volume: &Volume,
        qform: FrameCode,
        sform: FrameCode,
        output: &Path,
    ) -> Result<Volume> {
        let mut header = read_header(volume.path())?;
        let array = read_array(volume.path())?;
        header.qform_code = qform.code();
        header.sform_code = sform.code();
        write_volume(output, &array, &header)?;
        let mut geometry = volume.geometry().clone();
        geometry.qform = qform;
        geometry.sform = sform;
        Ok(Volume::new(output, geometry, volume.kind()))
    }

    fn copy_geometry(&self, reference: &Volume, volume: &Volume, output: &Path) -> Result<Volume> {
        let ref_header = read_header(reference.path())?;
        let array = read_array(volume.path())?;
        let shape = array.shape();
        let ref_dims = reference.geometry().dims;
        if shape != ref_dims.as_slice() {
            return Err(EngineError::format(
                volume.path(),
                format!(
                    "grid {:?} does not match reference grid {:?}",
                    shape, ref_dims
                ),
            ));
        }
        write_volume(output, &array, &ref_header)?;
        Ok(Volume::new(
            output,
            reference.geometry().clone(),
            volume.kind(),
        ))
    }

    fn write_placeholder(&self, grid: &Volume, output: &Path) -> Result<Volume> {
        let dims = grid.geometry().dims;
        let zeros = Array3::<f32>::zeros((dims[0], dims[1], dims[2]));
        let header = read_header(grid.path()).unwrap_or_default();
        write_volume(output, &zeros, &header)?;
        Ok(Volume::new(
            output,
            grid.geometry().clone(),
            ContentKind::Continuous,
        ))
    }
}

impl MaskOps for NiftiVolumes {
    fn erode(&self, mask: &Volume, iterations: usize, output: &Path) -> Result<Volume> {
        let header = read_header(mask.path())?;
        let mut current = read_array(mask.path())?.mapv(|v| if v > 0.0 { 1.0f32 } else { 0.0 });
        let (nx, ny, nz) = current.dim();
        for _ in 0..iterations {
            let mut eroded = Array3::<f32>::zeros((nx, ny, nz));
            for x in 1..nx.saturating_sub(1) {
                for y in 1..ny.saturating_sub(1) {
                    for z in 1..nz.saturating_sub(1) {
                        if current[[x, y, z]] > 0.0
                            && current[[x - 1, y, z]] > 0.0
                            && current[[x + 1, y, z]] > 0.0
                            && current[[x, y - 1, z]] > 0.0
                            && current[[x, y + 1, z]] > 0.0
                            && current[[x, y, z - 1]] > 0.0
                            && current[[x, y, z + 1]] > 0.0
                        {
                            eroded[[x, y, z]] = 1.0;
                        }
                    }
                }
            }
            current = eroded;
        }
        write_volume(output, &current, &header)?;
        Ok(Volume::new(
            output,
            mask.geometry().clone(),
            ContentKind::Label,
        ))
    }

    fn threshold_band(&self, volume: &Volume, low: f64, high: f64, output: &Path) -> Result<Volume> {
        let header = read_header(volume.path())?;
        let array = read_array(volume.path())?;
        let band = array.mapv(|v| {
            let v = v as f64;
            if v >= low && v <= high {
                1.0f32
            } else {
                0.0
            }
        });
        write_volume(output, &band, &header)?;
        Ok(Volume::new(
            output,
            volume.geometry().clone(),
            ContentKind::Label,
        ))
    }

    fn binarize(&self, volume: &Volume, output: &Path) -> Result<Volume> {
        let header = read_header(volume.path())?;
        let array = read_array(volume.path())?;
        let binary = array.mapv(|v| if v > 0.0 { 1.0f32 } else { 0.0 });
        write_volume(output, &binary, &header)?;
        Ok(Volume::new(
            output,
            volume.geometry().clone(),
            ContentKind::Label,
        ))
    }
}

fn paired_voxels(a: &Volume, b: &Volume) -> Result<(Array3<f32>, Array3<f32>)> {
    let va = read_array(a.path())?;
    let vb = read_array(b.path())?;
    if va.shape() != vb.shape() {
        return Err(EngineError::format(
            b.path(),
            format!(
                "grid {:?} does not match {:?} for pairwise statistics",
                vb.shape(),
                va.shape()
            ),
        ));
    }
    Ok((va, vb))
}

impl ImageStats for NiftiVolumes {
    fn stats(&self, volume: &Volume) -> Result<IntensityStats> {
        let array = read_array(volume.path())?;
        let n = array.len().max(1) as f64;
        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut nonzero = 0usize;
        for &v in array.iter() {
            let v = v as f64;
            sum += v;
            min = min.min(v);
            max = max.max(v);
            if v != 0.0 {
                nonzero += 1;
            }
        }
        let mean = sum / n;
        let var = array
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Ok(IntensityStats {
            mean,
            std_dev: var.sqrt(),
            min: if min.is_finite() { min } else { 0.0 },
            max: if max.is_finite() { max } else { 0.0 },
            nonzero_voxels: nonzero,
        })
    }

    fn correlation(&self, a: &Volume, b: &Volume) -> Result<f64> {
        let (va, vb) = paired_voxels(a, b)?;
        let n = va.len() as f64;
        let mean_a = va.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mean_b = vb.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (&x, &y) in va.iter().zip(vb.iter()) {
            let dx = x as f64 - mean_a;
            let dy = y as f64 - mean_b;
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }
        let denom = (var_a * var_b).sqrt();
        if denom < 1e-12 {
            return Ok(0.0);
        }
        Ok(cov / denom)
    }

    fn mutual_information(&self, a: &Volume, b: &Volume) -> Result<f64> {
        const BINS: usize = 64;
        let (va, vb) = paired_voxels(a, b)?;
        let range = |arr: &Array3<f32>| {
            let mut lo = f32::INFINITY;
            let mut hi = f32::NEG_INFINITY;
            for &v in arr.iter() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
            (lo, hi)
        };
        let (lo_a, hi_a) = range(&va);
        let (lo_b, hi_b) = range(&vb);
        if hi_a - lo_a < 1e-12 || hi_b - lo_b < 1e-12 {
            return Ok(0.0);
        }
        let bin = |v: f32, lo: f32, hi: f32| {
            (((v - lo) / (hi - lo) * (BINS as f32 - 1.0)) as usize).min(BINS - 1)
        };
        let mut joint = vec![0.0f64; BINS * BINS];
        for (&x, &y) in va.iter().zip(vb.iter()) {
            joint[bin(x, lo_a, hi_a) * BINS + bin(y, lo_b, hi_b)] += 1.0;
        }
        let total: f64 = joint.iter().sum();
        let mut px = vec![0.0f64; BINS];
        let mut py = vec![0.0f64; BINS];
        for i in 0..BINS {
            for j in 0..BINS {
                let p = joint[i * BINS + j] / total;
                px[i] += p;
                py[j] += p;
            }
        }
        let mut mi = 0.0;
        for i in 0..BINS {
            for j in 0..BINS {
                let p = joint[i * BINS + j] / total;
                if p > 0.0 && px[i] > 0.0 && py[j] > 0.0 {
                    mi += p * (p / (px[i] * py[j])).ln();
                }
            }
        }
        Ok(mi)
    }

    fn normalized_cross_correlation(&self, a: &Volume, b: &Volume) -> Result<f64> {
        let (va, vb) = paired_voxels(a, b)?;
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;
        for (&x, &y) in va.iter().zip(vb.iter()) {
            let x = x as f64;
            let y = y as f64;
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        let denom = (norm_a * norm_b).sqrt();
        if denom < 1e-12 {
            return Ok(0.0);
        }
        Ok(dot / denom)
    }

    fn overlap(&self, a: &Volume, b: &Volume) -> Result<OverlapStats> {
        let (va, vb) = paired_voxels(a, b)?;
        let mut intersection = 0usize;
        let mut count_a = 0usize;
        let mut count_b = 0usize;
        for (&x, &y) in va.iter().zip(vb.iter()) {
            let in_a = x > 0.0;
            let in_b = y > 0.0;
            count_a += usize::from(in_a);
            count_b += usize::from(in_b);
            intersection += usize::from(in_a && in_b);
        }
        let union = count_a + count_b - intersection;
        if union == 0 {
            return Ok(OverlapStats {
                jaccard: 0.0,
                dice: 0.0,
            });
        }
        Ok(OverlapStats {
            jaccard: intersection as f64 / union as f64,
            dice: 2.0 * intersection as f64 / (count_a + count_b) as f64,
        })
    }

    fn label_values(&self, volume: &Volume) -> Result<Vec<u32>> {
        let array = read_array(volume.path())?;
        let mut values = BTreeSet::new();
        for &v in array.iter() {
            let rounded = v.round();
            if rounded > 0.0 {
                values.insert(rounded as u32);
            }
        }
        Ok(values.into_iter().collect())
    }

    fn warp_statistics(&self, warp: &Path) -> Result<WarpStats> {
        let field = read_dyn(warp)?;
        let ndim = field.ndim();
        if ndim < 4 || field.shape()[ndim - 1] != 3 {
            return Err(EngineError::format(
                warp,
                format!("expected a vector field, got shape {:?}", field.shape()),
            ));
        }
        let mut magnitudes = Vec::with_capacity(field.len() / 3);
        for lane in field.lanes(Axis(ndim - 1)) {
            let m = lane
                .iter()
                .map(|&v| (v as f64) * (v as f64))
                .sum::<f64>()
                .sqrt();
            magnitudes.push(m);
        }
        let n = magnitudes.len().max(1) as f64;
        let mean = magnitudes.iter().sum::<f64>() / n;
        let max = magnitudes.iter().cloned().fold(0.0f64, f64::max);
        let var = magnitudes.iter().map(|m| (m - mean) * (m - mean)).sum::<f64>() / n;
        Ok(WarpStats {
            mean_displacement: mean,
            max_displacement: max,
            variability: var.sqrt(),
        })
    }
}
