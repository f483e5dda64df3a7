//! Shared test doubles: a JSON-backed volume format plus mock
//! implementations of every engine port, so orchestration behavior can be
//! exercised with real voxel bookkeeping and no external binaries.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use volreg_core::transform::{artifact_path, AFFINE_SUFFIX, INVERSE_WARP_SUFFIX, WARP_SUFFIX};
use volreg_core::{
    ContentKind, FrameCode, Interpolation, OrientationCode, StageKind, TransformChain, Volume,
    VolumeGeometry,
};
use volreg_engine::error::Result as EngineResult;
use volreg_engine::{
    EngineError, ImageStats, IntensityStats, MaskOps, OverlapStats, RegistrationBackend,
    RegistrationJob, Resampler, TissueClassifier, VolumeOps, WarpStats,
};

/// On-disk test volume: JSON with explicit metadata and voxel data laid out
/// x-major (`index = (x * ny + y) * nz + z`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVolume {
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
    pub orientation: String,
    pub qform: i16,
    pub sform: i16,
    pub data: Vec<f32>,
}

impl TestVolume {
    pub fn filled(dims: [usize; 3], value: f32) -> Self {
        Self {
            dims,
            spacing: [1.0, 1.0, 1.0],
            orientation: "RAS".to_string(),
            qform: 1,
            sform: 1,
            data: vec![value; dims[0] * dims[1] * dims[2]],
        }
    }

    pub fn ramp(dims: [usize; 3]) -> Self {
        let mut volume = Self::filled(dims, 0.0);
        for (i, v) in volume.data.iter_mut().enumerate() {
            *v = i as f32;
        }
        volume
    }

    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.dims[1] + y) * self.dims[2] + z
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let i = self.index(x, y, z);
        self.data[i] = value;
    }

    pub fn orientation_code(&self) -> OrientationCode {
        self.orientation.parse().expect("test volume orientation")
    }

    pub fn geometry(&self) -> VolumeGeometry {
        VolumeGeometry {
            dims: self.dims,
            spacing: self.spacing,
            orientation: self.orientation_code(),
            qform: FrameCode::from_code(self.qform),
            sform: FrameCode::from_code(self.sform),
        }
    }

    pub fn write(&self, path: &Path) {
        fs::write(path, serde_json::to_vec(self).unwrap()).unwrap();
    }

    pub fn read(path: &Path) -> EngineResult<Self> {
        let bytes = fs::read(path).map_err(EngineError::Io)?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::format(path, e.to_string()))
    }
}

/// Write a test volume and return a probed handle for it.
pub fn place_volume(path: &Path, volume: &TestVolume, kind: ContentKind) -> Volume {
    volume.write(path);
    Volume::new(path, volume.geometry(), kind)
}

/// JSON-volume implementation of the volume-utility ports.
#[derive(Debug, Clone, Default)]
pub struct JsonVolumes;

impl VolumeOps for JsonVolumes {
    fn probe(&self, path: &Path, kind: ContentKind) -> EngineResult<Volume> {
        if !path.is_file() {
            return Err(EngineError::output_missing(path));
        }
        let tv = TestVolume::read(path)?;
        Ok(Volume::new(path, tv.geometry(), kind))
    }

    fn reorient(
        &self,
        volume: &Volume,
        target: OrientationCode,
        output: &Path,
    ) -> EngineResult<Volume> {
        let tv = TestVolume::read(volume.path())?;
        let current = tv.orientation_code();
        let remap = current.remap_to(&target);
        if remap.is_identity() {
            fs::copy(volume.path(), output)?;
            return Ok(volume.relocated(output));
        }
        let mut dims = [0usize; 3];
        let mut spacing = [0.0f64; 3];
        for j in 0..3 {
            dims[j] = tv.dims[remap.order[j]];
            spacing[j] = tv.spacing[remap.order[j]];
        }
        let mut out = TestVolume {
            dims,
            spacing,
            orientation: target.to_string(),
            qform: tv.qform,
            sform: tv.sform,
            data: vec![0.0; tv.data.len()],
        };
        for x in 0..dims[0] {
            for y in 0..dims[1] {
                for z in 0..dims[2] {
                    let newc = [x, y, z];
                    let mut oldc = [0usize; 3];
                    for (j, &c) in newc.iter().enumerate() {
                        let src = remap.order[j];
                        oldc[src] = if remap.flip[j] { tv.dims[src] - 1 - c } else { c };
                    }
                    let v = tv.get(oldc[0], oldc[1], oldc[2]);
                    out.set(x, y, z, v);
                }
            }
        }
        out.write(output);
        Ok(Volume::new(output, out.geometry(), volume.kind()))
    }

    fn flip_handedness(&self, volume: &Volume, output: &Path) -> EngineResult<Volume> {
        let target = volume.geometry().orientation.with_flipped_handedness();
        self.reorient(volume, target, output)
    }

    fn set_frame_codes(
        &self,
        volume: &Volume,
        qform: FrameCode,
        sform: FrameCode,
        output: &Path,
    ) -> EngineResult<Volume> {
        let mut tv = TestVolume::read(volume.path())?;
        tv.qform = qform.code();
        tv.sform = sform.code();
        tv.write(output);
        Ok(Volume::new(output, tv.geometry(), volume.kind()))
    }

    fn copy_geometry(
        &self,
        reference: &Volume,
        volume: &Volume,
        output: &Path,
    ) -> EngineResult<Volume> {
        let ref_tv = TestVolume::read(reference.path())?;
        let tv = TestVolume::read(volume.path())?;
        if ref_tv.dims != tv.dims {
            return Err(EngineError::format(volume.path(), "grid mismatch"));
        }
        let out = TestVolume {
            data: tv.data,
            ..ref_tv
        };
        out.write(output);
        Ok(Volume::new(output, out.geometry(), volume.kind()))
    }

    fn write_placeholder(&self, grid: &Volume, output: &Path) -> EngineResult<Volume> {
        let tv = TestVolume::filled(grid.geometry().dims, 0.0);
        tv.write(output);
        Ok(Volume::new(output, tv.geometry(), ContentKind::Continuous))
    }
}

impl MaskOps for JsonVolumes {
    fn erode(&self, mask: &Volume, iterations: usize, output: &Path) -> EngineResult<Volume> {
        let tv = TestVolume::read(mask.path())?;
        let [nx, ny, nz] = tv.dims;
        let mut current = tv.clone();
        for v in current.data.iter_mut() {
            *v = if *v > 0.0 { 1.0 } else { 0.0 };
        }
        for _ in 0..iterations {
            let mut eroded = TestVolume {
                data: vec![0.0; current.data.len()],
                ..current.clone()
            };
            for x in 1..nx.saturating_sub(1) {
                for y in 1..ny.saturating_sub(1) {
                    for z in 1..nz.saturating_sub(1) {
                        let keep = current.get(x, y, z) > 0.0
                            && current.get(x - 1, y, z) > 0.0
                            && current.get(x + 1, y, z) > 0.0
                            && current.get(x, y - 1, z) > 0.0
                            && current.get(x, y + 1, z) > 0.0
                            && current.get(x, y, z - 1) > 0.0
                            && current.get(x, y, z + 1) > 0.0;
                        if keep {
                            eroded.set(x, y, z, 1.0);
                        }
                    }
                }
            }
            current = eroded;
        }
        current.write(output);
        Ok(Volume::new(output, current.geometry(), ContentKind::Label))
    }

    fn threshold_band(
        &self,
        volume: &Volume,
        low: f64,
        high: f64,
        output: &Path,
    ) -> EngineResult<Volume> {
        let mut tv = TestVolume::read(volume.path())?;
        for v in tv.data.iter_mut() {
            let f = *v as f64;
            *v = if f >= low && f <= high { 1.0 } else { 0.0 };
        }
        tv.write(output);
        Ok(Volume::new(output, tv.geometry(), ContentKind::Label))
    }

    fn binarize(&self, volume: &Volume, output: &Path) -> EngineResult<Volume> {
        self.threshold_band(volume, f64::MIN_POSITIVE, f64::MAX, output)
    }
}

fn paired(a: &Volume, b: &Volume) -> EngineResult<(TestVolume, TestVolume)> {
    let ta = TestVolume::read(a.path())?;
    let tb = TestVolume::read(b.path())?;
    if ta.dims != tb.dims {
        return Err(EngineError::format(b.path(), "grid mismatch"));
    }
    Ok((ta, tb))
}

impl ImageStats for JsonVolumes {
    fn stats(&self, volume: &Volume) -> EngineResult<IntensityStats> {
        let tv = TestVolume::read(volume.path())?;
        let n = tv.data.len().max(1) as f64;
        let mean = tv.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = tv
            .data
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Ok(IntensityStats {
            mean,
            std_dev: var.sqrt(),
            min: tv.data.iter().cloned().fold(f64::INFINITY, |m, v| m.min(v as f64)),
            max: tv.data.iter().cloned().fold(f64::NEG_INFINITY, |m, v| m.max(v as f64)),
            nonzero_voxels: tv.data.iter().filter(|&&v| v != 0.0).count(),
        })
    }

    fn correlation(&self, a: &Volume, b: &Volume) -> EngineResult<f64> {
        let (ta, tb) = paired(a, b)?;
        let n = ta.data.len() as f64;
        let ma = ta.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mb = tb.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mut cov = 0.0;
        let mut va = 0.0;
        let mut vb = 0.0;
        for (&x, &y) in ta.data.iter().zip(tb.data.iter()) {
            let dx = x as f64 - ma;
            let dy = y as f64 - mb;
            cov += dx * dy;
            va += dx * dx;
            vb += dy * dy;
        }
        let denom = (va * vb).sqrt();
        if denom < 1e-12 {
            return Ok(0.0);
        }
        Ok(cov / denom)
    }

    fn mutual_information(&self, a: &Volume, b: &Volume) -> EngineResult<f64> {
        self.correlation(a, b).map(f64::abs)
    }

    fn normalized_cross_correlation(&self, a: &Volume, b: &Volume) -> EngineResult<f64> {
        let (ta, tb) = paired(a, b)?;
        let mut dot = 0.0;
        let mut na = 0.0;
        let mut nb = 0.0;
        for (&x, &y) in ta.data.iter().zip(tb.data.iter()) {
            dot += x as f64 * y as f64;
            na += (x as f64).powi(2);
            nb += (y as f64).powi(2);
        }
        let denom = (na * nb).sqrt();
        if denom < 1e-12 {
            return Ok(0.0);
        }
        Ok(dot / denom)
    }

    fn overlap(&self, a: &Volume, b: &Volume) -> EngineResult<OverlapStats> {
        let (ta, tb) = paired(a, b)?;
        let mut both = 0usize;
        let mut ca = 0usize;
        let mut cb = 0usize;
        for (&x, &y) in ta.data.iter().zip(tb.data.iter()) {
            let ia = x > 0.0;
            let ib = y > 0.0;
            ca += usize::from(ia);
            cb += usize::from(ib);
            both += usize::from(ia && ib);
        }
        let union = ca + cb - both;
        if union == 0 {
            return Ok(OverlapStats {
                jaccard: 0.0,
                dice: 0.0,
            });
        }
        Ok(OverlapStats {
            jaccard: both as f64 / union as f64,
            dice: 2.0 * both as f64 / (ca + cb) as f64,
        })
    }

    fn label_values(&self, volume: &Volume) -> EngineResult<Vec<u32>> {
        let tv = TestVolume::read(volume.path())?;
        let mut values: Vec<u32> = tv
            .data
            .iter()
            .filter(|&&v| v.round() > 0.0)
            .map(|&v| v.round() as u32)
            .collect();
        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    fn warp_statistics(&self, warp: &Path) -> EngineResult<WarpStats> {
        Err(EngineError::format(warp, "test volumes carry no warp fields"))
    }
}

/// What a mock backend does for one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageBehavior {
    /// Write the full artifact set under the job's prefix.
    Succeed,
    /// Write artifacts but put the warped volume under an alternate name.
    SucceedAlternateName,
    /// Exit zero and write nothing.
    SucceedNoArtifacts,
    /// Exit non-zero.
    Fail,
}

/// Record of one stage invocation a mock backend observed.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub kind: StageKind,
    pub prefix: PathBuf,
    pub initial_transform: Option<PathBuf>,
    pub fixed_mask: Option<PathBuf>,
}

/// Scriptable registration backend.
pub struct MockBackend {
    name: String,
    behavior: Box<dyn Fn(&RegistrationJob<'_>) -> StageBehavior>,
    pub jobs: RefCell<Vec<JobRecord>>,
}

impl MockBackend {
    pub fn new(
        name: impl Into<String>,
        behavior: impl Fn(&RegistrationJob<'_>) -> StageBehavior + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            behavior: Box::new(behavior),
            jobs: RefCell::new(Vec::new()),
        }
    }

    pub fn always(name: impl Into<String>, behavior: StageBehavior) -> Self {
        Self::new(name, move |_| behavior)
    }

    pub fn recorded_jobs(&self) -> Vec<JobRecord> {
        self.jobs.borrow().clone()
    }
}

/// Write a plausible artifact set for a succeeded stage: the warped volume
/// is a copy of the fixed input (a perfectly registered result), the
/// transform components are marker files.
pub fn write_stage_artifacts(job: &RegistrationJob<'_>, warped_suffix: &str) {
    let warped = artifact_path(job.output_prefix, warped_suffix);
    fs::copy(job.fixed.path(), &warped).expect("mock warped copy");
    fs::write(
        artifact_path(job.output_prefix, AFFINE_SUFFIX),
        b"mock affine",
    )
    .unwrap();
    if job.stage.kind.is_nonlinear() {
        fs::write(artifact_path(job.output_prefix, WARP_SUFFIX), b"mock warp").unwrap();
        fs::write(
            artifact_path(job.output_prefix, INVERSE_WARP_SUFFIX),
            b"mock inverse warp",
        )
        .unwrap();
    }
}

impl RegistrationBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_stage(&self, job: &RegistrationJob<'_>) -> EngineResult<()> {
        self.jobs.borrow_mut().push(JobRecord {
            kind: job.stage.kind,
            prefix: job.output_prefix.to_path_buf(),
            initial_transform: job.initial_transform.map(Path::to_path_buf),
            fixed_mask: job.fixed_mask.map(|m| m.path().to_path_buf()),
        });
        match (self.behavior)(job) {
            StageBehavior::Succeed => {
                write_stage_artifacts(job, "Warped.nii.gz");
                Ok(())
            }
            StageBehavior::SucceedAlternateName => {
                write_stage_artifacts(job, "deformed.nii.gz");
                Ok(())
            }
            StageBehavior::SucceedNoArtifacts => Ok(()),
            StageBehavior::Fail => Err(EngineError::invocation_failed(
                self.name.clone(),
                1,
                "scripted failure",
            )),
        }
    }
}

/// Resampler over test volumes. Nearest-neighbor picks source voxels;
/// linear additionally blends along x, which makes label blending visible.
#[derive(Default)]
pub struct MockResampler {
    pub calls: RefCell<Vec<(Interpolation, PathBuf)>>,
}

impl MockResampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpolations(&self) -> Vec<Interpolation> {
        self.calls.borrow().iter().map(|(i, _)| *i).collect()
    }
}

impl Resampler for MockResampler {
    fn resample(
        &self,
        source: &Volume,
        reference: &Volume,
        _chain: &TransformChain,
        interpolation: Interpolation,
        output: &Path,
    ) -> EngineResult<Volume> {
        self.calls
            .borrow_mut()
            .push((interpolation, output.to_path_buf()));
        let src = TestVolume::read(source.path())?;
        let ref_tv = TestVolume::read(reference.path())?;
        let dims = ref_tv.dims;
        let mut out = TestVolume {
            data: vec![0.0; dims[0] * dims[1] * dims[2]],
            ..ref_tv
        };
        for x in 0..dims[0] {
            for y in 0..dims[1] {
                for z in 0..dims[2] {
                    let sx = (x * src.dims[0] / dims[0]).min(src.dims[0] - 1);
                    let sy = (y * src.dims[1] / dims[1]).min(src.dims[1] - 1);
                    let sz = (z * src.dims[2] / dims[2]).min(src.dims[2] - 1);
                    let v = match interpolation {
                        Interpolation::NearestNeighbor => src.get(sx, sy, sz),
                        Interpolation::Linear => {
                            let next = (sx + 1).min(src.dims[0] - 1);
                            (src.get(sx, sy, sz) + src.get(next, sy, sz)) / 2.0
                        }
                    };
                    out.set(x, y, z, v);
                }
            }
        }
        out.write(output);
        Ok(Volume::new(output, out.geometry(), source.kind()))
    }
}

/// Classifier producing a striped 3-class segmentation, or a scripted
/// failure.
pub struct MockClassifier {
    pub fail: bool,
}

impl TissueClassifier for MockClassifier {
    fn classify(
        &self,
        volume: &Volume,
        classes: usize,
        output_prefix: &Path,
    ) -> EngineResult<Volume> {
        if self.fail {
            return Err(EngineError::invocation_failed("mock-classifier", 1, "scripted failure"));
        }
        let dims = volume.geometry().dims;
        let mut tv = TestVolume::filled(dims, 0.0);
        for x in 0..dims[0] {
            for y in 0..dims[1] {
                for z in 0..dims[2] {
                    tv.set(x, y, z, ((x % classes) + 1) as f32);
                }
            }
        }
        let path = artifact_path(output_prefix, "Segmentation.nii.gz");
        tv.write(&path);
        Ok(Volume::new(&path, tv.geometry(), ContentKind::Label))
    }
}
