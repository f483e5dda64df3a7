//! Transform application and atlas mapping.

use crate::error::{PipelineError, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use volreg_core::{Interpolation, MapDirection, TransformArtifact, Volume};
use volreg_engine::{MaskOps, Resampler};

/// Result of applying a transform: the resampled volume plus whether an
/// approximate chain had to be used.
#[derive(Debug, Clone)]
pub struct Applied {
    pub volume: Volume,
    pub approximate: bool,
}

/// One region of a label atlas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasRegion {
    pub index: u32,
    pub name: String,
}

/// A categorical atlas volume with its region-index table.
#[derive(Debug, Clone)]
pub struct LabelAtlas {
    pub volume: Volume,
    pub regions: Vec<AtlasRegion>,
}

impl LabelAtlas {
    pub fn new(volume: Volume, regions: Vec<AtlasRegion>) -> Self {
        Self { volume, regions }
    }

    /// Parse a lookup table of `index name` lines. Blank lines and `#`
    /// comments are skipped; names may contain spaces.
    pub fn from_lookup_file(volume: Volume, lookup: &Path) -> Result<Self> {
        let text = fs::read_to_string(lookup)?;
        let mut regions = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let index = parts
                .next()
                .and_then(|t| t.parse::<u32>().ok())
                .ok_or_else(|| {
                    PipelineError::input_invalid(format!(
                        "bad region index on line {} of {}",
                        lineno + 1,
                        lookup.display()
                    ))
                })?;
            let name = parts.next().unwrap_or("").trim().to_string();
            if name.is_empty() {
                return Err(PipelineError::input_invalid(format!(
                    "missing region name on line {} of {}",
                    lineno + 1,
                    lookup.display()
                )));
            }
            regions.push(AtlasRegion { index, name });
        }
        if regions.is_empty() {
            return Err(PipelineError::input_invalid(format!(
                "no regions parsed from {}",
                lookup.display()
            )));
        }
        Ok(Self { volume, regions })
    }
}

/// Applies resolved transform chains to resample volumes and atlases.
pub struct TransformApplication<'a> {
    resampler: &'a dyn Resampler,
}

impl<'a> TransformApplication<'a> {
    pub fn new(resampler: &'a dyn Resampler) -> Self {
        Self { resampler }
    }

    /// Resample `source` onto `target`'s grid through `artifact`.
    ///
    /// Interpolation is dictated by the source's content kind; label
    /// volumes always resample nearest-neighbor. An incomplete artifact is
    /// an error here, never a silent linear-only downgrade.
    pub fn apply(
        &self,
        source: &Volume,
        target: &Volume,
        artifact: &TransformArtifact,
        direction: MapDirection,
        output: &Path,
    ) -> Result<Applied> {
        let chain = artifact.resolve(direction)?;
        if chain.approximate {
            warn!(
                prefix = %artifact.prefix().display(),
                "no inverse warp available; using the forward warp with an inverted \
                 linear component (approximate)"
            );
        }
        let interpolation = Interpolation::for_content(source.kind());
        let volume = self
            .resampler
            .resample(source, target, &chain, interpolation, output)?;
        Ok(Applied {
            volume,
            approximate: chain.approximate,
        })
    }

    /// Map a label atlas into the target volume's space and split it into
    /// per-region binary masks.
    pub fn map_atlas_regions(
        &self,
        atlas: &LabelAtlas,
        target: &Volume,
        artifact: &TransformArtifact,
        masks: &dyn MaskOps,
        output_dir: &Path,
    ) -> Result<Vec<(AtlasRegion, Volume)>> {
        fs::create_dir_all(output_dir)?;
        let mapped = self.apply(
            &atlas.volume,
            target,
            artifact,
            MapDirection::Inverse,
            &output_dir.join("atlas_in_subject.nii.gz"),
        )?;
        info!(
            regions = atlas.regions.len(),
            approximate = mapped.approximate,
            "atlas mapped into subject space"
        );

        let mut region_masks = Vec::with_capacity(atlas.regions.len());
        for region in &atlas.regions {
            let file = output_dir.join(format!(
                "region_{:03}_{}.nii.gz",
                region.index,
                sanitize(&region.name)
            ));
            let mask = masks.threshold_band(
                &mapped.volume,
                region.index as f64,
                region.index as f64,
                &file,
            )?;
            region_masks.push((region.clone(), mask));
        }
        Ok(region_masks)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use volreg_core::{ContentKind, VolumeGeometry};

    #[test]
    fn test_lookup_parsing() {
        let dir = tempdir().unwrap();
        let lut = dir.path().join("regions.txt");
        let mut f = fs::File::create(&lut).unwrap();
        writeln!(f, "# atlas regions").unwrap();
        writeln!(f, "105 pons").unwrap();
        writeln!(f, "106 midbrain left part").unwrap();
        writeln!(f).unwrap();
        drop(f);

        let volume = Volume::new("/a.nii.gz", VolumeGeometry::default(), ContentKind::Label);
        let atlas = LabelAtlas::from_lookup_file(volume, &lut).unwrap();
        assert_eq!(atlas.regions.len(), 2);
        assert_eq!(atlas.regions[0].index, 105);
        assert_eq!(atlas.regions[1].name, "midbrain left part");
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let dir = tempdir().unwrap();
        let lut = dir.path().join("bad.txt");
        fs::write(&lut, "pons 105\n").unwrap();
        let volume = Volume::new("/a.nii.gz", VolumeGeometry::default(), ContentKind::Label);
        assert!(LabelAtlas::from_lookup_file(volume, &lut).is_err());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Midbrain (Left)"), "midbrain__left_");
    }
}
