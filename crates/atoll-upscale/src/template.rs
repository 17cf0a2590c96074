//! Template dictionary: hand-drawn replacements for small source patterns.
//!
//! Each source template is a 2x2 image. Its variants are larger drawings of
//! the same shape, `2 * scale` pixels square, that may only use the source's
//! colors and must keep its four corner colors in place. Variants are stored
//! as palette indices relative to their source so they can be repainted with
//! the colors of any block sharing the source's pattern signature.

use std::path::Path;

use image::RgbaImage;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::UpscaleError;
use crate::palette::IndexedBlock;

/// Side length of a source template.
pub const SOURCE_SIZE: u32 = 2;

/// Optional manifest in the template folder overriding the default table.
pub const MANIFEST_FILE: &str = "templates.ron";

/// Built-in source name to variant names table.
pub const DEFAULT_TEMPLATE_TABLE: &[(&str, &[&str])] = &[
    ("corner_nw", &["corner_nw_a", "corner_nw_b"]),
    ("corner_ne", &["corner_ne_a", "corner_ne_b"]),
    ("corner_sw", &["corner_sw_a", "corner_sw_b"]),
    ("corner_se", &["corner_se_a", "corner_se_b"]),
    ("edge_horizontal", &["edge_horizontal_a"]),
    ("edge_vertical", &["edge_vertical_a"]),
    ("diagonal", &["diagonal_a"]),
    ("anti_diagonal", &["anti_diagonal_a"]),
];

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// RON manifest listing template names.
#[derive(Clone, Debug, Deserialize)]
pub struct TemplateManifest {
    /// Source templates and their variants.
    pub templates: Vec<TemplateEntry>,
}

/// One source template and the names of its replacement variants.
#[derive(Clone, Debug, Deserialize)]
pub struct TemplateEntry {
    /// Source image name (file stem).
    pub source: String,
    /// Replacement image names (file stems).
    pub variants: Vec<String>,
}

impl TemplateManifest {
    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            templates: DEFAULT_TEMPLATE_TABLE
                .iter()
                .map(|(source, variants)| TemplateEntry {
                    source: (*source).to_string(),
                    variants: variants.iter().map(|v| (*v).to_string()).collect(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

/// A decoded source image and its variant images.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    /// Source name.
    pub name: String,
    /// The 2x2 source.
    pub source: RgbaImage,
    /// `(name, image)` of every variant.
    pub variants: Vec<(String, RgbaImage)>,
}

/// A variant expressed in its source's palette indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantPattern {
    /// Variant name, for diagnostics.
    pub name: String,
    /// Row-major palette indices, `(2 * scale)^2` entries.
    pub indices: Vec<u8>,
}

impl TemplateSet {
    /// Check sizes, corners and palette of every variant against the source.
    ///
    /// Returns the source block and the index-encoded variants.
    pub fn validate(&self, scale: u32) -> Result<(IndexedBlock, Vec<VariantPattern>), UpscaleError> {
        check_size(&self.name, &self.source, SOURCE_SIZE)?;
        let source = IndexedBlock::from_image(&self.source);
        let size = SOURCE_SIZE * scale;

        let mut patterns = Vec::with_capacity(self.variants.len());
        for (variant_name, image) in &self.variants {
            check_size(variant_name, image, size)?;

            let last = size - 1;
            let corners = [(0, 0, 0, 0), (1, 0, last, 0), (0, 1, 0, last), (1, 1, last, last)];
            if corners
                .iter()
                .any(|&(sx, sy, vx, vy)| self.source.get_pixel(sx, sy) != image.get_pixel(vx, vy))
            {
                return Err(UpscaleError::CornerMismatch {
                    source_name: self.name.clone(),
                    variant: variant_name.clone(),
                });
            }

            let indices: Option<Vec<u8>> = image.pixels().map(|p| source.index_of(*p)).collect();
            let Some(indices) = indices else {
                return Err(UpscaleError::PaletteMismatch {
                    source_name: self.name.clone(),
                    variant: variant_name.clone(),
                });
            };
            patterns.push(VariantPattern {
                name: variant_name.clone(),
                indices,
            });
        }
        Ok((source, patterns))
    }
}

fn check_size(name: &str, image: &RgbaImage, expected: u32) -> Result<(), UpscaleError> {
    if image.dimensions() != (expected, expected) {
        return Err(UpscaleError::BadTemplateSize {
            name: name.to_string(),
            width: image.width(),
            height: image.height(),
            expected_width: expected,
            expected_height: expected,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TemplateDictionary
// ---------------------------------------------------------------------------

/// Pattern signature to replacement variants. Immutable once built.
#[derive(Clone, Debug)]
pub struct TemplateDictionary {
    scale: u32,
    patterns: FxHashMap<String, Vec<VariantPattern>>,
}

impl TemplateDictionary {
    /// A dictionary with no templates.
    pub fn empty(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
            patterns: FxHashMap::default(),
        }
    }

    /// Validate and index every set.
    ///
    /// Sources with the same signature pool their variants. The first
    /// authoring error aborts the build.
    pub fn from_sets(scale: u32, sets: &[TemplateSet]) -> Result<Self, UpscaleError> {
        let mut dictionary = Self::empty(scale);
        for set in sets {
            let (source, variants) = set.validate(dictionary.scale)?;
            dictionary
                .patterns
                .entry(source.signature())
                .or_default()
                .extend(variants);
        }
        Ok(dictionary)
    }

    /// Load every template named by `manifest` from `dir/{name}.png`.
    pub fn load_manifest(
        dir: &Path,
        manifest: &TemplateManifest,
        scale: u32,
    ) -> Result<Self, UpscaleError> {
        let sets = manifest
            .templates
            .iter()
            .map(|entry| {
                let source = load_template(dir, &entry.source)?;
                let variants = entry
                    .variants
                    .iter()
                    .map(|name| Ok((name.clone(), load_template(dir, name)?)))
                    .collect::<Result<Vec<_>, UpscaleError>>()?;
                Ok(TemplateSet {
                    name: entry.source.clone(),
                    source,
                    variants,
                })
            })
            .collect::<Result<Vec<_>, UpscaleError>>()?;

        let dictionary = Self::from_sets(scale, &sets)?;
        tracing::info!(
            dir = %dir.display(),
            sources = sets.len(),
            signatures = dictionary.len(),
            "loaded upscale templates"
        );
        Ok(dictionary)
    }

    /// Load templates from `dir`, using `templates.ron` there if present and
    /// the built-in table otherwise.
    pub fn load_dir(dir: &Path, scale: u32) -> Result<Self, UpscaleError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let contents = std::fs::read_to_string(&manifest_path)?;
            ron::from_str(&contents)?
        } else {
            TemplateManifest::builtin()
        };
        Self::load_manifest(dir, &manifest, scale)
    }

    /// Replacement size factor.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Number of distinct source signatures.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no templates are loaded.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Variants registered for a pattern signature.
    pub fn variants(&self, signature: &str) -> Option<&[VariantPattern]> {
        self.patterns
            .get(signature)
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }
}

fn load_template(dir: &Path, name: &str) -> Result<RgbaImage, UpscaleError> {
    let path = dir.join(format!("{name}.png"));
    if !path.exists() {
        return Err(UpscaleError::MissingAsset {
            name: name.to_string(),
            path,
        });
    }
    Ok(image::open(&path)?.to_rgba8())
}

#[cfg(test)]
pub(crate) mod tests {
    use image::Rgba;

    use super::*;

    pub(crate) const SEA: Rgba<u8> = Rgba([30, 60, 120, 255]);
    pub(crate) const LAND: Rgba<u8> = Rgba([90, 140, 60, 255]);

    /// 2x2 with land in the north-west corner, and a rounded 8x8 variant.
    pub(crate) fn corner_set() -> TemplateSet {
        let source = RgbaImage::from_fn(2, 2, |x, y| if x == 0 && y == 0 { LAND } else { SEA });
        let variant = RgbaImage::from_fn(8, 8, |x, y| if x + y < 4 { LAND } else { SEA });
        TemplateSet {
            name: "corner_nw".into(),
            source,
            variants: vec![("corner_nw_a".into(), variant)],
        }
    }

    #[test]
    fn test_builtin_table_is_well_formed() {
        let manifest = TemplateManifest::builtin();
        assert_eq!(manifest.templates.len(), DEFAULT_TEMPLATE_TABLE.len());
        assert!(manifest.templates.iter().all(|e| !e.variants.is_empty()));
    }

    #[test]
    fn test_valid_set_keeps_corners() {
        let set = corner_set();
        let (source, patterns) = set.validate(4).unwrap();
        assert_eq!(source.signature(), "2x2:0,1,1,1");

        let variant = &set.variants[0].1;
        let last = variant.width() - 1;
        assert_eq!(variant.get_pixel(0, 0), set.source.get_pixel(0, 0));
        assert_eq!(variant.get_pixel(last, 0), set.source.get_pixel(1, 0));
        assert_eq!(variant.get_pixel(0, last), set.source.get_pixel(0, 1));
        assert_eq!(variant.get_pixel(last, last), set.source.get_pixel(1, 1));
        assert_eq!(patterns[0].indices.len(), 64);
    }

    #[test]
    fn test_corner_mismatch_is_rejected() {
        let mut set = corner_set();
        set.variants[0].1.put_pixel(7, 7, LAND);
        assert!(matches!(
            set.validate(4),
            Err(UpscaleError::CornerMismatch { variant, .. }) if variant == "corner_nw_a"
        ));
    }

    #[test]
    fn test_foreign_color_is_rejected() {
        let mut set = corner_set();
        set.variants[0].1.put_pixel(3, 3, Rgba([255, 0, 255, 255]));
        assert!(matches!(
            set.validate(4),
            Err(UpscaleError::PaletteMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_size_is_rejected() {
        let set = corner_set();
        assert!(matches!(
            set.validate(3),
            Err(UpscaleError::BadTemplateSize { width: 8, expected_width: 6, .. })
        ));
    }

    #[test]
    fn test_same_signature_pools_variants() {
        let first = corner_set();
        let mut second = corner_set();
        second.name = "corner_nw_dark".into();
        second.variants[0].0 = "corner_nw_dark_a".into();

        let dictionary = TemplateDictionary::from_sets(4, &[first, second]).unwrap();
        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary.variants("2x2:0,1,1,1").map(<[_]>::len), Some(2));
        assert!(dictionary.variants("2x2:0,0,0,0").is_none());
    }

    #[test]
    fn test_load_dir_with_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let set = corner_set();
        set.source.save(dir.path().join("corner_nw.png")).unwrap();
        set.variants[0].1.save(dir.path().join("corner_nw_a.png")).unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"(templates: [(source: "corner_nw", variants: ["corner_nw_a"])])"#,
        )
        .unwrap();

        let dictionary = TemplateDictionary::load_dir(dir.path(), 4).unwrap();
        assert_eq!(dictionary.scale(), 4);
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn test_bundled_templates_validate() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/templates");
        let dictionary = TemplateDictionary::load_dir(&dir, 4).unwrap();

        // The diagonal pair share a signature and pool their variants.
        assert_eq!(dictionary.len(), DEFAULT_TEMPLATE_TABLE.len() - 1);
        assert_eq!(dictionary.variants("2x2:0,1,1,1").map(<[_]>::len), Some(2));
        assert_eq!(dictionary.variants("2x2:0,1,1,0").map(<[_]>::len), Some(2));
        assert!(
            dictionary
                .variants("2x2:0,0,1,1")
                .is_some_and(|v| v.iter().all(|p| p.indices.len() == 64))
        );
    }

    #[test]
    fn test_load_dir_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        match TemplateDictionary::load_dir(dir.path(), 4) {
            Err(UpscaleError::MissingAsset { name, .. }) => {
                assert_eq!(name, DEFAULT_TEMPLATE_TABLE[0].0);
            }
            other => panic!("expected missing asset, got {other:?}"),
        }
    }
}
