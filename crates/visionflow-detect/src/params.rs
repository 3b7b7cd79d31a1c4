//! Typed parameter structs for the detectors.
//!
//! One tagged struct per detector with serde defaults attached; methods,
//! color names, and fiducial dictionaries are sum types rather than
//! enum-flavored strings.

use serde::{Deserialize, Serialize};

/// Template correlation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateMatchMethod {
    /// Raw sum of squared differences; best is the minimum.
    #[serde(rename = "TM_SQDIFF")]
    SqDiff,
    /// Normalized sum of squared differences.
    #[serde(rename = "TM_SQDIFF_NORMED")]
    SqDiffNormed,
    /// Raw cross-correlation; best is the maximum.
    #[serde(rename = "TM_CCORR")]
    CCorr,
    /// Normalized cross-correlation.
    #[serde(rename = "TM_CCORR_NORMED")]
    CCorrNormed,
    /// Raw correlation coefficient (mean-shifted correlation).
    #[serde(rename = "TM_CCOEFF")]
    CCoeff,
    /// Normalized correlation coefficient.
    #[serde(rename = "TM_CCOEFF_NORMED")]
    CCoeffNormed,
}

impl TemplateMatchMethod {
    /// Wire tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateMatchMethod::SqDiff => "TM_SQDIFF",
            TemplateMatchMethod::SqDiffNormed => "TM_SQDIFF_NORMED",
            TemplateMatchMethod::CCorr => "TM_CCORR",
            TemplateMatchMethod::CCorrNormed => "TM_CCORR_NORMED",
            TemplateMatchMethod::CCoeff => "TM_CCOEFF",
            TemplateMatchMethod::CCoeffNormed => "TM_CCOEFF_NORMED",
        }
    }

    /// Whether the best response is the minimum of the map.
    pub fn lower_is_better(&self) -> bool {
        matches!(
            self,
            TemplateMatchMethod::SqDiff | TemplateMatchMethod::SqDiffNormed
        )
    }
}

/// Template matching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatchParams {
    /// Template identifier to match against.
    pub template_id: String,
    /// Correlation method.
    #[serde(default = "default_template_method")]
    pub method: TemplateMatchMethod,
    /// Acceptance threshold in `[0, 1]`.
    #[serde(default = "default_template_threshold")]
    pub threshold: f64,
}

fn default_template_method() -> TemplateMatchMethod {
    TemplateMatchMethod::CCoeffNormed
}

fn default_template_threshold() -> f64 {
    0.8
}

/// Edge operator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMethod {
    /// Canny with hysteresis.
    Canny,
    /// Sobel gradient magnitude.
    Sobel,
    /// Absolute Laplacian.
    Laplacian,
    /// Prewitt gradient magnitude.
    Prewitt,
    /// Scharr gradient magnitude.
    Scharr,
    /// Dilation minus erosion.
    MorphologicalGradient,
}

impl EdgeMethod {
    /// Wire tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeMethod::Canny => "canny",
            EdgeMethod::Sobel => "sobel",
            EdgeMethod::Laplacian => "laplacian",
            EdgeMethod::Prewitt => "prewitt",
            EdgeMethod::Scharr => "scharr",
            EdgeMethod::MorphologicalGradient => "morphological_gradient",
        }
    }
}

/// Morphology variant used during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphologyOperation {
    /// Close small dark gaps.
    Close,
    /// Remove small bright specks.
    Open,
    /// Keep object outlines.
    Gradient,
}

/// Preprocessing toggles applied before the edge operator, in the fixed
/// order blur, bilateral, morphology, equalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Gaussian blur toggle.
    pub blur_enabled: bool,
    /// Gaussian kernel size; even values are bumped to the next odd.
    pub blur_kernel: u32,
    /// Bilateral filter toggle.
    pub bilateral_enabled: bool,
    /// Bilateral neighborhood diameter.
    pub bilateral_d: u32,
    /// Bilateral range sigma.
    pub bilateral_sigma_color: f64,
    /// Bilateral spatial sigma.
    pub bilateral_sigma_space: f64,
    /// Morphology toggle.
    pub morphology_enabled: bool,
    /// Morphology operation.
    pub morphology_operation: MorphologyOperation,
    /// Morphology kernel size.
    pub morphology_kernel: u32,
    /// Histogram equalization toggle.
    pub equalize_enabled: bool,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            blur_enabled: false,
            blur_kernel: 5,
            bilateral_enabled: false,
            bilateral_d: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            morphology_enabled: false,
            morphology_operation: MorphologyOperation::Close,
            morphology_kernel: 3,
            equalize_enabled: false,
        }
    }
}

/// Edge detection parameters: operator numbers plus contour filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeParams {
    /// Edge operator.
    pub method: EdgeMethod,
    /// Preprocessing toggles.
    pub preprocessing: PreprocessParams,
    /// Canny lower hysteresis threshold.
    pub canny_low: f64,
    /// Canny upper hysteresis threshold.
    pub canny_high: f64,
    /// Canny Sobel aperture.
    pub canny_aperture: u32,
    /// Canny Euclidean-magnitude toggle.
    pub canny_l2_gradient: bool,
    /// Sobel magnitude threshold.
    pub sobel_threshold: f64,
    /// Scharr magnitude threshold.
    pub scharr_threshold: f64,
    /// Prewitt magnitude threshold.
    pub prewitt_threshold: f64,
    /// Laplacian magnitude threshold.
    pub laplacian_threshold: f64,
    /// Morphological-gradient structuring element size.
    pub morph_kernel: u32,
    /// Morphological-gradient threshold.
    pub morph_threshold: f64,
    /// Minimum contour area filter.
    pub min_contour_area: f64,
    /// Maximum contour area filter.
    pub max_contour_area: Option<f64>,
    /// Minimum contour perimeter filter.
    pub min_contour_perimeter: f64,
    /// Maximum contour perimeter filter.
    pub max_contour_perimeter: Option<f64>,
    /// Survivor cap after area-descending sort.
    pub max_contours: usize,
    /// Whether overlays mark contour centers.
    pub show_centers: bool,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            method: EdgeMethod::Canny,
            preprocessing: PreprocessParams::default(),
            canny_low: 50.0,
            canny_high: 150.0,
            canny_aperture: 3,
            canny_l2_gradient: false,
            sobel_threshold: 50.0,
            scharr_threshold: 50.0,
            prewitt_threshold: 50.0,
            laplacian_threshold: 30.0,
            morph_kernel: 3,
            morph_threshold: 30.0,
            min_contour_area: 10.0,
            max_contour_area: None,
            min_contour_perimeter: 0.0,
            max_contour_perimeter: None,
            max_contours: 100,
            show_centers: true,
        }
    }
}

/// Closed set of named colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
    /// Hue wraps the circle: low and high hue ranges.
    Red,
    /// Hue 16..=30.
    Orange,
    /// Hue 31..=45.
    Yellow,
    /// Hue 46..=90.
    Green,
    /// Hue 91..=110.
    Cyan,
    /// Hue 111..=140.
    Blue,
    /// Hue 141..=164.
    Purple,
    /// Achromatic, bright.
    White,
    /// Achromatic, dark.
    Black,
    /// Achromatic, mid brightness.
    Gray,
    /// Only emitted for kmeans centroids matching no definition.
    Unknown,
}

impl ColorName {
    /// Wire tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorName::Red => "red",
            ColorName::Orange => "orange",
            ColorName::Yellow => "yellow",
            ColorName::Green => "green",
            ColorName::Cyan => "cyan",
            ColorName::Blue => "blue",
            ColorName::Purple => "purple",
            ColorName::White => "white",
            ColorName::Black => "black",
            ColorName::Gray => "gray",
            ColorName::Unknown => "unknown",
        }
    }
}

/// Pixel-classification strategy for color detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMethod {
    /// Single-pass per-pixel classification tally.
    Histogram,
    /// k-means clustering with centers mapped to the color table.
    Kmeans,
}

/// Color detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    /// Classification strategy.
    pub method: ColorMethod,
    /// Minimum dominant-color percentage for a match.
    pub min_percentage: f64,
    /// Whether a provided contour masks the tally.
    pub use_contour_mask: bool,
    /// Expected color; `None` means detect-only.
    pub expected_color: Option<ColorName>,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            method: ColorMethod::Histogram,
            min_percentage: 50.0,
            use_contour_mask: false,
            expected_color: None,
        }
    }
}

/// Closed set of square fiducial dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ArucoDictionary {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_4X4_250")]
    Dict4x4_250,
    #[serde(rename = "DICT_4X4_1000")]
    Dict4x4_1000,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "DICT_5X5_1000")]
    Dict5x5_1000,
    #[serde(rename = "DICT_6X6_50")]
    Dict6x6_50,
    #[serde(rename = "DICT_6X6_100")]
    Dict6x6_100,
    #[serde(rename = "DICT_6X6_250")]
    Dict6x6_250,
    #[serde(rename = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "DICT_7X7_50")]
    Dict7x7_50,
    #[serde(rename = "DICT_7X7_100")]
    Dict7x7_100,
    #[serde(rename = "DICT_7X7_250")]
    Dict7x7_250,
    #[serde(rename = "DICT_7X7_1000")]
    Dict7x7_1000,
}

impl ArucoDictionary {
    /// Side length of the bit grid (border excluded).
    pub fn marker_bits(&self) -> usize {
        match self {
            ArucoDictionary::Dict4x4_50
            | ArucoDictionary::Dict4x4_100
            | ArucoDictionary::Dict4x4_250
            | ArucoDictionary::Dict4x4_1000 => 4,
            ArucoDictionary::Dict5x5_50
            | ArucoDictionary::Dict5x5_100
            | ArucoDictionary::Dict5x5_250
            | ArucoDictionary::Dict5x5_1000 => 5,
            ArucoDictionary::Dict6x6_50
            | ArucoDictionary::Dict6x6_100
            | ArucoDictionary::Dict6x6_250
            | ArucoDictionary::Dict6x6_1000 => 6,
            ArucoDictionary::Dict7x7_50
            | ArucoDictionary::Dict7x7_100
            | ArucoDictionary::Dict7x7_250
            | ArucoDictionary::Dict7x7_1000 => 7,
        }
    }

    /// Number of ids the dictionary defines.
    pub fn marker_count(&self) -> usize {
        match self {
            ArucoDictionary::Dict4x4_50
            | ArucoDictionary::Dict5x5_50
            | ArucoDictionary::Dict6x6_50
            | ArucoDictionary::Dict7x7_50 => 50,
            ArucoDictionary::Dict4x4_100
            | ArucoDictionary::Dict5x5_100
            | ArucoDictionary::Dict6x6_100
            | ArucoDictionary::Dict7x7_100 => 100,
            ArucoDictionary::Dict4x4_250
            | ArucoDictionary::Dict5x5_250
            | ArucoDictionary::Dict6x6_250
            | ArucoDictionary::Dict7x7_250 => 250,
            ArucoDictionary::Dict4x4_1000
            | ArucoDictionary::Dict5x5_1000
            | ArucoDictionary::Dict6x6_1000
            | ArucoDictionary::Dict7x7_1000 => 1000,
        }
    }

    /// Wire tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArucoDictionary::Dict4x4_50 => "DICT_4X4_50",
            ArucoDictionary::Dict4x4_100 => "DICT_4X4_100",
            ArucoDictionary::Dict4x4_250 => "DICT_4X4_250",
            ArucoDictionary::Dict4x4_1000 => "DICT_4X4_1000",
            ArucoDictionary::Dict5x5_50 => "DICT_5X5_50",
            ArucoDictionary::Dict5x5_100 => "DICT_5X5_100",
            ArucoDictionary::Dict5x5_250 => "DICT_5X5_250",
            ArucoDictionary::Dict5x5_1000 => "DICT_5X5_1000",
            ArucoDictionary::Dict6x6_50 => "DICT_6X6_50",
            ArucoDictionary::Dict6x6_100 => "DICT_6X6_100",
            ArucoDictionary::Dict6x6_250 => "DICT_6X6_250",
            ArucoDictionary::Dict6x6_1000 => "DICT_6X6_1000",
            ArucoDictionary::Dict7x7_50 => "DICT_7X7_50",
            ArucoDictionary::Dict7x7_100 => "DICT_7X7_100",
            ArucoDictionary::Dict7x7_250 => "DICT_7X7_250",
            ArucoDictionary::Dict7x7_1000 => "DICT_7X7_1000",
        }
    }
}

/// Fiducial detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArucoParams {
    /// Dictionary to decode against.
    pub dictionary: ArucoDictionary,
}

impl Default for ArucoParams {
    fn default() -> Self {
        Self {
            dictionary: ArucoDictionary::Dict4x4_50,
        }
    }
}

/// Rotation estimation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMethod {
    /// Minimum-area enclosing rectangle.
    MinAreaRect,
    /// Equivalent-ellipse major axis; requires at least 5 points.
    EllipseFit,
    /// Principal component of the point cloud.
    Pca,
}

impl RotationMethod {
    /// Wire tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationMethod::MinAreaRect => "min_area_rect",
            RotationMethod::EllipseFit => "ellipse_fit",
            RotationMethod::Pca => "pca",
        }
    }
}

/// Requested output range for rotation angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleRange {
    /// `[0, 360)`.
    #[serde(rename = "0_360")]
    Deg0To360,
    /// `(-180, 180]`.
    #[serde(rename = "-180_180")]
    DegNeg180To180,
    /// `[0, 180)`, for symmetric objects.
    #[serde(rename = "0_180")]
    Deg0To180,
}

impl AngleRange {
    /// Wire tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AngleRange::Deg0To360 => "0_360",
            AngleRange::DegNeg180To180 => "-180_180",
            AngleRange::Deg0To180 => "0_180",
        }
    }

    /// Folds an arbitrary angle into this range.
    pub fn normalize(&self, mut angle: f64) -> f64 {
        match self {
            AngleRange::Deg0To360 => {
                while angle < 0.0 {
                    angle += 360.0;
                }
                while angle >= 360.0 {
                    angle -= 360.0;
                }
                angle
            }
            AngleRange::DegNeg180To180 => {
                while angle <= -180.0 {
                    angle += 360.0;
                }
                while angle > 180.0 {
                    angle -= 360.0;
                }
                angle
            }
            AngleRange::Deg0To180 => {
                while angle < 0.0 {
                    angle += 180.0;
                }
                while angle >= 180.0 {
                    angle -= 180.0;
                }
                angle
            }
        }
    }
}

/// Rotation detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationParams {
    /// Estimation method.
    pub method: RotationMethod,
    /// Output angle range.
    pub angle_range: AngleRange,
}

impl Default for RotationParams {
    fn default() -> Self {
        Self {
            method: RotationMethod::MinAreaRect,
            angle_range: AngleRange::Deg0To360,
        }
    }
}
