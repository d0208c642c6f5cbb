pub mod collector;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod notify;
pub mod read_state;
pub mod session;
pub mod solver;
pub mod store;
use std::fmt::{self, Display};

use nalgebra::{Matrix3, Point2, Point3, RealField, Scalar};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Letter naming one correspondence pair: `A`, `B`, `C`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct Label(char);

impl Label {
    pub const FIRST: Label = Label('A');
    /// Labels run from `A` to `Z`.
    pub const CAPACITY: usize = 26;

    pub fn from_index(index: usize) -> Option<Self> {
        if index < Self::CAPACITY {
            Some(Label(char::from(b'A' + index as u8)))
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        (self.0 as u8 - b'A') as usize
    }

    /// The label after this one, `None` once `Z` has been used.
    pub fn next(&self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl TryFrom<char> for Label {
    type Error = String;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        if value.is_ascii_uppercase() {
            Ok(Label(value))
        } else {
            Err(format!("invalid point label {value:?}"))
        }
    }
}

impl From<Label> for char {
    fn from(label: Label) -> Self {
        label.0
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel position picked on the floor-plan image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint2<T: Scalar> {
    pub label: Label,
    pub point: Point2<T>,
}

impl<T: Scalar + Copy> LabeledPoint2<T> {
    pub fn new(label: Label, x: T, y: T) -> Self {
        Self {
            label,
            point: Point2::new(x, y),
        }
    }
    pub fn x(&self) -> T {
        self.point.x
    }
    pub fn y(&self) -> T {
        self.point.y
    }
}

/// World position picked on the 3D scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint3<T: Scalar> {
    pub label: Label,
    pub point: Point3<T>,
}

impl<T: Scalar + Copy> LabeledPoint3<T> {
    pub fn new(label: Label, x: T, y: T, z: T) -> Self {
        Self {
            label,
            point: Point3::new(x, y, z),
        }
    }
    pub fn x(&self) -> T {
        self.point.x
    }
    pub fn y(&self) -> T {
        self.point.y
    }
    pub fn z(&self) -> T {
        self.point.z
    }
}

/// Similarity transform taking the x/y plane of the scan onto the floor plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentTransform<T> {
    pub scale: T,
    /// Radians, counter-clockwise.
    pub rotation: T,
    pub translate_x: T,
    pub translate_y: T,
}

impl<T: RealField + Float> AlignmentTransform<T> {
    /// Rotate and scale `(x, y)` about the origin, then translate.
    pub fn apply(&self, x: T, y: T) -> Point2<T> {
        let (sin, cos) = Float::sin_cos(self.rotation);
        let scale = self.scale;
        Point2::new(
            x * scale * cos - y * scale * sin + self.translate_x,
            x * scale * sin + y * scale * cos + self.translate_y,
        )
    }

    /// Homogeneous 3x3 form of [`Self::apply`].
    pub fn to_matrix(&self) -> Matrix3<T> {
        let (sin, cos) = Float::sin_cos(self.rotation);
        let scale = self.scale;
        Matrix3::new(
            scale * cos,
            -(scale * sin),
            self.translate_x,
            scale * sin,
            scale * cos,
            self.translate_y,
            T::zero(),
            T::zero(),
            T::one(),
        )
    }

    pub fn is_finite(&self) -> bool {
        Float::is_finite(self.scale)
            && Float::is_finite(self.rotation)
            && Float::is_finite(self.translate_x)
            && Float::is_finite(self.translate_y)
    }
}

/// Identifier of the record that owns an alignment session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a pick script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PickEvent {
    Pick2d { x: f64, y: f64 },
    Pick3d { x: f64, y: f64, z: f64 },
    Reset,
    Compute,
    Finalize,
    Calibrate { distance: f64 },
}
