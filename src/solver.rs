use nalgebra::{RealField, Vector2, Vector3};
use num_traits::Float;
use tracing::trace;

use crate::{
    AlignmentTransform, Label, LabeledPoint2, LabeledPoint3, error::AlignmentError,
};

/// Pairs needed by both the similarity fit and the scale calibration.
pub const MIN_PAIRS: usize = 2;

/// Closed-form similarity fit from the first two correspondence pairs.
///
/// The 3D points are projected onto their x/y plane. Pairs beyond the first
/// two do not influence the result, see [`residuals`] to measure how well
/// they agree. Two points cannot tell a mirrored layout from a rotated one,
/// so a reflected scan comes back as a rotation.
pub fn compute_similarity<T: RealField + Float>(
    points_2d: &[LabeledPoint2<T>],
    points_3d: &[LabeledPoint3<T>],
) -> Result<AlignmentTransform<T>, AlignmentError> {
    let available = points_2d.len().min(points_3d.len());
    if available < MIN_PAIRS {
        return Err(AlignmentError::InsufficientPoints {
            required: MIN_PAIRS,
            available,
        });
    }
    let (a2, b2) = (&points_2d[0], &points_2d[1]);
    let (a3, b3) = (&points_3d[0], &points_3d[1]);

    let delta_2d = Vector2::new(b2.x() - a2.x(), b2.y() - a2.y());
    let delta_3d = Vector2::new(b3.x() - a3.x(), b3.y() - a3.y());
    let dist_2d = Float::sqrt(delta_2d.x * delta_2d.x + delta_2d.y * delta_2d.y);
    let dist_3d = Float::sqrt(delta_3d.x * delta_3d.x + delta_3d.y * delta_3d.y);
    trace!("dist 2D {dist_2d}, dist 3D {dist_3d}");
    if dist_3d == T::zero() {
        return Err(AlignmentError::ZeroDistance);
    }
    let scale = dist_2d / dist_3d;

    let angle_2d = Float::atan2(delta_2d.y, delta_2d.x);
    let angle_3d = Float::atan2(delta_3d.y, delta_3d.x);
    let rotation = angle_2d - angle_3d;
    trace!("angle 2D {angle_2d}, angle 3D {angle_3d}");

    let (sin, cos) = Float::sin_cos(rotation);
    let rx = a3.x() * scale * cos - a3.y() * scale * sin;
    let ry = a3.x() * scale * sin + a3.y() * scale * cos;

    let transform = AlignmentTransform {
        scale,
        rotation,
        translate_x: a2.x() - rx,
        translate_y: a2.y() - ry,
    };
    if !transform.is_finite() {
        return Err(AlignmentError::NonFinite);
    }
    Ok(transform)
}

/// Real-world units per model unit, from the first two 3D points and the
/// physical distance between them.
pub fn compute_scale_factor<T: RealField + Float>(
    points_3d: &[LabeledPoint3<T>],
    real_distance: T,
) -> Result<T, AlignmentError> {
    if points_3d.len() < MIN_PAIRS {
        return Err(AlignmentError::InsufficientPoints {
            required: MIN_PAIRS,
            available: points_3d.len(),
        });
    }
    let (a, b) = (&points_3d[0], &points_3d[1]);
    let delta = Vector3::new(b.x() - a.x(), b.y() - a.y(), b.z() - a.z());
    let dist_3d = Float::sqrt(delta.x * delta.x + delta.y * delta.y + delta.z * delta.z);
    trace!("dist 3D {dist_3d}, real distance {real_distance}");
    if dist_3d == T::zero() {
        return Err(AlignmentError::ZeroDistance);
    }
    if Float::is_nan(real_distance) || real_distance <= T::zero() {
        return Err(AlignmentError::InvalidDistance);
    }
    let scale_factor = real_distance / dist_3d;
    if !Float::is_finite(scale_factor) {
        return Err(AlignmentError::NonFinite);
    }
    Ok(scale_factor)
}

/// Plan-pixel distance between each 2D pick and its transformed 3D partner.
pub fn residuals<T: RealField + Float>(
    points_2d: &[LabeledPoint2<T>],
    points_3d: &[LabeledPoint3<T>],
    transform: &AlignmentTransform<T>,
) -> Vec<(Label, T)> {
    points_2d
        .iter()
        .zip(points_3d)
        .map(|(p2, p3)| {
            let mapped = transform.apply(p3.x(), p3.y());
            let error = p2.point - mapped;
            (p2.label, Float::sqrt(error.x * error.x + error.y * error.y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn label(index: usize) -> Label {
        Label::from_index(index).unwrap()
    }

    fn plan(points: &[(f64, f64)]) -> Vec<LabeledPoint2<f64>> {
        points
            .iter()
            .enumerate()
            .map(|(i, (x, y))| LabeledPoint2::new(label(i), *x, *y))
            .collect()
    }

    fn scan(points: &[(f64, f64, f64)]) -> Vec<LabeledPoint3<f64>> {
        points
            .iter()
            .enumerate()
            .map(|(i, (x, y, z))| LabeledPoint3::new(label(i), *x, *y, *z))
            .collect()
    }

    #[test]
    fn pure_scale() {
        let transform = compute_similarity(
            &plan(&[(0.0, 0.0), (10.0, 0.0)]),
            &scan(&[(0.0, 0.0, 7.0), (5.0, 0.0, -2.0)]),
        )
        .unwrap();
        assert_eq!(transform.scale, 2.0);
        assert_eq!(transform.rotation, 0.0);
        assert_eq!(transform.translate_x, 0.0);
        assert_eq!(transform.translate_y, 0.0);
    }

    #[test]
    fn quarter_turn() {
        let transform = compute_similarity(
            &plan(&[(0.0, 0.0), (0.0, 10.0)]),
            &scan(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]),
        )
        .unwrap();
        assert_eq!(transform.scale, 1.0);
        assert_relative_eq!(transform.rotation, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn translated_and_scaled() {
        let transform = compute_similarity(
            &plan(&[(100.0, 100.0), (200.0, 100.0)]),
            &scan(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)]),
        )
        .unwrap();
        assert_eq!(transform.scale, 100.0);
        assert_eq!(transform.rotation, 0.0);
        assert_eq!(transform.translate_x, 100.0);
        assert_eq!(transform.translate_y, 100.0);
    }

    #[test]
    fn fitted_transform_maps_both_pairs() {
        let points_2d = plan(&[(320.0, 48.0), (75.5, 410.25)]);
        let points_3d = scan(&[(-3.2, 1.5, 0.0), (4.75, -0.5, 2.0)]);
        let transform = compute_similarity(&points_2d, &points_3d).unwrap();
        for (p2, p3) in points_2d.iter().zip(&points_3d) {
            let mapped = transform.apply(p3.x(), p3.y());
            assert_relative_eq!(mapped, p2.point, epsilon = 1e-9);
        }
    }

    #[test]
    fn works_in_single_precision() {
        let points_2d = vec![
            LabeledPoint2::new(label(0), 0.0f32, 0.0),
            LabeledPoint2::new(label(1), 10.0, 0.0),
        ];
        let points_3d = vec![
            LabeledPoint3::new(label(0), 0.0f32, 0.0, 0.0),
            LabeledPoint3::new(label(1), 5.0, 0.0, 0.0),
        ];
        let transform = compute_similarity(&points_2d, &points_3d).unwrap();
        assert_eq!(transform.scale, 2.0f32);
    }

    #[test]
    fn identical_3d_points_are_rejected() {
        let result = compute_similarity(
            &plan(&[(0.0, 0.0), (10.0, 10.0)]),
            &scan(&[(1.0, 1.0, 1.0), (1.0, 1.0, 1.0)]),
        );
        assert!(matches!(result, Err(AlignmentError::ZeroDistance)));
    }

    #[test]
    fn vertically_stacked_3d_points_have_no_planar_distance() {
        let result = compute_similarity(
            &plan(&[(0.0, 0.0), (10.0, 10.0)]),
            &scan(&[(1.0, 1.0, 0.0), (1.0, 1.0, 3.0)]),
        );
        assert!(matches!(result, Err(AlignmentError::ZeroDistance)));
    }

    #[test]
    fn one_pair_is_not_enough() {
        let result = compute_similarity(&plan(&[(0.0, 0.0)]), &scan(&[(0.0, 0.0, 0.0)]));
        assert!(matches!(
            result,
            Err(AlignmentError::InsufficientPoints {
                required: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn unpaired_2d_point_does_not_count() {
        let result = compute_similarity(
            &plan(&[(0.0, 0.0), (10.0, 0.0)]),
            &scan(&[(0.0, 0.0, 0.0)]),
        );
        assert!(matches!(
            result,
            Err(AlignmentError::InsufficientPoints { available: 1, .. })
        ));
    }

    #[test]
    fn extra_pairs_are_ignored_by_the_fit() {
        let two = compute_similarity(
            &plan(&[(0.0, 0.0), (10.0, 0.0)]),
            &scan(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0)]),
        )
        .unwrap();
        let three = compute_similarity(
            &plan(&[(0.0, 0.0), (10.0, 0.0), (-40.0, 3.0)]),
            &scan(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0), (9.0, 9.0, 9.0)]),
        )
        .unwrap();
        assert_eq!(two, three);
    }

    #[test]
    fn scale_factor_from_real_distance() {
        let points_3d = scan(&[(0.0, 0.0, 0.0), (3.0, 4.0, 0.0)]);
        assert_eq!(compute_scale_factor(&points_3d, 10.0).unwrap(), 2.0);
    }

    #[test]
    fn scale_factor_uses_all_three_axes() {
        let points_3d = scan(&[(1.0, 1.0, 1.0), (3.0, 4.0, 7.0)]);
        assert_relative_eq!(compute_scale_factor(&points_3d, 21.0).unwrap(), 3.0);
    }

    #[test]
    fn scale_factor_rejects_degenerate_input() {
        let same = scan(&[(2.0, 2.0, 2.0), (2.0, 2.0, 2.0)]);
        assert!(matches!(
            compute_scale_factor(&same, 10.0),
            Err(AlignmentError::ZeroDistance)
        ));

        let points_3d = scan(&[(0.0, 0.0, 0.0), (3.0, 4.0, 0.0)]);
        for distance in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                compute_scale_factor(&points_3d, distance),
                Err(AlignmentError::InvalidDistance)
            ));
        }
        assert!(matches!(
            compute_scale_factor(&points_3d[..1], 10.0),
            Err(AlignmentError::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn residuals_report_disagreeing_third_pair() {
        let points_2d = plan(&[(100.0, 100.0), (200.0, 100.0), (100.0, 200.0), (310.0, 300.0)]);
        let points_3d = scan(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (2.0, 2.0, 0.0),
        ]);
        let transform = compute_similarity(&points_2d, &points_3d).unwrap();
        let residuals = residuals(&points_2d, &points_3d, &transform);
        assert_eq!(residuals.len(), 4);
        assert_abs_diff_eq!(residuals[0].1, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(residuals[1].1, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(residuals[2].1, 0.0, epsilon = 1e-9);
        assert_eq!(residuals[3].0.as_char(), 'D');
        assert_relative_eq!(residuals[3].1, 10.0, epsilon = 1e-9);
    }
}
