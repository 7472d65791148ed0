mod common;

use std::thread;

use bundle_stats::constants::NULL;
use bundle_stats::{BundleError, BundleResults, ResidualAxis, Statistics};

use crate::common::{assert_statistics_close, reference_statistics};

/// Residuals of `images` images, `per_image` observations each.
fn residuals(images: usize, per_image: usize) -> Vec<(usize, f64, f64)> {
    (0..images)
        .flat_map(|image| {
            (0..per_image).map(move |k| {
                let t = (image * per_image + k) as f64;
                (image, (t * 0.37).sin(), (t * 0.11).cos() - 0.5)
            })
        })
        .collect()
}

#[test]
fn workers_merge_into_sequential_result() {
    let observations = residuals(3, 40);

    let mut sequential = BundleResults::new();
    for &(image, line, sample) in &observations {
        sequential.add_image_residuals(image, line, sample).unwrap();
    }

    // each worker owns its accumulators; the merge happens after the join
    let partials: Vec<BundleResults> = thread::scope(|scope| {
        let handles: Vec<_> = observations
            .chunks(25)
            .map(|chunk| {
                scope.spawn(move || {
                    let mut partial = BundleResults::new();
                    for &(image, line, sample) in chunk {
                        partial.add_image_residuals(image, line, sample).unwrap();
                    }
                    partial
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut merged = BundleResults::new();
    merged.ensure_images(3);
    for partial in &partials {
        for axis in ResidualAxis::ALL {
            for (image, stats) in partial.residuals(axis).iter().enumerate() {
                merged.merge_image_statistics(axis, image, stats).unwrap();
            }
        }
    }

    for axis in ResidualAxis::ALL {
        for image in 0..3 {
            assert_statistics_close(
                merged.statistics(axis, image).unwrap(),
                sequential.statistics(axis, image).unwrap(),
                1e-12,
            );
        }
    }
}

#[test]
fn add_then_remove_residuals() {
    let mut results = BundleResults::new();
    results.add_image_residuals(1, 0.5, NULL).unwrap();
    results.add_image_residuals(1, -0.25, 0.75).unwrap();
    assert_eq!(results.number_images(), 2);
    assert!(results.is_complete());

    let combined = results.statistics(ResidualAxis::Combined, 1).unwrap();
    assert_eq!(combined.valid_pixels(), 3);
    assert_eq!(combined.null_pixels(), 1);

    results.remove_image_residuals(1, 0.5, NULL).unwrap();
    let line = results.statistics(ResidualAxis::Line, 1).unwrap();
    assert_eq!(line.minimum(), Some(-0.25));
    assert_eq!(line.maximum(), Some(-0.25));
    assert_eq!(
        results.statistics(ResidualAxis::Sample, 1).unwrap().null_pixels(),
        0
    );

    // nothing changes when one axis cannot undo the observation
    let before = results.clone();
    assert!(matches!(
        results.remove_image_residuals(1, -0.25, 0.5),
        Err(BundleError::BucketUnderflow { .. })
    ));
    assert_eq!(results, before);
    assert_eq!(
        results.remove_image_residuals(7, 0.0, 0.0),
        Err(BundleError::ImageIndexOutOfRange { index: 7, len: 2 })
    );
}

#[test]
fn list_replacement_is_all_or_nothing() {
    let mut results = BundleResults::new();
    let one = vec![reference_statistics()];
    results
        .set_rms_image_residual_lists(one.clone(), one.clone(), one.clone())
        .unwrap();

    let err = results
        .set_rms_image_residual_lists(vec![], one.clone(), vec![Statistics::new(); 2])
        .unwrap_err();
    assert_eq!(
        err,
        BundleError::InconsistentAggregate {
            line: 0,
            sample: 1,
            combined: 2
        }
    );
    assert_eq!(results.rms_image_line_residuals(), &one[..]);
    assert_eq!(results.rms_image_residuals(), &one[..]);
}

#[test]
fn append_disjoint_image_sets() {
    let mut first = BundleResults::new();
    first.add_image_residuals(0, 1.0, 2.0).unwrap();
    first.set_number_observations(1);
    let mut second = BundleResults::new();
    second.add_image_residuals(1, 3.0, 4.0).unwrap();
    second.set_number_observations(2);

    first.append(second).unwrap();
    assert_eq!(first.number_images(), 3);
    assert_eq!(first.number_observations(), 3);
    let last = first.statistics(ResidualAxis::Sample, 2).unwrap();
    assert_eq!(last.average(), Some(4.0));

    let mut partial = BundleResults::new();
    partial.set_residuals(ResidualAxis::Line, vec![Statistics::new()]);
    assert!(matches!(
        first.append(partial),
        Err(BundleError::InconsistentAggregate { .. })
    ));
    assert_eq!(first.number_images(), 3);
}
