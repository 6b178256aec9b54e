use criterion::{black_box, criterion_group, criterion_main, Criterion};

use floortag::detect::detector::{Detector, DetectorConfig};
use floortag::dict::DICT_4X4_50;
use floortag::mapping::{CalibrationMap, PlaneMapper};
use floortag_bench::scene::{Background, Scene, SceneBuilder};
use floortag_bench::transform::Transform;

/// A 640x480 frame with the six calibration markers and two robots.
fn frame() -> Scene {
    let spots = [
        (0, 80.0, 80.0),
        (1, 80.0, 400.0),
        (2, 320.0, 80.0),
        (3, 320.0, 400.0),
        (4, 560.0, 80.0),
        (5, 560.0, 400.0),
        (12, 240.0, 240.0),
        (13, 420.0, 250.0),
    ];

    let mut builder = SceneBuilder::new(640, 480).background(Background::Solid(140));
    for (id, cx, cy) in spots {
        builder = builder.add_marker(
            DICT_4X4_50,
            id,
            Transform::Similarity {
                cx,
                cy,
                scale: 35.0,
                theta: 0.1 * id as f64,
            },
        );
    }
    builder.build()
}

fn bench_detect(c: &mut Criterion) {
    let scene = frame();
    let detector = Detector::new(DICT_4X4_50, DetectorConfig::default());

    c.bench_function("detect_640x480_8_markers", |b| {
        b.iter(|| black_box(detector.detect(&scene.image)))
    });
}

fn bench_frame_pipeline(c: &mut Criterion) {
    let scene = frame();
    let detector = Detector::new(DICT_4X4_50, DetectorConfig::default());
    let mut mapper = PlaneMapper::new(CalibrationMap::rectangle(2.0, 1.0));

    c.bench_function("frame_pipeline_640x480", |b| {
        b.iter(|| {
            let detections = detector.detect(&scene.image);
            mapper.compute_homography(&detections);
            for d in &detections {
                black_box(mapper.pixel_to_world(d.center[0], d.center[1]));
            }
        })
    });
}

criterion_group!(benches, bench_detect, bench_frame_pipeline);
criterion_main!(benches);
