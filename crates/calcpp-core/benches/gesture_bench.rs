//! Benchmark: gesture classification and keypad routing.
//!
//! Run with: `cargo bench -p calcpp-core --bench gesture_bench`

use std::time::Duration;

use calcpp_core::{ButtonRole, GestureConfig, Keypad, PointerEvent, classify_release};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use web_time::Instant;

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_release");
    let config = GestureConfig::default();

    group.bench_function("tap", |b| {
        b.iter(|| {
            black_box(classify_release(
                &config,
                black_box(Duration::from_millis(90)),
                black_box(2.0),
                black_box(-3.0),
            ))
        });
    });
    group.bench_function("swipe", |b| {
        b.iter(|| {
            black_box(classify_release(
                &config,
                black_box(Duration::from_millis(120)),
                black_box(-8.0),
                black_box(-60.0),
            ))
        });
    });

    group.finish();
}

fn bench_keypad(c: &mut Criterion) {
    let mut group = c.benchmark_group("keypad");
    let mut keypad = Keypad::new(&GestureConfig::default());
    let t = Instant::now();
    let down = PointerEvent::down(1, 10.0, 10.0, t);
    let up = PointerEvent::up(1, 10.0, -40.0, t + Duration::from_millis(150));

    group.bench_function("press_release", |b| {
        b.iter(|| {
            keypad.process(ButtonRole::Digit8, black_box(&down));
            black_box(keypad.process(ButtonRole::Digit8, black_box(&up)))
        });
    });
    group.bench_function("poll_idle", |b| {
        b.iter(|| black_box(keypad.poll(black_box(t))));
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_keypad);
criterion_main!(benches);
