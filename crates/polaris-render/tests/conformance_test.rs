use polaris_core::hash::{hash_argb, hash_frame};
use polaris_core::{Color, FrameBuffer, Quad, Rect, Viewport};
use polaris_render::{CpuBackend, RenderPipeline};

fn cpu_pipeline() -> RenderPipeline {
    let vp = Viewport::default();
    RenderPipeline::with_backend(vp, Box::new(CpuBackend::new(vp, Color::BLACK)))
}

fn render(pipeline: &mut RenderPipeline) -> FrameBuffer {
    pipeline.end_frame().expect("submit should succeed");
    pipeline.read_frame().expect("readback should succeed")
}

#[test]
fn test_conformance_01_red_green_split() {
    let mut p = cpu_pipeline();
    p.update_image(1, 2, 1, &[0xFFFF0000, 0xFF00FF00]).unwrap();
    p.begin_frame();
    p.render_normal(Rect::new(0, 0, 100, 100), 1, Rect::new(0, 0, 2, 1), 255)
        .unwrap();
    let frame = render(&mut p);

    assert_eq!(frame.get_pixel(10, 50), Some([255, 0, 0, 255]));
    assert_eq!(frame.get_pixel(90, 50), Some([0, 255, 0, 255]));
    for y in [0, 49, 99] {
        for x in 0..50 {
            let [r, g, _, _] = frame.get_pixel(x, y).unwrap();
            assert!(r > g, "left half should read red at ({x},{y})");
        }
        for x in 50..100 {
            let [r, g, _, _] = frame.get_pixel(x, y).unwrap();
            assert!(g > r, "right half should read green at ({x},{y})");
        }
    }
    // Outside the destination stays clear.
    assert_eq!(frame.get_pixel(100, 50), Some([0, 0, 0, 255]));
    assert_eq!(frame.get_pixel(50, 100), Some([0, 0, 0, 255]));
}

#[test]
fn test_conformance_02_emission_order() {
    let mut p = cpu_pipeline();
    p.update_image(1, 1, 1, &[0xFFFF0000]).unwrap();
    p.update_image(2, 1, 1, &[0xFF0000FF]).unwrap();
    let src = Rect::new(0, 0, 1, 1);

    p.begin_frame();
    p.render_normal(Rect::new(0, 0, 200, 200), 1, src, 255).unwrap();
    p.render_normal(Rect::new(100, 100, 200, 200), 2, src, 255).unwrap();
    let frame = render(&mut p);

    assert_eq!(frame.get_pixel(50, 50), Some([255, 0, 0, 255]));
    assert_eq!(frame.get_pixel(150, 150), Some([0, 0, 255, 255]));
    assert_eq!(frame.get_pixel(250, 250), Some([0, 0, 255, 255]));
}

#[test]
fn test_conformance_03_recomposed_every_frame() {
    let mut p = cpu_pipeline();
    p.update_image(1, 1, 1, &[0xFFFFFFFF]).unwrap();

    p.begin_frame();
    p.render_normal(Rect::new(0, 0, 10, 10), 1, Rect::new(0, 0, 1, 1), 255)
        .unwrap();
    let first = render(&mut p);
    assert_eq!(first.get_pixel(5, 5), Some([255, 255, 255, 255]));

    p.begin_frame();
    let second = render(&mut p);
    assert_eq!(second.get_pixel(5, 5), Some([0, 0, 0, 255]));
}

#[test]
fn test_conformance_04_alpha_carried_per_draw() {
    let mut p = cpu_pipeline();
    p.update_image(1, 1, 1, &[0xFFFFFFFF]).unwrap();
    p.begin_frame();
    p.render_normal(Rect::new(0, 0, 10, 10), 1, Rect::new(0, 0, 1, 1), 0)
        .unwrap();
    p.render_add(Rect::new(20, 0, 10, 10), 1, Rect::new(0, 0, 1, 1), 255)
        .unwrap();
    let frame = render(&mut p);

    assert_eq!(frame.get_pixel(5, 5), Some([0, 0, 0, 255]));
    // Additive draws blend like normal ones.
    assert_eq!(frame.get_pixel(25, 5), Some([255, 255, 255, 255]));
    // The cached pixels were never premultiplied.
    assert_eq!(p.cache().pixels(1).unwrap().get_pixel(0, 0), Some([255, 255, 255, 255]));
}

#[test]
fn test_conformance_05_warped_quad() {
    let mut p = cpu_pipeline();
    // 400x400 white image so corner-derived UVs stay inside the texture.
    p.update_image(1, 400, 400, &vec![0xFFFFFFFF; 400 * 400]).unwrap();
    p.begin_frame();
    let quad = Quad::from_coords([(100.0, 100.0), (300.0, 50.0), (100.0, 300.0), (300.0, 350.0)]);
    p.render_3d_normal(quad, 1, Rect::new(0, 0, 400, 400), 255).unwrap();
    let frame = render(&mut p);

    assert_eq!(frame.get_pixel(200, 200), Some([255, 255, 255, 255]));
    assert_eq!(frame.get_pixel(290, 60), Some([255, 255, 255, 255]));
    assert_eq!(frame.get_pixel(110, 60), Some([0, 0, 0, 255]));
    assert_eq!(frame.get_pixel(50, 200), Some([0, 0, 0, 255]));
}

#[test]
fn test_conformance_06_rule_wipe_progression() {
    let mut p = cpu_pipeline();
    p.update_image(1, 1, 1, &[0xFFFFFFFF]).unwrap();
    // Horizontal rule ramp, blue 0..=255 left to right.
    let ramp: Vec<u32> = (0..256u32).map(|b| 0xFF000000 | b).collect();
    p.update_image(2, 256, 1, &ramp).unwrap();

    let mut covered = Vec::new();
    for threshold in [0u8, 64, 128, 192, 255] {
        p.begin_frame();
        p.render_rule(1, 2, threshold).unwrap();
        let frame = render(&mut p);
        let lit = (0..1280)
            .filter(|&x| frame.get_pixel(x, 360) == Some([255, 255, 255, 255]))
            .count();
        covered.push(lit);
    }
    assert_eq!(covered[0], 0);
    assert!(covered.windows(2).all(|w| w[0] < w[1]), "{covered:?}");
}

#[test]
fn test_conformance_07_deterministic_hash() {
    let run = || {
        let mut p = cpu_pipeline();
        p.update_image(1, 2, 2, &[0xFFFF0000, 0xFF00FF00, 0xFF0000FF, 0x80FFFFFF])
            .unwrap();
        p.update_image(2, 2, 1, &[0xFF000000, 0xFF0000FF]).unwrap();
        p.begin_frame();
        p.render_normal(Rect::new(40, 40, 300, 200), 1, Rect::new(0, 0, 2, 2), 200)
            .unwrap();
        p.render_dim(Rect::new(200, 100, 300, 300), 1, Rect::new(0, 0, 2, 2), 255)
            .unwrap();
        p.render_melt(1, 2, 100).unwrap();
        hash_frame(&render(&mut p))
    };
    assert_eq!(run(), run());
}

#[test]
fn test_conformance_08_single_upload_across_draws() {
    let mut p = cpu_pipeline();
    p.update_image(1, 1, 1, &[0xFFFFFFFF]).unwrap();
    p.begin_frame();
    for i in 0..10 {
        p.render_normal(Rect::new(i * 10, 0, 10, 10), 1, Rect::new(0, 0, 1, 1), 255)
            .unwrap();
    }
    render(&mut p);
    assert_eq!(p.upload_count(), 1);

    p.update_image(1, 1, 1, &[0xFF000000]).unwrap();
    p.begin_frame();
    p.render_normal(Rect::new(0, 0, 10, 10), 1, Rect::new(0, 0, 1, 1), 255)
        .unwrap();
    p.render_dim(Rect::new(0, 0, 10, 10), 1, Rect::new(0, 0, 1, 1), 255)
        .unwrap();
    render(&mut p);
    assert_eq!(p.upload_count(), 2);
}

#[test]
fn test_conformance_09_full_viewport_blit_reproduces_image() {
    let vp = Viewport::new(16, 8);
    let mut p = RenderPipeline::with_backend(vp, Box::new(CpuBackend::new(vp, Color::BLACK)));
    let pixels: Vec<u32> = (0..16 * 8u32)
        .map(|i| 0xFF00_0000 | (i * 2) << 16 | (255 - i) << 8 | (i * 7 % 256))
        .collect();
    p.update_image(5, 16, 8, &pixels).unwrap();
    p.begin_frame();
    p.render_normal(Rect::new(0, 0, 16, 8), 5, Rect::new(0, 0, 16, 8), 255)
        .unwrap();
    let frame = render(&mut p);
    assert_eq!(hash_frame(&frame), hash_argb(16, 8, &pixels));
}
