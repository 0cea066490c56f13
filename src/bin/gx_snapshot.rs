use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageReader, Rgba, RgbaImage};
use spritegfx::{
    Color, GxConfig, Primitive, Rectangle, RenderContext, Sprite, WgpuBackend, WgpuBackendConfig,
};

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;

fn compare_with_tolerance(a_path: &Path, b_path: &Path, tolerance: u8) -> anyhow::Result<bool> {
    let a = ImageReader::open(a_path)?.decode()?.to_rgba8();
    let b = ImageReader::open(b_path)?.decode()?.to_rgba8();

    if a.dimensions() != b.dimensions() {
        return Ok(false);
    }
    Ok(a.pixels().zip(b.pixels()).all(|(pa, pb)| {
        let da = pa.0;
        let db = pb.0;
        (0..4).all(|i| da[i].abs_diff(db[i]) <= tolerance)
    }))
}

/// Two 32x32 cells side by side: a red/white checkerboard and a solid blue square.
fn write_fixtures(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    let sheet = RgbaImage::from_fn(64, 32, |x, y| {
        if x >= 32 {
            Rgba([40, 80, 220, 255])
        } else if ((x / 8) + (y / 8)) % 2 == 0 {
            Rgba([220, 40, 40, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    sheet.save(dir.join("walker.png"))?;
    fs::write(
        dir.join("walker.txt"),
        "sheet grid_sx:2 grid_sy:1 pivot_x:16 pivot_y:16\n\
         animation name:walk grid_x:0 grid_y:0 frames:2 rate:4 loop:1\n",
    )?;
    Ok(())
}

fn draw_scene(ctx: &mut RenderContext) {
    ctx.set_ortho(WIDTH as f32, HEIGHT as f32);
    ctx.begin_frame(Some(Color::from_rgba8(24, 24, 32, 255)));

    ctx.color(Color::from_rgba8(80, 200, 120, 255));
    ctx.draw_rect(Rectangle::new(16.0, 16.0, 96.0, 48.0));
    ctx.color(Color::WHITE);
    ctx.draw_rect_line(Rectangle::new(12.0, 12.0, 104.0, 56.0));

    ctx.color(Color::from_rgba8(250, 200, 60, 255));
    ctx.fill_circle(192.0, 48.0, 32.0, 48);
    ctx.color(Color::WHITE);
    ctx.draw_circle(192.0, 48.0, 36.0, 48);

    ctx.color(Color::from_rgba8(120, 160, 255, 255));
    ctx.begin(Primitive::TriangleStrip);
    for i in 0..9 {
        let x = 16.0 + i as f32 * 28.0;
        ctx.vertex2(x, 96.0);
        ctx.vertex2(x + 14.0, 128.0);
    }
    ctx.end();

    ctx.color(Color::WHITE);
    let mut sprite = Sprite::new(ctx, "walker.png");
    sprite.x = 64.0;
    sprite.y = 192.0;
    sprite.draw(ctx);

    sprite.start_anim(ctx, "walk", 0);
    sprite.update(ctx, 0.25);
    sprite.x = 160.0;
    sprite.angle = 30.0;
    sprite.scale = 1.5;
    sprite.draw(ctx);

    ctx.end_frame();
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let fixtures: PathBuf = std::env::temp_dir().join("gx_snapshot");
    write_fixtures(&fixtures)?;

    let backend = WgpuBackend::new_headless(WgpuBackendConfig {
        width: WIDTH,
        height: HEIGHT,
        ..Default::default()
    })?;
    let config = GxConfig {
        resource_paths: vec![fixtures],
        ..Default::default()
    };
    let mut ctx = RenderContext::new(config, Box::new(backend));
    draw_scene(&mut ctx);

    let image = ctx
        .backend_as::<WgpuBackend>()
        .ok_or_else(|| anyhow::anyhow!("render context is not backed by wgpu"))?
        .read_target()?;

    fs::create_dir_all("snapshots/actual")?;
    fs::create_dir_all("snapshots/golden")?;
    let out_actual = Path::new("snapshots/actual/gx_scene.png");
    let out_golden = Path::new("snapshots/golden/gx_scene.png");
    image.save(out_actual)?;

    if !out_golden.exists() {
        fs::copy(out_actual, out_golden)?;
        println!("golden created at {}", out_golden.display());
        return Ok(());
    }

    if compare_with_tolerance(out_actual, out_golden, 3)? {
        println!("snapshot OK for gx_scene.png");
    } else {
        println!("snapshot mismatch for gx_scene.png");
    }
    Ok(())
}
