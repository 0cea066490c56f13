use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use image::{Rgba, RgbaImage};
use spritegfx::backend::RecordingBackend;
use spritegfx::{AnimTriggerEvent, GxConfig, PlayState, Primitive, RenderContext, Sprite};

const WALKER_SHEET: &str = "\
sheet grid_sx:2 grid_sy:1 pivot_x:16 pivot_y:32
animation name:walk frames:2 rate:2
trigger frame:0 on:enter action:lift
trigger frame:1 on:enter action:step x:4
";

fn write_walker(dir: &Path) {
    let image = RgbaImage::from_fn(64, 32, |x, _| {
        if x < 32 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    image.save(dir.join("walker.png")).unwrap();
    fs::write(dir.join("walker.txt"), WALKER_SHEET).unwrap();
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn context_in(dir: &Path) -> RenderContext {
    init_logging();
    let config = GxConfig {
        resource_paths: vec![dir.to_path_buf()],
        ..Default::default()
    };
    RenderContext::new(config, Box::new(RecordingBackend::new()))
}

fn recording(ctx: &RenderContext) -> &RecordingBackend {
    ctx.backend_as::<RecordingBackend>().unwrap()
}

fn drawn_texture(ctx: &RenderContext) -> Option<spritegfx::backend::TextureId> {
    recording(ctx).draws().last().and_then(|draw| draw.texture)
}

#[test]
fn sprite_loads_its_sheet_and_gridded_texture() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());

    let sprite = Sprite::new(&mut ctx, "walker.png");

    let texture = ctx.texture(sprite.texture_handle().unwrap()).unwrap();
    assert!(texture.is_valid());
    assert_eq!(texture.cells.len(), 2);
    assert_eq!(sprite.cell_size(&ctx), (32.0, 32.0));
    assert_eq!(sprite.anim_list(&ctx), vec!["walk".to_string()]);
    assert_eq!((sprite.pivot_x, sprite.pivot_y), (16.0, 32.0));
    assert_eq!(sprite.play_state(), PlayState::Stopped);
}

#[test]
fn static_sprite_draws_the_first_cell_as_a_quad() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());
    let mut sprite = Sprite::new(&mut ctx, "walker.png");
    sprite.x = 10.6;
    sprite.y = 20.0;
    sprite.pixel_pos = true;

    sprite.draw(&mut ctx);

    let first_cell = ctx.texture(sprite.texture_handle().unwrap()).unwrap().cell(0);
    let backend = recording(&ctx);
    let draws = backend.draws();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.primitive, Primitive::Triangles);
    assert_eq!(draw.texture, first_cell);
    assert_eq!(draw.indices, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(draw.vertices[2].position, [32.0, 32.0, 0.0, 1.0]);
    assert_eq!(draw.vertices[2].texcoord, [1.0, 1.0]);

    // Position snapped to (10, 20), then moved by the pivot.
    let model_view = backend
        .read_uniform(draw.program.unwrap(), &draw.uniforms, "ModelViewMatrix")
        .unwrap();
    let expected = Mat4::from_translation(Vec3::new(-6.0, -12.0, 0.0));
    assert_eq!(model_view, expected.to_cols_array().to_vec());

    // Drawing leaves no state behind.
    assert_eq!(ctx.draw_state().texture, None);
    assert_eq!(ctx.matrices().model_view.depth(), 1);
}

#[test]
fn playing_sprite_fires_triggers_at_its_position() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());
    let mut sprite = Sprite::new(&mut ctx, "walker.png");
    sprite.x = 100.0;
    sprite.y = 50.0;

    let events: Rc<RefCell<Vec<AnimTriggerEvent>>> = Rc::default();
    let sink = events.clone();
    sprite.set_trigger_handler(move |event| sink.borrow_mut().push(event.clone()));

    sprite.start_anim(&mut ctx, "walk", 0);
    assert!(sprite.is_anim_active());
    assert_eq!(sprite.play_state(), PlayState::Playing);
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].action, "lift");

    sprite.update(&mut ctx, 0.5);
    assert_eq!(sprite.anim_frame(), 1);
    {
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        let step = &events[1];
        assert_eq!(step.action, "step");
        assert_eq!(step.frame, 1);
        assert_eq!((step.x, step.y), (104, 50));
        assert_eq!(step.args.get("x"), Some("104"));
    }

    sprite.draw(&mut ctx);
    let second_cell = ctx.texture(sprite.texture_handle().unwrap()).unwrap().cell(1);
    assert_eq!(drawn_texture(&ctx), second_cell);

    sprite.update(&mut ctx, 0.5);
    assert_eq!(sprite.anim_frame(), 0);
    assert_eq!(events.borrow().last().unwrap().action, "lift");
}

#[test]
fn missing_animation_draws_the_first_cell() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());
    let mut sprite = Sprite::new(&mut ctx, "walker.png");

    sprite.start_anim(&mut ctx, "fly", 1);
    assert!(!sprite.is_anim_active());
    assert_eq!(sprite.anim_frame(), 0);

    sprite.update(&mut ctx, 10.0);
    sprite.draw(&mut ctx);
    let first_cell = ctx.texture(sprite.texture_handle().unwrap()).unwrap().cell(0);
    assert_eq!(drawn_texture(&ctx), first_cell);
}

#[test]
fn paused_sprite_holds_its_frame() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());
    let mut sprite = Sprite::new(&mut ctx, "walker.png");

    sprite.start_anim(&mut ctx, "walk", 0);
    sprite.pause_anim();
    sprite.update(&mut ctx, 0.5);
    assert_eq!(sprite.anim_frame(), 0);
    assert_eq!(sprite.play_state(), PlayState::Paused);

    sprite.resume_anim();
    sprite.set_anim_frame(&mut ctx, 1);
    assert_eq!(sprite.anim_frame(), 1);

    sprite.stop_anim();
    assert!(!sprite.is_anim_active());
}

#[test]
fn reloaded_sheet_rebinds_the_texture_grid() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());
    let mut sprite = Sprite::new(&mut ctx, "walker.png");
    sprite.start_anim(&mut ctx, "walk", 0);
    assert_eq!(sprite.width(&ctx), 32.0);

    fs::write(
        dir.path().join("walker.txt"),
        "sheet grid_sx:4 grid_sy:1\nanimation name:walk frames:4 rate:1 pivot_x:2\n",
    )
    .unwrap();
    let before = ctx.resource_version();
    ctx.handle_file_change("walker.txt");
    assert_eq!(ctx.resource_version(), before + 1);

    sprite.draw(&mut ctx);
    assert_eq!(sprite.cell_size(&ctx), (16.0, 32.0));
    assert_eq!(sprite.pivot_x, 2.0);
    let texture = ctx.texture(sprite.texture_handle().unwrap()).unwrap();
    assert_eq!(texture.cells.len(), 4);
    assert_eq!(drawn_texture(&ctx), texture.cell(0));

    sprite.set_anim_frame(&mut ctx, 3);
    assert_eq!(sprite.anim_frame(), 3);
}

#[test]
fn missing_image_draws_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context_in(dir.path());
    let mut sprite = Sprite::new(&mut ctx, "ghost.png");

    assert!(sprite.anim_list(&ctx).is_empty());
    assert_eq!(sprite.cell_size(&ctx), (0.0, 0.0));
    sprite.draw(&mut ctx);
    assert!(recording(&ctx).draws().is_empty());
}

#[test]
fn sprites_share_cached_resources() {
    let dir = tempfile::tempdir().unwrap();
    write_walker(dir.path());
    let mut ctx = context_in(dir.path());

    let first = Sprite::new(&mut ctx, "walker.png");
    let second = Sprite::new(&mut ctx, "./walker.png");

    assert_eq!(first.texture_handle(), second.texture_handle());
    assert_eq!(first.sheet_handle(), second.sheet_handle());
    assert_eq!(ctx.textures().len(), 1);
    assert!(Sprite::without_sheet(&mut ctx, "walker.png")
        .sheet_handle()
        .is_none());
}
