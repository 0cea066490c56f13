use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use spritegfx::backend::RecordingBackend;
use spritegfx::errors::ShaderError;
use spritegfx::shader::preprocess::parse_include;
use spritegfx::shader::{
    preprocess, FileShaderSource, LayeredShaderSource, ShaderArgs, ShaderSourceProvider,
    ShaderSourceRegistry, GENERIC_SHADER,
};
use spritegfx::{GxConfig, RenderContext, UniformValue};

const VS: &str = "include <gx.inc>

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = gx.ModelViewProjectionMatrix * input.position;
    out.color = input.color;
    out.texcoord = input.texcoord;
    return out;
}
";

const PS: &str = "include <gx.inc>

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return input.color * gx.params.x;
}
";

const BROKEN_PS: &str = "include <gx.inc>

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return input.color *;
}
";

const PLAIN_VS: &str = "@vertex
fn vs_main(@location(0) position: vec4<f32>) -> @builtin(position) vec4<f32> {
    return position;
}
";

const PLAIN_PS: &str = "@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 1.0, 1.0);
}
";

const COMPUTE: &str = "@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
}
";

struct MapSource(HashMap<&'static str, &'static str>);

impl ShaderSourceProvider for MapSource {
    fn source(&self, name: &str) -> Option<Cow<'_, str>> {
        self.0.get(name).map(|text| Cow::Borrowed(*text))
    }
}

fn sources(files: &[(&'static str, &'static str)]) -> MapSource {
    MapSource(files.iter().copied().collect())
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

#[test]
fn include_lines_are_recognised() {
    assert_eq!(parse_include("include <gx.inc>"), Some("gx.inc"));
    assert_eq!(parse_include("  #include \"lib/noise.inc\""), Some("lib/noise.inc"));
    assert_eq!(parse_include("#include <a.inc> // trailing"), Some("a.inc"));
    assert_eq!(parse_include("included <x>"), None);
    assert_eq!(parse_include("// include <x>"), None);
    assert_eq!(parse_include("include <>"), None);
}

#[test]
fn includes_expand_recursively_and_once() {
    let provider = sources(&[
        ("main.ps", "include <a.inc>\ninclude <b.inc>\nfn main() {}"),
        ("a.inc", "include <common.inc>\nconst A: f32 = 1.0;"),
        ("b.inc", "include <common.inc>\nconst B: f32 = 2.0;"),
        ("common.inc", "const C: f32 = 3.0;"),
    ]);

    let out = preprocess("main.ps", &provider).unwrap();

    assert_eq!(
        out.text,
        "const C: f32 = 3.0;\nconst A: f32 = 1.0;\nconst B: f32 = 2.0;\nfn main() {}\n"
    );
    assert_eq!(out.included_files, vec!["a.inc", "common.inc", "b.inc"]);
}

#[test]
fn include_cycles_are_rejected() {
    let provider = sources(&[
        ("main.ps", "include <a.inc>"),
        ("a.inc", "include <b.inc>"),
        ("b.inc", "include <a.inc>"),
    ]);

    let error = preprocess("main.ps", &provider).unwrap_err();
    assert_eq!(
        error,
        ShaderError::IncludeCycle {
            chain: vec![
                "main.ps".to_string(),
                "a.inc".to_string(),
                "b.inc".to_string(),
                "a.inc".to_string()
            ]
        }
    );

    let self_include = sources(&[("loop.inc", "include <loop.inc>")]);
    assert!(matches!(
        preprocess("loop.inc", &self_include),
        Err(ShaderError::IncludeCycle { .. })
    ));
}

#[test]
fn missing_sources_are_reported() {
    let provider = sources(&[("main.ps", "include <gone.inc>")]);
    assert_eq!(
        preprocess("main.ps", &provider).unwrap_err(),
        ShaderError::IncludeNotFound {
            name: "gone.inc".to_string(),
            from: "main.ps".to_string()
        }
    );
    assert_eq!(
        preprocess("nothing.ps", &provider).unwrap_err(),
        ShaderError::SourceNotFound("nothing.ps".to_string())
    );
}

#[test]
fn registry_holds_builtins_and_runtime_sources() {
    let mut registry = ShaderSourceRegistry::with_builtins();
    assert!(registry.contains("gx.inc"));
    assert!(registry.contains("engine/Generic.vs"));
    assert!(registry.contains("engine/Generic.ps"));

    registry.register("extra.inc", "const X: f32 = 1.0;");
    assert_eq!(registry.source("extra.inc").as_deref(), Some("const X: f32 = 1.0;"));
    assert!(registry.unregister("extra.inc"));
    assert!(!registry.unregister("extra.inc"));
    assert!(registry.source("extra.inc").is_none());
    assert!(ShaderSourceRegistry::empty().names().next().is_none());
}

#[test]
fn files_take_precedence_over_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("gx.inc"), "// from disk").unwrap();

    let files = FileShaderSource::new(vec![dir.path().to_path_buf()]);
    let registry = ShaderSourceRegistry::with_builtins();
    let layered = LayeredShaderSource {
        files: &files,
        registry: &registry,
    };

    assert_eq!(layered.source("gx.inc").as_deref(), Some("// from disk"));
    assert!(layered.source("engine/Generic.vs").is_some());
    assert!(layered.source("nope.vs").is_none());
}

#[test]
fn shader_args_name_both_stages() {
    let args = ShaderArgs::from_name("fx/blur");
    assert_eq!(args.vs, "fx/blur.vs");
    assert_eq!(args.ps, "fx/blur.ps");
    assert!(args.uses("fx/blur.ps"));
    assert!(!args.uses("fx/blur.cs"));
}

#[test]
fn generic_shader_is_ready_on_creation() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_in(dir.path());

    let generic = ctx.shader(ctx.generic_shader()).unwrap();
    assert!(generic.is_valid(), "{:?}", generic.error_messages);
    assert_eq!(generic.name, GENERIC_SHADER);
    assert!(generic.uniforms.has_matrices());
    assert!(generic.uniforms.params.is_some());
    assert_eq!(generic.included_files, vec!["gx.inc"]);
}

#[test]
fn broken_fragment_shader_then_fixed_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("foo.vs"), VS).unwrap();
    fs::write(dir.path().join("foo.ps"), BROKEN_PS).unwrap();
    let mut ctx = context_in(dir.path());

    let foo = ctx.load_shader("foo");
    let shader = ctx.shader(foo).unwrap();
    assert!(shader.program.is_none());
    assert_eq!(shader.error_messages.len(), 1);
    assert!(shader.error_messages[0].contains("foo.ps"));
    assert_eq!(shader.version, 1);

    // Lookups do not retry a failed load.
    assert_eq!(ctx.load_shader("foo"), foo);
    assert!(ctx.shader(foo).unwrap().program.is_none());

    fs::write(dir.path().join("foo.ps"), PS).unwrap();
    let before = ctx.resource_version();
    ctx.reload_caches();

    let shader = ctx.shader(foo).unwrap();
    assert!(shader.program.is_some(), "{:?}", shader.error_messages);
    assert!(shader.error_messages.is_empty());
    assert_eq!(shader.version, 2);
    assert_eq!(ctx.resource_version(), before + 1);
}

#[test]
fn invalid_active_shader_falls_back_to_generic() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.vs"), VS).unwrap();
    fs::write(dir.path().join("bad.ps"), BROKEN_PS).unwrap();
    let mut ctx = context_in(dir.path());

    let bad = ctx.load_shader("bad");
    ctx.set_shader(bad);
    ctx.draw_line(0.0, 0.0, 10.0, 10.0);

    let generic = ctx.shader(ctx.generic_shader()).unwrap().program;
    let draws = recording(&ctx).draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].program, generic);
}

#[test]
fn registered_sources_compile_and_reload_their_programs() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context_in(dir.path());

    let missing = ctx.load_shader("mem/plain");
    assert!(!ctx.shader(missing).unwrap().is_valid());

    ctx.register_shader_source("mem/plain.vs", PLAIN_VS);
    assert!(!ctx.shader(missing).unwrap().is_valid());
    ctx.register_shader_source("mem/plain.ps", PLAIN_PS);

    let shader = ctx.shader(missing).unwrap();
    assert!(shader.is_valid(), "{:?}", shader.error_messages);
    assert!(!shader.uniforms.has_matrices());
    assert_eq!(shader.version, 3);

    assert!(ctx.unregister_shader_source("mem/plain.ps"));
}

#[test]
fn matrices_are_uploaded_when_they_change() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context_in(dir.path());
    ctx.set_ortho(200.0, 100.0);

    ctx.draw_line(0.0, 0.0, 10.0, 0.0);
    ctx.draw_line(0.0, 5.0, 10.0, 5.0);
    ctx.translate(20.0, 0.0, 0.0);
    ctx.draw_line(0.0, 5.0, 10.0, 5.0);

    let backend = recording(&ctx);
    let matrix_uploads: Vec<&str> = backend
        .uploads()
        .iter()
        .map(|u| u.name.as_str())
        .filter(|name| *name != "params")
        .collect();
    assert_eq!(
        matrix_uploads,
        vec![
            "ModelViewMatrix",
            "ModelViewProjectionMatrix",
            "ProjectionMatrix",
            "ModelViewMatrix",
            "ModelViewProjectionMatrix",
        ]
    );

    let draws = backend.draws();
    assert_eq!(draws.len(), 3);
    let program = draws[0].program.unwrap();
    let expected = glam::Mat4::orthographic_rh(0.0, 200.0, 100.0, 0.0, -1.0, 1.0);
    let mvp = backend
        .read_uniform(program, &draws[0].uniforms, "ModelViewProjectionMatrix")
        .unwrap();
    assert_eq!(mvp, expected.to_cols_array().to_vec());

    let moved = backend
        .read_uniform(program, &draws[2].uniforms, "ModelViewProjectionMatrix")
        .unwrap();
    let translated = expected * glam::Mat4::from_translation(glam::Vec3::new(20.0, 0.0, 0.0));
    assert_eq!(moved, translated.to_cols_array().to_vec());
}

#[test]
fn params_follow_the_draw_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context_in(dir.path());

    ctx.set_color_mode(spritegfx::ColorMode::Add);
    ctx.set_color_clamp(true);
    ctx.draw_point(1.0, 1.0);

    let backend = recording(&ctx);
    let draw = &backend.draws()[0];
    let params = backend
        .read_uniform(draw.program.unwrap(), &draw.uniforms, "params")
        .unwrap();
    assert_eq!(params, vec![0.0, 1.0, 0.0, 1.0]);
}

#[test]
fn custom_uniforms_are_written_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context_in(dir.path());
    let generic = ctx.generic_shader();

    assert!(ctx.set_shader_uniform(generic, "params", UniformValue::Vec4([1.0, 2.0, 3.0, 4.0])));
    assert!(!ctx.set_shader_uniform(generic, "no_such_uniform", UniformValue::F32(1.0)));
}

#[test]
fn compute_programs_dispatch_whole_work_groups() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("fill.cs"), COMPUTE).unwrap();
    let mut ctx = context_in(dir.path());

    let fill = ctx.load_compute_shader("fill", [8, 8, 1]);
    let program = ctx.compute_shader(fill).unwrap();
    assert!(program.is_valid(), "{:?}", program.error_messages);
    assert_eq!(program.cs, "fill.cs");
    assert_eq!(program.group_count([100, 64, 1]), [13, 8, 1]);

    assert!(ctx.dispatch_compute(fill, [100, 64, 1], None));
    let dispatches = recording(&ctx).dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].groups, [13, 8, 1]);

    let missing = ctx.load_compute_shader("missing", [8, 8, 1]);
    assert!(!ctx.dispatch_compute(missing, [1, 1, 1], None));
}

#[test]
fn stages_without_entry_points_fail_to_link() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("half.vs"), VS).unwrap();
    fs::write(dir.path().join("half.ps"), "include <gx.inc>\n").unwrap();
    let mut ctx = context_in(dir.path());

    let half = ctx.load_shader("half");
    let shader = ctx.shader(half).unwrap();
    assert!(!shader.is_valid());
    assert!(shader.error_messages[0].contains("failed to link"));
    assert!(recording(&ctx).draws().is_empty());
}
